// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template helpers.
//!
//! Both helpers read `translations` and `language` from the root of the
//! render data, never from the current block scope.
//!
//! ```handlebars
//! {{translate "Hello {name}" name=user.name}}
//! {{link "About us" href="/about" class="nav"}}
//! ```

use handlebars::{
    html_escape, Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
    RenderError as TemplateError,
};
use serde_json::Value as JsonValue;
use tracing::warn;

/// Looks `text` up in `translations` and substitutes `{key}` placeholders.
///
/// Placeholders are only substituted in found translations; an untranslated
/// text is returned as is.
pub fn translate_text(text: &str, translations: &JsonValue, variables: &[(&str, String)]) -> String {
    match translations.get(text).and_then(JsonValue::as_str) {
        Some(translation) => variables
            .iter()
            .fold(translation.to_string(), |acc, (key, value)| {
                acc.replace(&format!("{{{}}}", key), value)
            }),
        None => text.to_string(),
    }
}

fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Hash arguments as variables, plus the entries of a `variables` object.
fn variables<'a>(h: &'a Helper) -> Vec<(&'a str, String)> {
    let mut vars = Vec::new();
    for (key, value) in h.hash() {
        match (*key, value.value()) {
            ("variables", JsonValue::Object(map)) => {
                vars.extend(map.iter().map(|(k, v)| (k.as_str(), value_to_string(v))));
            }
            (key, value) => vars.push((key, value_to_string(value))),
        }
    }
    vars
}

fn text_param(h: &Helper, helper: &str) -> Result<String, TemplateError> {
    h.param(0)
        .map(|p| value_to_string(p.value()))
        .ok_or_else(|| TemplateError::new(format!("{}: missing text parameter", helper)))
}

/// Translates with the root `translations`, warning about misses when
/// `report_missing` is set.
fn translate_root(
    root: &JsonValue,
    text: &str,
    variables: &[(&str, String)],
    report_missing: bool,
) -> String {
    let translations = root.get("translations").unwrap_or(&JsonValue::Null);
    if report_missing && translations.get(text).and_then(JsonValue::as_str).is_none() {
        let locale = root.get("locale").and_then(JsonValue::as_str).unwrap_or("");
        warn!(locale, key = text, "missing translation");
    }
    translate_text(text, translations, variables)
}

/// `{{translate text [key=value ...]}}`
#[derive(Debug, Clone, Copy, Default)]
pub struct Translate {
    /// Log untranslated texts.
    pub report_missing: bool,
}

impl HelperDef for Translate {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let text = text_param(h, "translate")?;
        let translated = translate_root(ctx.data(), &text, &variables(h), self.report_missing);
        out.write(&html_escape(&translated))?;
        Ok(())
    }
}

/// `{{link text href=... [attr=value ...]}}`
///
/// Renders an anchor whose `href` is prefixed with the request language.
/// Every hash argument except `variables` becomes an attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct Link {
    /// Log untranslated link texts.
    pub report_missing: bool,
}

impl HelperDef for Link {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let text = text_param(h, "link")?;
        let root = ctx.data();
        let language = root.get("language").and_then(JsonValue::as_str);

        let mut attrs = Vec::new();
        for (key, value) in h.hash() {
            if *key == "variables" {
                continue;
            }
            let mut value = value_to_string(value.value());
            if *key == "href" {
                if let Some(language) = language {
                    value = format!("/{}{}", language, value);
                }
            }
            attrs.push(format!("{}=\"{}\"", html_escape(key), html_escape(&value)));
        }

        let variables: Vec<(&str, String)> = match h.hash_get("variables").map(|v| v.value()) {
            Some(JsonValue::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.as_str(), value_to_string(v)))
                .collect(),
            _ => Vec::new(),
        };

        out.write(&format!(
            "<a {}>{}</a>",
            attrs.join(" "),
            html_escape(&translate_root(root, &text, &variables, self.report_missing))
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_translate_text_substitutes_found_translations() {
        let translations = json!({ "Hello {name}": "Bonjour {name}" });
        assert_eq!(
            translate_text("Hello {name}", &translations, &[("name", "Ada".to_string())]),
            "Bonjour Ada"
        );
        assert_eq!(
            translate_text("Bye {name}", &translations, &[("name", "Ada".to_string())]),
            "Bye {name}"
        );
        assert_eq!(translate_text("Hello", &JsonValue::Null, &[]), "Hello");
    }
}
