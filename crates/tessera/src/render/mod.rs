// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Page rendering with Handlebars.

mod compose;
pub mod helpers;

pub use compose::{compose_error_response, compose_response};

use handlebars::Handlebars;
use serde_json::Value as JsonValue;

use crate::error::RenderError;

/// Template engine with the framework helpers registered.
pub struct Renderer {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer").finish_non_exhaustive()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    /// Creates an engine with `translate` and `link` registered.
    pub fn new() -> Self {
        Self::with_missing_reports(false)
    }

    /// Creates an engine whose helpers log untranslated texts when
    /// `report_missing` is set.
    pub fn with_missing_reports(report_missing: bool) -> Self {
        let mut registry = Handlebars::new();
        registry.register_helper("translate", Box::new(helpers::Translate { report_missing }));
        registry.register_helper("link", Box::new(helpers::Link { report_missing }));
        Self { registry }
    }

    /// Renders template source with `data`.
    pub fn render(&self, template: &str, data: &JsonValue) -> Result<String, RenderError> {
        self.registry
            .render_template(template, data)
            .map_err(|e| RenderError::Template(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::WarnCapture;
    use serde_json::json;

    #[test]
    fn test_helpers_read_root_data() {
        let renderer = Renderer::new();
        let data = json!({
            "language": "fr",
            "translations": { "About": "À propos", "Hi {who}": "Salut {who}" },
            "items": [1]
        });

        let html = renderer
            .render(
                "{{#each items}}{{link \"About\" href=\"/about\"}}{{/each}}",
                &data,
            )
            .unwrap();
        assert_eq!(html, "<a href=\"/fr/about\">À propos</a>");

        let html = renderer
            .render("{{translate \"Hi {who}\" who=\"<b>\"}}", &data)
            .unwrap();
        assert_eq!(html, "Salut &lt;b&gt;");
    }

    #[test]
    fn test_missing_translations_are_reported() {
        let data = json!({ "locale": "fr-fr", "translations": { "Hello": "Bonjour" } });
        let template = "{{translate \"Hello\"}} {{translate \"Goodbye\"}} {{link \"Home\" href=\"/\"}}";

        let (html, warnings) =
            WarnCapture::run(|| Renderer::with_missing_reports(true).render(template, &data));
        assert_eq!(html.unwrap(), "Bonjour Goodbye <a href=\"/\">Home</a>");
        assert_eq!(warnings, vec!["missing translation", "missing translation"]);

        let (_, warnings) = WarnCapture::run(|| Renderer::new().render(template, &data));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_template_error() {
        let renderer = Renderer::new();
        let err = renderer.render("{{#if}}", &json!({})).unwrap_err();
        assert!(matches!(err, RenderError::Template(_)));
    }
}
