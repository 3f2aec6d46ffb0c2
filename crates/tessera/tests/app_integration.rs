// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! End-to-end tests of an assembled application.
//!
//! Each test builds a small project on disk (modules, views, layouts, error
//! pages, locales, policies) and drives it over HTTP.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value as JsonValue};
use tempfile::{tempdir, TempDir};

use tessera::{
    BootError, Config, Controller, FnSessionStore, HttpError, Lifecycle, Manifest,
    ModuleManifest, Reply, Tessera,
};

const CONFIG: &str = r#"
version = "1.2.3"

[server]
host = "127.0.0.1"
port = 0

[i18n.languages]
en = "en-gb"
fr = "fr-fr"

[client]
api = "/api"

[api]
default_page_size = 5
"#;

const BLOG_DESCRIPTOR: &str = r#"
[[routes]]
method = "get"
path = "/posts"
action = "Posts.list"

[[routes]]
method = "post"
path = "/posts"
action = "Posts.create"

[[routes]]
method = "get"
path = "/:language/posts"
action = "Posts.list"
policies = ["language"]

[[routes]]
method = "get"
path = "/api/posts"
action = "Posts.search"

[[routes]]
method = "get"
path = "/api/posts/:id"
action = "Posts.find"

[routes.options]
error_response_as_json = true

[[routes]]
method = "get"
path = "/about"
action = "about"

[[routes]]
method = "get"
path = "/admin/posts"
action = "Posts.list"
policies = ["acl"]

[routes.options]
acl_resource = "post.admin"

[[routes]]
method = "get"
path = "/panic"
action = "Posts.boom"

[[routes]]
method = "get"
path = "/api/panic"
action = "Posts.boom"

[routes.options]
error_response_as_json = true

[acl]
resources = ["post.admin"]
"#;

fn write(root: &Path, path: &str, content: &str) {
    let path = root.join(path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn project() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();

    write(root, "app/modules/blog/module.toml", BLOG_DESCRIPTOR);
    write(
        root,
        "app/modules/blog/views/list.html",
        "<h1>{{translate \"Hello\"}}</h1><ul>{{#each posts}}<li>{{this}}</li>{{/each}}</ul>",
    );
    write(root, "app/modules/blog/views/index.html", "<p>Blog home</p>");

    write(
        root,
        "app/modules/shop/module.toml",
        "[[routes]]\nmethod = \"get\"\npath = \"/shop\"\naction = \"catalog\"\n",
    );

    write(
        root,
        "app/templates/layouts/default.html",
        "<html lang=\"{{locale}}\" data-version=\"{{_version}}\" data-env=\"{{_env}}\">\
         <title>{{_title}}</title>\
         {{#each flashMessages}}<div class=\"flash\">{{this}}</div>{{/each}}\
         <main>{{{_body}}}</main>\
         <script id=\"config\">{{{_clientConfig}}}</script></html>",
    );
    write(
        root,
        "app/templates/layouts/error.html",
        "<div class=\"error\">{{{_body}}}</div>",
    );
    write(
        root,
        "app/templates/error/index.html",
        "<h1>{{status}}</h1><p>{{error}}</p>",
    );
    write(root, "app/templates/error/404.html", "<h1>Not here</h1>");

    write(root, "app/locales/en-gb.json", r#"{ "Hello": "Hello there" }"#);
    write(root, "app/locales/fr-fr.json", r#"{ "Hello": "Bonjour" }"#);
    write(root, "app/policies/language.toml", "kind = \"language\"\n");
    write(root, "app/policies/acl.toml", "kind = \"acl\"\n");

    write(root, "public/robots.txt", "User-agent: *");

    dir
}

fn blog_manifest() -> Manifest {
    Manifest::new().module(
        "blog",
        ModuleManifest::new().controller(
            "PostsController",
            Controller::new()
                .action("list", |ctx| async move {
                    Ok(ctx.render(json!({ "posts": ["First", "Second"] })))
                })
                .action("create", |ctx| async move {
                    ctx.flash("Created");
                    Ok(Reply::redirect("/posts"))
                })
                .action("search", |ctx| async move {
                    let params = serde_json::to_value(ctx.api_params()).unwrap_or_default();
                    Ok(Reply::json(params))
                })
                .action("find", |ctx| async move {
                    let id = ctx.param("id").unwrap_or_default().to_string();
                    Err(HttpError::not_found(format!("Post {} not found", id)))
                })
                .action("boom", |_ctx| async move {
                    if true {
                        panic!("boom");
                    }
                    Ok(Reply::Render)
                }),
        ),
    )
}

async fn server(dir: &TempDir) -> TestServer {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let app = Tessera::new(dir.path(), config).manifest(blog_manifest());
    let (router, _state) = app.assemble().await.unwrap();
    TestServer::new(router).unwrap()
}

#[tokio::test]
async fn test_page_renders_inside_layout() {
    let dir = project();
    let server = server(&dir).await;

    let response = server.get("/posts").await;
    response.assert_status_ok();

    let body = response.text();
    assert!(body.contains("lang=\"en-gb\""));
    assert!(body.contains("data-version=\"1.2.3\""));
    assert!(body.contains("data-env=\"development\""));
    assert!(body.contains("<title>Tessera</title>"));
    assert!(body.contains("<main><h1>Hello there</h1><ul><li>First</li><li>Second</li></ul></main>"));
    assert!(body.contains("\"api\":\"/api\""));
    assert_eq!(
        response.headers().get(header::CONTENT_LANGUAGE).unwrap(),
        "en-gb"
    );
}

#[tokio::test]
async fn test_language_policy_switches_locale() {
    let dir = project();
    let server = server(&dir).await;

    let response = server.get("/fr/posts").await;
    response.assert_status_ok();
    assert!(response.text().contains("<h1>Bonjour</h1>"));
    assert_eq!(
        response.headers().get(header::CONTENT_LANGUAGE).unwrap(),
        "fr-fr"
    );

    let response = server.get("/de/posts").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert!(response.text().contains("Not here"));
}

#[tokio::test]
async fn test_json_error_response() {
    let dir = project();
    let server = server(&dir).await;

    let response = server.get("/api/posts/42").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        response.json::<JsonValue>(),
        json!({ "error": "NotFoundError", "message": "Post 42 not found" })
    );
}

#[tokio::test]
async fn test_api_listing_parameters() {
    let dir = project();
    let server = server(&dir).await;

    let response = server
        .get("/api/posts")
        .add_query_param("filter", r#"{"draft":false}"#)
        .add_query_param("page", "3")
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<JsonValue>(),
        json!({
            "filter": { "draft": false },
            "fields": null,
            "options": { "limit": 5, "skip": 10 }
        })
    );
}

#[tokio::test]
async fn test_unknown_route_uses_status_error_page() {
    let dir = project();
    let server = server(&dir).await;

    let response = server.get("/nowhere").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "<div class=\"error\"><h1>Not here</h1></div>");
}

#[tokio::test]
async fn test_missing_page_falls_back_to_default_view() {
    let dir = project();
    let server = server(&dir).await;

    let response = server.get("/about").await;
    response.assert_status_ok();
    assert!(response.text().contains("<p>Blog home</p>"));
}

#[tokio::test]
async fn test_missing_page_and_default_view_is_a_server_error() {
    let dir = project();
    let server = server(&dir).await;

    let response = server.get("/shop").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.text();
    assert!(body.starts_with("<div class=\"error\"><h1>500</h1>"));
    assert!(body.contains("View not found"));
}

#[tokio::test]
async fn test_acl_denies_anonymous_requests() {
    let dir = project();
    let server = server(&dir).await;

    let response = server.get("/admin/posts").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert!(response.text().contains("<h1>401</h1>"));
}

#[tokio::test]
async fn test_panic_is_rendered_as_server_error() {
    let dir = project();
    let server = server(&dir).await;

    let response = server.get("/panic").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().contains("<p>boom</p>"));
}

#[tokio::test]
async fn test_panic_on_json_route_is_json() {
    let dir = project();
    let server = server(&dir).await;

    let response = server.get("/api/panic").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.json::<JsonValue>(),
        json!({ "error": "Error", "message": "boom" })
    );
}

#[tokio::test]
async fn test_head_request_matches_get_route() {
    let dir = project();
    let server = server(&dir).await;

    server.method(Method::HEAD, "/posts").await.assert_status_ok();
}

#[tokio::test]
async fn test_oversize_body_uses_error_page() {
    let dir = project();
    let config =
        Config::from_toml_str(&CONFIG.replace("[server]\n", "[server]\nbody_limit = 16\n"))
            .unwrap();
    let app = Tessera::new(dir.path(), config).manifest(blog_manifest());
    let (router, _state) = app.assemble().await.unwrap();
    let server = TestServer::new(router).unwrap();

    let response = server
        .post("/posts")
        .json(&json!({ "title": "a title well over sixteen bytes" }))
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response.text().contains("<h1>413</h1>"));
}

#[tokio::test]
async fn test_static_files_are_served_first() {
    let dir = project();
    let server = server(&dir).await;

    let response = server.get("/robots.txt").await;
    response.assert_status_ok();
    response.assert_text("User-agent: *");
}

#[tokio::test]
async fn test_flash_message_survives_redirect() {
    let dir = project();
    let server = server(&dir).await;

    let response = server.post("/posts").await;
    response.assert_status(StatusCode::FOUND);

    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::to_string)
        .collect();
    assert_eq!(cookies.len(), 2, "session cookie and its signature");

    let response = server
        .get("/posts")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&cookies.join("; ")).unwrap(),
        )
        .await;
    response.assert_status_ok();
    assert!(response.text().contains("<div class=\"flash\">Created</div>"));
}

#[tokio::test]
async fn test_duplicate_acl_resource_aborts_start() {
    let dir = project();
    write(
        dir.path(),
        "app/modules/admin/module.toml",
        "[acl]\nresources = [\"post.admin\"]\n",
    );

    let config = Config::from_toml_str(CONFIG).unwrap();
    let app = Tessera::new(dir.path(), config).manifest(blog_manifest());

    match app.start().await {
        Err(BootError::DuplicateAclResource {
            resource,
            module,
            owner,
        }) => {
            assert_eq!(resource, "post.admin");
            assert_eq!(module, "blog");
            assert_eq!(owner, "admin");
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("start should fail"),
    }
    assert_eq!(app.lifecycle(), Lifecycle::Failed);
}

#[tokio::test]
async fn test_session_store_without_destroy_aborts_start() {
    let dir = project();
    let store = FnSessionStore::new()
        .on_get(|_key| async { Ok(None) })
        .on_set(|_key, _value, _max_age| async { Ok(()) });

    let config = Config::from_toml_str(CONFIG).unwrap();
    let app = Tessera::new(dir.path(), config).session_store(Arc::new(store));

    match app.start().await {
        Err(BootError::MissingContractMember { member, .. }) => assert_eq!(member, "destroy"),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("start should fail"),
    }
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let dir = project();
    let config = Config::from_toml_str(CONFIG).unwrap();
    let app = Tessera::new(dir.path(), config).manifest(blog_manifest());

    let running = app.start().await.unwrap();
    assert_eq!(app.lifecycle(), Lifecycle::Running);
    assert_ne!(running.local_addr().port(), 0);
    assert!(running.state().routes.len() >= 7);

    assert!(matches!(app.start().await, Err(BootError::AlreadyStarted)));
    assert_eq!(app.lifecycle(), Lifecycle::Running);

    running.shutdown().await;
}

#[tokio::test]
async fn test_unknown_driver_aborts_start() {
    let dir = project();
    let config = Config::from_toml_str(&format!(
        "{}\n[db.connections.default]\ndriver = \"mongo\"\ndatabase = \"blog\"\n",
        CONFIG
    ))
    .unwrap();
    let app = Tessera::new(dir.path(), config);

    assert!(matches!(
        app.start().await,
        Err(BootError::UnknownDriver { .. })
    ));
}
