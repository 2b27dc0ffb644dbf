//! Common test utilities for integration tests.
//!
//! - [`app_builder::TestAppBuilder`] - Build test Axum apps that mirror main.rs wiring
//! - [`send`], [`body_text`] - request helpers around `tower::ServiceExt::oneshot`
//! - [`csrf_session`] - fetch a CSRF cookie and form token the way a browser would

pub mod app_builder;

use axum::{
    body::{to_bytes, Body},
    http::{header::SET_COOKIE, Request, Response},
    Router,
};
use tower::ServiceExt;

/// Send one request through a clone of the app.
#[allow(clippy::expect_used)]
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("response")
}

/// GET `uri` with no extra headers.
#[allow(clippy::expect_used)]
pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(
        app,
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    )
    .await
}

#[allow(clippy::expect_used)]
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Pull `name=value` out of a `Set-Cookie` header.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// Value of the hidden `csrf_token` input in a rendered form.
pub fn form_token(html: &str) -> Option<String> {
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')? + start;
    Some(html[start..end].to_string())
}

/// Load the CSRF form and return `(cookie pair, form token)`.
#[allow(clippy::expect_used)]
pub async fn csrf_session(app: &Router) -> (String, String) {
    let response = get(app, "/csrf").await;
    let cookie = set_cookie(&response, "ss_csrf").expect("csrf cookie issued");
    let html = body_text(response).await;
    let token = form_token(&html).expect("csrf token in form");
    (cookie, token)
}
