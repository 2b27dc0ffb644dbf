//! Demo page handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Form,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    csp::CspNonce, csrf::CsrfToken, error::AppError, markdown::render_markdown,
    templates::PageContext, AppState,
};

/// All demo routes. Expects `Extension<Arc<AppState>>` and the CSP/CSRF
/// middleware to be layered on top (see [`crate::app::build_app`]).
pub fn router() -> Router {
    Router::new()
        .route("/", get(about))
        .route("/csrf", get(csrf_form).post(csrf_submit))
        .route("/headers", get(headers))
        .route("/csp/", post(csp_report))
        .route("/health", get(health_check))
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

fn render<T: Serialize>(
    state: &AppState,
    name: &str,
    page_title: &str,
    nonce: &CspNonce,
    page: T,
) -> Result<Html<String>, AppError> {
    let static_url_path = state.static_path.url_path();
    let context = PageContext {
        page_title,
        csp_nonce: nonce.as_str(),
        static_url_path: &static_url_path,
        page,
    };
    Ok(Html(state.templates.render(name, &context)?))
}

#[derive(Serialize)]
struct AboutPage {
    readme: String,
}

/// One-page introduction rendered from the README.
async fn about(
    Extension(state): Extension<Arc<AppState>>,
    Extension(nonce): Extension<CspNonce>,
) -> Result<Html<String>, AppError> {
    let path = &state.readme_path;
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AppError::Io {
            path: path.clone(),
            source,
        })?;

    let page = AboutPage {
        readme: render_markdown(&source),
    };
    render(&state, "about", "Secure Scaffold", &nonce, page)
}

#[derive(Serialize)]
struct CsrfPage {
    message: String,
    csrf_token: String,
}

#[derive(Debug, Deserialize)]
struct GreetingForm {
    #[serde(rename = "first-name", default)]
    first_name: Option<String>,
}

/// Empty CSRF-protected form.
async fn csrf_form(
    Extension(state): Extension<Arc<AppState>>,
    Extension(nonce): Extension<CspNonce>,
    Extension(token): Extension<CsrfToken>,
) -> Result<Html<String>, AppError> {
    let page = CsrfPage {
        message: String::new(),
        csrf_token: token.form_token(),
    };
    render(&state, "csrf", "CSRF protection", &nonce, page)
}

/// Greets the submitter. Only reached once the CSRF middleware accepted
/// the token.
async fn csrf_submit(
    Extension(state): Extension<Arc<AppState>>,
    Extension(nonce): Extension<CspNonce>,
    Extension(token): Extension<CsrfToken>,
    Form(form): Form<GreetingForm>,
) -> Result<Html<String>, AppError> {
    let message = match form.first_name.as_deref() {
        Some(name) if !name.is_empty() => format!("Hello {name}!"),
        _ => String::new(),
    };
    let page = CsrfPage {
        message,
        csrf_token: token.form_token(),
    };
    render(&state, "csrf", "CSRF protection", &nonce, page)
}

#[derive(Serialize)]
struct HeaderRow {
    name: String,
    value: String,
}

#[derive(Serialize)]
struct HeadersPage {
    headers: Vec<HeaderRow>,
}

/// Echo the request headers.
async fn headers(
    Extension(state): Extension<Arc<AppState>>,
    Extension(nonce): Extension<CspNonce>,
    request_headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let headers = request_headers
        .iter()
        .map(|(name, value)| HeaderRow {
            name: name.as_str().to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
        .collect();
    render(
        &state,
        "headers",
        "App Engine request headers",
        &nonce,
        HeadersPage { headers },
    )
}

/// Sink for browser CSP violation reports.
async fn csp_report(body: Bytes) -> StatusCode {
    tracing::warn!(
        report = %String::from_utf8_lossy(&body),
        "CSP violation reported"
    );
    StatusCode::NO_CONTENT
}
