//! CSRF protection using signed double-submit tokens.
//!
//! A random raw token lives in the `ss_csrf` cookie. Forms carry a signed
//! token `<timestamp>.<hmac>` where the HMAC covers the raw token and the
//! timestamp, so a token is bound to the visitor's cookie and expires after
//! `xsrf_time_limit` seconds. Methods listed in `non_xsrf_protected_methods`
//! and paths in `xsrf_exempt_paths` are not checked.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    extract::{Form, FromRequest, Request},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use chrono::Utc;
use scaffold_crypto::{SignatureError, TokenSigner};

use crate::{settings::Settings, settings::SettingsError, AppState};

/// Cookie holding the raw token.
pub const CSRF_COOKIE: &str = "ss_csrf";

/// Form field carrying the signed token.
pub const CSRF_FIELD: &str = "csrf_token";

/// Header alternative to the form field, for scripts.
pub const CSRF_HEADER: &str = "x-csrftoken";

/// Random bytes in a raw token.
const RAW_TOKEN_LENGTH: usize = 32;

/// Largest request body buffered while looking for the form field.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// Reasons a protected request is rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CsrfError {
    #[error("The CSRF session token is missing.")]
    MissingCookie,
    #[error("The CSRF token is missing.")]
    MissingToken,
    #[error("The CSRF token is malformed.")]
    Malformed,
    #[error("The CSRF token has expired.")]
    Expired,
    #[error("The CSRF tokens do not match.")]
    Invalid,
    #[error("The request body could not be read.")]
    Body,
}

impl IntoResponse for CsrfError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// CSRF policy resolved from settings at start-up.
#[derive(Debug, Clone)]
pub struct CsrfProtect {
    signer: TokenSigner,
    exempt_methods: Vec<String>,
    exempt_paths: Vec<String>,
    time_limit: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum CsrfConfigError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("invalid secret_key: {0}")]
    SecretKey(#[from] SignatureError),
}

impl CsrfProtect {
    /// Build from the `secret_key`, `non_xsrf_protected_methods`,
    /// `xsrf_exempt_paths` and `xsrf_time_limit` settings.
    ///
    /// # Errors
    /// Returns an error if a setting is missing, malformed, or the key is empty.
    pub fn from_settings(settings: &Settings) -> Result<Self, CsrfConfigError> {
        let secret: String = settings.get_as("secret_key")?;
        let methods: Vec<String> = settings.get_as("non_xsrf_protected_methods")?;
        let exempt_paths: Vec<String> = settings.get_as("xsrf_exempt_paths")?;
        let time_limit: u64 = settings.get_as("xsrf_time_limit")?;

        Ok(Self {
            signer: TokenSigner::new(secret.as_bytes())?,
            exempt_methods: methods.iter().map(|m| m.to_ascii_uppercase()).collect(),
            exempt_paths,
            time_limit: i64::try_from(time_limit).unwrap_or(i64::MAX),
        })
    }

    fn is_exempt(&self, method: &str, path: &str) -> bool {
        self.exempt_methods.iter().any(|m| m == method)
            || self.exempt_paths.iter().any(|p| p == path)
    }

    /// Signed form token for `raw`, stamped with `issued_at` (unix seconds).
    #[must_use]
    pub fn sign_at(&self, raw: &str, issued_at: i64) -> String {
        let signature = self.signer.sign(signed_message(raw, issued_at).as_bytes());
        format!("{issued_at}.{signature}")
    }

    /// Check a submitted token against the cookie's raw token at time `now`.
    ///
    /// # Errors
    /// Returns the reason the token is not acceptable.
    pub fn validate_at(&self, raw: &str, submitted: &str, now: i64) -> Result<(), CsrfError> {
        let (issued_at, signature) = submitted.split_once('.').ok_or(CsrfError::Malformed)?;
        let issued_at: i64 = issued_at.parse().map_err(|_| CsrfError::Malformed)?;

        self.signer
            .verify(signed_message(raw, issued_at).as_bytes(), signature)
            .map_err(|e| match e {
                SignatureError::Malformed => CsrfError::Malformed,
                SignatureError::EmptyKey | SignatureError::Mismatch => CsrfError::Invalid,
            })?;

        if now.saturating_sub(issued_at) > self.time_limit {
            return Err(CsrfError::Expired);
        }
        Ok(())
    }
}

fn signed_message(raw: &str, issued_at: i64) -> String {
    format!("{raw}.{issued_at}")
}

/// Per-request CSRF context exposed to handlers via request extensions.
#[derive(Debug, Clone)]
pub struct CsrfToken {
    raw: String,
    protect: Arc<CsrfProtect>,
}

impl CsrfToken {
    /// Signed token to embed in a form's `csrf_token` field.
    #[must_use]
    pub fn form_token(&self) -> String {
        self.protect.sign_at(&self.raw, Utc::now().timestamp())
    }
}

/// Extract a cookie value from the request's `Cookie` headers.
#[must_use]
pub fn cookie_value(headers: &axum::http::HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Read the submitted token from the header, or from the form body.
///
/// The body is buffered and put back so handlers can still extract the form.
async fn submitted_token(request: Request) -> Result<(Request, Option<String>), CsrfError> {
    if let Some(token) = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        let token = token.to_string();
        return Ok((request, Some(token)));
    }

    if !is_form(&request) {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|_| CsrfError::Body)?;

    let probe = Request::builder()
        .method(Method::POST)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(bytes.clone()))
        .map_err(|_| CsrfError::Body)?;
    let token = Form::<HashMap<String, String>>::from_request(probe, &())
        .await
        .ok()
        .and_then(|Form(mut fields)| fields.remove(CSRF_FIELD));

    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

/// Middleware enforcing CSRF checks and issuing the raw-token cookie.
pub async fn csrf_middleware(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let protect = &state.csrf;
    let existing = cookie_value(request.headers(), CSRF_COOKIE);
    let method = request.method().as_str().to_ascii_uppercase();
    let path = request.uri().path().to_string();

    let mut request = request;
    if !protect.is_exempt(&method, &path) {
        let Some(raw) = existing.as_deref() else {
            tracing::warn!(%method, %path, "CSRF check failed: no session token");
            return CsrfError::MissingCookie.into_response();
        };

        let (rebuilt, submitted) = match submitted_token(request).await {
            Ok(found) => found,
            Err(err) => return err.into_response(),
        };
        request = rebuilt;

        let Some(submitted) = submitted else {
            tracing::warn!(%method, %path, "CSRF check failed: token missing");
            return CsrfError::MissingToken.into_response();
        };

        if let Err(err) = protect.validate_at(raw, &submitted, Utc::now().timestamp()) {
            tracing::warn!(%method, %path, reason = %err, "CSRF check failed");
            return err.into_response();
        }
    }

    let (raw, issued) = match existing {
        Some(raw) => (raw, false),
        None => (scaffold_crypto::random_token(RAW_TOKEN_LENGTH), true),
    };
    request.extensions_mut().insert(CsrfToken {
        raw: raw.clone(),
        protect: Arc::clone(protect),
    });

    let mut response = next.run(request).await;
    if issued {
        let cookie = format!("{CSRF_COOKIE}={raw}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}
