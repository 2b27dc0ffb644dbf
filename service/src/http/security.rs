//! Static security headers added to every response.
//!
//! The Content-Security-Policy and Report-To headers are handled by
//! [`crate::csp::csp_middleware`] because they depend on the request nonce.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{
        header::{
            REFERRER_POLICY, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
            X_XSS_PROTECTION,
        },
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
    Extension,
};

use crate::{config::SecurityHeadersConfig, AppState};

/// Pre-built header set, computed once from configuration.
#[derive(Debug, Clone, Default)]
pub struct SecurityHeaders {
    headers: HeaderMap,
}

impl SecurityHeaders {
    /// Build the header set. Returns an empty set when disabled.
    #[must_use]
    pub fn from_config(config: &SecurityHeadersConfig) -> Self {
        let mut headers = HeaderMap::new();
        if !config.enabled {
            return Self { headers };
        }

        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));

        let frame_options = config.frame_options.to_uppercase();
        if let Ok(value) = HeaderValue::from_str(&frame_options) {
            headers.insert(X_FRAME_OPTIONS, value);
        }
        if let Ok(value) = HeaderValue::from_str(&config.referrer_policy) {
            headers.insert(REFERRER_POLICY, value);
        }

        // HSTS only makes sense behind HTTPS
        if config.hsts_enabled {
            let mut hsts = format!("max-age={}", config.hsts_max_age);
            if config.hsts_include_subdomains {
                hsts.push_str("; includeSubDomains");
            }
            if let Ok(value) = HeaderValue::from_str(&hsts) {
                headers.insert(STRICT_TRANSPORT_SECURITY, value);
            }
        }

        Self { headers }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Copy the header set into `target`, replacing existing values.
    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }
}

/// Middleware adding the configured static security headers.
pub async fn security_headers_middleware(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    state.security_headers.apply(response.headers_mut());
    response
}
