//! Content-Security-Policy nonce generation and header construction.
//!
//! The policy directives come from the `csp_config` setting; any `{nonce}`
//! placeholder in a directive value is replaced with the nonce chosen for the
//! response. With [`NonceMode::PerProcess`] the same nonce is reused for every
//! response, which defeats the purpose of CSP nonces: an attacker who reads a
//! nonce once can reuse it in an injected script. Use it only to reproduce
//! legacy behaviour.

use std::{collections::BTreeMap, fmt, sync::Arc};

use axum::{
    extract::Request,
    http::{header::CONTENT_SECURITY_POLICY, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
    Extension,
};
use serde_json::json;

use crate::{
    config::NonceMode,
    settings::{ReportTo, Settings, SettingsError},
    AppState,
};

/// Number of random bytes in a nonce.
pub const NONCE_LENGTH: usize = 16;

/// Placeholder substituted with the nonce in directive values.
pub const NONCE_PLACEHOLDER: &str = "{nonce}";

/// `Report-To` response header.
pub static REPORT_TO: HeaderName = HeaderName::from_static("report-to");

/// A CSP nonce: 16 random bytes, base64url without `=` padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspNonce(String);

impl CspNonce {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CspNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a fresh nonce from the OS CSPRNG.
#[must_use]
pub fn generate_nonce() -> CspNonce {
    CspNonce(scaffold_crypto::random_token(NONCE_LENGTH))
}

/// Errors building the policy from settings.
#[derive(Debug, thiserror::Error)]
pub enum CspError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("CSP directive '{0}' produces an invalid header value")]
    InvalidDirective(String),
}

/// Immutable CSP configuration shared by all requests.
#[derive(Debug, Clone)]
pub struct CspPolicy {
    directives: BTreeMap<String, String>,
    report_to_header: HeaderValue,
    mode: NonceMode,
    process_nonce: Option<CspNonce>,
}

impl CspPolicy {
    /// Build the policy from `csp_config` and `report_to_header`.
    ///
    /// In [`NonceMode::PerProcess`] the single nonce is generated here.
    ///
    /// # Errors
    /// Returns an error if either setting is missing or malformed, or a
    /// directive cannot be carried in an HTTP header.
    pub fn from_settings(settings: &Settings, mode: NonceMode) -> Result<Self, CspError> {
        let directives: BTreeMap<String, String> = settings.get_as("csp_config")?;
        let report_to: ReportTo = settings.get_as("report_to_header")?;

        // A real nonce, so the rendered header is checked before any request.
        let sample = generate_nonce();
        for (name, value) in &directives {
            let rendered = format!("{name} {}", value.replace(NONCE_PLACEHOLDER, sample.as_str()));
            if HeaderValue::from_str(&rendered).is_err() {
                return Err(CspError::InvalidDirective(name.clone()));
            }
        }

        let report_to_header = HeaderValue::from_str(&render_report_to(&report_to))
            .map_err(|_| CspError::InvalidDirective("report_to_header".to_string()))?;

        let process_nonce = match mode {
            NonceMode::PerProcess => {
                tracing::warn!(
                    "CSP nonce_mode is per_process: one nonce is reused for every response, \
                     which lets injected scripts bypass the policy"
                );
                Some(generate_nonce())
            }
            NonceMode::PerRequest => None,
        };

        Ok(Self {
            directives,
            report_to_header,
            mode,
            process_nonce,
        })
    }

    #[must_use]
    pub const fn mode(&self) -> NonceMode {
        self.mode
    }

    /// Nonce to use for the next response.
    #[must_use]
    pub fn nonce_for_request(&self) -> CspNonce {
        match &self.process_nonce {
            Some(nonce) => nonce.clone(),
            None => generate_nonce(),
        }
    }

    /// Render the policy with `nonce` substituted, directives in name order.
    #[must_use]
    pub fn render(&self, nonce: &CspNonce) -> String {
        self.directives
            .iter()
            .map(|(name, value)| {
                format!("{name} {}", value.replace(NONCE_PLACEHOLDER, nonce.as_str()))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Header value for the policy. Directives were validated at build time.
    #[must_use]
    pub fn header_value(&self, nonce: &CspNonce) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.render(nonce)).ok()
    }

    #[must_use]
    pub fn report_to_value(&self) -> HeaderValue {
        self.report_to_header.clone()
    }
}

fn render_report_to(report_to: &ReportTo) -> String {
    let endpoints: Vec<_> = report_to
        .endpoints
        .iter()
        .map(|url| json!({ "url": url }))
        .collect();
    json!({
        "group": report_to.group,
        "max_age": report_to.max_age,
        "endpoints": endpoints,
    })
    .to_string()
}

/// Middleware that picks the response nonce, exposes it to handlers through
/// request extensions, and sets the CSP and `Report-To` headers.
pub async fn csp_middleware(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let nonce = state.csp.nonce_for_request();
    request.extensions_mut().insert(nonce.clone());

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Some(value) = state.csp.header_value(&nonce) {
        headers.insert(CONTENT_SECURITY_POLICY, value);
    }
    headers.insert(REPORT_TO.clone(), state.csp.report_to_value());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    fn policy(mode: NonceMode) -> CspPolicy {
        let settings = Settings::defaults_only().expect("defaults");
        CspPolicy::from_settings(&settings, mode).expect("policy")
    }

    #[test]
    fn nonce_is_unpadded_and_sixteen_bytes() {
        let nonce = generate_nonce();
        assert!(!nonce.as_str().contains('='));
        let bytes = scaffold_crypto::decode_base64url(nonce.as_str()).expect("decode");
        assert_eq!(bytes.len(), NONCE_LENGTH);
    }

    #[test]
    fn nonce_is_embedded_in_script_src() {
        let policy = policy(NonceMode::PerRequest);
        let nonce = generate_nonce();
        let rendered = policy.render(&nonce);
        assert!(rendered.contains(&format!(
            "script-src 'nonce-{nonce}' 'strict-dynamic' 'unsafe-inline' https: http:"
        )));
        assert!(rendered.contains("object-src 'none'"));
        assert!(rendered.contains("base-uri 'self'"));
        assert!(rendered.contains("report-uri /csp/"));
        assert!(rendered.contains("report-to csp-endpoint"));
        assert!(!rendered.contains(NONCE_PLACEHOLDER));
    }

    #[test]
    fn directives_render_in_name_order() {
        let policy = policy(NonceMode::PerRequest);
        let rendered = policy.render(&generate_nonce());
        let names: Vec<&str> = rendered
            .split("; ")
            .filter_map(|d| d.split(' ').next())
            .collect();
        assert_eq!(
            names,
            ["base-uri", "object-src", "report-to", "report-uri", "script-src"]
        );
    }

    #[test]
    fn per_request_mode_issues_fresh_nonces() {
        let policy = policy(NonceMode::PerRequest);
        assert_ne!(policy.nonce_for_request(), policy.nonce_for_request());
    }

    #[test]
    fn per_process_mode_reuses_one_nonce() {
        let policy = policy(NonceMode::PerProcess);
        assert_eq!(policy.nonce_for_request(), policy.nonce_for_request());
    }

    #[test]
    fn report_to_header_is_json_group() {
        let policy = policy(NonceMode::PerRequest);
        let value: Value =
            serde_json::from_str(policy.report_to_value().to_str().expect("ascii")).expect("json");
        assert_eq!(value["group"], "csp-endpoint");
        assert_eq!(value["max_age"], 10_886_400);
        assert_eq!(value["endpoints"][0]["url"], "/csp/");
    }

    #[test]
    fn user_directives_replace_defaults() {
        let mut user = Map::new();
        user.insert(
            "csp_config".to_string(),
            serde_json::json!({"default-src": "'self'", "script-src": "'nonce-{nonce}'"}),
        );
        let defaults = crate::settings::DefaultSettings::new()
            .into_namespace()
            .expect("defaults");
        let settings = Settings::new(Some(user), defaults);
        let policy = CspPolicy::from_settings(&settings, NonceMode::PerRequest).expect("policy");
        let nonce = generate_nonce();
        assert_eq!(
            policy.render(&nonce),
            format!("default-src 'self'; script-src 'nonce-{nonce}'")
        );
    }

    #[test]
    fn every_issued_nonce_yields_a_valid_header() {
        let policy = policy(NonceMode::PerRequest);
        for _ in 0..32 {
            let nonce = policy.nonce_for_request();
            let value = policy.header_value(&nonce).expect("header value");
            assert!(value.to_str().expect("ascii").contains(nonce.as_str()));
        }
    }

    #[test]
    fn rejects_directive_that_cannot_be_a_header() {
        let mut user = Map::new();
        user.insert(
            "csp_config".to_string(),
            serde_json::json!({"script-src": "'self'\nX-Injected: yes"}),
        );
        let defaults = crate::settings::DefaultSettings::new()
            .into_namespace()
            .expect("defaults");
        let settings = Settings::new(Some(user), defaults);
        let result = CspPolicy::from_settings(&settings, NonceMode::PerRequest);
        assert!(matches!(result, Err(CspError::InvalidDirective(_))));
    }
}
