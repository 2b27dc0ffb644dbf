//! Application state and router assembly shared by `main` and tests.

use std::{path::PathBuf, sync::Arc};

use axum::{
    http::{HeaderValue, Method},
    middleware, Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{
    config::{Config, CorsConfig},
    csp::{csp_middleware, CspError, CspPolicy},
    csrf::{csrf_middleware, CsrfConfigError, CsrfProtect},
    http::{self, security_headers_middleware, SecurityHeaders},
    settings::Settings,
    static_files::StaticPath,
    templates::Templates,
};

/// Errors building the application state at start-up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("CSP configuration: {0}")]
    Csp(#[from] CspError),
    #[error("CSRF configuration: {0}")]
    Csrf(#[from] CsrfConfigError),
    #[error("templates: {0}")]
    Templates(#[from] Box<handlebars::TemplateError>),
}

/// Everything request handlers need, built once at start-up and shared
/// read-only through an `Extension`.
#[derive(Debug)]
pub struct AppState {
    pub csp: CspPolicy,
    pub csrf: Arc<CsrfProtect>,
    pub security_headers: SecurityHeaders,
    pub templates: Templates,
    pub static_path: StaticPath,
    pub readme_path: PathBuf,
}

impl AppState {
    /// Resolve the scaffold settings into ready-to-use components.
    ///
    /// # Errors
    /// Returns an error if a setting is missing or malformed, or a template
    /// fails to parse.
    pub fn new(
        config: &Config,
        settings: &Settings,
        static_path: StaticPath,
    ) -> Result<Self, StartupError> {
        Ok(Self {
            csp: CspPolicy::from_settings(settings, config.csp.nonce_mode)?,
            csrf: Arc::new(CsrfProtect::from_settings(settings)?),
            security_headers: SecurityHeaders::from_config(&config.security_headers),
            templates: Templates::new()?,
            static_path,
            readme_path: config.app.readme_path.clone(),
        })
    }
}

/// Build the CORS layer from configuration.
#[must_use]
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = &config.allowed_origins;
    let allow_origin: AllowOrigin = if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow any origin - not recommended for production");
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(allow_origin)
}

/// Assemble routes, static files and middleware.
///
/// Layer order, outermost first: state extension, tracing, CORS, static
/// security headers, CSP, CSRF. CSRF rejections therefore still carry the
/// security and CSP headers.
pub fn build_app(state: Arc<AppState>, config: &Config) -> Router {
    let static_service = ServeDir::new(&config.app.static_dir);

    http::router()
        .nest_service(&state.static_path.url_path(), static_service)
        .layer(middleware::from_fn(csrf_middleware))
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(Extension(state))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.cors)),
        )
}
