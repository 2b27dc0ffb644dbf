//! Test app builder that mirrors main.rs wiring with injectable settings.
//!
//! # Usage
//!
//! ```ignore
//! use crate::common::app_builder::TestAppBuilder;
//!
//! #[tokio::test]
//! async fn test_with_full_app() {
//!     let app = TestAppBuilder::new()
//!         .with_nonce_mode(NonceMode::PerProcess)
//!         .with_setting("xsrf_time_limit", json!(60))
//!         .build();
//!
//!     // Use app.oneshot(...) to send requests
//! }
//! ```

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use secure_scaffold::{
    app::{build_app, AppState},
    config::{Config, NonceMode, SecurityHeadersConfig},
    settings::{DefaultSettings, Settings},
    static_files::StaticPath,
};
use serde_json::{Map, Value};

/// Path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures")).join(name)
}

/// Builder for test applications that mirrors main.rs wiring.
pub struct TestAppBuilder {
    config: Config,
    user_settings: Map<String, Value>,
    version: Option<String>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppBuilder {
    /// Default configuration, fixture README and static dir, dev static path.
    #[must_use]
    pub fn new() -> Self {
        let mut config = Config::default();
        config.app.readme_path = fixture("README.md");
        config.app.static_dir = fixture("static");
        Self {
            config,
            user_settings: Map::new(),
            version: None,
        }
    }

    /// Override a scaffold setting in the user namespace.
    #[must_use]
    pub fn with_setting(mut self, name: &str, value: Value) -> Self {
        self.user_settings.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_nonce_mode(mut self, mode: NonceMode) -> Self {
        self.config.csp.nonce_mode = mode;
        self
    }

    #[must_use]
    pub fn with_security_headers(mut self, config: SecurityHeadersConfig) -> Self {
        self.config.security_headers = config;
        self
    }

    #[must_use]
    pub fn with_cors(mut self, origins: &[&str]) -> Self {
        self.config.cors.allowed_origins = origins.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_readme(mut self, path: PathBuf) -> Self {
        self.config.app.readme_path = path;
        self
    }

    /// Simulate a deployed version for the static path.
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Build the Axum router with the same layers as production.
    #[allow(clippy::expect_used)]
    pub fn build(self) -> Router {
        let defaults = DefaultSettings::new()
            .into_namespace()
            .expect("default settings");
        let user = (!self.user_settings.is_empty()).then_some(self.user_settings);
        let settings = Settings::new(user, defaults);

        let version = self.version;
        let static_path = StaticPath::from_lookup(|_| version.clone());

        let state = AppState::new(&self.config, &settings, static_path).expect("app state");
        build_app(Arc::new(state), &self.config)
    }
}
