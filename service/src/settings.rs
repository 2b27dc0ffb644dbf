//! Two-tier scaffold settings: user overrides over built-in defaults.
//!
//! Lookup order for a name is the user value (if present and not null), then
//! the default value, then a [`SettingsError::Missing`] naming the setting.
//!
//! Known limitation: a user value of `null` cannot be told apart from an
//! unset one, so a deliberate `null` override silently falls back to the
//! default.

use std::path::Path;

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

/// Length of the generated default secret key in bytes.
pub const SECRET_KEY_LENGTH: usize = 64;

/// Errors raised while loading or resolving settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Setting \"{name}\" does not exist, please define it.")]
    Missing { name: String },

    #[error("Setting \"{name}\" has an invalid value: {source}")]
    Invalid {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("settings file {0} does not exist")]
    SourceMissing(String),

    #[error("failed to read settings file: {0}")]
    Source(#[from] Box<figment::Error>),

    #[error("failed to build default settings: {0}")]
    Defaults(#[from] serde_json::Error),
}

impl From<figment::Error> for SettingsError {
    fn from(err: figment::Error) -> Self {
        Self::Source(Box::new(err))
    }
}

/// `Report-To` group descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReportTo {
    pub group: String,
    /// Seconds the browser remembers the endpoint group (126 days by default).
    #[serde(alias = "max-age")]
    pub max_age: u64,
    pub endpoints: Vec<String>,
}

/// Built-in defaults namespace.
///
/// Covers the CSP, Report-To and CSRF settings only. There is no
/// `cloud_tasks_body` default since this service does not enqueue tasks.
#[derive(Debug, Clone, Serialize)]
pub struct DefaultSettings {
    pub csp_config: std::collections::BTreeMap<String, String>,
    pub report_to_header: ReportTo,
    pub non_xsrf_protected_methods: Vec<String>,
    pub xsrf_time_limit: u64,
    pub xsrf_exempt_paths: Vec<String>,
    pub secret_key: String,
}

impl DefaultSettings {
    /// Build the defaults. The secret key is random per process.
    #[must_use]
    pub fn new() -> Self {
        let csp_config = [
            ("base-uri", "'self'"),
            ("object-src", "'none'"),
            (
                "script-src",
                "'nonce-{nonce}' 'strict-dynamic' 'unsafe-inline' https: http:",
            ),
            ("report-uri", "/csp/"),
            ("report-to", "csp-endpoint"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            csp_config,
            report_to_header: ReportTo {
                group: "csp-endpoint".to_string(),
                max_age: 10_886_400,
                endpoints: vec!["/csp/".to_string()],
            },
            non_xsrf_protected_methods: ["options", "head", "get"]
                .into_iter()
                .map(String::from)
                .collect(),
            xsrf_time_limit: 86_400,
            xsrf_exempt_paths: vec!["/csp/".to_string()],
            secret_key: scaffold_crypto::random_token(SECRET_KEY_LENGTH),
        }
    }

    /// Convert into a name -> value namespace.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn into_namespace(self) -> Result<Map<String, Value>, SettingsError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved settings overlay. Built once at start-up and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    user: Option<Map<String, Value>>,
    defaults: Map<String, Value>,
}

impl Settings {
    #[must_use]
    pub const fn new(user: Option<Map<String, Value>>, defaults: Map<String, Value>) -> Self {
        Self { user, defaults }
    }

    /// Built-in defaults with no user overrides.
    ///
    /// # Errors
    /// Returns an error if the defaults cannot be serialized.
    pub fn defaults_only() -> Result<Self, SettingsError> {
        Ok(Self::new(None, DefaultSettings::new().into_namespace()?))
    }

    /// Load defaults plus, if `user_file` is given, a YAML overrides file.
    ///
    /// # Errors
    /// Returns an error if the file is configured but missing or unreadable.
    pub fn load(user_file: Option<&Path>) -> Result<Self, SettingsError> {
        let defaults = DefaultSettings::new().into_namespace()?;
        let Some(path) = user_file else {
            return Ok(Self::new(None, defaults));
        };

        if !path.exists() {
            return Err(SettingsError::SourceMissing(path.display().to_string()));
        }

        let user: Map<String, Value> = Figment::from(Yaml::file(path)).extract()?;
        tracing::info!(
            path = %path.display(),
            overrides = user.len(),
            "loaded user settings"
        );
        Ok(Self::new(Some(user), defaults))
    }

    /// Resolve a setting by name.
    ///
    /// # Errors
    /// Returns `SettingsError::Missing` if neither namespace defines `name`.
    pub fn get(&self, name: &str) -> Result<&Value, SettingsError> {
        if let Some(value) = self.user.as_ref().and_then(|user| user.get(name)) {
            if !value.is_null() {
                return Ok(value);
            }
        }

        self.defaults
            .get(name)
            .ok_or_else(|| SettingsError::Missing {
                name: name.to_string(),
            })
    }

    /// Resolve a setting and deserialize it into `T`.
    ///
    /// # Errors
    /// Returns `Missing` as for [`Self::get`] or `Invalid` if the value does
    /// not have the expected shape.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, SettingsError> {
        let value = self.get(name)?;
        T::deserialize(value).map_err(|source| SettingsError::Invalid {
            name: name.to_string(),
            source,
        })
    }
}
