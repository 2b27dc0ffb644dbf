use std::env;

/// Environment variable carrying the deployed version.
pub const VERSION_VAR: &str = "GAE_VERSION";

/// Version value (and fingerprint) used for local development.
pub const DEV_VERSION: &str = "dev";

/// Hex characters kept from the version digest.
pub const FINGERPRINT_LENGTH: usize = 6;

/// Version-specific URL prefix for static assets.
///
/// Every deployment gets a new prefix, so assets can be cached aggressively
/// while a new deployment still reaches clients. Local development always
/// uses `/static/dev`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticPath {
    fingerprint: String,
}

impl StaticPath {
    /// Construct from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construct using a custom lookup function (useful for tests).
    pub fn from_lookup<F>(mut lookup: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let version = lookup(VERSION_VAR).unwrap_or_else(|| DEV_VERSION.to_string());
        Self::for_version(&version)
    }

    /// Fingerprint a version string.
    ///
    /// Non-ASCII characters are dropped before hashing. Six hex characters
    /// keep three bytes of the digest; collisions between deployments are
    /// tolerated.
    #[must_use]
    pub fn for_version(version: &str) -> Self {
        if version == DEV_VERSION {
            return Self {
                fingerprint: DEV_VERSION.to_string(),
            };
        }

        let ascii: String = version.chars().filter(char::is_ascii).collect();
        Self {
            fingerprint: scaffold_crypto::short_hex_digest(ascii.as_bytes(), FINGERPRINT_LENGTH),
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// `/static/<fingerprint>`
    #[must_use]
    pub fn url_path(&self) -> String {
        format!("/static/{}", self.fingerprint)
    }
}
