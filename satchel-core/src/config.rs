//! Session configuration.

use crate::codec::{DEFAULT_MAX_LENGTH, DEFAULT_NAME};
use crate::error::{SessionError, SessionResult};
use crate::options::{Options, SameSite};
use std::time::Duration;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cookie name; tokens are bound to it
    pub name: String,
    /// Cookie attributes and backend expiry applied to the store
    pub options: Options,
    /// Reject tokens issued longer ago than this
    pub token_max_age: Option<Duration>,
    /// Maximum encoded token length
    pub max_token_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            options: Options::default(),
            token_max_age: None,
            max_token_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl SessionConfig {
    /// Create a configuration for the given cookie name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `SESSION_NAME`, `SESSION_PATH`, `SESSION_DOMAIN`,
    /// `SESSION_MAX_AGE`, `SESSION_SECURE`, `SESSION_HTTP_ONLY`,
    /// `SESSION_SAME_SITE` and `SESSION_TOKEN_MAX_AGE` (seconds). Unset
    /// variables keep their defaults; malformed ones are an error.
    pub fn from_env() -> SessionResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SessionResult<Self> {
        let mut config = Self::default();

        if let Some(name) = lookup("SESSION_NAME") {
            config.name = name;
        }

        if let Some(path) = lookup("SESSION_PATH") {
            config.options.path = path;
        }

        if let Some(domain) = lookup("SESSION_DOMAIN") {
            config.options.domain = Some(domain);
        }

        if let Some(max_age) = lookup("SESSION_MAX_AGE") {
            config.options.max_age = parse("SESSION_MAX_AGE", &max_age)?;
        }

        if let Some(secure) = lookup("SESSION_SECURE") {
            config.options.secure = parse_flag(&secure);
        }

        if let Some(http_only) = lookup("SESSION_HTTP_ONLY") {
            config.options.http_only = parse_flag(&http_only);
        }

        if let Some(same_site) = lookup("SESSION_SAME_SITE") {
            config.options.same_site = SameSite::parse(&same_site).ok_or_else(|| {
                SessionError::Config(format!("SESSION_SAME_SITE: unknown value '{same_site}'"))
            })?;
        }

        if let Some(secs) = lookup("SESSION_TOKEN_MAX_AGE") {
            config.token_max_age = Some(Duration::from_secs(parse(
                "SESSION_TOKEN_MAX_AGE",
                &secs,
            )?));
        }

        Ok(config)
    }

    /// Set the cookie attributes.
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Set the maximum token age.
    pub fn with_token_max_age(mut self, max_age: Duration) -> Self {
        self.token_max_age = Some(max_age);
        self
    }

    /// Set the maximum encoded token length.
    pub fn with_max_token_length(mut self, length: usize) -> Self {
        self.max_token_length = length;
        self
    }
}

fn parse<T: std::str::FromStr>(var: &str, value: &str) -> SessionResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| SessionError::Config(format!("{var}: {e}")))
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.name, "session");
        assert_eq!(config.max_token_length, 4096);
        assert!(config.token_max_age.is_none());
    }

    #[test]
    fn test_from_lookup() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("SESSION_NAME", "mysession"),
            ("SESSION_DOMAIN", "example.com"),
            ("SESSION_MAX_AGE", "3600"),
            ("SESSION_SECURE", "true"),
            ("SESSION_HTTP_ONLY", "1"),
            ("SESSION_SAME_SITE", "Strict"),
            ("SESSION_TOKEN_MAX_AGE", "7200"),
        ]))
        .unwrap();

        assert_eq!(config.name, "mysession");
        assert_eq!(config.options.domain.as_deref(), Some("example.com"));
        assert_eq!(config.options.max_age, 3600);
        assert!(config.options.secure);
        assert!(config.options.http_only);
        assert_eq!(config.options.same_site, SameSite::Strict);
        assert_eq!(config.token_max_age, Some(Duration::from_secs(7200)));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        assert!(SessionConfig::from_lookup(lookup(&[("SESSION_MAX_AGE", "soon")])).is_err());
        assert!(SessionConfig::from_lookup(lookup(&[("SESSION_SAME_SITE", "maybe")])).is_err());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new("sid")
            .with_options(Options::default().with_secure(true))
            .with_token_max_age(Duration::from_secs(60))
            .with_max_token_length(1024);

        assert_eq!(config.name, "sid");
        assert!(config.options.secure);
        assert_eq!(config.max_token_length, 1024);
    }
}
