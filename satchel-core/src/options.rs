//! Cookie and expiry options, and their translation into cookies and TTLs.

use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thirty days, the default cookie lifetime.
pub const DEFAULT_MAX_AGE: i64 = 86400 * 30;

/// How long backends keep browser-session (`max_age == 0`) sessions.
pub const DEFAULT_STORE_TTL: Duration = Duration::from_secs(86400);

/// Upper bound on any backend TTL (100 years).
pub const MAX_STORE_TTL: Duration = Duration::from_secs(86400 * 365 * 100);

/// Cookie SameSite attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// Attribute omitted; the browser default applies
    #[default]
    Default,
    Lax,
    Strict,
    None,
}

impl SameSite {
    /// Attribute value, or `None` when the attribute is omitted.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            SameSite::Default => None,
            SameSite::Lax => Some("Lax"),
            SameSite::Strict => Some("Strict"),
            SameSite::None => Some("None"),
        }
    }

    /// Parse a SameSite value, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "" | "default" => Some(SameSite::Default),
            "lax" => Some(SameSite::Lax),
            "strict" => Some(SameSite::Strict),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

/// Session cookie attributes and backend expiry.
///
/// `max_age` is in seconds: `0` makes a browser-session cookie (backends
/// keep the data for their default TTL), a negative value deletes the
/// session on the next save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub path: String,
    pub domain: Option<String>,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: DEFAULT_MAX_AGE,
            secure: false,
            http_only: false,
            same_site: SameSite::Default,
        }
    }
}

impl Options {
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Whether these options ask for the session to be removed.
    pub fn deletes(&self) -> bool {
        self.max_age < 0
    }

    /// Backend TTL for a save under these options.
    ///
    /// A positive `max_age` is used as-is, `0` falls back to the backend's
    /// default, and a negative value yields `None` (the session is deleted).
    /// The result never exceeds [`MAX_STORE_TTL`].
    pub fn store_ttl(&self, fallback: Duration) -> Option<Duration> {
        let ttl = match self.max_age {
            age if age > 0 => Duration::from_secs(age.unsigned_abs()),
            0 => fallback,
            _ => return None,
        };
        Some(ttl.min(MAX_STORE_TTL))
    }
}

/// A cookie the transport layer should send back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub options: Options,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, options: Options) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            options,
        }
    }

    /// A cookie that makes the client drop its token.
    pub fn removal(name: impl Into<String>, options: Options) -> Self {
        Self::new(name, "", options.with_max_age(-1))
    }

    /// Whether this cookie removes the client's token.
    pub fn is_removal(&self) -> bool {
        self.options.deletes()
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let options = &self.options;
        let mut cookie = format!("{}={}; Path={}", self.name, self.value, options.path);

        if let Some(ref domain) = options.domain {
            cookie.push_str(&format!("; Domain={}", domain));
        }

        match options.max_age {
            age if age > 0 => {
                // Expires is left out when the date is out of range
                let expires =
                    TimeDelta::try_seconds(age).and_then(|d| Utc::now().checked_add_signed(d));
                if let Some(expires) = expires {
                    cookie.push_str(&format!(
                        "; Expires={}",
                        expires.format("%a, %d %b %Y %H:%M:%S GMT")
                    ));
                }
                cookie.push_str(&format!("; Max-Age={}", age));
            }
            age if age < 0 => {
                cookie.push_str("; Expires=Thu, 01 Jan 1970 00:00:01 GMT; Max-Age=0");
            }
            _ => {}
        }

        if options.secure {
            cookie.push_str("; Secure");
        }

        if options.http_only {
            cookie.push_str("; HttpOnly");
        }

        if let Some(same_site) = options.same_site.as_str() {
            cookie.push_str(&format!("; SameSite={}", same_site));
        }

        cookie
    }
}
