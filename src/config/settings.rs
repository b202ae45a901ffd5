//! Validated connection settings for the management controller.
//!
//! Settings are checked once, when they are built. A `ControllerSettings`
//! value that exists is always usable by the client.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Default session lifetime in seconds.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 600;

/// Longest accepted session lifetime in seconds (one day).
pub const MAX_SESSION_TTL_SECS: u64 = 86_400;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Operator-selected verbosity for controller traffic logging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No log output.
    #[default]
    Disabled,
    /// Method, path and status of every call.
    Info,
    /// Everything at `Info` plus request and response bodies.
    Debug,
}

impl LogLevel {
    /// The `tracing` filter directive matching this level.
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Disabled => "off",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "none" => Ok(Self::Disabled),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(ConfigError::invalid(
                "log_level",
                format!("'{other}' is not one of disabled, info, debug"),
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disabled => "disabled",
            Self::Info => "info",
            Self::Debug => "debug",
        };
        write!(f, "{s}")
    }
}

/// Validated settings for connecting to the management controller.
#[derive(Clone)]
pub struct ControllerSettings {
    host: String,
    base_url: Url,
    username: String,
    password: SecretString,
    log_level: LogLevel,
    verify_tls: bool,
    timeout: Duration,
    session_ttl: Duration,
}

impl ControllerSettings {
    /// Builds settings from the three mandatory fields.
    ///
    /// `host` is either a bare address (`10.0.0.3`, `cc.example.net:8443`),
    /// which is reached over HTTPS, or a full `http(s)://` URL.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is empty or the host is not a valid address.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let host = host.into().trim().to_string();
        let username = username.into();
        let password = password.into();

        if host.is_empty() {
            return Err(ConfigError::invalid("host", "controller host cannot be empty"));
        }
        if username.trim().is_empty() {
            return Err(ConfigError::invalid("username", "username cannot be empty"));
        }
        if password.is_empty() {
            return Err(ConfigError::invalid("password", "password cannot be empty"));
        }

        let base_url = parse_base_url(&host)?;

        Ok(Self {
            host,
            base_url,
            username,
            password: SecretString::from(password),
            log_level: LogLevel::default(),
            verify_tls: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        })
    }

    /// Sets the log verbosity.
    #[must_use]
    pub const fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    /// Sets the per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is zero.
    pub fn with_timeout_secs(mut self, secs: u64) -> Result<Self, ConfigError> {
        if secs == 0 {
            return Err(ConfigError::invalid("timeout_secs", "timeout must be at least 1 second"));
        }
        self.timeout = Duration::from_secs(secs);
        Ok(self)
    }

    /// Sets the session lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if the TTL is zero or longer than
    /// [`MAX_SESSION_TTL_SECS`].
    pub fn with_session_ttl_secs(mut self, secs: u64) -> Result<Self, ConfigError> {
        if secs == 0 {
            return Err(ConfigError::invalid(
                "session_ttl_secs",
                "session TTL must be at least 1 second",
            ));
        }
        if secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::invalid(
                "session_ttl_secs",
                format!("session TTL must be at most {MAX_SESSION_TTL_SECS} seconds"),
            ));
        }
        self.session_ttl = Duration::from_secs(secs);
        Ok(self)
    }

    /// Controller host as configured.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Base URL every controller path is joined onto.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Login user.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Login password. Only the client's login call should expose it.
    #[must_use]
    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Log verbosity.
    #[must_use]
    pub const fn log_level(&self) -> LogLevel {
        self.log_level
    }

    /// Whether TLS certificates are verified.
    #[must_use]
    pub const fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Session lifetime.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        self.session_ttl
    }
}

impl fmt::Debug for ControllerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerSettings")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("log_level", &self.log_level)
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

fn parse_base_url(host: &str) -> Result<Url, ConfigError> {
    let candidate = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };

    let url = Url::parse(&candidate)
        .map_err(|e| ConfigError::invalid("host", format!("'{host}' is not a valid address: {e}")))?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::invalid("host", format!("'{host}' has no host part")));
    }
    if url.path() != "/" || url.query().is_some() {
        return Err(ConfigError::invalid(
            "host",
            format!("'{host}' must not carry a path or query"),
        ));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_defaults_to_https() {
        let settings = ControllerSettings::new("10.105.193.3", "radware", "secret").unwrap();
        assert_eq!(settings.base_url().as_str(), "https://10.105.193.3/");
        assert_eq!(settings.session_ttl(), Duration::from_secs(600));
        assert_eq!(settings.log_level(), LogLevel::Disabled);
    }

    #[test]
    fn test_explicit_scheme_is_kept() {
        let settings = ControllerSettings::new("http://127.0.0.1:8080", "u", "p").unwrap();
        assert_eq!(settings.base_url().scheme(), "http");
        assert_eq!(settings.base_url().port(), Some(8080));
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        assert!(matches!(
            ControllerSettings::new("", "u", "p"),
            Err(ConfigError::InvalidSetting { field: "host", .. })
        ));
        assert!(matches!(
            ControllerSettings::new("10.0.0.1", " ", "p"),
            Err(ConfigError::InvalidSetting { field: "username", .. })
        ));
        assert!(matches!(
            ControllerSettings::new("10.0.0.1", "u", ""),
            Err(ConfigError::InvalidSetting { field: "password", .. })
        ));
        assert!(matches!(
            ControllerSettings::new("https://10.0.0.1/mgmt", "u", "p"),
            Err(ConfigError::InvalidSetting { field: "host", .. })
        ));
    }

    #[test]
    fn test_ttl_bounds() {
        let settings = ControllerSettings::new("10.0.0.1", "u", "p").unwrap();
        assert!(settings.clone().with_session_ttl_secs(0).is_err());
        assert!(settings.clone().with_session_ttl_secs(u64::MAX).is_err());
        let day = settings.with_session_ttl_secs(MAX_SESSION_TTL_SECS).unwrap();
        assert_eq!(day.session_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_debug_redacts_password() {
        let settings = ControllerSettings::new("10.0.0.1", "u", "hunter2").unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("disabled".parse::<LogLevel>().unwrap(), LogLevel::Disabled);
        assert!("trace".parse::<LogLevel>().is_err());
    }
}
