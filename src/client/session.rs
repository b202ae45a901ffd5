//! Controller sessions and the credential fingerprint that keys them.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// An authenticated controller session.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Controller host the session belongs to.
    pub host: String,
    /// Fingerprint of (host, user).
    pub fingerprint: String,
    /// `name=value` cookie pairs joined with `; `.
    cookies: String,
    /// When the session was established.
    pub created_at: DateTime<Utc>,
    /// Lifetime in seconds.
    pub ttl_secs: u64,
}

impl Session {
    /// Creates a session established now.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        fingerprint: impl Into<String>,
        cookies: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            fingerprint: fingerprint.into(),
            cookies: cookies.into(),
            created_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        }
    }

    /// Overrides the creation time.
    #[must_use]
    pub const fn established_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Whether the session is past its TTL.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the session is past its TTL at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let ttl = i64::try_from(self.ttl_secs)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .unwrap_or(ChronoDuration::MAX);
        now.signed_duration_since(self.created_at) >= ttl
    }

    /// Value for the `Cookie` request header.
    pub(crate) fn cookie_header(&self) -> &str {
        &self.cookies
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("fingerprint", &self.fingerprint)
            .field("cookies", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Computes the cache key for a (host, user) pair.
#[must_use]
pub fn fingerprint(host: &str, username: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(host.as_bytes());
    hasher.update([0u8]);
    hasher.update(username.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_distinct() {
        let a = fingerprint("10.0.0.3", "radware");
        assert_eq!(a, fingerprint("10.0.0.3", "radware"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint("10.0.0.3", "admin"));
        assert_ne!(fingerprint("ab", "c"), fingerprint("a", "bc"));
    }

    #[test]
    fn test_expiry() {
        let session = Session::new("h", "fp", "JSESSIONID=1", Duration::from_secs(600));
        let created = session.created_at;
        assert!(!session.is_expired_at(created + ChronoDuration::seconds(5)));
        assert!(session.is_expired_at(created + ChronoDuration::seconds(700)));
    }

    #[test]
    fn test_oversized_ttl_never_expires() {
        let session = Session::new("h", "fp", "JSESSIONID=1", Duration::from_secs(u64::MAX));
        assert!(!session.is_expired());
    }

    #[test]
    fn test_debug_redacts_cookies() {
        let session = Session::new("h", "fp", "JSESSIONID=topsecret", Duration::from_secs(600));
        assert!(!format!("{session:?}").contains("topsecret"));
    }
}
