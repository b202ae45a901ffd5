//! Resource type tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// The resource types dpsync knows how to reconcile.
///
/// Variant order is creation order: network classes first, then protections,
/// then the profiles that reference them, then the policies that bind profiles.
/// Deletion walks the same order backwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Network class (address groups).
    NetworkClass,
    /// Connection-limit protection.
    ClProtection,
    /// SYN-flood protection.
    SynProtection,
    /// Behavioral DoS (network flood) profile.
    BdosProfile,
    /// Out-of-state (stateful) profile.
    OosProfile,
    /// HTTPS flood profile.
    HttpsProfile,
    /// DNS flood protection profile.
    DnsProfile,
    /// Protected SSL object (decryption target).
    SslObject,
    /// Traffic filter profile, the parent of traffic filters.
    TrafficFilterProfile,
    /// Traffic filter rule scoped to one traffic filter profile.
    TrafficFilter,
    /// Connection-limit profile, a container of connection-limit protections.
    ClProfile,
    /// SYN profile, a container of SYN protections.
    SynProfile,
    /// Security policy binding profiles to traffic.
    SecurityPolicy,
}

impl ResourceKind {
    /// Every kind, in creation order.
    pub const ALL: [Self; 13] = [
        Self::NetworkClass,
        Self::ClProtection,
        Self::SynProtection,
        Self::BdosProfile,
        Self::OosProfile,
        Self::HttpsProfile,
        Self::DnsProfile,
        Self::SslObject,
        Self::TrafficFilterProfile,
        Self::TrafficFilter,
        Self::ClProfile,
        Self::SynProfile,
        Self::SecurityPolicy,
    ];

    /// The tag used in desired-state files and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkClass => "network_class",
            Self::ClProtection => "cl_protection",
            Self::SynProtection => "syn_protection",
            Self::BdosProfile => "bdos_profile",
            Self::OosProfile => "oos_profile",
            Self::HttpsProfile => "https_profile",
            Self::DnsProfile => "dns_profile",
            Self::SslObject => "ssl_object",
            Self::TrafficFilterProfile => "traffic_filter_profile",
            Self::TrafficFilter => "traffic_filter",
            Self::ClProfile => "cl_profile",
            Self::SynProfile => "syn_profile",
            Self::SecurityPolicy => "security_policy",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| ConfigError::UnknownResourceType { tag: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!("cl_protection".parse::<ResourceKind>().unwrap(), ResourceKind::ClProtection);
        assert_eq!("Syn-Profile".parse::<ResourceKind>().unwrap(), ResourceKind::SynProfile);
        assert_eq!("dns_profile".parse::<ResourceKind>().unwrap(), ResourceKind::DnsProfile);
        assert!("appsec_profile".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_creation_order() {
        assert!(ResourceKind::NetworkClass < ResourceKind::ClProtection);
        assert!(ResourceKind::ClProtection < ResourceKind::ClProfile);
        assert!(ResourceKind::ClProfile < ResourceKind::SecurityPolicy);
        assert!(ResourceKind::TrafficFilterProfile < ResourceKind::TrafficFilter);
        assert!(ResourceKind::DnsProfile < ResourceKind::SecurityPolicy);
    }

    #[test]
    fn test_serde_tag_matches_display() {
        for kind in ResourceKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }
}
