//! Resource-type descriptions: controller table, key columns, attribute
//! mapping tables and create-time defaults.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::codec::{Codec, FieldSpec, NUMBER, SWITCH};
use super::kind::ResourceKind;
use crate::error::ItemError;

/// How rows of a table are addressed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// `{table}/{name}`.
    Name,
    /// `{table}/{name}/{slot}`; several rows share a name.
    NameAndSlot {
        /// Column carrying the slot number.
        slot_field: &'static str,
    },
    /// `{table}/{index}`; index 0 lets the device allocate one.
    Indexed {
        /// Column carrying the allocated index.
        id_field: &'static str,
        /// Lowest explicit index accepted besides 0, if the device reserves a range.
        reserved_min: Option<u64>,
    },
    /// `{table}/{container}/{member}`; each row is one container-to-member edge.
    Member {
        /// Column carrying the member name.
        member_field: &'static str,
        /// Resource type of the members.
        member_kind: ResourceKind,
    },
    /// `{table}/{parent}/{name}`; rows carry their own attributes but are
    /// named within a parent row.
    Scoped {
        /// Column carrying the row's own name.
        member_field: &'static str,
    },
}

/// Static description of one resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSpec {
    /// Type tag.
    pub kind: ResourceKind,
    /// Controller table name.
    pub table: &'static str,
    /// Column carrying the natural name.
    pub name_field: &'static str,
    /// Row addressing scheme.
    pub addressing: Addressing,
    /// Operator-facing attributes.
    pub fields: &'static [FieldSpec],
    /// Wire values sent on create when the descriptor leaves them out.
    pub defaults: &'static [(&'static str, &'static str)],
    /// Columns the device only accepts on an existing row. Create sends them
    /// in a follow-up PUT to the same row path.
    pub deferred: &'static [&'static str],
}

impl ResourceSpec {
    /// Looks up an attribute by its operator-facing name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Member type if this type is a container.
    #[must_use]
    pub const fn member_kind(&self) -> Option<ResourceKind> {
        match self.addressing {
            Addressing::Member { member_kind, .. } => Some(member_kind),
            _ => None,
        }
    }

    /// Whether descriptors of this type carry a member (second key segment).
    #[must_use]
    pub const fn takes_member(&self) -> bool {
        matches!(
            self.addressing,
            Addressing::Member { .. } | Addressing::Scoped { .. }
        )
    }

    /// Encodes a partial attribute map into wire columns.
    ///
    /// Only the attributes present are encoded; nothing is implied for the rest.
    ///
    /// # Errors
    ///
    /// Returns a validation error for the first unknown attribute or bad value.
    pub fn encode_attributes(
        &self,
        attributes: &BTreeMap<String, Value>,
    ) -> Result<Map<String, Value>, ItemError> {
        let mut body = Map::new();
        for (name, value) in attributes {
            let field = self.field(name).ok_or_else(|| {
                ItemError::validation(
                    format!("unknown attribute '{name}' for {}", self.kind),
                    name.clone(),
                )
            })?;
            body.insert(field.wire.to_string(), Value::String(field.encode(value)?));
        }
        Ok(body)
    }

    /// Create-time defaults as a wire map.
    #[must_use]
    pub fn default_body(&self) -> Map<String, Value> {
        self.defaults
            .iter()
            .map(|(wire, value)| ((*wire).to_string(), Value::String((*value).to_string())))
            .collect()
    }
}

impl ResourceKind {
    /// Returns the static description for this type.
    #[must_use]
    pub fn spec(self) -> &'static ResourceSpec {
        match self {
            Self::NetworkClass => &NETWORK_CLASS,
            Self::ClProtection => &CL_PROTECTION,
            Self::SynProtection => &SYN_PROTECTION,
            Self::BdosProfile => &BDOS_PROFILE,
            Self::OosProfile => &OOS_PROFILE,
            Self::HttpsProfile => &HTTPS_PROFILE,
            Self::DnsProfile => &DNS_PROFILE,
            Self::SslObject => &SSL_OBJECT,
            Self::TrafficFilterProfile => &TRAFFIC_FILTER_PROFILE,
            Self::TrafficFilter => &TRAFFIC_FILTER,
            Self::ClProfile => &CL_PROFILE,
            Self::SynProfile => &SYN_PROFILE,
            Self::SecurityPolicy => &SECURITY_POLICY,
        }
    }
}

const ACTION_REPORT_BLOCK: Codec = Codec::Enum(&[("report_only", "0"), ("block_and_report", "1")]);

static NETWORK_CLASS: ResourceSpec = ResourceSpec {
    kind: ResourceKind::NetworkClass,
    table: "rsBWMNetworkTable",
    name_field: "rsBWMNetworkName",
    addressing: Addressing::NameAndSlot {
        slot_field: "rsBWMNetworkSubIndex",
    },
    fields: &[
        FieldSpec::text("address", "rsBWMNetworkAddress"),
        FieldSpec::text("mask", "rsBWMNetworkMask"),
    ],
    defaults: &[("rsBWMNetworkMode", "1")],
    deferred: &[],
};

static BDOS_PROFILE: ResourceSpec = ResourceSpec {
    kind: ResourceKind::BdosProfile,
    table: "rsNetFloodProfileTable",
    name_field: "rsNetFloodProfileName",
    addressing: Addressing::Name,
    fields: &[
        FieldSpec::new("syn_flood", "rsNetFloodProfileTcpSynStatus", SWITCH),
        FieldSpec::new("udp_flood", "rsNetFloodProfileUdpStatus", SWITCH),
        FieldSpec::new("igmp_flood", "rsNetFloodProfileIgmpStatus", SWITCH),
        FieldSpec::new("icmp_flood", "rsNetFloodProfileIcmpStatus", SWITCH),
        FieldSpec::new("tcp_ack_fin_flood", "rsNetFloodProfileTcpFinAckStatus", SWITCH),
        FieldSpec::new("tcp_rst_flood", "rsNetFloodProfileTcpRstStatus", SWITCH),
        FieldSpec::new("tcp_psh_ack_flood", "rsNetFloodProfileTcpPshAckStatus", SWITCH),
        FieldSpec::new("tcp_syn_ack_flood", "rsNetFloodProfileTcpSynAckStatus", SWITCH),
        FieldSpec::new("tcp_frag_flood", "rsNetFloodProfileTcpFragStatus", SWITCH),
        FieldSpec::new("udp_frag_flood", "rsNetFloodProfileUdpFragStatus", SWITCH),
        FieldSpec::new(
            "transparent_optimization",
            "rsNetFloodProfileTransparentOptimization",
            SWITCH,
        ),
        FieldSpec::new("adv_udp_detection", "rsNetFloodProfileAdvUdpDetection", SWITCH),
        FieldSpec::new("burst_attack", "rsNetFloodProfileBurstEnabled", SWITCH),
        FieldSpec::new("packet_report", "rsNetFloodProfilePacketReportStatus", SWITCH),
        FieldSpec::new("action", "rsNetFloodProfileAction", ACTION_REPORT_BLOCK),
        FieldSpec::new(
            "footprint_strictness",
            "rsNetFloodProfileFootprintStrictness",
            Codec::Enum(&[("low", "0"), ("medium", "1"), ("high", "2")]),
        ),
        FieldSpec::new(
            "rate_limit",
            "rsNetFloodProfileRateLimit",
            Codec::Enum(&[
                ("disable", "0"),
                ("normal_edge", "1"),
                ("suspect_edge", "2"),
                ("user_defined", "3"),
            ]),
        ),
        FieldSpec::new(
            "inbound_traffic",
            "rsNetFloodProfileBandwidthIn",
            Codec::Range {
                min: 1,
                max: 1_342_177_280,
            },
        ),
        FieldSpec::new(
            "outbound_traffic",
            "rsNetFloodProfileBandwidthOut",
            Codec::Range {
                min: 1,
                max: 1_342_177_280,
            },
        ),
        FieldSpec::new("tcp_in_quota", "rsNetFloodProfileTcpInQuota", PERCENT),
        FieldSpec::new("udp_in_quota", "rsNetFloodProfileUdpInQuota", PERCENT),
        FieldSpec::new("icmp_in_quota", "rsNetFloodProfileIcmpInQuota", PERCENT),
        FieldSpec::new("igmp_in_quota", "rsNetFloodProfileIgmpInQuota", PERCENT),
        FieldSpec::new("tcp_out_quota", "rsNetFloodProfileTcpOutQuota", PERCENT),
        FieldSpec::new("udp_out_quota", "rsNetFloodProfileUdpOutQuota", PERCENT),
        FieldSpec::new("icmp_out_quota", "rsNetFloodProfileIcmpOutQuota", PERCENT),
        FieldSpec::new("igmp_out_quota", "rsNetFloodProfileIgmpOutQuota", PERCENT),
        FieldSpec::new(
            "learning_suppression_threshold",
            "rsNetFloodProfileLearningSuppressionThreshold",
            Codec::Range { min: 0, max: 50 },
        ),
        FieldSpec::new(
            "maximum_interval_between_bursts",
            "rsNetFloodProfileNoBurstTimeout",
            NUMBER,
        ),
        FieldSpec::new(
            "user_defined_rate_limit",
            "rsNetFloodProfileUserDefinedRateLimit",
            NUMBER,
        ),
        FieldSpec::text(
            "user_defined_rate_limit_unit",
            "rsNetFloodProfileUserDefinedRateLimitUnit",
        ),
    ],
    defaults: &[],
    deferred: &[],
};

const PERCENT: Codec = Codec::Range { min: 0, max: 100 };

static OOS_PROFILE: ResourceSpec = ResourceSpec {
    kind: ResourceKind::OosProfile,
    table: "rsStatefulProfileTable",
    name_field: "rsSTATFULProfileName",
    addressing: Addressing::Name,
    fields: &[
        FieldSpec::new("act_threshold", "rsSTATFULProfileactThreshold", NUMBER),
        FieldSpec::new("term_threshold", "rsSTATFULProfiletermThreshold", NUMBER),
        FieldSpec::new("syn_ack_allow", "rsSTATFULProfilesynAckAllow", SWITCH),
        FieldSpec::new("packet_report", "rsSTATFULProfilePacketReportStatus", SWITCH),
        FieldSpec::new("action", "rsSTATFULProfileAction", ACTION_REPORT_BLOCK),
        FieldSpec::new(
            "risk",
            "rsSTATFULProfileRisk",
            Codec::Enum(&[("info", "0"), ("low", "1"), ("medium", "2"), ("high", "3")]),
        ),
        FieldSpec::new("idle_state", "rsSTATFULProfileEnableIdleState", SWITCH),
        FieldSpec::new(
            "idle_state_bandwidth_threshold",
            "rsSTATFULProfileIdleStateBandwidthThreshold",
            NUMBER,
        ),
        FieldSpec::new("idle_state_timer", "rsSTATFULProfileIdleStateTimer", NUMBER),
    ],
    defaults: &[],
    deferred: &[],
};

static HTTPS_PROFILE: ResourceSpec = ResourceSpec {
    kind: ResourceKind::HttpsProfile,
    table: "rsHttpsFloodProfileTable",
    name_field: "rsHttpsFloodProfileName",
    addressing: Addressing::Name,
    fields: &[
        FieldSpec::new("action", "rsHttpsFloodProfileAction", ACTION_REPORT_BLOCK),
        FieldSpec::new("rate_limit", "rsHttpsFloodProfileRateLimit", NUMBER),
        FieldSpec::new(
            "https_authentication_on_suspect_sources",
            "rsHttpsFloodProfileSelectiveChallenge",
            SWITCH,
        ),
        FieldSpec::new(
            "https_authentication_on_all_sources",
            "rsHttpsFloodProfileCollectiveChallenge",
            SWITCH,
        ),
        FieldSpec::new(
            "challenge_method",
            "rsHttpsFloodProfileChallengeMethod",
            Codec::Enum(&[("redirect_302", "1"), ("javascript", "2")]),
        ),
        FieldSpec::new("rate_limit_status", "rsHttpsFloodProfileRateLimitStatus", SWITCH),
        FieldSpec::new("packet_report", "rsHttpsFloodProfilePacketReporting", SWITCH),
        FieldSpec::new(
            "full_session_decryption",
            "rsHttpsFloodProfileFullSessionDecryption",
            SWITCH,
        ),
    ],
    defaults: &[],
    deferred: &[],
};

static DNS_PROFILE: ResourceSpec = ResourceSpec {
    kind: ResourceKind::DnsProfile,
    table: "rsDnsProtProfileTable",
    name_field: "rsDnsProtProfileName",
    addressing: Addressing::Name,
    fields: &[
        FieldSpec::new("action", "rsDnsProtProfileAction", ACTION_REPORT_BLOCK),
        FieldSpec::new("a_status", "rsDnsProtProfileDnsAStatus", SWITCH),
        FieldSpec::new("mx_status", "rsDnsProtProfileDnsMxStatus", SWITCH),
        FieldSpec::new("ptr_status", "rsDnsProtProfileDnsPtrStatus", SWITCH),
        FieldSpec::new("aaaa_status", "rsDnsProtProfileDnsAaaaStatus", SWITCH),
        FieldSpec::new("text_status", "rsDnsProtProfileDnsTextStatus", SWITCH),
        FieldSpec::new("soa_status", "rsDnsProtProfileDnsSoaStatus", SWITCH),
        FieldSpec::new("naptr_status", "rsDnsProtProfileDnsNaptrStatus", SWITCH),
        FieldSpec::new("srv_status", "rsDnsProtProfileDnsSrvStatus", SWITCH),
        FieldSpec::new("other_status", "rsDnsProtProfileDnsOtherStatus", SWITCH),
        FieldSpec::new("expected_qps", "rsDnsProtProfileExpectedQps", NUMBER),
        FieldSpec::new("max_allow_qps", "rsDnsProtProfileMaxAllowQps", NUMBER),
        FieldSpec::new("a_quota", "rsDnsProtProfileDnsAQuota", PERCENT),
        FieldSpec::new("mx_quota", "rsDnsProtProfileDnsMxQuota", PERCENT),
        FieldSpec::new("ptr_quota", "rsDnsProtProfileDnsPtrQuota", PERCENT),
        FieldSpec::new("aaaa_quota", "rsDnsProtProfileDnsAaaaQuota", PERCENT),
        FieldSpec::new("text_quota", "rsDnsProtProfileDnsTextQuota", PERCENT),
        FieldSpec::new("soa_quota", "rsDnsProtProfileDnsSoaQuota", PERCENT),
        FieldSpec::new("naptr_quota", "rsDnsProtProfileDnsNaptrQuota", PERCENT),
        FieldSpec::new("srv_quota", "rsDnsProtProfileDnsSrvQuota", PERCENT),
        FieldSpec::new("other_quota", "rsDnsProtProfileDnsOtherQuota", PERCENT),
        FieldSpec::new(
            "footprint_strictness",
            "rsDnsProtProfileFootprintStrictness",
            Codec::Enum(&[("low", "0"), ("medium", "1"), ("high", "2")]),
        ),
        FieldSpec::new("manual_trigger", "rsDnsProtProfileManualTriggerStatus", SWITCH),
        FieldSpec::new(
            "manual_trigger_act_thresh",
            "rsDnsProtProfileManualTriggerActThresh",
            NUMBER,
        ),
        FieldSpec::new(
            "manual_trigger_term_thresh",
            "rsDnsProtProfileManualTriggerTermThresh",
            NUMBER,
        ),
        FieldSpec::new(
            "manual_trigger_max_qps_target",
            "rsDnsProtProfileManualTriggerMaxQpsTarget",
            NUMBER,
        ),
        FieldSpec::new(
            "manual_trigger_act_period",
            "rsDnsProtProfileManualTriggerActPeriod",
            NUMBER,
        ),
        FieldSpec::new(
            "manual_trigger_term_period",
            "rsDnsProtProfileManualTriggerTermPeriod",
            NUMBER,
        ),
        FieldSpec::new(
            "manual_trigger_escalate_period",
            "rsDnsProtProfileManualTriggerEscalatePeriod",
            NUMBER,
        ),
        FieldSpec::new("packet_report", "rsDnsProtProfilePacketReportStatus", SWITCH),
        FieldSpec::new("sig_rate_lim_target", "rsDnsProtProfileSigRateLimTarget", NUMBER),
        FieldSpec::new(
            "query_name_sensitivity",
            "rsDnsProtProfileQueryNameMonitoringSensitivity",
            NUMBER,
        ),
        FieldSpec::new(
            "subdomains_allow_list",
            "rsDnsProtProfileSubdomainsWLLearningState",
            SWITCH,
        ),
        FieldSpec::new(
            "learning_suppression_threshold",
            "rsDnsProtProfileLearningSuppressionThreshold",
            Codec::Range { min: 0, max: 50 },
        ),
    ],
    defaults: &[],
    deferred: &[
        "rsDnsProtProfileDnsAQuota",
        "rsDnsProtProfileDnsMxQuota",
        "rsDnsProtProfileDnsPtrQuota",
        "rsDnsProtProfileDnsAaaaQuota",
        "rsDnsProtProfileDnsTextQuota",
        "rsDnsProtProfileDnsSoaQuota",
        "rsDnsProtProfileDnsNaptrQuota",
        "rsDnsProtProfileDnsSrvQuota",
        "rsDnsProtProfileDnsOtherQuota",
    ],
};

static SSL_OBJECT: ResourceSpec = ResourceSpec {
    kind: ResourceKind::SslObject,
    table: "rsProtectedSslObjTable",
    name_field: "rsProtectedObjName",
    addressing: Addressing::Name,
    fields: &[
        FieldSpec::new("state", "rsProtectedObjEnable", SWITCH),
        FieldSpec::text("ip_address", "rsProtectedObjIpAddr"),
        FieldSpec::new("port", "rsProtectedObjApplPort", Codec::Range { min: 1, max: 65_535 }),
    ],
    defaults: &[("rsProtectedObjEnable", "1"), ("rsProtectedObjApplPort", "443")],
    deferred: &[],
};

static TRAFFIC_FILTER_PROFILE: ResourceSpec = ResourceSpec {
    kind: ResourceKind::TrafficFilterProfile,
    table: "rsNewTrafficProfileTable",
    name_field: "rsNewTrafficProfileName",
    addressing: Addressing::Name,
    fields: &[FieldSpec::new(
        "action",
        "rsNewTrafficProfileAction",
        Codec::Enum(&[("report_only", "1"), ("drop", "10")]),
    )],
    defaults: &[],
    deferred: &[],
};

static TRAFFIC_FILTER: ResourceSpec = ResourceSpec {
    kind: ResourceKind::TrafficFilter,
    table: "rsNewTrafficFilterTable",
    name_field: "rsNewTrafficFilterProfileName",
    addressing: Addressing::Scoped {
        member_field: "rsNewTrafficFilterName",
    },
    fields: &[
        FieldSpec::new("state", "rsNewTrafficFilterState", SWITCH),
        FieldSpec::new("priority", "rsNewTrafficFilterPriority", NUMBER),
        FieldSpec::new(
            "protocol",
            "rsNewTrafficFilterProtocol",
            Codec::Enum(&[
                ("any", "0"),
                ("tcp", "1"),
                ("udp", "2"),
                ("icmp", "3"),
                ("igmp", "4"),
                ("sctp", "5"),
                ("icmpv6", "6"),
                ("gre", "7"),
                ("ipinip", "8"),
            ]),
        ),
        FieldSpec::text("custom_protocol", "rsNewTrafficFilterCustomProtocol"),
        FieldSpec::text("match_criteria", "rsNewTrafficFilterMatchCriteria"),
        FieldSpec::text("packet_size", "rsNewTrafficFilterPacketSize"),
        FieldSpec::text("vlan", "rsNewTrafficFilterVLAN"),
        FieldSpec::text("src_network", "rsNewTrafficFilterSrcNetwork"),
        FieldSpec::text("src_port", "rsNewTrafficFilterSrcPort"),
        FieldSpec::text("dst_network", "rsNewTrafficFilterDstNetwork"),
        FieldSpec::text("dst_port", "rsNewTrafficFilterDstPort"),
        FieldSpec::new("tcp_syn", "rsNewTrafficFilterTCPFlagsSyn", SWITCH),
        FieldSpec::new("tcp_ack", "rsNewTrafficFilterTCPFlagsAck", SWITCH),
        FieldSpec::new("tcp_rst", "rsNewTrafficFilterTCPFlagsRst", SWITCH),
        FieldSpec::new("tcp_synack", "rsNewTrafficFilterTCPFlagsSynAck", SWITCH),
        FieldSpec::new("tcp_finack", "rsNewTrafficFilterTCPFlagsFinAck", SWITCH),
        FieldSpec::new("tcp_pshack", "rsNewTrafficFilterTCPFlagsPshAck", SWITCH),
        FieldSpec::new("threshold_pps", "rsNewTrafficFilterThresholdPPS", NUMBER),
        FieldSpec::new("threshold_bps", "rsNewTrafficFilterThresholdBPS", NUMBER),
        FieldSpec::new("threshold_used", "rsNewTrafficFilterThresholdUsed", NUMBER),
        FieldSpec::new(
            "attack_tracking_type",
            "rsNewTrafficFilterAttackTrackingType",
            NUMBER,
        ),
        FieldSpec::new("packet_report", "rsNewTrafficFilterPacketReport", SWITCH),
    ],
    defaults: &[
        ("rsNewTrafficFilterMatchCriteria", "1"),
        ("rsNewTrafficFilterProtocol", "0"),
        ("rsNewTrafficFilterThresholdPPS", "10000"),
        ("rsNewTrafficFilterThresholdBPS", "0"),
        ("rsNewTrafficFilterPacketReport", "1"),
    ],
    deferred: &[],
};

static CL_PROTECTION: ResourceSpec = ResourceSpec {
    kind: ResourceKind::ClProtection,
    table: "rsIDSConnectionLimitAttackTable",
    name_field: "rsIDSConnectionLimitAttackName",
    addressing: Addressing::Indexed {
        id_field: "rsIDSConnectionLimitAttackId",
        reserved_min: Some(450_000),
    },
    fields: &[
        FieldSpec::new(
            "protocol",
            "rsIDSConnectionLimitAttackProtocol",
            Codec::Enum(&[("tcp", "2"), ("udp", "3")]),
        ),
        FieldSpec::new("threshold", "rsIDSConnectionLimitAttackThreshold", NUMBER),
        FieldSpec::new(
            "tracking_type",
            "rsIDSConnectionLimitAttackTrackingType",
            Codec::Enum(&[
                ("src_ip", "2"),
                ("dst_ip", "3"),
                ("src_and_dest_ip", "4"),
                ("dst_ip_and_port", "5"),
            ]),
        ),
        FieldSpec::new(
            "action",
            "rsIDSConnectionLimitAttackReportMode",
            Codec::Enum(&[("report_only", "0"), ("drop", "10")]),
        ),
        FieldSpec::new("packet_report", "rsIDSConnectionLimitAttackPacketReport", SWITCH),
        FieldSpec::new(
            "protection_type",
            "rsIDSConnectionLimitAttackType",
            Codec::Enum(&[("cps", "1"), ("concurrent_connections", "2")]),
        ),
    ],
    defaults: &[
        ("rsIDSConnectionLimitAttackProtocol", "2"),
        ("rsIDSConnectionLimitAttackThreshold", "50"),
        ("rsIDSConnectionLimitAttackTrackingType", "3"),
        ("rsIDSConnectionLimitAttackReportMode", "10"),
        ("rsIDSConnectionLimitAttackPacketReport", "2"),
        ("rsIDSConnectionLimitAttackType", "1"),
    ],
    deferred: &[],
};

static CL_PROFILE: ResourceSpec = ResourceSpec {
    kind: ResourceKind::ClProfile,
    table: "rsIDSConnectionLimitProfileTable",
    name_field: "rsIDSConnectionLimitProfileName",
    addressing: Addressing::Member {
        member_field: "rsIDSConnectionLimitProfileAttackName",
        member_kind: ResourceKind::ClProtection,
    },
    fields: &[],
    defaults: &[],
    deferred: &[],
};

static SYN_PROTECTION: ResourceSpec = ResourceSpec {
    kind: ResourceKind::SynProtection,
    table: "rsIDSSYNAttackTable",
    name_field: "rsIDSSYNAttackName",
    addressing: Addressing::Indexed {
        id_field: "rsIDSSYNAttackId",
        reserved_min: None,
    },
    fields: &[
        FieldSpec::text("app_port_group", "rsIDSSYNDestinationAppPortGroup"),
        FieldSpec::new(
            "activation_threshold",
            "rsIDSSYNAttackActivationThreshold",
            NUMBER,
        ),
        FieldSpec::new(
            "termination_threshold",
            "rsIDSSYNAttackTerminationThreshold",
            NUMBER,
        ),
        FieldSpec::new("packet_report", "rsIDSSYNAttackPacketReport", SWITCH),
    ],
    defaults: &[],
    deferred: &[],
};

static SYN_PROFILE: ResourceSpec = ResourceSpec {
    kind: ResourceKind::SynProfile,
    table: "rsIDSSynProfilesTable",
    name_field: "rsIDSSynProfilesName",
    addressing: Addressing::Member {
        member_field: "rsIDSSynProfileServiceName",
        member_kind: ResourceKind::SynProtection,
    },
    fields: &[],
    defaults: &[],
    deferred: &[],
};

static SECURITY_POLICY: ResourceSpec = ResourceSpec {
    kind: ResourceKind::SecurityPolicy,
    table: "rsIDSNewRulesTable",
    name_field: "rsIDSNewRulesName",
    addressing: Addressing::Name,
    fields: &[
        FieldSpec::text("source", "rsIDSNewRulesSource"),
        FieldSpec::text("destination", "rsIDSNewRulesDestination"),
        FieldSpec::new(
            "direction",
            "rsIDSNewRulesDirection",
            Codec::Enum(&[("oneway", "1"), ("twoway", "2")]),
        ),
        FieldSpec::new("state", "rsIDSNewRulesState", SWITCH),
        FieldSpec::new(
            "action",
            "rsIDSNewRulesAction",
            Codec::Enum(&[("report_only", "0"), ("block", "1")]),
        ),
        FieldSpec::new("packet_reporting", "rsIDSNewRulesPacketReportingStatus", SWITCH),
        FieldSpec::new("priority", "rsIDSNewRulesPriority", NUMBER),
        FieldSpec::text("cl_profile", "rsIDSNewRulesProfileConlmt"),
        FieldSpec::text("bdos_profile", "rsIDSNewRulesProfileNetflood"),
        FieldSpec::text("syn_profile", "rsIDSNewRulesProfileSynprotection"),
        FieldSpec::text("dns_profile", "rsIDSNewRulesProfileDNS"),
        FieldSpec::text("https_profile", "rsIDSNewRulesProfileHttpsflood"),
        FieldSpec::text("oos_profile", "rsIDSNewRulesProfileStateful"),
        FieldSpec::text("appsec_profile", "rsIDSNewRulesProfileAppsec"),
        FieldSpec::text("traffic_filter_profile", "rsIDSNewRulesProfileTrafficFilters"),
        FieldSpec::text("geo_feed_profile", "rsIDSNewRulesProfileGeoFeed"),
        FieldSpec::text("ert_attackers_feed_profile", "rsIDSNewRulesProfileErtAttackersFeed"),
    ],
    defaults: &[
        ("rsIDSNewRulesSource", "any"),
        ("rsIDSNewRulesDestination", "any"),
        ("rsIDSNewRulesDirection", "1"),
        ("rsIDSNewRulesState", "1"),
        ("rsIDSNewRulesAction", "1"),
        ("rsIDSNewRulesPacketReportingStatus", "2"),
        ("rsIDSNewRulesPriority", "100"),
    ],
    deferred: &[],
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn test_every_kind_has_spec_with_matching_tag() {
        for kind in ResourceKind::ALL {
            let spec = kind.spec();
            assert_eq!(spec.kind, kind);
            assert!(spec.table.starts_with("rs"));
        }
    }

    #[test]
    fn test_defaults_reference_declared_columns() {
        for kind in ResourceKind::ALL {
            let spec = kind.spec();
            for (wire, _) in spec.defaults {
                assert!(
                    spec.fields.iter().any(|f| f.wire == *wire) || *wire == "rsBWMNetworkMode",
                    "{kind}: default for undeclared column {wire}"
                );
            }
        }
    }

    #[test]
    fn test_encode_partial_attributes() {
        let spec = ResourceKind::ClProtection.spec();
        let body = spec
            .encode_attributes(&attrs(&[("threshold", json!(500)), ("action", json!("drop"))]))
            .unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body["rsIDSConnectionLimitAttackThreshold"], json!("500"));
        assert_eq!(body["rsIDSConnectionLimitAttackReportMode"], json!("10"));
    }

    #[test]
    fn test_encode_rejects_unknown_attribute() {
        let spec = ResourceKind::OosProfile.spec();
        let err = spec
            .encode_attributes(&attrs(&[("colour", json!("blue"))]))
            .unwrap_err();
        assert!(err.to_string().contains("unknown attribute 'colour'"));
    }

    #[test]
    fn test_containers_declare_member_kind() {
        assert_eq!(
            ResourceKind::ClProfile.spec().member_kind(),
            Some(ResourceKind::ClProtection)
        );
        assert_eq!(
            ResourceKind::SynProfile.spec().member_kind(),
            Some(ResourceKind::SynProtection)
        );
        assert_eq!(ResourceKind::BdosProfile.spec().member_kind(), None);
        assert_eq!(ResourceKind::TrafficFilter.spec().member_kind(), None);
        assert!(ResourceKind::TrafficFilter.spec().takes_member());
        assert!(!ResourceKind::TrafficFilterProfile.spec().takes_member());
    }

    #[test]
    fn test_deferred_columns_are_declared_fields() {
        for kind in ResourceKind::ALL {
            let spec = kind.spec();
            for wire in spec.deferred {
                assert!(
                    spec.fields.iter().any(|f| f.wire == *wire),
                    "{kind}: deferred column {wire} has no field"
                );
            }
        }
        assert_eq!(ResourceKind::DnsProfile.spec().deferred.len(), 9);
    }

    #[test]
    fn test_ssl_object_port_bounds() {
        let spec = ResourceKind::SslObject.spec();
        let body = spec.encode_attributes(&attrs(&[("port", json!(8443))])).unwrap();
        assert_eq!(body["rsProtectedObjApplPort"], json!("8443"));
        assert!(spec.encode_attributes(&attrs(&[("port", json!(70_000))])).is_err());
        assert_eq!(spec.default_body()["rsProtectedObjApplPort"], json!("443"));
    }

    #[test]
    fn test_traffic_filter_protocol_labels() {
        let spec = ResourceKind::TrafficFilter.spec();
        let body = spec
            .encode_attributes(&attrs(&[("protocol", json!("UDP")), ("tcp_syn", json!("disable"))]))
            .unwrap();
        assert_eq!(body["rsNewTrafficFilterProtocol"], json!("2"));
        assert_eq!(body["rsNewTrafficFilterTCPFlagsSyn"], json!("2"));
    }

    #[test]
    fn test_security_policy_defaults() {
        let body = ResourceKind::SecurityPolicy.spec().default_body();
        assert_eq!(body["rsIDSNewRulesSource"], json!("any"));
        assert_eq!(body["rsIDSNewRulesPriority"], json!("100"));
    }
}
