//! Declarative value encoding from operator-facing attributes to wire values.
//!
//! Every function here is pure: a value goes in, a wire string or an
//! [`ItemError::Validation`] comes out.

use serde_json::Value;

use crate::error::ItemError;

/// Generic numeric range for counters and thresholds without a documented bound.
pub const NUMBER: Codec = Codec::Range {
    min: 0,
    max: 4_294_967_295,
};

/// `enable`/`disable` switch shared by most tables.
pub const SWITCH: Codec = Codec::Enum(&[("enable", "1"), ("disable", "2")]);

/// How an attribute value becomes a wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Passed through as text.
    Text,
    /// Label to wire code, matched case-insensitively.
    Enum(&'static [(&'static str, &'static str)]),
    /// Unsigned integer within inclusive bounds.
    Range {
        /// Lowest accepted value.
        min: u64,
        /// Highest accepted value.
        max: u64,
    },
}

/// One operator-facing attribute of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Attribute name in desired-state files.
    pub name: &'static str,
    /// Column name in the controller table.
    pub wire: &'static str,
    /// Value encoding.
    pub codec: Codec,
}

impl FieldSpec {
    /// Declares a free-text field.
    #[must_use]
    pub const fn text(name: &'static str, wire: &'static str) -> Self {
        Self {
            name,
            wire,
            codec: Codec::Text,
        }
    }

    /// Declares a field with an explicit codec.
    #[must_use]
    pub const fn new(name: &'static str, wire: &'static str, codec: Codec) -> Self {
        Self { name, wire, codec }
    }

    /// Encodes one attribute value.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-scalar values, unmapped enum labels
    /// and numbers that fail to parse or fall outside the range.
    pub fn encode(&self, value: &Value) -> Result<String, ItemError> {
        let Some(raw) = scalar_text(value) else {
            return Err(ItemError::validation(
                format!("'{}' must be a scalar value", self.name),
                self.name,
            ));
        };

        match self.codec {
            Codec::Text => Ok(raw),
            Codec::Enum(table) => {
                let label = raw.trim().to_ascii_lowercase();
                table
                    .iter()
                    .find(|(l, _)| *l == label)
                    .map(|(_, code)| (*code).to_string())
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = table.iter().map(|(l, _)| *l).collect();
                        ItemError::validation(
                            format!(
                                "invalid value '{raw}' for '{}', allowed: {}",
                                self.name,
                                allowed.join(", ")
                            ),
                            self.name,
                        )
                    })
            }
            Codec::Range { min, max } => {
                let number: u64 = raw.trim().parse().map_err(|_| {
                    ItemError::validation(
                        format!("'{}' must be an unsigned integer, got '{raw}'", self.name),
                        self.name,
                    )
                })?;
                if number < min || number > max {
                    return Err(ItemError::validation(
                        format!("'{}' must be between {min} and {max}, got {number}", self.name),
                        self.name,
                    ));
                }
                Ok(number.to_string())
            }
        }
    }
}

/// Renders a JSON scalar the way the controller stores it.
///
/// The controller reports every column as a string; numbers and booleans
/// from desired-state files are compared in that form.
#[must_use]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ACTION: FieldSpec = FieldSpec::new(
        "action",
        "rsIDSConnectionLimitAttackReportMode",
        Codec::Enum(&[("report_only", "0"), ("drop", "10")]),
    );

    #[test]
    fn test_enum_maps_labels() {
        assert_eq!(ACTION.encode(&json!("drop")).unwrap(), "10");
        assert_eq!(ACTION.encode(&json!("Report_Only")).unwrap(), "0");
    }

    #[test]
    fn test_enum_rejects_unmapped_label() {
        let err = ACTION.encode(&json!("block")).unwrap_err();
        assert!(matches!(err, ItemError::Validation { field: Some(ref f), .. } if f == "action"));
        assert!(err.to_string().contains("report_only, drop"));
    }

    #[test]
    fn test_enum_rejects_raw_wire_code() {
        assert!(ACTION.encode(&json!("10")).is_err());
    }

    #[test]
    fn test_range_bounds() {
        let bandwidth = FieldSpec::new(
            "inbound_traffic",
            "rsNetFloodProfileBandwidthIn",
            Codec::Range {
                min: 1,
                max: 1_342_177_280,
            },
        );
        assert_eq!(bandwidth.encode(&json!(50000)).unwrap(), "50000");
        assert_eq!(bandwidth.encode(&json!("42")).unwrap(), "42");
        assert!(bandwidth.encode(&json!(0)).is_err());
        assert!(bandwidth.encode(&json!(1_342_177_281_u64)).is_err());
        assert!(bandwidth.encode(&json!("lots")).is_err());
        assert!(bandwidth.encode(&json!(-3)).is_err());
    }

    #[test]
    fn test_text_rejects_structures() {
        let source = FieldSpec::text("source", "rsIDSNewRulesSource");
        assert_eq!(source.encode(&json!("any")).unwrap(), "any");
        assert!(source.encode(&json!(["a", "b"])).is_err());
        assert!(source.encode(&Value::Null).is_err());
    }
}
