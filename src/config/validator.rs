//! Desired-state validation.
//!
//! Runs every descriptor through the same key and encoding checks the
//! planner applies, so a malformed file is reported before any device is
//! touched.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use super::parser::{DesiredState, DeviceSpec};
use crate::error::{ConfigError, Result, SyncError};
use crate::planner::DeletionPlanner;
use crate::resource::{DescriptorInput, ResourceDescriptor, ResourceKind};

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if no error was found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// Path of the entry that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

/// Validator for desired-state files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Collects every problem in a desired-state document.
    #[must_use]
    pub fn check(&self, state: &DesiredState) -> ValidationResult {
        let mut result = ValidationResult::default();

        if state.devices.is_empty() {
            result.warnings.push(String::from("No devices defined in desired state"));
        }

        let mut seen = HashSet::new();
        for (i, device) in state.devices.iter().enumerate() {
            let prefix = format!("devices[{i}]");

            if device.address.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.address"),
                    message: String::from("Device address cannot be empty"),
                });
            } else if !seen.insert(device.address.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.address"),
                    message: format!("Duplicate device address: {}", device.address),
                });
            }

            Self::validate_device(device, &prefix, &mut result);
        }

        result
    }

    /// Validates a desired-state document.
    ///
    /// # Errors
    ///
    /// Returns the first error found, if any.
    pub fn validate(&self, state: &DesiredState) -> Result<ValidationResult> {
        let result = self.check(state);

        if let Some(first) = result.errors.first() {
            return Err(SyncError::Config(ConfigError::ValidationError {
                message: first.message.clone(),
                field: Some(first.field.clone()),
            }));
        }

        debug!("Desired state validation passed");
        Ok(result)
    }

    fn validate_device(device: &DeviceSpec, prefix: &str, result: &mut ValidationResult) {
        Self::validate_section(&device.create, &format!("{prefix}.create"), Section::Create, result);
        Self::validate_section(&device.edit, &format!("{prefix}.edit"), Section::Edit, result);
        Self::validate_section(&device.delete, &format!("{prefix}.delete"), Section::Delete, result);

        for (i, group) in device.deletions.iter().enumerate() {
            let path = format!("{prefix}.deletions[{i}]");
            if let Err(e) = DeletionPlanner::new(group.container_type) {
                result.errors.push(ValidationError {
                    field: format!("{path}.container_type"),
                    message: e.to_string(),
                });
                continue;
            }
            if group.request.is_empty() {
                result.warnings.push(format!("{path}: nothing to detach or destroy"));
            }
            for (j, detach) in group.request.detach.iter().enumerate() {
                if detach.container.trim().is_empty() {
                    result.errors.push(ValidationError {
                        field: format!("{path}.detach[{j}].container"),
                        message: String::from("Container name cannot be empty"),
                    });
                }
                if detach.members.is_empty() {
                    result.warnings.push(format!("{path}.detach[{j}]: no members listed"));
                }
            }
        }
    }

    fn validate_section(
        section: &BTreeMap<ResourceKind, Vec<DescriptorInput>>,
        prefix: &str,
        kind_of: Section,
        result: &mut ValidationResult,
    ) {
        for (kind, inputs) in section {
            let mut keys = HashSet::new();
            for (i, input) in inputs.iter().enumerate() {
                let path = format!("{prefix}.{kind}[{i}]");
                let descriptor = match ResourceDescriptor::new(*kind, input) {
                    Ok(d) => d,
                    Err(e) => {
                        result.errors.push(ValidationError {
                            field: path,
                            message: e.to_string(),
                        });
                        continue;
                    }
                };

                if !keys.insert(descriptor.key().clone()) {
                    result.errors.push(ValidationError {
                        field: path.clone(),
                        message: format!("Duplicate {kind} key: {}", descriptor.key()),
                    });
                }

                match kind_of {
                    Section::Delete => {
                        if !input.attributes.is_empty() {
                            result
                                .warnings
                                .push(format!("{path}: attributes are ignored on delete"));
                        }
                    }
                    Section::Create | Section::Edit => {
                        match kind.spec().encode_attributes(descriptor.attributes()) {
                            Ok(fields) if fields.is_empty() && kind_of == Section::Edit => {
                                result.errors.push(ValidationError {
                                    field: path,
                                    message: String::from("Edit specifies no attributes"),
                                });
                            }
                            Ok(_) => {}
                            Err(e) => result.errors.push(ValidationError {
                                field: path,
                                message: e.to_string(),
                            }),
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Create,
    Edit,
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn parse(yaml: &str) -> DesiredState {
        ConfigParser::new().parse_yaml(yaml, None).unwrap()
    }

    #[test]
    fn test_valid_document() {
        let state = parse(
            r"
devices:
  - address: 10.0.0.5
    create:
      bdos_profile:
        - name: b1
          syn_flood: enable
    edit:
      cl_protection:
        - name: p1
          threshold: 500
",
        );
        let result = ConfigValidator::new().validate(&state).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_collects_descriptor_errors() {
        let state = parse(
            r"
devices:
  - address: 10.0.0.5
    create:
      cl_protection:
        - name: p1
          protocol: icmp
        - name: p2
          index: 12
    edit:
      oos_profile:
        - name: o1
  - address: 10.0.0.5
",
        );
        let result = ConfigValidator::new().check(&state);
        let fields: Vec<_> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"devices[0].create.cl_protection[0]"));
        assert!(fields.contains(&"devices[0].create.cl_protection[1]"));
        assert!(fields.contains(&"devices[0].edit.oos_profile[0]"));
        assert!(fields.contains(&"devices[1].address"));

        let err = ConfigValidator::new().validate(&state).unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn test_deletions_require_container_type() {
        let state = parse(
            r"
devices:
  - address: 10.0.0.5
    deletions:
      - container_type: bdos_profile
        destroy: [x]
      - container_type: syn_profile
",
        );
        let result = ConfigValidator::new().check(&state);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "devices[0].deletions[0].container_type");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_duplicate_keys_in_one_section() {
        let state = parse(
            r"
devices:
  - address: 10.0.0.5
    delete:
      https_profile:
        - name: h1
        - name: h1
",
        );
        let result = ConfigValidator::new().check(&state);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("Duplicate https_profile key"));
    }
}
