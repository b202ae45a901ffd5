//! Configuration module for dpsync.
//!
//! This module handles all configuration-related functionality:
//! - Validated controller connection settings
//! - Parsing the desired-state file and applying environment overrides
//! - Validating descriptors before any device is touched

mod parser;
mod settings;
mod validator;

pub use parser::{
    ConfigParser, ControllerSection, DeletionGroup, DesiredState, DeviceSpec, SessionStoreKind,
    find_config_file,
};
pub use settings::{ControllerSettings, LogLevel};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
