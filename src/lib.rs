// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # dpsync
//!
//! Declarative, preview-safe configuration of network security appliances
//! through their management controller's REST API.
//!
//! ## Overview
//!
//! A desired-state file lists, per device, the resources to create, edit
//! and delete (network classes, protections, profiles, security policies).
//! dpsync reconciles each device against it:
//!
//! - One authenticated controller session, cached and reused within its TTL
//! - The device configuration lock held for the whole batch and always released
//! - Only the calls needed to converge, planned once and shared by preview and apply
//! - Member deletions ordered after the container detaches that free them
//! - An explicit commit of pending policies, immediate or deferred
//!
//! ## Modules
//!
//! - [`client`]: Session-cached controller client and session stores
//! - [`device`]: Device targets, lock coordination, policy commit
//! - [`resource`]: Resource types, wire mapping tables, descriptors, listings
//! - [`planner`]: Operation plans, deletion planning, plan execution
//! - [`reconciler`]: Create, edit, get and delete batches per resource type
//! - [`config`]: Controller settings, desired-state parsing and validation
//! - [`cli`]: Command-line interface and per-device orchestration
//!
//! ## Example
//!
//! ```yaml
//! controller:
//!   host: 10.0.0.3
//!   username: automation
//!   verify_tls: false
//!
//! devices:
//!   - address: 10.0.0.5
//!     create:
//!       cl_protection:
//!         - name: web_cps
//!           index: 450001
//!           protocol: tcp
//!           threshold: 500
//!     edit:
//!       bdos_profile:
//!         - name: branch
//!           action: block_and_report
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod client;
pub mod config;
pub mod device;
pub mod error;
pub mod planner;
pub mod reconciler;
pub mod resource;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{ControllerClient, FileSessionStore, MemorySessionStore, SessionStore};
pub use config::{ConfigParser, ConfigValidator, ControllerSettings, DesiredState};
pub use device::{DeviceTarget, LockCoordinator, LockPolicy, PolicyCommit};
pub use error::{Result, SyncError};
pub use planner::{BatchResult, DeletionPlanner, ExecutionMode, OperationPlan};
pub use reconciler::Reconciler;
pub use resource::{DescriptorInput, ResourceKind};
