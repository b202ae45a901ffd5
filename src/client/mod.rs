//! Management controller client.
//!
//! This module provides:
//! - The session-cached HTTP client
//! - Session cache backends (in-memory and file)
//! - REST path templates

mod controller;
pub mod paths;
mod session;
mod store;

pub use controller::{ControllerClient, HttpMethod};
pub use session::{Session, fingerprint};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
