//! Tokpin - a local registry for security-token credentials
//!
//! Tokpin maps token container ids (and human-friendly aliases) to secrets
//! that are encrypted at rest, and drives an external token-unlock helper
//! with them.

// Public modules
pub mod args;
pub mod cli;
pub mod error;
pub mod protect;
pub mod store;
pub mod unlock;

// Re-export commonly used types
pub use error::{Result, TokpinError};

/// Current version of Tokpin
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
