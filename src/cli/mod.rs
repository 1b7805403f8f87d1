//! CLI dispatcher
//!
//! This module owns command dispatch, usage output, and the mapping from
//! failures to process exit codes.

pub mod app;

// Re-export main types
pub use app::*;
