//! Common test utilities

use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory and the path of a config file inside it
pub fn temp_config() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("tokpin.cfg");
    (temp_dir, config_path)
}
