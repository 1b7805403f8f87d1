//! Error types for Tokpin

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Tokpin operations
pub type Result<T> = std::result::Result<T, TokpinError>;

/// Main error type for Tokpin
#[derive(Error, Debug)]
pub enum TokpinError {
    /// Command-line argument errors
    #[error("Argument error: {0}")]
    Args(#[from] ArgsError),

    /// Credential store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Secret protection errors
    #[error("Protection error: {0}")]
    Protect(#[from] ProtectError),

    /// Token unlock errors
    #[error("Unlock error: {0}")]
    Unlock(#[from] UnlockError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Argument-index errors
#[derive(Error, Debug)]
pub enum ArgsError {
    #[error("switch name must not be empty")]
    EmptyName,

    #[error("switch '-{name}' has no usable numeric value (got {value:?})")]
    InvalidNumber { name: String, value: Option<String> },
}

/// Credential registry errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("container '{0}' is already registered")]
    DuplicateContainer(String),

    #[error("alias '{0}' is already in use")]
    DuplicateAlias(String),

    #[error("failed to read config file '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write config file '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Protect(#[from] ProtectError),
}

/// Secret-protection capability errors
#[derive(Error, Debug)]
pub enum ProtectError {
    #[error("protected secret is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("protected secret is truncated or malformed")]
    Malformed,

    #[error("protected secret has unknown scope tag {0:#04x}")]
    UnknownScope(u8),

    #[error("unable to protect secret")]
    Protect,

    #[error("unable to recover secret (wrong scope or corrupt data)")]
    Unprotect,
}

/// Token-unlock capability errors
#[derive(Error, Debug)]
pub enum UnlockError {
    #[error("failed to launch unlock helper '{program}': {source}")]
    Spawn { program: String, source: io::Error },

    #[error("could not open container '{0}'")]
    OpenFailed(String),

    #[error("container '{0}' rejected the submitted secret")]
    SubmitFailed(String),
}

/// Specialized result type for argument-index operations
pub type ArgsResult<T> = std::result::Result<T, ArgsError>;

/// Specialized result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Specialized result type for protection operations
pub type ProtectResult<T> = std::result::Result<T, ProtectError>;

/// Specialized result type for unlock operations
pub type UnlockResult<T> = std::result::Result<T, UnlockError>;
