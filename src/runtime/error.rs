//! Error types for the Stagehand runtime
//!
//! Domain errors use thiserror; the binary converts them with anyhow at the
//! boundary. Instruction dispatch itself never fails (see `dispatch`).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level runtime error
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Script compilation errors
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Actor registry errors
    #[error("Actor error: {0}")]
    Actor(#[from] ActorError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Structural script errors, reported before a script can run
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    /// A `control_end` with no open C-block
    #[error("block {index}: `control_end` has no matching opener")]
    UnmatchedCloser {
        /// Index of the closer in the source block list
        index: usize,
    },

    /// A C-block opener that is never closed
    #[error("block {index}: `{opcode}` is never closed")]
    UnclosedBlock {
        /// Index of the opener in the source block list
        index: usize,
        /// Opcode of the opener
        opcode: String,
    },

    /// A trigger block anywhere but the head of the script
    #[error("block {index}: trigger `{opcode}` must be the first block")]
    MisplacedTrigger {
        /// Index of the trigger in the source block list
        index: usize,
        /// Opcode of the trigger
        opcode: String,
    },

    /// A trigger whose key or message input is not a literal
    #[error("block {index}: trigger `{opcode}` needs a literal input")]
    InvalidTrigger {
        /// Index of the trigger in the source block list
        index: usize,
        /// Opcode of the trigger
        opcode: String,
    },
}

/// Convenience result alias for compilation
pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Actor registry errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActorError {
    /// Actor not found
    #[error("Actor '{0}' not found")]
    NotFound(String),

    /// Actor name already registered
    #[error("Actor '{0}' already exists")]
    AlreadyExists(String),

    /// Clone-only operation applied to an original actor
    #[error("Actor '{0}' is not a clone")]
    NotAClone(String),

    /// The stage already holds the maximum number of clones
    #[error("Clone limit of {0} reached")]
    CloneLimit(usize),
}

/// Convenience result alias for actor operations
pub type ActorResult<T> = std::result::Result<T, ActorError>;

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Project body does not match its recorded checksum
    #[error("Checksum mismatch in {path}: expected {expected}, found {found}")]
    ChecksumMismatch {
        /// File that failed verification
        path: PathBuf,
        /// Checksum recorded in the file
        expected: String,
        /// Checksum of the body as read
        found: String,
    },

    /// Project written by an unknown format version
    #[error("Unsupported project format {found} (expected {expected})")]
    UnsupportedFormat {
        /// Format version in the file
        found: u32,
        /// Format version this build reads
        expected: u32,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type using RuntimeError
pub type Result<T> = std::result::Result<T, RuntimeError>;
