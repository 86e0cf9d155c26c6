//! Stagehand – a cooperative script scheduler for block-based sprite programs
//!
//! This crate runs programs made of instruction blocks attached to actors
//! ("sprites"). It provides:
//! - A green-thread scheduler that interleaves many scripts without preemption
//! - Nested `repeat`/`forever`/`if` control flow with compile-time bracket matching
//! - Timed suspension on a simulated clock (or a real-time tokio driver)
//! - Cross-actor broadcasts and runtime actor cloning
//! - A serializable project projection for persistence

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Runtime core modules implementing the script scheduler
pub mod runtime;

// Re-export key types for convenience
pub use runtime::{Runtime, RuntimeConfig, Scheduler};

/// Current version of the Stagehand runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Project file format version written by [`runtime::storage`]
pub const PROJECT_FORMAT: u32 = 1;
