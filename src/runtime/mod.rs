//! Runtime orchestrator and public API
//!
//! This module provides the main `Runtime` struct that ties the scheduler to
//! on-disk storage and exposes the public interface for embedding the runtime
//! in an editor or driving it from the CLI.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// Submodules
pub mod actor;
pub mod block;
pub mod broadcast;
pub mod clone;
pub mod compile;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod ir;
pub mod project;
pub mod scheduler;
pub mod storage;
pub mod thread;
pub mod timer;
pub mod value;

/// Configuration for the Stagehand runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Root directory for runtime storage (default: .stagehand/)
    pub root: PathBuf,

    /// Delay between two instructions of the same thread, in milliseconds
    pub tick_interval_ms: u64,

    /// How often a sleeping thread re-checks its wake time, in milliseconds
    pub wait_poll_interval_ms: u64,

    /// Interval between glide animation frames, in milliseconds
    pub glide_frame_interval_ms: u64,

    /// How long an untimed `say` bubble stays up, in milliseconds
    pub say_duration_ms: u64,

    /// Maximum number of live clones on the stage
    pub max_clones: usize,

    /// Capacity of the stage event buffer between two drains
    pub max_events: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".stagehand"),
            tick_interval_ms: 10,
            wait_poll_interval_ms: 50,
            glide_frame_interval_ms: 16,
            say_duration_ms: 3000,
            max_clones: 300,
            max_events: 1024,
        }
    }
}

impl RuntimeConfig {
    /// Instruction tick; never zero so a thread always yields
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Sleep re-check interval; never zero
    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms.max(1))
    }

    /// Glide frame interval; never zero
    pub fn glide_frame_interval(&self) -> Duration {
        Duration::from_millis(self.glide_frame_interval_ms.max(1))
    }

    /// Lifetime of an untimed speech bubble
    pub fn say_duration(&self) -> Duration {
        Duration::from_millis(self.say_duration_ms)
    }
}

use storage::Storage;

/// Scheduler shared between the host and the real-time driver
pub type SharedScheduler = Arc<Mutex<Scheduler>>;

/// The main runtime orchestrator
///
/// Owns the storage root and one shared scheduler.
pub struct Runtime {
    config: RuntimeConfig,
    storage: Storage,
    scheduler: SharedScheduler,
}

impl Runtime {
    /// Create a new runtime with an empty stage
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let storage = Storage::new(config.root.clone());
        let scheduler = Arc::new(Mutex::new(Scheduler::new(config.clone())));

        Ok(Self {
            config,
            storage,
            scheduler,
        })
    }

    /// Initialize runtime storage directories and metadata
    pub fn init(config: RuntimeConfig) -> Result<()> {
        storage::init_storage(&config.root)?;
        storage::write_config(&config)?;
        tracing::info!(root = %config.root.display(), "runtime initialized");
        Ok(())
    }

    /// Load an existing runtime from storage
    pub fn load(root: PathBuf) -> Result<Self> {
        let mut config = storage::load_config(&root)?;
        config.root = root;
        Self::new(config)
    }

    /// Get the current configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the storage manager
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Shared handle to the scheduler
    pub fn scheduler(&self) -> SharedScheduler {
        Arc::clone(&self.scheduler)
    }

    /// Lock the scheduler for direct access
    pub fn scheduler_mut(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler.lock()
    }

    /// Real-time driver over the shared scheduler
    pub fn driver(&self) -> Driver {
        Driver::new(self.scheduler())
    }

    /// Replace the stage with `project`. Any run in progress is stopped.
    pub fn install(&self, project: &Project) -> Result<()> {
        let fresh = Scheduler::from_project(self.config.clone(), project)?;
        let mut scheduler = self.scheduler.lock();
        scheduler.stop();
        *scheduler = fresh;
        Ok(())
    }

    /// Load the project saved under `name` onto the stage
    pub fn load_project(&self, name: &str) -> Result<()> {
        let project = self.storage.load_project(name)?;
        self.install(&project)
    }

    /// Load a project file (saved envelope or bare export) onto the stage
    pub fn import_project(&self, path: &Path) -> Result<()> {
        let project = self.storage.import_project(path)?;
        self.install(&project)
    }

    /// Save the current stage under `name`
    pub fn save_project(&self, name: &str) -> Result<PathBuf> {
        let project = self.scheduler.lock().project();
        Ok(self.storage.save_project(name, &project)?)
    }
}

// Re-export commonly used types
pub use actor::{Actor, ActorId, ActorState};
pub use block::{Block, BlockInput};
pub use error::{Result, RuntimeError};
pub use driver::Driver;
pub use project::{ActorRecord, Project};
pub use scheduler::{ExecutionStats, Scheduler, StageEvent};
pub use thread::ThreadId;
pub use timer::StageTime;
pub use value::Value;
