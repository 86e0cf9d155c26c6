//! Stagehand CLI - Command-line interface for the Stagehand runtime
//!
//! Provides subcommands for initializing a storage root, validating project
//! files, saving them into the root, and running them headless.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use stagehand::runtime::{
    ActorId, ActorState, ExecutionStats, Runtime, RuntimeConfig, StageEvent, StageTime, storage,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Cooperative script scheduler for block-based sprite programs", long_about = None)]
struct Cli {
    /// Root directory for runtime storage
    #[arg(short, long, default_value = ".stagehand")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new storage root
    Init {
        /// Delay between two instructions of one script, in milliseconds
        #[arg(long, default_value = "10")]
        tick_ms: u64,

        /// Maximum number of live clones
        #[arg(long, default_value = "300")]
        max_clones: usize,
    },

    /// Compile a project file and report its scripts
    Check {
        /// Project file (saved envelope or bare export)
        project: PathBuf,
    },

    /// Save a project file into the storage root
    Save {
        /// Project file (saved envelope or bare export)
        project: PathBuf,

        /// Name to save under
        #[arg(long)]
        name: String,
    },

    /// List projects saved in the storage root
    List,

    /// Run a project headless and print the final stage as JSON
    Run {
        /// Project file, or the name of a saved project
        project: String,

        /// How long to run, in stage milliseconds
        #[arg(long, default_value = "1000")]
        millis: u64,

        /// Pace the run against the wall clock instead of simulating time
        #[arg(long)]
        realtime: bool,

        /// Key presses delivered right after the start
        #[arg(long = "key")]
        keys: Vec<String>,

        /// Messages broadcast right after the start
        #[arg(long = "broadcast")]
        broadcasts: Vec<String>,
    },
}

#[derive(Serialize)]
struct ActorReport {
    name: ActorId,
    clone: bool,
    state: ActorState,
    speech: Option<String>,
}

#[derive(Serialize)]
struct RunReport {
    elapsed: StageTime,
    running: bool,
    stats: ExecutionStats,
    actors: Vec<ActorReport>,
    events: Vec<StageEvent>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { tick_ms, max_clones } => {
            let root = cli.root.clone();
            let config = RuntimeConfig {
                root: cli.root,
                tick_interval_ms: tick_ms,
                max_clones,
                ..RuntimeConfig::default()
            };

            Runtime::init(config)?;
            println!("Initialized Stagehand runtime at {:?}", root);
        }

        Commands::Check { project } => {
            let runtime = open(&cli.root)?;
            let loaded = runtime
                .storage()
                .import_project(&project)
                .with_context(|| format!("Failed to read project {:?}", project))?;
            runtime.install(&loaded)?;

            for record in &loaded.actors {
                println!("{}: {} script(s)", record.name, record.scripts.len());
            }
            println!("OK");
        }

        Commands::Save { project, name } => {
            let runtime = open(&cli.root)?;
            runtime.import_project(&project)?;
            let path = runtime.save_project(&name)?;
            println!("Saved {:?}", path);
        }

        Commands::List => {
            let runtime = open(&cli.root)?;
            for name in runtime.storage().list_projects()? {
                println!("{}", name);
            }
        }

        Commands::Run {
            project,
            millis,
            realtime,
            keys,
            broadcasts,
        } => {
            let runtime = open(&cli.root)?;
            let path = Path::new(&project);
            if path.exists() {
                runtime.import_project(path)?;
            } else {
                runtime.load_project(&project)?;
            }

            {
                let mut scheduler = runtime.scheduler_mut();
                scheduler.start();
                for key in &keys {
                    scheduler.key_pressed(key);
                }
                for message in &broadcasts {
                    scheduler.broadcast(message);
                }
            }

            let duration = Duration::from_millis(millis);
            if realtime {
                runtime.driver().run_for(duration).await;
            } else {
                runtime.scheduler_mut().advance(duration);
            }

            let mut scheduler = runtime.scheduler_mut();
            let now = scheduler.now();
            let report = RunReport {
                elapsed: now,
                running: scheduler.is_running(),
                stats: scheduler.stats(),
                actors: scheduler
                    .actors()
                    .iter()
                    .map(|actor| ActorReport {
                        name: actor.id.clone(),
                        clone: actor.is_clone(),
                        state: actor.state.clone(),
                        speech: actor.state.speech_at(now).map(str::to_string),
                    })
                    .collect(),
                events: scheduler.drain_events(),
            };
            scheduler.stop();

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Open the storage root if it was initialized, otherwise use defaults there
fn open(root: &Path) -> anyhow::Result<Runtime> {
    if storage::Storage::new(root.to_path_buf()).config_path().exists() {
        Ok(Runtime::load(root.to_path_buf())?)
    } else {
        Ok(Runtime::new(RuntimeConfig {
            root: root.to_path_buf(),
            ..RuntimeConfig::default()
        })?)
    }
}
