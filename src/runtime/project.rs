//! Serializable project description
//!
//! A project is what the editor saves: every original sprite with its initial
//! state, variables, and source blocks, plus the global variables. Clones are
//! runtime-only and never part of a project.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::RuntimeConfig;
use super::actor::{Actor, ActorRegistry, ActorState};
use super::block::Block;
use super::compile::compile_scripts;
use super::error::{Result, RuntimeError};
use super::scheduler::Scheduler;
use super::value::Value;

/// One sprite as stored in a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRecord {
    /// Unique sprite name
    pub name: String,
    /// Initial state
    #[serde(default)]
    pub state: ActorState,
    /// Initial per-sprite variables
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    /// Scripts as source block lists
    #[serde(default)]
    pub scripts: Vec<Vec<Block>>,
}

impl ActorRecord {
    /// Empty sprite record
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ActorState::default(),
            variables: BTreeMap::new(),
            scripts: Vec::new(),
        }
    }

    /// Builder-style script
    pub fn with_script(mut self, blocks: Vec<Block>) -> Self {
        self.scripts.push(blocks);
        self
    }

    /// Builder-style variable
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

/// A complete program: sprites and globals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Global variables
    #[serde(default)]
    pub globals: BTreeMap<String, Value>,
    /// Sprites in stage order
    #[serde(default)]
    pub actors: Vec<ActorRecord>,
}

impl Project {
    /// Empty project
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style sprite
    pub fn with_actor(mut self, actor: ActorRecord) -> Self {
        self.actors.push(actor);
        self
    }

    /// Builder-style global
    pub fn with_global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    /// Compile every sprite into a fresh registry.
    ///
    /// Fails on the first script with a structural error or on a duplicate
    /// sprite name.
    pub fn compile(&self) -> Result<ActorRegistry> {
        let mut registry = ActorRegistry::new();
        for record in &self.actors {
            let scripts = compile_scripts(&record.scripts).map_err(|err| {
                tracing::warn!(actor = %record.name, error = %err, "script rejected");
                RuntimeError::Compile(err)
            })?;
            let mut actor = Actor::new(record.name.as_str(), scripts).with_state(record.state.clone());
            actor.variables = record
                .variables
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            registry.insert(actor)?;
        }
        Ok(registry)
    }
}

impl Scheduler {
    /// Build a stopped scheduler for `project`
    pub fn from_project(config: RuntimeConfig, project: &Project) -> Result<Self> {
        let registry = project.compile()?;
        let mut scheduler = Scheduler::with_actors(config, registry);
        for (name, value) in &project.globals {
            scheduler.set_global(name.clone(), value.clone());
        }
        tracing::info!(
            actors = project.actors.len(),
            globals = project.globals.len(),
            "project loaded"
        );
        Ok(scheduler)
    }

    /// Snapshot the stage as a project: original sprites with their current
    /// state and variables. Clones are left out.
    pub fn project(&self) -> Project {
        let actors = self
            .actors()
            .iter()
            .filter(|actor| !actor.is_clone())
            .map(|actor| ActorRecord {
                name: actor.id.0.clone(),
                state: ActorState {
                    speech: None,
                    ..actor.state.clone()
                },
                variables: actor
                    .variables
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
                scripts: actor
                    .scripts
                    .iter()
                    .map(|script| script.source.to_vec())
                    .collect(),
            })
            .collect();

        Project {
            globals: self
                .globals()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            actors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::block::blocks::*;
    use crate::runtime::error::CompileError;

    fn sample() -> Project {
        Project::new()
            .with_global("gravity", -1.0)
            .with_actor(
                ActorRecord::new("cat")
                    .with_variable("hp", 3.0)
                    .with_script(vec![when_flag_clicked(), move_steps(10.0)]),
            )
            .with_actor(ActorRecord::new("dog"))
    }

    #[test]
    fn test_compile_keeps_stage_order() {
        let registry = sample().compile().unwrap();
        let names: Vec<_> = registry.iter().map(|actor| actor.id.as_str()).collect();
        assert_eq!(names, vec!["cat", "dog"]);
        assert_eq!(registry.get(&"cat".into()).unwrap().scripts.len(), 1);
    }

    #[test]
    fn test_compile_rejects_broken_script() {
        let project = Project::new()
            .with_actor(ActorRecord::new("cat").with_script(vec![when_flag_clicked(), forever()]));
        match project.compile() {
            Err(RuntimeError::Compile(CompileError::UnclosedBlock { index, .. })) => {
                assert_eq!(index, 1)
            }
            other => panic!("expected unclosed block, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_rejects_duplicate_names() {
        let project = Project::new()
            .with_actor(ActorRecord::new("cat"))
            .with_actor(ActorRecord::new("cat"));
        assert!(matches!(project.compile(), Err(RuntimeError::Actor(_))));
    }

    #[test]
    fn test_project_snapshot_excludes_clones() {
        let mut scheduler = Scheduler::from_project(RuntimeConfig::default(), &sample()).unwrap();
        scheduler.start();
        scheduler.create_clone(&"cat".into()).unwrap();

        let snapshot = scheduler.project();
        assert_eq!(snapshot.actors.len(), 2);
        assert_eq!(snapshot.globals["gravity"], Value::Number(-1.0));
        assert_eq!(snapshot.actors[0].scripts, sample().actors[0].scripts);
    }
}
