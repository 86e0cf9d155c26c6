//! Actors, their visual state, variable stores, and the actor registry
//!
//! An actor is a sprite or a clone of one. Clones share script definitions
//! with their origin (`Arc<Script>`) but own independent state and variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::{ActorError, ActorResult};
use super::ir::Script;
use super::timer::StageTime;
use super::value::Value;

/// Actor identifier: the actor's unique name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    /// Create an actor ID from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the inner name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActorId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Variable name → value mapping.
pub type VariableStore = HashMap<String, Value>;

/// A speech bubble attached to an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speech {
    /// Bubble text
    pub text: String,
    /// Stage time at which the bubble disappears
    pub until: StageTime,
}

/// Motion and appearance state, read by the render layer each frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorState {
    /// Horizontal position
    #[serde(with = "super::value::number")]
    pub x: f64,
    /// Vertical position
    #[serde(with = "super::value::number")]
    pub y: f64,
    /// Heading in degrees; 90 points right, 0 points up
    #[serde(with = "super::value::number")]
    pub direction: f64,
    /// Size as a percentage of the costume size
    #[serde(with = "super::value::number")]
    pub size: f64,
    /// Whether the actor is drawn
    pub visible: bool,
    /// Current speech bubble
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech: Option<Speech>,
}

impl Default for ActorState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            direction: 90.0,
            size: 100.0,
            visible: true,
            speech: None,
        }
    }
}

impl ActorState {
    /// Speech bubble text visible at `now`, if any
    pub fn speech_at(&self, now: StageTime) -> Option<&str> {
        self.speech
            .as_ref()
            .filter(|speech| now < speech.until)
            .map(|speech| speech.text.as_str())
    }

    /// Set the heading, normalized into (-180, 180]. Non-finite headings are
    /// ignored.
    pub fn set_direction(&mut self, degrees: f64) {
        if !degrees.is_finite() {
            return;
        }
        let mut normalized = degrees % 360.0;
        if normalized > 180.0 {
            normalized -= 360.0;
        } else if normalized <= -180.0 {
            normalized += 360.0;
        }
        self.direction = normalized;
    }
}

/// An actor: sprite or clone with its own state and variables
#[derive(Debug, Clone)]
pub struct Actor {
    /// Unique actor ID
    pub id: ActorId,

    /// Motion/appearance state
    pub state: ActorState,

    /// Per-actor variables
    pub variables: VariableStore,

    /// Compiled scripts, shared by reference with clones
    pub scripts: Vec<Arc<Script>>,

    /// Original sprite this actor was cloned from, if it is a clone
    pub clone_of: Option<ActorId>,
}

impl Actor {
    /// Create a new (non-clone) actor
    pub fn new(id: impl Into<ActorId>, scripts: Vec<Arc<Script>>) -> Self {
        Self {
            id: id.into(),
            state: ActorState::default(),
            variables: VariableStore::new(),
            scripts,
            clone_of: None,
        }
    }

    /// Builder-style initial state
    pub fn with_state(mut self, state: ActorState) -> Self {
        self.state = state;
        self
    }

    /// Builder-style initial variable
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Whether this actor is a runtime clone
    pub fn is_clone(&self) -> bool {
        self.clone_of.is_some()
    }
}

impl From<String> for ActorId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Registry of live actors, iterated in registration order
#[derive(Debug, Default, Clone)]
pub struct ActorRegistry {
    actors: HashMap<ActorId, Actor>,
    order: Vec<ActorId>,
}

impl ActorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor; names must be unique
    pub fn insert(&mut self, actor: Actor) -> ActorResult<()> {
        if self.actors.contains_key(&actor.id) {
            return Err(ActorError::AlreadyExists(actor.id.0.clone()));
        }
        self.order.push(actor.id.clone());
        self.actors.insert(actor.id.clone(), actor);
        Ok(())
    }

    /// Remove an actor, returning it
    pub fn remove(&mut self, id: &ActorId) -> ActorResult<Actor> {
        let actor = self
            .actors
            .remove(id)
            .ok_or_else(|| ActorError::NotFound(id.0.clone()))?;
        self.order.retain(|existing| existing != id);
        Ok(actor)
    }

    /// Look up an actor
    pub fn get(&self, id: &ActorId) -> Option<&Actor> {
        self.actors.get(id)
    }

    /// Look up an actor mutably
    pub fn get_mut(&mut self, id: &ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(id)
    }

    /// Whether an actor is registered
    pub fn contains(&self, id: &ActorId) -> bool {
        self.actors.contains_key(id)
    }

    /// Actor IDs in registration order
    pub fn ids(&self) -> &[ActorId] {
        &self.order
    }

    /// Actors in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.order.iter().filter_map(|id| self.actors.get(id))
    }

    /// Number of registered actors
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Number of registered clones
    pub fn clone_count(&self) -> usize {
        self.actors.values().filter(|actor| actor.is_clone()).count()
    }
}
