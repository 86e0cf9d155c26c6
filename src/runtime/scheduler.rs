//! Cooperative script scheduler
//!
//! Owns the actor registry, the live threads, and the wake-up queue. Each
//! thread re-arms its own resume after every instruction; [`Scheduler::advance`]
//! fires due wake-ups in time order on a simulated clock. No instruction ever
//! blocks: suspension is a wake-time plus a later resume.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::RuntimeConfig;
use super::actor::{Actor, ActorId, ActorRegistry, VariableStore};
use super::dispatch::{self, DispatchContext, Effects, Flow, GlideRequest};
use super::error::{ActorError, ActorResult};
use super::ir::{Script, Trigger};
use super::thread::{Thread, ThreadId};
use super::timer::{GlideId, StageTime, TimerEvent, TimerQueue};
use super::value::Value;

/// Events published for the render/UI layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageEvent {
    /// `start()` began a run
    RunStarted {
        /// Run identifier
        run: Uuid,
    },
    /// The run was stopped
    RunStopped {
        /// Run identifier
        run: Uuid,
    },
    /// An actor said something
    Said {
        /// Speaking actor
        actor: ActorId,
        /// Bubble text (empty clears the bubble)
        text: String,
    },
    /// An actor played a sound
    SoundPlayed {
        /// Actor playing the sound
        actor: ActorId,
        /// Sound name
        sound: String,
    },
    /// A message was broadcast
    Broadcast {
        /// Message name
        message: String,
        /// Number of threads started
        receivers: usize,
    },
    /// A clone was created
    CloneCreated {
        /// Actor that was cloned
        origin: ActorId,
        /// New clone
        clone: ActorId,
    },
    /// A clone deleted itself
    CloneDeleted {
        /// Deleted clone
        clone: ActorId,
    },
    /// An actor was removed from the stage
    ActorRemoved {
        /// Removed actor
        actor: ActorId,
    },
}

/// Thread counters for the UI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStats {
    /// Registered threads that are still active
    pub active_threads: usize,
    /// Registered threads
    pub total_threads: usize,
    /// Threads created since the last `start()`
    pub threads_spawned: u64,
    /// Instructions dispatched since the last `start()`
    pub instructions_executed: u64,
    /// Registered actors, clones included
    pub actors: usize,
    /// Registered clones
    pub clones: usize,
    /// Events discarded because the buffer was full
    pub events_dropped: u64,
}

#[derive(Debug, Clone)]
struct Glide {
    actor: ActorId,
    from: (f64, f64),
    to: (f64, f64),
    started: StageTime,
    duration: Duration,
}

impl Glide {
    fn ends_at(&self) -> StageTime {
        self.started + self.duration
    }

    fn position_at(&self, now: StageTime) -> (f64, f64) {
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (now.since(self.started).as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
        };
        (
            self.from.0 + (self.to.0 - self.from.0) * progress,
            self.from.1 + (self.to.1 - self.from.1) * progress,
        )
    }
}

/// The script scheduler: one independent program instance
pub struct Scheduler {
    config: RuntimeConfig,
    pub(crate) actors: ActorRegistry,
    globals: VariableStore,
    threads: BTreeMap<ThreadId, Thread>,
    timers: TimerQueue,
    glides: HashMap<GlideId, Glide>,
    now: StageTime,
    started_at: StageTime,
    running: bool,
    run: Option<Uuid>,
    next_thread: u64,
    next_glide: u64,
    pub(crate) next_clone: u64,
    threads_spawned: u64,
    instructions_executed: u64,
    events: VecDeque<StageEvent>,
    events_dropped: u64,
}

impl Scheduler {
    /// Create an empty, stopped scheduler
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            actors: ActorRegistry::new(),
            globals: VariableStore::new(),
            threads: BTreeMap::new(),
            timers: TimerQueue::new(),
            glides: HashMap::new(),
            now: StageTime::zero(),
            started_at: StageTime::zero(),
            running: false,
            run: None,
            next_thread: 0,
            next_glide: 0,
            next_clone: 0,
            threads_spawned: 0,
            instructions_executed: 0,
            events: VecDeque::new(),
            events_dropped: 0,
        }
    }

    /// Create a scheduler over an existing registry
    pub fn with_actors(config: RuntimeConfig, actors: ActorRegistry) -> Self {
        let mut scheduler = Self::new(config);
        scheduler.actors = actors;
        scheduler
    }

    /// Register an actor
    pub fn add_actor(&mut self, actor: Actor) -> ActorResult<()> {
        self.actors.insert(actor)
    }

    /// Remove an actor (and any clones of it), retiring all of their threads
    pub fn remove_actor(&mut self, id: &ActorId) -> ActorResult<Actor> {
        let actor = self.detach_actor(id)?;
        self.push_event(StageEvent::ActorRemoved { actor: id.clone() });

        let clones: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|candidate| candidate.clone_of.as_ref() == Some(id))
            .map(|candidate| candidate.id.clone())
            .collect();
        for clone in clones {
            self.remove_actor(&clone)?;
        }

        Ok(actor)
    }

    /// Live actor registry
    pub fn actors(&self) -> &ActorRegistry {
        &self.actors
    }

    /// Look up an actor
    pub fn actor(&self, id: &ActorId) -> Option<&Actor> {
        self.actors.get(id)
    }

    /// Global variables
    pub fn globals(&self) -> &VariableStore {
        &self.globals
    }

    /// Set a global variable
    pub fn set_global(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.globals.insert(name.into(), value.into());
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Current stage time
    pub fn now(&self) -> StageTime {
        self.now
    }

    /// Whether a run is in progress
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Identifier of the current run
    pub fn run_id(&self) -> Option<Uuid> {
        self.run
    }

    /// Look up a live thread
    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(&id)
    }

    /// Live threads in creation order
    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.threads.values()
    }

    /// Live threads owned by an actor
    pub fn threads_of<'a>(&'a self, actor: &'a ActorId) -> impl Iterator<Item = &'a Thread> + 'a {
        self.threads.values().filter(move |thread| &thread.actor == actor)
    }

    /// Begin a run: start every `when flag clicked` script on every actor.
    ///
    /// Any previous run is stopped first and clones left over from it are
    /// removed. Each new thread executes its first instruction before this
    /// returns.
    pub fn start(&mut self) -> Vec<ThreadId> {
        self.stop();

        let leftover: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|actor| actor.is_clone())
            .map(|actor| actor.id.clone())
            .collect();
        for clone in leftover {
            self.actors.remove(&clone).ok();
        }

        let run = Uuid::new_v4();
        self.running = true;
        self.run = Some(run);
        self.started_at = self.now;
        self.threads_spawned = 0;
        self.instructions_executed = 0;
        self.push_event(StageEvent::RunStarted { run });
        tracing::info!(%run, actors = self.actors.len(), "run started");

        let spawned = self.start_matching(|trigger| trigger == &Trigger::Start, self.now);
        self.advance_to(self.now);
        spawned
    }

    /// Stop the run: deactivate and discard every thread. Idempotent.
    pub fn stop(&mut self) {
        let was_running = self.running;
        self.running = false;

        for thread in self.threads.values_mut() {
            thread.active = false;
        }
        self.threads.clear();
        self.timers.clear();
        self.glides.clear();

        if was_running {
            if let Some(run) = self.run {
                self.push_event(StageEvent::RunStopped { run });
                tracing::info!(%run, "run stopped");
            }
        }
    }

    /// Start every key-press script matching `key` (or listening for `any`).
    ///
    /// Ignored while no run is in progress.
    pub fn key_pressed(&mut self, key: &str) -> Vec<ThreadId> {
        if !self.running {
            return Vec::new();
        }
        let spawned = self.start_matching(
            |trigger| matches!(trigger, Trigger::KeyPress(k) if k == key || k == "any"),
            self.now,
        );
        self.advance_to(self.now);
        spawned
    }

    /// Advance simulated time by `duration`, firing every due wake-up
    pub fn advance(&mut self, duration: Duration) {
        let deadline = self.now + duration;
        self.advance_to(deadline);
    }

    /// Advance simulated time to `deadline`, firing every due wake-up in order
    pub fn advance_to(&mut self, deadline: StageTime) {
        while let Some(wakeup) = self.timers.pop_due(deadline) {
            if wakeup.at > self.now {
                self.now = wakeup.at;
            }
            match wakeup.event {
                TimerEvent::Resume(id) => self.resume(id),
                TimerEvent::GlideFrame(id) => self.glide_frame(id),
            }
        }
        if deadline > self.now {
            self.now = deadline;
        }
    }

    /// Due time of the next pending wake-up
    pub fn next_wakeup(&self) -> Option<StageTime> {
        self.timers.next_due()
    }

    /// Resume one thread: the single re-entrant scheduling step.
    ///
    /// Inactive threads, or any thread while stopped, are retired. A sleeping
    /// thread re-arms itself without moving. Otherwise one instruction runs
    /// (or the innermost loop wraps at end-of-body) and, if the thread is
    /// still active, its next resume is scheduled one tick later.
    pub fn resume(&mut self, id: ThreadId) {
        let Some(mut thread) = self.threads.remove(&id) else {
            return;
        };

        if !thread.active || !self.running {
            self.retire(thread, "inactive");
            return;
        }

        if thread.is_sleeping(self.now) {
            self.timers.schedule(
                self.now + self.config.wait_poll_interval(),
                TimerEvent::Resume(id),
            );
            self.threads.insert(id, thread);
            return;
        }

        if thread.at_end() {
            match thread.loops.wrap() {
                Some(target) => thread.cursor = target,
                None => {
                    self.retire(thread, "finished");
                    return;
                }
            }
        }

        self.settle_glides(&thread.actor);

        let mut effects = Effects::default();
        let script = Arc::clone(&thread.script);
        if let Some(instruction) = script.body.get(thread.cursor) {
            let outcome = {
                let mut ctx = DispatchContext {
                    thread: &mut thread,
                    actors: &mut self.actors,
                    globals: &self.globals,
                    now: self.now,
                    started_at: self.started_at,
                    config: &self.config,
                    effects: &mut effects,
                };
                dispatch::dispatch(instruction, &mut ctx)
            };
            self.instructions_executed += 1;

            match outcome.flow {
                Flow::Next => thread.cursor += 1,
                Flow::Jump(target) => thread.cursor = target,
            }
            if !outcome.suspend.is_zero() {
                thread.wake_at = self.now + outcome.suspend;
            }
        }

        let actor = thread.actor.clone();
        if !thread.active {
            self.retire(thread, "stopped");
        } else {
            self.threads.insert(id, thread);
        }

        self.apply_effects(&actor, effects);

        if self.running && self.threads.get(&id).is_some_and(|thread| thread.active) {
            self.timers
                .schedule(self.now + self.config.tick_interval(), TimerEvent::Resume(id));
        }
    }

    /// Counters for the UI
    pub fn stats(&self) -> ExecutionStats {
        ExecutionStats {
            active_threads: self.threads.values().filter(|thread| thread.active).count(),
            total_threads: self.threads.len(),
            threads_spawned: self.threads_spawned,
            instructions_executed: self.instructions_executed,
            actors: self.actors.len(),
            clones: self.actors.clone_count(),
            events_dropped: self.events_dropped,
        }
    }

    /// Take every event published since the last call.
    ///
    /// The buffer holds at most `max_events`; once full, the oldest events
    /// are discarded, so hosts should drain it once per frame.
    pub fn drain_events(&mut self) -> Vec<StageEvent> {
        std::mem::take(&mut self.events).into()
    }

    pub(crate) fn push_event(&mut self, event: StageEvent) {
        let capacity = self.config.max_events.max(1);
        while self.events.len() >= capacity {
            self.events.pop_front();
            self.events_dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Register a thread for `script` on `actor`, first resumed at `first_resume`
    fn spawn(
        &mut self,
        actor: &ActorId,
        script: Arc<Script>,
        first_resume: StageTime,
    ) -> Option<ThreadId> {
        let variables = self.actors.get(actor)?.variables.clone();
        let id = ThreadId(self.next_thread);
        self.next_thread += 1;

        tracing::debug!(thread = %id, %actor, trigger = ?script.trigger, "thread spawned");
        self.threads
            .insert(id, Thread::new(id, actor.clone(), script, variables));
        self.threads_spawned += 1;
        self.timers.schedule(first_resume, TimerEvent::Resume(id));
        Some(id)
    }

    /// Spawn a thread for every script of `actor` whose trigger matches
    pub(crate) fn start_scripts_of(
        &mut self,
        actor: &ActorId,
        matches: impl Fn(&Trigger) -> bool,
        first_resume: StageTime,
    ) -> Vec<ThreadId> {
        let scripts: Vec<Arc<Script>> = match self.actors.get(actor) {
            Some(found) => found
                .scripts
                .iter()
                .filter(|script| matches(&script.trigger))
                .cloned()
                .collect(),
            None => return Vec::new(),
        };

        scripts
            .into_iter()
            .filter_map(|script| self.spawn(actor, script, first_resume))
            .collect()
    }

    /// Spawn a thread for every matching script across all actors, in
    /// registration order
    pub(crate) fn start_matching(
        &mut self,
        matches: impl Fn(&Trigger) -> bool,
        first_resume: StageTime,
    ) -> Vec<ThreadId> {
        let ids: Vec<ActorId> = self.actors.ids().to_vec();
        let mut spawned = Vec::new();
        for actor in &ids {
            spawned.extend(self.start_scripts_of(actor, &matches, first_resume));
        }
        spawned
    }

    /// Unregister an actor and discard its threads and glides
    pub(crate) fn detach_actor(&mut self, id: &ActorId) -> ActorResult<Actor> {
        let actor = self.actors.remove(id)?;
        self.retire_threads_of(id);
        self.glides.retain(|_, glide| &glide.actor != id);
        Ok(actor)
    }

    /// Deactivate and discard every thread owned by `actor`
    fn retire_threads_of(&mut self, actor: &ActorId) {
        let owned: Vec<ThreadId> = self
            .threads
            .values()
            .filter(|thread| &thread.actor == actor)
            .map(|thread| thread.id)
            .collect();
        for id in owned {
            if let Some(thread) = self.threads.remove(&id) {
                self.retire(thread, "actor removed");
            }
        }
    }

    fn retire(&mut self, mut thread: Thread, reason: &str) {
        thread.active = false;
        tracing::debug!(thread = %thread.id, actor = %thread.actor, reason, "thread retired");
    }

    fn apply_effects(&mut self, actor: &ActorId, effects: Effects) {
        for event in effects.events {
            self.push_event(event);
        }

        if effects.stop_all {
            self.stop();
            return;
        }

        for request in effects.glides {
            self.start_glide(request);
        }

        let next_tick = self.now + self.config.tick_interval();
        for message in effects.broadcasts {
            self.broadcast_at(&message, next_tick);
        }

        for origin in effects.clones {
            if let Err(err) = self.clone_actor_at(&origin, next_tick) {
                tracing::debug!(%origin, error = %err, "clone skipped");
            }
        }

        if effects.delete_self {
            match self.delete_clone(actor) {
                Ok(()) => {}
                Err(ActorError::NotAClone(_)) => {
                    tracing::debug!(%actor, "delete this clone ignored on original actor");
                }
                Err(err) => tracing::debug!(%actor, error = %err, "delete this clone skipped"),
            }
        }
    }

    fn start_glide(&mut self, request: GlideRequest) {
        let Some(actor) = self.actors.get(&request.actor) else {
            return;
        };
        let id = GlideId(self.next_glide);
        self.next_glide += 1;
        self.glides.insert(
            id,
            Glide {
                actor: request.actor,
                from: (actor.state.x, actor.state.y),
                to: request.to,
                started: self.now,
                duration: request.duration,
            },
        );
        self.timers.schedule(self.now, TimerEvent::GlideFrame(id));
    }

    fn glide_frame(&mut self, id: GlideId) {
        let Some(glide) = self.glides.get(&id) else {
            return;
        };
        let (x, y) = glide.position_at(self.now);
        let ends_at = glide.ends_at();

        let Some(actor) = self.actors.get_mut(&glide.actor) else {
            self.glides.remove(&id);
            return;
        };
        actor.state.x = x;
        actor.state.y = y;

        if self.now >= ends_at {
            self.glides.remove(&id);
        } else {
            let next = (self.now + self.config.glide_frame_interval()).min(ends_at);
            self.timers.schedule(next, TimerEvent::GlideFrame(id));
        }
    }

    /// Finish glides of `actor` that have run their full duration, so a
    /// thread resuming after its glide sees the final position.
    fn settle_glides(&mut self, actor: &ActorId) {
        let now = self.now;
        let finished: Vec<GlideId> = self
            .glides
            .iter()
            .filter(|(_, glide)| &glide.actor == actor && glide.ends_at() <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in finished {
            if let Some(glide) = self.glides.remove(&id) {
                if let Some(target) = self.actors.get_mut(actor) {
                    target.state.x = glide.to.0;
                    target.state.y = glide.to.1;
                }
            }
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("running", &self.running)
            .field("actors", &self.actors.len())
            .field("threads", &self.threads.len())
            .finish()
    }
}
