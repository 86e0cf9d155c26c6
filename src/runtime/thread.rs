//! Script threads and their loop control stacks
//!
//! A thread is a cursor over one script body. Loop state lives in a per-thread
//! [`LoopStack`]; nothing here is shared between threads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::actor::{ActorId, VariableStore};
use super::ir::Script;
use super::timer::StageTime;

/// Thread identifier, unique within one scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread-{}", self.0)
    }
}

/// Loop frame tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// Counted loop with iterations still to run after the current one
    Repeat {
        /// Remaining wraps before the frame pops
        remaining: u64,
    },
    /// Unbounded loop; popped only by an external stop
    Forever,
}

/// One open loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopFrame {
    /// Loop tag and counter
    pub kind: LoopKind,
    /// First instruction of the loop body
    pub resume: usize,
    /// First instruction after the loop's closer
    pub exit: usize,
}

impl LoopFrame {
    /// Index of the closer that ends this loop's body
    pub fn closer(&self) -> usize {
        self.exit - 1
    }
}

/// Per-thread stack of open loops
#[derive(Debug, Clone, Default)]
pub struct LoopStack {
    frames: Vec<LoopFrame>,
}

impl LoopStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a loop
    pub fn push(&mut self, frame: LoopFrame) {
        self.frames.push(frame);
    }

    /// Number of open loops
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether no loop is open
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Open frames, outermost first
    pub fn frames(&self) -> &[LoopFrame] {
        &self.frames
    }

    /// Handle the closer at `closer`.
    ///
    /// Returns the cursor target when the closer belongs to the innermost loop,
    /// or `None` when it closes something else (an `if` body).
    pub fn close(&mut self, closer: usize) -> Option<usize> {
        match self.frames.last() {
            Some(frame) if frame.closer() == closer => self.wrap(),
            _ => None,
        }
    }

    /// Wrap the innermost loop: jump back to its body while iterations remain,
    /// otherwise pop it and jump to its exit. `None` if no loop is open.
    pub fn wrap(&mut self) -> Option<usize> {
        let frame = self.frames.last_mut()?;
        match frame.kind {
            LoopKind::Forever => Some(frame.resume),
            LoopKind::Repeat { remaining } if remaining > 0 => {
                frame.kind = LoopKind::Repeat {
                    remaining: remaining - 1,
                };
                Some(frame.resume)
            }
            LoopKind::Repeat { .. } => {
                let exit = frame.exit;
                self.frames.pop();
                Some(exit)
            }
        }
    }
}

/// A live execution cursor over one script
#[derive(Debug, Clone)]
pub struct Thread {
    /// Thread ID
    pub id: ThreadId,
    /// Actor that owns the thread
    pub actor: ActorId,
    /// Script body being executed
    pub script: Arc<Script>,
    /// Index of the next instruction; `script.len()` means end-of-body
    pub cursor: usize,
    /// Private variable snapshot, copied from the actor at creation
    pub variables: VariableStore,
    /// Open loops
    pub loops: LoopStack,
    /// The thread must not resume before this time
    pub wake_at: StageTime,
    /// Cleared by stop, `stop this script`, or actor deletion
    pub active: bool,
}

impl Thread {
    /// Create a thread at cursor 0
    pub fn new(id: ThreadId, actor: ActorId, script: Arc<Script>, variables: VariableStore) -> Self {
        Self {
            id,
            actor,
            script,
            cursor: 0,
            variables,
            loops: LoopStack::new(),
            wake_at: StageTime::zero(),
            active: true,
        }
    }

    /// Whether the cursor sits on the end-of-body sentinel
    pub fn at_end(&self) -> bool {
        self.cursor >= self.script.len()
    }

    /// Whether the thread must keep sleeping at `now`
    pub fn is_sleeping(&self, now: StageTime) -> bool {
        now < self.wake_at
    }

    /// Structural invariant: the cursor and every loop frame index stay within
    /// the body (`len` itself is the end-of-body sentinel).
    pub fn is_consistent(&self) -> bool {
        let len = self.script.len();
        self.cursor <= len
            && self
                .loops
                .frames()
                .iter()
                .all(|frame| frame.resume <= frame.closer() && frame.exit <= len)
    }
}
