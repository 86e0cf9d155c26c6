//! Stage clock and the wake-up queue
//!
//! Every scheduled callback (a thread resume, a glide frame) is a [`Wakeup`]
//! in a min-heap ordered by due time, then by insertion sequence, so entries
//! due at the same instant fire in the order they were scheduled.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::ops::Add;
use std::time::Duration;

use super::thread::ThreadId;

/// Milliseconds of simulated time since the scheduler was created.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StageTime(pub u64);

impl StageTime {
    /// Time zero
    pub fn zero() -> Self {
        Self(0)
    }

    /// Milliseconds since time zero
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, saturating at zero
    pub fn since(&self, earlier: StageTime) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for StageTime {
    type Output = StageTime;

    fn add(self, rhs: Duration) -> StageTime {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        StageTime(self.0.saturating_add(millis))
    }
}

impl fmt::Display for StageTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Identifier of an in-flight glide animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlideId(pub u64);

/// What a wake-up does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Resume a thread
    Resume(ThreadId),
    /// Advance a glide animation by one frame
    GlideFrame(GlideId),
}

/// Scheduled callback
#[derive(Debug, Clone)]
pub struct Wakeup {
    /// When the callback is due
    pub at: StageTime,
    /// Insertion sequence (tie-breaker)
    pub seq: u64,
    /// Callback to run
    pub event: TimerEvent,
}

impl PartialEq for Wakeup {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Wakeup {}

impl PartialOrd for Wakeup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Wakeup {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest first, then oldest first)
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of pending wake-ups
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Wakeup>,
    next_seq: u64,
}

impl TimerQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `event` at `at`
    pub fn schedule(&mut self, at: StageTime, event: TimerEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Wakeup { at, seq, event });
    }

    /// Pop the earliest wake-up if it is due at or before `deadline`
    pub fn pop_due(&mut self, deadline: StageTime) -> Option<Wakeup> {
        if self.heap.peek()?.at <= deadline {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Due time of the earliest wake-up
    pub fn next_due(&self) -> Option<StageTime> {
        self.heap.peek().map(|wakeup| wakeup.at)
    }

    /// Drop every pending wake-up
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Number of pending wake-ups
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
