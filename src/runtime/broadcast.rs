//! Broadcast bus
//!
//! A broadcast starts one new thread per listening script, across every
//! actor, in registration order. Listeners are found by scanning compiled
//! triggers; nothing is subscribed ahead of time, so clones hear broadcasts
//! as soon as they exist.

use super::scheduler::{Scheduler, StageEvent};
use super::ir::Trigger;
use super::thread::ThreadId;
use super::timer::StageTime;

impl Scheduler {
    /// Broadcast `message`, starting every `when I receive` script listening
    /// for it. Returns the new threads; an unheard message is a no-op.
    ///
    /// The new threads run on the next `advance`.
    pub fn broadcast(&mut self, message: &str) -> Vec<ThreadId> {
        let now = self.now();
        self.broadcast_at(message, now)
    }

    /// Broadcast with the listeners' first resume at `first_resume`
    pub(crate) fn broadcast_at(&mut self, message: &str, first_resume: StageTime) -> Vec<ThreadId> {
        if !self.is_running() {
            tracing::debug!(%message, "broadcast ignored while stopped");
            return Vec::new();
        }

        let spawned = self.start_matching(
            |trigger| matches!(trigger, Trigger::Receive(name) if name == message),
            first_resume,
        );
        tracing::debug!(%message, receivers = spawned.len(), "broadcast");
        self.push_event(StageEvent::Broadcast {
            message: message.to_string(),
            receivers: spawned.len(),
        });
        spawned
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::RuntimeConfig;
    use crate::runtime::actor::Actor;
    use crate::runtime::block::blocks::*;
    use crate::runtime::compile::compile_script;
    use crate::runtime::scheduler::Scheduler;
    use std::sync::Arc;

    fn listener(message: &str) -> Arc<crate::runtime::ir::Script> {
        Arc::new(compile_script(&[when_i_receive(message), show()]).unwrap())
    }

    #[test]
    fn test_broadcast_without_listeners_is_noop() {
        let mut scheduler = Scheduler::new(RuntimeConfig::default());
        scheduler
            .add_actor(Actor::new("cat", vec![listener("other")]))
            .unwrap();
        scheduler.start();
        assert!(scheduler.broadcast("go").is_empty());
        assert_eq!(scheduler.stats().total_threads, 0);
    }

    #[test]
    fn test_broadcast_reaches_every_actor() {
        let mut scheduler = Scheduler::new(RuntimeConfig::default());
        scheduler.add_actor(Actor::new("cat", vec![listener("go")])).unwrap();
        scheduler.add_actor(Actor::new("dog", vec![listener("go")])).unwrap();
        scheduler.start();

        let spawned = scheduler.broadcast("go");
        assert_eq!(spawned.len(), 2);
        for id in spawned {
            let thread = scheduler.thread(id).unwrap();
            assert_eq!(thread.cursor, 0);
        }
    }

    #[test]
    fn test_broadcast_ignored_while_stopped() {
        let mut scheduler = Scheduler::new(RuntimeConfig::default());
        scheduler.add_actor(Actor::new("cat", vec![listener("go")])).unwrap();
        assert!(scheduler.broadcast("go").is_empty());
    }
}
