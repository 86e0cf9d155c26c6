//! Real-time driver
//!
//! The scheduler runs on simulated time and never sleeps. The driver ties it
//! to the wall clock: every frame it advances the stage to the real elapsed
//! time, holding the lock only for the duration of that catch-up.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::SharedScheduler;
use super::scheduler::ExecutionStats;

/// Default wall-clock frame (about 60 frames per second)
pub const DEFAULT_FRAME: Duration = Duration::from_millis(16);

/// Advances a shared scheduler in real time
#[derive(Clone)]
pub struct Driver {
    scheduler: SharedScheduler,
    frame: Duration,
}

impl Driver {
    /// Create a driver with the default frame
    pub fn new(scheduler: SharedScheduler) -> Self {
        Self {
            scheduler,
            frame: DEFAULT_FRAME,
        }
    }

    /// Builder-style frame interval
    pub fn with_frame(mut self, frame: Duration) -> Self {
        self.frame = frame.max(Duration::from_millis(1));
        self
    }

    /// Drive the scheduler for `duration` of wall-clock time, or until the run
    /// stops. Returns the final counters.
    pub async fn run_for(&self, duration: Duration) -> ExecutionStats {
        let started = Instant::now();
        let origin = self.scheduler.lock().now();
        let mut ticker = time::interval(self.frame);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(?duration, frame = ?self.frame, "driver started");
        loop {
            ticker.tick().await;
            let elapsed = started.elapsed().min(duration);

            let mut scheduler = self.scheduler.lock();
            scheduler.advance_to(origin + elapsed);
            if !scheduler.is_running() || elapsed >= duration {
                let stats = scheduler.stats();
                tracing::debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    instructions = stats.instructions_executed,
                    "driver finished"
                );
                return stats;
            }
        }
    }

    /// Run [`Driver::run_for`] on a background task
    pub fn spawn(&self, duration: Duration) -> JoinHandle<ExecutionStats> {
        let driver = self.clone();
        tokio::spawn(async move { driver.run_for(duration).await })
    }
}

/// Drive `scheduler` in real time for `duration`
pub async fn run_for(scheduler: SharedScheduler, duration: Duration) -> ExecutionStats {
    Driver::new(scheduler).run_for(duration).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::actor::Actor;
    use crate::runtime::block::blocks::*;
    use crate::runtime::compile::compile_script;
    use crate::runtime::{RuntimeConfig, Scheduler};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn shared(blocks: Vec<crate::runtime::block::Block>) -> SharedScheduler {
        let script = Arc::new(compile_script(&blocks).unwrap());
        let mut scheduler = Scheduler::new(RuntimeConfig::default());
        scheduler.add_actor(Actor::new("cat", vec![script])).unwrap();
        scheduler.start();
        Arc::new(Mutex::new(scheduler))
    }

    #[tokio::test]
    async fn test_driver_advances_stage_clock() {
        let scheduler = shared(vec![when_flag_clicked(), forever(), change_x_by(1.0), end()]);
        let stats = run_for(scheduler.clone(), Duration::from_millis(120)).await;

        let guard = scheduler.lock();
        assert_eq!(guard.now().as_millis(), 120);
        assert!(guard.actor(&"cat".into()).unwrap().state.x > 0.0);
        assert!(stats.instructions_executed > 1);
    }

    #[tokio::test]
    async fn test_driver_returns_early_when_run_stops() {
        let scheduler = shared(vec![when_flag_clicked(), stop_all()]);
        let started = std::time::Instant::now();
        let stats = Driver::new(scheduler)
            .with_frame(Duration::from_millis(5))
            .spawn(Duration::from_secs(10))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(stats.total_threads, 0);
    }
}
