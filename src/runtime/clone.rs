//! Clone manager
//!
//! Clones are full actors registered next to their origin. They copy the
//! origin's state and variables at creation time and share its compiled
//! scripts by reference. Only clones may be deleted from inside a script.

use std::sync::Arc;

use super::actor::{Actor, ActorId};
use super::error::{ActorError, ActorResult};
use super::ir::Trigger;
use super::scheduler::{Scheduler, StageEvent};
use super::timer::StageTime;

impl Scheduler {
    /// Clone `origin` and start the clone's `when I start as a clone` scripts.
    ///
    /// Cloning a clone produces a clone of the same original sprite. The new
    /// threads run on the next `advance`.
    pub fn create_clone(&mut self, origin: &ActorId) -> ActorResult<ActorId> {
        let now = self.now();
        self.clone_actor_at(origin, now)
    }

    /// Delete a clone, discarding its threads immediately
    pub fn delete_clone(&mut self, id: &ActorId) -> ActorResult<()> {
        let actor = self
            .actors
            .get(id)
            .ok_or_else(|| ActorError::NotFound(id.0.clone()))?;
        if !actor.is_clone() {
            return Err(ActorError::NotAClone(id.0.clone()));
        }

        self.detach_actor(id)?;
        tracing::debug!(clone = %id, "clone deleted");
        self.push_event(StageEvent::CloneDeleted { clone: id.clone() });
        Ok(())
    }

    /// Clone with the clone scripts' first resume at `first_resume`
    pub(crate) fn clone_actor_at(
        &mut self,
        origin: &ActorId,
        first_resume: StageTime,
    ) -> ActorResult<ActorId> {
        let limit = self.config().max_clones;
        if self.actors.clone_count() >= limit {
            tracing::warn!(%origin, limit, "clone limit reached");
            return Err(ActorError::CloneLimit(limit));
        }

        let source = self
            .actors
            .get(origin)
            .ok_or_else(|| ActorError::NotFound(origin.0.clone()))?;
        let root = source.clone_of.clone().unwrap_or_else(|| source.id.clone());
        let mut state = source.state.clone();
        state.speech = None;
        let variables = source.variables.clone();
        let scripts = source.scripts.iter().map(Arc::clone).collect();

        let mut id = self.next_clone_id(&root);
        while self.actors.contains(&id) {
            id = self.next_clone_id(&root);
        }

        let clone = Actor {
            id: id.clone(),
            state,
            variables,
            scripts,
            clone_of: Some(root),
        };
        self.actors.insert(clone)?;

        tracing::debug!(%origin, clone = %id, "clone created");
        self.push_event(StageEvent::CloneCreated {
            origin: origin.clone(),
            clone: id.clone(),
        });

        self.start_scripts_of(&id, |trigger| trigger == &Trigger::CloneStart, first_resume);
        Ok(id)
    }

    fn next_clone_id(&mut self, root: &ActorId) -> ActorId {
        self.next_clone += 1;
        ActorId::new(format!("{root}#clone{}", self.next_clone))
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::RuntimeConfig;
    use crate::runtime::actor::{Actor, ActorId};
    use crate::runtime::block::blocks::*;
    use crate::runtime::compile::compile_script;
    use crate::runtime::error::ActorError;
    use crate::runtime::scheduler::Scheduler;
    use std::sync::Arc;

    fn stage(max_clones: usize) -> Scheduler {
        let config = RuntimeConfig {
            max_clones,
            ..RuntimeConfig::default()
        };
        let on_clone = Arc::new(compile_script(&[when_i_start_as_clone(), change_x_by(5.0)]).unwrap());
        let mut scheduler = Scheduler::new(config);
        scheduler
            .add_actor(Actor::new("cat", vec![on_clone]).with_variable("hp", 3.0))
            .unwrap();
        scheduler.start();
        scheduler
    }

    #[test]
    fn test_clone_copies_state_and_variables() {
        let mut scheduler = stage(10);
        let cat = ActorId::new("cat");
        let clone = scheduler.create_clone(&cat).unwrap();

        let copy = scheduler.actor(&clone).unwrap();
        assert_eq!(copy.clone_of, Some(cat.clone()));
        assert_eq!(copy.variables, scheduler.actor(&cat).unwrap().variables);
        assert!(Arc::ptr_eq(
            &copy.scripts[0],
            &scheduler.actor(&cat).unwrap().scripts[0]
        ));
    }

    #[test]
    fn test_clone_starts_clone_scripts_only_on_clone() {
        let mut scheduler = stage(10);
        let clone = scheduler.create_clone(&ActorId::new("cat")).unwrap();
        scheduler.advance(std::time::Duration::from_millis(5));

        assert_eq!(scheduler.actor(&clone).unwrap().state.x, 5.0);
        assert_eq!(scheduler.actor(&ActorId::new("cat")).unwrap().state.x, 0.0);
    }

    #[test]
    fn test_clone_of_clone_names_original() {
        let mut scheduler = stage(10);
        let first = scheduler.create_clone(&ActorId::new("cat")).unwrap();
        let second = scheduler.create_clone(&first).unwrap();
        assert_eq!(
            scheduler.actor(&second).unwrap().clone_of,
            Some(ActorId::new("cat"))
        );
    }

    #[test]
    fn test_clone_limit() {
        let mut scheduler = stage(2);
        let cat = ActorId::new("cat");
        scheduler.create_clone(&cat).unwrap();
        scheduler.create_clone(&cat).unwrap();
        assert_eq!(scheduler.create_clone(&cat), Err(ActorError::CloneLimit(2)));
    }

    #[test]
    fn test_delete_clone_only_for_clones() {
        let mut scheduler = stage(10);
        let cat = ActorId::new("cat");
        assert_eq!(
            scheduler.delete_clone(&cat),
            Err(ActorError::NotAClone("cat".into()))
        );

        let clone = scheduler.create_clone(&cat).unwrap();
        assert_eq!(scheduler.stats().total_threads, 1);
        scheduler.delete_clone(&clone).unwrap();
        assert!(scheduler.actor(&clone).is_none());
        assert_eq!(scheduler.stats().total_threads, 0);
    }
}
