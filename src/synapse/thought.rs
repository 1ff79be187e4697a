//! A single pipeline stage: branch matching (or a bare middleware chain)
//! gated by a validator and followed by an action.

use crate::synapse::error::CoreError;
use crate::synapse::event::{EventHandler, StageEvent};
use crate::synapse::middleware::{Middleware, MiddlewareRegistry};
use crate::synapse::path::{Path, Stage};
use crate::synapse::state::State;
use async_trait::async_trait;
use std::sync::Arc;

/// Gates whether a stage proceeds to branch/middleware execution. Runs
/// before branch matching and may mutate `state` (e.g. `understand`
/// attaching a parsed NLU result to the message).
#[async_trait]
pub trait Validate: Send + Sync {
    async fn check(&self, state: &mut State) -> Result<bool, CoreError>;
}

/// Always-true validator, the default when a `Thought` is built without one.
pub struct AlwaysValid;

#[async_trait]
impl Validate for AlwaysValid {
    async fn check(&self, _state: &mut State) -> Result<bool, CoreError> {
        Ok(true)
    }
}

/// Runs after a stage resolves, told whether it succeeded.
///
/// Takes the stage's effective [`Path`] too (when one is in play) since a
/// handful of built-in actions mutate it — `listen`'s collapses `understand`
/// down to forced branches only.
#[async_trait]
pub trait Action: Send + Sync {
    async fn run(&self, state: &mut State, success: bool, path: Option<&mut Path>) -> Result<(), CoreError>;
}

/// No-op action, the default when a `Thought` is built without one.
pub struct NoopAction;

#[async_trait]
impl Action for NoopAction {
    async fn run(&self, _state: &mut State, _success: bool, _path: Option<&mut Path>) -> Result<(), CoreError> {
        Ok(())
    }
}

/// One named pipeline stage.
///
/// `stage` is `Some` for the four branch-matching stages (`listen`,
/// `understand`, `serve`, `act`) and `None` for `hear`/`respond`/`remember`,
/// which never consult a `Path` and always run their middleware chain
/// directly against a resolving terminal.
pub struct Thought {
    pub name: String,
    stage: Option<Stage>,
    middleware: Middleware,
    validate: Arc<dyn Validate>,
    action: Arc<dyn Action>,
    event: Option<fn(&State) -> StageEvent>,
}

impl Thought {
    /// Look up `name`'s middleware chain in `registry`. Fails with
    /// `CoreError::Config` if no chain was ever registered under that name.
    pub fn new(
        name: impl Into<String>,
        registry: &MiddlewareRegistry,
        stage: Option<Stage>,
        validate: Arc<dyn Validate>,
        action: Arc<dyn Action>,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        let middleware = registry
            .get(&name)
            .cloned()
            .ok_or_else(|| CoreError::Config(format!("no middleware chain registered for '{name}'")))?;
        Ok(Self {
            name,
            stage,
            middleware,
            validate,
            action,
            event: None,
        })
    }

    /// Attach the stage-entry event constructor fired before `validate` runs.
    pub fn with_event(mut self, event: fn(&State) -> StageEvent) -> Self {
        self.event = Some(event);
        self
    }

    async fn run_action(
        &self,
        state: &mut State,
        success: bool,
        path: Option<&mut Path>,
    ) -> Result<(), CoreError> {
        self.action.run(state, success, path).await
    }

    /// Run this stage against `state`. `path` is consulted only when this
    /// `Thought` was constructed with a branch-matching `stage`.
    pub async fn process(
        &self,
        state: &mut State,
        mut path: Option<&mut Path>,
        events: Option<&Arc<dyn EventHandler>>,
    ) -> Result<(), CoreError> {
        if state.exit {
            return Ok(());
        }

        if let Some(stage) = self.stage {
            let branches_usable = path.as_deref().map(|p| p.has_branches(stage)).unwrap_or(false);
            if !branches_usable || state.done {
                self.run_action(state, false, path.as_deref_mut()).await?;
                return Ok(());
            }
        }

        if let Some(event_fn) = self.event {
            if let Some(handler) = events {
                handler.on_stage(event_fn(state)).await;
            }
        }

        match self.validate.check(state).await {
            Ok(true) => {}
            Ok(false) => {
                self.run_action(state, false, path.as_deref_mut()).await?;
                return Ok(());
            }
            Err(err) => {
                let _ = self.run_action(state, false, path.as_deref_mut()).await;
                return Err(err);
            }
        }

        let success = match (self.stage, path.as_deref()) {
            (Some(stage), Some(path)) => self.run_branches(state, path, stage, events).await?,
            _ => {
                self.middleware
                    .execute(state, |_state| Box::pin(async move { Ok(()) }))
                    .await?
            }
        };

        if success {
            state.mark_processed(&self.name);
        }
        self.run_action(state, success, path).await?;
        Ok(())
    }

    async fn run_branches(
        &self,
        state: &mut State,
        path: &Path,
        stage: Stage,
        events: Option<&Arc<dyn EventHandler>>,
    ) -> Result<bool, CoreError> {
        let mut matched_any = false;
        for branch in path.branches(stage) {
            if state.done {
                break;
            }
            let fired = branch.process(state, &self.middleware).await?;
            if fired {
                if let Some(handler) = events {
                    handler.on_branch_matched(branch.id.as_str()).await;
                }
            }
            matched_any = matched_any || fired;
        }
        Ok(matched_any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synapse::branch::{Branch, BranchCallback, RegexMatcher};
    use crate::synapse::directory::{Room, User};
    use crate::synapse::message::Message;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn sample_state() -> State {
        State::for_message("receive", Message::text(User::new("u1", Room::new("g")), "hello world"))
    }

    struct RecordingAction {
        seen: Arc<std::sync::Mutex<Vec<bool>>>,
    }

    #[async_trait]
    impl Action for RecordingAction {
        async fn run(&self, _state: &mut State, success: bool, _path: Option<&mut Path>) -> Result<(), CoreError> {
            self.seen.lock().unwrap().push(success);
            Ok(())
        }
    }

    struct FinishCallback;

    #[async_trait]
    impl BranchCallback for FinishCallback {
        async fn call(&self, state: &mut State) -> Result<(), CoreError> {
            state.finish();
            Ok(())
        }
    }

    #[tokio::test]
    async fn stage_without_branches_runs_bare_middleware() {
        let registry = MiddlewareRegistry::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let thought = Thought::new(
            "hear",
            &registry,
            None,
            Arc::new(AlwaysValid),
            Arc::new(RecordingAction { seen: seen.clone() }),
        )
        .unwrap();

        let mut state = sample_state();
        thought.process(&mut state, None, None).await.unwrap();

        assert!(state.was_processed("hear"));
        assert_eq!(*seen.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn empty_branch_collection_is_unsuccessful() {
        let registry = MiddlewareRegistry::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let thought = Thought::new(
            "act",
            &registry,
            Some(Stage::Act),
            Arc::new(AlwaysValid),
            Arc::new(RecordingAction { seen: seen.clone() }),
        )
        .unwrap();

        let mut path = Path::new();
        let mut state = sample_state();
        thought.process(&mut state, Some(&mut path), None).await.unwrap();

        assert!(!state.was_processed("act"));
        assert_eq!(*seen.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn matching_branch_marks_processed() {
        let registry = MiddlewareRegistry::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let thought = Thought::new(
            "act",
            &registry,
            Some(Stage::Act),
            Arc::new(AlwaysValid),
            Arc::new(RecordingAction { seen: seen.clone() }),
        )
        .unwrap();

        let mut path = Path::new();
        path.install(
            Stage::Act,
            Branch::new(
                "greet",
                Arc::new(RegexMatcher::new("hello").unwrap()),
                Arc::new(FinishCallback),
            ),
        );

        let mut state = sample_state();
        thought.process(&mut state, Some(&mut path), None).await.unwrap();

        assert!(state.was_processed("act"));
        assert!(state.matched);
        assert!(state.done);
        assert_eq!(*seen.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn done_halts_remaining_branches() {
        let registry = MiddlewareRegistry::new();
        let ran_second = Arc::new(AtomicBool::new(false));

        struct FlagCallback(Arc<AtomicBool>);
        #[async_trait]
        impl BranchCallback for FlagCallback {
            async fn call(&self, _state: &mut State) -> Result<(), CoreError> {
                self.0.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        let thought = Thought::new(
            "act",
            &registry,
            Some(Stage::Act),
            Arc::new(AlwaysValid),
            Arc::new(NoopAction),
        )
        .unwrap();

        let mut path = Path::new();
        path.install(
            Stage::Act,
            Branch::new(
                "first",
                Arc::new(RegexMatcher::new("hello").unwrap()),
                Arc::new(FinishCallback),
            ),
        );
        path.install(
            Stage::Act,
            Branch::new(
                "second",
                Arc::new(RegexMatcher::new("world").unwrap()),
                Arc::new(FlagCallback(ran_second.clone())),
            ),
        );

        let mut state = sample_state();
        thought.process(&mut state, Some(&mut path), None).await.unwrap();

        assert!(!ran_second.load(Ordering::SeqCst));
    }
}
