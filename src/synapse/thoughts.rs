//! The orchestrator: stage registry, sequence definitions, and the
//! `receive`/`serve`/`respond`/`dispatch` entry points a message adapter
//! drives.

use crate::synapse::adapters::{MessageAdapter, NluAdapter, StorageAdapter};
use crate::synapse::branch::Branch;
use crate::synapse::config::RuntimeConfig;
use crate::synapse::dialogue::{DialogueRegistry, DialogueScope};
use crate::synapse::directory::UserDirectory;
use crate::synapse::envelope::Envelope;
use crate::synapse::error::CoreError;
use crate::synapse::event::{EventHandler, StageEvent};
use crate::synapse::message::Message;
use crate::synapse::middleware::{MiddlewareRegistry, Piece};
use crate::synapse::path::{Path, Stage};
use crate::synapse::policies::{
    ActValidate, HearAction, ListenAction, RememberAction, RememberValidate, RespondAction,
    RespondValidate, UnderstandValidate,
};
use crate::synapse::state::State;
use crate::synapse::thought::{AlwaysValid, NoopAction, Thought};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

fn hear_event(state: &State) -> StageEvent {
    StageEvent::Hear {
        sequence: state.sequence.clone(),
        message_id: message_id(state),
    }
}

fn listen_event(state: &State) -> StageEvent {
    StageEvent::Listen {
        sequence: state.sequence.clone(),
        message_id: message_id(state),
    }
}

fn understand_event(state: &State) -> StageEvent {
    StageEvent::Understand {
        sequence: state.sequence.clone(),
        message_id: message_id(state),
    }
}

fn act_event(state: &State) -> StageEvent {
    StageEvent::Act {
        sequence: state.sequence.clone(),
        message_id: message_id(state),
    }
}

fn respond_event(state: &State) -> StageEvent {
    StageEvent::Respond {
        sequence: state.sequence.clone(),
        envelope_id: state.pending_envelope().map(|e| e.id.clone()),
    }
}

fn remember_event(state: &State) -> StageEvent {
    StageEvent::Remember {
        sequence: state.sequence.clone(),
    }
}

fn message_id(state: &State) -> String {
    state
        .message
        .as_ref()
        .map(|m| m.id().to_string())
        .unwrap_or_default()
}

/// Builds a [`Thoughts`] orchestrator: registers adapters, events, and extra
/// middleware pieces, then wires up the seven built-in stages.
pub struct ThoughtsBuilder {
    config: RuntimeConfig,
    middleware: MiddlewareRegistry,
    message_adapter: Option<Arc<dyn MessageAdapter>>,
    storage_adapter: Option<Arc<dyn StorageAdapter>>,
    nlu_adapter: Option<Arc<dyn NluAdapter>>,
    events: Option<Arc<dyn EventHandler>>,
    dialogue_scope: DialogueScope,
}

impl ThoughtsBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            middleware: MiddlewareRegistry::new(),
            message_adapter: None,
            storage_adapter: None,
            nlu_adapter: None,
            events: None,
            dialogue_scope: DialogueScope::UserAndRoom,
        }
    }

    pub fn message_adapter(mut self, adapter: Arc<dyn MessageAdapter>) -> Self {
        self.message_adapter = Some(adapter);
        self
    }

    pub fn storage_adapter(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.storage_adapter = Some(adapter);
        self
    }

    pub fn nlu_adapter(mut self, adapter: Arc<dyn NluAdapter>) -> Self {
        self.nlu_adapter = Some(adapter);
        self
    }

    pub fn events(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.events = Some(handler);
        self
    }

    pub fn dialogue_scope(mut self, scope: DialogueScope) -> Self {
        self.dialogue_scope = scope;
        self
    }

    /// Append a piece to a named middleware chain (built-in stage name or a
    /// custom one), creating the chain if it doesn't exist yet.
    pub fn middleware(mut self, name: impl Into<String>, piece: Arc<dyn Piece>) -> Self {
        self.middleware.register(name, piece);
        self
    }

    pub fn build(self) -> Result<Thoughts, CoreError> {
        let registry = self.middleware;
        let directory = Arc::new(UserDirectory::new());

        let mut stages = HashMap::new();
        stages.insert(
            "hear".to_string(),
            Thought::new("hear", &registry, None, Arc::new(AlwaysValid), Arc::new(HearAction))?
                .with_event(hear_event),
        );
        stages.insert(
            "listen".to_string(),
            Thought::new(
                "listen",
                &registry,
                Some(Stage::Listen),
                Arc::new(AlwaysValid),
                Arc::new(ListenAction),
            )?
            .with_event(listen_event),
        );
        stages.insert(
            "understand".to_string(),
            Thought::new(
                "understand",
                &registry,
                Some(Stage::Understand),
                Arc::new(UnderstandValidate {
                    nlu_adapter: self.nlu_adapter.clone(),
                    nlu_min_length: self.config.nlu_min_length,
                }),
                Arc::new(NoopAction),
            )?
            .with_event(understand_event),
        );
        stages.insert(
            "act".to_string(),
            Thought::new(
                "act",
                &registry,
                Some(Stage::Act),
                Arc::new(ActValidate),
                Arc::new(NoopAction),
            )?
            .with_event(act_event),
        );
        stages.insert(
            "serve".to_string(),
            Thought::new(
                "serve",
                &registry,
                Some(Stage::Serve),
                Arc::new(AlwaysValid),
                Arc::new(NoopAction),
            )?,
        );
        stages.insert(
            "respond".to_string(),
            Thought::new(
                "respond",
                &registry,
                None,
                Arc::new(RespondValidate {
                    message_adapter: self.message_adapter.clone(),
                }),
                Arc::new(RespondAction {
                    message_adapter: self.message_adapter.clone(),
                    events: self.events.clone(),
                }),
            )?
            .with_event(respond_event),
        );
        stages.insert(
            "remember".to_string(),
            Thought::new(
                "remember",
                &registry,
                None,
                Arc::new(RememberValidate {
                    storage_adapter: self.storage_adapter.clone(),
                    directory: directory.clone(),
                }),
                Arc::new(RememberAction {
                    storage_adapter: self.storage_adapter.clone(),
                    events: self.events.clone(),
                }),
            )?
            .with_event(remember_event),
        );

        let mut sequences = HashMap::new();
        sequences.insert(
            "receive".to_string(),
            names(&["hear", "listen", "understand", "act", "respond", "remember"]),
        );
        sequences.insert(
            "serve".to_string(),
            names(&["hear", "serve", "act", "respond", "remember"]),
        );
        sequences.insert("respond".to_string(), names(&["respond"]));
        sequences.insert("dispatch".to_string(), names(&["respond", "remember"]));

        Ok(Thoughts {
            stages,
            sequences,
            path: RwLock::new(Path::new()),
            dialogues: DialogueRegistry::new(self.dialogue_scope),
            directory,
            events: self.events,
        })
    }
}

fn names(stages: &[&str]) -> Vec<String> {
    stages.iter().map(|s| s.to_string()).collect()
}

/// Runs named sequences of [`Thought`]s against inbound messages and
/// outbound envelopes, holding the collaborators every stage needs: the
/// global [`Path`], the per-audience [`DialogueRegistry`], and the
/// [`UserDirectory`].
pub struct Thoughts {
    stages: HashMap<String, Thought>,
    sequences: HashMap<String, Vec<String>>,
    path: RwLock<Path>,
    dialogues: DialogueRegistry,
    directory: Arc<UserDirectory>,
    events: Option<Arc<dyn EventHandler>>,
}

impl Thoughts {
    pub fn builder(config: RuntimeConfig) -> ThoughtsBuilder {
        ThoughtsBuilder::new(config)
    }

    /// Install a branch on the global path's named stage collection. Branch
    /// callbacks installed this way apply to every audience that isn't
    /// currently inside an engaged dialogue.
    pub async fn install(&self, stage: Stage, branch: Branch) {
        self.path.write().await.install(stage, branch);
    }

    pub fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    pub fn dialogues(&self) -> &DialogueRegistry {
        &self.dialogues
    }

    /// Entry point for an inbound message from a message adapter. Resolves
    /// the effective path (the audience's engaged dialogue path, or
    /// otherwise the global path), runs the `receive` sequence, then
    /// reconciles the audience's dialogue state from the run's outcome.
    pub async fn receive(&self, message: Message) -> Result<State, CoreError> {
        let user = message.user().clone();
        let room = user.room.clone();
        let audience_key = self.dialogues.audience_key(&user, &room);
        let engaged = self.dialogues.engaged(&user, &room).await;

        let mut working_path = if engaged {
            self.dialogues
                .path_snapshot(&audience_key)
                .await
                .unwrap_or_default()
        } else {
            self.path.read().await.clone()
        };

        let mut state = State::for_message("receive", message);
        self.run_sequence("receive", &mut state, Some(&mut working_path))
            .await?;
        self.reconcile_dialogue(&audience_key, engaged, &mut state).await;
        Ok(state)
    }

    /// Entry point for an inbound message that should skip NLU (`serve`
    /// matches the `serve` branch collection directly instead of going
    /// through `listen`/`understand`).
    pub async fn serve(&self, message: Message) -> Result<State, CoreError> {
        let mut working_path = self.path.read().await.clone();
        let mut state = State::for_message("serve", message);
        self.run_sequence("serve", &mut state, Some(&mut working_path))
            .await?;
        Ok(state)
    }

    /// Dispatch a single pre-built envelope through the `respond` stage
    /// alone, without persisting afterwards.
    pub async fn respond(&self, envelope: Envelope) -> Result<State, CoreError> {
        let mut state = State::for_envelope("respond", envelope);
        self.run_sequence("respond", &mut state, None).await?;
        Ok(state)
    }

    /// Dispatch a pre-built envelope with no matched branch behind it, then
    /// persist the resulting state.
    pub async fn dispatch(&self, envelope: Envelope) -> Result<State, CoreError> {
        let mut state = State::for_envelope("dispatch", envelope);
        self.run_sequence("dispatch", &mut state, None).await?;
        Ok(state)
    }

    async fn run_sequence(
        &self,
        name: &str,
        state: &mut State,
        mut path: Option<&mut Path>,
    ) -> Result<(), CoreError> {
        let stage_names = self
            .sequences
            .get(name)
            .ok_or_else(|| CoreError::Config(format!("unknown sequence '{name}'")))?;

        for stage_name in stage_names {
            if state.exit {
                break;
            }
            let thought = self
                .stages
                .get(stage_name)
                .expect("sequence references a registered stage");
            thought
                .process(state, path.as_deref_mut(), self.events.as_ref())
                .await?;
        }
        Ok(())
    }

    /// Apply dialogue revert/close/progress bookkeeping per the run's
    /// outcome: an unmatched run leaves any existing dialogue untouched; a
    /// matched run with no follow-up branches closes it; a matched run with
    /// follow-up branches installs them as the dialogue's next-turn path.
    async fn reconcile_dialogue(&self, audience_key: &str, engaged: bool, state: &mut State) {
        if !state.matched {
            return;
        }
        if state.follow_up.is_empty() {
            if engaged {
                self.dialogues.close(audience_key).await;
            }
            return;
        }
        let mut fresh = Path::new();
        for (stage, branch) in state.follow_up.drain(..) {
            fresh.install(stage, branch);
        }
        self.dialogues.set_path(audience_key, fresh).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synapse::adapters::AdapterError;
    use crate::synapse::branch::{BranchCallback, RegexMatcher};
    use crate::synapse::directory::Room;
    use crate::synapse::envelope::EnvelopeMethod;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMessageAdapter {
        dispatched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageAdapter for RecordingMessageAdapter {
        async fn start(&self) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn shutdown(&self) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn dispatch(&self, envelope: &Envelope) -> Result<(), AdapterError> {
            self.dispatched.lock().unwrap().push(envelope.id.clone());
            Ok(())
        }
    }

    struct GreetCallback;

    #[async_trait]
    impl BranchCallback for GreetCallback {
        async fn call(&self, state: &mut State) -> Result<(), CoreError> {
            let room = state.message.as_ref().unwrap().user().room.clone();
            state.respond_envelope(Envelope::new(EnvelopeMethod::Send, room).say("hi there"));
            Ok(())
        }
    }

    fn user() -> crate::synapse::directory::User {
        crate::synapse::directory::User::new("u1", Room::new("general"))
    }

    #[tokio::test]
    async fn hello_branch_dispatches_through_receive() {
        let adapter = Arc::new(RecordingMessageAdapter::default());
        let thoughts = ThoughtsBuilder::new(RuntimeConfig::new())
            .message_adapter(adapter.clone())
            .build()
            .unwrap();

        thoughts
            .install(
                Stage::Listen,
                Branch::new(
                    "greet",
                    Arc::new(RegexMatcher::new("hello").unwrap()),
                    Arc::new(GreetCallback),
                ),
            )
            .await;

        let state = thoughts
            .receive(Message::text(user(), "hello there"))
            .await
            .unwrap();

        assert!(state.matched);
        assert!(state.was_processed("respond"));
        assert_eq!(adapter.dispatched.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_text_matches_no_branches_and_skips_remember() {
        let thoughts = ThoughtsBuilder::new(RuntimeConfig::new()).build().unwrap();

        let state = thoughts.receive(Message::text(user(), "")).await.unwrap();

        assert!(!state.matched);
        assert!(!state.was_processed("remember"));
    }

    #[tokio::test]
    async fn dispatch_runs_respond_then_remember() {
        let adapter = Arc::new(RecordingMessageAdapter::default());
        let thoughts = ThoughtsBuilder::new(RuntimeConfig::new())
            .message_adapter(adapter.clone())
            .build()
            .unwrap();

        let envelope = Envelope::new(EnvelopeMethod::Send, Room::new("general")).say("hi");
        let state = thoughts.dispatch(envelope).await.unwrap();

        assert!(state.was_processed("respond"));
        assert_eq!(adapter.dispatched.lock().unwrap().len(), 1);
    }

    struct FollowUpCallback;

    #[async_trait]
    impl BranchCallback for FollowUpCallback {
        async fn call(&self, state: &mut State) -> Result<(), CoreError> {
            state.add_follow_up(
                Stage::Act,
                Branch::new(
                    "followup",
                    Arc::new(RegexMatcher::new("yes").unwrap()),
                    Arc::new(GreetCallback),
                ),
            );
            Ok(())
        }
    }

    #[tokio::test]
    async fn matched_run_with_follow_up_branches_stays_engaged() {
        let thoughts = ThoughtsBuilder::new(RuntimeConfig::new()).build().unwrap();
        thoughts
            .install(
                Stage::Act,
                Branch::new(
                    "start",
                    Arc::new(RegexMatcher::new("start").unwrap()),
                    Arc::new(FollowUpCallback),
                ),
            )
            .await;

        thoughts.receive(Message::text(user(), "start")).await.unwrap();

        assert!(thoughts.dialogues().engaged(&user(), &user().room).await);
    }

    struct SilentCallback;

    #[async_trait]
    impl BranchCallback for SilentCallback {
        async fn call(&self, _state: &mut State) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn matched_run_with_no_follow_up_closes_engaged_dialogue() {
        let thoughts = ThoughtsBuilder::new(RuntimeConfig::new()).build().unwrap();
        let u = user();
        let key = thoughts.dialogues().audience_key(&u, &u.room);

        let mut seeded = Path::new();
        seeded.install(
            Stage::Act,
            Branch::new(
                "continue",
                Arc::new(RegexMatcher::new("continue").unwrap()),
                Arc::new(SilentCallback),
            ),
        );
        thoughts.dialogues().set_path(&key, seeded).await;

        thoughts.receive(Message::text(u.clone(), "continue")).await.unwrap();

        assert!(!thoughts.dialogues().engaged(&u, &u.room).await);
    }
}
