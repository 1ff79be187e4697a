//! Built-in `validate`/`action` wiring for the seven named stages, per the
//! orchestrator's fixed stage policies.

use crate::synapse::adapters::{MessageAdapter, NluAdapter, StorageAdapter};
use crate::synapse::directory::UserDirectory;
use crate::synapse::error::CoreError;
use crate::synapse::event::EventHandler;
use crate::synapse::nlu::NluResult;
use crate::synapse::path::{Path, Stage};
use crate::synapse::state::State;
use crate::synapse::thought::{Action, Validate};
use async_trait::async_trait;
use std::sync::Arc;

/// `hear.action(false)` aborts subsequent branch processing for this run.
pub struct HearAction;

#[async_trait]
impl Action for HearAction {
    async fn run(&self, state: &mut State, success: bool, _path: Option<&mut Path>) -> Result<(), CoreError> {
        if !success {
            state.finish();
        }
        Ok(())
    }
}

/// `listen.action(true)` restricts `understand` to forced branches only.
pub struct ListenAction;

#[async_trait]
impl Action for ListenAction {
    async fn run(&self, _state: &mut State, success: bool, path: Option<&mut Path>) -> Result<(), CoreError> {
        if success {
            if let Some(path) = path {
                path.forced(Stage::Understand);
            }
        }
        Ok(())
    }
}

/// Gates `understand` on having a usable NLU adapter, non-empty text past
/// the configured minimum length, and a non-empty provider result; attaches
/// the parsed result to the message on success.
pub struct UnderstandValidate {
    pub nlu_adapter: Option<Arc<dyn NluAdapter>>,
    pub nlu_min_length: Option<usize>,
}

#[async_trait]
impl Validate for UnderstandValidate {
    async fn check(&self, state: &mut State) -> Result<bool, CoreError> {
        let Some(adapter) = &self.nlu_adapter else {
            log::debug!("understand: no nlu adapter configured, skipping");
            return Ok(false);
        };

        let Some(message) = &state.message else {
            return Ok(false);
        };
        if !message.is_text() {
            return Ok(false);
        }
        let Some(text) = message.text_content() else {
            return Ok(false);
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(false);
        }
        if let Some(min_len) = self.nlu_min_length {
            if trimmed.len() < min_len {
                return Ok(false);
            }
        }

        let raw = adapter
            .process(trimmed)
            .await
            .map_err(|err| CoreError::Callback(err.to_string()))?;
        let result = NluResult::from_raw(raw);
        if result.is_empty() {
            return Ok(false);
        }

        if let Some(message) = state.message.as_mut() {
            message.attach_nlu(result);
        }
        Ok(true)
    }
}

/// `act` only runs when no earlier branch matched; it wraps the message in
/// `CatchAll` so catch-all act branches can still inspect the original.
pub struct ActValidate;

#[async_trait]
impl Validate for ActValidate {
    async fn check(&self, state: &mut State) -> Result<bool, CoreError> {
        if state.matched {
            return Ok(false);
        }
        if let Some(message) = state.message.take() {
            state.message = Some(message.into_catch_all());
        }
        Ok(true)
    }
}

/// Requires a message adapter and a pending envelope; attaches the current
/// branch id to the envelope. A missing message adapter is fatal here,
/// unlike every other stage's adapter-missing handling.
pub struct RespondValidate {
    pub message_adapter: Option<Arc<dyn MessageAdapter>>,
}

#[async_trait]
impl Validate for RespondValidate {
    async fn check(&self, state: &mut State) -> Result<bool, CoreError> {
        if state.pending_envelope().is_none() {
            return Ok(false);
        }
        if self.message_adapter.is_none() {
            return Err(CoreError::AdapterMissing("message".into()));
        }

        let branch_id = state.branch.as_ref().map(|b| b.to_string());
        let envelope = state
            .pending_envelope_mut()
            .expect("checked pending_envelope above");
        if let Some(branch_id) = branch_id {
            envelope.branch_id = Some(branch_id);
        }
        Ok(true)
    }
}

/// Hands the pending envelope to the message adapter's `dispatch` and marks
/// it responded.
pub struct RespondAction {
    pub message_adapter: Option<Arc<dyn MessageAdapter>>,
    pub events: Option<Arc<dyn EventHandler>>,
}

#[async_trait]
impl Action for RespondAction {
    async fn run(&self, state: &mut State, success: bool, _path: Option<&mut Path>) -> Result<(), CoreError> {
        if !success {
            return Ok(());
        }
        let Some(adapter) = &self.message_adapter else {
            return Err(CoreError::AdapterMissing("message".into()));
        };

        let (envelope_id, method) = {
            let Some(envelope) = state.pending_envelope() else {
                return Ok(());
            };
            envelope.validate()?;
            adapter
                .dispatch(envelope)
                .await
                .map_err(|err| CoreError::Callback(err.to_string()))?;
            (envelope.id.clone(), envelope.method.as_str())
        };

        if let Some(envelope) = state.pending_envelope_mut() {
            envelope.mark_responded();
        }
        log::info!("dispatched envelope {envelope_id} via {method}");
        if let Some(handler) = &self.events {
            handler.on_envelope_dispatched(&envelope_id, method).await;
        }
        Ok(())
    }
}

/// Requires a storage adapter and either a match or a dispatched envelope;
/// updates the user directory with the message's user when matched.
pub struct RememberValidate {
    pub storage_adapter: Option<Arc<dyn StorageAdapter>>,
    pub directory: Arc<UserDirectory>,
}

#[async_trait]
impl Validate for RememberValidate {
    async fn check(&self, state: &mut State) -> Result<bool, CoreError> {
        if self.storage_adapter.is_none() {
            log::debug!("remember: no storage adapter configured, skipping");
            return Ok(false);
        }
        if !(state.matched || state.has_dispatched_envelope()) {
            return Ok(false);
        }
        if state.matched {
            if let Some(message) = &state.message {
                self.directory.update(message.user().clone()).await;
            }
        }
        Ok(true)
    }
}

/// Persists a plain-data snapshot of the state under the `states`
/// sub-collection.
pub struct RememberAction {
    pub storage_adapter: Option<Arc<dyn StorageAdapter>>,
    pub events: Option<Arc<dyn EventHandler>>,
}

#[async_trait]
impl Action for RememberAction {
    async fn run(&self, state: &mut State, success: bool, _path: Option<&mut Path>) -> Result<(), CoreError> {
        if !success {
            return Ok(());
        }
        let Some(adapter) = &self.storage_adapter else {
            return Ok(());
        };
        let snapshot = serde_json::to_value(&*state)
            .map_err(|err| CoreError::Callback(err.to_string()))?;
        adapter
            .keep("states", snapshot)
            .await
            .map_err(|err| CoreError::Callback(err.to_string()))?;
        log::debug!("remembered state for sequence {}", state.sequence);
        if let Some(handler) = &self.events {
            handler.on_state_remembered(&state.sequence).await;
        }
        Ok(())
    }
}
