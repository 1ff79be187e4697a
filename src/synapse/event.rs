//! Passive observability hooks mirroring the pipeline's stage lifecycle.
//!
//! Implement [`EventHandler`] to observe stage entry, branch matches, and
//! envelope dispatch without participating in the pipeline itself — this is
//! a sink for external logging/metrics/tracing layers, distinct from the
//! `log` crate calls the core emits for its own operational diagnostics.
//!
//! All methods default to no-ops, so a handler overrides only what it needs.
//!
//! ```rust
//! use synapse::synapse::event::{EventHandler, StageEvent};
//! use async_trait::async_trait;
//!
//! struct PrintOnMatch;
//!
//! #[async_trait]
//! impl EventHandler for PrintOnMatch {
//!     async fn on_branch_matched(&self, branch_id: &str) {
//!         println!("matched {branch_id}");
//!     }
//! }
//! ```

use async_trait::async_trait;

/// A stage-entry event, fired before that stage's `validate` runs.
#[derive(Debug, Clone)]
pub enum StageEvent {
    Hear { sequence: String, message_id: String },
    Listen { sequence: String, message_id: String },
    Understand { sequence: String, message_id: String },
    Act { sequence: String, message_id: String },
    Respond { sequence: String, envelope_id: Option<String> },
    Remember { sequence: String },
}

/// Passive observer of pipeline milestones.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Fired at stage entry, before `validate` runs.
    async fn on_stage(&self, _event: StageEvent) {}

    /// Fired when a branch's matcher accepts the current message.
    async fn on_branch_matched(&self, _branch_id: &str) {}

    /// Fired when an envelope is successfully handed off to the message
    /// adapter.
    async fn on_envelope_dispatched(&self, _envelope_id: &str, _method: &str) {}

    /// Fired when `remember` persists a state snapshot.
    async fn on_state_remembered(&self, _sequence: &str) {}
}
