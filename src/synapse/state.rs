//! The mutable record threaded through one pipeline run.

use crate::synapse::branch::{Branch, BranchId};
use crate::synapse::envelope::Envelope;
use crate::synapse::message::Message;
use crate::synapse::path::Stage;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One reception or dispatch run's worth of mutable pipeline state.
///
/// Owned by a single [`Thoughts::receive`](crate::synapse::thoughts::Thoughts::receive)
/// or [`Thoughts::dispatch`](crate::synapse::thoughts::Thoughts::dispatch) call.
/// Never shared across runs — branch callbacks that need cross-run data go
/// through the [`UserDirectory`](crate::synapse::directory::UserDirectory) or
/// a storage adapter instead of holding a reference into someone else's
/// `State`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct State {
    /// Which named sequence (`receive`, `serve`, `respond`, `dispatch`) is
    /// running.
    pub sequence: String,
    /// The inbound message, for `receive`/`serve` sequences.
    pub message: Option<Message>,
    /// The outbound envelope queue. `respond` dispatches the oldest
    /// undispatched entry; `remember` checks whether any entry was
    /// dispatched.
    pub envelopes: Vec<Envelope>,
    /// Timestamp recorded for each stage that completed its middleware
    /// terminal without a short-circuit.
    pub processed: HashMap<String, DateTime<Utc>>,
    /// Set true the moment any branch's matcher fires in this run. Once
    /// true, stays true for the remainder of the run.
    pub matched: bool,
    /// Stops further branches in the *current* stage when set.
    pub done: bool,
    /// Aborts the entire sequence at the next stage boundary when set.
    pub exit: bool,
    /// The id of the last branch whose matcher fired.
    pub branch: Option<BranchId>,
    /// Captured fragments from the most recent branch match.
    pub conditions: Vec<String>,
    pub heard: Option<DateTime<Utc>>,
    pub listened: Option<DateTime<Utc>>,
    pub understood: Option<DateTime<Utc>>,
    pub responded: Option<DateTime<Utc>>,
    pub remembered: Option<DateTime<Utc>>,
    /// Branches a callback wants installed on the audience's dialogue path
    /// for the next turn, if this run's sequence ends up matched. Not part
    /// of the persisted snapshot — reconciled into the dialogue registry by
    /// the orchestrator once the sequence completes.
    #[serde(skip)]
    pub follow_up: Vec<(Stage, Branch)>,
}

impl State {
    /// Begin a new run carrying an inbound message.
    pub fn for_message(sequence: impl Into<String>, message: Message) -> Self {
        Self {
            sequence: sequence.into(),
            message: Some(message),
            envelopes: Vec::new(),
            processed: HashMap::new(),
            matched: false,
            done: false,
            exit: false,
            branch: None,
            conditions: Vec::new(),
            heard: None,
            listened: None,
            understood: None,
            responded: None,
            remembered: None,
            follow_up: Vec::new(),
        }
    }

    /// Begin a new run carrying a pre-built outbound envelope (the
    /// `dispatch` sequence's entry point — no branch matched it, it was
    /// constructed directly by the caller).
    pub fn for_envelope(sequence: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            sequence: sequence.into(),
            message: None,
            envelopes: vec![envelope],
            processed: HashMap::new(),
            matched: false,
            done: false,
            exit: false,
            branch: None,
            conditions: Vec::new(),
            heard: None,
            listened: None,
            understood: None,
            responded: None,
            remembered: None,
            follow_up: Vec::new(),
        }
    }

    /// `processed[stage]` exists ⇔ that stage's middleware terminal ran to
    /// completion.
    pub fn mark_processed(&mut self, stage: &str) {
        self.processed.insert(stage.to_string(), Utc::now());
    }

    /// Whether `stage` completed successfully in this run.
    pub fn was_processed(&self, stage: &str) -> bool {
        self.processed.contains_key(stage)
    }

    /// Stop further branches in the current stage. Does not by itself skip
    /// later stages — that's `exit`'s job.
    pub fn finish(&mut self) {
        self.done = true;
    }

    /// Record that a branch matched: sets `matched`, `branch`, and
    /// `conditions`.
    pub fn record_match(&mut self, branch: BranchId, conditions: Vec<String>) {
        self.matched = true;
        self.branch = Some(branch);
        self.conditions = conditions;
    }

    /// Push a newly-built envelope onto the outbound queue (a branch
    /// callback's way of saying "send this").
    pub fn respond_envelope(&mut self, envelope: Envelope) {
        self.envelopes.push(envelope);
    }

    /// The oldest envelope still awaiting dispatch, if any.
    pub fn pending_envelope(&self) -> Option<&Envelope> {
        self.envelopes.iter().find(|e| e.responded.is_none())
    }

    /// Mutable access to the oldest envelope still awaiting dispatch.
    pub fn pending_envelope_mut(&mut self) -> Option<&mut Envelope> {
        self.envelopes.iter_mut().find(|e| e.responded.is_none())
    }

    /// The most recently dispatched envelope, if any.
    pub fn dispatched_envelope(&self) -> Option<&Envelope> {
        self.envelopes.iter().rev().find(|e| e.responded.is_some())
    }

    /// Whether any envelope in this run was successfully dispatched.
    pub fn has_dispatched_envelope(&self) -> bool {
        self.dispatched_envelope().is_some()
    }

    /// Queue a branch to install on the triggering audience's dialogue path
    /// for their next turn, if this run ends up matched.
    pub fn add_follow_up(&mut self, stage: Stage, branch: Branch) {
        self.follow_up.push((stage, branch));
    }
}
