//! Pluggable platform, storage, and NLU provider contracts.
//!
//! Modelled as `async_trait` capabilities, matching the teacher's
//! `ClientWrapper`/`ToolProtocol` convention: implementations cross the
//! trait boundary with their own error type boxed as
//! `Box<dyn std::error::Error + Send + Sync>`, while the core's own
//! [`CoreError`](crate::synapse::error::CoreError) implements
//! `std::error::Error` so it boxes into that boundary without ceremony.

use crate::synapse::envelope::Envelope;
use crate::synapse::error::CoreError;
use async_trait::async_trait;
use serde_json::Value;
use std::error::Error;

pub type AdapterError = Box<dyn Error + Send + Sync>;

/// A chat platform binding: subscribes to inbound events and dispatches
/// outbound envelopes.
#[async_trait]
pub trait MessageAdapter: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;
    async fn shutdown(&self) -> Result<(), AdapterError>;

    /// Honour `envelope.method`. An adapter that doesn't support the
    /// requested method must fail with `CoreError::MethodUnsupported`.
    async fn dispatch(&self, envelope: &Envelope) -> Result<(), AdapterError>;
}

/// A persistence binding for serial sub-collections and the in-memory key/
/// value brain.
///
/// `sub = "memory"` is reserved for [`save_memory`](StorageAdapter::save_memory)/
/// [`load_memory`](StorageAdapter::load_memory); every other `sub` name
/// addresses an append-only serial store consulted through
/// [`find`](StorageAdapter::find)/[`find_one`](StorageAdapter::find_one).
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;
    async fn shutdown(&self) -> Result<(), AdapterError>;

    async fn keep(&self, sub: &str, data: Value) -> Result<(), AdapterError>;
    async fn find(&self, sub: &str, params: &Value) -> Result<Vec<Value>, AdapterError>;
    async fn find_one(&self, sub: &str, params: &Value) -> Result<Option<Value>, AdapterError>;
    async fn lose(&self, sub: &str, params: &Value) -> Result<u64, AdapterError>;

    async fn save_memory(&self, data: Value) -> Result<(), AdapterError>;
    async fn load_memory(&self) -> Result<Value, AdapterError>;
}

/// A natural-language-understanding provider: raw, per-provider JSON in,
/// normalised by [`NluResult`](crate::synapse::nlu::NluResult) once it
/// crosses back into the core.
#[async_trait]
pub trait NluAdapter: Send + Sync {
    /// An empty JSON object means "no result".
    async fn process(&self, text: &str) -> Result<Value, AdapterError>;
}

/// Convenience for adapters that want to surface one of the core's own
/// error kinds without constructing the box by hand.
pub fn adapter_error(err: CoreError) -> AdapterError {
    Box::new(err)
}
