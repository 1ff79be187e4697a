//! The thought-process pipeline's error hierarchy.
//!
//! Mirrors the split the runtime needs between errors that are *expected
//! absences* — no adapter configured, no branches on a stage, empty text —
//! and errors that are *programmer mistakes* that must propagate. See the
//! variant docs for which bucket each one falls in.
//!
//! # Examples
//!
//! ```
//! use synapse::CoreError;
//!
//! let err = CoreError::AdapterMissing("storage".into());
//! assert_eq!(err.to_string(), "adapter missing: storage");
//! ```

use std::error::Error;
use std::fmt;

/// Errors surfaced by the thought-process pipeline.
///
/// `ValidationFail` and `MiddlewareShortCircuit` are internal recovery
/// signals: a [`Thought`](crate::synapse::thought::Thought) catches them
/// locally and never lets them escape `process()`. The rest may surface to
/// an adapter or to the caller of [`Thoughts::receive`](crate::synapse::thoughts::Thoughts::receive)
/// / [`Thoughts::dispatch`](crate::synapse::thoughts::Thoughts::dispatch).
#[derive(Debug, Clone)]
pub enum CoreError {
    /// A stage needed a collaborator (message, storage, or NLU adapter)
    /// that was never configured. Recovered locally by the calling stage
    /// with a debug log, except `respond` without a message adapter, which
    /// is fatal for that envelope.
    AdapterMissing(String),

    /// An adapter does not implement the requested dispatch method.
    /// Fatal for the envelope being dispatched.
    MethodUnsupported(String),

    /// Internal signal: a stage's `validate` returned `false`. Never
    /// escapes [`Thought::process`](crate::synapse::thought::Thought::process).
    ValidationFail,

    /// Internal signal: a middleware piece called `done` instead of `next`.
    /// Never escapes [`Middleware::execute`](crate::synapse::middleware::Middleware::execute).
    MiddlewareShortCircuit,

    /// A user-supplied callback, validator, action, or middleware piece
    /// returned an error. Logged at error level; aborts the current
    /// pipeline and propagates to the sequence caller.
    Callback(String),

    /// A configuration problem: an unregistered middleware name at
    /// [`Thought`](crate::synapse::thought::Thought) construction, or an
    /// invalid [`RuntimeConfig`](crate::synapse::config::RuntimeConfig)
    /// value. Fatal at startup.
    Config(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::AdapterMissing(what) => write!(f, "adapter missing: {}", what),
            CoreError::MethodUnsupported(method) => {
                write!(f, "method unsupported: {}", method)
            }
            CoreError::ValidationFail => write!(f, "validation failed"),
            CoreError::MiddlewareShortCircuit => write!(f, "middleware short-circuited"),
            CoreError::Callback(msg) => write!(f, "callback error: {}", msg),
            CoreError::Config(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl Error for CoreError {}
