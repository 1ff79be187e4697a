//! Named, ordered middleware chains that wrap a stage's or branch's terminal
//! action.
//!
//! Each piece in a chain inspects or mutates the run's [`State`] and decides
//! whether the chain continues (`Next`) or short-circuits (`Done`). The
//! chain is walked iteratively — there is no recursive `next()` closure
//! nesting, so a long chain costs one stack frame, not one per piece.

use crate::synapse::error::CoreError;
use crate::synapse::state::State;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// What a middleware piece decided after inspecting the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Continue to the next piece (or, if this was the last piece, to the
    /// terminal action).
    Next,
    /// Stop the chain here. The terminal action does not run.
    Done,
}

/// One piece of a named middleware chain.
#[async_trait]
pub trait Piece: Send + Sync {
    async fn run(&self, state: &mut State) -> Result<Signal, CoreError>;
}

type Terminal<'a> =
    Box<dyn FnOnce(&'a mut State) -> Pin<Box<dyn Future<Output = Result<(), CoreError>> + Send + 'a>> + Send + 'a>;

/// A single named, ordered chain of [`Piece`]s.
#[derive(Default, Clone)]
pub struct Middleware {
    pieces: Vec<Arc<dyn Piece>>,
}

impl Middleware {
    pub fn new() -> Self {
        Self { pieces: Vec::new() }
    }

    /// Append a piece to the end of the chain.
    pub fn register(&mut self, piece: Arc<dyn Piece>) {
        self.pieces.push(piece);
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Walk the chain in registration order. If every piece returns `Next`,
    /// run `terminal` and return `true`. If any piece returns `Done`, stop
    /// immediately and return `false` without running `terminal`.
    pub async fn execute<'a, F>(&self, state: &'a mut State, terminal: F) -> Result<bool, CoreError>
    where
        F: FnOnce(&'a mut State) -> Pin<Box<dyn Future<Output = Result<(), CoreError>> + Send + 'a>>
            + Send
            + 'a,
    {
        for piece in &self.pieces {
            match piece.run(state).await? {
                Signal::Next => continue,
                Signal::Done => return Ok(false),
            }
        }
        let terminal: Terminal<'a> = Box::new(terminal);
        terminal(state).await?;
        Ok(true)
    }
}

/// Named middleware chains, one per stage (`hear`, `listen`, `understand`,
/// `act`, `serve`, `respond`, `remember`), plus any custom names a caller
/// installs.
///
/// The seven built-in stage names start out registered with an empty chain
/// so that constructing a [`Thought`](crate::synapse::thought::Thought) for
/// a built-in stage never fails for lack of a middleware entry. A stage name
/// that was never registered (built-in or custom) is a configuration error
/// at `Thought` construction time.
pub struct MiddlewareRegistry {
    chains: HashMap<String, Middleware>,
}

pub const BUILTIN_STAGES: [&str; 7] = [
    "hear",
    "listen",
    "understand",
    "act",
    "serve",
    "respond",
    "remember",
];

impl MiddlewareRegistry {
    pub fn new() -> Self {
        let mut chains = HashMap::new();
        for name in BUILTIN_STAGES {
            chains.insert(name.to_string(), Middleware::new());
        }
        Self { chains }
    }

    /// Declare a named chain, seeding it empty if it doesn't already exist.
    /// Idempotent.
    pub fn ensure(&mut self, name: impl Into<String>) {
        self.chains.entry(name.into()).or_default();
    }

    /// Append a piece to `name`'s chain, creating the chain if it doesn't
    /// exist yet.
    pub fn register(&mut self, name: impl Into<String>, piece: Arc<dyn Piece>) {
        self.chains.entry(name.into()).or_default().register(piece);
    }

    /// Look up a chain by name. `None` means the name was never registered.
    pub fn get(&self, name: &str) -> Option<&Middleware> {
        self.chains.get(name)
    }
}

impl Default for MiddlewareRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synapse::directory::{Room, User};
    use crate::synapse::message::Message;

    struct CountingPiece {
        counter: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl Piece for CountingPiece {
        async fn run(&self, _state: &mut State) -> Result<Signal, CoreError> {
            self.counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Signal::Next)
        }
    }

    struct StoppingPiece;

    #[async_trait]
    impl Piece for StoppingPiece {
        async fn run(&self, _state: &mut State) -> Result<Signal, CoreError> {
            Ok(Signal::Done)
        }
    }

    fn sample_state() -> State {
        State::for_message("receive", Message::text(User::new("u1", Room::new("g")), "hi"))
    }

    #[tokio::test]
    async fn empty_chain_runs_terminal() {
        let middleware = Middleware::new();
        let mut state = sample_state();
        let ran = middleware
            .execute(&mut state, |s| Box::pin(async move { s.mark_processed("hear"); Ok(()) }))
            .await
            .unwrap();
        assert!(ran);
        assert!(state.was_processed("hear"));
    }

    #[tokio::test]
    async fn all_next_pieces_run_terminal() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut middleware = Middleware::new();
        middleware.register(Arc::new(CountingPiece { counter: counter.clone() }));
        middleware.register(Arc::new(CountingPiece { counter: counter.clone() }));

        let mut state = sample_state();
        let ran = middleware
            .execute(&mut state, |s| Box::pin(async move { s.mark_processed("hear"); Ok(()) }))
            .await
            .unwrap();

        assert!(ran);
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert!(state.was_processed("hear"));
    }

    #[tokio::test]
    async fn done_piece_short_circuits_before_terminal() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut middleware = Middleware::new();
        middleware.register(Arc::new(StoppingPiece));
        middleware.register(Arc::new(CountingPiece { counter: counter.clone() }));

        let mut state = sample_state();
        let ran = middleware
            .execute(&mut state, |s| Box::pin(async move { s.mark_processed("hear"); Ok(()) }))
            .await
            .unwrap();

        assert!(!ran);
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(!state.was_processed("hear"));
    }

    #[test]
    fn registry_preseeds_builtin_stage_names() {
        let registry = MiddlewareRegistry::new();
        for name in BUILTIN_STAGES {
            assert!(registry.get(name).is_some());
        }
        assert!(registry.get("custom").is_none());
    }
}
