//! Id generation for messages, envelopes, and test fixtures.
//!
//! The runtime needs two distinct shapes of identifier: a 32-char random id
//! for anything that crosses an adapter boundary (messages, envelopes), and a
//! small strictly-increasing counter id for components that want something
//! stable and orderable without pulling in randomness (dialogue audience
//! keys in tests, fixture data).

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Generates a 32-character random id.
///
/// Uses a v4 UUID rendered without hyphens, which is exactly 32 hex
/// characters — matching the id shape carried by every [`Message`](crate::Message)
/// and [`Envelope`](crate::Envelope).
///
/// # Examples
///
/// ```
/// use synapse::synapse::ids::new_id;
///
/// let id = new_id();
/// assert_eq!(id.len(), 32);
/// assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A strictly-increasing, per-prefix counter id generator.
///
/// Each call to [`next`](SequentialId::next) returns `"{prefix}-{n}"` with
/// `n` starting at 1 and incrementing monotonically for the lifetime of the
/// generator. Useful where a test or fixture wants orderable ids without the
/// randomness of [`new_id`].
///
/// # Examples
///
/// ```
/// use synapse::synapse::ids::SequentialId;
///
/// let gen = SequentialId::new("branch");
/// assert_eq!(gen.next(), "branch-1");
/// assert_eq!(gen.next(), "branch-2");
/// ```
#[derive(Debug)]
pub struct SequentialId {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialId {
    /// Create a new generator for the given prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Produce the next id in the sequence. Safe to call concurrently.
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", self.prefix, n)
    }
}
