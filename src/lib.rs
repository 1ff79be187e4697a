// src/lib.rs

// Import the top-level `synapse` module.
pub mod synapse;

// If you want to provide direct access (without having to navigate through the whole hierarchy) to certain types or functionalities at the crate level, you can use re-exports:

// Re-exporting key items for easier external access.
pub use synapse::branch::{Branch, BranchId, Matcher};
pub use synapse::config::RuntimeConfig;
pub use synapse::dialogue::{Dialogue, DialogueRegistry, DialogueScope};
pub use synapse::envelope::{Envelope, EnvelopeMethod};
pub use synapse::error::CoreError;
pub use synapse::message::Message;
pub use synapse::state::State;
pub use synapse::thoughts::{Thoughts, ThoughtsBuilder};
