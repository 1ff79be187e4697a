//! Inbound message payloads.
//!
//! A [`Message`] is immutable after construction, with one exception: the
//! `understand` stage may attach an [`NluResult`](crate::synapse::nlu::NluResult)
//! to a `Text` message's `nlu` field once NLU processing succeeds.

use crate::synapse::directory::User;
use crate::synapse::ids::new_id;
use crate::synapse::nlu::NluResult;
use serde_json::Value;

/// Tagged inbound message variants.
///
/// Every variant carries a 32-char `id` (see [`Message::id`]) and, except
/// [`CatchAll`](Message::CatchAll), a [`User`] reference.
#[derive(Debug, Clone, serde::Serialize)]
pub enum Message {
    /// Plain chat text, the only variant NLU and regex/capture matchers
    /// operate on.
    Text {
        user: User,
        text: String,
        id: String,
        /// Populated by the `understand` stage on a successful NLU call.
        nlu: Option<NluResult>,
    },
    /// A user joined the room.
    Enter { user: User, id: String },
    /// A user left the room.
    Leave { user: User, id: String },
    /// A platform-specific rich payload (buttons, cards, attachments, …).
    Rich { user: User, payload: Value, id: String },
    /// A server-originated event, matched by equality on payload keys.
    Server { user: User, data: Value, id: String },
    /// Wraps an unmatched message so the `act` stage's catch-all branches
    /// can still inspect the original.
    CatchAll { original: Box<Message> },
}

impl Message {
    /// Build a `Text` message with a fresh random id and no NLU result yet.
    pub fn text(user: User, text: impl Into<String>) -> Self {
        Message::Text {
            user,
            text: text.into(),
            id: new_id(),
            nlu: None,
        }
    }

    /// Build an `Enter` message with a fresh random id.
    pub fn enter(user: User) -> Self {
        Message::Enter { user, id: new_id() }
    }

    /// Build a `Leave` message with a fresh random id.
    pub fn leave(user: User) -> Self {
        Message::Leave { user, id: new_id() }
    }

    /// Build a `Rich` message with a fresh random id.
    pub fn rich(user: User, payload: Value) -> Self {
        Message::Rich {
            user,
            payload,
            id: new_id(),
        }
    }

    /// Build a `Server` message with a fresh random id.
    pub fn server(user: User, data: Value) -> Self {
        Message::Server {
            user,
            data,
            id: new_id(),
        }
    }

    /// Wrap this message in a `CatchAll`, preserving the original for
    /// fallback branches to inspect.
    pub fn into_catch_all(self) -> Self {
        Message::CatchAll {
            original: Box::new(self),
        }
    }

    /// The message's id, following `CatchAll` through to the wrapped
    /// original.
    pub fn id(&self) -> &str {
        match self {
            Message::Text { id, .. }
            | Message::Enter { id, .. }
            | Message::Leave { id, .. }
            | Message::Rich { id, .. }
            | Message::Server { id, .. } => id,
            Message::CatchAll { original } => original.id(),
        }
    }

    /// The message's user, following `CatchAll` through to the wrapped
    /// original.
    pub fn user(&self) -> &User {
        match self {
            Message::Text { user, .. }
            | Message::Enter { user, .. }
            | Message::Leave { user, .. }
            | Message::Rich { user, .. }
            | Message::Server { user, .. } => user,
            Message::CatchAll { original } => original.user(),
        }
    }

    /// The underlying text, if this is (or wraps) a `Text` message.
    pub fn text_content(&self) -> Option<&str> {
        match self {
            Message::Text { text, .. } => Some(text),
            Message::CatchAll { original } => original.text_content(),
            _ => None,
        }
    }

    /// The attached NLU result, if this is (or wraps) a `Text` message that
    /// went through `understand`.
    pub fn nlu_result(&self) -> Option<&NluResult> {
        match self {
            Message::Text { nlu, .. } => nlu.as_ref(),
            Message::CatchAll { original } => original.nlu_result(),
            _ => None,
        }
    }

    /// Attach an NLU result to a `Text` message in place. No-op on other
    /// variants — `understand`'s validate gate ensures this is only called
    /// on `Text`.
    pub fn attach_nlu(&mut self, result: NluResult) {
        if let Message::Text { nlu, .. } = self {
            *nlu = Some(result);
        }
    }

    /// `true` for the `Server` variant, used by `understand`'s validate
    /// gate to skip non-text messages.
    pub fn is_text(&self) -> bool {
        matches!(self, Message::Text { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synapse::directory::Room;

    fn user() -> User {
        User::new("u1", Room::new("general"))
    }

    #[test]
    fn text_message_has_32_char_id() {
        let msg = Message::text(user(), "hello");
        assert_eq!(msg.id().len(), 32);
    }

    #[test]
    fn catch_all_delegates_to_original() {
        let original = Message::text(user(), "hello");
        let original_id = original.id().to_string();
        let wrapped = original.into_catch_all();

        assert_eq!(wrapped.id(), original_id);
        assert_eq!(wrapped.text_content(), Some("hello"));
        assert_eq!(wrapped.user().id, "u1");
    }

    #[test]
    fn attach_nlu_only_affects_text() {
        let mut msg = Message::enter(user());
        msg.attach_nlu(NluResult::empty());
        assert!(msg.nlu_result().is_none());

        let mut text = Message::text(user(), "hi");
        text.attach_nlu(NluResult::empty());
        assert!(text.nlu_result().is_some());
    }

    #[test]
    fn non_text_variants_have_no_text_content() {
        assert!(Message::enter(user()).text_content().is_none());
        assert!(!Message::enter(user()).is_text());
        assert!(Message::text(user(), "hi").is_text());
    }
}
