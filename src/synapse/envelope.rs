//! Outbound message builder and its dispatch validation.

use crate::synapse::directory::{Room, User};
use crate::synapse::error::CoreError;
use crate::synapse::ids::new_id;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// The dispatch method an [`Envelope`] requests of the message adapter.
///
/// The method set is intentionally open — adapters may support methods
/// beyond these four, but a core-constructed `Envelope` only ever uses one
/// of these, and [`Envelope::validate`] only knows how to check them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum EnvelopeMethod {
    /// Send to the room the inbound message arrived in.
    Send,
    /// Send a direct message to the user, bypassing the room.
    Dm,
    /// Reply in-room, prefixing the user's name when the room isn't
    /// already a DM (see the adapter contract in [`crate::synapse::adapters`]).
    Reply,
    /// React to a specific message id rather than sending new text.
    React,
    /// Send an emote/action-style message.
    Emote,
}

impl EnvelopeMethod {
    /// The wire name of this method, as an adapter would see it.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeMethod::Send => "send",
            EnvelopeMethod::Dm => "dm",
            EnvelopeMethod::Reply => "reply",
            EnvelopeMethod::React => "react",
            EnvelopeMethod::Emote => "emote",
        }
    }
}

/// An outbound message under construction, to be handed to a message
/// adapter's `dispatch`.
///
/// Invariant enforced by [`Envelope::validate`]: at dispatch time either
/// `room` or `user` must resolve to a room; `reply` additionally requires a
/// user; `react` additionally requires a `reacts_to` target message id.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Envelope {
    pub id: String,
    pub method: EnvelopeMethod,
    pub room: Option<Room>,
    pub user: Option<User>,
    pub strings: Vec<String>,
    pub payload: Option<Value>,
    pub branch_id: Option<String>,
    /// Message id being reacted to. Required when `method == React`.
    pub reacts_to: Option<String>,
    pub created: DateTime<Utc>,
    pub responded: Option<DateTime<Utc>>,
}

impl Envelope {
    /// Start building an envelope for the given method, targeting a room.
    pub fn new(method: EnvelopeMethod, room: Room) -> Self {
        Self {
            id: new_id(),
            method,
            room: Some(room),
            user: None,
            strings: Vec::new(),
            payload: None,
            branch_id: None,
            reacts_to: None,
            created: Utc::now(),
            responded: None,
        }
    }

    /// Start building a `dm`/`reply` envelope targeting a user directly.
    pub fn to_user(method: EnvelopeMethod, user: User) -> Self {
        let room = user.room.clone();
        Self {
            id: new_id(),
            method,
            room: Some(room),
            user: Some(user),
            strings: Vec::new(),
            payload: None,
            branch_id: None,
            reacts_to: None,
            created: Utc::now(),
            responded: None,
        }
    }

    /// Append an outbound text line.
    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.strings.push(text.into());
        self
    }

    /// Attach an attachment/rich payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set the message id this envelope reacts to (required for `React`).
    pub fn reacting_to(mut self, message_id: impl Into<String>) -> Self {
        self.reacts_to = Some(message_id.into());
        self
    }

    /// Validate this envelope against its method's dispatch requirements.
    ///
    /// Called by the `respond` stage and by message adapters before
    /// honouring `dispatch`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.room.is_none() && self.user.is_none() {
            return Err(CoreError::Callback(
                "envelope has neither room nor user to resolve".into(),
            ));
        }
        match self.method {
            EnvelopeMethod::Reply if self.user.is_none() => Err(CoreError::Callback(
                "reply envelope requires a user".into(),
            )),
            EnvelopeMethod::React if self.reacts_to.is_none() => Err(CoreError::Callback(
                "react envelope requires a target message id".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Mark this envelope as having been handed off to the message adapter.
    pub fn mark_responded(&mut self) {
        self.responded = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::new("general")
    }

    fn user() -> User {
        User::new("u1", room())
    }

    #[test]
    fn send_to_room_is_valid() {
        let env = Envelope::new(EnvelopeMethod::Send, room()).say("hi");
        assert!(env.validate().is_ok());
        assert_eq!(env.id.len(), 32);
    }

    #[test]
    fn reply_without_user_is_invalid() {
        let env = Envelope::new(EnvelopeMethod::Reply, room());
        assert!(env.validate().is_err());
    }

    #[test]
    fn reply_with_user_is_valid() {
        let env = Envelope::to_user(EnvelopeMethod::Reply, user());
        assert!(env.validate().is_ok());
    }

    #[test]
    fn react_without_target_is_invalid() {
        let env = Envelope::new(EnvelopeMethod::React, room());
        assert!(env.validate().is_err());
        let env = env.reacting_to("msg-id");
        assert!(env.validate().is_ok());
    }

    #[test]
    fn mark_responded_sets_timestamp() {
        let mut env = Envelope::new(EnvelopeMethod::Send, room());
        assert!(env.responded.is_none());
        env.mark_responded();
        assert!(env.responded.is_some());
    }
}
