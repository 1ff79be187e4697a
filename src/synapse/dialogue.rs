//! Per-audience conversation continuity: once a branch installs follow-up
//! branches for the audience that triggered it, those branches become the
//! ones matched against that audience's *next* turn, instead of the global
//! path.

use crate::synapse::directory::{Room, User};
use crate::synapse::path::Path;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// How a dialogue's audience key is derived from the inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueScope {
    User,
    Room,
    UserAndRoom,
}

impl DialogueScope {
    pub fn key(&self, user: &User, room: &Room) -> String {
        match self {
            DialogueScope::User => format!("user:{}", user.id),
            DialogueScope::Room => format!("room:{}", room.id),
            DialogueScope::UserAndRoom => format!("user:{}|room:{}", user.id, room.id),
        }
    }
}

/// One engaged conversation: the path its audience's next turn is matched
/// against, installed by the branch callback that started (or continued)
/// the exchange.
pub struct Dialogue {
    pub audience_key: String,
    pub path: Path,
}

/// Keyed registry of active dialogues, guarded for concurrent receives.
pub struct DialogueRegistry {
    scope: DialogueScope,
    dialogues: Arc<RwLock<HashMap<String, Dialogue>>>,
}

impl DialogueRegistry {
    pub fn new(scope: DialogueScope) -> Self {
        Self {
            scope,
            dialogues: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn audience_key(&self, user: &User, room: &Room) -> String {
        self.scope.key(user, room)
    }

    /// Whether this audience currently has an engaged dialogue.
    pub async fn engaged(&self, user: &User, room: &Room) -> bool {
        let key = self.audience_key(user, room);
        self.dialogues.read().await.contains_key(&key)
    }

    /// A clone of the engaged dialogue's path, to match the next turn
    /// against. `None` when this audience has no engaged dialogue.
    pub async fn path_snapshot(&self, audience_key: &str) -> Option<Path> {
        self.dialogues
            .read()
            .await
            .get(audience_key)
            .map(|d| d.path.clone())
    }

    /// Install (or replace) the path this audience's next turn matches
    /// against, creating the dialogue if it doesn't exist yet.
    pub async fn set_path(&self, audience_key: &str, path: Path) {
        self.dialogues.write().await.insert(
            audience_key.to_string(),
            Dialogue {
                audience_key: audience_key.to_string(),
                path,
            },
        );
    }

    /// Remove the dialogue entirely (matched turn with no follow-up
    /// branches installed).
    pub async fn close(&self, audience_key: &str) {
        self.dialogues.write().await.remove(audience_key);
    }
}
