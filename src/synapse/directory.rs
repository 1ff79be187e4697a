//! User / room identity records and the process-wide directory that
//! deduplicates them.
//!
//! A [`User`] and [`Room`] are cheap, clonable identity records rather than
//! live handles — branch callbacks look components up through the
//! [`UserDirectory`] by id instead of holding references into it, matching
//! the "avoid cross-run sharing of sub-objects" guidance for [`State`](crate::State).

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A chat room (or channel, or DM pairing) identity.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Room {
    /// Stable platform identifier for the room.
    pub id: String,
    /// Display name, if the platform provides one.
    pub name: Option<String>,
}

impl Room {
    /// Construct a room with no display name.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Construct a room with a display name.
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

/// A chat user identity, always attached to the room they were seen in.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct User {
    /// Stable platform identifier for the user.
    pub id: String,
    /// Display name, if the platform provides one.
    pub name: Option<String>,
    /// The room this user was last observed in.
    pub room: Room,
}

impl User {
    /// Construct a user with no display name.
    pub fn new(id: impl Into<String>, room: Room) -> Self {
        Self {
            id: id.into(),
            name: None,
            room,
        }
    }

    /// Construct a user with a display name.
    pub fn named(id: impl Into<String>, name: impl Into<String>, room: Room) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            room,
        }
    }
}

/// Process-wide, deduplicated registry of users seen by the runtime.
///
/// First seen wins: inserting a user whose id is already present leaves the
/// stored record's fields untouched unless [`UserDirectory::update`] is used
/// explicitly. Shared behind an `Arc<RwLock<_>>` so it can be cloned cheaply
/// and handed to adapters and the `remember` stage alike.
///
/// # Examples
///
/// ```
/// use synapse::synapse::directory::{Room, User, UserDirectory};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let dir = UserDirectory::new();
/// let room = Room::new("general");
/// dir.see(User::named("u1", "Ada", room.clone())).await;
/// // Re-seeing the same id with a different name doesn't overwrite it.
/// dir.see(User::named("u1", "Ada Lovelace", room)).await;
/// assert_eq!(dir.get("u1").await.unwrap().name.as_deref(), Some("Ada"));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct UserDirectory {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl UserDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record a user if not already present. First seen wins.
    pub async fn see(&self, user: User) {
        let mut users = self.users.write().await;
        users.entry(user.id.clone()).or_insert(user);
    }

    /// Insert or overwrite a user's record unconditionally.
    pub async fn update(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    /// Look up a user by id.
    pub async fn get(&self, id: &str) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }

    /// Number of distinct users currently known.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Whether the directory currently holds no users.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Snapshot every known user, keyed by id — the shape `loadMemory`'s
    /// `users` sub expects to rehydrate from and `saveMemory` persists to.
    pub async fn snapshot(&self) -> HashMap<String, User> {
        self.users.read().await.clone()
    }

    /// Replace the directory's contents with a rehydrated snapshot.
    pub async fn restore(&self, users: HashMap<String, User>) {
        *self.users.write().await = users;
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}
