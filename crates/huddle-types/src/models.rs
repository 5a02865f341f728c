use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Sentinel written over a removed DM's `id` and `creator_id`. The record
/// stays in place so later ids keep their dense-index meaning; lookups treat
/// it as gone.
pub const DM_DELETED: i64 = -2;

/// The only reaction kind the frontend knows about.
pub const REACT_ID: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Channel,
    Dm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: ContainerKind,
    pub container_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub react_id: i64,
    pub user_ids: Vec<i64>,
    /// Whether the user reading the message has reacted themselves.
    /// Recomputed against the viewer on every paged read; the persisted
    /// value is meaningless.
    #[serde(default)]
    pub viewer_reacted: bool,
}

impl Reaction {
    pub fn empty() -> Self {
        Self {
            react_id: REACT_ID,
            user_ids: Vec::new(),
            viewer_reacted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Globally unique across channels and DMs, monotonically increasing,
    /// never reused even after deletion.
    pub message_id: i64,
    pub sender_id: i64,
    pub text: String,
    pub time_sent: i64,
    pub reactions: Vec<Reaction>,
    pub is_pinned: bool,
}

impl Message {
    pub fn new(message_id: i64, sender_id: i64, text: &str, time_sent: i64) -> Self {
        Self {
            message_id,
            sender_id,
            text: text.to_string(),
            time_sent,
            reactions: vec![Reaction::empty()],
            is_pinned: false,
        }
    }
}

/// Per-channel standup accumulator. Created inert alongside the channel,
/// armed by `standup_start`, consumed and reset by the scheduler at expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standup {
    pub is_active: bool,
    pub finish_at: Option<i64>,
    pub starter_id: i64,
    pub handles: Vec<String>,
    pub lines: Vec<String>,
}

impl Standup {
    pub fn inert() -> Self {
        Self {
            is_active: false,
            finish_at: None,
            starter_id: -1,
            handles: Vec::new(),
            lines: Vec::new(),
        }
    }
}

impl Default for Standup {
    fn default() -> Self {
        Self::inert()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// Dense index into `Snapshot::channels`.
    pub id: i64,
    pub name: String,
    pub is_public: bool,
    pub owner_ids: Vec<i64>,
    pub member_ids: Vec<i64>,
    /// Newest-first: index 0 is the most recently appended message.
    pub messages: Vec<Message>,
    pub standup: Standup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dm {
    /// Dense index into `Snapshot::dms`, or `DM_DELETED` once removed.
    pub id: i64,
    /// Alphabetically sorted member handles joined with ", ", fixed at
    /// creation time.
    pub name: String,
    pub creator_id: i64,
    pub member_ids: Vec<i64>,
    pub messages: Vec<Message>,
}

impl Dm {
    pub fn is_deleted(&self) -> bool {
        self.id == DM_DELETED
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Dense index into `Snapshot::users`.
    pub id: i64,
    pub email: String,
    pub handle: String,
    pub channel_ids: Vec<i64>,
    pub dm_ids: Vec<i64>,
    /// Newest-first, unbounded; readers only ever see the first 20.
    pub notifications: Vec<Notification>,
}

/// The single root object the store persists. Rewritten in full on every
/// mutating operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub channels: Vec<Channel>,
    pub dms: Vec<Dm>,

    /// Monotonic counters. `next_message_id` backs the global message-id
    /// allocator; the token and reset-code counters belong to the session
    /// layer and are carried here only because they live in the same
    /// persisted document.
    pub next_message_id: i64,
    #[serde(default)]
    pub next_token: i64,
    #[serde(default)]
    pub next_reset_code: i64,

    /// Secondary indexes over the user table, maintained on registration
    /// and invalidated/rebuilt on handle or email change.
    #[serde(default)]
    pub handle_index: HashMap<String, i64>,
    #[serde(default)]
    pub email_index: HashMap<String, i64>,
}

impl Snapshot {
    pub fn user(&self, id: i64) -> Option<&User> {
        usize::try_from(id).ok().and_then(|i| self.users.get(i))
    }

    pub fn user_mut(&mut self, id: i64) -> Option<&mut User> {
        usize::try_from(id).ok().and_then(|i| self.users.get_mut(i))
    }

    pub fn channel(&self, id: i64) -> Option<&Channel> {
        usize::try_from(id).ok().and_then(|i| self.channels.get(i))
    }

    pub fn channel_mut(&mut self, id: i64) -> Option<&mut Channel> {
        usize::try_from(id).ok().and_then(|i| self.channels.get_mut(i))
    }

    /// Resolves a live DM. A removed DM slot (sentinel id) is not returned.
    pub fn dm(&self, id: i64) -> Option<&Dm> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.dms.get(i))
            .filter(|d| !d.is_deleted())
    }

    pub fn dm_mut(&mut self, id: i64) -> Option<&mut Dm> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.dms.get_mut(i))
            .filter(|d| !d.is_deleted())
    }

    pub fn user_by_handle(&self, handle: &str) -> Option<i64> {
        self.handle_index.get(handle).copied()
    }

    pub fn user_by_email(&self, email: &str) -> Option<i64> {
        self.email_index.get(email).copied()
    }

    /// Current handles for the given user ids, in order; unknown ids are
    /// skipped.
    pub fn handles(&self, ids: &[i64]) -> Vec<String> {
        ids.iter()
            .filter_map(|&id| self.user(id).map(|u| u.handle.clone()))
            .collect()
    }

    pub fn rebuild_indexes(&mut self) {
        self.handle_index = self
            .users
            .iter()
            .map(|u| (u.handle.clone(), u.id))
            .collect();
        self.email_index = self
            .users
            .iter()
            .map(|u| (u.email.clone(), u.id))
            .collect();
    }
}
