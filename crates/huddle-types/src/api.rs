use serde::Serialize;

use crate::models::Message;

/// One fixed-size window of a container's newest-first message sequence.
///
/// `end` is `start + 50` when more messages remain past this window, `-1`
/// when the window reaches the least-recent message (including the
/// zero-message case).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedMessages {
    pub messages: Vec<Message>,
    pub start: usize,
    pub end: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StandupStatus {
    pub is_active: bool,
    pub finish_at: Option<i64>,
}
