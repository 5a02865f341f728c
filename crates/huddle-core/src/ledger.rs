//! Per-container message sequence and windowed reads.
//!
//! A container's ledger is newest-first: index 0 is always the most
//! recently appended surviving message. Deletions close the gap in the
//! observed index space; message ids are never renumbered.

use huddle_types::api::PagedMessages;
use huddle_types::error::{ApiError, ApiResult};
use huddle_types::models::Message;

pub const PAGE_SIZE: usize = 50;

/// Inserts at the head. Older messages shift one index later; nothing else
/// about them changes.
pub fn append(messages: &mut Vec<Message>, message: Message) {
    messages.insert(0, message);
}

/// Deletes exactly one message by id. Returns false when the id is not in
/// this ledger.
pub fn remove(messages: &mut Vec<Message>, message_id: i64) -> bool {
    match messages.iter().position(|m| m.message_id == message_id) {
        Some(index) => {
            messages.remove(index);
            true
        }
        None => false,
    }
}

/// Recomputes the message's own-reaction flags against `viewer_id`. Every
/// read path runs this; the persisted flag is meaningless.
pub fn project_for_viewer(message: &Message, viewer_id: i64) -> Message {
    let mut message = message.clone();
    for react in &mut message.reactions {
        react.viewer_reacted = react.user_ids.contains(&viewer_id);
    }
    message
}

/// Serves the window `[start, start + 50)` over the live sequence.
///
/// `start` may equal the message count (empty base case); anything past
/// that is `InvalidArgument`. Each returned message has its own-reaction
/// flag recomputed against `viewer_id` — a read-time projection, never a
/// stored fact.
pub fn page(messages: &[Message], start: usize, viewer_id: i64) -> ApiResult<PagedMessages> {
    if start > messages.len() {
        return Err(ApiError::InvalidArgument(
            "start is greater than the number of messages",
        ));
    }

    let upper = (start + PAGE_SIZE).min(messages.len());
    let window = messages[start..upper]
        .iter()
        .map(|message| project_for_viewer(message, viewer_id))
        .collect();

    let end = if start + PAGE_SIZE >= messages.len() {
        -1
    } else {
        (start + PAGE_SIZE) as i64
    };

    Ok(PagedMessages {
        messages: window,
        start,
        end,
    })
}
