//! Standup aggregation: a time-boxed buffer per channel, consumed by the
//! scheduler at expiry and posted as one consolidated message.

use huddle_types::api::StandupStatus;
use huddle_types::error::{ApiError, ApiResult};
use huddle_types::models::{Message, Snapshot, Standup};

use crate::channels::require_channel_member;
use crate::message::MAX_MESSAGE_LEN;
use crate::scheduler::Effect;
use crate::{App, ledger, require_user};

impl App {
    /// Arms the channel's standup for `length_secs` and schedules its
    /// finalization. At most one standup is active per channel at a time.
    /// Returns the finish time.
    pub fn standup_start(&self, who: i64, channel_id: i64, length_secs: i64) -> ApiResult<i64> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_channel_member(&snapshot, channel_id, who)?;

        if length_secs < 0 {
            return Err(ApiError::InvalidArgument("standup length is negative"));
        }
        let Some(channel) = snapshot.channel(channel_id) else {
            return Err(ApiError::NotFound("no such channel"));
        };
        if channel.standup.is_active {
            return Err(ApiError::InvalidArgument(
                "a standup is already active in the channel",
            ));
        }

        let finish_at = self.now() + length_secs;
        if let Some(channel) = snapshot.channel_mut(channel_id) {
            channel.standup = Standup {
                is_active: true,
                finish_at: Some(finish_at),
                starter_id: who,
                handles: Vec::new(),
                lines: Vec::new(),
            };
        }
        self.scheduler()
            .schedule(finish_at, Effect::StandupFinalize { channel_id });

        self.commit(snapshot)?;
        Ok(finish_at)
    }

    /// Buffers `"<handle>: <text>"` into the active standup. Contributions
    /// are invisible until finalization posts them all at once.
    pub fn standup_send(&self, who: i64, channel_id: i64, text: &str) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_channel_member(&snapshot, channel_id, who)?;

        if text.chars().count() > MAX_MESSAGE_LEN {
            return Err(ApiError::InvalidArgument(
                "message is longer than 1000 characters",
            ));
        }
        let Some(channel) = snapshot.channel(channel_id) else {
            return Err(ApiError::NotFound("no such channel"));
        };
        if !channel.standup.is_active {
            return Err(ApiError::InvalidArgument(
                "no standup is active in the channel",
            ));
        }

        let Some(handle) = snapshot.user(who).map(|u| u.handle.clone()) else {
            return Err(ApiError::Unauthenticated("unknown user id"));
        };
        if let Some(channel) = snapshot.channel_mut(channel_id) {
            channel.standup.handles.push(handle);
            channel.standup.lines.push(text.to_string());
        }
        self.commit(snapshot)
    }

    pub fn standup_active(&self, who: i64, channel_id: i64) -> ApiResult<StandupStatus> {
        let snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_channel_member(&snapshot, channel_id, who)?;
        let Some(channel) = snapshot.channel(channel_id) else {
            return Err(ApiError::NotFound("no such channel"));
        };
        Ok(StandupStatus {
            is_active: channel.standup.is_active,
            finish_at: channel.standup.finish_at,
        })
    }
}

/// Fire-time body of a standup finalization task: joins the buffered lines
/// with newlines (no trailing separator), posts the result as one message
/// authored by the starter — even when nothing was contributed — and
/// resets the standup to inert. The consolidated message is not scanned
/// for mentions.
pub(crate) fn apply_finalize(snapshot: &mut Snapshot, channel_id: i64, fire_at: i64) -> bool {
    let Some(channel) = snapshot.channel(channel_id) else {
        return false;
    };
    let starter_id = channel.standup.starter_id;
    let joined = channel
        .standup
        .handles
        .iter()
        .zip(&channel.standup.lines)
        .map(|(handle, line)| format!("{}: {}", handle, line))
        .collect::<Vec<_>>()
        .join("\n");

    let message_id = snapshot.next_message_id;
    snapshot.next_message_id += 1;
    if let Some(channel) = snapshot.channel_mut(channel_id) {
        channel.standup = Standup::inert();
        ledger::append(
            &mut channel.messages,
            Message::new(message_id, starter_id, &joined, fire_at),
        );
    }
    true
}
