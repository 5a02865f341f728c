//! Message operations: immediate sends, edits, shares, reactions, pins,
//! and the two send-later paths that hand work to the scheduler.

use huddle_types::error::{ApiError, ApiResult};
use huddle_types::models::{ContainerKind, Message, REACT_ID, Reaction, Snapshot};

use crate::channels::require_channel_member;
use crate::dm::require_dm_member;
use crate::scheduler::Effect;
use crate::{App, ledger, notify, require_user};

pub const MAX_MESSAGE_LEN: usize = 1000;

fn check_send_text(text: &str) -> ApiResult<()> {
    let len = text.chars().count();
    if len < 1 || len > MAX_MESSAGE_LEN {
        return Err(ApiError::InvalidArgument(
            "message must be between 1 and 1000 characters",
        ));
    }
    Ok(())
}

/// A message found by id inside one of the requester's joined containers.
struct Located {
    kind: ContainerKind,
    container_id: i64,
    index: usize,
    sender_id: i64,
}

/// Messages are only addressable through containers the requester has
/// joined; joined channels are searched before joined DMs.
fn locate_message(snapshot: &Snapshot, who: i64, message_id: i64) -> Option<Located> {
    let user = snapshot.user(who)?;
    for &channel_id in &user.channel_ids {
        if let Some(channel) = snapshot.channel(channel_id) {
            if let Some(index) = channel
                .messages
                .iter()
                .position(|m| m.message_id == message_id)
            {
                return Some(Located {
                    kind: ContainerKind::Channel,
                    container_id: channel_id,
                    index,
                    sender_id: channel.messages[index].sender_id,
                });
            }
        }
    }
    for &dm_id in &user.dm_ids {
        if let Some(dm) = snapshot.dm(dm_id) {
            if let Some(index) = dm.messages.iter().position(|m| m.message_id == message_id) {
                return Some(Located {
                    kind: ContainerKind::Dm,
                    container_id: dm_id,
                    index,
                    sender_id: dm.messages[index].sender_id,
                });
            }
        }
    }
    None
}

fn is_member(snapshot: &Snapshot, kind: ContainerKind, container_id: i64, user_id: i64) -> bool {
    match kind {
        ContainerKind::Channel => snapshot
            .channel(container_id)
            .is_some_and(|c| c.member_ids.contains(&user_id)),
        ContainerKind::Dm => snapshot
            .dm(container_id)
            .is_some_and(|d| d.member_ids.contains(&user_id)),
    }
}

/// Channel owners and the DM creator hold manage rights over container
/// messages.
fn is_owner(snapshot: &Snapshot, kind: ContainerKind, container_id: i64, user_id: i64) -> bool {
    match kind {
        ContainerKind::Channel => snapshot
            .channel(container_id)
            .is_some_and(|c| c.owner_ids.contains(&user_id)),
        ContainerKind::Dm => snapshot
            .dm(container_id)
            .is_some_and(|d| d.creator_id == user_id),
    }
}

fn messages_mut(
    snapshot: &mut Snapshot,
    kind: ContainerKind,
    container_id: i64,
) -> Option<&mut Vec<Message>> {
    match kind {
        ContainerKind::Channel => snapshot.channel_mut(container_id).map(|c| &mut c.messages),
        ContainerKind::Dm => snapshot.dm_mut(container_id).map(|d| &mut d.messages),
    }
}

impl App {
    /// Appends to the channel ledger and fans out mention notifications.
    pub fn message_send(&self, who: i64, channel_id: i64, text: &str) -> ApiResult<i64> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_channel_member(&snapshot, channel_id, who)?;
        check_send_text(text)?;

        let message_id = snapshot.next_message_id;
        snapshot.next_message_id += 1;
        let now = self.now();
        if let Some(channel) = snapshot.channel_mut(channel_id) {
            ledger::append(&mut channel.messages, Message::new(message_id, who, text, now));
        }
        notify::notify_tagged(&mut snapshot, who, ContainerKind::Channel, channel_id, text);

        self.commit(snapshot)?;
        Ok(message_id)
    }

    pub fn message_senddm(&self, who: i64, dm_id: i64, text: &str) -> ApiResult<i64> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_dm_member(&snapshot, dm_id, who)?;
        check_send_text(text)?;

        let message_id = snapshot.next_message_id;
        snapshot.next_message_id += 1;
        let now = self.now();
        if let Some(dm) = snapshot.dm_mut(dm_id) {
            ledger::append(&mut dm.messages, Message::new(message_id, who, text, now));
        }
        notify::notify_tagged(&mut snapshot, who, ContainerKind::Dm, dm_id, text);

        self.commit(snapshot)?;
        Ok(message_id)
    }

    /// Replaces a message's text; an empty replacement deletes instead.
    /// The mention scan runs against the new text only.
    pub fn message_edit(&self, who: i64, message_id: i64, text: &str) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;

        let located = locate_message(&snapshot, who, message_id).ok_or(ApiError::NotFound(
            "message not found in any joined channel or dm",
        ))?;
        if located.sender_id != who
            && !is_owner(&snapshot, located.kind, located.container_id, who)
        {
            return Err(ApiError::Forbidden("not the sender or a container owner"));
        }
        if text.chars().count() > MAX_MESSAGE_LEN {
            return Err(ApiError::InvalidArgument(
                "message is longer than 1000 characters",
            ));
        }

        if let Some(messages) = messages_mut(&mut snapshot, located.kind, located.container_id) {
            if text.is_empty() {
                messages.remove(located.index);
            } else {
                messages[located.index].text = text.to_string();
            }
        }
        if !text.is_empty() {
            notify::notify_tagged(&mut snapshot, who, located.kind, located.container_id, text);
        }
        self.commit(snapshot)
    }

    /// Deletes one message by id. Surviving messages keep their ids.
    pub fn message_remove(&self, who: i64, message_id: i64) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;

        let located = locate_message(&snapshot, who, message_id).ok_or(ApiError::NotFound(
            "message not found in any joined channel or dm",
        ))?;
        if located.sender_id != who
            && !is_owner(&snapshot, located.kind, located.container_id, who)
        {
            return Err(ApiError::Forbidden("not the sender or a container owner"));
        }

        if let Some(messages) = messages_mut(&mut snapshot, located.kind, located.container_id) {
            ledger::remove(messages, message_id);
        }
        self.commit(snapshot)
    }

    /// Posts a copy of an existing message into another joined container,
    /// optionally with extra text appended. The copy has no link back to
    /// the original; the mention scan runs against the optional text only.
    pub fn message_share(
        &self,
        who: i64,
        og_message_id: i64,
        text: &str,
        kind: ContainerKind,
        container_id: i64,
    ) -> ApiResult<i64> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;

        match kind {
            ContainerKind::Channel => require_channel_member(&snapshot, container_id, who)?,
            ContainerKind::Dm => require_dm_member(&snapshot, container_id, who)?,
        }
        let located = locate_message(&snapshot, who, og_message_id).ok_or(ApiError::NotFound(
            "message not found in any joined channel or dm",
        ))?;
        if text.chars().count() > MAX_MESSAGE_LEN {
            return Err(ApiError::InvalidArgument(
                "message is longer than 1000 characters",
            ));
        }

        let og_text = match messages_mut(&mut snapshot, located.kind, located.container_id) {
            Some(messages) => messages[located.index].text.clone(),
            None => String::new(),
        };
        let new_text = if text.is_empty() {
            og_text
        } else {
            format!("{} {}", og_text, text)
        };

        let message_id = snapshot.next_message_id;
        snapshot.next_message_id += 1;
        let now = self.now();
        if let Some(messages) = messages_mut(&mut snapshot, kind, container_id) {
            ledger::append(messages, Message::new(message_id, who, &new_text, now));
        }
        notify::notify_tagged(&mut snapshot, who, kind, container_id, text);

        self.commit(snapshot)?;
        Ok(message_id)
    }

    /// Adds the requester's react. The original sender is notified only if
    /// they are still a member of the container.
    pub fn message_react(&self, who: i64, message_id: i64, react_id: i64) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;

        let located = locate_message(&snapshot, who, message_id).ok_or(ApiError::NotFound(
            "message not found in any joined channel or dm",
        ))?;
        if react_id != REACT_ID {
            return Err(ApiError::InvalidArgument("invalid react id"));
        }

        if let Some(messages) = messages_mut(&mut snapshot, located.kind, located.container_id) {
            let message = &mut messages[located.index];
            if message.reactions.iter().all(|r| r.react_id != react_id) {
                message.reactions.push(Reaction::empty());
            }
            let react = message
                .reactions
                .iter_mut()
                .find(|r| r.react_id == react_id)
                .ok_or(ApiError::InvalidArgument("invalid react id"))?;
            if react.user_ids.contains(&who) {
                return Err(ApiError::InvalidArgument(
                    "already reacted to this message",
                ));
            }
            react.user_ids.push(who);
        }

        if is_member(&snapshot, located.kind, located.container_id, located.sender_id) {
            notify::notify_reacted(
                &mut snapshot,
                who,
                located.kind,
                located.container_id,
                located.sender_id,
            );
        }
        self.commit(snapshot)
    }

    pub fn message_unreact(&self, who: i64, message_id: i64, react_id: i64) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;

        let located = locate_message(&snapshot, who, message_id).ok_or(ApiError::NotFound(
            "message not found in any joined channel or dm",
        ))?;
        if react_id != REACT_ID {
            return Err(ApiError::InvalidArgument("invalid react id"));
        }

        if let Some(messages) = messages_mut(&mut snapshot, located.kind, located.container_id) {
            let react = messages[located.index]
                .reactions
                .iter_mut()
                .find(|r| r.react_id == react_id)
                .ok_or(ApiError::InvalidArgument("invalid react id"))?;
            if !react.user_ids.contains(&who) {
                return Err(ApiError::InvalidArgument(
                    "no react from this user to remove",
                ));
            }
            react.user_ids.retain(|&id| id != who);
        }
        self.commit(snapshot)
    }

    pub fn message_pin(&self, who: i64, message_id: i64) -> ApiResult<()> {
        self.set_pinned(who, message_id, true)
    }

    pub fn message_unpin(&self, who: i64, message_id: i64) -> ApiResult<()> {
        self.set_pinned(who, message_id, false)
    }

    fn set_pinned(&self, who: i64, message_id: i64, pinned: bool) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;

        let located = locate_message(&snapshot, who, message_id).ok_or(ApiError::NotFound(
            "message not found in any joined channel or dm",
        ))?;
        if !is_owner(&snapshot, located.kind, located.container_id, who) {
            return Err(ApiError::Forbidden("not a container owner"));
        }

        if let Some(messages) = messages_mut(&mut snapshot, located.kind, located.container_id) {
            let message = &mut messages[located.index];
            if message.is_pinned == pinned {
                return Err(ApiError::InvalidArgument(if pinned {
                    "message is already pinned"
                } else {
                    "message is not pinned"
                }));
            }
            message.is_pinned = pinned;
        }
        self.commit(snapshot)
    }

    /// All messages containing `query` (case-insensitive) across every
    /// channel and DM the requester has joined, channels first, in ledger
    /// order within each container. No defined order overall; each match
    /// carries the viewer-reaction projection.
    pub fn message_search(&self, who: i64, query: &str) -> ApiResult<Vec<Message>> {
        let snapshot = self.store().load();
        require_user(&snapshot, who)?;

        let len = query.chars().count();
        if len < 1 || len > MAX_MESSAGE_LEN {
            return Err(ApiError::InvalidArgument(
                "query must be between 1 and 1000 characters",
            ));
        }

        let Some(user) = snapshot.user(who) else {
            return Err(ApiError::Unauthenticated("unknown user id"));
        };
        let needle = query.to_lowercase();
        let mut matches = Vec::new();

        let channel_ledgers = user
            .channel_ids
            .iter()
            .filter_map(|&id| snapshot.channel(id).map(|c| &c.messages));
        let dm_ledgers = user
            .dm_ids
            .iter()
            .filter_map(|&id| snapshot.dm(id).map(|d| &d.messages));
        for messages in channel_ledgers.chain(dm_ledgers) {
            for message in messages {
                if message.text.to_lowercase().contains(&needle) {
                    matches.push(ledger::project_for_viewer(message, who));
                }
            }
        }
        Ok(matches)
    }

    /// Schedules a channel message for `fire_at`. The message id is
    /// allocated (and the counter persisted) now; the message itself only
    /// exists once the task fires. There is no way to retract it.
    pub fn message_sendlater(
        &self,
        who: i64,
        channel_id: i64,
        text: &str,
        fire_at: i64,
    ) -> ApiResult<i64> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_channel_member(&snapshot, channel_id, who)?;
        check_send_text(text)?;
        if fire_at < self.now() {
            return Err(ApiError::InvalidArgument("fire time is in the past"));
        }

        let message_id = snapshot.next_message_id;
        snapshot.next_message_id += 1;
        self.scheduler().schedule(
            fire_at,
            Effect::ChannelMessage {
                channel_id,
                message_id,
                author_id: who,
                text: text.to_string(),
            },
        );
        self.commit(snapshot)?;
        Ok(message_id)
    }

    /// DM variant of send-later. If the DM is removed before the task
    /// fires, the task observes the deletion sentinel and is skipped.
    pub fn message_sendlater_dm(
        &self,
        who: i64,
        dm_id: i64,
        text: &str,
        fire_at: i64,
    ) -> ApiResult<i64> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_dm_member(&snapshot, dm_id, who)?;
        check_send_text(text)?;
        if fire_at < self.now() {
            return Err(ApiError::InvalidArgument("fire time is in the past"));
        }

        let message_id = snapshot.next_message_id;
        snapshot.next_message_id += 1;
        self.scheduler().schedule(
            fire_at,
            Effect::DmMessage {
                dm_id,
                message_id,
                author_id: who,
                text: text.to_string(),
            },
        );
        self.commit(snapshot)?;
        Ok(message_id)
    }
}

/// Fire-time body of a channel send-later task, run against the snapshot
/// of that moment. Channels are not removable, so the only unresolvable
/// target would be a reset store; that case is skipped like the DM one.
pub(crate) fn apply_send_later_channel(
    snapshot: &mut Snapshot,
    channel_id: i64,
    message_id: i64,
    author_id: i64,
    text: &str,
    fire_at: i64,
) -> bool {
    let Some(channel) = snapshot.channel_mut(channel_id) else {
        return false;
    };
    ledger::append(
        &mut channel.messages,
        Message::new(message_id, author_id, text, fire_at),
    );
    notify::notify_tagged(snapshot, author_id, ContainerKind::Channel, channel_id, text);
    true
}

/// Fire-time body of a DM send-later task. Returns false — task skipped —
/// when the DM was removed between scheduling and firing.
pub(crate) fn apply_send_later_dm(
    snapshot: &mut Snapshot,
    dm_id: i64,
    message_id: i64,
    author_id: i64,
    text: &str,
    fire_at: i64,
) -> bool {
    let Some(dm) = snapshot.dm_mut(dm_id) else {
        return false;
    };
    ledger::append(
        &mut dm.messages,
        Message::new(message_id, author_id, text, fire_at),
    );
    notify::notify_tagged(snapshot, author_id, ContainerKind::Dm, dm_id, text);
    true
}
