//! Channel membership and the channel read path.

use huddle_types::api::PagedMessages;
use huddle_types::error::{ApiError, ApiResult};
use huddle_types::models::{Channel, ContainerKind, Snapshot, Standup};

use crate::{App, ledger, notify, require_user};

/// Existence then membership, in that order, per the error precedence rule.
pub(crate) fn require_channel_member(
    snapshot: &Snapshot,
    channel_id: i64,
    user_id: i64,
) -> ApiResult<()> {
    let Some(channel) = snapshot.channel(channel_id) else {
        return Err(ApiError::NotFound("no such channel"));
    };
    if !channel.member_ids.contains(&user_id) {
        return Err(ApiError::Forbidden("not a member of the channel"));
    }
    Ok(())
}

impl App {
    /// Creates a channel with the creator as sole owner and member. The
    /// standup sub-entity is created inert.
    pub fn channels_create(&self, who: i64, name: &str, is_public: bool) -> ApiResult<i64> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;

        let id = snapshot.channels.len() as i64;
        snapshot.channels.push(Channel {
            id,
            name: name.to_string(),
            is_public,
            owner_ids: vec![who],
            member_ids: vec![who],
            messages: Vec::new(),
            standup: Standup::inert(),
        });
        if let Some(user) = snapshot.user_mut(who) {
            user.channel_ids.push(id);
        }

        self.commit(snapshot)?;
        Ok(id)
    }

    pub fn channel_join(&self, who: i64, channel_id: i64) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;

        let Some(channel) = snapshot.channel(channel_id) else {
            return Err(ApiError::NotFound("no such channel"));
        };
        if channel.member_ids.contains(&who) {
            return Err(ApiError::InvalidArgument("already a member of the channel"));
        }
        if !channel.is_public {
            return Err(ApiError::Forbidden("the channel is private"));
        }

        if let Some(channel) = snapshot.channel_mut(channel_id) {
            channel.member_ids.push(who);
        }
        if let Some(user) = snapshot.user_mut(who) {
            user.channel_ids.push(channel_id);
        }
        self.commit(snapshot)
    }

    /// Adds `target` directly, bypassing the public/private gate, and
    /// notifies them.
    pub fn channel_invite(&self, who: i64, channel_id: i64, target: i64) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_channel_member(&snapshot, channel_id, who)?;

        if snapshot.user(target).is_none() {
            return Err(ApiError::NotFound("no such user"));
        }
        let Some(channel) = snapshot.channel(channel_id) else {
            return Err(ApiError::NotFound("no such channel"));
        };
        if channel.member_ids.contains(&target) {
            return Err(ApiError::InvalidArgument("already a member of the channel"));
        }

        if let Some(channel) = snapshot.channel_mut(channel_id) {
            channel.member_ids.push(target);
        }
        if let Some(user) = snapshot.user_mut(target) {
            user.channel_ids.push(channel_id);
        }
        notify::notify_added(&mut snapshot, who, ContainerKind::Channel, channel_id, target);
        self.commit(snapshot)
    }

    /// Removes `who` from members (and owners, if present). The starter of
    /// an active standup is pinned in place until it finalizes.
    pub fn channel_leave(&self, who: i64, channel_id: i64) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_channel_member(&snapshot, channel_id, who)?;

        let Some(channel) = snapshot.channel(channel_id) else {
            return Err(ApiError::NotFound("no such channel"));
        };
        if channel.standup.is_active && channel.standup.starter_id == who {
            return Err(ApiError::InvalidArgument(
                "the starter of an active standup cannot leave",
            ));
        }

        if let Some(channel) = snapshot.channel_mut(channel_id) {
            channel.member_ids.retain(|&id| id != who);
            channel.owner_ids.retain(|&id| id != who);
        }
        if let Some(user) = snapshot.user_mut(who) {
            user.channel_ids.retain(|&id| id != channel_id);
        }
        self.commit(snapshot)
    }

    /// Windowed read over the channel's ledger; see `ledger::page`.
    pub fn channel_messages(
        &self,
        who: i64,
        channel_id: i64,
        start: usize,
    ) -> ApiResult<PagedMessages> {
        let snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_channel_member(&snapshot, channel_id, who)?;
        let Some(channel) = snapshot.channel(channel_id) else {
            return Err(ApiError::NotFound("no such channel"));
        };
        ledger::page(&channel.messages, start, who)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{register, test_app};

    #[test]
    fn test_join_private_channel_forbidden() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let channel = app.channels_create(alice, "secret", false).unwrap();

        assert_eq!(
            app.channel_join(bob, channel),
            Err(ApiError::Forbidden("the channel is private"))
        );
    }

    #[test]
    fn test_double_join_invalid() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let channel = app.channels_create(alice, "general", true).unwrap();
        assert_eq!(
            app.channel_join(alice, channel),
            Err(ApiError::InvalidArgument("already a member of the channel"))
        );
    }

    #[test]
    fn test_invite_notifies_target() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let channel = app.channels_create(alice, "secret", false).unwrap();

        app.channel_invite(alice, channel, bob).unwrap();

        let notes = app.notifications(bob).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "alice added you to secret");
        assert_eq!(notes[0].kind, ContainerKind::Channel);
        assert_eq!(notes[0].container_id, channel);
    }

    #[test]
    fn test_messages_checks_existence_before_membership() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        assert_eq!(
            app.channel_messages(alice, 9, 0),
            Err(ApiError::NotFound("no such channel"))
        );
        assert_eq!(
            app.channel_messages(99, 9, 0),
            Err(ApiError::Unauthenticated("unknown user id"))
        );
    }

    #[test]
    fn test_standup_starter_cannot_leave() {
        let (app, clock) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let channel = app.channels_create(alice, "general", true).unwrap();
        app.channel_join(bob, channel).unwrap();

        app.standup_start(alice, channel, 60).unwrap();
        assert_eq!(
            app.channel_leave(alice, channel),
            Err(ApiError::InvalidArgument(
                "the starter of an active standup cannot leave"
            ))
        );
        // Other members may leave freely.
        app.channel_leave(bob, channel).unwrap();

        // Once the standup finalizes, the starter can leave too.
        clock.advance(60);
        app.scheduler().run_due();
        app.channel_leave(alice, channel).unwrap();
    }
}
