//! Mention parsing and notification fan-out.
//!
//! `@handle` tokens are resolved against the container's current members,
//! not the full user directory, and each matched member is notified at most
//! once per triggering message.

use huddle_types::error::{ApiError, ApiResult};
use huddle_types::models::{ContainerKind, Notification, Snapshot};

use crate::App;

/// Notification texts quote at most this many characters of the message.
pub const SNIPPET_LEN: usize = 20;

/// Readers only ever see this many notifications, newest first.
pub const NOTIFICATIONS_PAGE: usize = 20;

/// Scans `text` left to right for `@` and takes the longest following run
/// of ASCII alphanumerics as the candidate handle. A candidate that matches
/// a member handle resolves to that user id and is removed from the pool,
/// so `"hi @bob @bob"` yields bob once. Longest-run matching means a handle
/// that is a prefix of another (`bob` vs `bobby`) only matches when the
/// full run is itself a member handle.
pub fn tagged_user_ids(snapshot: &Snapshot, member_ids: &[i64], text: &str) -> Vec<i64> {
    let mut pool = snapshot.handles(member_ids);
    let mut tagged = Vec::new();

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '@' {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < chars.len() && chars[j].is_ascii_alphanumeric() {
            j += 1;
        }
        let candidate: String = chars[i + 1..j].iter().collect();
        if let Some(pos) = pool.iter().position(|h| *h == candidate) {
            pool.remove(pos);
            if let Some(user_id) = snapshot.user_by_handle(&candidate) {
                tagged.push(user_id);
            }
        }
        i = j.max(i + 1);
    }
    tagged
}

/// First `SNIPPET_LEN` characters of the message.
pub fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_LEN).collect()
}

fn container_name(snapshot: &Snapshot, kind: ContainerKind, container_id: i64) -> Option<String> {
    match kind {
        ContainerKind::Channel => snapshot.channel(container_id).map(|c| c.name.clone()),
        ContainerKind::Dm => snapshot.dm(container_id).map(|d| d.name.clone()),
    }
}

fn push_notification(
    snapshot: &mut Snapshot,
    user_id: i64,
    kind: ContainerKind,
    container_id: i64,
    message: String,
) {
    if let Some(user) = snapshot.user_mut(user_id) {
        user.notifications.insert(
            0,
            Notification {
                kind,
                container_id,
                message,
            },
        );
    }
}

/// Runs the tag scan over `text` against the container's current membership
/// and prepends a "tagged you" notification to each distinct matched user.
pub fn notify_tagged(
    snapshot: &mut Snapshot,
    actor_id: i64,
    kind: ContainerKind,
    container_id: i64,
    text: &str,
) {
    let (name, member_ids) = match kind {
        ContainerKind::Channel => match snapshot.channel(container_id) {
            Some(c) => (c.name.clone(), c.member_ids.clone()),
            None => return,
        },
        ContainerKind::Dm => match snapshot.dm(container_id) {
            Some(d) => (d.name.clone(), d.member_ids.clone()),
            None => return,
        },
    };

    let tagged = tagged_user_ids(snapshot, &member_ids, text);
    if tagged.is_empty() {
        return;
    }
    let Some(actor_handle) = snapshot.user(actor_id).map(|u| u.handle.clone()) else {
        return;
    };

    let note = format!("{} tagged you in {}: {}", actor_handle, name, snippet(text));
    for user_id in tagged {
        push_notification(snapshot, user_id, kind, container_id, note.clone());
    }
}

/// "reacted to your message" notification. The caller has already checked
/// that the original sender is still a member of the container.
pub fn notify_reacted(
    snapshot: &mut Snapshot,
    actor_id: i64,
    kind: ContainerKind,
    container_id: i64,
    sender_id: i64,
) {
    let Some(name) = container_name(snapshot, kind, container_id) else {
        return;
    };
    let Some(actor_handle) = snapshot.user(actor_id).map(|u| u.handle.clone()) else {
        return;
    };
    let note = format!("{} reacted to your message in {}", actor_handle, name);
    push_notification(snapshot, sender_id, kind, container_id, note);
}

/// "added you to" notification for channel invites and DM creation.
pub fn notify_added(
    snapshot: &mut Snapshot,
    actor_id: i64,
    kind: ContainerKind,
    container_id: i64,
    target_id: i64,
) {
    let Some(name) = container_name(snapshot, kind, container_id) else {
        return;
    };
    let Some(actor_handle) = snapshot.user(actor_id).map(|u| u.handle.clone()) else {
        return;
    };
    let note = format!("{} added you to {}", actor_handle, name);
    push_notification(snapshot, target_id, kind, container_id, note);
}

impl App {
    /// The viewer's 20 most recent notifications, newest first. The stored
    /// list grows unbounded; only this view is bounded.
    pub fn notifications(&self, user_id: i64) -> ApiResult<Vec<Notification>> {
        let snapshot = self.store().load();
        let Some(user) = snapshot.user(user_id) else {
            return Err(ApiError::Unauthenticated("unknown user id"));
        };
        Ok(user
            .notifications
            .iter()
            .take(NOTIFICATIONS_PAGE)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{register, test_app};

    #[test]
    fn test_snippet_cuts_at_twenty_chars() {
        assert_eq!(snippet("short"), "short");
        let long = "abcdefghijklmnopqrstuvwxyz";
        assert_eq!(snippet(long), "abcdefghijklmnopqrst");
        assert_eq!(snippet(long).chars().count(), 20);
    }

    #[test]
    fn test_mention_idempotence() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let channel = app.channels_create(alice, "general", true).unwrap();
        app.channel_join(bob, channel).unwrap();

        app.message_send(alice, channel, "hi @bob @bob").unwrap();

        let notes = app.notifications(bob).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(
            notes[0].message,
            "alice tagged you in general: hi @bob @bob"
        );
    }

    #[test]
    fn test_mention_restricted_to_members() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let channel = app.channels_create(alice, "general", true).unwrap();

        // bob exists but is not a member, so the tag resolves to nobody.
        app.message_send(alice, channel, "hi @bob").unwrap();
        assert!(app.notifications(bob).unwrap().is_empty());
    }

    #[test]
    fn test_longest_run_prefix_handling() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let bobby = register(&app, "bobby");
        let channel = app.channels_create(alice, "general", true).unwrap();
        app.channel_join(bob, channel).unwrap();
        app.channel_join(bobby, channel).unwrap();

        // The run after '@' is "bobby", so only bobby is notified even
        // though "bob" is a member handle and a prefix of the run.
        app.message_send(alice, channel, "ping @bobby").unwrap();
        assert!(app.notifications(bob).unwrap().is_empty());
        assert_eq!(app.notifications(bobby).unwrap().len(), 1);
    }

    #[test]
    fn test_run_not_a_member_handle_matches_nobody() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let channel = app.channels_create(alice, "general", true).unwrap();
        app.channel_join(bob, channel).unwrap();

        // "@bobx" is one run; "bob" is never extracted from inside it.
        app.message_send(alice, channel, "ping @bobx").unwrap();
        assert!(app.notifications(bob).unwrap().is_empty());
    }

    #[test]
    fn test_mention_terminated_by_punctuation() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let channel = app.channels_create(alice, "general", true).unwrap();
        app.channel_join(bob, channel).unwrap();

        app.message_send(alice, channel, "thanks @bob!").unwrap();
        assert_eq!(app.notifications(bob).unwrap().len(), 1);
    }

    #[test]
    fn test_notifications_read_capped_at_twenty() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let channel = app.channels_create(alice, "c", true).unwrap();
        app.channel_join(bob, channel).unwrap();

        for i in 0..25 {
            app.message_send(alice, channel, &format!("{} @bob", i))
                .unwrap();
        }

        let notes = app.notifications(bob).unwrap();
        assert_eq!(notes.len(), NOTIFICATIONS_PAGE);
        // Newest first: the last send is at the head.
        assert_eq!(notes[0].message, "alice tagged you in c: 24 @bob");

        // The store keeps everything; only the read is bounded.
        let stored = app.store().load().user(bob).unwrap().notifications.len();
        assert_eq!(stored, 25);
    }
}
