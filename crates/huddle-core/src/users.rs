//! User registration and the secondary indexes over the user table.
//!
//! Handle/email format rules live in the request layer; the core only
//! enforces uniqueness, because the handle index is what mention parsing
//! and DM naming resolve against.

use huddle_types::error::{ApiError, ApiResult};
use huddle_types::models::User;

use crate::{App, require_user};

impl App {
    /// Registers a user and indexes their handle and email. Ids are dense
    /// indexes into the user table and are never reused.
    pub fn register(&self, email: &str, handle: &str) -> ApiResult<i64> {
        let mut snapshot = self.store().load();

        if snapshot.email_index.contains_key(email) {
            return Err(ApiError::InvalidArgument("email is already in use"));
        }
        if snapshot.handle_index.contains_key(handle) {
            return Err(ApiError::InvalidArgument("handle is already in use"));
        }

        let id = snapshot.users.len() as i64;
        snapshot.users.push(User {
            id,
            email: email.to_string(),
            handle: handle.to_string(),
            channel_ids: Vec::new(),
            dm_ids: Vec::new(),
            notifications: Vec::new(),
        });
        snapshot.handle_index.insert(handle.to_string(), id);
        snapshot.email_index.insert(email.to_string(), id);

        self.commit(snapshot)?;
        Ok(id)
    }

    /// Renames a user's handle, invalidating the old index entry. Standup
    /// lines already buffered and DM names keep the handle they captured.
    pub fn set_handle(&self, user_id: i64, new_handle: &str) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, user_id)?;

        if let Some(&owner) = snapshot.handle_index.get(new_handle) {
            if owner != user_id {
                return Err(ApiError::InvalidArgument("handle is already in use"));
            }
            return self.commit(snapshot);
        }

        let Some(user) = snapshot.user_mut(user_id) else {
            return Err(ApiError::Unauthenticated("unknown user id"));
        };
        let old_handle = std::mem::replace(&mut user.handle, new_handle.to_string());
        snapshot.handle_index.remove(&old_handle);
        snapshot.handle_index.insert(new_handle.to_string(), user_id);

        self.commit(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{register, test_app};

    #[test]
    fn test_register_assigns_dense_ids_and_indexes() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        assert_eq!(alice, 0);
        assert_eq!(bob, 1);

        let snapshot = app.store().load();
        assert_eq!(snapshot.user_by_handle("bob"), Some(bob));
        assert_eq!(snapshot.user_by_email("alice@example.com"), Some(alice));
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let (app, _) = test_app();
        register(&app, "alice");
        assert_eq!(
            app.register("other@example.com", "alice"),
            Err(ApiError::InvalidArgument("handle is already in use"))
        );
        assert_eq!(
            app.register("alice@example.com", "other"),
            Err(ApiError::InvalidArgument("email is already in use"))
        );
    }

    #[test]
    fn test_set_handle_rebuilds_index_and_mentions_follow() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let channel = app.channels_create(alice, "general", true).unwrap();
        app.channel_join(bob, channel).unwrap();

        app.set_handle(bob, "robert").unwrap();

        let snapshot = app.store().load();
        assert_eq!(snapshot.user_by_handle("robert"), Some(bob));
        assert_eq!(snapshot.user_by_handle("bob"), None);

        // Mentions resolve against the renamed handle only.
        app.message_send(alice, channel, "hi @bob").unwrap();
        assert!(app.notifications(bob).unwrap().is_empty());
        app.message_send(alice, channel, "hi @robert").unwrap();
        assert_eq!(app.notifications(bob).unwrap().len(), 1);
    }

    #[test]
    fn test_set_handle_collision_rejected() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        register(&app, "bob");
        assert_eq!(
            app.set_handle(alice, "bob"),
            Err(ApiError::InvalidArgument("handle is already in use"))
        );
        // Renaming to your own current handle is a no-op, not an error.
        assert_eq!(app.set_handle(alice, "alice"), Ok(()));
    }
}
