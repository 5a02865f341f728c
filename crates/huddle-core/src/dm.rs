//! Direct-message groups: creation, removal via the deletion sentinel, and
//! the DM read path.

use huddle_types::api::PagedMessages;
use huddle_types::error::{ApiError, ApiResult};
use huddle_types::models::{ContainerKind, DM_DELETED, Dm, Snapshot};

use crate::{App, ledger, notify, require_user};

pub(crate) fn require_dm_member(snapshot: &Snapshot, dm_id: i64, user_id: i64) -> ApiResult<()> {
    let Some(dm) = snapshot.dm(dm_id) else {
        return Err(ApiError::NotFound("no such dm"));
    };
    if !dm.member_ids.contains(&user_id) {
        return Err(ApiError::Forbidden("not a member of the dm"));
    }
    Ok(())
}

impl App {
    /// Creates a DM between the creator and `member_ids`. The display name
    /// is the alphabetically sorted member handles joined with ", ", fixed
    /// at creation; everyone but the creator gets an "added you to"
    /// notification.
    pub fn dm_create(&self, who: i64, member_ids: &[i64]) -> ApiResult<i64> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;

        if member_ids.iter().any(|&id| snapshot.user(id).is_none()) {
            return Err(ApiError::InvalidArgument("a member id is not a valid user"));
        }
        let mut all_members = vec![who];
        all_members.extend_from_slice(member_ids);
        let mut deduped = all_members.clone();
        deduped.sort_unstable();
        deduped.dedup();
        if deduped.len() != all_members.len() {
            return Err(ApiError::InvalidArgument("duplicate member ids"));
        }

        let mut handles = snapshot.handles(&all_members);
        handles.sort_unstable();
        let name = handles.join(", ");

        let id = snapshot.dms.len() as i64;
        snapshot.dms.push(Dm {
            id,
            name,
            creator_id: who,
            member_ids: all_members.clone(),
            messages: Vec::new(),
        });

        for member in all_members {
            if let Some(user) = snapshot.user_mut(member) {
                user.dm_ids.push(id);
            }
            if member != who {
                notify::notify_added(&mut snapshot, who, ContainerKind::Dm, id, member);
            }
        }

        self.commit(snapshot)?;
        Ok(id)
    }

    /// Creator-only removal. The record is kept in place with its id and
    /// creator reset to the deletion sentinel so later DM ids keep their
    /// dense-index meaning; pending send-later tasks observe the sentinel
    /// and skip.
    pub fn dm_remove(&self, who: i64, dm_id: i64) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;

        let Some(dm) = snapshot.dm(dm_id) else {
            return Err(ApiError::NotFound("no such dm"));
        };
        if dm.creator_id != who {
            return Err(ApiError::Forbidden("not the dm creator"));
        }
        if !dm.member_ids.contains(&who) {
            return Err(ApiError::Forbidden("no longer a member of the dm"));
        }

        for user in &mut snapshot.users {
            user.dm_ids.retain(|&id| id != dm_id);
        }
        if let Some(dm) = snapshot.dm_mut(dm_id) {
            dm.id = DM_DELETED;
            dm.creator_id = DM_DELETED;
            dm.member_ids.clear();
            dm.messages.clear();
        }
        self.commit(snapshot)
    }

    /// Membership removal; the DM name keeps the leaver's handle.
    pub fn dm_leave(&self, who: i64, dm_id: i64) -> ApiResult<()> {
        let mut snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_dm_member(&snapshot, dm_id, who)?;

        if let Some(dm) = snapshot.dm_mut(dm_id) {
            dm.member_ids.retain(|&id| id != who);
        }
        if let Some(user) = snapshot.user_mut(who) {
            user.dm_ids.retain(|&id| id != dm_id);
        }
        self.commit(snapshot)
    }

    pub fn dm_messages(&self, who: i64, dm_id: i64, start: usize) -> ApiResult<PagedMessages> {
        let snapshot = self.store().load();
        require_user(&snapshot, who)?;
        require_dm_member(&snapshot, dm_id, who)?;
        let Some(dm) = snapshot.dm(dm_id) else {
            return Err(ApiError::NotFound("no such dm"));
        };
        ledger::page(&dm.messages, start, who)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{register, test_app};

    #[test]
    fn test_dm_name_sorted_handles() {
        let (app, _) = test_app();
        let zoe = register(&app, "zoe");
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");

        let dm = app.dm_create(zoe, &[alice, bob]).unwrap();
        let snapshot = app.store().load();
        assert_eq!(snapshot.dm(dm).unwrap().name, "alice, bob, zoe");
    }

    #[test]
    fn test_dm_create_notifies_everyone_but_creator() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");

        let dm = app.dm_create(alice, &[bob]).unwrap();

        assert!(app.notifications(alice).unwrap().is_empty());
        let notes = app.notifications(bob).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "alice added you to alice, bob");
        assert_eq!(notes[0].container_id, dm);
    }

    #[test]
    fn test_dm_create_rejects_duplicates_and_unknown_users() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");

        assert_eq!(
            app.dm_create(alice, &[bob, bob]),
            Err(ApiError::InvalidArgument("duplicate member ids"))
        );
        assert_eq!(
            app.dm_create(alice, &[alice]),
            Err(ApiError::InvalidArgument("duplicate member ids"))
        );
        assert_eq!(
            app.dm_create(alice, &[42]),
            Err(ApiError::InvalidArgument("a member id is not a valid user"))
        );
    }

    #[test]
    fn test_dm_remove_sentinel() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let dm = app.dm_create(alice, &[bob]).unwrap();

        assert_eq!(
            app.dm_remove(bob, dm),
            Err(ApiError::Forbidden("not the dm creator"))
        );
        app.dm_remove(alice, dm).unwrap();

        // The slot stays, the id is the sentinel, and the DM no longer
        // resolves.
        let snapshot = app.store().load();
        assert_eq!(snapshot.dms.len(), 1);
        assert_eq!(snapshot.dms[0].id, DM_DELETED);
        assert!(snapshot.dm(dm).is_none());

        assert_eq!(
            app.message_senddm(alice, dm, "hello"),
            Err(ApiError::NotFound("no such dm"))
        );
        assert!(app.store().load().user(bob).unwrap().dm_ids.is_empty());
    }

    #[test]
    fn test_dm_leave_keeps_name() {
        let (app, _) = test_app();
        let alice = register(&app, "alice");
        let bob = register(&app, "bob");
        let dm = app.dm_create(alice, &[bob]).unwrap();

        app.dm_leave(bob, dm).unwrap();
        let snapshot = app.store().load();
        assert_eq!(snapshot.dm(dm).unwrap().member_ids, vec![alice]);
        assert_eq!(snapshot.dm(dm).unwrap().name, "alice, bob");
        assert_eq!(
            app.dm_messages(bob, dm, 0),
            Err(ApiError::Forbidden("not a member of the dm"))
        );
    }
}
