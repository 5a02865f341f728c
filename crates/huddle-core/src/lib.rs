//! Workspace messaging core: message ledger and pagination, mention
//! fan-out, standup aggregation, and the deferred-task scheduler, all
//! operating over the single shared snapshot owned by `huddle-store`.
//!
//! The public surface is [`App`]: a cheap-to-clone handle bundling the
//! store, the scheduler, and the clock. Operations are `impl App` blocks
//! spread across the modules below, one module per concern.

pub mod channels;
pub mod clock;
pub mod dm;
pub mod ledger;
pub mod message;
pub mod notify;
pub mod scheduler;
pub mod standup;
pub mod users;

use std::sync::Arc;

use huddle_store::Store;
use huddle_types::error::{ApiError, ApiResult};
use huddle_types::models::Snapshot;

use clock::{Clock, SystemClock};
use scheduler::Scheduler;

#[derive(Clone)]
pub struct App {
    store: Arc<Store>,
    scheduler: Arc<Scheduler>,
    clock: Arc<dyn Clock>,
}

impl App {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Builds an app around an injected clock so deferred effects can be
    /// advanced deterministically in tests.
    pub fn with_clock(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        let scheduler = Arc::new(Scheduler::new(store.clone(), clock.clone()));
        Self {
            store,
            scheduler,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    fn now(&self) -> i64 {
        self.clock.now()
    }

    fn commit(&self, snapshot: Snapshot) -> ApiResult<()> {
        self.store
            .persist(snapshot)
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}

/// Backstop check that the acting user id resolves to a registered user.
/// Session-token validation proper is the request layer's job.
pub(crate) fn require_user(snapshot: &Snapshot, user_id: i64) -> ApiResult<()> {
    if snapshot.user(user_id).is_none() {
        return Err(ApiError::Unauthenticated("unknown user id"));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::clock::ManualClock;

    /// App over an in-memory store and a manual clock starting at t=1000.
    pub fn test_app() -> (App, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1000));
        let app = App::with_clock(Arc::new(Store::in_memory()), clock.clone());
        (app, clock)
    }

    /// Registers a user whose email is derived from the handle.
    pub fn register(app: &App, handle: &str) -> i64 {
        app.register(&format!("{handle}@example.com"), handle)
            .unwrap()
    }
}
