//! Deferred-task scheduler.
//!
//! Tasks live in an in-memory queue keyed by the injected clock; they are
//! not persisted, so a restart drops them. Each task re-resolves its target
//! by id at fire time — the snapshot may have been replaced any number of
//! times since scheduling — reloads the store, applies its mutation, and
//! persists. There is no cancellation API and no retry: once the scheduling
//! request has returned, a fire-time failure is logged and swallowed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use huddle_store::Store;

use crate::clock::Clock;
use crate::{message, standup};

/// The mutation a task applies when it fires. Send-later effects carry the
/// message id allocated at scheduling time; standup finalization allocates
/// its id at fire time.
#[derive(Debug, Clone)]
pub enum Effect {
    ChannelMessage {
        channel_id: i64,
        message_id: i64,
        author_id: i64,
        text: String,
    },
    DmMessage {
        dm_id: i64,
        message_id: i64,
        author_id: i64,
        text: String,
    },
    StandupFinalize {
        channel_id: i64,
    },
}

struct Task {
    fire_at: i64,
    seq: u64,
    effect: Effect,
}

pub struct Scheduler {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    queue: Mutex<Vec<Task>>,
    next_seq: AtomicU64,
}

impl Scheduler {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            queue: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Enqueues an effect to run once `fire_at` has passed. Validation
    /// happened at the call site; nothing is re-checked here.
    pub fn schedule(&self, fire_at: i64, effect: Effect) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.lock();
        queue.push(Task {
            fire_at,
            seq,
            effect,
        });
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Drains and applies every task whose fire time has passed, in
    /// (fire_at, scheduling order). Returns the number of tasks fired —
    /// applied or skipped.
    pub fn run_due(&self) -> usize {
        let now = self.clock.now();
        let mut due: Vec<Task> = {
            let mut queue = self.lock();
            let mut due = Vec::new();
            let mut i = 0;
            while i < queue.len() {
                if queue[i].fire_at <= now {
                    due.push(queue.remove(i));
                } else {
                    i += 1;
                }
            }
            due
        };
        due.sort_by_key(|t| (t.fire_at, t.seq));

        let fired = due.len();
        for task in due {
            self.apply(task);
        }
        fired
    }

    fn apply(&self, task: Task) {
        let mut snapshot = self.store.load();
        let applied = match task.effect {
            Effect::ChannelMessage {
                channel_id,
                message_id,
                author_id,
                ref text,
            } => message::apply_send_later_channel(
                &mut snapshot,
                channel_id,
                message_id,
                author_id,
                text,
                task.fire_at,
            ),
            Effect::DmMessage {
                dm_id,
                message_id,
                author_id,
                ref text,
            } => message::apply_send_later_dm(
                &mut snapshot,
                dm_id,
                message_id,
                author_id,
                text,
                task.fire_at,
            ),
            Effect::StandupFinalize { channel_id } => {
                standup::apply_finalize(&mut snapshot, channel_id, task.fire_at)
            }
        };

        if !applied {
            // DM deleted before the task fired, or a target that no longer
            // resolves. Skipped, never surfaced to anyone.
            debug!(fire_at = task.fire_at, "deferred task skipped");
            return;
        }
        if let Err(e) = self.store.persist(snapshot) {
            warn!("deferred task persist failed: {}", e);
        }
    }

    /// Production driver: ticks on an interval and fires whatever has come
    /// due. The loop never exits on its own.
    pub async fn run_loop(self: Arc<Self>, tick: Duration) {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            let fired = self.run_due();
            if fired > 0 {
                debug!("fired {} deferred task(s)", fired);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Task>> {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
