//! Shared state store.
//!
//! One `Snapshot` is the only shared mutable resource in the system. Every
//! operation — deferred ones included — runs `load()`, mutates its private
//! copy, and hands the whole thing back to `persist()`. There is no
//! transaction or isolation mechanism: two operations racing between their
//! `load()` and `persist()` calls clobber each other, last writer wins.
//! That is tolerated by design for an event-loop execution model where only
//! suspending operations can interleave; the `revision()` counter exists so
//! tests can observe when it happens.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tracing::info;

use huddle_types::models::Snapshot;

pub struct Store {
    path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

struct Inner {
    snapshot: Snapshot,
    revision: u64,
}

impl Store {
    /// Opens a file-backed store, reading an existing snapshot document if
    /// one is present at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let snapshot = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading snapshot at {}", path.display()))?;
            let mut snapshot: Snapshot = serde_json::from_str(&raw)
                .with_context(|| format!("parsing snapshot at {}", path.display()))?;
            // Older documents predate the secondary indexes; they
            // deserialize empty and are rebuilt from the user table.
            snapshot.rebuild_indexes();
            snapshot
        } else {
            Snapshot::default()
        };

        info!("Store opened at {}", path.display());
        Ok(Self {
            path: Some(path.to_path_buf()),
            inner: Mutex::new(Inner {
                snapshot,
                revision: 0,
            }),
        })
    }

    /// A store with no backing file. Persist still replaces the in-memory
    /// snapshot and bumps the revision; used by tests.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(Inner {
                snapshot: Snapshot::default(),
                revision: 0,
            }),
        }
    }

    /// Returns a copy of the latest persisted snapshot.
    pub fn load(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    /// Replaces the snapshot wholesale. The sole durability point: when
    /// file-backed, the full document is rewritten on every call.
    pub fn persist(&self, snapshot: Snapshot) -> Result<()> {
        if let Some(path) = &self.path {
            let doc = serde_json::to_string_pretty(&snapshot)?;
            std::fs::write(path, doc)
                .with_context(|| format!("writing snapshot at {}", path.display()))?;
        }
        let mut inner = self.lock();
        inner.snapshot = snapshot;
        inner.revision += 1;
        Ok(())
    }

    /// Number of persists since open. Lets tests detect a lost update: an
    /// operation that loaded at revision N and persisted over revision N+1
    /// silently discarded someone else's write.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// Reinstalls the empty snapshot.
    pub fn reset(&self) -> Result<()> {
        self.persist(Snapshot::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_types::models::{Channel, Standup};

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("huddle-store-{}-{}.json", std::process::id(), tag))
    }

    fn snapshot_with_channel(name: &str) -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.channels.push(Channel {
            id: 0,
            name: name.to_string(),
            is_public: true,
            owner_ids: vec![0],
            member_ids: vec![0],
            messages: Vec::new(),
            standup: Standup::inert(),
        });
        snapshot
    }

    #[test]
    fn test_revision_counts_persists() {
        let store = Store::in_memory();
        assert_eq!(store.revision(), 0);
        store.persist(store.load()).unwrap();
        store.persist(store.load()).unwrap();
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn test_file_roundtrip() {
        let path = temp_path("roundtrip");
        let _ = std::fs::remove_file(&path);

        let store = Store::open(&path).unwrap();
        store.persist(snapshot_with_channel("general")).unwrap();
        drop(store);

        let reopened = Store::open(&path).unwrap();
        let snapshot = reopened.load();
        assert_eq!(snapshot.channels.len(), 1);
        assert_eq!(snapshot.channels[0].name, "general");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_last_writer_wins_is_observable() {
        let store = Store::in_memory();

        // Two "operations" load the same base revision.
        let base = store.revision();
        let first = snapshot_with_channel("first");
        let second = snapshot_with_channel("second");

        store.persist(first).unwrap();
        store.persist(second).unwrap();

        // The second persist overwrote the first wholesale; the revision
        // gap is how a test detects the lost update.
        assert_eq!(store.revision(), base + 2);
        assert_eq!(store.load().channels[0].name, "second");
    }

    #[test]
    fn test_reset_reinstalls_empty_snapshot() {
        let store = Store::in_memory();
        store.persist(snapshot_with_channel("general")).unwrap();
        store.reset().unwrap();
        assert!(store.load().channels.is_empty());
        assert_eq!(store.load().next_message_id, 0);
    }
}
