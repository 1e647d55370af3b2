use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::MarkideaError;
use crate::types::deleted::DeletedNoteSnapshot;
use crate::types::sync::SyncConfig;

/// Store opened behind an exclusive `flock` on `<path>.lock`.
///
/// Only one process at a time may have the sled database open. The lock
/// goes away with this value.
pub struct LockedStore {
    store: MarkideaStore,
    _flock: File,
}

impl std::fmt::Debug for LockedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedStore").finish_non_exhaustive()
    }
}

impl LockedStore {
    pub fn inner(&self) -> &MarkideaStore {
        &self.store
    }
}

impl std::ops::Deref for LockedStore {
    type Target = MarkideaStore;

    fn deref(&self) -> &MarkideaStore {
        &self.store
    }
}

/// Durable side store: deleted-note snapshots (the recycle bin) and
/// per-user sync settings. Independent of the git repositories so that a
/// deleted note stays recoverable even if history is rewritten.
pub struct MarkideaStore {
    db: sled::Db,
    deleted_notes: sled::Tree,
    deleted_by_user: sled::Tree,
    sync_configs: sled::Tree,
}

impl MarkideaStore {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self, MarkideaError> {
        let db = sled::open(path)?;
        let deleted_notes = db.open_tree("deleted_notes")?;
        let deleted_by_user = db.open_tree("deleted_by_user")?;
        let sync_configs = db.open_tree("sync_configs")?;

        Ok(Self {
            db,
            deleted_notes,
            deleted_by_user,
            sync_configs,
        })
    }

    /// Open behind the lock file, failing with `DbBusy` right away when
    /// another process holds it.
    pub fn open_locked(path: &Path) -> Result<LockedStore, MarkideaError> {
        Self::open_with_lock(path, None)
    }

    /// Like [`open_locked`](Self::open_locked) but keeps retrying, with a
    /// doubling pause capped at 200 ms, until `timeout` has elapsed.
    pub fn open_locked_blocking(path: &Path, timeout: Duration) -> Result<LockedStore, MarkideaError> {
        Self::open_with_lock(path, Some(timeout))
    }

    fn open_with_lock(path: &Path, wait: Option<Duration>) -> Result<LockedStore, MarkideaError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let flock = File::create(path.with_extension("lock"))?;

        let deadline = wait.map(|w| Instant::now() + w);
        let mut pause = Duration::from_millis(10);
        while let Err(e) = flock.try_lock_exclusive() {
            match deadline {
                Some(deadline) if Instant::now() < deadline => {
                    std::thread::sleep(pause);
                    pause = (pause * 2).min(Duration::from_millis(200));
                }
                Some(_) => {
                    return Err(MarkideaError::DbBusy(format!(
                        "gave up waiting for {}: {}",
                        path.display(),
                        e
                    )))
                }
                None => {
                    return Err(MarkideaError::DbBusy(format!(
                        "{} is locked by another process: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        Ok(LockedStore {
            store: Self::open(path)?,
            _flock: flock,
        })
    }

    // --- Recycle bin ---

    /// Persist a deleted note and return it with its assigned id
    pub fn insert_deleted(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
        content: &str,
        last_ref: Option<String>,
    ) -> Result<DeletedNoteSnapshot, MarkideaError> {
        let id = self.db.generate_id()?;
        let snapshot = DeletedNoteSnapshot {
            id,
            username: username.to_string(),
            notebook: notebook.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            last_ref,
            deleted_at_ms: now_ms(),
        };

        self.deleted_notes.insert(deleted_key(id), serde_json::to_vec(&snapshot)?)?;
        self.deleted_by_user.insert(user_deleted_key(username, id), &[])?;
        Ok(snapshot)
    }

    /// Look up a snapshot owned by `username`
    pub fn get_deleted(&self, id: u64, username: &str) -> Result<Option<DeletedNoteSnapshot>, MarkideaError> {
        match self.deleted_notes.get(deleted_key(id))? {
            Some(bytes) => {
                let snapshot: DeletedNoteSnapshot = serde_json::from_slice(&bytes)?;
                if snapshot.username == username {
                    Ok(Some(snapshot))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// All snapshots of a user, newest deletion first
    pub fn list_deleted(&self, username: &str) -> Result<Vec<DeletedNoteSnapshot>, MarkideaError> {
        let prefix = user_deleted_prefix(username);
        let mut snapshots = Vec::new();

        for result in self.deleted_by_user.scan_prefix(&prefix) {
            let (key, _) = result?;
            let id = parse_id_suffix(&key)?;
            if let Some(bytes) = self.deleted_notes.get(deleted_key(id))? {
                snapshots.push(serde_json::from_slice::<DeletedNoteSnapshot>(&bytes)?);
            }
        }

        snapshots.sort_by(|a, b| b.deleted_at_ms.cmp(&a.deleted_at_ms).then(b.id.cmp(&a.id)));
        Ok(snapshots)
    }

    /// Remove a snapshot owned by `username`; returns whether it existed
    pub fn remove_deleted(&self, id: u64, username: &str) -> Result<bool, MarkideaError> {
        if self.get_deleted(id, username)?.is_none() {
            return Ok(false);
        }
        self.deleted_notes.remove(deleted_key(id))?;
        self.deleted_by_user.remove(user_deleted_key(username, id))?;
        Ok(true)
    }

    /// Empty a user's recycle bin; returns the number of removed snapshots
    pub fn clear_deleted(&self, username: &str) -> Result<usize, MarkideaError> {
        let prefix = user_deleted_prefix(username);
        let mut removed = 0;

        for result in self.deleted_by_user.scan_prefix(&prefix) {
            let (key, _) = result?;
            let id = parse_id_suffix(&key)?;
            self.deleted_notes.remove(deleted_key(id))?;
            self.deleted_by_user.remove(&key)?;
            removed += 1;
        }

        Ok(removed)
    }

    // --- Sync settings ---

    pub fn get_sync_config(&self, username: &str) -> Result<Option<SyncConfig>, MarkideaError> {
        match self.sync_configs.get(username.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_sync_config(&self, config: &SyncConfig) -> Result<(), MarkideaError> {
        self.sync_configs
            .insert(config.username.as_bytes(), serde_json::to_vec(config)?)?;
        Ok(())
    }

    /// All persisted sync settings, sorted by username
    pub fn list_sync_configs(&self) -> Result<Vec<SyncConfig>, MarkideaError> {
        let mut configs = Vec::new();
        for result in self.sync_configs.iter() {
            let (_, value) = result?;
            configs.push(serde_json::from_slice::<SyncConfig>(&value)?);
        }
        configs.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(configs)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), MarkideaError> {
        self.db.flush()?;
        Ok(())
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn deleted_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn user_deleted_prefix(username: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(username.len() + 1);
    key.extend_from_slice(username.as_bytes());
    key.push(0);
    key
}

fn user_deleted_key(username: &str, id: u64) -> Vec<u8> {
    let mut key = user_deleted_prefix(username);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn parse_id_suffix(key: &[u8]) -> Result<u64, MarkideaError> {
    if key.len() < 8 {
        return Err(MarkideaError::Internal("Invalid recycle bin index key".to_string()));
    }
    let mut id = [0u8; 8];
    id.copy_from_slice(&key[key.len() - 8..]);
    Ok(u64::from_be_bytes(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_recycle_bin_operations() {
        let dir = tempdir().unwrap();
        let store = MarkideaStore::open(dir.path()).unwrap();

        let first = store
            .insert_deleted("alice", "diary", "monday", "hello", Some("abc".into()))
            .unwrap();
        let second = store.insert_deleted("alice", "work", "todo", "- a", None).unwrap();
        store.insert_deleted("bob", "diary", "monday", "other", None).unwrap();

        assert_ne!(first.id, second.id);

        let listed = store.list_deleted("alice").unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|s| s.username == "alice"));

        let found = store.get_deleted(first.id, "alice").unwrap().unwrap();
        assert_eq!(found.content, "hello");
        assert_eq!(found.last_ref.as_deref(), Some("abc"));

        // Snapshots are scoped to their owner
        assert!(store.get_deleted(first.id, "bob").unwrap().is_none());
        assert!(!store.remove_deleted(first.id, "bob").unwrap());

        assert!(store.remove_deleted(first.id, "alice").unwrap());
        assert!(store.get_deleted(first.id, "alice").unwrap().is_none());
        assert_eq!(store.list_deleted("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_clear_deleted_only_touches_owner() {
        let dir = tempdir().unwrap();
        let store = MarkideaStore::open(dir.path()).unwrap();

        store.insert_deleted("alice", "a", "1", "x", None).unwrap();
        store.insert_deleted("alice", "a", "2", "y", None).unwrap();
        store.insert_deleted("alicia", "a", "3", "z", None).unwrap();

        assert_eq!(store.clear_deleted("alice").unwrap(), 2);
        assert!(store.list_deleted("alice").unwrap().is_empty());
        assert_eq!(store.list_deleted("alicia").unwrap().len(), 1);
    }

    #[test]
    fn test_sync_configs() {
        let dir = tempdir().unwrap();
        let store = MarkideaStore::open(dir.path()).unwrap();

        assert!(store.get_sync_config("alice").unwrap().is_none());

        let config = SyncConfig {
            username: "alice".into(),
            remote_url: Some("git@example.com:alice/notes.git".into()),
            push_enabled: true,
        };
        store.put_sync_config(&config).unwrap();
        store
            .put_sync_config(&SyncConfig { username: "bob".into(), ..Default::default() })
            .unwrap();

        assert_eq!(store.get_sync_config("alice").unwrap(), Some(config));
        let all = store.list_sync_configs().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].username, "alice");
        assert_eq!(all[1].username, "bob");
    }

    #[test]
    fn test_lock_excludes_second_opener_until_dropped() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("db");

        let held = MarkideaStore::open_locked(&db).unwrap();
        assert!(dir.path().join("db.lock").exists());

        let err = MarkideaStore::open_locked(&db).unwrap_err();
        assert!(matches!(err, MarkideaError::DbBusy(ref msg) if msg.contains("locked by another process")));

        drop(held);
        MarkideaStore::open_locked(&db).unwrap();
    }

    #[test]
    fn test_blocking_open_waits_for_release() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("db");

        let held = MarkideaStore::open_locked(&db).unwrap();
        let err = MarkideaStore::open_locked_blocking(&db, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, MarkideaError::DbBusy(ref msg) if msg.contains("gave up")));

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            drop(held);
        });
        let store = MarkideaStore::open_locked_blocking(&db, Duration::from_secs(5)).unwrap();
        releaser.join().unwrap();
        assert!(store.list_sync_configs().unwrap().is_empty());
    }
}
