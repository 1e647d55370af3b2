//! Note service: every user-facing operation on notebooks, notes, the
//! recycle bin and remote sync settings.
//!
//! Each operation names its user explicitly. Mutations commit to the user's
//! repository and invalidate both caches for the keys they touch before
//! returning. At most one mutating operation per user is expected at a time.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use libmarkidea_core::config::ServiceConfig;
use libmarkidea_core::types::note::{notebook_flag_path, title_from_file_name, validate_name, NOTEBOOK_FLAG_FILE};
use libmarkidea_core::{
    DeletedNoteSnapshot, LockedStore, MarkideaError, MarkideaStore, NoteKey, SyncConfig, SyncReport,
    VersionRecord,
};
use libmarkidea_git::NoteRepository;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{ContentCache, NotePreview, NoteSource, PreviewCache, WorkingTreeSource};
use crate::index::ContentIndex;

/// How long to wait for the store lock held by another process
const STORE_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether the working-tree content of a note has been committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    Saved,
    Unsaved,
}

/// One row of a notebook listing
#[derive(Debug, Clone, Serialize)]
pub struct NoteSummary {
    pub title: String,
    pub modified: DateTime<Utc>,
    pub preview: String,
    pub record_id: Option<i64>,
    pub status: NoteStatus,
}

/// One search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub notebook: String,
    pub title: String,
    /// Case-insensitive occurrences in title and content
    pub hits: usize,
}

pub struct NoteService {
    config: ServiceConfig,
    store: LockedStore,
    content: ContentCache,
    previews: PreviewCache,
    index: Arc<dyn ContentIndex>,
}

impl NoteService {
    /// Open the service: check the directory layout and lock the store
    pub fn open(config: ServiceConfig, index: Arc<dyn ContentIndex>) -> Result<Self, MarkideaError> {
        config.ensure_layout()?;
        let store = MarkideaStore::open_locked_blocking(&config.db_path, STORE_LOCK_TIMEOUT)?;
        let source = Arc::new(WorkingTreeSource::new(&config.notes_dir));
        Ok(Self::with_source(config, store, index, source))
    }

    /// Build the service around an already opened store and a custom source
    pub fn with_source(
        config: ServiceConfig,
        store: LockedStore,
        index: Arc<dyn ContentIndex>,
        source: Arc<dyn NoteSource>,
    ) -> Self {
        let content = ContentCache::new(&config.cache, source);
        let previews = PreviewCache::new(&config.cache, content.clone(), Arc::clone(&index));
        Self {
            config,
            store,
            content,
            previews,
            index,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &MarkideaStore {
        self.store.inner()
    }

    pub fn content_cache(&self) -> &ContentCache {
        &self.content
    }

    pub fn preview_cache(&self) -> &PreviewCache {
        &self.previews
    }

    // --- Notebooks ---

    /// Non-hidden directories at the repository root, sorted
    pub fn list_notebooks(&self, username: &str) -> Result<Vec<String>, MarkideaError> {
        let repo = self.repo(username)?;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(repo.root())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !entry.file_type()?.is_dir() {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    pub fn create_notebook(&self, username: &str, notebook: &str) -> Result<(), MarkideaError> {
        validate_name("notebook", notebook)?;
        let repo = self.repo(username)?;
        self.create_notebook_in(&repo, notebook)
    }

    /// Delete every note of a notebook through the regular delete flow, then
    /// the notebook itself. Returns the recycle bin snapshots.
    pub fn delete_notebook(
        &self,
        username: &str,
        notebook: &str,
    ) -> Result<Vec<DeletedNoteSnapshot>, MarkideaError> {
        validate_name("notebook", notebook)?;
        let repo = self.repo(username)?;
        require_notebook(&repo, notebook)?;

        let mut deleted = Vec::new();
        for title in note_titles(&repo.abs_path(notebook))? {
            let key = NoteKey::new(username, notebook, title);
            deleted.push(self.delete_note_in(&repo, &key)?);
        }

        std::fs::remove_dir_all(repo.abs_path(notebook))?;
        repo.remove_dir(notebook)?;

        info!(user = username, notebook, notes = deleted.len(), "deleted notebook");
        Ok(deleted)
    }

    pub fn rename_notebook(
        &self,
        username: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), MarkideaError> {
        validate_name("notebook", old_name)?;
        validate_name("notebook", new_name)?;
        if old_name == new_name {
            return Err(MarkideaError::InvalidArgs(
                "source and target notebook are the same".to_string(),
            ));
        }

        let repo = self.repo(username)?;
        require_notebook(&repo, old_name)?;
        if repo.abs_path(new_name).exists() {
            return Err(MarkideaError::AlreadyExists(format!("notebook '{}'", new_name)));
        }

        let titles = note_titles(&repo.abs_path(old_name))?;
        std::fs::rename(repo.abs_path(old_name), repo.abs_path(new_name))?;
        repo.move_dir(old_name, new_name)?;

        for title in titles {
            self.invalidate(&NoteKey::new(username, old_name, title));
        }
        self.index.rename_notebook(username, old_name, new_name)?;

        info!(user = username, from = old_name, to = new_name, "renamed notebook");
        Ok(())
    }

    // --- Notes ---

    /// Notes of a notebook, most recently modified first
    pub fn list_notes(&self, username: &str, notebook: &str) -> Result<Vec<NoteSummary>, MarkideaError> {
        validate_name("notebook", notebook)?;
        let repo = self.repo(username)?;
        require_notebook(&repo, notebook)?;

        let unsaved = repo.uncommitted_paths(notebook)?;
        let mut notes = Vec::new();

        for title in note_titles(&repo.abs_path(notebook))? {
            let key = NoteKey::new(username, notebook, &title);
            let path = key.relative_path();
            let modified = std::fs::metadata(repo.abs_path(&path))?.modified()?;
            let preview = self
                .previews
                .get(&key)?
                .unwrap_or_else(|| NotePreview::from_content("", None));

            notes.push(NoteSummary {
                title,
                modified: DateTime::<Utc>::from(modified),
                preview: preview.preview,
                record_id: preview.record_id,
                status: if unsaved.contains(&path) {
                    NoteStatus::Unsaved
                } else {
                    NoteStatus::Saved
                },
            });
        }

        notes.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.title.cmp(&b.title)));
        Ok(notes)
    }

    /// Notes whose title or content contain `keyword`, best match first.
    ///
    /// Searches all notebooks unless `notebooks` narrows the set.
    pub fn search(
        &self,
        username: &str,
        keyword: &str,
        notebooks: Option<&[String]>,
    ) -> Result<Vec<SearchHit>, MarkideaError> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Err(MarkideaError::InvalidArgs("search keyword must not be blank".to_string()));
        }

        let repo = self.repo(username)?;
        let books = match notebooks {
            Some(list) => {
                for name in list {
                    validate_name("notebook", name)?;
                }
                list.to_vec()
            }
            None => self.list_notebooks(username)?,
        };

        let mut hits = Vec::new();
        for notebook in books {
            let dir = repo.abs_path(&notebook);
            if !dir.is_dir() {
                continue;
            }
            for title in note_titles(&dir)? {
                let key = NoteKey::new(username, &notebook, &title);
                let content = self.content.get(&key)?.unwrap_or_default();
                let count = title.to_lowercase().matches(&needle).count()
                    + content.to_lowercase().matches(&needle).count();
                if count > 0 {
                    hits.push(SearchHit {
                        notebook: notebook.clone(),
                        title,
                        hits: count,
                    });
                }
            }
        }

        hits.sort_by(|a, b| {
            b.hits
                .cmp(&a.hits)
                .then_with(|| a.notebook.cmp(&b.notebook))
                .then_with(|| a.title.cmp(&b.title))
        });
        Ok(hits)
    }

    /// Create a note that must not exist yet; returns the commit id
    pub fn create_note(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
        content: &str,
    ) -> Result<String, MarkideaError> {
        let key = note_key(username, notebook, title)?;
        let repo = self.repo(username)?;
        if repo.abs_path(&key.relative_path()).exists() {
            return Err(MarkideaError::AlreadyExists(format!("note '{}/{}'", notebook, title)));
        }
        self.save_in(&repo, &key, content)
    }

    /// Write and commit a note, creating its notebook if needed; returns the
    /// commit id
    pub fn save_note(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
        content: &str,
    ) -> Result<String, MarkideaError> {
        let key = note_key(username, notebook, title)?;
        let repo = self.repo(username)?;
        self.save_in(&repo, &key, content)
    }

    /// Write the working-tree file without committing
    pub fn tmp_save_note(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
        content: &str,
    ) -> Result<(), MarkideaError> {
        let key = note_key(username, notebook, title)?;
        let repo = self.repo(username)?;
        require_notebook(&repo, notebook)?;

        std::fs::write(repo.abs_path(&key.relative_path()), content)?;
        self.invalidate(&key);
        debug!(user = username, path = %key.relative_path(), "stored unsaved draft");
        Ok(())
    }

    /// Drop uncommitted edits, returning to the last saved content
    pub fn discard_unsaved(&self, username: &str, notebook: &str, title: &str) -> Result<(), MarkideaError> {
        let key = note_key(username, notebook, title)?;
        let repo = self.repo(username)?;
        repo.discard_changes(&key.relative_path())?;
        self.invalidate(&key);
        Ok(())
    }

    pub fn get_note(&self, username: &str, notebook: &str, title: &str) -> Result<String, MarkideaError> {
        let key = note_key(username, notebook, title)?;
        self.content
            .get(&key)?
            .ok_or_else(|| MarkideaError::note_not_found(notebook, title))
    }

    /// Copy a note into another notebook under the same title
    pub fn copy_note(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
        target_notebook: &str,
    ) -> Result<String, MarkideaError> {
        validate_name("notebook", target_notebook)?;
        if notebook == target_notebook {
            return Err(MarkideaError::InvalidArgs(
                "source and target notebook are the same".to_string(),
            ));
        }
        let content = self.get_note(username, notebook, title)?;
        self.create_note(username, target_notebook, title, &content)
    }

    /// Move or rename a note. The target notebook must already exist and
    /// the target note must not.
    ///
    /// The destination key is warmed with the moved content.
    pub fn move_note(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
        target_notebook: &str,
        target_title: &str,
    ) -> Result<(), MarkideaError> {
        let source = note_key(username, notebook, title)?;
        let target = note_key(username, target_notebook, target_title)?;
        if source == target {
            return Err(MarkideaError::InvalidArgs(
                "source and target note are the same".to_string(),
            ));
        }

        let repo = self.repo(username)?;
        let content = self.get_note(username, notebook, title)?;
        require_notebook(&repo, target_notebook)?;
        if repo.abs_path(&target.relative_path()).exists() {
            return Err(MarkideaError::AlreadyExists(format!(
                "note '{}/{}'",
                target_notebook, target_title
            )));
        }

        std::fs::rename(
            repo.abs_path(&source.relative_path()),
            repo.abs_path(&target.relative_path()),
        )?;
        repo.move_path(&source.relative_path(), &target.relative_path())?;

        self.invalidate(&source);
        self.previews.invalidate(&target);
        self.content.put(target, content);
        self.index
            .move_record(username, notebook, title, target_notebook, target_title)?;

        info!(
            user = username,
            from = %format!("{}/{}", notebook, title),
            to = %format!("{}/{}", target_notebook, target_title),
            "moved note"
        );
        Ok(())
    }

    /// Delete a note, keeping a snapshot in the recycle bin
    pub fn delete_note(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
    ) -> Result<DeletedNoteSnapshot, MarkideaError> {
        let key = note_key(username, notebook, title)?;
        let repo = self.repo(username)?;
        self.delete_note_in(&repo, &key)
    }

    /// Live versions of a note, newest first
    pub fn history(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
    ) -> Result<Vec<VersionRecord>, MarkideaError> {
        let key = note_key(username, notebook, title)?;
        let repo = self.repo(username)?;
        let path = key.relative_path();

        let history = repo.history(&path)?;
        if history.is_empty() && !repo.abs_path(&path).exists() {
            return Err(MarkideaError::note_not_found(notebook, title));
        }
        Ok(history)
    }

    /// Content of a note as of an older version
    pub fn history_content(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
        version: &str,
    ) -> Result<String, MarkideaError> {
        let key = note_key(username, notebook, title)?;
        let repo = self.repo(username)?;
        Ok(repo.historical_content(&key.relative_path(), version)?)
    }

    /// Roll a note back to `version` and return the restored content
    pub fn reset_and_get(
        &self,
        username: &str,
        notebook: &str,
        title: &str,
        version: &str,
    ) -> Result<String, MarkideaError> {
        let key = note_key(username, notebook, title)?;
        let repo = self.repo(username)?;

        if let Err(e) = repo.reset_to_version(&key.relative_path(), version) {
            warn!(user = username, path = %key.relative_path(), version, error = %e, "reset failed");
            return Err(MarkideaError::ResetFailed(e.to_string()));
        }
        self.invalidate(&key);
        self.get_note(username, notebook, title)
    }

    // --- Recycle bin ---

    pub fn list_deleted(&self, username: &str) -> Result<Vec<DeletedNoteSnapshot>, MarkideaError> {
        validate_name("username", username)?;
        self.store.list_deleted(username)
    }

    /// Restore a deleted note and drop its snapshot.
    ///
    /// The note is restored from its last version when that version still
    /// holds the snapshot's exact content; otherwise the snapshot content is
    /// written back. Either way one RECOVER commit is recorded.
    pub fn recover_note(&self, username: &str, id: u64) -> Result<DeletedNoteSnapshot, MarkideaError> {
        validate_name("username", username)?;
        let snapshot = self
            .store
            .get_deleted(id, username)?
            .ok_or_else(|| MarkideaError::NotFound(format!("deleted note {}", id)))?;

        let key = snapshot.key();
        let path = key.relative_path();
        let repo = self.repo(username)?;
        if repo.abs_path(&path).exists() {
            return Err(MarkideaError::AlreadyExists(format!(
                "note '{}/{}'",
                key.notebook, key.title
            )));
        }
        if !repo.abs_path(&key.notebook).is_dir() {
            self.create_notebook_in(&repo, &key.notebook)?;
        }

        let from_history = snapshot.last_ref.as_deref().filter(|version| {
            matches!(repo.historical_content(&path, version), Ok(ref old) if *old == snapshot.content)
        });
        match from_history {
            Some(version) => {
                repo.recover_deleted(&path, version)?;
            }
            None => {
                debug!(user = username, path = %path, "recovering from snapshot content");
                std::fs::write(repo.abs_path(&path), &snapshot.content)?;
                repo.record_recovered(&path)?;
            }
        }

        self.store.remove_deleted(id, username)?;
        self.store.flush()?;
        self.invalidate(&key);

        info!(user = username, path = %path, id, "recovered note");
        Ok(snapshot)
    }

    /// Permanently drop one snapshot
    pub fn clear_deleted(&self, username: &str, id: u64) -> Result<(), MarkideaError> {
        validate_name("username", username)?;
        if !self.store.remove_deleted(id, username)? {
            return Err(MarkideaError::NotFound(format!("deleted note {}", id)));
        }
        self.store.flush()
    }

    /// Empty the recycle bin; returns the number of dropped snapshots
    pub fn clear_all_deleted(&self, username: &str) -> Result<usize, MarkideaError> {
        validate_name("username", username)?;
        let removed = self.store.clear_deleted(username)?;
        self.store.flush()?;
        Ok(removed)
    }

    // --- Remote sync ---

    /// Sync settings of a user; defaults when never configured
    pub fn sync_config(&self, username: &str) -> Result<SyncConfig, MarkideaError> {
        validate_name("username", username)?;
        Ok(self.store.get_sync_config(username)?.unwrap_or_else(|| SyncConfig {
            username: username.to_string(),
            ..Default::default()
        }))
    }

    pub fn set_remote(&self, username: &str, remote_url: &str) -> Result<SyncConfig, MarkideaError> {
        let remote_url = remote_url.trim();
        if remote_url.is_empty() {
            return Err(MarkideaError::InvalidArgs("remote URL must not be blank".to_string()));
        }

        let mut config = self.sync_config(username)?;
        self.repo(username)?.configure_remote(remote_url)?;
        config.remote_url = Some(remote_url.to_string());
        self.put_sync_config(&config)?;
        Ok(config)
    }

    /// Opt in to scheduled pushes; requires a remote
    pub fn enable_push(&self, username: &str) -> Result<SyncConfig, MarkideaError> {
        let mut config = self.sync_config(username)?;
        if config.remote_url.is_none() {
            return Err(MarkideaError::InvalidArgs(
                "no remote configured; run 'markidea remote set <url>' first".to_string(),
            ));
        }
        config.push_enabled = true;
        self.put_sync_config(&config)?;
        Ok(config)
    }

    pub fn disable_push(&self, username: &str) -> Result<SyncConfig, MarkideaError> {
        let mut config = self.sync_config(username)?;
        config.push_enabled = false;
        self.put_sync_config(&config)?;
        Ok(config)
    }

    /// Push immediately, regardless of the scheduled push setting
    pub fn push_now(&self, username: &str) -> Result<SyncReport, MarkideaError> {
        let config = self.sync_config(username)?;
        let Some(url) = config.remote_url else {
            return Ok(SyncReport::failed("no remote configured"));
        };
        let repo = self.repo(username)?;
        Ok(repo
            .push_to_remote(&url, &self.config.private_key_path(username))
            .into())
    }

    /// Fast-forward from the configured remote
    pub fn pull(&self, username: &str) -> Result<SyncReport, MarkideaError> {
        let config = self.sync_config(username)?;
        let Some(url) = config.remote_url else {
            return Ok(SyncReport::failed("no remote configured"));
        };
        let repo = self.repo(username)?;
        repo.configure_remote(&url)?;

        let result = repo.pull_from_remote(&self.config.private_key_path(username));
        if result.fast_forwarded {
            self.content.invalidate_all();
            self.previews.invalidate_all();
        }
        Ok(result.into())
    }

    // --- Internals ---

    fn repo(&self, username: &str) -> Result<NoteRepository, MarkideaError> {
        validate_name("username", username)?;
        Ok(NoteRepository::open_or_init(&self.config.user_repo_dir(username))?)
    }

    fn invalidate(&self, key: &NoteKey) {
        self.content.invalidate(key);
        self.previews.invalidate(key);
    }

    fn put_sync_config(&self, config: &SyncConfig) -> Result<(), MarkideaError> {
        self.store.put_sync_config(config)?;
        self.store.flush()
    }

    fn create_notebook_in(&self, repo: &NoteRepository, notebook: &str) -> Result<(), MarkideaError> {
        let dir = repo.abs_path(notebook);
        if dir.exists() {
            return Err(MarkideaError::AlreadyExists(format!("notebook '{}'", notebook)));
        }
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(NOTEBOOK_FLAG_FILE), b"")?;
        repo.save(&notebook_flag_path(notebook))?;

        info!(root = %repo.root().display(), notebook, "created notebook");
        Ok(())
    }

    fn save_in(&self, repo: &NoteRepository, key: &NoteKey, content: &str) -> Result<String, MarkideaError> {
        if !repo.abs_path(&key.notebook).is_dir() {
            self.create_notebook_in(repo, &key.notebook)?;
        }
        let path = key.relative_path();
        std::fs::write(repo.abs_path(&path), content)?;
        let commit = repo.save(&path)?;
        self.invalidate(key);

        debug!(user = %key.username, path = %path, commit = %commit, "saved note");
        Ok(commit.to_string())
    }

    fn delete_note_in(&self, repo: &NoteRepository, key: &NoteKey) -> Result<DeletedNoteSnapshot, MarkideaError> {
        let content = self
            .content
            .get(key)?
            .ok_or_else(|| MarkideaError::note_not_found(&key.notebook, &key.title))?;
        let path = key.relative_path();
        let last_ref = repo.history(&path)?.into_iter().next().map(|r| r.version_ref);

        std::fs::remove_file(repo.abs_path(&path))?;
        self.index.delete_record(&key.username, &key.notebook, &key.title)?;
        repo.remove(&path)?;

        let snapshot = self
            .store
            .insert_deleted(&key.username, &key.notebook, &key.title, &content, last_ref)?;
        self.store.flush()?;
        self.invalidate(key);

        info!(user = %key.username, path = %path, id = snapshot.id, "deleted note");
        Ok(snapshot)
    }
}

fn note_key(username: &str, notebook: &str, title: &str) -> Result<NoteKey, MarkideaError> {
    let key = NoteKey::new(username, notebook, title);
    key.validate()?;
    Ok(key)
}

fn require_notebook(repo: &NoteRepository, notebook: &str) -> Result<(), MarkideaError> {
    if repo.abs_path(notebook).is_dir() {
        Ok(())
    } else {
        Err(MarkideaError::NotFound(format!("notebook '{}'", notebook)))
    }
}

/// Titles of the note files directly inside `dir`, sorted
fn note_titles(dir: &Path) -> Result<Vec<String>, MarkideaError> {
    let mut titles = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(title) = title_from_file_name(&name) {
            titles.push(title.to_string());
        }
    }
    titles.sort();
    Ok(titles)
}
