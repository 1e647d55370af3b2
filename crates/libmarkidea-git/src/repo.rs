//! Per-user note repository
//!
//! Each user owns one git repository rooted at `<notes_dir>/<username>/`.
//! Every mutating operation stages exactly the paths it touches and records
//! one commit whose message is an encoded `ChangeDescriptor`. History is a
//! single first-parent chain on `master`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use git2::{Commit, DiffOptions, ErrorCode, Index, Oid, Repository, RepositoryInitOptions, Signature, Tree};
use libmarkidea_core::history::{reconstruct, LoggedCommit};
use libmarkidea_core::types::change::{ChangeDescriptor, ChangeType};
use libmarkidea_core::types::note::REPO_FLAG_FILE;
use libmarkidea_core::VersionRecord;
use tracing::{debug, info};

use crate::GitError;

/// Branch every user repository commits to
pub const DEFAULT_BRANCH: &str = "master";

/// Handle to one user's repository
pub struct NoteRepository {
    pub(crate) repo: Repository,
    root: PathBuf,
}

impl NoteRepository {
    /// Open the repository at `root`, creating it (with a sentinel commit of
    /// the `.markidea` flag file) if it does not exist yet.
    ///
    /// Fails with `InvalidLayout` if `root` is occupied by a non-directory or
    /// cannot be created.
    pub fn open_or_init(root: &Path) -> Result<Self, GitError> {
        if root.exists() && !root.is_dir() {
            return Err(GitError::InvalidLayout(format!(
                "{} exists and is not a directory",
                root.display()
            )));
        }
        std::fs::create_dir_all(root).map_err(|e| {
            GitError::InvalidLayout(format!("cannot create {}: {}", root.display(), e))
        })?;

        match Repository::open(root) {
            Ok(repo) => Ok(Self {
                repo,
                root: root.to_path_buf(),
            }),
            Err(e) if e.code() == ErrorCode::NotFound => Self::init(root),
            Err(e) => Err(e.into()),
        }
    }

    fn init(root: &Path) -> Result<Self, GitError> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(DEFAULT_BRANCH);
        let repo = Repository::init_opts(root, &opts)
            .map_err(|e| GitError::InvalidLayout(format!("cannot init {}: {}", root.display(), e)))?;

        let this = Self {
            repo,
            root: root.to_path_buf(),
        };
        std::fs::write(root.join(REPO_FLAG_FILE), b"")?;
        this.save(REPO_FLAG_FILE)?;

        info!(root = %root.display(), "initialized note repository");
        Ok(this)
    }

    /// Working tree root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a repository-relative path
    pub fn abs_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Commit id of HEAD, if any
    pub fn head(&self) -> Result<Option<Oid>, GitError> {
        Ok(self.head_commit()?.map(|c| c.id()))
    }

    /// Stage `path` as found in the working tree and commit NEW_OR_MODIFY
    pub fn save(&self, path: &str) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        index.add_path(Path::new(path))?;
        self.commit_index(&mut index, &ChangeDescriptor::new(ChangeType::NewOrModify, path))
    }

    /// Record a file move already performed in the working tree.
    ///
    /// Stages `new_path`, unstages `old_path` and commits MOVE tagged with
    /// the destination.
    pub fn move_path(&self, old_path: &str, new_path: &str) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        index.add_path(Path::new(new_path))?;
        index.remove_path(Path::new(old_path))?;
        let desc = ChangeDescriptor::new(ChangeType::Move, new_path).with_rename(old_path, new_path);
        self.commit_index(&mut index, &desc)
    }

    /// Record a directory rename already performed in the working tree
    pub fn move_dir(&self, old_dir: &str, new_dir: &str) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        index.remove_dir(Path::new(old_dir), 0)?;
        self.add_dir_recursive(&mut index, new_dir)?;
        let desc = ChangeDescriptor::new(ChangeType::Move, new_dir).with_rename(old_dir, new_dir);
        self.commit_index(&mut index, &desc)
    }

    /// Unstage `path` and commit DELETE. The working-tree file is expected
    /// to be gone already.
    pub fn remove(&self, path: &str) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        index.remove_path(Path::new(path))?;
        self.commit_index(&mut index, &ChangeDescriptor::new(ChangeType::Delete, path))
    }

    /// Unstage everything under `dir` and commit DELETE
    pub fn remove_dir(&self, dir: &str) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        index.remove_dir(Path::new(dir), 0)?;
        self.commit_index(&mut index, &ChangeDescriptor::new(ChangeType::Delete, dir))
    }

    /// Reset index and working tree content of `path` to `version_ref` and
    /// commit RESET with `prevRef = version_ref`.
    pub fn reset_to_version(&self, path: &str, version_ref: &str) -> Result<Oid, GitError> {
        let oid = self.parse_ref(version_ref)?;
        let mut index = self.repo.index()?;
        self.restore_from(&mut index, oid, path)?;
        let desc = ChangeDescriptor::new(ChangeType::Reset, path).with_prev_ref(oid.to_string());
        let commit = self.commit_index(&mut index, &desc)?;
        info!(path, version_ref, "reset file to version");
        Ok(commit)
    }

    /// Restore a deleted `path` from `version_ref` and commit RECOVER.
    /// Other paths are left untouched.
    pub fn recover_deleted(&self, path: &str, version_ref: &str) -> Result<Oid, GitError> {
        let oid = self.parse_ref(version_ref)?;
        let mut index = self.repo.index()?;
        self.restore_from(&mut index, oid, path)?;
        let commit = self.commit_index(&mut index, &ChangeDescriptor::new(ChangeType::Recover, path))?;
        info!(path, "recovered deleted file");
        Ok(commit)
    }

    /// Commit RECOVER for content already written back into the working tree
    pub fn record_recovered(&self, path: &str) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        index.add_path(Path::new(path))?;
        self.commit_index(&mut index, &ChangeDescriptor::new(ChangeType::Recover, path))
    }

    /// Throw away working-tree edits of `path`, restoring the staged content.
    /// An untracked file is removed.
    pub fn discard_changes(&self, path: &str) -> Result<(), GitError> {
        let index = self.repo.index()?;
        let abs = self.abs_path(path);
        match index.get_path(Path::new(path), 0) {
            Some(entry) => {
                let blob = self.repo.find_blob(entry.id)?;
                std::fs::write(&abs, blob.content())?;
            }
            None if abs.is_file() => std::fs::remove_file(&abs)?,
            None => {}
        }
        Ok(())
    }

    /// Modified or untracked paths under `dir`, relative to the root.
    ///
    /// Used to flag notes whose latest content has not been committed.
    pub fn uncommitted_paths(&self, dir: &str) -> Result<HashSet<String>, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let statuses = self.repo.statuses(Some(&mut opts))?;

        let mut paths = HashSet::new();
        for entry in statuses.iter() {
            let status = entry.status();
            if !(status.is_wt_modified() || status.is_wt_new()) {
                continue;
            }
            if let Some(path) = entry.path() {
                if path.starts_with(&prefix) {
                    paths.insert(path.to_string());
                }
            }
        }
        Ok(paths)
    }

    /// Live version list of `path`, newest first
    pub fn history(&self, path: &str) -> Result<Vec<VersionRecord>, GitError> {
        let log = self.path_log(path)?;
        Ok(reconstruct(path, &log))
    }

    /// Newest live version of `path`
    pub fn current_version(&self, path: &str) -> Result<Option<String>, GitError> {
        Ok(self.history(path)?.into_iter().next().map(|r| r.version_ref))
    }

    /// Content of `path` as of `version_ref`.
    ///
    /// Fails with `CurrentVersion` when `version_ref` is the newest commit
    /// touching `path`. Otherwise diffs `version_ref` against that commit,
    /// restricted to `path`, and returns the pre-image.
    pub fn historical_content(&self, path: &str, version_ref: &str) -> Result<String, GitError> {
        let log = self.path_log(path)?;
        let head = log
            .first()
            .ok_or_else(|| GitError::NotFound(format!("no history for {}", path)))?;
        let old_oid = self.parse_ref(version_ref)?;
        let head_oid = Oid::from_str(&head.id)?;
        if old_oid == head_oid {
            return Err(GitError::CurrentVersion(version_ref.to_string()));
        }

        let old_tree = self.repo.find_commit(old_oid)?.tree()?;
        let new_tree = self.repo.find_commit(head_oid)?.tree()?;

        let mut opts = DiffOptions::new();
        opts.pathspec(path).disable_pathspec_match(true);
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;

        let blob_id = match diff.deltas().next() {
            Some(delta) => delta.old_file().id(),
            // Same content at both ends
            None => tree_entry_id(&old_tree, path).unwrap_or_else(Oid::zero),
        };
        if blob_id.is_zero() {
            return Err(GitError::NotFound(format!(
                "{} does not exist at version {}",
                path, version_ref
            )));
        }

        let blob = self.repo.find_blob(blob_id)?;
        String::from_utf8(blob.content().to_vec()).map_err(|_| GitError::InvalidContent(path.to_string()))
    }

    /// First-parent log of commits that changed `path` or whose descriptor
    /// names it, newest first. A RESET back to the current bytes leaves the
    /// blob unchanged but still belongs in the log.
    fn path_log(&self, path: &str) -> Result<Vec<LoggedCommit>, GitError> {
        let mut log = Vec::new();
        let mut current = self.head_commit()?;

        while let Some(commit) = current {
            let parent = commit.parents().next();
            let here = tree_entry_id(&commit.tree()?, path);
            let before = match &parent {
                Some(p) => tree_entry_id(&p.tree()?, path),
                None => None,
            };

            let message = commit.message().unwrap_or("");
            let named = ChangeDescriptor::decode(message).is_some_and(|desc| desc.names(path));
            if here != before || named {
                log.push(LoggedCommit::new(
                    commit.id().to_string(),
                    commit.author().when().seconds(),
                    message,
                ));
            }
            current = parent;
        }

        debug!(path, commits = log.len(), "read path log");
        Ok(log)
    }

    /// Write `path` as of commit `oid` into the working tree and stage it
    fn restore_from(&self, index: &mut Index, oid: Oid, path: &str) -> Result<(), GitError> {
        let tree = self.repo.find_commit(oid)?.tree()?;
        let entry_id = tree_entry_id(&tree, path)
            .ok_or_else(|| GitError::NotFound(format!("{} does not exist at version {}", path, oid)))?;
        let blob = self.repo.find_blob(entry_id)?;

        let abs = self.abs_path(path);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&abs, blob.content())?;
        index.add_path(Path::new(path))?;
        Ok(())
    }

    fn add_dir_recursive(&self, index: &mut Index, dir: &str) -> Result<(), GitError> {
        for entry in std::fs::read_dir(self.abs_path(dir))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let rel = format!("{}/{}", dir, name);
            if entry.file_type()?.is_dir() {
                self.add_dir_recursive(index, &rel)?;
            } else {
                index.add_path(Path::new(&rel))?;
            }
        }
        Ok(())
    }

    fn commit_index(&self, index: &mut Index, desc: &ChangeDescriptor) -> Result<Oid, GitError> {
        index.write()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;
        let sig = Signature::now("markidea", "markidea@local")?;

        let parent = self.head_commit()?;
        let parents: Vec<&Commit> = parent.iter().collect();
        let oid = self.repo.commit(Some("HEAD"), &sig, &sig, &desc.encode(), &tree, &parents)?;

        debug!(commit = %oid, change = desc.change_type.as_str(), file = %desc.file_name, "committed");
        Ok(oid)
    }

    fn head_commit(&self) -> Result<Option<Commit<'_>>, GitError> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn parse_ref(&self, version_ref: &str) -> Result<Oid, GitError> {
        let oid = Oid::from_str(version_ref).map_err(|_| GitError::InvalidRef(version_ref.to_string()))?;
        self.repo
            .find_commit(oid)
            .map(|c| c.id())
            .map_err(|_| GitError::InvalidRef(version_ref.to_string()))
    }
}

fn tree_entry_id(tree: &Tree, path: &str) -> Option<Oid> {
    tree.get_path(Path::new(path)).ok().map(|e| e.id())
}
