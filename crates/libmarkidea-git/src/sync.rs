//! Remote push/pull over SSH
//!
//! Every user repository syncs a single branch (`master`) with a single
//! remote (`origin`). Transport is authenticated with the user's private key
//! file. Host keys are NOT verified: the remote is whatever URL the user
//! configured, and the key file alone establishes trust.
//!
//! Pull only fast-forwards. A diverged remote is reported as a failed sync
//! and left alone.

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

use git2::build::CheckoutBuilder;
use git2::{
    CertificateCheckStatus, Cred, CredentialType, FetchOptions, PushOptions, RemoteCallbacks,
};
use libmarkidea_core::SyncReport;
use tracing::{info, warn};

use crate::repo::{NoteRepository, DEFAULT_BRANCH};
use crate::GitError;

/// Remote name used for every user repository
pub const DEFAULT_REMOTE: &str = "origin";

/// Result of a push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResult {
    pub success: bool,
    pub message: String,
}

/// Result of a pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResult {
    pub success: bool,
    /// Whether the local branch moved
    pub fast_forwarded: bool,
    pub message: String,
}

impl From<PushResult> for SyncReport {
    fn from(result: PushResult) -> Self {
        SyncReport {
            success: result.success,
            message: result.message,
        }
    }
}

impl From<PullResult> for SyncReport {
    fn from(result: PullResult) -> Self {
        SyncReport {
            success: result.success,
            message: result.message,
        }
    }
}

fn branch_ref() -> String {
    format!("refs/heads/{}", DEFAULT_BRANCH)
}

fn tracking_ref() -> String {
    format!("refs/remotes/{}/{}", DEFAULT_REMOTE, DEFAULT_BRANCH)
}

impl NoteRepository {
    /// Point `origin` at `url` and make `master` track it
    pub fn configure_remote(&self, url: &str) -> Result<(), GitError> {
        match self.repo.find_remote(DEFAULT_REMOTE) {
            Ok(remote) if remote.url() == Some(url) => {}
            Ok(_) => self.repo.remote_set_url(DEFAULT_REMOTE, url)?,
            Err(_) => {
                self.repo.remote(DEFAULT_REMOTE, url)?;
            }
        }

        let mut config = self.repo.config()?;
        config.set_str(&format!("branch.{}.remote", DEFAULT_BRANCH), DEFAULT_REMOTE)?;
        config.set_str(&format!("branch.{}.merge", DEFAULT_BRANCH), &branch_ref())?;
        Ok(())
    }

    /// Push `master` to `remote_url`.
    ///
    /// Never fails: transport, authentication and rejection errors are
    /// reported through `PushResult`.
    pub fn push_to_remote(&self, remote_url: &str, private_key: &Path) -> PushResult {
        match self.try_push(remote_url, private_key) {
            Ok(result) => result,
            Err(e) => {
                warn!(root = %self.root().display(), remote = remote_url, error = %e, "push failed");
                PushResult {
                    success: false,
                    message: format!("Push failed: {}", e),
                }
            }
        }
    }

    /// Fetch `master` from the configured remote and fast-forward to it.
    ///
    /// Never fails: errors and divergence are reported through `PullResult`.
    pub fn pull_from_remote(&self, private_key: &Path) -> PullResult {
        match self.try_pull(private_key) {
            Ok(result) => result,
            Err(e) => {
                warn!(root = %self.root().display(), error = %e, "pull failed");
                PullResult {
                    success: false,
                    fast_forwarded: false,
                    message: format!("Pull failed: {}", e),
                }
            }
        }
    }

    fn try_push(&self, remote_url: &str, private_key: &Path) -> Result<PushResult, GitError> {
        self.configure_remote(remote_url)?;
        let mut remote = self.repo.find_remote(DEFAULT_REMOTE)?;

        let rejection: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let rejection_clone = Rc::clone(&rejection);

        let mut callbacks = ssh_callbacks(private_key);
        callbacks.push_update_reference(move |refname, status| {
            if let Some(msg) = status {
                *rejection_clone.borrow_mut() = Some(format!("{}: {}", refname, msg));
            }
            Ok(())
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        let refspec = format!("{}:{}", branch_ref(), branch_ref());
        remote.push(&[refspec.as_str()], Some(&mut push_options))?;

        let rejected = rejection.borrow().clone();
        if let Some(msg) = rejected {
            return Ok(PushResult {
                success: false,
                message: format!("Push rejected: {}", msg),
            });
        }

        info!(root = %self.root().display(), remote = remote_url, "pushed");
        Ok(PushResult {
            success: true,
            message: "Push successful".to_string(),
        })
    }

    fn try_pull(&self, private_key: &Path) -> Result<PullResult, GitError> {
        let mut remote = self
            .repo
            .find_remote(DEFAULT_REMOTE)
            .map_err(|_| GitError::Sync("no remote configured".to_string()))?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(ssh_callbacks(private_key));

        let refspec = format!("+{}:{}", branch_ref(), tracking_ref());
        remote.fetch(&[refspec.as_str()], Some(&mut fetch_options), None)?;

        let fetched = match self.repo.find_reference(&tracking_ref()) {
            Ok(reference) => reference,
            Err(_) => {
                return Ok(PullResult {
                    success: true,
                    fast_forwarded: false,
                    message: "Remote has no commits yet".to_string(),
                })
            }
        };
        let incoming = self.repo.reference_to_annotated_commit(&fetched)?;
        let (analysis, _) = self.repo.merge_analysis(&[&incoming])?;

        if analysis.is_up_to_date() {
            return Ok(PullResult {
                success: true,
                fast_forwarded: false,
                message: "Already up to date".to_string(),
            });
        }

        if !analysis.is_fast_forward() {
            return Ok(PullResult {
                success: false,
                fast_forwarded: false,
                message: "Remote history has diverged; refusing to merge".to_string(),
            });
        }

        // Update the working tree against the old HEAD first so that local
        // uncommitted edits make the checkout fail instead of being lost.
        let target = self.repo.find_commit(incoming.id())?;
        self.repo
            .checkout_tree(target.as_object(), Some(CheckoutBuilder::new().safe()))?;

        let mut branch = self.repo.find_reference(&branch_ref())?;
        branch.set_target(incoming.id(), "markidea: fast-forward pull")?;
        self.repo.set_head(&branch_ref())?;

        info!(root = %self.root().display(), head = %incoming.id(), "fast-forwarded");
        Ok(PullResult {
            success: true,
            fast_forwarded: true,
            message: format!("Fast-forwarded to {}", incoming.id()),
        })
    }
}

/// Callbacks authenticating with the key file at `private_key`.
///
/// Credentials are offered once; a second request means the key was
/// refused and the transfer is aborted.
fn ssh_callbacks(private_key: &Path) -> RemoteCallbacks<'_> {
    let attempts = Cell::new(0u32);

    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username, allowed| {
        if allowed.contains(CredentialType::USERNAME) {
            return Cred::username(username.unwrap_or("git"));
        }
        attempts.set(attempts.get() + 1);
        if attempts.get() > 1 {
            return Err(git2::Error::from_str("SSH authentication failed"));
        }
        Cred::ssh_key(username.unwrap_or("git"), None, private_key, None)
    });
    callbacks.certificate_check(|_cert, _host| Ok(CertificateCheckStatus::CertificateOk));
    callbacks
}
