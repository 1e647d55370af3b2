//! Remote sync scheduler
//!
//! One periodic driver pushes every opted-in user repository to its remote.
//! Sweeps never overlap: a tick that arrives while a sweep is still running
//! is dropped. The task list is rebuilt from the store on its own trigger
//! and swapped in whole, so a sweep always sees a consistent list.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use libmarkidea_core::config::ServiceConfig;
use libmarkidea_core::{MarkideaStore, SyncConfig, SyncReport, SyncStatus};
use libmarkidea_git::NoteRepository;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::DaemonError;

/// How long a refresh waits for a CLI process holding the store
const STORE_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// One user's scheduled push
#[derive(Debug)]
pub struct PushTask {
    pub username: String,
    pub local_path: PathBuf,
    pub remote_url: String,
    pub private_key_path: PathBuf,
    status: Mutex<TaskState>,
}

#[derive(Debug, Clone)]
struct TaskState {
    status: SyncStatus,
    message: Option<String>,
}

impl PushTask {
    pub fn new(
        username: impl Into<String>,
        local_path: impl Into<PathBuf>,
        remote_url: impl Into<String>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            username: username.into(),
            local_path: local_path.into(),
            remote_url: remote_url.into(),
            private_key_path: private_key_path.into(),
            status: Mutex::new(TaskState {
                status: SyncStatus::Pending,
                message: None,
            }),
        }
    }

    /// Task for a user that opted in to scheduled pushes
    pub fn from_config(config: &ServiceConfig, sync: &SyncConfig) -> Option<Self> {
        if !sync.wants_push() {
            return None;
        }
        let remote_url = sync.remote_url.as_deref()?.trim();
        Some(Self::new(
            &sync.username,
            config.user_repo_dir(&sync.username),
            remote_url,
            config.private_key_path(&sync.username),
        ))
    }

    pub fn status(&self) -> SyncStatus {
        self.state().status
    }

    /// Message of the last attempt
    pub fn last_message(&self) -> Option<String> {
        self.state().message
    }

    fn state(&self) -> TaskState {
        match self.status.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, report: &SyncReport) {
        let state = TaskState {
            status: if report.success {
                SyncStatus::Succeeded
            } else {
                SyncStatus::Failed
            },
            message: Some(report.message.clone()),
        };
        match self.status.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    fn inherit(&self, previous: &PushTask) {
        let state = previous.state();
        if let Ok(mut guard) = self.status.lock() {
            *guard = state;
        }
    }
}

/// Transfers one task's repository
pub trait RemotePusher: Send + Sync + 'static {
    fn push(&self, task: &PushTask) -> SyncReport;
}

/// Pushes over git/SSH with the user's key
#[derive(Debug, Default, Clone, Copy)]
pub struct GitPusher;

impl RemotePusher for GitPusher {
    fn push(&self, task: &PushTask) -> SyncReport {
        if !task.local_path.is_dir() {
            return SyncReport::failed(format!(
                "repository {} does not exist",
                task.local_path.display()
            ));
        }
        match NoteRepository::open_or_init(&task.local_path) {
            Ok(repo) => repo
                .push_to_remote(&task.remote_url, &task.private_key_path)
                .into(),
            Err(e) => SyncReport::failed(e.to_string()),
        }
    }
}

type TaskList = Arc<Vec<Arc<PushTask>>>;

pub struct RemoteSyncScheduler<P: RemotePusher = GitPusher> {
    config: ServiceConfig,
    pusher: P,
    tasks: RwLock<TaskList>,
    sweeping: AtomicBool,
    sweeps: AtomicU64,
}

/// Clears the sweep flag even if a push panics
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<P: RemotePusher> RemoteSyncScheduler<P> {
    pub fn new(config: ServiceConfig, pusher: P) -> Self {
        Self {
            config,
            pusher,
            tasks: RwLock::new(Arc::new(Vec::new())),
            sweeping: AtomicBool::new(false),
            sweeps: AtomicU64::new(0),
        }
    }

    /// Current task list snapshot
    pub fn tasks(&self) -> TaskList {
        match self.tasks.read() {
            Ok(tasks) => Arc::clone(&tasks),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Result of the last push for `username`, if they have a task
    pub fn status_of(&self, username: &str) -> Option<SyncStatus> {
        self.tasks()
            .iter()
            .find(|t| t.username == username)
            .map(|t| t.status())
    }

    /// Number of sweeps that ran to completion
    pub fn sweeps_completed(&self) -> u64 {
        self.sweeps.load(Ordering::Acquire)
    }

    /// Swap in a new task list, carrying over the status of users whose
    /// task survives. Returns the number of tasks.
    pub fn replace_tasks(&self, tasks: Vec<PushTask>) -> usize {
        let previous = self.tasks();
        let next: Vec<Arc<PushTask>> = tasks
            .into_iter()
            .map(|task| {
                if let Some(old) = previous
                    .iter()
                    .find(|old| old.username == task.username && old.remote_url == task.remote_url)
                {
                    task.inherit(old);
                }
                Arc::new(task)
            })
            .collect();

        let count = next.len();
        match self.tasks.write() {
            Ok(mut guard) => *guard = Arc::new(next),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(next),
        }
        count
    }

    /// Rebuild the task list from persisted sync settings.
    ///
    /// The store is only held for the duration of the read so that CLI
    /// processes can use it in between.
    pub fn refresh_tasks(&self) -> Result<usize, DaemonError> {
        let configs = {
            let store = MarkideaStore::open_locked_blocking(&self.config.db_path, STORE_LOCK_TIMEOUT)?;
            store.list_sync_configs()?
        };

        let tasks = configs
            .iter()
            .filter_map(|sync| PushTask::from_config(&self.config, sync))
            .collect();
        Ok(self.replace_tasks(tasks))
    }

    /// Push every task once, sequentially.
    ///
    /// Returns `false` without doing anything if another sweep is running.
    pub fn sweep(&self) -> bool {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("previous sweep still running, skipping tick");
            return false;
        }
        let _guard = SweepGuard(&self.sweeping);

        let tasks = self.tasks();
        for task in tasks.iter() {
            let report = self.pusher.push(task);
            if report.success {
                debug!(user = %task.username, remote = %task.remote_url, "push succeeded");
            } else {
                warn!(user = %task.username, remote = %task.remote_url, message = %report.message, "push failed");
            }
            task.record(&report);
        }

        self.sweeps.fetch_add(1, Ordering::AcqRel);
        true
    }
}

impl<P: RemotePusher> RemoteSyncScheduler<P> {
    /// Rebuild the task list on the blocking pool
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || match this.refresh_tasks() {
            Ok(count) => info!(tasks = count, "rebuilt push task list"),
            Err(e) => warn!(error = %e, "failed to rebuild push task list"),
        })
    }

    /// Drive sweeps every period after the initial delay and refresh the
    /// task list every refresh interval. Runs until the future is dropped.
    ///
    /// Sweeps run on the blocking pool and are not awaited; ticks that fire
    /// during a long sweep are absorbed by the sweep guard.
    pub async fn run(self: Arc<Self>) {
        let timing = self.config.sync.clone();
        let mut ticks = tokio::time::interval_at(Instant::now() + timing.initial_delay(), timing.period());
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refresh = tokio::time::interval_at(
            Instant::now() + timing.refresh_interval(),
            timing.refresh_interval(),
        );
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            period_secs = timing.period().as_secs(),
            initial_delay_secs = timing.initial_delay_secs,
            "sync scheduler running"
        );

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    let this = Arc::clone(&self);
                    tokio::task::spawn_blocking(move || {
                        this.sweep();
                    });
                }
                _ = refresh.tick() => {
                    self.spawn_refresh();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakePusher {
        calls: AtomicUsize,
        failing_user: Option<String>,
        gate: Option<(Barrier, Barrier)>,
    }

    impl RemotePusher for Arc<FakePusher> {
        fn push(&self, task: &PushTask) -> SyncReport {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((entered, release)) = &self.gate {
                entered.wait();
                release.wait();
            }
            if self.failing_user.as_deref() == Some(task.username.as_str()) {
                SyncReport::failed("remote rejected")
            } else {
                SyncReport::ok("Push successful")
            }
        }
    }

    fn task(user: &str) -> PushTask {
        PushTask::new(user, format!("/notes/{}", user), "git@example.com:x.git", "/keys/x.prv")
    }

    fn scheduler(pusher: Arc<FakePusher>) -> RemoteSyncScheduler<Arc<FakePusher>> {
        let dir = std::env::temp_dir();
        RemoteSyncScheduler::new(ServiceConfig::with_data_dir(&dir), pusher)
    }

    #[test]
    fn test_sweep_records_status_per_user() {
        let pusher = Arc::new(FakePusher {
            failing_user: Some("bob".into()),
            ..Default::default()
        });
        let sched = scheduler(Arc::clone(&pusher));
        sched.replace_tasks(vec![task("alice"), task("bob"), task("carol")]);

        assert_eq!(sched.status_of("alice"), Some(SyncStatus::Pending));
        assert!(sched.sweep());

        // A failing task does not stop the others
        assert_eq!(pusher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(sched.status_of("alice"), Some(SyncStatus::Succeeded));
        assert_eq!(sched.status_of("bob"), Some(SyncStatus::Failed));
        assert_eq!(sched.status_of("carol"), Some(SyncStatus::Succeeded));
        assert_eq!(sched.status_of("dave"), None);
        assert_eq!(sched.sweeps_completed(), 1);
    }

    #[test]
    fn test_overlapping_tick_does_no_work() {
        let pusher = Arc::new(FakePusher {
            gate: Some((Barrier::new(2), Barrier::new(2))),
            ..Default::default()
        });
        let sched = Arc::new(scheduler(Arc::clone(&pusher)));
        sched.replace_tasks(vec![task("alice")]);

        let running = {
            let sched = Arc::clone(&sched);
            std::thread::spawn(move || sched.sweep())
        };

        let (entered, release) = pusher.gate.as_ref().unwrap();
        entered.wait();

        // First sweep is blocked inside the push
        assert!(!sched.sweep());
        assert_eq!(pusher.calls.load(Ordering::SeqCst), 1);

        release.wait();
        assert!(running.join().unwrap());
        assert_eq!(pusher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sched.sweeps_completed(), 1);
    }

    #[test]
    fn test_replace_keeps_status_of_surviving_tasks() {
        let pusher = Arc::new(FakePusher::default());
        let sched = scheduler(pusher);
        sched.replace_tasks(vec![task("alice"), task("bob")]);
        sched.sweep();

        let mut moved = task("bob");
        moved.remote_url = "git@example.com:new.git".into();
        assert_eq!(sched.replace_tasks(vec![task("alice"), moved]), 2);

        assert_eq!(sched.status_of("alice"), Some(SyncStatus::Succeeded));
        assert_eq!(sched.status_of("bob"), Some(SyncStatus::Pending));
    }

    #[test]
    fn test_sweep_sees_list_swapped_between_sweeps() {
        let pusher = Arc::new(FakePusher::default());
        let sched = scheduler(Arc::clone(&pusher));

        assert!(sched.sweep());
        assert_eq!(pusher.calls.load(Ordering::SeqCst), 0);

        sched.replace_tasks(vec![task("alice")]);
        assert!(sched.sweep());
        assert_eq!(pusher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refresh_builds_tasks_from_store() {
        let dir = tempdir().unwrap();
        let config = ServiceConfig::with_data_dir(dir.path());
        {
            let store = MarkideaStore::open_locked(&config.db_path).unwrap();
            store
                .put_sync_config(&SyncConfig {
                    username: "alice".into(),
                    remote_url: Some("git@example.com:alice.git".into()),
                    push_enabled: true,
                })
                .unwrap();
            store
                .put_sync_config(&SyncConfig {
                    username: "bob".into(),
                    remote_url: Some("git@example.com:bob.git".into()),
                    push_enabled: false,
                })
                .unwrap();
            store
                .put_sync_config(&SyncConfig {
                    username: "carol".into(),
                    remote_url: Some("   ".into()),
                    push_enabled: true,
                })
                .unwrap();
            store.flush().unwrap();
        }

        let sched = RemoteSyncScheduler::new(config.clone(), Arc::new(FakePusher::default()));
        assert_eq!(sched.refresh_tasks().unwrap(), 1);

        let tasks = sched.tasks();
        assert_eq!(tasks[0].username, "alice");
        assert_eq!(tasks[0].local_path, config.user_repo_dir("alice"));
        assert_eq!(tasks[0].private_key_path, config.private_key_path("alice"));

        // The store lock is released after a refresh
        MarkideaStore::open_locked(&config.db_path).unwrap();
    }

    #[test]
    fn test_git_pusher_pushes_user_repository() {
        let dir = tempdir().unwrap();
        let remote_path = dir.path().join("remote.git");
        let mut opts = git2::RepositoryInitOptions::new();
        opts.bare(true).initial_head("master");
        git2::Repository::init_opts(&remote_path, &opts).unwrap();

        let local = dir.path().join("notes").join("alice");
        let repo = NoteRepository::open_or_init(&local).unwrap();

        let task = PushTask::new(
            "alice",
            &local,
            remote_path.to_string_lossy().to_string(),
            dir.path().join("alice.prv"),
        );
        let report = GitPusher.push(&task);
        assert!(report.success, "{}", report.message);

        let remote = git2::Repository::open_bare(&remote_path).unwrap();
        let head = remote.find_reference("refs/heads/master").unwrap().target();
        assert_eq!(head, repo.head().unwrap());

        let missing = PushTask::new("bob", dir.path().join("nope"), "x", "y");
        assert!(!GitPusher.push(&missing).success);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_sweeps_periodically() {
        let pusher = Arc::new(FakePusher::default());
        let mut config = ServiceConfig::with_data_dir(&std::env::temp_dir());
        config.sync.initial_delay_secs = 0;
        config.sync.period_secs = 1;
        let sched = Arc::new(RemoteSyncScheduler::new(config, Arc::clone(&pusher)));
        sched.replace_tasks(vec![task("alice")]);

        let handle = tokio::spawn(Arc::clone(&sched).run());
        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.abort();

        assert!(sched.sweeps_completed() >= 2);
        assert!(pusher.calls.load(Ordering::SeqCst) >= 2);
    }
}
