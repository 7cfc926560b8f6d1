//! Lifecycle coordinator: startup ordering, supervision and shutdown.
//!
//! ```text
//! Init ──(policy dir exists)──► StartingWatch ──► Running ──► ShuttingDown ──► Stopped
//!   └──────────(dir absent: no hot-reload)───────────┘
//! ```
//!
//! While `Running`, the reload task and the decision server proceed on their
//! own tasks; the coordinator only waits for the termination request.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dpe_policy::debounce::Debouncer;
use dpe_policy::reload::Reloader;
use dpe_policy::watcher::ChangeWatcher;
use dpe_policy::{PolicyLoader, PolicyStore, YamlPolicyLoader};

use crate::bootstrap::{check_policy_dir, PolicyDirStatus};
use crate::config::ServiceConfig;
use crate::server::{DecisionServer, ServerHandle};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    StartingWatch,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Init => write!(f, "INIT"),
            LifecycleState::StartingWatch => write!(f, "STARTING_WATCH"),
            LifecycleState::Running => write!(f, "RUNNING"),
            LifecycleState::ShuttingDown => write!(f, "SHUTTING_DOWN"),
            LifecycleState::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// The OS watch plus the reload task consuming it.
///
/// Released exactly once, either explicitly or on drop.
pub struct WatchHandle {
    watcher: Option<ChangeWatcher>,
    task: Option<JoinHandle<u64>>,
}

impl WatchHandle {
    /// Stop watching and end the reload task. Returns `false` if the handle
    /// was already released.
    pub fn release(&mut self) -> bool {
        let watcher = self.watcher.take();
        let task = self.task.take();
        if watcher.is_none() && task.is_none() {
            return false;
        }
        // Dropping the watcher closes the event stream.
        drop(watcher);
        if let Some(task) = task {
            task.abort();
        }
        true
    }

    pub fn is_released(&self) -> bool {
        self.watcher.is_none() && self.task.is_none()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct Coordinator {
    config: ServiceConfig,
    loader: Arc<dyn PolicyLoader>,
    store: Arc<PolicyStore>,
    state: LifecycleState,
    watch: Option<WatchHandle>,
    server: Option<ServerHandle>,
}

impl Coordinator {
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_loader(config, Arc::new(YamlPolicyLoader::new()))
    }

    pub fn with_loader(config: ServiceConfig, loader: Arc<dyn PolicyLoader>) -> Self {
        Self {
            config,
            loader,
            store: Arc::new(PolicyStore::new()),
            state: LifecycleState::Init,
            watch: None,
            server: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn store(&self) -> Arc<PolicyStore> {
        Arc::clone(&self.store)
    }

    pub fn is_watching(&self) -> bool {
        self.watch.as_ref().is_some_and(|w| !w.is_released())
    }

    /// Run the startup sequence up to `Running`.
    ///
    /// Any error is fatal: whatever was started is torn down before returning.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.state != LifecycleState::Init {
            bail!("coordinator cannot start from state {}", self.state);
        }

        match check_policy_dir(&self.config.policy_dir, self.config.require_policy_dir)? {
            PolicyDirStatus::Present => {
                self.transition(LifecycleState::StartingWatch);
                self.watch = Some(self.start_watch()?);
            }
            PolicyDirStatus::Missing => warn!(
                path = %self.config.policy_dir.display(),
                "serving without policy hot-reload"
            ),
        }

        let state = Arc::new(AppState::new(self.store(), self.config.debug_acl));
        let server = match DecisionServer::bind(&self.config.socket_path, state) {
            Ok(server) => server,
            Err(e) => {
                if let Some(mut watch) = self.watch.take() {
                    watch.release();
                }
                return Err(e);
            }
        };
        self.server = Some(server.spawn());

        self.transition(LifecycleState::Running);
        Ok(())
    }

    /// Create the watcher, load once, register the directory and spawn the
    /// watch → debounce → reload task.
    fn start_watch(&self) -> anyhow::Result<WatchHandle> {
        let dir = self.config.policy_dir.clone();

        let loader = Arc::clone(&self.loader);
        let (mut watcher, events) = ChangeWatcher::new(dir.clone(), move |path| loader.is_policy_file(path))
            .context("failed to create policy directory watcher")?;

        let reloader = Reloader::new(self.store(), Arc::clone(&self.loader), dir.clone());
        if reloader.reload_now().is_err() {
            warn!(
                path = %dir.display(),
                "initial policy load failed, all requests are denied until a valid policy is written"
            );
        }

        watcher
            .watch()
            .with_context(|| format!("failed to watch policy directory {}", watcher.dir().display()))?;

        let task = tokio::spawn(reloader.run(Debouncer::new(events, self.config.debounce)));
        Ok(WatchHandle {
            watcher: Some(watcher),
            task: Some(task),
        })
    }

    /// Release the watcher and stop the decision server. Calling this again
    /// after the first time does nothing.
    pub async fn shutdown(&mut self) {
        if matches!(self.state, LifecycleState::ShuttingDown | LifecycleState::Stopped) {
            debug!(state = %self.state, "shutdown already requested");
            return;
        }
        self.transition(LifecycleState::ShuttingDown);

        if let Some(mut watch) = self.watch.take() {
            watch.release();
        }
        if let Some(server) = self.server.take() {
            server.stop(self.config.drain_timeout).await;
        }

        self.transition(LifecycleState::Stopped);
    }

    /// Start, wait for `termination`, then shut down.
    pub async fn run_until<F, S>(&mut self, termination: F) -> anyhow::Result<()>
    where
        F: Future<Output = S>,
        S: fmt::Display,
    {
        self.start().await?;
        let reason = termination.await;
        info!(signal = %reason, "processing termination request");
        self.shutdown().await;
        Ok(())
    }

    fn transition(&mut self, next: LifecycleState) {
        info!(from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
    }
}
