//! Policy directory watcher built on `notify`.
//!
//! Bridges the synchronous `notify` callback into an async channel of
//! normalized [`ChangeEvent`]s. Only writes and removals of recognized
//! policy files are forwarded; everything else is dropped at the source.
//! Dropping the [`ChangeWatcher`] stops the OS watch and closes the channel.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::Result;

/// Normalized filesystem operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Write,
    Remove,
    Other,
}

impl ChangeKind {
    /// Collapse a `notify` event kind into write / remove / other.
    ///
    /// Creation and rename-into count as writes (new content appeared at the
    /// path); rename-away counts as a removal.
    pub fn from_event_kind(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => ChangeKind::Write,
            EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
                ChangeKind::Write
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Remove,
            EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Write,
            EventKind::Remove(_) => ChangeKind::Remove,
            _ => ChangeKind::Other,
        }
    }
}

/// A qualifying mutation of one policy file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Turn one raw `notify` event into the qualifying change events it carries.
pub fn qualifying_events<F>(event: &Event, is_policy_file: &F) -> Vec<ChangeEvent>
where
    F: Fn(&Path) -> bool,
{
    let kind = ChangeKind::from_event_kind(&event.kind);
    if kind == ChangeKind::Other {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| is_policy_file(p))
        .map(|p| ChangeEvent {
            path: p.clone(),
            kind,
        })
        .collect()
}

/// Owns the OS-level watch on the policy directory.
pub struct ChangeWatcher {
    dir: PathBuf,
    watcher: RecommendedWatcher,
    watching: bool,
}

impl ChangeWatcher {
    /// Create the OS watcher without registering any path yet.
    ///
    /// Returns the receiving end of the event stream. Errors reported by the
    /// OS facility while watching are logged and do not end the stream.
    pub fn new<F>(dir: PathBuf, is_policy_file: F) -> Result<(Self, mpsc::UnboundedReceiver<ChangeEvent>)>
    where
        F: Fn(&Path) -> bool + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    for change in qualifying_events(&event, &is_policy_file) {
                        debug!(path = %change.path.display(), kind = ?change.kind, "policy file changed");
                        // Receiver gone means the reload loop has shut down.
                        let _ = tx.send(change);
                    }
                }
                Err(e) => error!(error = %e, "filesystem watcher error"),
            }
        })?;

        Ok((
            Self {
                dir,
                watcher,
                watching: false,
            },
            rx,
        ))
    }

    /// Register the policy directory (non-recursive).
    pub fn watch(&mut self) -> Result<()> {
        self.watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;
        self.watching = true;
        info!(path = %self.dir.display(), "watching policy directory for changes");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        if self.watching {
            if let Err(e) = self.watcher.unwatch(&self.dir) {
                debug!(path = %self.dir.display(), error = %e, "unwatch failed");
            }
            info!(path = %self.dir.display(), "stopped watching policy directory");
        }
    }
}
