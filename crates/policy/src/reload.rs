//! Policy reload: load off to the side, then swap.
//!
//! The loader runs without touching the store; only the final pointer swap
//! does. A failed load leaves the last-known-good snapshot in place.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::debounce::Debouncer;
use crate::error::Result;
use crate::loader::PolicyLoader;
use crate::snapshot::PolicySnapshot;
use crate::store::PolicyStore;
use crate::watcher::ChangeEvent;

/// Reloads one policy directory into one store.
#[derive(Clone)]
pub struct Reloader {
    store: Arc<PolicyStore>,
    loader: Arc<dyn PolicyLoader>,
    dir: PathBuf,
}

impl Reloader {
    pub fn new(store: Arc<PolicyStore>, loader: Arc<dyn PolicyLoader>, dir: PathBuf) -> Self {
        Self { store, loader, dir }
    }

    /// Load the directory and, on success, make it the active snapshot.
    pub fn reload_now(&self) -> Result<Arc<PolicySnapshot>> {
        match self.loader.load(&self.dir) {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.store.swap(Arc::clone(&snapshot));
                info!(
                    path = %self.dir.display(),
                    policies = snapshot.policies().len(),
                    loaded_at = ?snapshot.loaded_at(),
                    generation = self.store.generation(),
                    "policy snapshot activated"
                );
                Ok(snapshot)
            }
            Err(e) => {
                warn!(
                    path = %self.dir.display(),
                    error = %e,
                    "failed to load policies, keeping previous snapshot"
                );
                Err(e)
            }
        }
    }

    /// Reload once per debounced burst until the event source closes.
    ///
    /// Returns the number of reloads attempted.
    pub async fn run(self, mut debouncer: Debouncer<ChangeEvent>) -> u64 {
        debug!(
            path = %self.dir.display(),
            quiet_ms = debouncer.quiet_period().as_millis() as u64,
            "policy reload loop started"
        );
        let mut attempts = 0;
        while let Some(burst) = debouncer.next_burst().await {
            attempts += 1;
            info!(
                path = %self.dir.display(),
                events = burst.count,
                last = %burst.last.path.display(),
                kind = ?burst.last.kind,
                "policy directory changed, reloading"
            );
            // Errors are logged inside; the old snapshot stays active.
            let _ = self.reload_now();
        }
        info!(path = %self.dir.display(), "policy reload loop stopped");
        attempts
    }
}
