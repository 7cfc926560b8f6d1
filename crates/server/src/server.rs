//! Decision server: the plugin router served on a Unix socket.
//!
//! Binding happens synchronously during startup so that a socket failure is
//! fatal before the service reports itself running. Each accepted connection
//! is served on its own task owned by the accept loop; a panicking request
//! only takes its own connection down, and aborting the accept loop abandons
//! every connection still open.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::Request;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tower::Service;
use tracing::{debug, error, info, warn};

use crate::router::build_router;
use crate::state::AppState;

const SOCKET_MODE: u32 = 0o660;

/// Pause after a failed accept so a persistent error (EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A bound but not yet serving listener.
pub struct DecisionServer {
    listener: UnixListener,
    socket_path: PathBuf,
    router: Router,
}

impl DecisionServer {
    /// Bind the plugin socket, replacing a stale socket file left by a
    /// previous run.
    pub fn bind(socket_path: &Path, state: Arc<AppState>) -> anyhow::Result<Self> {
        if let Some(parent) = socket_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create socket directory {}", parent.display()))?;
        }
        match fs::remove_file(socket_path) {
            Ok(()) => debug!(path = %socket_path.display(), "removed stale socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to remove stale socket {}", socket_path.display()))
            }
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("failed to bind plugin socket {}", socket_path.display()))?;
        set_socket_mode(socket_path)?;
        info!(path = %socket_path.display(), "listening on plugin socket");

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            router: build_router(state),
        })
    }

    /// Start the accept loop on a background task.
    pub fn spawn(self) -> ServerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(self.listener, self.router, shutdown_rx));

        ServerHandle {
            task,
            shutdown_tx,
            socket_path: self.socket_path,
        }
    }
}

/// Accept until shutdown is requested, then close the listener and wait for
/// open connections to finish.
async fn accept_loop(listener: UnixListener, router: Router, mut shutdown_rx: watch::Receiver<bool>) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    connections.spawn(serve_connection(stream, router.clone(), shutdown_rx.clone()));
                }
                Err(e) => {
                    warn!(error = %e, "failed to accept plugin connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    error!(error = %e, "plugin connection task failed");
                }
            }
            _ = shutdown_requested(&mut shutdown_rx) => break,
        }
    }

    drop(listener);
    debug!(open = connections.len(), "stopped accepting, draining connections");
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "plugin connection task failed");
        }
    }
    info!("decision server stopped");
}

/// Serve one HTTP/1.1 connection. On shutdown the request in progress is
/// completed and the connection is then closed.
async fn serve_connection(stream: UnixStream, router: Router, mut shutdown_rx: watch::Receiver<bool>) {
    let service = hyper::service::service_fn(move |request: Request<Incoming>| router.clone().call(request));
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown_requested(&mut shutdown_rx) => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        debug!(error = %e, "plugin connection closed with error");
    }
}

/// Resolve once shutdown is signalled or the handle is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

fn set_socket_mode(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(SOCKET_MODE))
        .with_context(|| format!("failed to set permissions on {}", path.display()))
}

/// Running accept loop.
pub struct ServerHandle {
    task: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    socket_path: PathBuf,
}

impl ServerHandle {
    /// Stop serving.
    ///
    /// With a zero `drain` the task is aborted and in-flight requests are
    /// abandoned. Otherwise the listener stops accepting and in-flight
    /// requests get up to `drain` to finish before the task is aborted.
    pub async fn stop(mut self, drain: Duration) {
        if drain.is_zero() {
            self.task.abort();
            let _ = (&mut self.task).await;
        } else {
            let _ = self.shutdown_tx.send(true);
            match tokio::time::timeout(drain, &mut self.task).await {
                Ok(_) => info!("in-flight requests drained"),
                Err(_) => {
                    warn!(timeout_secs = drain.as_secs_f64(), "drain timed out, abandoning in-flight requests");
                    self.task.abort();
                    let _ = (&mut self.task).await;
                }
            }
        }

        match fs::remove_file(&self.socket_path) {
            Ok(()) => debug!(path = %self.socket_path.display(), "removed plugin socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.socket_path.display(), error = %e, "failed to remove plugin socket"),
        }
    }
}
