//! Operator termination requests (SIGINT / SIGTERM).
//!
//! Unix only, like the rest of the service.

use tokio::signal::unix::{signal, Signal, SignalKind};

/// Registered SIGINT and SIGTERM streams.
///
/// Registration happens up front so that failing to install the handlers is
/// a startup error rather than something discovered at shutdown.
pub struct TerminationSignal {
    sigint: Signal,
    sigterm: Signal,
}

impl TerminationSignal {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the first SIGINT or SIGTERM and name it.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }
}
