//! Shutdown on Ctrl+C or SIGTERM

use std::fmt;

use tokio::signal;

use crate::Result;

/// Signal that asked the process to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Ctrl+C / SIGINT
    Interrupt,
    /// SIGTERM, e.g. from systemd
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Wait for the next stop signal
///
/// Handlers are installed on first poll.
///
/// # Errors
///
/// Returns error if a signal handler cannot be installed
pub async fn next_signal() -> Result<Signal> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                Ok(Signal::Interrupt)
            }
            _ = terminate.recv() => Ok(Signal::Terminate),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        Ok(Signal::Interrupt)
    }
}

/// Resolve once the process is asked to stop
///
/// If the handlers cannot be installed the error is logged and this never
/// resolves, leaving the event source to end the process.
pub async fn wait_for_shutdown() {
    match next_signal().await {
        Ok(signal) => tracing::info!(%signal, "stop signal received"),
        Err(e) => {
            tracing::error!(error = %e, "signal handling unavailable");
            std::future::pending::<()>().await;
        }
    }
}
