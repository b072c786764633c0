//! Translating OS termination signals into a single graceful shutdown request.

use std::{
    fmt,
    future::{self, Future},
    io,
    sync::Arc,
};

use tokio::sync::watch;

/// Reason for shutting down the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ShutdownReason {
    /// Interrupt signal (`SIGINT` / Ctrl+C).
    Interrupt,
    /// `SIGTERM`.
    Terminate,
    /// `SIGQUIT`.
    Quit,
    /// Shutdown requested programmatically.
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Quit => "SIGQUIT",
            Self::Requested => "shutdown request",
        })
    }
}

/// Cloneable handle coordinating a one-time graceful shutdown.
///
/// The first [`request()`](Self::request()) wins; subsequent requests are ignored, so repeated
/// signals never trigger shutdown twice.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    sender: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    /// Creates a coordinator with no shutdown requested.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Requests shutdown. Returns `true` if this call initiated shutdown, and `false`
    /// if shutdown was already requested before.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        self.sender.send_if_modified(|current| {
            if current.is_some() {
                false
            } else {
                *current = Some(reason);
                true
            }
        })
    }

    /// Returns the reason shutdown was requested with, if any.
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.sender.borrow()
    }

    /// Returns a future resolving once shutdown is requested. The future doesn't borrow
    /// the coordinator and can be passed to [`MetricsExporter::with_graceful_shutdown()`].
    ///
    /// If all coordinators are dropped without a request, the future never resolves.
    ///
    /// [`MetricsExporter::with_graceful_shutdown()`]: crate::MetricsExporter::with_graceful_shutdown()
    pub fn stopped(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            while receiver.borrow_and_update().is_none() {
                if receiver.changed().await.is_err() {
                    future::pending::<()>().await;
                }
            }
        }
    }

    /// Subscribes to termination signals and returns a future listening to them until
    /// the process exits. The first signal requests shutdown; later ones are logged and ignored.
    ///
    /// Signals are handled from the moment this method returns, even if the returned future
    /// is not polled yet. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if subscribing to signals fails.
    pub fn listen_for_signals(self) -> io::Result<impl Future<Output = ()> + Send + 'static> {
        let mut signals = Signals::new()?;
        Ok(async move {
            loop {
                let reason = signals.recv().await;
                if self.request(reason) {
                    tracing::info!(signal = %reason, "Shutting down exporter, received signal {reason}");
                } else {
                    tracing::warn!(
                        signal = %reason,
                        "Received signal {reason} while already shutting down; ignoring"
                    );
                }
            }
        })
    }
}

#[cfg(unix)]
struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn new() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    async fn recv(&mut self) -> ShutdownReason {
        tokio::select! {
            _ = self.interrupt.recv() => ShutdownReason::Interrupt,
            _ = self.terminate.recv() => ShutdownReason::Terminate,
            _ = self.quit.recv() => ShutdownReason::Quit,
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    #[allow(clippy::unnecessary_wraps)]
    fn new() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> ShutdownReason {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "Failed listening to Ctrl+C");
            std::future::pending::<()>().await;
        }
        ShutdownReason::Interrupt
    }
}
