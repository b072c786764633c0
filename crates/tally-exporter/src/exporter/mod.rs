//! `MetricsExporter` and closely related types.

use std::{
    convert::Infallible,
    fmt,
    future::{self, Future},
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

use hyper::{
    header::{self, HeaderValue},
    server::conn::http1,
    service::service_fn,
    Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use tally::{Format, Registry};
use tokio::{
    io,
    net::{TcpListener, TcpStream},
    sync::watch,
    task::{JoinError, JoinSet},
};

use crate::metrics::EXPORTER_METRICS;


const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

fn response(status: StatusCode, content_type: &'static str, body: String) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&#39;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[derive(Clone)]
struct MetricsExporterInner {
    registry: Arc<Registry>,
    format: Format,
    metrics_path: Arc<str>,
}

impl MetricsExporterInner {
    async fn handle(&self, path: &str) -> Response<String> {
        if path == &*self.metrics_path {
            self.render().await
        } else {
            self.render_index()
        }
    }

    /// Returns `None` if collection failed at the task level.
    async fn render_body(&self) -> Option<String> {
        let started_at = Instant::now();
        let registry = Arc::clone(&self.registry);
        let format = self.format;
        // `Registry::encode()` is blocking in the general case: collectors may query
        // their data sources using blocking I/O.
        let encoded = tokio::task::spawn_blocking(move || {
            let mut buffer = String::with_capacity(1_024);
            registry.encode(&mut buffer, format).map(|()| buffer)
        })
        .await;

        let buffer = match encoded {
            Ok(Ok(buffer)) => buffer,
            Ok(Err(fmt::Error)) => {
                tracing::error!("Failed encoding metrics");
                return None;
            }
            Err(err) => {
                Self::report_collection_failure(&err);
                return None;
            }
        };

        let latency = started_at.elapsed();
        let scraped_size = buffer.len();
        EXPORTER_METRICS.observe_scrape(latency, scraped_size);
        tracing::debug!(
            latency_sec = latency.as_secs_f64(),
            scraped_size,
            "Scraped metrics in {latency:?} (scraped size: {scraped_size}B)"
        );
        Some(buffer)
    }

    fn report_collection_failure(err: &JoinError) {
        if err.is_panic() {
            tracing::error!(%err, "Metrics collection task panicked");
        } else {
            tracing::error!(%err, "Metrics collection task was cancelled");
        }
    }

    async fn render(&self) -> Response<String> {
        match self.render_body().await {
            Some(body) => response(StatusCode::OK, self.format.content_type(), body),
            None => response(
                StatusCode::INTERNAL_SERVER_ERROR,
                TEXT_CONTENT_TYPE,
                "Failed collecting metrics\n".to_owned(),
            ),
        }
    }

    fn render_index(&self) -> Response<String> {
        let metrics_path = escape_html(&self.metrics_path);
        let body = format!(
            "<html>\n\
             <head><title>Tally Exporter</title></head>\n\
             <body>\n\
             <h1>Tally Exporter</h1>\n\
             <p><a href='{metrics_path}'>Metrics</a></p>\n\
             </body>\n\
             </html>\n"
        );
        response(StatusCode::OK, HTML_CONTENT_TYPE, body)
    }

    async fn serve_connection(self, stream: TcpStream, mut started_shutdown: watch::Receiver<()>) {
        let io = TokioIo::new(stream);
        let inner = &self;
        let conn = http1::Builder::new().serve_connection(
            io,
            service_fn(move |req| async move {
                Ok::<_, Infallible>(inner.handle(req.uri().path()).await)
            }),
        );
        tokio::pin!(conn);

        let res = tokio::select! {
            _ = started_shutdown.changed() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
            res = conn.as_mut() => res,
        };
        if let Err(err) = res {
            tracing::warn!(%err, "Error serving connection");
        }
    }
}

/// Lifecycle state of a [`MetricsServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServerState {
    /// Server is bound, but not started yet.
    Created,
    /// Server accepts connections.
    Listening,
    /// Shutdown was requested; new connections are not accepted, and open connections
    /// finish their in-flight requests.
    Draining,
    /// Server has stopped.
    Stopped,
}

/// Error running a [`MetricsServer`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServerError {
    /// Failed accepting a TCP connection.
    #[error("failed accepting connection")]
    Accept(#[source] io::Error),
    /// Open connections didn't finish in time during graceful shutdown and were aborted.
    #[error("graceful drain timed out after {timeout:?}; aborted {aborted} connection(s)")]
    DrainTimedOut {
        /// Drain deadline.
        timeout: Duration,
        /// Number of aborted connections.
        aborted: usize,
    },
}

/// Metrics exporter serving a [`Registry`] over HTTP.
///
/// # Examples
///
/// ```no_run
/// use std::{net::Ipv4Addr, sync::Arc};
/// use tally::{Format, Registry};
/// use tally_exporter::{ExampleCollector, MetricsExporter, ShutdownCoordinator};
///
/// # async fn test() -> anyhow::Result<()> {
/// let mut registry = Registry::empty();
/// registry.register(ExampleCollector::default())?;
///
/// let shutdown = ShutdownCoordinator::new();
/// tokio::spawn(shutdown.clone().listen_for_signals()?);
/// let server = MetricsExporter::new(Arc::new(registry))
///     .with_format(Format::OpenMetricsForPrometheus)
///     .with_graceful_shutdown(shutdown.stopped())
///     .bind((Ipv4Addr::UNSPECIFIED, 9100).into())
///     .await?;
/// server.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct MetricsExporter<'a> {
    inner: MetricsExporterInner,
    drain_timeout: Duration,
    shutdown_future: Pin<Box<dyn Future<Output = ()> + Send + 'a>>,
}

impl fmt::Debug for MetricsExporter<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MetricsExporter")
            .field("registry", &self.inner.registry)
            .field("format", &self.inner.format)
            .field("metrics_path", &self.inner.metrics_path)
            .field("drain_timeout", &self.drain_timeout)
            .finish_non_exhaustive()
    }
}

impl<'a> MetricsExporter<'a> {
    /// Default path serving metrics.
    pub const DEFAULT_METRICS_PATH: &'static str = "/metrics";
    /// Default deadline for draining open connections on shutdown.
    pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates an exporter based on the provided metrics [`Registry`]. The registry is
    /// in an `Arc`, so it can be shared with other consumers.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::log_metrics_stats(&registry);
        Self {
            inner: MetricsExporterInner {
                registry,
                format: Format::Prometheus,
                metrics_path: Self::DEFAULT_METRICS_PATH.into(),
            },
            drain_timeout: Self::DEFAULT_DRAIN_TIMEOUT,
            shutdown_future: Box::pin(future::pending()),
        }
    }

    fn log_metrics_stats(registry: &Registry) {
        const SAMPLED_METRIC_COUNT: usize = 5;

        let descriptors = registry.descriptors();
        let metric_count = descriptors.len();
        let collector_count = registry.collector_count();
        let mut metrics: Vec<_> = descriptors
            .iter()
            .take(SAMPLED_METRIC_COUNT)
            .map(|descriptor| descriptor.full_name())
            .collect();
        if metric_count > SAMPLED_METRIC_COUNT {
            metrics.push("...".into());
        }
        let metrics = metrics.join(", ");

        tracing::info!(
            "Created metrics exporter with {metric_count} metrics from {collector_count} collectors: {metrics}"
        );
    }

    /// Sets the export [`Format`]. By default, [`Format::Prometheus`] is used.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.inner.format = format;
        self
    }

    /// Sets the path serving metrics; `/metrics` by default. All other paths serve
    /// an index page linking to the metrics path.
    #[must_use]
    pub fn with_metrics_path(mut self, path: &str) -> Self {
        self.inner.metrics_path = path.into();
        self
    }

    /// Sets the deadline for draining open connections after shutdown is requested.
    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Configures graceful shutdown for the exporter server.
    #[must_use]
    pub fn with_graceful_shutdown<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()> + Send + 'a,
    {
        self.shutdown_future = Box::pin(shutdown);
        self
    }

    /// Creates an HTTP exporter server and binds it to the specified address.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the specified address fails.
    pub async fn bind(self, bind_address: SocketAddr) -> io::Result<MetricsServer<'a>> {
        let listener = TcpListener::bind(bind_address).await?;
        let local_addr = listener.local_addr()?;
        let (state_sender, state) = watch::channel(ServerState::Created);

        let server = async move {
            state_sender.send_replace(ServerState::Listening);
            tracing::info!("Metrics exporter server is listening on {local_addr}");
            let result = self.serve(listener, &state_sender).await;
            state_sender.send_replace(ServerState::Stopped);
            result
        };

        Ok(MetricsServer {
            server: Box::pin(server),
            local_addr,
            state,
        })
    }

    async fn serve(
        mut self,
        listener: TcpListener,
        state_sender: &watch::Sender<ServerState>,
    ) -> Result<(), ServerError> {
        let (started_shutdown_sender, started_shutdown) = watch::channel(());
        let mut connections = JoinSet::new();
        loop {
            let stream = tokio::select! {
                res = listener.accept() => res.map_err(ServerError::Accept)?.0,
                () = &mut self.shutdown_future => break,
                Some(res) = connections.join_next() => {
                    Self::report_connection_result(res);
                    continue;
                }
            };
            let inner = self.inner.clone();
            connections.spawn(inner.serve_connection(stream, started_shutdown.clone()));
        }

        tracing::info!("Stop signal received, metrics exporter is shutting down");
        state_sender.send_replace(ServerState::Draining);
        drop(listener);
        // Send the graceful shutdown signal to all alive connections.
        drop(started_shutdown);
        started_shutdown_sender.send_replace(());

        let drain = async {
            while let Some(res) = connections.join_next().await {
                Self::report_connection_result(res);
            }
        };
        if tokio::time::timeout(self.drain_timeout, drain).await.is_err() {
            let aborted = connections.len();
            connections.shutdown().await;
            return Err(ServerError::DrainTimedOut {
                timeout: self.drain_timeout,
                aborted,
            });
        }
        tracing::info!("Metrics exporter server shut down");
        Ok(())
    }

    fn report_connection_result(res: Result<(), JoinError>) {
        if let Err(err) = res {
            if err.is_panic() {
                tracing::error!(%err, "Connection task panicked");
            }
        }
    }
}

/// Metrics server bound to a certain local address returned by [`MetricsExporter::bind()`].
///
/// Useful e.g. if you need to find out which port the server was bound to if the 0th port was specified.
#[must_use = "Server should be `start()`ed"]
pub struct MetricsServer<'a> {
    server: Pin<Box<dyn Future<Output = Result<(), ServerError>> + Send + 'a>>,
    local_addr: SocketAddr,
    state: watch::Receiver<ServerState>,
}

impl fmt::Debug for MetricsServer<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MetricsServer")
            .field("local_addr", &self.local_addr)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl MetricsServer<'_> {
    /// Returns the local address this server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a receiver of the server [state](ServerState) updates. The receiver remains
    /// valid after the server is started.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.clone()
    }

    /// Starts this server. Resolves once the server is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting connections fails, or if open connections were not drained
    /// within the deadline during shutdown. In the latter case, the server is still stopped.
    pub async fn start(self) -> Result<(), ServerError> {
        self.server.await
    }
}
