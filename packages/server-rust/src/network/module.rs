//! HTTP server lifecycle: construct, bind, serve, drain.
//!
//! `new()` allocates shared state, `start()` binds the TCP listener and
//! `serve()` accepts connections until shutdown. The health monitor and the
//! shutdown controller can be handed out between `start()` and `serve()`.

use std::future::{Future, IntoFuture};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{healthz_handler, invoke_handler, AppState};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::health::HealthMonitor;
use crate::invoke::Handler;

/// Manages the HTTP server lifecycle for one resolved handler.
///
/// 1. `new()` -- allocates shared state (executor, health, shutdown)
/// 2. `start()` -- binds the TCP listener to the configured address
/// 3. `serve()` -- accepts connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    state: AppState,
}

impl NetworkModule {
    /// Wires `handler` into fresh shared state. Nothing is bound yet.
    #[must_use]
    pub fn new(config: NetworkConfig, handler: Arc<dyn Handler>) -> Self {
        let shutdown = Arc::new(ShutdownController::new());
        Self {
            config,
            listener: None,
            state: AppState::new(handler, shutdown),
        }
    }

    /// Returns the liveness flag shared with the executor.
    #[must_use]
    pub fn health(&self) -> Arc<HealthMonitor> {
        Arc::clone(&self.state.health)
    }

    /// The controller the serve loop triggers when the stop signal fires.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    /// Builds the router: two routes plus the transport middleware.
    ///
    /// Routes:
    /// - `GET /healthz` -- liveness, `{}` with 200 or 503
    /// - anything else -- invocation; the body is the request envelope
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/healthz", get(healthz_handler))
            .fallback(invoke_handler)
            .layer(DefaultBodyLimit::disable())
            .layer(build_http_layers(&self.config))
            .with_state(self.state.clone())
    }

    /// Binds `host:port` and keeps the listener for `serve()`.
    ///
    /// Returns the actual bound port, which differs from the configured port
    /// when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or already in use.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "Listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves, then drains.
    ///
    /// Once the signal fires the controller is triggered, the invocation gate
    /// closes (queued requests get a 503 envelope), new connections are
    /// refused and open ones are allowed to finish for up to
    /// `drain_timeout`. Invocations still running after that are abandoned.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = self.build_router();
        let controller = Arc::clone(&self.state.shutdown);
        let drain_timeout = self.config.drain_timeout;

        let stop_controller = Arc::clone(&controller);
        let gate = Arc::clone(&self.state.gate);
        let server = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Shutdown signal received, draining");
                stop_controller.trigger_shutdown();
                gate.close();
            })
            .into_future();
        tokio::pin!(server);

        let mut stopping = controller.shutdown_receiver();
        tokio::select! {
            result = &mut server => {
                result?;
                info!("Server stopped");
                return Ok(());
            }
            () = async {
                let _ = stopping.wait_for(|stopping| *stopping).await;
            } => {}
        }

        match tokio::time::timeout(drain_timeout, server).await {
            Ok(result) => {
                result?;
                info!("Server stopped");
            }
            Err(_) => warn!(
                in_flight = controller.in_flight(),
                "Drain timeout expired with in-flight invocations remaining"
            ),
        }
        Ok(())
    }
}
