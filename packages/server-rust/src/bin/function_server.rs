//! Function server binary: resolves one handler and serves it over HTTP.

use anyhow::Context;
use clap::Parser;
use fnserver::builtin::example_registry;
use fnserver::{observability, NetworkModule, ServerArgs};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    observability::init(args.log_format)?;

    let registry = example_registry()?;
    let handler = registry
        .resolve(&args.handler)
        .with_context(|| format!("failed to load handler `{}`", args.handler))?;
    info!(handler = %args.handler, "Handler resolved");

    let mut module = NetworkModule::new(args.network_config(), handler);
    let port = module.start().await?;
    info!(port, "Function server listening");

    module.serve(shutdown_signal()).await
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("SIGINT received"),
        () = terminate => info!("SIGTERM received"),
    }
}
