use std::sync::Arc;

use clap::Subcommand;
use evm_lab::{Gateway, LabConfig};
use tokio::net::TcpListener;
use tracing::info;

use super::router;
use crate::Result;

/// Server actions
#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Start serving the gateway on the configured port
    Start,
}

impl Cmd {
    /// Runs the server action.
    pub async fn run(&self, config: LabConfig) -> Result<()> {
        match self {
            Self::Start => {
                let gateway = Arc::new(Gateway::from_config(&config)?);
                let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
                serve(gateway, listener).await
            }
        }
    }
}

/// Serves `gateway` on `listener` until ctrl-c.
pub async fn serve(gateway: Arc<Gateway>, listener: TcpListener) -> Result<()> {
    info!(addr = %listener.local_addr()?, "Serving");
    axum::serve(listener, router(gateway)).with_graceful_shutdown(shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // without a signal handler the server runs until killed
        std::future::pending::<()>().await;
    }
}
