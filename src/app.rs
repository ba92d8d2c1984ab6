use crate::config::Config;
use crate::server::HttpServer;
use crate::state::Models;

use std::error::Error;
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let models = match Models::load(&config.models) {
        Ok(models) => models,
        Err(e) => {
            tracing::error!("Failed to load models: {}", e);
            return Err(Box::new(e));
        }
    };

    let server = HttpServer::new(models, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let mut server_handle = server.run(shutdown_tx.subscribe()).await?;

    tokio::select! {
        result = &mut server_handle => {
            tracing::error!("Server stopped unexpectedly");
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, starting graceful shutdown.");
        }
    }

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
