use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use vip_server::server::{
    config::{CliArgs, ServerConfig},
    lifecycle::GrpcServer,
    resolver::StaticResolver,
    telemetry::init_telemetry,
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry(config.log_format)?;
    log_startup_info(&config);

    let resolver = Arc::new(StaticResolver::new(config.vip_ids.iter().cloned()));
    if resolver.is_empty() {
        tracing::warn!("No VIP identifiers configured, every lookup will answer false");
    }

    let handle = match GrpcServer::new(config, resolver).start(None).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("failed to listen: {e}");
            providers.shutdown();
            return Err(e.into());
        }
    };

    let shutdown = handle.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, terminating gracefully...");
        shutdown.cancel();
    });

    let result = handle.wait().await;
    providers.shutdown();
    Ok(result?)
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting VIP service on {} with full config: {:#?}",
            config.listen_addr(),
            config
        );
    } else {
        tracing::info!(
            "Starting VIP service on {} ({} VIPs, health check every {:?})",
            config.listen_addr(),
            config.vip_ids.len(),
            config.health_check_interval
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
