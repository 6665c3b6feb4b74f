use args::Args;
use clap::Parser;
use config::Config;
use server::ServeConfig;
use tokio_util::sync::CancellationToken;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(&args);

    let config = match args.config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };

    if rustls::crypto::aws_lc_rs::default_provider().install_default().is_err() {
        log::debug!("A rustls crypto provider was already installed");
    }

    let telemetry = telemetry::init(&config.telemetry).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    if let Err(e) = server::serve(serve_config(&args, config, shutdown)).await {
        log::error!("Server failed: {e:#}");
        drop(telemetry);
        std::process::exit(1);
    }

    log::info!("Tollgate stopped");

    Ok(())
}

fn serve_config(args: &Args, mut config: Config, shutdown: CancellationToken) -> ServeConfig {
    if let Some(listen_address) = args.listen_address {
        config.server.site.listen_address = listen_address;
    }

    ServeConfig { config, shutdown }
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM.
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received SIGINT"),
        _ = terminate => log::info!("Received SIGTERM"),
    }

    log::info!("Shutting down gracefully, draining in-flight requests");
    shutdown.cancel();
}
