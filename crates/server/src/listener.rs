//! Binds a router to a socket, with or without TLS, until shutdown.

use std::{net::SocketAddr, time::Duration};

use anyhow::anyhow;
use axum::Router;
use axum_server::{Handle, tls_rustls::RustlsConfig};
use config::TlsServerConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// In-flight requests get this long to finish after shutdown is requested.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) async fn serve_router(
    name: &'static str,
    addr: SocketAddr,
    path: &str,
    tls_config: Option<TlsServerConfig>,
    app: Router,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow!("Failed to bind {name} to {addr}: {e}"))?;

    serve_listener(
        name,
        listener,
        path,
        tls_config,
        app,
        shutdown,
        GRACEFUL_SHUTDOWN_TIMEOUT,
    )
    .await
}

/// Serves `app` until `shutdown` fires, then drains for at most `drain_timeout`.
async fn serve_listener(
    name: &'static str,
    listener: TcpListener,
    path: &str,
    tls_config: Option<TlsServerConfig>,
    app: Router,
    shutdown: CancellationToken,
    drain_timeout: Duration,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    let rustls_config = match tls_config {
        Some(tls) => Some(
            RustlsConfig::from_pem_file(&tls.certificate, &tls.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?,
        ),
        None => None,
    };

    let handle = Handle::new();

    tokio::spawn({
        let handle = handle.clone();

        async move {
            shutdown.cancelled().await;
            handle.graceful_shutdown(Some(drain_timeout));
        }
    });

    let listener = listener.into_std()?;

    match rustls_config {
        Some(rustls_config) => {
            log::info!("{name} available at: https://{local_addr}{path}");

            axum_server::from_tcp_rustls(listener, rustls_config)
                .handle(handle)
                .serve(app)
                .await
                .map_err(|e| anyhow!("Failed to start HTTPS server for {name}: {e}"))?;
        }
        None => {
            log::info!("{name} available at: http://{local_addr}{path}");

            axum_server::from_tcp(listener)
                .handle(handle)
                .serve(app)
                .await
                .map_err(|e| anyhow!("Failed to start HTTP server for {name}: {e}"))?;
        }
    }

    log::debug!("{name} on {local_addr} stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use axum::{Router, routing::get};
    use tokio::{io::AsyncWriteExt, net::TcpListener};
    use tokio_util::sync::CancellationToken;

    use super::serve_listener;

    #[tokio::test]
    async fn slow_requests_do_not_hold_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(40)).await;
                "done"
            }),
        );

        let shutdown = CancellationToken::new();

        let server = tokio::spawn(serve_listener(
            "Slow listener",
            listener,
            "/",
            None,
            app,
            shutdown.clone(),
            Duration::from_millis(200),
        ));

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /slow HTTP/1.1\r\nhost: localhost\r\n\r\n")
            .await
            .unwrap();

        // Let the handler start before shutting down.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("listener kept draining past its timeout")
            .unwrap()
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
