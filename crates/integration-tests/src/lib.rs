//! Runs the Tollgate listeners in-process on free local ports.

use std::net::{SocketAddr, TcpListener};
use std::sync::Once;
use std::time::Duration;

use config::Config;
use server::ServeConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

static INIT: Once = Once::new();

fn init_crypto_provider() {
    INIT.call_once(|| {
        rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .expect("Failed to install default crypto provider");
    });
}

fn free_address() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap()
}

/// Test client for making HTTP requests to one listener
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    fn new(scheme: &str, address: SocketAddr) -> Self {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .expect("Failed to create client with invalid cert acceptance");

        Self {
            base_url: format!("{scheme}://{address}"),
            client,
        }
    }

    /// The URL of the listener, without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.request(reqwest::Method::GET, path).send().await.unwrap()
    }

    /// Start a request to the given path, to add headers or a body before sending
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }
}

/// Test server that manages the lifecycle of a server instance
pub struct TestServer {
    /// Client for the rate limited site.
    pub client: TestClient,
    /// Client for the fallback listener, when enabled.
    pub fallback: Option<TestClient>,
    /// Client for the dedicated health listener, when configured.
    pub health: Option<TestClient>,
    shutdown: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    /// Start a new test server with the given TOML configuration.
    ///
    /// Every listener is moved to a free port on 127.0.0.1.
    pub async fn start(config_toml: &str) -> Self {
        init_crypto_provider();

        let mut config: Config = toml::from_str(config_toml).unwrap();

        config.server.site.listen_address = free_address();

        if config.server.fallback.enabled {
            config.server.fallback.listen_address = free_address();
        }

        if config.server.health.listen.is_some() {
            config.server.health.listen = Some(free_address());
        }

        config.validate().unwrap();

        let client = TestClient::new(config.server.site.scheme(), config.server.site.listen_address);

        let fallback = config
            .server
            .fallback
            .enabled
            .then(|| TestClient::new("http", config.server.fallback.listen_address));

        let health = config
            .server
            .health
            .listen
            .map(|address| TestClient::new(config.server.site.scheme(), address));

        let mut addresses = vec![config.server.site.listen_address];
        addresses.extend(fallback.is_some().then_some(config.server.fallback.listen_address));
        addresses.extend(config.server.health.listen);

        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(server::serve(ServeConfig {
            config,
            shutdown: shutdown.clone(),
        }));

        let mut server = TestServer {
            client,
            fallback,
            health,
            shutdown,
            handle,
        };

        for address in addresses {
            server.wait_for(address).await.unwrap();
        }

        server
    }

    async fn wait_for(&mut self, address: SocketAddr) -> anyhow::Result<()> {
        for _ in 0..100 {
            if self.handle.is_finished() {
                (&mut self.handle).await??;
                anyhow::bail!("Server stopped during startup");
            }

            if tokio::net::TcpStream::connect(address).await.is_ok() {
                return Ok(());
            }

            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        anyhow::bail!("Nothing is listening on {address}")
    }

    /// Request a graceful shutdown and wait for every listener to stop.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        (&mut self.handle).await?
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
