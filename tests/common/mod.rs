//! Test infrastructure for end-to-end gateway tests.

use cancela::{Config, FixedResolver, GatewayServer, MacResolver, SessionStore};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// MAC every test client (127.0.0.1) resolves to by default.
pub const TEST_MAC: &str = "aa:bb:cc:dd:ee:ff";

/// A gateway bound to an ephemeral port with audit streams in a
/// tempdir and a fixed MAC resolver.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub connections_log: PathBuf,
    pub acceptances_log: PathBuf,
    pub sessions: Arc<SessionStore>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    _dir: TempDir,
}

impl TestGateway {
    pub async fn start() -> Self {
        let resolver = FixedResolver::new().with_entry("127.0.0.1", TEST_MAC);
        Self::start_with_resolver(Arc::new(resolver)).await
    }

    pub async fn start_with_resolver(resolver: Arc<dyn MacResolver>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let connections_log = dir.path().join("clients.csv");
        let acceptances_log = dir.path().join("accepts.csv");

        let mut config = Config::default();
        config.gateway.bind_address = "127.0.0.1:0".to_string();
        config.audit.connections_log = connections_log.to_str().unwrap().to_string();
        config.audit.acceptances_log = acceptances_log.to_str().unwrap().to_string();
        config.resolver.enabled = false;

        let mut server = GatewayServer::new(config).unwrap().with_resolver(resolver);
        let sessions = server.session_store();
        let addr = server.bind().await.unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let _ = server.serve(shutdown_rx).await;
        });

        Self {
            addr,
            connections_log,
            acceptances_log,
            sessions,
            shutdown_tx,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Parsed connection stream rows, header included.
    pub fn connection_rows(&self) -> Vec<Vec<String>> {
        read_rows(&self.connections_log)
    }

    /// Parsed acceptance stream rows, header included.
    pub fn acceptance_rows(&self) -> Vec<Vec<String>> {
        read_rows(&self.acceptances_log)
    }

    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Read and decode a CSV stream, one row per line.
pub fn read_rows(path: &Path) -> Vec<Vec<String>> {
    if !path.exists() {
        return Vec::new();
    }
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(cancela::audit::decode_row)
        .collect()
}

/// HTTP client that does not follow redirects, so 302s stay visible.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Extract the session token from a response's Set-Cookie header.
pub fn cookie_token(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(|c| c.strip_prefix("session_token="))
        .map(|rest| rest.split(';').next().unwrap_or(rest).to_string())
}
