//! Main gateway server

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::handler::GatewayHandler;
use crate::audit::AuditSink;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::{FixedResolver, MacResolver, NeighborTableResolver};
use crate::session::SessionStore;

/// The main gateway server.
///
/// Owns the session store, the audit sink, the resolver and the portal
/// page; each accepted connection gets a handler sharing them.
pub struct GatewayServer {
    config: Config,
    sessions: Arc<SessionStore>,
    audit: Arc<AuditSink>,
    resolver: Arc<dyn MacResolver>,
    portal_page: Arc<String>,
    listener: Option<TcpListener>,
}

impl GatewayServer {
    /// Create a new gateway server from configuration
    pub fn new(config: Config) -> Result<Self> {
        let portal_page = Arc::new(config.load_portal_page()?);

        let audit = Arc::new(AuditSink::new(
            &config.audit.connections_log,
            &config.audit.acceptances_log,
        ));

        let resolver: Arc<dyn MacResolver> = if config.resolver.enabled {
            Arc::new(NeighborTableResolver::new(config.resolver.timeout()))
        } else {
            tracing::info!("MAC resolution disabled, audit rows will carry empty MACs");
            Arc::new(FixedResolver::new())
        };

        tracing::info!(
            connections_log = %config.audit.connections_log,
            acceptances_log = %config.audit.acceptances_log,
            resolver_enabled = config.resolver.enabled,
            "Gateway initialized"
        );

        Ok(Self {
            config,
            sessions: Arc::new(SessionStore::new()),
            audit,
            resolver,
            portal_page,
            listener: None,
        })
    }

    /// Swap in a different MAC resolution strategy (for testing).
    pub fn with_resolver(mut self, resolver: Arc<dyn MacResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Get the session store shared with request handlers.
    pub fn session_store(&self) -> Arc<SessionStore> {
        self.sessions.clone()
    }

    /// Get the bind address
    pub fn bind_address(&self) -> &str {
        &self.config.gateway.bind_address
    }

    /// Run the gateway with graceful shutdown
    pub async fn run_until_shutdown(
        mut self,
        shutdown: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<()> {
        let local_addr = self.bind().await?;
        tracing::info!(address = %local_addr, "Gateway listening");
        self.serve(shutdown).await
    }

    /// Bind the server to its configured address and return the local
    /// address. Useful when binding to port 0 to discover the assigned
    /// port. Call `serve()` afterwards to start accepting connections.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        let bind_address = &self.config.gateway.bind_address;
        let addr: SocketAddr = bind_address.parse().map_err(|e| {
            Error::config(format!("Invalid bind address '{}': {}", bind_address, e))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::gateway(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::gateway(format!("Failed to get local address: {}", e)))?;

        self.listener = Some(listener);
        Ok(local_addr)
    }

    /// Serve connections using a previously bound listener, with
    /// graceful shutdown. Must call `bind()` first.
    pub async fn serve(mut self, mut shutdown: tokio::sync::oneshot::Receiver<()>) -> Result<()> {
        let listener = self
            .listener
            .take()
            .expect("must call bind() before serve()");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    return Ok(());
                }
                result = listener.accept() => {
                    let (stream, client_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    tracing::debug!(client = %client_addr, "New connection");
                    self.spawn_connection(stream, client_addr);
                }
            }
        }
    }

    /// Spawn a task to handle a single connection.
    fn spawn_connection(&self, stream: tokio::net::TcpStream, client_addr: SocketAddr) {
        let sessions = self.sessions.clone();
        let audit = self.audit.clone();
        let resolver = self.resolver.clone();
        let portal_page = self.portal_page.clone();
        let client_ip = client_addr.ip().to_string();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);

            let service = service_fn(move |req| {
                let handler = GatewayHandler::new(
                    sessions.clone(),
                    audit.clone(),
                    resolver.clone(),
                    portal_page.clone(),
                );
                let client_ip = client_ip.clone();
                async move { handler.handle(req, client_ip).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                if !e.to_string().contains("connection closed") {
                    tracing::debug!(client = %client_addr, error = %e, "Connection error");
                }
            }
        });
    }
}
