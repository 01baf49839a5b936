//! Cancela - a captive-portal session and consent gateway
//!
//! This crate provides a network-edge HTTP service that intercepts
//! client traffic, shows a consent page until the client explicitly
//! accepts, and records every contact and every acceptance to
//! append-only audit streams.
//!
//! # Features
//!
//! - **Request funneling**: OS captive-check probes and unknown paths
//!   redirect back to the portal root
//! - **Dual-key sessions**: consent is tracked per session token and
//!   per IP, and is never silently revoked
//! - **Append-only audit**: CSV streams for connection attempts and
//!   consent acceptances, header written exactly once
//! - **Best-effort MAC resolution**: neighbor-table lookup with a
//!   bounded timeout, degrading to an empty field
//!
//! # Example
//!
//! ```no_run
//! use cancela::{Config, GatewayServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.toml")?;
//!     let server = GatewayServer::new(config)?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
//!     server.run_until_shutdown(shutdown_rx).await?;
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod gateway;
pub mod resolver;
pub mod session;

#[doc(hidden)]
pub mod test_support;

pub use audit::{AuditSink, AuditStream, ContactRecord};
pub use config::Config;
pub use error::{Error, Result};
pub use gateway::GatewayServer;
pub use resolver::{FixedResolver, MacResolver, NeighborTableResolver};
pub use session::{ClientIdentity, SessionEntry, SessionStore};
