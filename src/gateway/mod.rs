//! HTTP-facing gateway: request classification, response construction
//! and the server loop.

mod handler;
pub mod response;
pub mod router;
mod server;

pub use handler::GatewayHandler;
pub use router::{classify, RequestClass, PROBE_PATHS};
pub use server::GatewayServer;

/// The embedded consent page, served verbatim when no custom page is
/// configured. Carries no per-client interpolation.
pub const DEFAULT_PORTAL_PAGE: &str = include_str!("portal.html");
