//! Ordered request classification.
//!
//! Every inbound request maps to exactly one class; the rules are
//! checked in priority order and the final rule matches anything, so
//! classification can never fail.

use hyper::Method;

/// Well-known paths operating systems probe to detect a captive portal.
pub const PROBE_PATHS: &[&str] = &[
    "/hotspot-detect.html", // iOS / macOS
    "/generate_204",        // Android
    "/connecttest.txt",     // Windows
];

/// What a request is asking the gateway to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// An automatic OS captive-check probe
    Probe,
    /// The consent submission
    Accept,
    /// The portal root page
    PortalRoot,
    /// Anything else; funneled back to the portal
    Other,
}

/// Classify a request by method and path, in priority order: probe
/// paths first, then the accept action, then the portal root, then the
/// catch-all.
pub fn classify(method: &Method, path: &str) -> RequestClass {
    if PROBE_PATHS.contains(&path) {
        return RequestClass::Probe;
    }
    if method == Method::POST && path == "/accept" {
        return RequestClass::Accept;
    }
    if method == Method::GET && path == "/" {
        return RequestClass::PortalRoot;
    }
    RequestClass::Other
}
