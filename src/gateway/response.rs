//! Response constructors for the gateway's fixed set of outcomes.

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::{Response, StatusCode};

/// Name of the cookie carrying the opaque session token.
pub const SESSION_COOKIE: &str = "session_token";

type GatewayResponse = Response<BoxBody<Bytes, hyper::Error>>;

fn html_body(body: impl Into<Bytes>) -> BoxBody<Bytes, hyper::Error> {
    Full::new(body.into()).map_err(|e| match e {}).boxed()
}

/// Serve the consent page, setting the session cookie. The cookie has
/// no `Domain` attribute so it stays bound to the requested host.
pub fn portal_response(page: &str, token: &str) -> GatewayResponse {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .header(
            "Set-Cookie",
            format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, token),
        )
        .body(html_body(page.to_string()))
        .unwrap()
}

/// 302 back to the portal root. Used for OS probes and the catch-all.
pub fn redirect_to_portal() -> GatewayResponse {
    Response::builder()
        .status(StatusCode::FOUND)
        .header("Location", "/")
        .body(Empty::<Bytes>::new().map_err(|e| match e {}).boxed())
        .unwrap()
}

/// Confirmation page after a successful consent submission. Never a
/// redirect, so OS captive-portal UIs treat it as a final page.
pub fn consent_recorded_response() -> GatewayResponse {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html_body("<h3>Consent recorded. Thank you.</h3>"))
        .unwrap()
}

/// Acknowledgement for clients that already accepted.
pub fn already_accepted_response() -> GatewayResponse {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html_body("<h3>Access already granted.</h3>"))
        .unwrap()
}

/// 400 for an accept submission without the affirmative consent flag.
pub fn consent_required_response() -> GatewayResponse {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html_body(
            "<h3>Consent was not given. Return to the portal page and check the consent box.</h3>",
        ))
        .unwrap()
}
