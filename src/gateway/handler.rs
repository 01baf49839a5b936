//! Per-request pipeline: classify, audit, mutate the session store,
//! respond.
//!
//! Side effects are ordered: classification happens before any
//! mutation, and the audit record is appended before the response is
//! built, so a response failure can never leave a contact unlogged.

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt};
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::{Request, Response};
use std::sync::Arc;

use super::response::{
    already_accepted_response, consent_recorded_response, consent_required_response,
    portal_response, redirect_to_portal, SESSION_COOKIE,
};
use super::router::{classify, RequestClass};
use crate::audit::{AuditSink, ContactRecord};
use crate::resolver::MacResolver;
use crate::session::{ClientIdentity, SessionStore};

/// Handles one request against the shared gateway state.
pub struct GatewayHandler {
    sessions: Arc<SessionStore>,
    audit: Arc<AuditSink>,
    resolver: Arc<dyn MacResolver>,
    portal_page: Arc<String>,
}

impl GatewayHandler {
    pub fn new(
        sessions: Arc<SessionStore>,
        audit: Arc<AuditSink>,
        resolver: Arc<dyn MacResolver>,
        portal_page: Arc<String>,
    ) -> Self {
        Self {
            sessions,
            audit,
            resolver,
            portal_page,
        }
    }

    /// Handle an incoming request from `client_ip`.
    pub async fn handle(
        self,
        req: Request<Incoming>,
        client_ip: String,
    ) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error> {
        let user_agent = header_str(req.headers(), "user-agent");
        let token = session_token(req.headers());
        let identity = ClientIdentity::new(client_ip, token);

        let class = classify(req.method(), req.uri().path());
        tracing::debug!(
            ip = %identity.ip,
            method = %req.method(),
            path = %req.uri().path(),
            class = ?class,
            "Request classified"
        );

        match class {
            RequestClass::Probe | RequestClass::Other => {
                self.record_connection(&identity, &user_agent).await;
                Ok(redirect_to_portal())
            }
            RequestClass::Accept => self.handle_accept(req, identity, user_agent).await,
            RequestClass::PortalRoot => Ok(self.handle_portal(&identity)),
        }
    }

    /// Consent submission: requires the affirmative flag, records the
    /// acceptance, then promotes the session. Idempotent for clients
    /// that already accepted.
    async fn handle_accept(
        self,
        req: Request<Incoming>,
        identity: ClientIdentity,
        user_agent: String,
    ) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error> {
        let body = req.into_body().collect().await?.to_bytes();
        let form = String::from_utf8_lossy(&body);

        if !consent_given(&form) {
            tracing::debug!(ip = %identity.ip, "Accept submission without consent flag");
            return Ok(consent_required_response());
        }

        let mac = self.resolver.resolve(&identity.ip).await;
        let record = ContactRecord::now(identity.ip.clone(), mac, user_agent);
        if let Err(e) = self.audit.record_acceptance(&record) {
            tracing::warn!(error = %e, ip = %identity.ip, "Failed to append acceptance record");
        }

        self.sessions.mark_accepted(&identity);
        tracing::info!(ip = %identity.ip, "Consent recorded");
        Ok(consent_recorded_response())
    }

    /// Portal root: consent page with a session cookie while consent is
    /// outstanding, a short acknowledgement afterwards.
    fn handle_portal(&self, identity: &ClientIdentity) -> Response<BoxBody<Bytes, hyper::Error>> {
        if self.sessions.is_portal_required(identity) {
            let (_, token, issued) = self.sessions.ensure(identity);
            if issued {
                tracing::debug!(ip = %identity.ip, "Session token issued");
            }
            portal_response(&self.portal_page, &token)
        } else {
            already_accepted_response()
        }
    }

    async fn record_connection(&self, identity: &ClientIdentity, user_agent: &str) {
        let mac = self.resolver.resolve(&identity.ip).await;
        let record = ContactRecord::now(identity.ip.clone(), mac, user_agent);
        if let Err(e) = self.audit.record_connection(&record) {
            tracing::warn!(error = %e, ip = %identity.ip, "Failed to append connection record");
        }
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Extract the session token from the Cookie header(s), if present.
fn session_token(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all("cookie") {
        let Ok(cookies) = value.to_str() else {
            continue;
        };
        for pair in cookies.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name == SESSION_COOKIE && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// True when the urlencoded form body carries an affirmative `consent`
/// field. A checkbox submits `consent=on`; anything explicitly negative
/// or empty does not count.
fn consent_given(form: &str) -> bool {
    form.split('&').any(|pair| {
        let (name, value) = match pair.split_once('=') {
            Some((n, v)) => (n, form_decode(v)),
            None => (pair, String::new()),
        };
        name == "consent" && !matches!(value.as_str(), "" | "0" | "false" | "off")
    })
}

/// Minimal application/x-www-form-urlencoded value decoding: `+` to
/// space and `%XX` escapes.
fn form_decode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = &value[i + 1..i + 3];
                match u8::from_str_radix(hex, 16) {
                    Ok(b) => {
                        out.push(b as char);
                        i += 3;
                    }
                    Err(_) => {
                        out.push('%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b as char);
                i += 1;
            }
        }
    }
    out
}
