//! Best-effort MAC address resolution from the OS neighbor table.
//!
//! Resolution is a diagnostic field only: every failure mode (address
//! not in the table, tool missing, lookup timing out) degrades to an
//! empty string and must never block or fail the request pipeline.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Strategy interface for resolving an IP to a link-layer address.
///
/// The production implementation shells out to the system tools; tests
/// swap in a [`FixedResolver`].
#[async_trait]
pub trait MacResolver: Send + Sync {
    /// Resolve `ip` to a MAC string, or an empty string when unknown.
    async fn resolve(&self, ip: &str) -> String;
}

/// Resolver that queries the local neighbor/ARP table via `ip neigh`,
/// falling back to `arp -n`, with a bounded timeout.
pub struct NeighborTableResolver {
    timeout: Duration,
}

impl NeighborTableResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn query_table(ip: &str) -> String {
        let commands: [(&str, &[&str]); 2] = [("ip", &["neigh", "show", ip]), ("arp", &["-n", ip])];

        for (program, args) in commands {
            let output = match tokio::process::Command::new(program)
                .args(args)
                .output()
                .await
            {
                Ok(out) => out,
                Err(e) => {
                    tracing::debug!(program, error = %e, "Neighbor table tool unavailable");
                    continue;
                }
            };

            let text = String::from_utf8_lossy(&output.stdout);
            if let Some(mac) = find_mac_token(&text) {
                return mac;
            }
        }

        String::new()
    }
}

#[async_trait]
impl MacResolver for NeighborTableResolver {
    async fn resolve(&self, ip: &str) -> String {
        match tokio::time::timeout(self.timeout, Self::query_table(ip)).await {
            Ok(mac) => mac,
            Err(_) => {
                tracing::debug!(ip, "Neighbor table lookup timed out");
                String::new()
            }
        }
    }
}

/// In-memory resolver mapping IPs to fixed MACs. Unlisted IPs resolve
/// to an empty string. Also used when resolution is disabled in config.
#[derive(Default)]
pub struct FixedResolver {
    entries: HashMap<String, String>,
}

impl FixedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, ip: impl Into<String>, mac: impl Into<String>) -> Self {
        self.entries.insert(ip.into(), mac.into());
        self
    }
}

#[async_trait]
impl MacResolver for FixedResolver {
    async fn resolve(&self, ip: &str) -> String {
        self.entries.get(ip).cloned().unwrap_or_default()
    }
}

/// Scan text for the first MAC-formatted token: six hex pairs joined by
/// a consistent `:` or `-` separator.
pub fn find_mac_token(text: &str) -> Option<String> {
    text.split_whitespace().find_map(|token| {
        if is_mac_token(token) {
            Some(token.to_string())
        } else {
            None
        }
    })
}

fn is_mac_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    if bytes.len() != 17 {
        return false;
    }

    let sep = bytes[2];
    if sep != b':' && sep != b'-' {
        return false;
    }

    for (i, b) in bytes.iter().enumerate() {
        if i % 3 == 2 {
            if *b != sep {
                return false;
            }
        } else if !b.is_ascii_hexdigit() {
            return false;
        }
    }
    true
}
