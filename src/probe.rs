//! Reachability probes: subprocess ping for IPs, HEAD/GET for URLs.
//!
//! Probes never fail: every transport, spawn, or timeout error maps to an
//! unreachable outcome and stays inside this module.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::process::Command;
use tracing::{debug, warn};

/// A single reachability attempt for one target.
///
/// The orchestrator only depends on this trait; tests substitute scripted
/// outcomes for the system implementation.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Pings an address. `true` means at least one echo reply arrived
    /// within the timeout.
    async fn ping(&self, address: &str, timeout: Duration) -> bool;

    /// Checks a URL. `true` means HEAD or GET answered 200.
    async fn check_url(&self, url: &str) -> bool;
}

/// Prober backed by the system `ping` utility and a shared HTTP client.
pub struct SystemProber {
    http: reqwest::Client,
}

impl SystemProber {
    /// The client carries the total HTTP timeout and connection pool limits.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Prefixes `http://` when the value carries no scheme.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

#[async_trait]
impl Prober for SystemProber {
    async fn ping(&self, address: &str, timeout: Duration) -> bool {
        debug!(address, "spawning ping");
        let mut command = Command::new("ping");
        command
            .args(["-q", "-s", "26", "-c", "5", address])
            // force the C locale for stable output
            .env("LC_ALL", "C")
            .env("LANG", "C")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(address, error = %e, "failed to spawn ping");
                return false;
            }
        };

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                debug!(address, code = ?output.status.code(), "ping finished");
                if !output.stdout.is_empty() {
                    debug!(address, output = %String::from_utf8_lossy(&output.stdout), "ping output");
                }
                // iputils ping: 0 = at least one reply, 1 = no reply, 2 = error
                output.status.success()
            }
            Ok(Err(e)) => {
                warn!(address, error = %e, "waiting for ping failed");
                false
            }
            Err(_) => {
                // kill_on_drop reaps the child when the dropped future
                // releases it
                debug!(address, "ping timed out");
                false
            }
        }
    }

    async fn check_url(&self, url: &str) -> bool {
        let target = normalize_url(url);
        debug!(url = %target, "checking url");
        match self.http.head(&target).send().await {
            Ok(response) if response.status() == StatusCode::OK => return true,
            Ok(response) => {
                debug!(url = %target, status = %response.status(), "HEAD not ok, trying GET");
            }
            Err(e) => {
                // some servers reject HEAD outright; GET settles it
                debug!(url = %target, error = %e, "HEAD failed, trying GET");
            }
        }
        match self.http.get(&target).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!(url = %target, error = %e, "GET failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_scheme_only_when_missing() {
        assert_eq!(normalize_url("example.org"), "http://example.org");
        assert_eq!(normalize_url("http://example.org"), "http://example.org");
        assert_eq!(
            normalize_url("https://example.org/health"),
            "https://example.org/health"
        );
    }

    #[tokio::test]
    async fn ping_invalid_address_is_unreachable() {
        let prober = SystemProber::new(reqwest::Client::new());
        // Either the utility rejects the address (exit 2) or it is missing
        // entirely (spawn error); both must map to false.
        assert!(
            !prober
                .ping("256.256.256.256", Duration::from_secs(5))
                .await
        );
    }

    #[tokio::test]
    async fn check_url_refused_connection_is_unreachable() {
        let prober = SystemProber::new(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap(),
        );
        // TEST-NET-1 port with nothing listening
        assert!(!prober.check_url("http://127.0.0.1:9").await);
    }
}
