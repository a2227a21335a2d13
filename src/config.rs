//! Runtime configuration, loaded once at startup from environment variables.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::gate::CallerTrust;

#[derive(Debug, Clone, Serialize)]
pub struct BridgeConfig {
    pub bind: SocketAddr,
    /// Path prefix every page lives under.
    pub plugin_path: String,
    pub static_dir: PathBuf,
    pub properties_path: PathBuf,
    /// Poll interval advertised to browsers waiting on a reply.
    pub refresh_secs: u32,
    pub full_access_hosts: Vec<IpAddr>,
    /// `None` keeps unclaimed entries forever.
    pub entry_ttl: Option<Duration>,
    pub sweep_interval: Duration,
    pub ingest_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8888)),
            plugin_path: "/pagebridge".to_string(),
            static_dir: PathBuf::from("static"),
            properties_path: PathBuf::from("pagebridge.json"),
            refresh_secs: 3,
            full_access_hosts: vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
            entry_ttl: None,
            sweep_interval: Duration::from_secs(60),
            ingest_buffer: 256,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            bind: parsed(&lookup, "PAGEBRIDGE_BIND").unwrap_or(defaults.bind),
            plugin_path: lookup("PAGEBRIDGE_PATH")
                .map(|p| normalise_path(&p))
                .unwrap_or(defaults.plugin_path),
            static_dir: lookup("PAGEBRIDGE_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            properties_path: lookup("PAGEBRIDGE_PROPERTIES")
                .map(PathBuf::from)
                .unwrap_or(defaults.properties_path),
            refresh_secs: parsed(&lookup, "PAGEBRIDGE_REFRESH_SECS")
                .unwrap_or(defaults.refresh_secs),
            full_access_hosts: lookup("PAGEBRIDGE_FULL_ACCESS_HOSTS")
                .map(|hosts| {
                    hosts
                        .split(',')
                        .filter_map(|h| h.trim().parse().ok())
                        .collect()
                })
                .unwrap_or(defaults.full_access_hosts),
            entry_ttl: parsed(&lookup, "PAGEBRIDGE_ENTRY_TTL_SECS").map(Duration::from_secs),
            sweep_interval: parsed(&lookup, "PAGEBRIDGE_SWEEP_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            ingest_buffer: parsed(&lookup, "PAGEBRIDGE_INGEST_BUFFER")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.ingest_buffer),
        }
    }

    pub fn trust_for(&self, peer: IpAddr) -> CallerTrust {
        if self.full_access_hosts.contains(&peer) {
            CallerTrust::Full
        } else {
            CallerTrust::Restricted
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// Leading slash, no trailing slash.
fn normalise_path(path: &str) -> String {
    format!("/{}", path.trim().trim_matches('/'))
}
