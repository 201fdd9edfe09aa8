// src/config.rs
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use std::num::NonZeroU32;
use governor::Quota;
use log::warn;
use crate::models::server::ServerAddress;

#[derive(Clone, Debug)]
pub struct Config {
    // Refresh cycle
    pub update_interval_secs: u64,

    // Ping mode
    pub pinger_enabled: bool,
    pub pinger_timeout_millis: u64,
    pub pinger_offline_motd: String,
    pub pinger_servers: HashMap<String, ServerAddress>,

    // Push mode
    pub push_bind_address: String,
    pub push_bridge_address: String,

    // Rate limiting for the status route
    pub status_period_secs: u64,
    pub status_burst_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            update_interval_secs: 3,
            pinger_enabled: false,
            pinger_timeout_millis: 500,
            pinger_offline_motd: "Offline".to_string(),
            pinger_servers: HashMap::new(),
            push_bind_address: "0.0.0.0:0".to_string(),
            push_bridge_address: "127.0.0.1:25590".to_string(),
            status_period_secs: 1,
            status_burst_limit: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            update_interval_secs: env::var("UPDATE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.update_interval_secs),

            pinger_enabled: env::var("PINGER_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.pinger_enabled),

            pinger_timeout_millis: env::var("PINGER_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.pinger_timeout_millis),

            pinger_offline_motd: env::var("PINGER_OFFLINE_MOTD")
                .unwrap_or(defaults.pinger_offline_motd),

            pinger_servers: env::var("PINGER_SERVERS")
                .map(|v| parse_server_list(&v))
                .unwrap_or_default(),

            push_bind_address: env::var("PUSH_BIND_ADDRESS")
                .unwrap_or(defaults.push_bind_address),

            push_bridge_address: env::var("PUSH_BRIDGE_ADDRESS")
                .unwrap_or(defaults.push_bridge_address),

            status_period_secs: env::var("STATUS_PERIOD_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.status_period_secs),

            status_burst_limit: env::var("STATUS_BURST_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.status_burst_limit),
        }
    }

    /// Refresh period, never shorter than one second.
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs.max(1))
    }

    pub fn pinger_timeout(&self) -> Duration {
        Duration::from_millis(self.pinger_timeout_millis)
    }

    pub fn status_quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.status_burst_limit).unwrap_or(NonZeroU32::MIN);
        Quota::with_period(Duration::from_secs(self.status_period_secs))
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst)
    }
}

/// Parses `name=host[:port]` pairs separated by commas. Bad entries are skipped.
pub fn parse_server_list(raw: &str) -> HashMap<String, ServerAddress> {
    let mut servers = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let parsed = entry
            .split_once('=')
            .and_then(|(name, addr)| {
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                ServerAddress::parse(addr).map(|addr| (name.to_string(), addr))
            });

        match parsed {
            Some((name, addr)) => {
                servers.insert(name, addr);
            }
            None => warn!("Ignoring invalid server entry in PINGER_SERVERS: \"{}\"", entry),
        }
    }
    servers
}
