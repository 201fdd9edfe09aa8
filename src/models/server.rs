// src/models/server.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port assumed when a configured address omits one.
pub const DEFAULT_PORT: u16 = 25565;

/// Snapshot of a remote server's state as last seen by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub online: bool,
    pub online_players: i32,
    pub max_players: i32,
    pub motd: String,
}

impl ServerInfo {
    pub fn online(online_players: i32, max_players: i32, motd: impl Into<String>) -> Self {
        Self {
            online: true,
            online_players,
            max_players,
            motd: motd.into(),
        }
    }

    pub fn offline(motd: impl Into<String>) -> Self {
        Self {
            online: false,
            online_players: 0,
            max_players: 0,
            motd: motd.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Parses `host` or `host:port`. Returns `None` for an empty host or a bad port.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => (host, port.trim().parse().ok()?),
            None => (s, DEFAULT_PORT),
        };
        let host = host.trim();
        if host.is_empty() {
            return None;
        }
        Some(Self::new(host, port))
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
