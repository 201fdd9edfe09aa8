// src/ping/mod.rs
//! Direct status pings against configured server addresses.

pub mod error;
pub mod minecraft;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::server::ServerAddress;

pub use error::PingError;

/// Fields read from a successful status ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResponse {
    pub online_players: i32,
    pub max_players: i32,
    pub motd: String,
}

/// One network round trip to a server, bounded by `timeout`.
#[async_trait]
pub trait ServerPinger: Send + Sync {
    async fn ping(&self, address: &ServerAddress, timeout: Duration) -> Result<PingResponse, PingError>;
}
