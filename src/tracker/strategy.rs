// src/tracker/strategy.rs
use log::{debug, error, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use crate::models::server::{ServerAddress, ServerInfo};
use crate::ping::{PingError, ServerPinger};
use crate::push::PushChannel;
use crate::storage::memory::TrackedServer;

/// How fresh data is obtained for tracked servers. Chosen once per tracker.
pub enum AcquisitionStrategy {
    Ping(Arc<PingStrategy>),
    Push(PushStrategy),
}

impl AcquisitionStrategy {
    pub(crate) fn on_new_server(&self, name: &str) {
        // Pinging picks new servers up on the next cycle.
        if let Self::Push(push) = self {
            push.send_count_request(name);
        }
    }

    /// Starts one refresh of `servers`. Ping batches run on their own task,
    /// whose handle is returned; push requests are sent before returning.
    pub fn on_cycle(&self, servers: Vec<Arc<TrackedServer>>) -> Option<JoinHandle<()>> {
        match self {
            Self::Ping(ping) => Some(ping.spawn_batch(servers)),
            Self::Push(push) => {
                for server in &servers {
                    push.send_count_request(server.name());
                }
                None
            }
        }
    }
}

pub struct PingStrategy {
    pinger: Arc<dyn ServerPinger>,
    addresses: HashMap<String, ServerAddress>,
    timeout: Duration,
    offline_motd: String,
}

impl PingStrategy {
    pub fn new(
        pinger: Arc<dyn ServerPinger>,
        addresses: HashMap<String, ServerAddress>,
        timeout: Duration,
        offline_motd: impl Into<String>,
    ) -> Self {
        Self {
            pinger,
            addresses,
            timeout,
            offline_motd: offline_motd.into(),
        }
    }

    fn spawn_batch(self: &Arc<Self>, servers: Vec<Arc<TrackedServer>>) -> JoinHandle<()> {
        let strategy = self.clone();
        tokio::spawn(async move {
            let mut batch = JoinSet::new();
            for server in servers {
                let strategy = strategy.clone();
                batch.spawn(async move {
                    let info = strategy.fetch(server.name()).await;
                    server.set_info(info);
                });
            }

            while let Some(result) = batch.join_next().await {
                if let Err(e) = result {
                    error!("Ping task failed: {}", e);
                }
            }
        })
    }

    /// Status of `name`, resolved through the configured address table.
    pub async fn fetch(&self, name: &str) -> ServerInfo {
        match self.addresses.get(name) {
            Some(address) => self.ping(address).await,
            None => ServerInfo::offline(format!("unknown node: {}", name)),
        }
    }

    async fn ping(&self, address: &ServerAddress) -> ServerInfo {
        match self.pinger.ping(address, self.timeout).await {
            Ok(response) => {
                ServerInfo::online(response.online_players, response.max_players, response.motd)
            }
            Err(PingError::MalformedResponse { raw, reason }) => {
                warn!("Received invalid JSON response from \"{}\": {}", address, raw);
                ServerInfo::online(0, 0, format!("Invalid ping response ({})", reason))
            }
            Err(e @ (PingError::Timeout | PingError::ConnectionRefused)) => {
                debug!("Couldn't fetch data from {}: {}", address, e);
                ServerInfo::offline(self.offline_motd.as_str())
            }
            Err(PingError::UnknownHost) => {
                warn!("Couldn't fetch data from {}: unknown host address.", address);
                ServerInfo::offline(self.offline_motd.as_str())
            }
            Err(e) => {
                warn!("Couldn't fetch data from {}: {:?}", address, e);
                ServerInfo::offline(self.offline_motd.as_str())
            }
        }
    }
}

pub struct PushStrategy {
    channel: Arc<dyn PushChannel>,
}

impl PushStrategy {
    pub fn new(channel: Arc<dyn PushChannel>) -> Self {
        Self { channel }
    }

    pub fn send_count_request(&self, name: &str) {
        self.channel.send_player_count_request(name);
    }
}
