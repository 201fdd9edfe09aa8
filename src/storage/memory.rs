// src/storage/memory.rs
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use crate::models::server::ServerInfo;

/// A server somebody has asked about recently.
#[derive(Debug)]
pub struct TrackedServer {
    name: String,
    info: RwLock<ServerInfo>,
    last_request: Mutex<Instant>,
}

impl TrackedServer {
    fn new(name: String, placeholder: ServerInfo) -> Self {
        Self {
            name,
            info: RwLock::new(placeholder),
            last_request: Mutex::new(Instant::now()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> ServerInfo {
        self.info.read().clone()
    }

    /// Replaces the whole snapshot; readers never see a half-written value.
    pub fn set_info(&self, info: ServerInfo) {
        *self.info.write() = info;
    }

    pub fn last_request(&self) -> Instant {
        *self.last_request.lock()
    }

    fn touch(&self) {
        *self.last_request.lock() = Instant::now();
    }
}

pub struct ServerRegistry {
    servers: DashMap<String, Arc<TrackedServer>>,
    offline_motd: String,
}

impl ServerRegistry {
    pub fn new(offline_motd: impl Into<String>) -> Self {
        Self {
            servers: DashMap::new(),
            offline_motd: offline_motd.into(),
        }
    }

    /// Returns the current snapshot for `name`, tracking it first if needed.
    /// The flag is true when this call created the entry.
    pub fn request(&self, name: &str) -> (ServerInfo, bool) {
        let (server, created) = match self.servers.entry(name.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let placeholder = ServerInfo::offline(self.offline_motd.as_str());
                let server = Arc::new(TrackedServer::new(name.to_string(), placeholder));
                entry.insert(server.clone());
                debug!("Tracking server \"{}\"", name);
                (server, true)
            }
        };
        server.touch();
        (server.info(), created)
    }

    /// Overwrites the snapshot of a tracked server. Returns false if `name` is not tracked.
    pub fn update_if_tracked(&self, name: &str, info: ServerInfo) -> bool {
        match self.servers.get(name) {
            Some(server) => {
                server.set_info(info);
                true
            }
            None => false,
        }
    }

    /// Drops every server not requested within `idle_threshold` of `now`.
    pub fn remove_idle(&self, now: Instant, idle_threshold: Duration) -> usize {
        let before = self.servers.len();
        self.servers.retain(|name, server| {
            let idle = now.saturating_duration_since(server.last_request());
            if idle > idle_threshold {
                debug!("Untracked unused server \"{}\"", name);
                false
            } else {
                true
            }
        });
        before.saturating_sub(self.servers.len())
    }

    pub fn tracked(&self) -> Vec<Arc<TrackedServer>> {
        self.servers.iter().map(|r| r.value().clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.servers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn clear(&self) {
        self.servers.clear();
    }
}
