// src/tracker/mod.rs
//! Cached status of remote servers, refreshed on a fixed period.
//!
//! Reads never wait on the network: `get_status` returns whatever the
//! last refresh or push update stored, registering unknown names on the
//! fly. A single repeating timer first forgets servers nobody asked about
//! for [`IDLE_THRESHOLD`], then hands the rest to the active strategy.

pub mod strategy;

use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::models::server::ServerInfo;
use crate::push::PushUpdate;
use crate::storage::memory::ServerRegistry;

pub use strategy::{AcquisitionStrategy, PingStrategy, PushStrategy};

pub const IDLE_THRESHOLD: Duration = Duration::from_secs(10 * 60);

/// Delay before the first cycle after a restart (one server tick).
pub const INITIAL_DELAY: Duration = Duration::from_millis(50);

pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub struct StatusTracker {
    registry: ServerRegistry,
    strategy: AcquisitionStrategy,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl StatusTracker {
    pub fn new(strategy: AcquisitionStrategy, offline_motd: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            registry: ServerRegistry::new(offline_motd),
            strategy,
            timer: Mutex::new(None),
        })
    }

    /// Latest known status of `name`. Unknown names start being tracked here.
    pub fn get_status(&self, name: &str) -> ServerInfo {
        let (info, created) = self.registry.request(name);
        if created {
            self.strategy.on_new_server(name);
        }
        info
    }

    /// Forgets every tracked server and reschedules the refresh cycle.
    pub fn restart(self: &Arc<Self>, interval: Duration) {
        let interval = interval.max(MIN_INTERVAL);
        let mut timer = self.timer.lock();

        self.registry.clear();
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let tracker = Arc::downgrade(self);
        *timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + INITIAL_DELAY, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match tracker.upgrade() {
                    Some(tracker) => {
                        tracker.run_cycle();
                    }
                    None => break,
                }
            }
        }));

        info!("Server tracking restarted, refreshing every {:?}", interval);
    }

    /// Stops the refresh timer. Cached entries stay readable.
    pub fn shutdown(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
            debug!("Server tracking timer stopped");
        }
    }

    /// One refresh: idle sweep, then dispatch over the survivors.
    pub fn run_cycle(&self) -> Option<JoinHandle<()>> {
        let removed = self.registry.remove_idle(Instant::now(), IDLE_THRESHOLD);
        if removed > 0 {
            debug!("Removed {} idle servers", removed);
        }
        let servers = self.registry.tracked();
        debug!("Refreshing {} tracked servers", servers.len());
        self.strategy.on_cycle(servers)
    }

    pub fn on_push_update(&self, update: PushUpdate) {
        let info = ServerInfo::online(update.online_players, 0, "");
        if !self.registry.update_if_tracked(&update.server, info) {
            debug!("Discarding player count for untracked server \"{}\"", update.server);
        }
    }

    /// Applies incoming push updates until the sender side closes.
    pub fn spawn_update_listener(self: &Arc<Self>, mut updates: UnboundedReceiver<PushUpdate>) -> JoinHandle<()> {
        let tracker = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                match tracker.upgrade() {
                    Some(tracker) => tracker.on_push_update(update),
                    None => break,
                }
            }
        })
    }

    pub fn tracked_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.registry.contains(name)
    }
}
