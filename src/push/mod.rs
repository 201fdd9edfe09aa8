// src/push/mod.rs
//! Player counts delivered over a plugin-message style bus.

pub mod bungee;

/// Unsolicited or requested count for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushUpdate {
    pub server: String,
    pub online_players: i32,
}

/// Outbound half of the bus. Sends must not block; replies arrive as `PushUpdate`s.
pub trait PushChannel: Send + Sync {
    fn send_player_count_request(&self, server: &str);
}
