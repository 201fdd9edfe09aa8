// src/main.rs
mod config;
mod models;
mod handlers;
mod storage;
mod utils;
mod ping;
mod push;
mod tracker;

use actix_web::{ web, App, HttpServer };
use env_logger::Env;
use governor::RateLimiter;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::{ self, UnboundedReceiver };
use crate::config::Config;
use crate::handlers::status::IpRateLimiter;
use crate::ping::minecraft::MinecraftPinger;
use crate::push::PushUpdate;
use crate::push::bungee::UdpBungeeMessenger;
use crate::tracker::{ AcquisitionStrategy, PingStrategy, PushStrategy, StatusTracker };
use log::{ info, error };

async fn build_strategy(
    config: &Config
) -> std::io::Result<(AcquisitionStrategy, Option<UnboundedReceiver<PushUpdate>>)> {
    if config.pinger_enabled {
        info!("Pinging {} configured servers directly", config.pinger_servers.len());
        let strategy = PingStrategy::new(
            Arc::new(MinecraftPinger::default()),
            config.pinger_servers.clone(),
            config.pinger_timeout(),
            config.pinger_offline_motd.clone()
        );
        return Ok((AcquisitionStrategy::Ping(Arc::new(strategy)), None));
    }

    let bridge: SocketAddr = config.push_bridge_address.parse().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Invalid PUSH_BRIDGE_ADDRESS \"{}\": {}", config.push_bridge_address, e)
        )
    })?;

    let messenger = UdpBungeeMessenger::bind(&config.push_bind_address, bridge).await?;
    let (tx, rx) = mpsc::unbounded_channel();
    messenger.spawn_receiver(tx);
    info!("Requesting player counts from push bridge at {}", bridge);

    Ok((AcquisitionStrategy::Push(PushStrategy::new(Arc::new(messenger))), Some(rx)))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logger only once at the start
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // Load configuration
    let config = Config::from_env();

    // Get bind address and port from environment or use defaults
    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind = format!("{}:{}", bind_address, port);

    let (strategy, updates) = match build_strategy(&config).await {
        Ok(built) => built,
        Err(e) => {
            error!("Failed to set up server tracking: {}", e);
            return Err(e);
        }
    };

    let tracker = StatusTracker::new(strategy, config.pinger_offline_motd.clone());
    if let Some(updates) = updates {
        tracker.spawn_update_listener(updates);
    }
    tracker.restart(config.update_interval());

    let status_rate_limiter: web::Data<IpRateLimiter> = web::Data::new(
        RateLimiter::keyed(config.status_quota())
    );
    let tracker_data = web::Data::from(tracker.clone());

    info!("Starting server on {}", bind);
    let result = HttpServer::new(move || {
        App::new()
            .app_data(tracker_data.clone())
            .app_data(status_rate_limiter.clone())
            .route("/", web::get().to(handlers::index::index))
            .route("/server/{name}", web::get().to(handlers::status::get_server_status))
    })
        .bind(&bind)?
        .run().await;

    tracker.shutdown();
    result
}
