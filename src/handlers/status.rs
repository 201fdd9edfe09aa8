// src/handlers/status.rs
use actix_web::{web, HttpRequest, HttpResponse};
use governor::{RateLimiter, clock::DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use log::{debug, error};
use std::net::IpAddr;
use crate::tracker::StatusTracker;
use crate::utils::{extract_peer_ip, RequestError};

pub type IpRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

pub async fn get_server_status(
    req: HttpRequest,
    name: web::Path<String>,
    tracker: web::Data<StatusTracker>,
    rate_limiter: web::Data<IpRateLimiter>,
) -> Result<HttpResponse, RequestError> {
    let peer_ip = extract_peer_ip(&req)?;

    // Rate Limiting
    if rate_limiter.check_key(&peer_ip).is_err() {
        error!("Rate limit exceeded for server status for ip: {}", peer_ip);
        return Err(RequestError::RateLimitExceeded);
    }

    let name = name.into_inner();
    let info = tracker.get_status(&name);
    debug!("Status of \"{}\" for {}: {:?}", name, peer_ip, info);

    Ok(HttpResponse::Ok().json(info))
}
