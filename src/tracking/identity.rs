//! Pseudonymous visitor identity

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;

/// Get the client IP address, preferring the first X-Forwarded-For entry
pub fn client_ip(headers: &HeaderMap, socket: Option<SocketAddr>) -> String {
    // X-Forwarded-For may contain a chain of IPs, first is original client
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(ips) = forwarded.to_str() {
            if let Some(first_ip) = ips.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    socket
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Salted SHA-256 of the client address, hex encoded (64 chars)
pub fn hash_identity(ip: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}
