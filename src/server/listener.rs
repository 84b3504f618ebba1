// ────────────────────────────────
// src/server/listener.rs
// Encapsulates low‑level TCP bind so the builder can also take a pre-bound socket.
// ────────────────────────────────
use anyhow::{Context, Result};
use tokio::net::TcpListener;

/// Binds `addr` (`host:port`, host names are resolved).
pub async fn bind_tcp(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    Ok(listener)
}
