//! Prometheus-compatible metrics endpoint
//!
//! Exposes lobby and terrain counters in Prometheus text format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{info, debug};

/// Rebuild samples kept for percentile calculation
const REBUILD_HISTORY: usize = 256;

/// Metrics registry for the beacon server and terrain engine
#[derive(Debug)]
pub struct Metrics {
    // Lobby
    pub reservations_granted: AtomicU64,
    pub reservations_denied: AtomicU64,
    pub slots_reserved: AtomicU64,
    pub roster_size: AtomicU64,
    pub roster_broadcasts: AtomicU64,

    // Network stats
    pub connections_active: AtomicU64,
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,

    // Terrain
    pub explosions: AtomicU64,
    pub rebuild_time_us: AtomicU64,
    pub rebuild_time_p95_us: AtomicU64,
    pub rebuild_time_max_us: AtomicU64,
    pub mesh_triangles: AtomicU64,

    start_time: Instant,

    rebuild_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            reservations_granted: AtomicU64::new(0),
            reservations_denied: AtomicU64::new(0),
            slots_reserved: AtomicU64::new(0),
            roster_size: AtomicU64::new(0),
            roster_broadcasts: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            explosions: AtomicU64::new(0),
            rebuild_time_us: AtomicU64::new(0),
            rebuild_time_p95_us: AtomicU64::new(0),
            rebuild_time_max_us: AtomicU64::new(0),
            mesh_triangles: AtomicU64::new(0),
            start_time: Instant::now(),
            rebuild_history: RwLock::new(VecDeque::with_capacity(REBUILD_HISTORY)),
        }
    }

    /// Record one collision rebuild and update percentiles
    pub fn record_rebuild(&self, duration: Duration, triangles: usize) {
        let us = duration.as_micros() as u64;
        self.rebuild_time_us.store(us, Ordering::Relaxed);
        self.mesh_triangles.store(triangles as u64, Ordering::Relaxed);
        self.explosions.fetch_add(1, Ordering::Relaxed);

        let mut history = self.rebuild_history.write();
        history.push_back(us);
        while history.len() > REBUILD_HISTORY {
            history.pop_front();
        }

        let mut sorted: Vec<u64> = history.iter().copied().collect();
        sorted.sort_unstable();
        let p95_idx = (sorted.len() as f32 * 0.95) as usize;
        self.rebuild_time_p95_us
            .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
        self.rebuild_time_max_us
            .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        // Lobby
        metric!("artillery_reservations_granted_total", "Reservation requests granted", "counter",
            self.reservations_granted.load(Ordering::Relaxed));
        metric!("artillery_reservations_denied_total", "Reservation requests denied", "counter",
            self.reservations_denied.load(Ordering::Relaxed));
        metric!("artillery_slots_reserved", "Currently reserved lobby slots", "gauge",
            self.slots_reserved.load(Ordering::Relaxed));
        metric!("artillery_roster_size", "Players in the lobby roster", "gauge",
            self.roster_size.load(Ordering::Relaxed));
        metric!("artillery_roster_broadcasts_total", "Roster broadcasts sent", "counter",
            self.roster_broadcasts.load(Ordering::Relaxed));

        // Network
        metric!("artillery_connections_active", "Active beacon connections", "gauge",
            self.connections_active.load(Ordering::Relaxed));
        metric!("artillery_messages_sent_total", "Total messages sent", "counter",
            self.messages_sent.load(Ordering::Relaxed));
        metric!("artillery_messages_received_total", "Total messages received", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("artillery_bytes_sent_total", "Total bytes sent", "counter",
            self.bytes_sent.load(Ordering::Relaxed));
        metric!("artillery_bytes_received_total", "Total bytes received", "counter",
            self.bytes_received.load(Ordering::Relaxed));

        // Terrain
        metric!("artillery_explosions_total", "Explosions applied to the terrain", "counter",
            self.explosions.load(Ordering::Relaxed));
        metric!("artillery_rebuild_time_microseconds", "Last collision rebuild time", "gauge",
            self.rebuild_time_us.load(Ordering::Relaxed));
        metric!("artillery_rebuild_time_p95_microseconds", "95th percentile rebuild time", "gauge",
            self.rebuild_time_p95_us.load(Ordering::Relaxed));
        metric!("artillery_rebuild_time_max_microseconds", "Maximum rebuild time", "gauge",
            self.rebuild_time_max_us.load(Ordering::Relaxed));
        metric!("artillery_mesh_triangles", "Triangles in the current collision mesh", "gauge",
            self.mesh_triangles.load(Ordering::Relaxed));

        metric!("artillery_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);

                    let response = if request.starts_with("GET /metrics") {
                        let body = metrics.to_prometheus();
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else if request.starts_with("GET /health") || request.starts_with("GET /") {
                        let body = "OK";
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.reservations_granted.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.explosions.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_rebuild() {
        let metrics = Metrics::new();
        for i in 0..50 {
            metrics.record_rebuild(Duration::from_micros(100 + i * 10), 400);
        }

        assert_eq!(metrics.explosions.load(Ordering::Relaxed), 50);
        assert_eq!(metrics.mesh_triangles.load(Ordering::Relaxed), 400);
        assert_eq!(metrics.rebuild_time_max_us.load(Ordering::Relaxed), 590);
        assert!(metrics.rebuild_time_p95_us.load(Ordering::Relaxed) >= 550);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.reservations_granted.store(3, Ordering::Relaxed);
        metrics.reservations_denied.store(1, Ordering::Relaxed);

        let output = metrics.to_prometheus();

        assert!(output.contains("artillery_reservations_granted_total 3"));
        assert!(output.contains("artillery_reservations_denied_total 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}
