use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::constants::{net, terrain};
use crate::util::vec2::Vec2;

/// How the host's own lobby slot is accounted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostSlotPolicy {
    /// Reserved slots start at 0; the host earns its slot through the
    /// loopback handshake like any remote client
    #[default]
    Handshake,
    /// Reserved slots start at 1; the host's own reservation request is
    /// granted against that pre-reserved slot
    PreReserved,
}

impl HostSlotPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "handshake" => Some(Self::Handshake),
            "prereserved" | "pre_reserved" | "pre-reserved" => Some(Self::PreReserved),
            _ => None,
        }
    }
}

/// Destructible terrain configuration
#[derive(Debug, Clone)]
pub struct TerrainConfig {
    /// World-space size of the map rectangle (x = width, y = height)
    pub world_size: Vec2,
    /// Column sampling stride for the collision contour
    pub collision_stride: u32,
    /// Extrusion depth of the collision mesh
    pub collision_thickness: f32,
    /// How far below the map bottom the collision floor sits
    pub floor_margin: f32,
    /// Rebuild only the carved columns instead of the whole heightmap
    pub zone_rebuild: bool,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            world_size: Vec2::new(terrain::DEFAULT_WORLD_WIDTH, terrain::DEFAULT_WORLD_HEIGHT),
            collision_stride: terrain::DEFAULT_COLLISION_STRIDE,
            collision_thickness: terrain::DEFAULT_COLLISION_THICKNESS,
            floor_margin: terrain::DEFAULT_FLOOR_MARGIN,
            zone_rebuild: false,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the beacon host to
    pub bind_address: IpAddr,
    /// Beacon port
    pub beacon_port: u16,
    /// Prometheus metrics port
    pub metrics_port: u16,
    /// How long a client waits for a grant/deny before giving up
    pub reservation_timeout: Duration,
    /// Host slot accounting
    pub host_slot_policy: HostSlotPolicy,
    /// Terrain settings
    pub terrain: TerrainConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            beacon_port: net::BEACON_PORT,
            metrics_port: 9090,
            reservation_timeout: Duration::from_secs(net::RESERVATION_TIMEOUT_SECS),
            host_slot_policy: HostSlotPolicy::Handshake,
            terrain: TerrainConfig::default(),
        }
    }
}

/// Parse an env var, warning and returning None on bad input
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_parse::<IpAddr>("BIND_ADDRESS") {
            config.bind_address = addr;
        }

        if let Some(port) = env_parse::<u16>("BEACON_PORT") {
            if port > 0 {
                config.beacon_port = port;
            } else {
                tracing::warn!("BEACON_PORT must be > 0, using default");
            }
        }

        if let Some(port) = env_parse::<u16>("METRICS_PORT") {
            config.metrics_port = port;
        }

        if let Some(secs) = env_parse::<u64>("RESERVATION_TIMEOUT_SECS") {
            if (1..=300).contains(&secs) {
                config.reservation_timeout = Duration::from_secs(secs);
            } else {
                tracing::warn!("RESERVATION_TIMEOUT_SECS must be 1-300, using default");
            }
        }

        if let Ok(policy) = std::env::var("HOST_SLOT_POLICY") {
            match HostSlotPolicy::parse(&policy) {
                Some(parsed) => config.host_slot_policy = parsed,
                None => tracing::warn!("Invalid HOST_SLOT_POLICY '{}', using default", policy),
            }
        }

        if let Some(width) = env_parse::<f32>("TERRAIN_WORLD_WIDTH") {
            config.terrain.world_size.x = width;
        }

        if let Some(height) = env_parse::<f32>("TERRAIN_WORLD_HEIGHT") {
            config.terrain.world_size.y = height;
        }

        if let Some(stride) = env_parse::<u32>("COLLISION_STRIDE") {
            config.terrain.collision_stride = stride;
        }

        if let Some(thickness) = env_parse::<f32>("COLLISION_THICKNESS") {
            config.terrain.collision_thickness = thickness;
        }

        if let Some(zone) = env_parse::<bool>("ZONE_REBUILD") {
            config.terrain.zone_rebuild = zone;
        }

        config
    }

    /// Socket address the beacon host listens on
    pub fn beacon_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.beacon_port)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.beacon_port == 0 {
            return Err("Beacon port cannot be 0".to_string());
        }
        if self.reservation_timeout.is_zero() {
            return Err("reservation_timeout must be non-zero".to_string());
        }
        let size = self.terrain.world_size;
        if !(size.x > 0.0 && size.y > 0.0 && size.is_finite()) {
            return Err("terrain world size must be positive".to_string());
        }
        if self.terrain.collision_stride == 0 {
            return Err("collision_stride must be at least 1".to_string());
        }
        if self.terrain.collision_thickness <= 0.0 {
            return Err("collision_thickness must be positive".to_string());
        }
        if self.terrain.floor_margin <= 0.0 {
            return Err("floor_margin must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.beacon_port, 7787);
        assert_eq!(config.reservation_timeout, Duration::from_secs(10));
        assert_eq!(config.host_slot_policy, HostSlotPolicy::Handshake);
        assert_eq!(config.terrain.collision_stride, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = ServerConfig::load_or_default();
        assert!(config.beacon_port > 0);
    }

    #[test]
    fn test_validate_rejects_zero_stride() {
        let mut config = ServerConfig::default();
        config.terrain.collision_stride = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_world_size() {
        let mut config = ServerConfig::default();
        config.terrain.world_size = Vec2::new(0.0, 100.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_host_slot_policy_parse() {
        assert_eq!(HostSlotPolicy::parse("handshake"), Some(HostSlotPolicy::Handshake));
        assert_eq!(HostSlotPolicy::parse("PreReserved"), Some(HostSlotPolicy::PreReserved));
        assert_eq!(HostSlotPolicy::parse("bogus"), None);
    }
}
