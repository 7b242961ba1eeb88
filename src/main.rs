use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use artillery_server::config::ServerConfig;
use artillery_server::lobby::PlayerLobbyInfo;
use artillery_server::metrics::{self, Metrics};
use artillery_server::session::{GameMode, InMemoryDirectory, SessionContext, SessionDirectory, SessionSettings};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid {} '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Session settings from SESSION_NAME, GAME_MODE, UNIT_COUNT, UNIT_LIFE, TURNS_BEFORE_WATER
fn settings_from_env() -> SessionSettings {
    let defaults = SessionSettings::default();
    let game_mode = match std::env::var("GAME_MODE") {
        Ok(raw) => GameMode::parse(&raw).unwrap_or_else(|| {
            warn!("Unknown GAME_MODE '{}', using {}", raw, defaults.game_mode);
            defaults.game_mode
        }),
        Err(_) => defaults.game_mode,
    };

    SessionSettings {
        session_name: std::env::var("SESSION_NAME").unwrap_or(defaults.session_name),
        game_mode,
        unit_life: env_or("UNIT_LIFE", defaults.unit_life),
        unit_count: env_or("UNIT_COUNT", defaults.unit_count),
        turns_before_water: env_or("TURNS_BEFORE_WATER", defaults.turns_before_water),
        is_lan: true,
    }
}

fn local_player_from_env() -> PlayerLobbyInfo {
    PlayerLobbyInfo {
        profile_icon: env_or("PROFILE_ICON", 0),
        team_icon: env_or("TEAM_ICON", 0),
        ..PlayerLobbyInfo::new(std::env::var("PLAYER_NAME").unwrap_or_else(|_| "Player".to_string()))
            .with_id(env_or("PLAYER_ID", 0))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Artillery Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid configuration: {}", e);
    }
    info!(
        "Configuration loaded: beacon {}, reservation timeout {:?}, host slot {:?}",
        config.beacon_addr(),
        config.reservation_timeout,
        config.host_slot_policy
    );

    let metrics = Arc::new(Metrics::new());
    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let directory = Arc::new(InMemoryDirectory::new());
    let context = SessionContext::new(config.clone(), directory.clone(), metrics.clone(), local_player_from_env());

    let mut lobby_updates = context.subscribe_lobby_updates();
    tokio::spawn(async move {
        while let Ok(roster) = lobby_updates.recv().await {
            let names: Vec<&str> = roster.iter().map(|p| p.player_name.as_str()).collect();
            info!("Lobby: {} players [{}]", roster.len(), names.join(", "));
        }
    });

    let reservation = match std::env::var("JOIN_ADDRESS") {
        Ok(raw) => {
            // Seed the LAN directory with the host we were pointed at
            let ip: IpAddr = raw.parse()?;
            let host = SocketAddr::new(ip, config.beacon_port);
            directory.create_session(host, &SessionSettings::default())?;
            context.find_sessions(1, true)?;
            info!("Joining lobby at {}", host);
            context.join_session(0)?
        }
        Err(_) => {
            let settings = settings_from_env();
            info!(
                "Hosting '{}' ({}, {} units per player)",
                settings.session_name, settings.game_mode, settings.unit_count
            );
            context.create_session(settings).await?
        }
    };

    match reservation.await {
        Ok(true) => info!("Reservation granted"),
        Ok(false) | Err(_) => warn!("Reservation failed"),
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");

    if context.is_hosting() {
        if let Err(e) = context.destroy_session() {
            warn!("Failed to destroy session: {}", e);
        }
    } else if context.leave_lobby() {
        // Let the unregister frame reach the host before the runtime stops
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    info!("Server stopped");
    Ok(())
}
