/// Networking constants
pub mod net {
    /// Maximum reliable message size
    pub const MAX_MESSAGE_SIZE: usize = 65536;
    /// Beacon host listen port
    pub const BEACON_PORT: u16 = 7787;
    /// Loopback address the host uses to reach its own beacon
    pub const LOOPBACK_HOST: &str = "127.0.0.1";
    /// Default reservation handshake timeout in seconds
    pub const RESERVATION_TIMEOUT_SECS: u64 = 10;
}

/// Lobby and session constants
pub mod lobby {
    /// Maximum number of session search results
    pub const MAX_SEARCH_RESULTS: usize = 100;
    /// Default slot count when the game mode is unknown
    pub const FALLBACK_MAX_PLAYERS: u32 = 2;
    /// Default units per player before the host overrides it
    pub const DEFAULT_UNIT_COUNT: i32 = 1;
    /// Player id meaning "not assigned yet"
    pub const UNASSIGNED_PLAYER_ID: i32 = 0;
    /// Mask applied to generated player ids (positive 31-bit)
    pub const PLAYER_ID_MASK: u64 = 0x7FFF_FFFF;

    /// Advertised session setting keys
    pub mod keys {
        pub const SESSION_NAME: &str = "SETTING_SESSIONNAME";
        pub const GAME_MODE: &str = "GAME_MODE";
        pub const UNIT_LIFE: &str = "UNIT_LIFE";
        pub const UNIT_COUNT: &str = "UNIT_COUNT";
        pub const TURNS_BEFORE_WATER: &str = "TURNS_BEFORE_WATER";
    }
}

/// Destructible terrain constants
pub mod terrain {
    /// Pixels with alpha strictly above this are solid
    pub const SOLID_ALPHA_THRESHOLD: u8 = 10;
    /// Bytes per RGBA8 pixel
    pub const BYTES_PER_PIXEL: usize = 4;
    /// Alpha channel byte offset inside a pixel
    pub const ALPHA_OFFSET: usize = 3;
    /// Default world-space map size (width, height)
    pub const DEFAULT_WORLD_WIDTH: f32 = 4096.0;
    pub const DEFAULT_WORLD_HEIGHT: f32 = 1024.0;
    /// Default collision contour stride in pixels
    /// 1 = every column, 4 = one sample every 4 columns
    pub const DEFAULT_COLLISION_STRIDE: u32 = 4;
    /// Default extrusion thickness along the depth axis
    /// Must exceed the character capsule diameter so it cannot tunnel through
    pub const DEFAULT_COLLISION_THICKNESS: f32 = 100.0;
    /// Distance below the map bottom where the collision floor sits
    pub const DEFAULT_FLOOR_MARGIN: f32 = 50.0;
}
