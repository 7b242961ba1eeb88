//! Session lifecycle: advertise, search, join and tear down

pub mod context;
pub mod directory;
pub mod settings;

pub use context::{SessionContext, SessionError};
pub use directory::{DirectoryError, InMemoryDirectory, SessionDirectory, SessionInfo};
pub use settings::{GameMode, SessionSettings};
