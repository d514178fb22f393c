pub mod ban;
pub mod config;
pub mod logging;

// Log targets used across the crate
pub const APP_NAME: &str = "ban_warden";
pub const SERVICE_TARGET: &str = "ban_warden::service";
pub const STORE_TARGET: &str = "ban_warden::store";
pub const MIGRATION_TARGET: &str = "ban_warden::migration";
pub const CONSOLE_TARGET: &str = "ban_warden";

pub use ban::{
    Annotation, AnnotationKind, BanCache, BanError, BanEvent, BanRecord, BanResult, BanService,
    BanState, BanStore, CachedBan, ChannelSink, EventSink, LegacyBanRow, MigrationEngine, NullSink,
    PlayerRecord, SweepRequest,
};
pub use config::WardenConfig;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
