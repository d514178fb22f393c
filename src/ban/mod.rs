//! Ban record store and cache subsystem
//!
//! This module keeps the authoritative record of player bans: durable
//! storage, the in-memory active-ban index, the public service façade, and
//! the one-shot migration that upgrades the legacy flat schema.

mod cache;
mod error;
mod migration;
mod record;
mod service;
mod sink;
mod store;

pub use cache::BanCache;
pub use error::{BanError, BanResult};
pub use migration::MigrationEngine;
pub use record::{
    Annotation, AnnotationKind, BanRecord, BanState, CachedBan, LegacyBanRow, PlayerRecord,
    normalize_name,
};
pub use service::BanService;
pub use sink::{BanEvent, ChannelSink, EventSink, NullSink};
pub use store::BanStore;

/// Request type for the expiry sweep task
#[derive(Debug, Clone)]
pub enum SweepRequest {
    /// Expire every ban past its expiry time
    CheckAll,
    /// Check a specific player's active ban
    CheckPlayer { name: String },
    /// Shut down the sweep task
    Shutdown,
}
