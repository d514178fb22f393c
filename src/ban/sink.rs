//! Lifecycle events emitted by the ban service
//!
//! The service never kicks a connected session or renders a message itself;
//! it emits an event carrying the ban snapshot and the caller's notify flag,
//! and the enforcement/messaging collaborator reacts from the other side of
//! the sink.

use crate::ban::CachedBan;
use tokio::sync::mpsc::Sender;
use tracing::warn;

/// Ban lifecycle event
#[derive(Debug, Clone)]
pub enum BanEvent {
    /// A new ban was created
    Created { ban: CachedBan, notify: bool },
    /// An active ban was pardoned
    Pardoned { ban: CachedBan, notify: bool },
}

impl BanEvent {
    /// The snapshot carried by this event
    #[must_use]
    pub fn ban(&self) -> &CachedBan {
        match self {
            Self::Created { ban, .. } | Self::Pardoned { ban, .. } => ban,
        }
    }

    /// Whether the collaborator should produce user-visible messaging
    #[must_use]
    pub fn notify(&self) -> bool {
        match self {
            Self::Created { notify, .. } | Self::Pardoned { notify, .. } => *notify,
        }
    }
}

/// Injectable sink for ban lifecycle events
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn notify(&self, event: BanEvent);
}

/// Sink that forwards events into an mpsc channel for the collaborator task
pub struct ChannelSink {
    tx: Sender<BanEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<BanEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait::async_trait]
impl EventSink for ChannelSink {
    async fn notify(&self, event: BanEvent) {
        if let Err(err) = self.tx.send(event).await {
            warn!("Ban event dropped, no collaborator listening: {err}");
        }
    }
}

/// Sink that discards every event
pub struct NullSink;

#[async_trait::async_trait]
impl EventSink for NullSink {
    async fn notify(&self, _event: BanEvent) {}
}
