//! Ban service
//!
//! This module provides the public façade for creating, pardoning and
//! querying bans. It is the only component clients call: every mutation goes
//! through the store and keeps the cache synchronized before returning, and
//! lifecycle events are emitted to the injected sink.

use crate::SERVICE_TARGET;
use crate::ban::{
    Annotation, BanCache, BanEvent, BanRecord, BanResult, BanState, BanStore, CachedBan,
    EventSink, SweepRequest,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::Receiver;
use tokio::time::Duration;
use tracing::{error, info};

/// Façade over the ban store and cache
#[derive(Clone)]
pub struct BanService {
    store: Arc<BanStore>,
    cache: BanCache,
    sink: Arc<dyn EventSink>,
    /// Serializes mutations so two racing bans for the same name cannot both
    /// create an active record
    mutation_lock: Arc<Mutex<()>>,
}

impl BanService {
    /// Create a new service over an opened store. Call [`reload_cache`]
    /// before serving queries.
    ///
    /// [`reload_cache`]: BanService::reload_cache
    pub fn new(store: Arc<BanStore>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            cache: BanCache::new(),
            sink,
            mutation_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Rebuild the cache from the full store contents
    pub fn reload_cache(&self) {
        self.cache.rebuild(&self.store.all_bans());
        info!(
            target: SERVICE_TARGET,
            active = self.cache.active_count(),
            "Ban cache rebuilt"
        );
    }

    /// Ban a player. A `duration_ms` of zero creates a permanent ban.
    ///
    /// Returns `false` without touching any record if the player already has
    /// an active ban.
    ///
    /// # Errors
    /// Returns a `Storage` error if persisting the new record fails; nothing
    /// partial is applied.
    pub async fn ban_player(
        &self,
        subject: &str,
        issuer: &str,
        reason: &str,
        duration_ms: u64,
        notify: bool,
    ) -> BanResult<bool> {
        let _guard = self.mutation_lock.lock().await;

        if self.cache.contains_active(subject) {
            return Ok(false);
        }
        // The cache only indexes enforceable bans; a record past its expiry
        // may still sit in state Active in the store. Retire it here so the
        // new ban is the only active one.
        if let Some(mut stale) = self.store.active_ban_for(subject) {
            if stale.is_enforceable(Utc::now()) {
                return Ok(false);
            }
            stale.expire()?;
            self.store.update_ban(stale).await?;
        }

        // Known identities keep their first-seen case; new ones are created
        // by save_ban so a failed flush rolls all three entities back
        let subject_name = self
            .store
            .find_player(subject)
            .map_or_else(|| subject.to_string(), |player| player.name);
        let issuer_name = self
            .store
            .find_player(issuer)
            .map_or_else(|| issuer.to_string(), |player| player.name);
        let record = BanRecord::new(
            subject_name,
            issuer_name.clone(),
            Annotation::reason(issuer_name, reason),
            duration_ms,
        );

        self.store.save_ban(subject, issuer, record.clone()).await?;
        self.cache.put(&record);

        info!(
            target: SERVICE_TARGET,
            ban_id = %record.id,
            subject = %record.subject,
            issuer = %record.issuer,
            permanent = record.expires_at.is_none(),
            "Ban created"
        );

        self.sink
            .notify(BanEvent::Created {
                ban: CachedBan::from(&record),
                notify,
            })
            .await;

        Ok(true)
    }

    /// Pardon a player's active ban. Returns `false` if the player has no
    /// active ban on record.
    ///
    /// # Errors
    /// Returns a `Storage` error if persisting the transition fails.
    pub async fn pardon_player(&self, subject: &str, issuer: &str, notify: bool) -> BanResult<bool> {
        let _guard = self.mutation_lock.lock().await;

        if !self.cache.contains_active(subject) {
            return Ok(false);
        }
        let Some(mut record) = self.store.active_ban_for(subject) else {
            // Cache drift; repair the index and report no active ban
            self.cache.remove(subject);
            return Ok(false);
        };

        record.pardon()?;
        self.store.update_ban(record.clone()).await?;
        self.cache.remove(subject);

        info!(
            target: SERVICE_TARGET,
            ban_id = %record.id,
            subject = %record.subject,
            issuer = %issuer,
            "Ban pardoned"
        );

        self.sink
            .notify(BanEvent::Pardoned {
                ban: CachedBan::from(&record),
                notify,
            })
            .await;

        Ok(true)
    }

    /// Whether a player currently has an active ban
    pub fn is_player_banned(&self, subject: &str) -> bool {
        self.cache.contains_active(subject)
    }

    /// The player's current active ban, if any
    pub fn get_player_ban(&self, subject: &str) -> Option<CachedBan> {
        self.cache.get(subject)
    }

    /// Full ban history for a player, ordered by creation time ascending.
    /// A player with no bans on record yields an empty vec.
    pub fn get_player_bans(&self, subject: &str) -> Vec<CachedBan> {
        self.store
            .bans_for(subject)
            .iter()
            .map(CachedBan::from)
            .collect()
    }

    /// Append a follow-up comment to a player's active ban. Returns `false`
    /// if the player has no active ban.
    ///
    /// # Errors
    /// Returns a `Storage` error if persisting the updated record fails.
    pub async fn add_ban_comment(
        &self,
        subject: &str,
        author: &str,
        text: &str,
    ) -> BanResult<bool> {
        let _guard = self.mutation_lock.lock().await;

        let Some(mut record) = self.store.active_ban_for(subject) else {
            return Ok(false);
        };
        let author_record = self.store.upsert_player(author);
        record.add_comment(Annotation::comment(author_record.name, text));

        self.store.update_ban(record.clone()).await?;
        self.cache.put(&record);
        Ok(true)
    }

    /// Replace the reason on a player's active ban. Returns `false` if the
    /// player has no active ban.
    ///
    /// # Errors
    /// Returns a `Storage` error if persisting the updated record fails.
    pub async fn replace_ban_reason(
        &self,
        subject: &str,
        author: &str,
        text: &str,
    ) -> BanResult<bool> {
        let _guard = self.mutation_lock.lock().await;

        let Some(mut record) = self.store.active_ban_for(subject) else {
            return Ok(false);
        };
        let author_record = self.store.upsert_player(author);
        record.replace_reason(Annotation::reason(author_record.name, text));

        self.store.update_ban(record.clone()).await?;
        self.cache.put(&record);
        Ok(true)
    }

    /// Transition every active ban past its expiry time to Expired and drop
    /// it from the cache. Returns the number of bans expired.
    ///
    /// # Errors
    /// Returns a `Storage` error if persisting a transition fails; bans
    /// already transitioned stay transitioned.
    pub async fn expire_due_bans(&self) -> BanResult<usize> {
        let _guard = self.mutation_lock.lock().await;

        let now = Utc::now();
        let due = self
            .store
            .bans_where(|ban| ban.state == BanState::Active && ban.has_expired(now));

        let mut expired = 0;
        for mut record in due {
            record.expire()?;
            self.store.update_ban(record.clone()).await?;
            self.cache.remove(&record.subject);
            expired += 1;
        }

        if expired > 0 {
            info!(target: SERVICE_TARGET, expired, "Timed bans expired");
        }
        Ok(expired)
    }

    /// Spawn the periodic expiry sweep. The task services on-demand
    /// [`SweepRequest`]s between ticks and exits on `Shutdown`.
    pub fn start_sweep_task(&self, rx: Receiver<SweepRequest>, interval_seconds: u64) {
        let service = self.clone();
        tokio::spawn(async move {
            service.sweep_task(rx, interval_seconds).await;
        });
    }

    async fn sweep_task(&self, mut rx: Receiver<SweepRequest>, interval_seconds: u64) {
        info!(
            target: SERVICE_TARGET,
            "Starting ban expiry sweep with {interval_seconds}s interval"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));

        loop {
            tokio::select! {
                Some(request) = rx.recv() => {
                    match request {
                        SweepRequest::CheckAll => {
                            if let Err(e) = self.expire_due_bans().await {
                                error!(target: SERVICE_TARGET, "Error expiring due bans: {e}");
                            }
                        }
                        SweepRequest::CheckPlayer { name } => {
                            if let Err(e) = self.check_player_expiry(&name).await {
                                error!(
                                    target: SERVICE_TARGET,
                                    "Error checking ban expiry for {name}: {e}"
                                );
                            }
                        }
                        SweepRequest::Shutdown => {
                            info!(target: SERVICE_TARGET, "Ban expiry sweep shutting down");
                            break;
                        }
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.expire_due_bans().await {
                        error!(target: SERVICE_TARGET, "Error in periodic expiry sweep: {e}");
                    }
                }
            }
        }
    }

    /// Expire a single player's active ban if its time has lapsed
    async fn check_player_expiry(&self, subject: &str) -> BanResult<()> {
        let _guard = self.mutation_lock.lock().await;

        let Some(mut record) = self.store.active_ban_for(subject) else {
            return Ok(());
        };
        if record.has_expired(Utc::now()) {
            record.expire()?;
            self.store.update_ban(record.clone()).await?;
            self.cache.remove(&record.subject);
        }
        Ok(())
    }
}
