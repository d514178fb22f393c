//! One-shot legacy schema migration
//!
//! This module upgrades rows from the old flat ban schema into normalized
//! player/ban entities. The whole batch lands in a single atomic save that
//! also sets the persisted "schema upgraded" flag, so a fault leaves nothing
//! partial behind and a restart retries from scratch.

use crate::MIGRATION_TARGET;
use crate::ban::{
    Annotation, BanError, BanRecord, BanResult, BanState, BanStore, LegacyBanRow, PlayerRecord,
    normalize_name,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Transforms legacy flat ban rows into normalized entities, at most once
/// per store lifetime.
pub struct MigrationEngine {
    store: Arc<BanStore>,
}

impl MigrationEngine {
    pub fn new(store: Arc<BanStore>) -> Self {
        Self { store }
    }

    /// Run the migration if it has not already completed, returning the
    /// number of rows migrated. Once the upgraded flag is set this is a
    /// no-op even if legacy rows remain; they are considered consumed.
    ///
    /// # Errors
    /// Returns a `Migration` error if the batch save fails. Nothing partial
    /// is persisted and the upgraded flag stays unset, so the next run
    /// retries the full batch.
    pub async fn run(&self) -> BanResult<usize> {
        if self.store.is_upgraded() {
            info!(target: MIGRATION_TARGET, "Schema already upgraded, skipping migration");
            return Ok(0);
        }

        let rows = self.store.legacy_rows().to_vec();
        if rows.is_empty() {
            // Nothing to consume; still mark the schema upgraded
            self.store
                .save_migration_batch(Vec::new(), Vec::new())
                .await
                .map_err(|err| BanError::Migration(err.to_string()))?;
            return Ok(0);
        }

        let now = Utc::now();
        let mut players: HashMap<String, PlayerRecord> = HashMap::new();
        let mut bans: Vec<BanRecord> = Vec::new();
        // Tracks which subject already holds the Active slot in this batch
        let mut active_subjects: HashMap<String, usize> = HashMap::new();

        for row in &rows {
            for name in [&row.subject, &row.issuer] {
                let key = normalize_name(name);
                if self.store.find_player(name).is_none() {
                    players
                        .entry(key)
                        .or_insert_with(|| PlayerRecord::new(name.clone()));
                }
            }

            let mut ban = Self::convert_row(row, now);
            if ban.state == BanState::Active {
                let key = ban.subject_key();
                match active_subjects.get(&key).copied() {
                    // Two legacy rows both claim the Active slot; the older
                    // one is retired as history.
                    Some(index) if bans[index].created_at <= ban.created_at => {
                        warn!(
                            target: MIGRATION_TARGET,
                            subject = %ban.subject,
                            "Multiple active legacy bans for subject, keeping newest"
                        );
                        bans[index].state = BanState::Expired;
                        active_subjects.insert(key, bans.len());
                    }
                    Some(_) => {
                        warn!(
                            target: MIGRATION_TARGET,
                            subject = %ban.subject,
                            "Multiple active legacy bans for subject, keeping newest"
                        );
                        ban.state = BanState::Expired;
                    }
                    None => {
                        active_subjects.insert(key, bans.len());
                    }
                }
            }
            bans.push(ban);
        }

        let migrated = bans.len();
        self.store
            .save_migration_batch(players.into_values().collect(), bans)
            .await
            .map_err(|err| BanError::Migration(err.to_string()))?;

        info!(target: MIGRATION_TARGET, migrated, "Legacy ban records migrated");
        Ok(migrated)
    }

    /// Build a normalized ban record from a legacy row, preserving the
    /// original timestamps exactly. A legacy expiry already in the past
    /// lands directly in Expired.
    fn convert_row(row: &LegacyBanRow, now: DateTime<Utc>) -> BanRecord {
        let created_at = DateTime::from_timestamp_millis(row.created_at).unwrap_or(now);
        let expires_at = if row.expires_at == 0 {
            None
        } else {
            DateTime::from_timestamp_millis(row.expires_at)
        };
        let state = match expires_at {
            Some(expires_at) if expires_at <= now => BanState::Expired,
            _ => BanState::Active,
        };

        let mut reason = Annotation::reason(row.issuer.clone(), row.reason.clone());
        reason.created_at = created_at;

        BanRecord {
            id: Uuid::new_v4().to_string(),
            subject: row.subject.clone(),
            issuer: row.issuer.clone(),
            reason,
            comments: Vec::new(),
            state,
            created_at,
            expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("ban-warden-migration-{}", Uuid::new_v4()))
    }

    fn legacy_row(subject: &str, issuer: &str, created_at: i64, expires_at: i64) -> LegacyBanRow {
        LegacyBanRow {
            subject: subject.to_string(),
            issuer: issuer.to_string(),
            reason: format!("legacy reason for {subject}"),
            created_at,
            expires_at,
        }
    }

    async fn store_with_rows(dir: &PathBuf, rows: &[LegacyBanRow]) -> Arc<BanStore> {
        tokio::fs::create_dir_all(dir).await.unwrap();
        let yaml = serde_yaml::to_string(rows).unwrap();
        tokio::fs::write(dir.join("legacy_bans.yaml"), yaml)
            .await
            .unwrap();
        Arc::new(BanStore::open(dir).await.unwrap())
    }

    #[tokio::test]
    async fn test_migrates_rows_and_preserves_timestamps() {
        let dir = temp_dir();
        let created = Utc::now().timestamp_millis() - 86_400_000;
        let expires = Utc::now().timestamp_millis() + 86_400_000;
        let store = store_with_rows(
            &dir,
            &[
                legacy_row("Alice", "Console", created, 0),
                legacy_row("Bob", "Console", created, expires),
            ],
        )
        .await;

        let migrated = MigrationEngine::new(Arc::clone(&store)).run().await.unwrap();
        assert_eq!(migrated, 2);
        assert!(store.is_upgraded());

        let alice = store.active_ban_for("alice").unwrap();
        assert_eq!(alice.created_at.timestamp_millis(), created);
        assert!(alice.expires_at.is_none());
        assert_eq!(alice.reason.text, "legacy reason for Alice");

        let bob = store.active_ban_for("bob").unwrap();
        assert_eq!(bob.expires_at.unwrap().timestamp_millis(), expires);

        // Subject and issuer identities were both created
        assert!(store.find_player("alice").is_some());
        assert!(store.find_player("console").is_some());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_past_expiry_lands_expired() {
        let dir = temp_dir();
        let created = Utc::now().timestamp_millis() - 86_400_000;
        let expired = Utc::now().timestamp_millis() - 3_600_000;
        let store = store_with_rows(&dir, &[legacy_row("Alice", "Console", created, expired)]).await;

        let migrated = MigrationEngine::new(Arc::clone(&store)).run().await.unwrap();
        assert_eq!(migrated, 1);

        assert!(store.active_ban_for("alice").is_none());
        let history = store.bans_for("alice");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].state, BanState::Expired);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let dir = temp_dir();
        let created = Utc::now().timestamp_millis() - 86_400_000;
        let store = store_with_rows(&dir, &[legacy_row("Alice", "Console", created, 0)]).await;

        let engine = MigrationEngine::new(Arc::clone(&store));
        assert_eq!(engine.run().await.unwrap(), 1);
        assert_eq!(engine.run().await.unwrap(), 0);
        assert_eq!(store.count_bans(), 1);

        // Still idempotent across a reopen, legacy rows untouched on disk
        let reopened = Arc::new(BanStore::open(&dir).await.unwrap());
        assert_eq!(reopened.legacy_rows().len(), 1);
        assert_eq!(MigrationEngine::new(Arc::clone(&reopened)).run().await.unwrap(), 0);
        assert_eq!(reopened.count_bans(), 1);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_batch_surfaces_as_migration_error() {
        let dir = temp_dir();
        let created = Utc::now().timestamp_millis() - 86_400_000;
        let store = store_with_rows(&dir, &[legacy_row("Alice", "Console", created, 0)]).await;

        // A directory squatting on the temp file path makes the flush fail
        tokio::fs::create_dir_all(dir.join("bans.yaml.tmp")).await.unwrap();

        let result = MigrationEngine::new(Arc::clone(&store)).run().await;
        assert!(matches!(result, Err(BanError::Migration(_))));

        // Nothing partial persisted and the flag stays unset, so a restart
        // retries the full batch
        assert!(!store.is_upgraded());
        assert_eq!(store.count_bans(), 0);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_names_create_one_identity() {
        let dir = temp_dir();
        let created = Utc::now().timestamp_millis() - 86_400_000;
        let expired = Utc::now().timestamp_millis() - 3_600_000;
        let store = store_with_rows(
            &dir,
            &[
                legacy_row("ALICE", "Console", created, expired),
                legacy_row("alice", "console", created + 1000, 0),
            ],
        )
        .await;

        let migrated = MigrationEngine::new(Arc::clone(&store)).run().await.unwrap();
        assert_eq!(migrated, 2);

        // One identity per case-insensitive name
        assert_eq!(store.bans_for("Alice").len(), 2);
        assert!(store.find_player("aLiCe").is_some());
        // Only the non-expired row holds the Active slot
        let active = store.active_ban_for("alice").unwrap();
        assert!(active.expires_at.is_none());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_two_active_rows_keep_newest() {
        let dir = temp_dir();
        let base = Utc::now().timestamp_millis() - 86_400_000;
        let store = store_with_rows(
            &dir,
            &[
                legacy_row("Alice", "Console", base, 0),
                legacy_row("Alice", "Console", base + 60_000, 0),
            ],
        )
        .await;

        MigrationEngine::new(Arc::clone(&store)).run().await.unwrap();

        let history = store.bans_for("alice");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].state, BanState::Expired);
        assert_eq!(history[1].state, BanState::Active);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
