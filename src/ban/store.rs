//! Durable ban storage
//!
//! This module owns the durable lifetime of all ban entities. State is held
//! in concurrent maps and flushed to a single YAML document per save, so a
//! multi-entity save lands all together or not at all.

use crate::STORE_TARGET;
use crate::ban::{BanError, BanRecord, BanResult, BanState, LegacyBanRow, PlayerRecord, normalize_name};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Main store file, one whole-store YAML document
const STORE_FILE: &str = "bans.yaml";
/// Pre-upgrade flat schema rows; read-only input to migration
const LEGACY_FILE: &str = "legacy_bans.yaml";

/// On-disk shape of the store
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    /// Set once the legacy schema migration has completed
    schema_upgraded: bool,
    players: Vec<PlayerRecord>,
    bans: Vec<BanRecord>,
}

/// Durable storage for player identities and ban records
pub struct BanStore {
    data_dir: PathBuf,
    /// Map of normalized player name -> identity record
    players: DashMap<String, PlayerRecord>,
    /// Map of ban id -> ban record
    bans: DashMap<String, BanRecord>,
    /// Legacy rows loaded at open time; never written back
    legacy: Vec<LegacyBanRow>,
    upgraded: AtomicBool,
}

impl BanStore {
    /// Open the store rooted at `data_dir`, loading any existing state and
    /// legacy rows. A missing file is an empty store, not an error.
    ///
    /// # Errors
    /// Returns a `Storage` error if a store file exists but cannot be read
    /// or parsed.
    pub async fn open(data_dir: impl Into<PathBuf>) -> BanResult<Self> {
        let data_dir = data_dir.into();

        let state = match Self::read_yaml::<StoreState>(&data_dir.join(STORE_FILE)).await? {
            Some(state) => state,
            None => StoreState::default(),
        };
        let legacy = Self::read_yaml::<Vec<LegacyBanRow>>(&data_dir.join(LEGACY_FILE))
            .await?
            .unwrap_or_default();

        let store = Self {
            data_dir,
            players: DashMap::new(),
            bans: DashMap::new(),
            legacy,
            upgraded: AtomicBool::new(state.schema_upgraded),
        };
        for player in state.players {
            store.players.insert(player.key(), player);
        }
        for ban in state.bans {
            store.bans.insert(ban.id.clone(), ban);
        }

        info!(
            target: STORE_TARGET,
            players = store.players.len(),
            bans = store.bans.len(),
            legacy_rows = store.legacy.len(),
            upgraded = store.is_upgraded(),
            "Ban store opened"
        );

        Ok(store)
    }

    async fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> BanResult<Option<T>> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(serde_yaml::from_str(&contents)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Whether the one-shot legacy migration has already completed
    pub fn is_upgraded(&self) -> bool {
        self.upgraded.load(Ordering::SeqCst)
    }

    /// Rows from the pre-upgrade flat schema
    pub fn legacy_rows(&self) -> &[LegacyBanRow] {
        &self.legacy
    }

    /// Find the identity record for a player, if one exists
    pub fn find_player(&self, name: &str) -> Option<PlayerRecord> {
        self.players
            .get(&normalize_name(name))
            .map(|entry| entry.value().clone())
    }

    /// Find or create the identity record for a player. The stored record
    /// keeps the case of the first reference.
    pub fn upsert_player(&self, name: &str) -> PlayerRecord {
        self.players
            .entry(normalize_name(name))
            .or_insert_with(|| PlayerRecord::new(name))
            .value()
            .clone()
    }

    /// Get a ban record by id
    pub fn get_ban(&self, id: &str) -> Option<BanRecord> {
        self.bans.get(id).map(|entry| entry.value().clone())
    }

    /// All ban records matching a predicate
    pub fn bans_where(&self, predicate: impl Fn(&BanRecord) -> bool) -> Vec<BanRecord> {
        self.bans
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Full ban history for a player, ordered by creation time ascending
    pub fn bans_for(&self, subject: &str) -> Vec<BanRecord> {
        let key = normalize_name(subject);
        let mut bans = self.bans_where(|ban| ban.subject_key() == key);
        bans.sort_by_key(|ban| ban.created_at);
        bans
    }

    /// The ban currently in state Active for a player, if any
    pub fn active_ban_for(&self, subject: &str) -> Option<BanRecord> {
        let key = normalize_name(subject);
        self.bans
            .iter()
            .find(|entry| {
                entry.value().state == BanState::Active && entry.value().subject_key() == key
            })
            .map(|entry| entry.value().clone())
    }

    /// Total number of ban records on file
    pub fn count_bans(&self) -> usize {
        self.bans.len()
    }

    /// All ban records
    pub fn all_bans(&self) -> Vec<BanRecord> {
        self.bans.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Persist a new ban together with both player identities as a single
    /// atomic unit.
    ///
    /// # Errors
    /// Returns a `Storage` error if the flush fails; in that case the
    /// in-memory maps are rolled back and nothing is applied.
    pub async fn save_ban(&self, subject: &str, issuer: &str, ban: BanRecord) -> BanResult<()> {
        let inserted_subject = self.insert_player_if_absent(subject);
        let inserted_issuer = self.insert_player_if_absent(issuer);
        let ban_id = ban.id.clone();
        self.bans.insert(ban_id.clone(), ban);

        if let Err(err) = self.flush().await {
            self.bans.remove(&ban_id);
            if let Some(key) = inserted_subject {
                self.players.remove(&key);
            }
            if let Some(key) = inserted_issuer {
                self.players.remove(&key);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Persist an updated ban record, replacing the stored version.
    ///
    /// # Errors
    /// Returns `NotFound` if no record with that id exists, or a `Storage`
    /// error if the flush fails (the previous version is restored).
    pub async fn update_ban(&self, ban: BanRecord) -> BanResult<()> {
        let previous = match self.bans.get(&ban.id) {
            Some(entry) => entry.value().clone(),
            None => return Err(BanError::NotFound(ban.id.clone())),
        };
        self.bans.insert(ban.id.clone(), ban.clone());

        if let Err(err) = self.flush().await {
            self.bans.insert(ban.id.clone(), previous);
            return Err(err);
        }
        Ok(())
    }

    /// Persist a full migration batch and mark the schema upgraded, all in
    /// one flush. Used exactly once by the migration engine.
    ///
    /// # Errors
    /// Returns a `Storage` error if the flush fails; the batch and the
    /// upgraded flag are rolled back together.
    pub async fn save_migration_batch(
        &self,
        players: Vec<PlayerRecord>,
        bans: Vec<BanRecord>,
    ) -> BanResult<()> {
        let mut inserted_players = Vec::new();
        for player in players {
            if let Some(key) = self.insert_player_if_absent(&player.name) {
                inserted_players.push(key);
            }
        }
        let inserted_bans: Vec<String> = bans.iter().map(|ban| ban.id.clone()).collect();
        for ban in bans {
            self.bans.insert(ban.id.clone(), ban);
        }
        self.upgraded.store(true, Ordering::SeqCst);

        if let Err(err) = self.flush().await {
            self.upgraded.store(false, Ordering::SeqCst);
            for id in &inserted_bans {
                self.bans.remove(id);
            }
            for key in &inserted_players {
                self.players.remove(key);
            }
            return Err(err);
        }
        Ok(())
    }

    fn insert_player_if_absent(&self, name: &str) -> Option<String> {
        let key = normalize_name(name);
        match self.players.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(PlayerRecord::new(name));
                Some(key)
            }
        }
    }

    /// Write the whole store state out as one document. The temp-then-rename
    /// dance keeps a crashed write from clobbering the previous state.
    async fn flush(&self) -> BanResult<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let state = StoreState {
            schema_upgraded: self.is_upgraded(),
            players: self.players.iter().map(|e| e.value().clone()).collect(),
            bans: self.all_bans(),
        };
        let yaml = serde_yaml::to_string(&state)?;

        let path = self.data_dir.join(STORE_FILE);
        let tmp = self.data_dir.join(format!("{STORE_FILE}.tmp"));
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
