//! In-memory ban cache
//!
//! This module provides the in-memory index of currently active bans, keyed
//! by normalized player name. The cache is a derived, rebuildable view over
//! the store and is never a source of truth.

use crate::ban::{BanRecord, CachedBan, normalize_name};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

/// Index of normalized player name -> current active ban snapshot
#[derive(Clone)]
pub struct BanCache {
    bans: Arc<DashMap<String, CachedBan>>,
}

impl Default for BanCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BanCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            bans: Arc::new(DashMap::new()),
        }
    }

    /// Replace the entire index from a sequence of ban records. Only records
    /// that are currently enforceable are inserted.
    pub fn rebuild(&self, records: &[BanRecord]) {
        let now = Utc::now();
        self.bans.clear();
        for record in records {
            if record.is_enforceable(now) {
                self.bans.insert(record.subject_key(), CachedBan::from(record));
            }
        }
    }

    /// Insert or replace the snapshot for a record's subject
    pub fn put(&self, record: &BanRecord) {
        self.bans.insert(record.subject_key(), CachedBan::from(record));
    }

    /// Drop the snapshot for a player
    pub fn remove(&self, name: &str) -> Option<(String, CachedBan)> {
        self.bans.remove(&normalize_name(name))
    }

    /// Get the active ban snapshot for a player, if any. A snapshot whose
    /// expiry has lapsed since it was inserted is treated as absent, the
    /// same way `rebuild` would have filtered it.
    pub fn get(&self, name: &str) -> Option<CachedBan> {
        self.bans
            .get(&normalize_name(name))
            .map(|entry| entry.value().clone())
            .filter(CachedBan::is_active)
    }

    /// Whether a player currently has an active ban
    pub fn contains_active(&self, name: &str) -> bool {
        self.bans
            .get(&normalize_name(name))
            .is_some_and(|entry| entry.value().is_active())
    }

    /// Number of active bans in the index
    pub fn active_count(&self) -> usize {
        self.bans
            .iter()
            .filter(|entry| entry.value().is_active())
            .count()
    }

    /// Normalized names of all currently banned players
    pub fn banned_names(&self) -> Vec<String> {
        self.bans
            .iter()
            .filter(|entry| entry.value().is_active())
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ban::Annotation;

    fn ban(subject: &str) -> BanRecord {
        BanRecord::new(subject, "console", Annotation::reason("console", "test"), 0)
    }

    #[test]
    fn test_put_get_remove() {
        let cache = BanCache::new();
        let record = ban("Alice");

        cache.put(&record);
        assert!(cache.contains_active("alice"));
        assert!(cache.contains_active("ALICE"));
        assert_eq!(cache.get("Alice").unwrap().subject(), "Alice");

        cache.remove("aLiCe");
        assert!(!cache.contains_active("Alice"));
        assert!(cache.get("Alice").is_none());
    }

    #[test]
    fn test_rebuild_only_keeps_enforceable() {
        let cache = BanCache::new();
        cache.put(&ban("Stale"));

        let active = ban("Alice");
        let mut pardoned = ban("Bob");
        pardoned.pardon().unwrap();
        let mut expired = ban("Carol");
        expired.expire().unwrap();

        cache.rebuild(&[active, pardoned, expired]);

        assert_eq!(cache.active_count(), 1);
        assert!(cache.contains_active("alice"));
        assert!(!cache.contains_active("bob"));
        assert!(!cache.contains_active("carol"));
        // Rebuild replaces the whole index
        assert!(!cache.contains_active("stale"));
    }

    #[test]
    fn test_lapsed_snapshot_treated_as_absent() {
        let cache = BanCache::new();
        let mut record = ban("Alice");
        record.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
        cache.put(&record);

        // The entry lapsed in place; every lookup must agree with what a
        // rebuild would produce
        assert!(!cache.contains_active("Alice"));
        assert!(cache.get("Alice").is_none());
        assert_eq!(cache.active_count(), 0);
        assert!(cache.banned_names().is_empty());
        // The raw entry is still there to be replaced or removed
        assert!(cache.remove("Alice").is_some());
    }

    #[test]
    fn test_banned_names_are_normalized() {
        let cache = BanCache::new();
        cache.put(&ban("AlIcE"));

        assert_eq!(cache.banned_names(), vec!["alice".to_string()]);
    }
}
