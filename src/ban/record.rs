//! Ban record and state management
//!
//! This module defines the normalized ban entities and the state machine for
//! the ban lifecycle.

use crate::ban::{BanError, BanResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Normalize a player name into its case-insensitive lookup key.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
}

/// A player identity, created on first reference by any ban operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Player name as first seen (display case)
    pub name: String,
    /// When the identity was first recorded
    pub created_at: DateTime<Utc>,
}

impl PlayerRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    /// The normalized lookup key for this identity
    #[must_use]
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Kind of free-text annotation attached to a ban
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationKind {
    /// The reason the ban was issued; exactly one per ban, replaceable
    Reason,
    /// A follow-up comment; append-only
    Comment,
}

/// Free-text annotation (reason or comment) on a ban record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    /// Name of the player who wrote the annotation
    pub author: String,
    pub kind: AnnotationKind,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    pub fn reason(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            kind: AnnotationKind::Reason,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn comment(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            kind: AnnotationKind::Comment,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Ban lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BanState {
    /// Currently preventing the subject from joining
    Active,
    /// Explicitly lifted by a moderator (terminal)
    Pardoned,
    /// Lapsed by reaching its expiry time (terminal)
    Expired,
}

impl Default for BanState {
    fn default() -> Self {
        Self::Active
    }
}

impl std::fmt::Display for BanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Pardoned => write!(f, "Pardoned"),
            Self::Expired => write!(f, "Expired"),
        }
    }
}

/// The central ban entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanRecord {
    /// Unique ID of this ban
    pub id: String,
    /// Name of the banned player (display case)
    pub subject: String,
    /// Name of the player who issued the ban
    pub issuer: String,
    /// Why the ban was issued
    pub reason: Annotation,
    /// Follow-up comments, in insertion order
    pub comments: Vec<Annotation>,
    /// Current lifecycle state
    pub state: BanState,
    /// When the ban was created
    pub created_at: DateTime<Utc>,
    /// When the ban lapses; `None` means it never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl BanRecord {
    /// Create a new active ban. A `duration_ms` of zero denotes a permanent
    /// ban that never expires.
    pub fn new(
        subject: impl Into<String>,
        issuer: impl Into<String>,
        reason: Annotation,
        duration_ms: u64,
    ) -> Self {
        let now = Utc::now();
        let expires_at = if duration_ms == 0 {
            None
        } else {
            Some(now + Duration::milliseconds(duration_ms as i64))
        };

        Self {
            id: Uuid::new_v4().to_string(),
            subject: subject.into(),
            issuer: issuer.into(),
            reason,
            comments: Vec::new(),
            state: BanState::Active,
            created_at: now,
            expires_at,
        }
    }

    /// Normalized lookup key of the banned player
    #[must_use]
    pub fn subject_key(&self) -> String {
        normalize_name(&self.subject)
    }

    /// Normalized lookup key of the issuing player
    #[must_use]
    pub fn issuer_key(&self) -> String {
        normalize_name(&self.issuer)
    }

    /// Whether the expiry time has passed. Permanent bans never expire.
    #[must_use]
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Whether this ban is currently keeping the subject out: state Active
    /// and not past its expiry time.
    #[must_use]
    pub fn is_enforceable(&self, now: DateTime<Utc>) -> bool {
        self.state == BanState::Active && !self.has_expired(now)
    }

    /// Pardon this ban, transitioning to Pardoned
    ///
    /// # Errors
    /// Returns an error if the record is not in the Active state
    pub fn pardon(&mut self) -> BanResult<()> {
        if self.state != BanState::Active {
            return Err(BanError::InvalidStateTransition);
        }

        self.state = BanState::Pardoned;

        info!(
            ban_id = %self.id,
            subject = %self.subject,
            issuer = %self.issuer,
            "Ban pardoned"
        );

        Ok(())
    }

    /// Expire this ban, transitioning to Expired
    ///
    /// # Errors
    /// Returns an error if the record is not in the Active state
    pub fn expire(&mut self) -> BanResult<()> {
        if self.state != BanState::Active {
            return Err(BanError::InvalidStateTransition);
        }

        self.state = BanState::Expired;

        info!(
            ban_id = %self.id,
            subject = %self.subject,
            "Ban expired"
        );

        Ok(())
    }

    /// Append a follow-up comment to this ban
    pub fn add_comment(&mut self, comment: Annotation) {
        debug_assert_eq!(comment.kind, AnnotationKind::Comment);
        self.comments.push(comment);
    }

    /// Replace the reason annotation. Reasons are swapped, never appended.
    pub fn replace_reason(&mut self, reason: Annotation) {
        debug_assert_eq!(reason.kind, AnnotationKind::Reason);
        self.reason = reason;
    }
}

/// An immutable, read-only snapshot of a ban record, safe to hand out to
/// callers; holding one cannot corrupt the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedBan {
    subject: String,
    issuer: String,
    reason: String,
    comments: Vec<String>,
    state: BanState,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<&BanRecord> for CachedBan {
    fn from(record: &BanRecord) -> Self {
        Self {
            subject: record.subject.clone(),
            issuer: record.issuer.clone(),
            reason: record.reason.text.clone(),
            comments: record.comments.iter().map(|c| c.text.clone()).collect(),
            state: record.state,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }
}

impl CachedBan {
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    #[must_use]
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    #[must_use]
    pub fn state(&self) -> BanState {
        self.state
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Expiry time, or `None` for a ban that never expires
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the ban is in effect right now
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == BanState::Active
            && !self.expires_at.is_some_and(|expires_at| expires_at <= Utc::now())
    }
}

/// A row from the pre-upgrade flat ban schema. Read-only input to the
/// migration engine; never written by current logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyBanRow {
    pub subject: String,
    pub issuer: String,
    pub reason: String,
    /// Creation time in epoch milliseconds
    pub created_at: i64,
    /// Expiry time in epoch milliseconds; zero means the ban never expires
    pub expires_at: i64,
}
