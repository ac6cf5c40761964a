//! Append-only audit ledger with a tamper-evident hash chain.
//!
//! Every audited mutation appends one [`AuditEntry`]. Each entry stores the
//! checksum of the entry before it and its own checksum, computed as the
//! SHA-256 of
//!
//! ```text
//! action|entity_type|entity_id|actor_id|description|previous_checksum
//! ```
//!
//! with absent ids rendered as empty strings. The first entry links to
//! [`GENESIS`]. [`verify_chain`] replays a ledger in sequence order and
//! reports every entry whose checksum or link does not hold.
//!
//! Persistence lives in `storage::ledger`; this module is pure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::text_enum;

/// Previous-checksum value of the first ledger entry.
pub const GENESIS: &str = "GENESIS";

/// What kind of action an audit entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A record was created.
    Create,
    /// A record was modified.
    Update,
    /// A record was removed.
    Delete,
    /// An account logged in.
    Login,
    /// An account logged out.
    Logout,
    /// An account's role was changed.
    RoleChange,
    /// A record or report was viewed.
    View,
}

text_enum!(ActionKind, "action kind", {
    Create => "create",
    Update => "update",
    Delete => "delete",
    Login => "login",
    Logout => "logout",
    RoleChange => "role_change",
    View => "view",
});

/// An entry to append. The ledger fills in sequence, timestamp, and checksums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    /// Acting account, if known.
    pub actor_id: Option<i64>,
    /// Action performed.
    pub action: ActionKind,
    /// Entity type name, e.g. `MaintenanceLog`.
    pub entity_type: String,
    /// Entity id, if the action concerns one record.
    pub entity_id: Option<i64>,
    /// Human-readable description.
    pub description: String,
    /// Caller's network address, if known.
    pub origin: Option<String>,
}

impl NewAuditEntry {
    /// Start an entry for `action` on `entity_type`.
    #[must_use]
    pub fn new(action: ActionKind, entity_type: impl Into<String>) -> Self {
        Self {
            actor_id: None,
            action,
            entity_type: entity_type.into(),
            entity_id: None,
            description: String::new(),
            origin: None,
        }
    }

    /// `Created {entity} #{id}`.
    #[must_use]
    pub fn created(entity_type: &str, id: i64) -> Self {
        Self::new(ActionKind::Create, entity_type)
            .entity(id)
            .describe(format!("Created {entity_type} #{id}"))
    }

    /// `Updated {entity} #{id}`.
    #[must_use]
    pub fn updated(entity_type: &str, id: i64) -> Self {
        Self::new(ActionKind::Update, entity_type)
            .entity(id)
            .describe(format!("Updated {entity_type} #{id}"))
    }

    /// `Deleted {entity} #{id}`.
    #[must_use]
    pub fn deleted(entity_type: &str, id: i64) -> Self {
        Self::new(ActionKind::Delete, entity_type)
            .entity(id)
            .describe(format!("Deleted {entity_type} #{id}"))
    }

    /// Set the entity id.
    #[must_use]
    pub fn entity(mut self, id: i64) -> Self {
        self.entity_id = Some(id);
        self
    }

    /// Set the description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the actor.
    #[must_use]
    pub fn actor(mut self, actor_id: Option<i64>) -> Self {
        self.actor_id = actor_id;
        self
    }

    /// Set the origin address.
    #[must_use]
    pub fn origin(mut self, origin: Option<&str>) -> Self {
        self.origin = origin.map(str::to_string);
        self
    }

    /// Checksum this entry would carry if appended after `previous_checksum`.
    #[must_use]
    pub fn checksum_after(&self, previous_checksum: &str) -> String {
        compute_checksum(
            self.action,
            &self.entity_type,
            self.entity_id,
            self.actor_id,
            &self.description,
            previous_checksum,
        )
    }
}

/// A stored, immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence id.
    pub id: i64,
    /// Acting account, if known.
    pub actor_id: Option<i64>,
    /// Action performed.
    pub action: ActionKind,
    /// Entity type name.
    pub entity_type: String,
    /// Entity id, if any.
    pub entity_id: Option<i64>,
    /// Human-readable description.
    pub description: String,
    /// Caller's network address, if known.
    pub origin: Option<String>,
    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
    /// Checksum of the preceding entry, or [`GENESIS`].
    pub previous_checksum: String,
    /// This entry's checksum.
    pub checksum: String,
}

impl AuditEntry {
    /// Recompute the checksum from the stored fields.
    #[must_use]
    pub fn expected_checksum(&self) -> String {
        compute_checksum(
            self.action,
            &self.entity_type,
            self.entity_id,
            self.actor_id,
            &self.description,
            &self.previous_checksum,
        )
    }
}

/// Hex-encoded SHA-256 over the pipe-joined entry fields.
#[must_use]
pub fn compute_checksum(
    action: ActionKind,
    entity_type: &str,
    entity_id: Option<i64>,
    actor_id: Option<i64>,
    description: &str,
    previous_checksum: &str,
) -> String {
    let entity_id = entity_id.map(|id| id.to_string()).unwrap_or_default();
    let actor_id = actor_id.map(|id| id.to_string()).unwrap_or_default();
    let payload = [
        action.as_str(),
        entity_type,
        &entity_id,
        &actor_id,
        description,
        previous_checksum,
    ]
    .join("|");

    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A single verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainViolation {
    /// The stored checksum does not match the entry's fields.
    ChecksumMismatch {
        /// Offending entry.
        entry_id: i64,
        /// Checksum on disk.
        stored: String,
        /// Checksum recomputed from the fields.
        expected: String,
    },
    /// The entry does not link to its predecessor.
    BrokenLink {
        /// Offending entry.
        entry_id: i64,
        /// `previous_checksum` on disk.
        stored: String,
        /// Predecessor's checksum, or [`GENESIS`].
        expected: String,
    },
}

impl ChainViolation {
    /// Id of the entry that failed.
    #[must_use]
    pub fn entry_id(&self) -> i64 {
        match self {
            Self::ChecksumMismatch { entry_id, .. } | Self::BrokenLink { entry_id, .. } => {
                *entry_id
            }
        }
    }
}

impl std::fmt::Display for ChainViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChecksumMismatch { entry_id, .. } => {
                write!(f, "entry #{entry_id}: checksum does not match its fields")
            }
            Self::BrokenLink {
                entry_id, expected, ..
            } => write!(
                f,
                "entry #{entry_id}: previous checksum does not match {expected}"
            ),
        }
    }
}

/// Result of replaying a ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// Number of entries replayed.
    pub entries_checked: usize,
    /// Checksum of the last entry, or [`GENESIS`] for an empty ledger.
    pub head: String,
    /// Every failure found, in sequence order.
    pub violations: Vec<ChainViolation>,
}

impl ChainReport {
    /// Whether the ledger verified cleanly.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.violations.is_empty()
    }

    /// Convert into a `Result`, failing on the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ChainIntegrity`] if any violation was found.
    pub fn into_result(self) -> crate::Result<Self> {
        match self.violations.first() {
            None => Ok(self),
            Some(first) => Err(crate::Error::ChainIntegrity {
                message: first.to_string(),
            }),
        }
    }
}

/// Replay `entries`, which must be in ascending sequence order.
///
/// Links are checked against the stored checksum of the predecessor, so a
/// single tampered entry yields a mismatch for itself without cascading into
/// link failures for everything after it.
#[must_use]
pub fn verify_chain(entries: &[AuditEntry]) -> ChainReport {
    let mut report = ChainReport {
        head: GENESIS.to_string(),
        ..ChainReport::default()
    };

    for entry in entries {
        if entry.previous_checksum != report.head {
            report.violations.push(ChainViolation::BrokenLink {
                entry_id: entry.id,
                stored: entry.previous_checksum.clone(),
                expected: report.head.clone(),
            });
        }

        let expected = entry.expected_checksum();
        if entry.checksum != expected {
            report.violations.push(ChainViolation::ChecksumMismatch {
                entry_id: entry.id,
                stored: entry.checksum.clone(),
                expected,
            });
        }

        report.head.clone_from(&entry.checksum);
        report.entries_checked += 1;
    }

    report
}
