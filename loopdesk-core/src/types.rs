//! Core domain types for loopdesk
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Incident** | A tracked user-reported issue record ("ticket" in product language) |
//! | **Group** | A cluster of incidents describing the same underlying problem, sharing one `group_id` |
//! | **Notifiable state** | A status (`Resolved` or `AwaitingInfo`) that requires an outbound message |
//! | **Delivery channel** | One of the ordered mechanisms (thread, direct message, fallback) used to reach a user |
//! | **Acknowledgment** | The durable record that a notification has been sent, preventing resend |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================
// Incident ID
// ============================================

/// Numeric floor for incident IDs. Allocation is `max(existing) + 1`,
/// so IDs are monotonic and collision-free even after deletions.
pub const ID_FLOOR: u64 = 1000;

const ID_PREFIX: &str = "TKT-";

/// Opaque incident identifier, rendered as `TKT-<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncidentId(String);

impl IncidentId {
    /// Build an ID from its numeric part.
    pub fn from_number(n: u64) -> Self {
        Self(format!("{}{}", ID_PREFIX, n))
    }

    /// The numeric part of the ID, if well-formed.
    pub fn number(&self) -> Option<u64> {
        self.0.strip_prefix(ID_PREFIX)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IncidentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for IncidentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(ID_PREFIX) && s[ID_PREFIX.len()..].parse::<u64>().is_ok() {
            Ok(IncidentId(s.to_string()))
        } else {
            Err(format!("malformed incident id: {}", s))
        }
    }
}

impl From<&str> for IncidentId {
    fn from(s: &str) -> Self {
        IncidentId(s.to_string())
    }
}

// ============================================
// Status
// ============================================

/// Lifecycle status of an incident.
///
/// Transitions are monotonic per incident except `AwaitingInfo -> Pending`,
/// which happens only when a user reply wakes up a stalled incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentStatus {
    Pending,
    AwaitingInfo,
    Resolved,
    SelfResolved,
}

impl IncidentStatus {
    /// Wire/storage string, matching the product's display labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Pending => "Pending",
            IncidentStatus::AwaitingInfo => "Awaiting Info",
            IncidentStatus::Resolved => "Resolved",
            IncidentStatus::SelfResolved => "Self-Resolved",
        }
    }

    /// Whether this status requires an outbound message to the incident's users.
    pub fn is_notifiable(&self) -> bool {
        matches!(self, IncidentStatus::Resolved | IncidentStatus::AwaitingInfo)
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(IncidentStatus::Pending),
            "Awaiting Info" => Ok(IncidentStatus::AwaitingInfo),
            "Resolved" => Ok(IncidentStatus::Resolved),
            "Self-Resolved" => Ok(IncidentStatus::SelfResolved),
            _ => Err(format!("unknown incident status: {}", s)),
        }
    }
}

// ============================================
// History
// ============================================

/// Author of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Admin,
}

impl HistoryRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryRole::User => "user",
            HistoryRole::Admin => "admin",
        }
    }
}

impl std::str::FromStr for HistoryRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(HistoryRole::User),
            "admin" => Ok(HistoryRole::Admin),
            _ => Err(format!("unknown history role: {}", s)),
        }
    }
}

/// One entry in an incident's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn user(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: HistoryRole::User,
            message: message.into(),
            timestamp,
        }
    }

    pub fn admin(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: HistoryRole::Admin,
            message: message.into(),
            timestamp,
        }
    }

    /// Content+timestamp hash keying this entry in storage.
    ///
    /// A replayed append (e.g. after a crash mid-way through a multi-incident
    /// group append) produces the same hash and is detected as already applied.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.role.as_str().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.message.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.timestamp.to_rfc3339().as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }
}

// ============================================
// Incident
// ============================================

/// The unit of work: a tracked user-reported issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier, immutable once assigned
    pub id: IncidentId,
    /// Identifier of the incident cluster this record belongs to;
    /// equals `id` for a group's originating incident
    pub group_id: IncidentId,
    /// Lifecycle status
    pub status: IncidentStatus,
    /// Classifier-supplied summary title
    pub title: Option<String>,
    /// Normalized text of the user's report, immutable after creation
    pub query: String,
    /// Classifier label
    pub category: Option<String>,
    /// Classifier label, max two words
    pub subcategory: Option<String>,
    /// Draft solution suggested by the classifier at creation time
    pub ai_draft: Option<String>,
    /// External-identity references, order-insensitive, at least one
    pub users: Vec<String>,
    /// Ordered, append-only conversation history
    pub history: Vec<HistoryEntry>,
    /// Resolution text, set exactly once on transition to Resolved/SelfResolved
    pub final_answer: Option<String>,
    /// Whether the current notifiable state (if any) has been delivered.
    /// Legacy records default to `true` so old data never re-notifies.
    pub notified: bool,
    /// Conversation-thread reference captured at creation, preferred for delivery
    pub thread_ref: Option<String>,
    /// When this incident was created
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// The first user reference that looks like an external numeric identity.
    ///
    /// Used as the direct-message recipient and for fallback-channel mentions.
    pub fn primary_user(&self) -> Option<&str> {
        self.users
            .iter()
            .map(String::as_str)
            .find(|u| !u.is_empty() && u.chars().all(|c| c.is_ascii_digit()))
    }

    /// The most recent admin entry in the history, if any.
    pub fn last_admin_message(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|h| h.role == HistoryRole::Admin)
            .map(|h| h.message.as_str())
    }
}

// ============================================
// New report
// ============================================

/// An incoming report, before it has been assigned to a group.
#[derive(Debug, Clone, Default)]
pub struct NewReport {
    /// Normalized report text
    pub query: String,
    /// Summary title, if the classifier produced one
    pub title: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Draft solution from the classifier
    pub ai_draft: Option<String>,
    /// External-identity references of the reporter(s)
    pub users: Vec<String>,
    /// Conversation-thread reference for preferential delivery
    pub thread_ref: Option<String>,
    /// Prior conversation to seed the incident history with;
    /// when empty, a single user entry is synthesized from `query`
    pub history: Vec<HistoryEntry>,
}

impl NewReport {
    pub fn new(query: impl Into<String>, users: Vec<String>) -> Self {
        Self {
            query: query.into(),
            users,
            ..Default::default()
        }
    }
}

// ============================================
// Knowledge base
// ============================================

/// A knowledge-base entry back-filled from a resolved incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbEntry {
    /// Short unique identifier
    pub id: String,
    pub category: String,
    /// The question this entry answers (the resolved incident's query)
    pub question: String,
    pub resolution: String,
    /// Semicolon-separated labels
    pub tags: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl KbEntry {
    /// Create an entry with a fresh short ID.
    pub fn new(
        category: impl Into<String>,
        question: impl Into<String>,
        resolution: impl Into<String>,
        tags: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
            category: category.into(),
            question: question.into(),
            resolution: resolution.into(),
            tags,
            created_at: Utc::now(),
        }
    }
}
