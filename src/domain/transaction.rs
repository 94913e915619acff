use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type RecordId = Uuid;

/// Directional tag from the perspective of the record owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Sent,
    Received,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sent => "sent",
            TransactionType::Received => "received",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sent" => Some(TransactionType::Sent),
            "received" => Some(TransactionType::Received),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    /// Completed and failed entries never move again under the strict policy.
    pub fn is_final(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which status changes `update_status` accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Only pending -> completed | failed.
    #[default]
    Strict,
    /// Any status may be set at any time.
    Permissive,
}

impl TransitionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionPolicy::Strict => "strict",
            TransitionPolicy::Permissive => "permissive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Some(TransitionPolicy::Strict),
            "permissive" => Some(TransitionPolicy::Permissive),
            _ => None,
        }
    }

    /// Returns true if moving from `from` to `to` is allowed.
    /// Re-setting the current status is always allowed (it is a no-op).
    pub fn allows(&self, from: TransactionStatus, to: TransactionStatus) -> bool {
        if from == to {
            return true;
        }
        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Strict => !from.is_final() && to.is_final(),
        }
    }
}

/// Which side of an entry an account query matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    From,
    To,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::From => "from",
            Direction::To => "to",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "from" => Some(Direction::From),
            "to" => Some(Direction::To),
            _ => None,
        }
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Pagination {
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// The page size actually applied, capped at [`MAX_PAGE_SIZE`].
    pub fn effective_limit(&self, default: u32) -> u32 {
        self.limit.unwrap_or(default).min(MAX_PAGE_SIZE)
    }
}

/// Upper-case and trim an external transaction id so that lookups and
/// uniqueness are case-insensitive.
pub fn normalize_transaction_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Raw input for a new ledger entry, as received from a client.
///
/// Nothing here is trusted; [`validate_draft`](super::validate_draft) turns it into a
/// [`ValidTransaction`](super::ValidTransaction) or reports the first violation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    pub amount_cents: Option<Cents>,
    #[serde(rename = "type", default)]
    pub transaction_type: String,
    pub note: Option<String>,
    pub description: Option<String>,
    pub transaction_id: Option<String>,
    pub fee_cents: Option<Cents>,
}

impl TransactionDraft {
    pub fn new(
        from: AccountId,
        to: AccountId,
        amount_cents: Cents,
        transaction_type: impl Into<String>,
        transaction_id: impl Into<String>,
    ) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            amount_cents: Some(amount_cents),
            transaction_type: transaction_type.into(),
            transaction_id: Some(transaction_id.into()),
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_fee(mut self, fee_cents: Cents) -> Self {
        self.fee_cents = Some(fee_cents);
        self
    }
}

/// A stored ledger entry. Entries are never deleted; only `status` and
/// `description` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: RecordId,
    /// Monotonically increasing insertion number
    pub sequence: i64,
    /// Source account
    pub from: AccountId,
    /// Destination account
    pub to: AccountId,
    /// Amount in cents (always positive)
    pub amount_cents: Cents,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub note: Option<String>,
    pub description: Option<String>,
    /// External identifier, always upper-case
    pub transaction_id: String,
    pub fee_cents: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Returns true if `account` is the party selected by `direction`.
    pub fn involves(&self, account: AccountId, direction: Direction) -> bool {
        match direction {
            Direction::From => self.from == account,
            Direction::To => self.to == account,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_roundtrips() {
        for t in [TransactionType::Sent, TransactionType::Received] {
            assert_eq!(TransactionType::from_str(t.as_str()), Some(t));
        }
        for s in [
            TransactionStatus::Pending,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(TransactionStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(TransactionType::from_str("SENT"), Some(TransactionType::Sent));
        assert_eq!(TransactionType::from_str("refund"), None);
    }

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(TransactionStatus::default(), TransactionStatus::Pending);
    }

    #[test]
    fn test_strict_policy() {
        use TransactionStatus::*;
        let policy = TransitionPolicy::Strict;

        assert!(policy.allows(Pending, Completed));
        assert!(policy.allows(Pending, Failed));
        assert!(policy.allows(Completed, Completed));
        assert!(!policy.allows(Completed, Pending));
        assert!(!policy.allows(Failed, Pending));
        assert!(!policy.allows(Completed, Failed));
        assert!(!policy.allows(Failed, Completed));
    }

    #[test]
    fn test_permissive_policy() {
        use TransactionStatus::*;
        let policy = TransitionPolicy::Permissive;

        assert!(policy.allows(Completed, Pending));
        assert!(policy.allows(Failed, Completed));
    }

    #[test]
    fn test_normalize_transaction_id() {
        assert_eq!(normalize_transaction_id("abc123"), "ABC123");
        assert_eq!(normalize_transaction_id("  tx001 "), "TX001");
    }

    #[test]
    fn test_pagination_caps_limit() {
        assert_eq!(Pagination::default().effective_limit(DEFAULT_PAGE_SIZE), 50);
        assert_eq!(Pagination::limit(10).effective_limit(DEFAULT_PAGE_SIZE), 10);
        assert_eq!(
            Pagination::limit(10_000).effective_limit(DEFAULT_PAGE_SIZE),
            MAX_PAGE_SIZE
        );
    }

    #[test]
    fn test_draft_deserializes_type_field() {
        let from = AccountId::new();
        let to = AccountId::new();
        let json = format!(
            r#"{{"from":"{}","to":"{}","amount_cents":5000,"type":"sent","transaction_id":"tx001"}}"#,
            from, to
        );
        let draft: TransactionDraft = serde_json::from_str(&json).unwrap();

        assert_eq!(draft.from, Some(from));
        assert_eq!(draft.transaction_type, "sent");
        assert_eq!(draft.fee_cents, None);
    }
}
