use thiserror::Error;

use super::{
    AccountId, Cents, MIN_AMOUNT_CENTS, TransactionDraft, TransactionType, format_cents,
    normalize_transaction_id,
};

pub const MAX_NOTE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Why a ledger entry was rejected. Each variant names exactly one field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount: amount is required")]
    MissingAmount,

    #[error("amount: amount below minimum ({} < 0.01)", display_cents(.0))]
    AmountBelowMinimum(Cents),

    #[error("type: invalid transaction type '{0}' (expected sent or received)")]
    InvalidType(String),

    #[error("note: note exceeds 200 characters ({0})")]
    NoteTooLong(usize),

    #[error("description: description exceeds 500 characters ({0})")]
    DescriptionTooLong(usize),

    #[error("transactionId: transactionId is required")]
    MissingTransactionId,

    #[error("transactionId: duplicate transactionId {0}")]
    DuplicateTransactionId(String),

    #[error("fee: fee must not be negative ({})", display_cents(.0))]
    NegativeFee(Cents),

    #[error("{0}: account is required")]
    MissingAccount(&'static str),

    #[error("to: source and destination accounts must differ")]
    SameAccount,

    #[error("{field}: unknown account {id}")]
    UnknownAccount { field: &'static str, id: AccountId },
}

impl ValidationError {
    /// The name of the offending field, as clients know it.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingAmount | ValidationError::AmountBelowMinimum(_) => "amount",
            ValidationError::InvalidType(_) => "type",
            ValidationError::NoteTooLong(_) => "note",
            ValidationError::DescriptionTooLong(_) => "description",
            ValidationError::MissingTransactionId | ValidationError::DuplicateTransactionId(_) => {
                "transactionId"
            }
            ValidationError::NegativeFee(_) => "fee",
            ValidationError::MissingAccount(field) => *field,
            ValidationError::SameAccount => "to",
            ValidationError::UnknownAccount { field, .. } => *field,
        }
    }
}

fn display_cents(cents: &Cents) -> String {
    format_cents(*cents)
}

/// A draft that passed every structural check. Uniqueness of the
/// transaction id and existence of the accounts still depend on the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTransaction {
    pub from: AccountId,
    pub to: AccountId,
    pub amount_cents: Cents,
    pub transaction_type: TransactionType,
    pub note: Option<String>,
    pub description: Option<String>,
    /// Already normalized
    pub transaction_id: String,
    pub fee_cents: Cents,
}

/// A draft whose amount, type, note, description and transaction id have
/// been checked. The store checks the id for uniqueness before calling
/// [`complete`](Self::complete) for the remaining fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedDraft {
    /// Already normalized
    pub transaction_id: String,
    amount_cents: Cents,
    transaction_type: TransactionType,
    note: Option<String>,
    description: Option<String>,
    from: Option<AccountId>,
    to: Option<AccountId>,
    fee_cents: Option<Cents>,
}

impl IdentifiedDraft {
    /// Check the fee and the account references.
    pub fn complete(self) -> Result<ValidTransaction, ValidationError> {
        let fee_cents = self.fee_cents.unwrap_or(0);
        if fee_cents < 0 {
            return Err(ValidationError::NegativeFee(fee_cents));
        }

        let from = self
            .from
            .filter(|id| !id.is_nil())
            .ok_or(ValidationError::MissingAccount("from"))?;
        let to = self
            .to
            .filter(|id| !id.is_nil())
            .ok_or(ValidationError::MissingAccount("to"))?;
        if from == to {
            return Err(ValidationError::SameAccount);
        }

        Ok(ValidTransaction {
            from,
            to,
            amount_cents: self.amount_cents,
            transaction_type: self.transaction_type,
            note: self.note,
            description: self.description,
            transaction_id: self.transaction_id,
            fee_cents,
        })
    }
}

/// First validation phase: amount, type, note, description, then the
/// presence of a transaction id.
pub fn identify_draft(draft: TransactionDraft) -> Result<IdentifiedDraft, ValidationError> {
    let amount_cents = validate_amount(draft.amount_cents)?;

    let transaction_type = TransactionType::from_str(&draft.transaction_type)
        .ok_or_else(|| ValidationError::InvalidType(draft.transaction_type.clone()))?;

    if let Some(note) = &draft.note {
        validate_note(note)?;
    }
    if let Some(description) = &draft.description {
        validate_description(description)?;
    }

    let transaction_id = draft
        .transaction_id
        .as_deref()
        .map(normalize_transaction_id)
        .filter(|id| !id.is_empty())
        .ok_or(ValidationError::MissingTransactionId)?;

    Ok(IdentifiedDraft {
        transaction_id,
        amount_cents,
        transaction_type,
        note: draft.note,
        description: draft.description,
        from: draft.from,
        to: draft.to,
        fee_cents: draft.fee_cents,
    })
}

/// Check a draft field by field, stopping at the first violation.
///
/// Order: amount, type, note, description, transactionId, fee, then the
/// account references. Uniqueness of the id needs storage and is left to
/// the caller.
pub fn validate_draft(draft: TransactionDraft) -> Result<ValidTransaction, ValidationError> {
    identify_draft(draft)?.complete()
}

fn validate_amount(amount_cents: Option<Cents>) -> Result<Cents, ValidationError> {
    match amount_cents {
        None => Err(ValidationError::MissingAmount),
        Some(amount) if amount < MIN_AMOUNT_CENTS => {
            Err(ValidationError::AmountBelowMinimum(amount))
        }
        Some(amount) => Ok(amount),
    }
}

pub fn validate_note(note: &str) -> Result<(), ValidationError> {
    let len = note.chars().count();
    if len > MAX_NOTE_CHARS {
        return Err(ValidationError::NoteTooLong(len));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    let len = description.chars().count();
    if len > MAX_DESCRIPTION_CHARS {
        return Err(ValidationError::DescriptionTooLong(len));
    }
    Ok(())
}
