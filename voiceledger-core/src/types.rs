use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Income credits the account, expense debits it.
    pub fn is_credit(self) -> bool {
        self == Self::Income
    }
}

/// A transaction the resolver extracted with enough confidence to save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub kind: TransactionType,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub transaction_date: Option<NaiveDate>,
    pub account_name: Option<String>,
}

/// Either a complete transaction or a question for the user, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParsedTransactionRequest {
    Complete(ParsedTransaction),
    NeedsClarification { question: String },
}

/// Payload handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub kind: TransactionType,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub transaction_date: NaiveDate,
    pub account_id: Option<AccountId>,
}

impl TransactionDraft {
    pub fn from_parsed(
        parsed: &ParsedTransaction,
        account_id: Option<AccountId>,
        today: NaiveDate,
    ) -> Self {
        Self {
            kind: parsed.kind,
            amount: parsed.amount,
            category: parsed.category.clone(),
            description: parsed.description.clone(),
            transaction_date: parsed.transaction_date.unwrap_or(today),
            account_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRecord {
    pub id: RecordId,
    pub draft: TransactionDraft,
}
