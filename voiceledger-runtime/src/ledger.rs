use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use voiceledger_core::account::Account;
use voiceledger_core::types::{AccountId, RecordId, SavedRecord, TransactionDraft};
use voiceledger_engine::traits::{AccountsProvider, TransactionStore};

use crate::fsutil::write_json_atomic;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("amount must be positive, got {0}")]
    InvalidAmount(String),
}

/// On-disk shape of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerFile {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub transactions: Vec<SavedRecord>,
}

/// Accounts and transactions in one JSON file.
///
/// Every mutation is a read-modify-write under one async lock, so two saves from the same
/// process never interleave.
#[derive(Debug)]
pub struct JsonLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLedger {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<LedgerFile> {
        if !self.path.exists() {
            return Ok(LedgerFile::default());
        }
        let raw = std::fs::read(&self.path)
            .with_context(|| format!("failed to read ledger: {}", self.path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse ledger: {}", self.path.display()))
    }

    fn store(&self, file: &LedgerFile) -> anyhow::Result<()> {
        write_json_atomic(&self.path, file)
            .with_context(|| format!("failed to write ledger: {}", self.path.display()))
    }

    /// Seeds `accounts` into a ledger that has none yet.
    pub async fn ensure_accounts(&self, accounts: Vec<Account>) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.load()?;
        if !file.accounts.is_empty() {
            return Ok(());
        }
        file.accounts = accounts;
        self.store(&file)
    }

    pub fn transactions(&self) -> anyhow::Result<Vec<SavedRecord>> {
        Ok(self.load()?.transactions)
    }
}

#[async_trait]
impl AccountsProvider for JsonLedger {
    async fn list_accounts(&self) -> anyhow::Result<Vec<Account>> {
        Ok(self.load()?.accounts)
    }

    async fn adjust_balance(
        &self,
        account_id: &AccountId,
        amount: f64,
        is_credit: bool,
    ) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.load()?;
        let account = file
            .accounts
            .iter_mut()
            .find(|a| &a.id == account_id)
            .ok_or_else(|| LedgerError::UnknownAccount(account_id.as_str().to_string()))?;

        if is_credit {
            account.balance += amount;
        } else {
            account.balance -= amount;
        }
        log::debug!(
            "account {} balance now {:.2}",
            account.id.as_str(),
            account.balance
        );
        self.store(&file)
    }
}

#[async_trait]
impl TransactionStore for JsonLedger {
    async fn save(&self, draft: &TransactionDraft) -> anyhow::Result<Option<SavedRecord>> {
        if !(draft.amount.is_finite() && draft.amount > 0.0) {
            return Err(LedgerError::InvalidAmount(draft.amount.to_string()).into());
        }

        let _guard = self.lock.lock().await;
        let mut file = self.load()?;
        if let Some(id) = &draft.account_id {
            if !file.accounts.iter().any(|a| &a.id == id) {
                return Err(LedgerError::UnknownAccount(id.as_str().to_string()).into());
            }
        }

        let record = SavedRecord {
            id: RecordId::new(),
            draft: draft.clone(),
        };
        file.transactions.push(record.clone());
        self.store(&file)?;
        log::info!(
            "saved {} of {} ({})",
            record.draft.kind.as_str(),
            record.draft.amount,
            record.draft.category
        );
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use voiceledger_core::account::AccountKind;
    use voiceledger_core::types::TransactionType;

    fn draft(account: Option<&str>) -> TransactionDraft {
        TransactionDraft {
            kind: TransactionType::Expense,
            amount: 500.0,
            category: "transport".into(),
            description: "rickshaw".into(),
            transaction_date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            account_id: account.map(AccountId::new),
        }
    }

    async fn seeded(dir: &tempfile::TempDir) -> JsonLedger {
        let ledger = JsonLedger::at_path(dir.path().join("ledger.json"));
        ledger
            .ensure_accounts(crate::defaults::default_accounts())
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonLedger::at_path(dir.path().join("none.json"));
        assert_eq!(ledger.load().unwrap(), LedgerFile::default());
        assert!(ledger.list_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn saves_and_adjusts_balances() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded(&dir).await;

        let record = ledger.save(&draft(Some("cash"))).await.unwrap().unwrap();
        ledger
            .adjust_balance(&AccountId::new("cash"), 500.0, false)
            .await
            .unwrap();
        ledger
            .adjust_balance(&AccountId::new("bkash"), 1200.0, true)
            .await
            .unwrap();

        let reopened = JsonLedger::at_path(ledger.path());
        let file = reopened.load().unwrap();
        assert_eq!(file.transactions, vec![record]);
        let balance = |id: &str| {
            file.accounts
                .iter()
                .find(|a| a.id.as_str() == id)
                .unwrap()
                .balance
        };
        assert_eq!(balance("cash"), -500.0);
        assert_eq!(balance("bkash"), 1200.0);
        assert_eq!(balance("bank"), 0.0);
    }

    #[tokio::test]
    async fn unknown_account_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded(&dir).await;

        let err = ledger
            .adjust_balance(&AccountId::new("nope"), 1.0, true)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<LedgerError>(),
            Some(&LedgerError::UnknownAccount("nope".into()))
        );

        let err = ledger.save(&draft(Some("nope"))).await.unwrap_err();
        assert!(err.to_string().contains("unknown account"));
        assert!(ledger.transactions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded(&dir).await;
        let mut bad = draft(None);
        bad.amount = 0.0;
        assert!(ledger.save(&bad).await.is_err());
    }

    #[tokio::test]
    async fn seeding_keeps_existing_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = seeded(&dir).await;
        ledger
            .adjust_balance(&AccountId::new("cash"), 50.0, true)
            .await
            .unwrap();

        ledger.ensure_accounts(vec![]).await.unwrap();
        let accounts = ledger.list_accounts().await.unwrap();
        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[0].balance, 50.0);
    }

    #[tokio::test]
    async fn opening_balances_carry_through_adjustments() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonLedger::at_path(dir.path().join("ledger.json"));
        ledger
            .ensure_accounts(vec![
                Account::new("cash", "Cash", AccountKind::Cash)
                    .with_default(true)
                    .with_balance(2000.0),
            ])
            .await
            .unwrap();

        ledger
            .adjust_balance(&AccountId::new("cash"), 500.0, false)
            .await
            .unwrap();
        let accounts = ledger.list_accounts().await.unwrap();
        assert_eq!(accounts[0].balance, 1500.0);
    }
}
