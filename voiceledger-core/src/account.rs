use serde::{Deserialize, Serialize};

use crate::types::AccountId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Cash,
    MobileBanking,
    Bank,
    CreditCard,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub balance: f64,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            id: AccountId::new(id),
            name: name.into(),
            kind,
            is_default: false,
            balance: 0.0,
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }
}

// Spoken names for a cash wallet, including Bangla and transliterations.
const CASH_ALIASES: &[&str] = &["hand cash", "cash", "wallet", "ক্যাশ", "নগদ টাকা", "হাতে"];

// Spoken forms of each mobile banking brand, one brand per row. Checked after cash so
// "নগদ টাকা" (cash money) is not read as Nagad.
const MOBILE_BANKING_BRANDS: &[&[&str]] = &[
    &["bkash", "bikash", "বিকাশ"],
    &["nagad", "নগদ"],
    &["rocket", "রকেট"],
    &["upay", "উপায়"],
];

const MOBILE_BANKING: &str = "mobile banking";

/// Picks the account a spoken hint refers to.
///
/// Matching runs name substring (either direction), then cash aliases, then mobile
/// banking aliases. Without a match the fallback is the default-flagged account, then
/// the first cash account, then the first account. Only an empty list yields `None`.
pub fn resolve_account<'a>(accounts: &'a [Account], hint: Option<&str>) -> Option<&'a Account> {
    let hint = hint.map(str::trim).filter(|h| !h.is_empty());
    if let Some(found) = hint.and_then(|h| match_hint(accounts, h)) {
        return Some(found);
    }

    accounts
        .iter()
        .find(|a| a.is_default)
        .or_else(|| accounts.iter().find(|a| a.kind == AccountKind::Cash))
        .or_else(|| accounts.first())
}

fn match_hint<'a>(accounts: &'a [Account], hint: &str) -> Option<&'a Account> {
    let hint = hint.to_lowercase();

    let by_name = accounts.iter().find(|a| {
        let name = a.name.trim().to_lowercase();
        !name.is_empty() && (name.contains(&hint) || hint.contains(&name))
    });
    if by_name.is_some() {
        return by_name;
    }

    if CASH_ALIASES.iter().any(|alias| hint.contains(alias)) {
        if let Some(cash) = accounts.iter().find(|a| a.kind == AccountKind::Cash) {
            return Some(cash);
        }
    }

    let mut mobile = accounts
        .iter()
        .filter(|a| a.kind == AccountKind::MobileBanking);
    let brand = MOBILE_BANKING_BRANDS
        .iter()
        .find(|spoken| spoken.iter().any(|s| hint.contains(s)));
    match brand {
        // Any spelling of the brand may appear in the account name.
        Some(spoken) => {
            let named = mobile.clone().find(|a| {
                let name = a.name.to_lowercase();
                spoken.iter().any(|s| name.contains(s))
            });
            named.or_else(|| mobile.next())
        }
        None if hint.contains(MOBILE_BANKING) => mobile.next(),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> Vec<Account> {
        vec![
            Account::new("bank", "City Bank Savings", AccountKind::Bank),
            Account::new("bkash", "bKash Personal", AccountKind::MobileBanking),
            Account::new("nagad", "Nagad", AccountKind::MobileBanking),
            Account::new("cash", "Wallet Cash", AccountKind::Cash),
            Account::new("card", "Visa Card", AccountKind::CreditCard).with_default(true),
        ]
    }

    fn id(a: Option<&Account>) -> Option<&str> {
        a.map(|a| a.id.as_str())
    }

    #[test]
    fn matches_name_substring_both_ways() {
        let accts = accounts();
        assert_eq!(id(resolve_account(&accts, Some("city bank"))), Some("bank"));
        assert_eq!(
            id(resolve_account(&accts, Some("paid from my visa card please"))),
            Some("card")
        );
    }

    #[test]
    fn recognizes_cash_aliases() {
        let accts = accounts();
        assert_eq!(id(resolve_account(&accts, Some("hand cash"))), Some("cash"));
        assert_eq!(id(resolve_account(&accts, Some("ক্যাশ"))), Some("cash"));
        assert_eq!(id(resolve_account(&accts, Some("নগদ টাকা"))), Some("cash"));
    }

    #[test]
    fn recognizes_mobile_banking_brands() {
        let accts = accounts();
        assert_eq!(id(resolve_account(&accts, Some("bikash"))), Some("bkash"));
        assert_eq!(id(resolve_account(&accts, Some("বিকাশ"))), Some("bkash"));
        assert_eq!(id(resolve_account(&accts, Some("nagad"))), Some("nagad"));
        assert_eq!(id(resolve_account(&accts, Some("rocket"))), Some("bkash"));
        assert_eq!(
            id(resolve_account(&accts, Some("my mobile banking"))),
            Some("bkash")
        );
    }

    #[test]
    fn brand_spellings_find_their_own_account_regardless_of_order() {
        let accts = vec![
            Account::new("nagad", "Nagad", AccountKind::MobileBanking),
            Account::new("bkash", "bKash Personal", AccountKind::MobileBanking),
            Account::new("rkt", "রকেট", AccountKind::MobileBanking),
        ];
        assert_eq!(id(resolve_account(&accts, Some("bikash"))), Some("bkash"));
        assert_eq!(id(resolve_account(&accts, Some("বিকাশ"))), Some("bkash"));
        assert_eq!(id(resolve_account(&accts, Some("নগদ"))), Some("nagad"));
        assert_eq!(id(resolve_account(&accts, Some("rocket"))), Some("rkt"));
    }

    #[test]
    fn falls_back_in_order() {
        let accts = accounts();
        assert_eq!(id(resolve_account(&accts, None)), Some("card"));
        assert_eq!(id(resolve_account(&accts, Some("piggy bank jar"))), Some("card"));

        let no_default: Vec<Account> = accts
            .iter()
            .cloned()
            .map(|a| a.with_default(false))
            .collect();
        assert_eq!(id(resolve_account(&no_default, Some("   "))), Some("cash"));

        let no_cash = vec![
            Account::new("bank", "City Bank", AccountKind::Bank),
            Account::new("card", "Visa", AccountKind::CreditCard),
        ];
        assert_eq!(id(resolve_account(&no_cash, Some("unknown"))), Some("bank"));
    }

    #[test]
    fn resolution_is_total_for_non_empty_lists() {
        let accts = accounts();
        let hints = [None, Some(""), Some("x"), Some("cash"), Some("বিকাশ"), Some("visa")];
        for n in 1..=accts.len() {
            for hint in hints {
                assert!(resolve_account(&accts[..n], hint).is_some());
            }
        }
        assert!(resolve_account(&[], Some("cash")).is_none());
    }
}
