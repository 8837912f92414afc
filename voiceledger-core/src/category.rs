// Fixed category id tables. The NL backend is prompted with these and its replies are
// normalized against them.

use crate::types::TransactionType;

pub const CATEGORY_OTHER: &str = "other";

pub const EXPENSE_CATEGORIES: &[&str] = &[
    "food",
    "transport",
    "shopping",
    "bills",
    "rent",
    "health",
    "education",
    "entertainment",
    "groceries",
    "mobile_recharge",
    CATEGORY_OTHER,
];

pub const INCOME_CATEGORIES: &[&str] = &[
    "salary",
    "business",
    "freelance",
    "investment",
    "gift",
    "rental",
    CATEGORY_OTHER,
];

pub fn categories_for(kind: TransactionType) -> &'static [&'static str] {
    match kind {
        TransactionType::Income => INCOME_CATEGORIES,
        TransactionType::Expense => EXPENSE_CATEGORIES,
    }
}

/// Maps a raw category id onto the table for `kind`; unknown ids become `other`.
pub fn normalize_category(kind: TransactionType, raw: &str) -> &'static str {
    let key = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    categories_for(kind)
        .iter()
        .copied()
        .find(|c| *c == key)
        .unwrap_or(CATEGORY_OTHER)
}

/// Spoken form of a category id ("mobile_recharge" -> "mobile recharge").
pub fn category_label(id: &str) -> String {
    id.replace('_', " ")
}
