use regex::Regex;
use std::sync::OnceLock;

use crate::category::category_label;
use crate::types::TransactionType;

pub const LANGUAGE_REMINDER: &str =
    "Sorry, I can only understand English for now. Please say it again in English.";
pub const FALLBACK_APOLOGY: &str =
    "Sorry, I couldn't understand that transaction. Please try again.";
pub const SAVE_FAILED_REPLY: &str = "Sorry, I couldn't save that. Please try again.";
pub const NO_SPEECH_STATUS: &str = "Didn't catch that. Listening again...";
pub const RECOGNITION_ERROR_STATUS: &str = "Sorry, something went wrong with the microphone.";
pub const MUTED_STATUS: &str = "Muted";

fn bracket_noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Recognizers sometimes emit "[noise]" or "(inaudible)" markers.
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]|\([^\)]*\)").expect("valid bracket regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{2,}").expect("valid whitespace regex"))
}

fn code_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$").expect("valid code fence regex")
    })
}

/// Strips recognizer noise markers and collapses whitespace.
pub fn clean_transcript(text: &str) -> String {
    let out = bracket_noise_re().replace_all(text, "");
    let out = whitespace_re().replace_all(&out, " ");
    out.trim().to_string()
}

/// Voice input is only accepted in English; any non-ASCII character means another
/// language (or script) was recognized.
pub fn is_supported_input(text: &str) -> bool {
    text.is_ascii()
}

/// Combines a pending utterance with the user's follow-up so the backend stays stateless.
pub fn compose_clarified_input(original: &str, clarification: &str) -> String {
    format!("{original} User clarifies: {clarification}")
}

/// Removes a surrounding markdown code fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    match code_fence_re().captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// "500" for whole amounts, "12.50" otherwise.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{}", amount as i64)
    } else {
        format!("{amount:.2}")
    }
}

pub fn confirmation_reply(
    kind: TransactionType,
    amount: f64,
    category: &str,
    account_name: Option<&str>,
) -> String {
    let account = account_name
        .map(|name| format!(" to {name}"))
        .unwrap_or_default();
    format!(
        "Saved {} of {} for {}{}. Anything else?",
        kind.as_str(),
        format_amount(amount),
        category_label(category),
        account
    )
}
