use voiceledger_core::account::{Account, AccountKind};
use voiceledger_core::config::{AppConfig, CallTimings, NluMode, NluSettings, TtsSettings};

pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";

pub fn default_app_config() -> AppConfig {
    AppConfig {
        call: CallTimings::default(),
        nlu: NluSettings {
            mode: NluMode::Chat,
            base_url: DEFAULT_CHAT_BASE_URL.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        },
        tts: TtsSettings {
            enabled: false,
            voice_id: String::new(),
            model_id: DEFAULT_TTS_MODEL.into(),
        },
        ledger_path: None,
        nlu_api_key_present: false,
    }
}

/// Accounts a fresh ledger starts with.
pub fn default_accounts() -> Vec<Account> {
    vec![
        Account::new("cash", "Cash", AccountKind::Cash).with_default(true),
        Account::new("bkash", "bKash", AccountKind::MobileBanking),
        Account::new("bank", "Bank", AccountKind::Bank),
    ]
}
