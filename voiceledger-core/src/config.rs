use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("nlu base url is empty")]
    MissingNluBaseUrl,

    #[error("tts is enabled but no voice id is configured")]
    MissingVoiceId,
}

/// Fixed delays of a call. Not timeouts: nothing is retried when they elapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTimings {
    /// Simulated pickup after the ring starts.
    pub ring_delay_ms: u64,
    /// Pause between the end of a spoken reply and the next listen cycle.
    pub turn_pause_ms: u64,
    /// How long the ended call stays visible before the shell closes it.
    pub close_delay_ms: u64,
}

impl CallTimings {
    pub fn ring_delay(&self) -> Duration {
        Duration::from_millis(self.ring_delay_ms)
    }

    pub fn turn_pause(&self) -> Duration {
        Duration::from_millis(self.turn_pause_ms)
    }

    pub fn close_delay(&self) -> Duration {
        Duration::from_millis(self.close_delay_ms)
    }
}

impl Default for CallTimings {
    fn default() -> Self {
        Self {
            ring_delay_ms: 2000,
            turn_pause_ms: 800,
            close_delay_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NluMode {
    /// Serverless proxy that already returns the transaction JSON.
    Proxy,
    /// OpenAI-compatible chat completions, prompted client-side.
    Chat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NluSettings {
    pub mode: NluMode,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsSettings {
    pub enabled: bool,
    pub voice_id: String,
    pub model_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub call: CallTimings,
    pub nlu: NluSettings,
    pub tts: TtsSettings,

    #[serde(default)]
    pub ledger_path: Option<String>,

    // Secrets are stored outside this struct at rest.
    #[serde(default)]
    pub nlu_api_key_present: bool,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nlu.base_url.trim().is_empty() {
            return Err(ConfigError::MissingNluBaseUrl);
        }
        if self.tts.enabled && self.tts.voice_id.trim().is_empty() {
            return Err(ConfigError::MissingVoiceId);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            call: CallTimings::default(),
            nlu: NluSettings {
                mode: NluMode::Proxy,
                base_url: "https://example.com/api".into(),
                model: "gpt-4o-mini".into(),
            },
            tts: TtsSettings {
                enabled: true,
                voice_id: "voice".into(),
                model_id: "eleven_multilingual_v2".into(),
            },
            ledger_path: None,
            nlu_api_key_present: false,
        }
    }

    #[test]
    fn call_timings_default_when_missing() {
        let json = r#"{
            "nlu": {"mode": "chat", "base_url": "http://localhost:11434/v1", "model": "m"},
            "tts": {"enabled": false, "voice_id": "", "model_id": ""}
        }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.call, CallTimings::default());
        assert_eq!(cfg.nlu.mode, NluMode::Chat);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_incomplete_settings() {
        let mut cfg = config();
        assert!(cfg.validate().is_ok());

        cfg.tts.voice_id = " ".into();
        assert_eq!(cfg.validate(), Err(ConfigError::MissingVoiceId));

        cfg.nlu.base_url.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::MissingNluBaseUrl));
    }
}
