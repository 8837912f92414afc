use crate::request::{HttpRequest, join_url};
use serde_json::json;

pub const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io";

#[derive(Clone, PartialEq, Eq)]
pub struct ElevenLabsTtsConfig {
    pub base_url: String,
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
}

impl ElevenLabsTtsConfig {
    pub fn production(
        api_key: impl Into<String>,
        voice_id: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: ELEVENLABS_API_BASE.into(),
            api_key: api_key.into(),
            voice_id: voice_id.into(),
            model_id: model_id.into(),
        }
    }
}

impl std::fmt::Debug for ElevenLabsTtsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsTtsConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .finish()
    }
}

/// The response body is MP3 audio.
pub fn build_elevenlabs_tts_request(cfg: &ElevenLabsTtsConfig, text: &str) -> HttpRequest {
    let url = join_url(
        &cfg.base_url,
        &format!("/v1/text-to-speech/{}", cfg.voice_id),
    );

    let payload = json!({
        "text": text,
        "model_id": cfg.model_id,
        // Short confirmations read better slightly more stable than the default.
        "voice_settings": {"stability": 0.6, "similarity_boost": 0.75},
    });

    HttpRequest::post_json(url, &payload)
        .with_header("Accept", "audio/mpeg")
        .with_header("xi-api-key", cfg.api_key.clone())
}
