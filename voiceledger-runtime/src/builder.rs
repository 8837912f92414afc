use std::path::PathBuf;
use std::sync::Arc;

use voiceledger_core::config::{AppConfig, NluMode};
use voiceledger_engine::call::CallCollaborators;
use voiceledger_engine::playback::FallbackPlayback;
use voiceledger_engine::traits::{NluBackend, Ringer, SpeechCapture, SpeechPlayback};
use voiceledger_providers::openai_compatible::OpenAiCompatibleChatConfig;
use voiceledger_providers::tts::ElevenLabsTtsConfig;

use crate::defaults::default_accounts;
use crate::ledger::JsonLedger;
use crate::nlu::{ChatNluBackend, ProxyNluBackend};
use crate::secrets::{SecretKey, lookup_secret};
use crate::tts::{ElevenLabsTtsPlayback, FileAudioSink};

/// Parts of a call that depend on the host rather than on config.
pub struct HostDevices {
    pub capture: Arc<dyn SpeechCapture>,
    pub ringer: Arc<dyn Ringer>,
    /// Local voice; used alone when remote TTS is off, and as its fallback otherwise.
    pub local_voice: Arc<dyn SpeechPlayback>,
    /// Where remote TTS clips go.
    pub audio_dir: PathBuf,
}

pub fn build_nlu(cfg: &AppConfig, api_key: Option<String>) -> Arc<dyn NluBackend> {
    match cfg.nlu.mode {
        NluMode::Proxy => Arc::new(ProxyNluBackend::new(cfg.nlu.base_url.clone(), api_key)),
        NluMode::Chat => Arc::new(ChatNluBackend::new(chat_config(cfg, api_key))),
    }
}

pub fn chat_config(cfg: &AppConfig, api_key: Option<String>) -> OpenAiCompatibleChatConfig {
    OpenAiCompatibleChatConfig {
        base_url: cfg.nlu.base_url.clone(),
        api_key: api_key.unwrap_or_default(),
        model: cfg.nlu.model.clone(),
    }
}

pub fn build_playback(
    cfg: &AppConfig,
    elevenlabs_key: Option<String>,
    local_voice: Arc<dyn SpeechPlayback>,
    audio_dir: PathBuf,
) -> FallbackPlayback {
    match elevenlabs_key.filter(|_| cfg.tts.enabled) {
        Some(key) => {
            let tts = ElevenLabsTtsConfig::production(
                key,
                cfg.tts.voice_id.clone(),
                cfg.tts.model_id.clone(),
            );
            let remote = ElevenLabsTtsPlayback::new(tts, FileAudioSink::new(audio_dir));
            FallbackPlayback::new(Arc::new(remote)).with_fallback(local_voice)
        }
        None => {
            if cfg.tts.enabled {
                log::warn!("tts enabled but no ElevenLabs key found; using the local voice");
            }
            FallbackPlayback::new(local_voice)
        }
    }
}

/// Opens the ledger and wires every collaborator a call needs from config and secrets.
pub async fn build_call_collaborators(
    cfg: &AppConfig,
    ledger_path: PathBuf,
    host: HostDevices,
) -> anyhow::Result<(CallCollaborators, Arc<JsonLedger>)> {
    cfg.validate()?;

    let ledger = Arc::new(JsonLedger::at_path(ledger_path));
    ledger.ensure_accounts(default_accounts()).await?;

    let nlu = build_nlu(cfg, lookup_secret(SecretKey::NluApiKey));
    let playback = build_playback(
        cfg,
        lookup_secret(SecretKey::ElevenLabsApiKey),
        host.local_voice,
        host.audio_dir,
    );

    let deps = CallCollaborators {
        capture: host.capture,
        playback,
        nlu,
        store: ledger.clone(),
        accounts: ledger.clone(),
        ringer: host.ringer,
    };
    Ok((deps, ledger))
}
