use async_trait::async_trait;
use std::sync::Arc;

use crate::traits::SpeechPlayback;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackReport {
    Primary,
    Fallback,
    /// Nothing was audible; the turn still completes.
    Silent,
}

/// Higher-quality voice first, local synthesis second. `say` never fails.
#[derive(Clone)]
pub struct FallbackPlayback {
    primary: Arc<dyn SpeechPlayback>,
    fallback: Option<Arc<dyn SpeechPlayback>>,
}

impl FallbackPlayback {
    pub fn new(primary: Arc<dyn SpeechPlayback>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn SpeechPlayback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Silences both voices.
    pub fn stop(&self) {
        self.primary.stop();
        if let Some(fallback) = &self.fallback {
            fallback.stop();
        }
    }

    pub async fn say(&self, text: &str) -> PlaybackReport {
        let err = match self.primary.speak(text).await {
            Ok(()) => return PlaybackReport::Primary,
            Err(e) => e,
        };
        log::warn!("primary playback failed, falling back: {err:#}");

        let Some(fallback) = &self.fallback else {
            return PlaybackReport::Silent;
        };
        match fallback.speak(text).await {
            Ok(()) => PlaybackReport::Fallback,
            Err(e) => {
                log::warn!("fallback playback failed: {e:#}");
                PlaybackReport::Silent
            }
        }
    }
}

#[async_trait]
impl SpeechPlayback for FallbackPlayback {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        self.say(text).await;
        Ok(())
    }

    fn stop(&self) {
        FallbackPlayback::stop(self);
    }
}
