use anyhow::Context;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use voiceledger_engine::traits::SpeechPlayback;
use voiceledger_providers::runtime;
use voiceledger_providers::tts::{ElevenLabsTtsConfig, build_elevenlabs_tts_request};

/// Plays (or stores) encoded speech audio.
#[async_trait::async_trait]
pub trait AudioSink: Send + Sync {
    async fn play_mp3(&self, audio: Vec<u8>) -> anyhow::Result<()>;
}

/// Writes every clip to `dir` as `reply-N.mp3`.
#[derive(Debug)]
pub struct FileAudioSink {
    dir: PathBuf,
    next: AtomicU64,
}

impl FileAudioSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next: AtomicU64::new(1),
        }
    }
}

#[async_trait::async_trait]
impl AudioSink for FileAudioSink {
    async fn play_mp3(&self, audio: Vec<u8>) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create audio dir: {}", self.dir.display()))?;
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!("reply-{n}.mp3"));
        std::fs::write(&path, audio)
            .with_context(|| format!("write audio: {}", path.display()))?;
        log::debug!("wrote reply audio to {}", path.display());
        Ok(())
    }
}

#[derive(Clone)]
pub struct ElevenLabsTtsPlayback<S> {
    cfg: ElevenLabsTtsConfig,
    sink: S,
}

impl<S> std::fmt::Debug for ElevenLabsTtsPlayback<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsTtsPlayback")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl<S: AudioSink> ElevenLabsTtsPlayback<S> {
    pub fn new(cfg: ElevenLabsTtsConfig, sink: S) -> Self {
        Self { cfg, sink }
    }
}

#[async_trait::async_trait]
impl<S: AudioSink> SpeechPlayback for ElevenLabsTtsPlayback<S> {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        if self.cfg.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("missing ElevenLabs API key"));
        }

        let req = build_elevenlabs_tts_request(&self.cfg, text);
        let resp = runtime::execute(&req).await?;

        if !resp.is_success() {
            return Err(anyhow::anyhow!(
                "ElevenLabs TTS failed: status={} body={}",
                resp.status,
                String::from_utf8_lossy(&resp.body)
            ));
        }
        if resp.body.is_empty() {
            return Err(anyhow::anyhow!("ElevenLabs TTS returned no audio"));
        }

        self.sink.play_mp3(resp.body).await
    }
}

/// Local "synthesis": prints the reply. Used as the fallback voice.
pub struct ConsolePlayback<W> {
    out: Mutex<W>,
}

impl ConsolePlayback<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsolePlayback<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> SpeechPlayback for ConsolePlayback<W> {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("console writer poisoned"))?;
        writeln!(out, "assistant: {text}").context("write reply")?;
        out.flush().context("flush reply")
    }
}
