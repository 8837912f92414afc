use async_trait::async_trait;
use voiceledger_core::account::Account;
use voiceledger_core::types::{AccountId, SavedRecord, TransactionDraft};
use voiceledger_providers::parse::NluReply;

use crate::capture::CaptureOutcome;

/// Receives the running transcript while a listen cycle is active.
pub type InterimSink = Box<dyn Fn(String) + Send + Sync>;

/// Microphone + speech recognizer. One listen cycle at a time.
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    async fn listen(&self, on_interim: InterimSink) -> CaptureOutcome;

    /// Stops the active cycle, if any. The cycle must then resolve to `Aborted` (or never
    /// resolve); it must not deliver a transcript.
    fn abort(&self);
}

/// Speaks text and resolves once playback finishes.
#[async_trait]
pub trait SpeechPlayback: Send + Sync {
    async fn speak(&self, text: &str) -> anyhow::Result<()>;

    /// Silences audio that is still playing. The pending `speak` future is dropped by the
    /// caller, so sinks that play synchronously need nothing here.
    fn stop(&self) {}
}

/// Stateless natural-language understanding call.
#[async_trait]
pub trait NluBackend: Send + Sync {
    async fn interpret(&self, input: &str) -> anyhow::Result<NluReply>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// `Ok(None)` means the store declined to save without an error.
    async fn save(&self, draft: &TransactionDraft) -> anyhow::Result<Option<SavedRecord>>;
}

#[async_trait]
pub trait AccountsProvider: Send + Sync {
    async fn list_accounts(&self) -> anyhow::Result<Vec<Account>>;

    async fn adjust_balance(
        &self,
        account_id: &AccountId,
        amount: f64,
        is_credit: bool,
    ) -> anyhow::Result<()>;
}

/// Plays the ring tone while the call is ringing.
pub trait Ringer: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

#[derive(Debug, Default)]
pub struct SilentRinger;

impl Ringer for SilentRinger {
    fn start(&self) {}
    fn stop(&self) {}
}
