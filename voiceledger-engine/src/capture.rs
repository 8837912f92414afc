use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, mpsc};
use voiceledger_core::text::clean_transcript;

use crate::traits::{InterimSink, SpeechCapture};

/// How one listen cycle ended.
///
/// `NoSpeech` and `Aborted` are deliberately distinct: the first re-prompts the user, the
/// second must not move the call at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Final(String),
    NoSpeech,
    Aborted,
    Failed(String),
}

impl CaptureOutcome {
    pub fn from_final(text: &str) -> Self {
        let cleaned = clean_transcript(text);
        if cleaned.is_empty() {
            Self::NoSpeech
        } else {
            Self::Final(cleaned)
        }
    }
}

/// Running transcript of one recognition session: finalized segments plus the
/// current interim guess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptAccumulator {
    finals: Vec<String>,
    interim: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_interim(&mut self, text: &str) {
        self.interim = text.trim().to_string();
    }

    pub fn push_final(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.finals.push(text.to_string());
        }
        self.interim.clear();
    }

    /// Text for live display.
    pub fn current(&self) -> String {
        let mut parts: Vec<&str> = self.finals.iter().map(String::as_str).collect();
        if !self.interim.is_empty() {
            parts.push(&self.interim);
        }
        parts.join(" ")
    }

    pub fn finish(self) -> CaptureOutcome {
        CaptureOutcome::from_final(&self.finals.join(" "))
    }
}

/// Events as a platform recognizer reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Interim(String),
    Final(String),
    /// Recognizer stopped on its own (end of speech).
    End,
    Error(String),
}

// Error codes the browser recognizer uses for an intentional stop and for silence.
const ERROR_ABORTED: &str = "aborted";
const ERROR_NO_SPEECH: &str = "no-speech";

/// Adapts a stream of recognizer events into listen cycles.
///
/// Events queued while no cycle is active are dropped when the next cycle starts,
/// as a microphone that is not listening would not have heard them.
pub struct ChannelCapture {
    events: Mutex<mpsc::UnboundedReceiver<RecognitionEvent>>,
    abort: Notify,
}

impl ChannelCapture {
    pub fn new() -> (Self, mpsc::UnboundedSender<RecognitionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let capture = Self {
            events: Mutex::new(rx),
            abort: Notify::new(),
        };
        (capture, tx)
    }
}

#[async_trait]
impl SpeechCapture for ChannelCapture {
    async fn listen(&self, on_interim: InterimSink) -> CaptureOutcome {
        let mut events = self.events.lock().await;
        let mut dropped = 0usize;
        while events.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            log::debug!("dropped {dropped} recognizer events heard between listen cycles");
        }

        let mut acc = TranscriptAccumulator::new();
        loop {
            let event = tokio::select! {
                _ = self.abort.notified() => return CaptureOutcome::Aborted,
                ev = events.recv() => ev,
            };

            match event {
                Some(RecognitionEvent::Interim(text)) => {
                    acc.set_interim(&text);
                    on_interim(acc.current());
                }
                Some(RecognitionEvent::Final(text)) => {
                    acc.push_final(&text);
                    on_interim(acc.current());
                }
                Some(RecognitionEvent::End) => return acc.finish(),
                Some(RecognitionEvent::Error(code)) => {
                    return match code.as_str() {
                        ERROR_ABORTED => CaptureOutcome::Aborted,
                        ERROR_NO_SPEECH => CaptureOutcome::NoSpeech,
                        _ => CaptureOutcome::Failed(code),
                    };
                }
                None => return CaptureOutcome::Failed("recognizer closed".into()),
            }
        }
    }

    fn abort(&self) {
        self.abort.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    fn recorder() -> (InterimSink, Arc<StdMutex<Vec<String>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: InterimSink = Box::new(move |t| sink_seen.lock().unwrap().push(t));
        (sink, seen)
    }

    // Gives spawned listen tasks a chance to start their cycle.
    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn blank_final_is_no_speech() {
        assert_eq!(CaptureOutcome::from_final("  "), CaptureOutcome::NoSpeech);
        assert_eq!(CaptureOutcome::from_final("[noise]"), CaptureOutcome::NoSpeech);
        assert_eq!(
            CaptureOutcome::from_final(" 500 tk rickshaw "),
            CaptureOutcome::Final("500 tk rickshaw".into())
        );
    }

    #[test]
    fn accumulator_joins_finals_and_interim() {
        let mut acc = TranscriptAccumulator::new();
        acc.set_interim("five");
        assert_eq!(acc.current(), "five");
        acc.push_final("500 taka");
        acc.set_interim("rick");
        assert_eq!(acc.current(), "500 taka rick");
        acc.push_final("rickshaw");
        assert_eq!(acc.finish(), CaptureOutcome::Final("500 taka rickshaw".into()));
    }

    #[tokio::test]
    async fn channel_capture_delivers_final_on_end() {
        let (capture, tx) = ChannelCapture::new();
        let (sink, seen) = recorder();

        tx.send(RecognitionEvent::Final("stale".into())).unwrap();
        let listen = capture.listen(sink);
        tokio::pin!(listen);

        // Let the cycle start and drop the stale event before speaking.
        tokio::select! {
            _ = &mut listen => panic!("listen finished early"),
            _ = tokio::task::yield_now() => {}
        }
        tx.send(RecognitionEvent::Interim("500".into())).unwrap();
        tx.send(RecognitionEvent::Final("500 tk rickshaw".into())).unwrap();
        tx.send(RecognitionEvent::End).unwrap();

        assert_eq!(listen.await, CaptureOutcome::Final("500 tk rickshaw".into()));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["500".to_string(), "500 tk rickshaw".to_string()]
        );
    }

    #[tokio::test]
    async fn channel_capture_maps_error_codes() {
        let (capture, tx) = ChannelCapture::new();
        let capture = Arc::new(capture);

        for (code, expected) in [
            ("no-speech", CaptureOutcome::NoSpeech),
            ("aborted", CaptureOutcome::Aborted),
            ("network", CaptureOutcome::Failed("network".into())),
        ] {
            let c = capture.clone();
            let task = tokio::spawn(async move { c.listen(Box::new(|_| {})).await });
            settle().await;
            tx.send(RecognitionEvent::Error(code.into())).unwrap();
            assert_eq!(task.await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn abort_ends_cycle_without_transcript() {
        let (capture, tx) = ChannelCapture::new();
        let capture = Arc::new(capture);

        let c = capture.clone();
        let task = tokio::spawn(async move { c.listen(Box::new(|_| {})).await });
        settle().await;
        tx.send(RecognitionEvent::Interim("half a sent".into())).unwrap();
        settle().await;
        capture.abort();

        assert_eq!(task.await.unwrap(), CaptureOutcome::Aborted);
    }

    #[tokio::test]
    async fn events_queued_before_a_cycle_are_not_heard() {
        let (capture, tx) = ChannelCapture::new();
        tx.send(RecognitionEvent::Final("said during the ring".into())).unwrap();
        tx.send(RecognitionEvent::End).unwrap();

        let capture = Arc::new(capture);
        let c = capture.clone();
        let task = tokio::spawn(async move { c.listen(Box::new(|_| {})).await });
        settle().await;
        tx.send(RecognitionEvent::Final("500 tk rickshaw".into())).unwrap();
        tx.send(RecognitionEvent::End).unwrap();

        assert_eq!(
            task.await.unwrap(),
            CaptureOutcome::Final("500 tk rickshaw".into())
        );
    }
}
