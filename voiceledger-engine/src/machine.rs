//! Call state machine.
//!
//! `CallSession::handle` is a pure transition function: it mutates the session and
//! returns the effects the driver must run. Every effect that completes asynchronously
//! carries the session generation it was started under, and its completion event must
//! echo it back. A completion whose generation no longer matches is stale (the call
//! moved on, was muted, or ended) and is dropped without touching the session.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use voiceledger_core::config::CallTimings;
use voiceledger_core::text::{
    MUTED_STATUS, NO_SPEECH_STATUS, RECOGNITION_ERROR_STATUS, SAVE_FAILED_REPLY,
    confirmation_reply,
};
use voiceledger_core::types::{ParsedTransaction, SavedRecord};

use crate::capture::CaptureOutcome;
use crate::resolver::ResolverOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Idle,
    Ringing,
    Connected,
    Listening,
    Processing,
    Speaking,
    Ended,
}

impl CallState {
    /// Part of a turn; at most one of these is ever active.
    pub fn is_turn_stage(self) -> bool {
        matches!(self, Self::Listening | Self::Processing | Self::Speaking)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ringing => "ringing",
            Self::Connected => "connected",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
            Self::Ended => "ended",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// `account_name` is set when the user named the account.
    Saved {
        record: SavedRecord,
        account_name: Option<String>,
    },
    NotSaved,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    Start,
    Answered { generation: u64 },
    Tick,
    ListenDue { generation: u64 },
    Interim { generation: u64, text: String },
    Captured { generation: u64, outcome: CaptureOutcome },
    Resolved { generation: u64, outcome: ResolverOutcome },
    SaveFinished { generation: u64, outcome: SaveOutcome },
    SpeechFinished { generation: u64 },
    ToggleMute(bool),
    /// User hung up.
    End,
    /// The shell went away; close without the usual delay.
    Teardown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartRinging,
    StopRinging,
    ScheduleAnswer { generation: u64, delay: Duration },
    StartListening { generation: u64 },
    AbortListening,
    Resolve {
        generation: u64,
        transcript: String,
        prior_context: Option<String>,
    },
    Save {
        generation: u64,
        transaction: ParsedTransaction,
    },
    Speak { generation: u64, text: String },
    /// Cut off the reply that is playing.
    StopSpeaking,
    ScheduleListen { generation: u64, delay: Duration },
    ScheduleClose { delay: Duration },
}

/// Read-only view for the call UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallSnapshot {
    pub state: CallState,
    pub duration_seconds: u64,
    pub is_muted: bool,
    pub transcript: String,
    pub status: Option<String>,
    pub awaiting_clarification: bool,
}

#[derive(Debug, Clone)]
pub struct CallSession {
    timings: CallTimings,
    state: CallState,
    duration_seconds: u64,
    is_muted: bool,
    transcript: String,
    clarification_context: Option<String>,
    status: Option<String>,
    generation: u64,
    answered: bool,
}

impl CallSession {
    pub fn new(timings: CallTimings) -> Self {
        Self {
            timings,
            state: CallState::Idle,
            duration_seconds: 0,
            is_muted: false,
            transcript: String::new(),
            clarification_context: None,
            status: None,
            generation: 0,
            answered: false,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn clarification_context(&self) -> Option<&str> {
        self.clarification_context.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            state: self.state,
            duration_seconds: self.duration_seconds,
            is_muted: self.is_muted,
            transcript: self.transcript.clone(),
            status: self.status.clone(),
            awaiting_clarification: self.clarification_context.is_some(),
        }
    }

    pub fn handle(&mut self, event: CallEvent) -> Vec<Effect> {
        if self.state == CallState::Ended {
            log::debug!("call ended; dropping {event:?}");
            return vec![];
        }

        let mut fx = Vec::new();
        match event {
            CallEvent::Start => {
                if self.state == CallState::Idle {
                    self.state = CallState::Ringing;
                    self.status = Some("Calling...".into());
                    let generation = self.bump();
                    fx.push(Effect::StartRinging);
                    fx.push(Effect::ScheduleAnswer {
                        generation,
                        delay: self.timings.ring_delay(),
                    });
                }
            }
            CallEvent::Answered { generation } => {
                if self.is_current(CallState::Ringing, generation) {
                    fx.push(Effect::StopRinging);
                    self.answered = true;
                    self.state = CallState::Connected;
                    self.status = Some("Connected".into());
                    self.begin_listen(&mut fx);
                }
            }
            CallEvent::Tick => {
                if self.answered {
                    self.duration_seconds += 1;
                }
            }
            CallEvent::ListenDue { generation } => {
                if self.is_current(CallState::Connected, generation) {
                    self.begin_listen(&mut fx);
                }
            }
            CallEvent::Interim { generation, text } => {
                if self.is_current(CallState::Listening, generation) {
                    self.transcript = text;
                }
            }
            CallEvent::Captured {
                generation,
                outcome,
            } => {
                if self.is_current(CallState::Listening, generation) {
                    self.on_captured(outcome, &mut fx);
                }
            }
            CallEvent::Resolved {
                generation,
                outcome,
            } => {
                if self.is_current(CallState::Processing, generation) {
                    self.on_resolved(outcome, &mut fx);
                }
            }
            CallEvent::SaveFinished {
                generation,
                outcome,
            } => {
                if self.is_current(CallState::Processing, generation) {
                    self.on_saved(outcome, &mut fx);
                }
            }
            CallEvent::SpeechFinished { generation } => {
                if self.is_current(CallState::Speaking, generation) {
                    self.state = CallState::Connected;
                    self.status = None;
                    self.schedule_listen(&mut fx);
                }
            }
            CallEvent::ToggleMute(muted) => self.on_toggle_mute(muted, &mut fx),
            CallEvent::End => self.end(self.timings.close_delay(), &mut fx),
            CallEvent::Teardown => self.end(Duration::ZERO, &mut fx),
        }
        fx
    }

    fn bump(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    fn is_current(&self, state: CallState, generation: u64) -> bool {
        let current = self.state == state && self.generation == generation;
        if !current {
            log::debug!(
                "stale completion: generation {generation} (now {}), expected {:?} (now {:?})",
                self.generation,
                state,
                self.state
            );
        }
        current
    }

    fn begin_listen(&mut self, fx: &mut Vec<Effect>) {
        if self.is_muted {
            self.status = Some(MUTED_STATUS.into());
            return;
        }
        let generation = self.bump();
        self.state = CallState::Listening;
        self.transcript.clear();
        self.status = Some("Listening...".into());
        fx.push(Effect::StartListening { generation });
    }

    fn schedule_listen(&mut self, fx: &mut Vec<Effect>) {
        if self.is_muted {
            self.status = Some(MUTED_STATUS.into());
            return;
        }
        let generation = self.bump();
        fx.push(Effect::ScheduleListen {
            generation,
            delay: self.timings.turn_pause(),
        });
    }

    fn speak(&mut self, text: String, fx: &mut Vec<Effect>) {
        let generation = self.bump();
        self.state = CallState::Speaking;
        self.status = Some(text.clone());
        fx.push(Effect::Speak { generation, text });
    }

    fn on_captured(&mut self, outcome: CaptureOutcome, fx: &mut Vec<Effect>) {
        match outcome {
            CaptureOutcome::Final(text) if !text.trim().is_empty() => {
                let generation = self.bump();
                self.transcript = text.clone();
                self.state = CallState::Processing;
                self.status = Some("Processing...".into());
                fx.push(Effect::Resolve {
                    generation,
                    transcript: text,
                    prior_context: self.clarification_context.clone(),
                });
            }
            CaptureOutcome::Final(_) | CaptureOutcome::NoSpeech => {
                self.state = CallState::Connected;
                self.status = Some(NO_SPEECH_STATUS.into());
                self.schedule_listen(fx);
            }
            CaptureOutcome::Failed(reason) => {
                log::warn!("speech recognition failed: {reason}");
                self.state = CallState::Connected;
                self.status = Some(RECOGNITION_ERROR_STATUS.into());
                self.schedule_listen(fx);
            }
            // Only mute or end abort a cycle, and both already moved the call on.
            CaptureOutcome::Aborted => {}
        }
    }

    fn on_resolved(&mut self, outcome: ResolverOutcome, fx: &mut Vec<Effect>) {
        match outcome {
            ResolverOutcome::UnsupportedLanguage { reply } => self.speak(reply, fx),
            ResolverOutcome::Clarify { question, context } => {
                self.clarification_context = Some(context);
                self.speak(question, fx);
            }
            ResolverOutcome::Resolved(transaction) => {
                self.clarification_context = None;
                let generation = self.bump();
                self.status = Some("Saving...".into());
                fx.push(Effect::Save {
                    generation,
                    transaction,
                });
            }
            ResolverOutcome::Unresolvable { reply } => {
                self.clarification_context = None;
                self.speak(reply, fx);
            }
        }
    }

    fn on_saved(&mut self, outcome: SaveOutcome, fx: &mut Vec<Effect>) {
        let reply = match outcome {
            SaveOutcome::Saved {
                record,
                account_name,
            } => confirmation_reply(
                record.draft.kind,
                record.draft.amount,
                &record.draft.category,
                account_name.as_deref(),
            ),
            SaveOutcome::NotSaved => {
                log::warn!("transaction store declined to save");
                SAVE_FAILED_REPLY.into()
            }
            SaveOutcome::Failed(reason) => {
                log::warn!("saving transaction failed: {reason}");
                SAVE_FAILED_REPLY.into()
            }
        };
        self.speak(reply, fx);
    }

    fn on_toggle_mute(&mut self, muted: bool, fx: &mut Vec<Effect>) {
        if self.is_muted == muted {
            return;
        }
        self.is_muted = muted;

        if muted {
            if self.state == CallState::Listening {
                // Invalidate the cycle before aborting so a late transcript is stale.
                self.bump();
                self.state = CallState::Connected;
                self.transcript.clear();
                fx.push(Effect::AbortListening);
            }
            if self.state == CallState::Connected {
                self.status = Some(MUTED_STATUS.into());
            }
        } else if self.state == CallState::Connected {
            self.begin_listen(fx);
        }
    }

    fn end(&mut self, close_delay: Duration, fx: &mut Vec<Effect>) {
        let prev = self.state;
        self.bump();
        self.state = CallState::Ended;
        self.status = Some("Call ended".into());

        match prev {
            CallState::Ringing => fx.push(Effect::StopRinging),
            CallState::Listening => fx.push(Effect::AbortListening),
            CallState::Speaking => fx.push(Effect::StopSpeaking),
            _ => {}
        }
        fx.push(Effect::ScheduleClose { delay: close_delay });
    }
}
