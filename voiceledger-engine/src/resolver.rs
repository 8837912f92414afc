use std::sync::Arc;
use voiceledger_core::text::{
    FALLBACK_APOLOGY, LANGUAGE_REMINDER, compose_clarified_input, is_supported_input,
};
use voiceledger_core::types::{ParsedTransaction, ParsedTransactionRequest};

use crate::traits::NluBackend;

#[derive(Debug, Clone, PartialEq)]
pub enum ResolverOutcome {
    /// Local guard hit; the backend was not called.
    UnsupportedLanguage { reply: String },
    /// Ask `question`; `context` is the utterance to carry into the next turn.
    Clarify { question: String, context: String },
    Resolved(ParsedTransaction),
    /// Backend failed or replied with nothing usable. Any carried context is dropped.
    Unresolvable { reply: String },
}

/// Turns a transcript into a transaction or something to say back.
#[derive(Clone)]
pub struct DialogueResolver {
    backend: Arc<dyn NluBackend>,
}

impl DialogueResolver {
    pub fn new(backend: Arc<dyn NluBackend>) -> Self {
        Self { backend }
    }

    pub async fn resolve(&self, transcript: &str, prior_context: Option<&str>) -> ResolverOutcome {
        if !is_supported_input(transcript) {
            return ResolverOutcome::UnsupportedLanguage {
                reply: LANGUAGE_REMINDER.into(),
            };
        }

        let input = match prior_context {
            Some(original) => compose_clarified_input(original, transcript),
            None => transcript.to_string(),
        };

        let reply = match self.backend.interpret(&input).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("nlu request failed: {e:#}");
                return unresolvable();
            }
        };

        match reply.into_request() {
            Some(ParsedTransactionRequest::NeedsClarification { question }) => {
                ResolverOutcome::Clarify {
                    question,
                    context: prior_context.unwrap_or(transcript).to_string(),
                }
            }
            Some(ParsedTransactionRequest::Complete(tx)) => ResolverOutcome::Resolved(tx),
            None => {
                log::warn!("nlu reply had neither a transaction nor a question");
                unresolvable()
            }
        }
    }
}

fn unresolvable() -> ResolverOutcome {
    ResolverOutcome::Unresolvable {
        reply: FALLBACK_APOLOGY.into(),
    }
}
