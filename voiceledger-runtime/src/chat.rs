//! Typed chat entry: the assistant's reply streams in as Server-Sent Events and is shown
//! incrementally, then the completed text is read as the transaction JSON.

use voiceledger_core::text::{FALLBACK_APOLOGY, LANGUAGE_REMINDER, is_supported_input};
use voiceledger_core::types::ParsedTransactionRequest;
use voiceledger_providers::openai_compatible::{
    ChatMessage, OpenAiCompatibleChatConfig, build_streaming_chat_request,
    transaction_extraction_prompt,
};
use voiceledger_providers::parse::parse_nlu_reply;
use voiceledger_providers::request::HttpRequest;
use voiceledger_providers::runtime;
use voiceledger_providers::sse::{ChatDelta, SseDecoder, chat_delta};

/// Streams a chat completion, calling `on_text` for every content delta. Returns the
/// concatenated text once the stream ends or sends `[DONE]`.
pub async fn stream_chat<F>(req: &HttpRequest, mut on_text: F) -> anyhow::Result<String>
where
    F: FnMut(&str),
{
    let mut decoder = SseDecoder::new();
    let mut full = String::new();
    let mut done = false;

    let mut apply = |delta: ChatDelta, full: &mut String, done: &mut bool| match delta {
        ChatDelta::Text(text) => {
            on_text(&text);
            full.push_str(&text);
        }
        ChatDelta::Done => *done = true,
        ChatDelta::Skip => {}
    };

    runtime::execute_streaming(req, |chunk| {
        if done {
            return Ok(());
        }
        for event in decoder.feed(chunk)? {
            apply(chat_delta(&event.data), &mut full, &mut done);
            if done {
                break;
            }
        }
        Ok(())
    })
    .await?;

    if !done {
        if let Some(event) = decoder.finish()? {
            apply(chat_delta(&event.data), &mut full, &mut done);
        }
    }
    Ok(full)
}

/// What the chat flow should do with one user message.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatTurn {
    Request(ParsedTransactionRequest),
    Reply(String),
}

/// Runs one typed message through the streaming model.
pub async fn chat_transaction<F>(
    cfg: &OpenAiCompatibleChatConfig,
    input: &str,
    today: chrono::NaiveDate,
    on_text: F,
) -> anyhow::Result<ChatTurn>
where
    F: FnMut(&str),
{
    if !is_supported_input(input) {
        return Ok(ChatTurn::Reply(LANGUAGE_REMINDER.into()));
    }

    let messages = vec![
        ChatMessage::system(transaction_extraction_prompt(today)),
        ChatMessage::user(input),
    ];
    let req = build_streaming_chat_request(cfg, &messages);
    let text = stream_chat(&req, on_text).await?;

    let request = match parse_nlu_reply(text.as_bytes()) {
        Ok(reply) => reply.into_request(),
        Err(e) => {
            log::warn!("chat reply was not transaction JSON: {e:#}");
            None
        }
    };
    Ok(match request {
        Some(request) => ChatTurn::Request(request),
        None => ChatTurn::Reply(FALLBACK_APOLOGY.into()),
    })
}
