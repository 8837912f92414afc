use crate::request::{HttpRequest, join_url};
use chrono::NaiveDate;
use serde_json::json;
use voiceledger_core::category::{EXPENSE_CATEGORIES, INCOME_CATEGORIES};

#[derive(Clone, PartialEq, Eq)]
pub struct OpenAiCompatibleChatConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for OpenAiCompatibleChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleChatConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

pub fn build_chat_completions_request(
    cfg: &OpenAiCompatibleChatConfig,
    messages: &[ChatMessage],
) -> HttpRequest {
    build(cfg, messages, false, 0.1)
}

/// Same endpoint with `stream: true`; the response is a Server-Sent-Events body.
pub fn build_streaming_chat_request(
    cfg: &OpenAiCompatibleChatConfig,
    messages: &[ChatMessage],
) -> HttpRequest {
    build(cfg, messages, true, 0.7)
}

fn build(
    cfg: &OpenAiCompatibleChatConfig,
    messages: &[ChatMessage],
    stream: bool,
    temperature: f32,
) -> HttpRequest {
    let url = join_url(&cfg.base_url, "/chat/completions");

    let payload = json!({
        "model": cfg.model,
        "messages": messages.iter().map(|m| json!({"role": m.role, "content": m.content})).collect::<Vec<_>>(),
        "temperature": temperature,
        "stream": stream,
    });

    let req = HttpRequest::post_json(url, &payload)
        .with_header("Authorization", format!("Bearer {}", cfg.api_key));
    if stream {
        req.with_header("Accept", "text/event-stream")
    } else {
        req
    }
}

/// System prompt asking the model for the same JSON the parse proxy returns.
pub fn transaction_extraction_prompt(today: NaiveDate) -> String {
    format!(
        "You extract a single personal finance transaction from what the user said.\n\
         Today is {today}.\n\
         Expense categories: {expense}.\n\
         Income categories: {income}.\n\
         Reply with JSON only, no prose.\n\
         If the transaction is clear, reply: \
         {{\"type\":\"income|expense\",\"amount\":<number>,\"category\":\"<id>\",\
         \"description\":\"<short text>\",\"date\":\"YYYY-MM-DD or null\",\
         \"accountName\":\"<account mentioned or null>\"}}\n\
         If amount, type or category cannot be determined, reply: \
         {{\"unclear\":true,\"question\":\"<one short question to ask the user>\"}}",
        expense = EXPENSE_CATEGORIES.join(", "),
        income = INCOME_CATEGORIES.join(", "),
    )
}
