use voiceledger_engine::traits::NluBackend;
use voiceledger_providers::nlu::{NluProxyConfig, build_parse_transaction_request};
use voiceledger_providers::openai_compatible::{
    ChatMessage, OpenAiCompatibleChatConfig, build_chat_completions_request,
    transaction_extraction_prompt,
};
use voiceledger_providers::parse::{NluReply, parse_nlu_reply, parse_openai_chat_completion};
use voiceledger_providers::runtime;

/// Serverless proxy that returns the transaction JSON directly.
#[derive(Debug, Clone)]
pub struct ProxyNluBackend {
    cfg: NluProxyConfig,
}

impl ProxyNluBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            cfg: NluProxyConfig {
                base_url: base_url.into(),
                api_key,
            },
        }
    }
}

#[async_trait::async_trait]
impl NluBackend for ProxyNluBackend {
    async fn interpret(&self, input: &str) -> anyhow::Result<NluReply> {
        let req = build_parse_transaction_request(&self.cfg, input);
        let resp = runtime::execute(&req).await?;

        if !resp.is_success() {
            return Err(anyhow::anyhow!(
                "NLU proxy request failed: status={} body={}",
                resp.status,
                String::from_utf8_lossy(&resp.body)
            ));
        }

        parse_nlu_reply(&resp.body)
    }
}

/// OpenAI-compatible chat completions, prompted with the category tables.
#[derive(Debug, Clone)]
pub struct ChatNluBackend {
    cfg: OpenAiCompatibleChatConfig,
}

impl ChatNluBackend {
    pub fn new(cfg: OpenAiCompatibleChatConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait::async_trait]
impl NluBackend for ChatNluBackend {
    async fn interpret(&self, input: &str) -> anyhow::Result<NluReply> {
        let today = chrono::Local::now().date_naive();
        let messages = vec![
            ChatMessage::system(transaction_extraction_prompt(today)),
            ChatMessage::user(input),
        ];

        let req = build_chat_completions_request(&self.cfg, &messages);
        let resp = runtime::execute(&req).await?;

        if !resp.is_success() {
            return Err(anyhow::anyhow!(
                "OpenAI-compatible request failed: status={} body={}",
                resp.status,
                String::from_utf8_lossy(&resp.body)
            ));
        }

        let content = parse_openai_chat_completion(&resp.body)?;
        parse_nlu_reply(content.as_bytes())
    }
}
