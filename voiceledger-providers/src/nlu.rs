use crate::request::{HttpRequest, join_url};
use serde_json::json;

pub const PARSE_TRANSACTION_PATH: &str = "/parse-transaction";

#[derive(Clone, PartialEq, Eq)]
pub struct NluProxyConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for NluProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NluProxyConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Request for the serverless parse function. The proxy is stateless: any clarification
/// context must already be folded into `text`.
pub fn build_parse_transaction_request(cfg: &NluProxyConfig, text: &str) -> HttpRequest {
    let url = join_url(&cfg.base_url, PARSE_TRANSACTION_PATH);
    let req = HttpRequest::post_json(url, &json!({ "text": text }));

    match cfg.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(key) => req.with_header("Authorization", format!("Bearer {key}")),
        None => req,
    }
}
