use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use voiceledger_core::category::normalize_category;
use voiceledger_core::text::strip_code_fences;
use voiceledger_core::types::{ParsedTransaction, ParsedTransactionRequest, TransactionType};

/// Reply from the NL-understanding backend. Every field is optional: the backend is an LLM
/// and the shape is checked, not trusted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NluReply {
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "transactionDate", alias = "transaction_date")]
    pub date: Option<String>,
    #[serde(default, rename = "accountName", alias = "account_name", alias = "account")]
    pub account_name: Option<String>,
    #[serde(default, alias = "needsClarification", alias = "needs_clarification")]
    pub unclear: Option<bool>,
    #[serde(default, alias = "clarificationQuestion", alias = "clarification_question")]
    pub question: Option<String>,
}

impl NluReply {
    /// Classifies the reply. `None` means neither a usable question nor a complete
    /// transaction came back.
    pub fn into_request(self) -> Option<ParsedTransactionRequest> {
        let question = self
            .question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());
        if self.unclear == Some(true) {
            return question.map(|q| ParsedTransactionRequest::NeedsClarification {
                question: q.to_string(),
            });
        }

        let kind = self.kind.as_deref().and_then(TransactionType::parse)?;
        let amount = self.amount.as_ref().and_then(amount_from_value)?;
        let raw_category = self.category.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        let category = normalize_category(kind, raw_category).to_string();

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| category.replace('_', " "));

        let transaction_date = self
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());

        let account_name = self
            .account_name
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("null"));

        Some(ParsedTransactionRequest::Complete(ParsedTransaction {
            kind,
            amount,
            category,
            description,
            transaction_date,
            account_name,
        }))
    }
}

fn amount_from_value(v: &Value) -> Option<f64> {
    let amount = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let digits: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse::<f64>().ok()?
        }
        _ => return None,
    };
    (amount.is_finite() && amount > 0.0).then_some(amount)
}

pub fn parse_nlu_reply(body: &[u8]) -> anyhow::Result<NluReply> {
    let text = std::str::from_utf8(body).context("nlu reply is not utf-8")?;
    let json = strip_code_fences(text);
    serde_json::from_str(json).context("decode nlu reply JSON")
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

pub fn parse_openai_chat_completion(body: &[u8]) -> anyhow::Result<String> {
    let resp: OpenAiChatResponse = serde_json::from_slice(body).context("decode chat JSON")?;
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow!("no content in chat completion response"))?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(body: &str) -> Option<ParsedTransactionRequest> {
        parse_nlu_reply(body.as_bytes()).unwrap().into_request()
    }

    #[test]
    fn complete_reply_becomes_transaction() {
        let req = classify(
            r#"{"type":"expense","amount":500,"category":"transport","description":"rickshaw"}"#,
        );
        let Some(ParsedTransactionRequest::Complete(tx)) = req else {
            panic!("expected complete transaction");
        };
        assert_eq!(tx.kind, TransactionType::Expense);
        assert_eq!(tx.amount, 500.0);
        assert_eq!(tx.category, "transport");
        assert_eq!(tx.description, "rickshaw");
        assert_eq!(tx.transaction_date, None);
        assert_eq!(tx.account_name, None);
    }

    #[test]
    fn accepts_camel_case_and_string_amounts() {
        let req = classify(
            r#"{"type":"Income","amount":"৳ 25000","category":"Salary","transactionDate":"2024-02-29","accountName":"bKash"}"#,
        );
        let Some(ParsedTransactionRequest::Complete(tx)) = req else {
            panic!("expected complete transaction");
        };
        assert_eq!(tx.amount, 25000.0);
        assert_eq!(tx.category, "salary");
        assert_eq!(tx.description, "salary");
        assert_eq!(tx.transaction_date, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(tx.account_name.as_deref(), Some("bKash"));
    }

    #[test]
    fn unclear_reply_becomes_question() {
        let req = classify(r#"{"unclear":true,"question":"How much did you spend?"}"#);
        assert_eq!(
            req,
            Some(ParsedTransactionRequest::NeedsClarification {
                question: "How much did you spend?".into()
            })
        );
    }

    #[test]
    fn unclear_without_question_is_unresolvable() {
        assert_eq!(classify(r#"{"unclear":true,"question":"  "}"#), None);
        assert_eq!(classify(r#"{"unclear":true}"#), None);
    }

    #[test]
    fn missing_fields_are_unresolvable() {
        assert_eq!(classify(r#"{"type":"expense","amount":500}"#), None);
        assert_eq!(classify(r#"{"type":"expense","amount":0,"category":"food"}"#), None);
        assert_eq!(classify(r#"{"type":"transfer","amount":5,"category":"food"}"#), None);
        assert_eq!(classify(r#"{}"#), None);
    }

    #[test]
    fn strips_code_fences_before_decoding() {
        let body = "```json\n{\"type\":\"expense\",\"amount\":80,\"category\":\"food\"}\n```";
        assert!(matches!(
            classify(body),
            Some(ParsedTransactionRequest::Complete(_))
        ));
    }

    #[test]
    fn invalid_json_errors() {
        assert!(parse_nlu_reply(b"Sure! Here you go").is_err());
    }

    #[test]
    fn parses_openai_chat_content() {
        let body = br#"{"choices":[{"message":{"content":"hi"}}]}"#;
        assert_eq!(parse_openai_chat_completion(body).unwrap(), "hi");
    }

    #[test]
    fn openai_missing_content_errors() {
        let body = br#"{"choices":[{"message":{}}]}"#;
        assert!(parse_openai_chat_completion(body).is_err());
    }
}
