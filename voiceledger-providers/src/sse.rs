// Incremental Server-Sent-Events decoding for streamed chat replies.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SseError {
    #[error("event stream line is not valid utf-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Line-oriented SSE decoder. Chunks may split anywhere, including inside a multi-byte
/// character; bytes are only decoded once a full line is buffered.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, SseError> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8(line).map_err(|_| SseError::InvalidUtf8)?;
            if let Some(ev) = self.process_line(&line) {
                out.push(ev);
            }
        }
        Ok(out)
    }

    /// Flushes a trailing event whose terminating blank line never arrived.
    pub fn finish(&mut self) -> Result<Option<SseEvent>, SseError> {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8(rest).map_err(|_| SseError::InvalidUtf8)?;
            let line = line.trim_end_matches('\r').to_string();
            if let Some(ev) = self.process_line(&line) {
                return Ok(Some(ev));
            }
        }
        Ok(self.dispatch())
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatDelta {
    Text(String),
    Done,
    Skip,
}

/// Interprets one `data:` payload of an OpenAI-style chat completion stream.
pub fn chat_delta(data: &str) -> ChatDelta {
    let data = data.trim();
    if data == "[DONE]" {
        return ChatDelta::Done;
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("skipping undecodable stream payload: {e}");
            return ChatDelta::Skip;
        }
    };

    match value["choices"][0]["delta"]["content"].as_str() {
        Some(text) if !text.is_empty() => ChatDelta::Text(text.to_string()),
        _ => ChatDelta::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"data: {\"a\"").unwrap().is_empty());
        let events = dec.feed(b":1}\n\ndata: second\r\n\r\n").unwrap();
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: None,
                    data: "{\"a\":1}".into()
                },
                SseEvent {
                    event: None,
                    data: "second".into()
                },
            ]
        );
    }

    #[test]
    fn keeps_multibyte_characters_intact() {
        let bytes = "data: টাকা\n\n".as_bytes();
        let mut dec = SseDecoder::new();
        let mut events = Vec::new();
        for b in bytes {
            events.extend(dec.feed(std::slice::from_ref(b)).unwrap());
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "টাকা");
    }

    #[test]
    fn joins_multiline_data_and_reads_event_name() {
        let mut dec = SseDecoder::new();
        let events = dec
            .feed(b": keep-alive\nevent: message\ndata: one\ndata: two\n\n")
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("message"));
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut dec = SseDecoder::new();
        assert!(dec.feed(b"data: [DONE]").unwrap().is_empty());
        let last = dec.finish().unwrap().unwrap();
        assert_eq!(last.data, "[DONE]");
        assert_eq!(dec.finish().unwrap(), None);
    }

    #[test]
    fn invalid_utf8_line_errors() {
        let mut dec = SseDecoder::new();
        assert_eq!(dec.feed(b"data: \xff\n"), Err(SseError::InvalidUtf8));
    }

    #[test]
    fn interprets_chat_deltas() {
        assert_eq!(
            chat_delta(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#),
            ChatDelta::Text("Hel".into())
        );
        assert_eq!(chat_delta(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#), ChatDelta::Skip);
        assert_eq!(chat_delta("[DONE]"), ChatDelta::Done);
        assert_eq!(chat_delta("not json"), ChatDelta::Skip);
    }
}
