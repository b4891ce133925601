//! Parsing for the CLI's stream-json (JSONL) output

use super::{OracleResponse, Usage};
use crate::error::OracleError;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    System,
    Assistant,
    ToolUse,
    TextDelta,
    Result,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub kind: EventKind,
    pub payload: String,
}

impl StreamEvent {
    fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn u64_field(v: &Value, key: &str) -> u64 {
    v.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn parse_usage(result: &Value) -> Usage {
    let usage = result.get("usage").cloned().unwrap_or(Value::Null);
    Usage {
        cost_usd: result
            .get("total_cost_usd")
            .or_else(|| result.get("cost_usd"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        input_tokens: u64_field(&usage, "input_tokens"),
        output_tokens: u64_field(&usage, "output_tokens"),
        cache_read_tokens: u64_field(&usage, "cache_read_input_tokens"),
        cache_creation_tokens: u64_field(&usage, "cache_creation_input_tokens"),
    }
}

/// Folds JSONL lines into events and a final response
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    session_id: Option<String>,
    result: Option<String>,
    assistant_text: String,
    is_error: bool,
    usage: Usage,
    turns: Option<u32>,
}

impl StreamAccumulator {
    /// Parse one line; malformed lines are logged and skipped
    pub fn push_line(&mut self, line: &str) -> Vec<StreamEvent> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }
        let v: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!("Skipping malformed stream line: {}", e);
                return Vec::new();
            }
        };

        if let Some(id) = str_field(&v, "session_id") {
            self.session_id = Some(id.to_string());
        }

        let mut events = Vec::new();
        match str_field(&v, "type").unwrap_or("") {
            "system" => {
                events.push(StreamEvent::new(
                    EventKind::System,
                    str_field(&v, "subtype").unwrap_or("system"),
                ));
            }
            "assistant" => {
                let blocks = v
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(Value::as_array);
                for block in blocks.into_iter().flatten() {
                    match str_field(block, "type").unwrap_or("") {
                        "text" => {
                            if let Some(text) = str_field(block, "text") {
                                self.assistant_text.push_str(text);
                                events.push(StreamEvent::new(EventKind::Assistant, text));
                            }
                        }
                        "tool_use" => {
                            let name = str_field(block, "name").unwrap_or("unknown");
                            events.push(StreamEvent::new(EventKind::ToolUse, name));
                        }
                        _ => {}
                    }
                }
            }
            "stream_event" => {
                let delta = v.get("event").and_then(|e| e.get("delta"));
                if let Some(delta) = delta {
                    if str_field(delta, "type") == Some("text_delta") {
                        if let Some(text) = str_field(delta, "text") {
                            events.push(StreamEvent::new(EventKind::TextDelta, text));
                        }
                    }
                }
            }
            "result" => {
                let text = str_field(&v, "result").unwrap_or("").to_string();
                self.is_error = v.get("is_error").and_then(Value::as_bool).unwrap_or(false)
                    || str_field(&v, "subtype").is_some_and(|s| s.starts_with("error"));
                self.usage = parse_usage(&v);
                self.turns = v
                    .get("num_turns")
                    .and_then(Value::as_u64)
                    .and_then(|n| u32::try_from(n).ok());
                events.push(StreamEvent::new(EventKind::Result, text.clone()));
                self.result = Some(text);
            }
            other => {
                debug!("Ignoring stream event type '{}'", other);
            }
        }
        events
    }

    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// Final response, or the error the stream reported
    pub fn finish(self) -> Result<OracleResponse, OracleError> {
        let Some(result) = self.result else {
            return Err(OracleError::NoResult);
        };
        if self.is_error {
            let message = if result.is_empty() {
                "unknown error".to_string()
            } else {
                result
            };
            return Err(OracleError::Reported(message));
        }
        let text = if result.is_empty() {
            self.assistant_text
        } else {
            result
        };
        Ok(OracleResponse {
            text,
            session_id: self.session_id,
            usage: self.usage,
            turns: self.turns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INIT: &str = r#"{"type":"system","subtype":"init","session_id":"abc-123","tools":["Read"]}"#;
    const ASSISTANT: &str = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Writing files"},{"type":"tool_use","name":"Write","input":{"file_path":"a.swift"}}]},"session_id":"abc-123"}"#;
    const RESULT: &str = r#"{"type":"result","subtype":"success","is_error":false,"result":"done","session_id":"abc-123","num_turns":4,"total_cost_usd":0.42,"usage":{"input_tokens":100,"output_tokens":50,"cache_read_input_tokens":900,"cache_creation_input_tokens":20}}"#;

    #[test]
    fn test_full_stream() {
        let mut acc = StreamAccumulator::default();
        let kinds: Vec<EventKind> = [INIT, ASSISTANT, RESULT]
            .iter()
            .flat_map(|l| acc.push_line(l))
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::System,
                EventKind::Assistant,
                EventKind::ToolUse,
                EventKind::Result
            ]
        );

        let response = acc.finish().unwrap();
        assert_eq!(response.text, "done");
        assert_eq!(response.session_id.as_deref(), Some("abc-123"));
        assert_eq!(response.turns, Some(4));
        assert_eq!(response.usage.cache_read_tokens, 900);
        assert!((response.usage.cost_usd - 0.42).abs() < 1e-9);
    }

    #[test]
    fn test_text_delta() {
        let mut acc = StreamAccumulator::default();
        let events = acc.push_line(
            r#"{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"Hel"}}}"#,
        );
        assert_eq!(events, vec![StreamEvent::new(EventKind::TextDelta, "Hel")]);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let mut acc = StreamAccumulator::default();
        assert!(acc.push_line("not json").is_empty());
        assert!(acc.push_line("   ").is_empty());
        assert!(!acc.has_result());
        assert!(matches!(acc.finish(), Err(OracleError::NoResult)));
    }

    #[test]
    fn test_error_result() {
        let mut acc = StreamAccumulator::default();
        acc.push_line(r#"{"type":"result","subtype":"error_max_turns","is_error":true,"result":""}"#);
        match acc.finish() {
            Err(OracleError::Reported(msg)) => assert_eq!(msg, "unknown error"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_result_falls_back_to_assistant_text() {
        let mut acc = StreamAccumulator::default();
        acc.push_line(ASSISTANT);
        acc.push_line(r#"{"type":"result","subtype":"success","result":""}"#);
        assert_eq!(acc.finish().unwrap().text, "Writing files");
    }
}
