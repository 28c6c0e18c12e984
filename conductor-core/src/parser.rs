//! In-stream tool-call parser (spec.md §4.2): extracts `{name, arguments}`
//! objects embedded in the assistant's accumulated text as soon as they
//! balance, without waiting for the stream to end.

use crate::signature::canonical;
use serde_json::Value;
use std::collections::HashSet;

/// A synthetic tool call recovered from in-band text, plus the offset of the
/// byte immediately following its closing brace (so the caller can advance
/// past it).
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCall {
    pub name: String,
    pub arguments: Value,
    pub end_offset: usize,
    /// Byte length of the matched `{…}` object, so callers can approximate
    /// "assistant text with embedded tool-call JSON stripped" without
    /// re-scanning the buffer.
    pub matched_len: usize,
}

/// Streaming scanner over one turn's accumulated assistant text. Feed it
/// chunks via [`Self::feed`]; it yields newly-completed, not-yet-seen calls.
pub struct StreamingToolCallParser {
    buffer: String,
    last_processed_offset: usize,
    seen_call_keys: HashSet<String>,
    parse_attempts: u32,
    max_parse_attempts: u32,
    exhausted: bool,
}

impl StreamingToolCallParser {
    pub fn new(max_parse_attempts: u32) -> Self {
        Self {
            buffer: String::new(),
            last_processed_offset: 0,
            seen_call_keys: HashSet::new(),
            parse_attempts: 0,
            max_parse_attempts,
            exhausted: false,
        }
    }

    pub fn accumulated_text(&self) -> &str {
        &self.buffer
    }

    /// Append `chunk` to the accumulated text and extract every newly
    /// completed, not-yet-seen call. Returns an empty vec once the
    /// consecutive-parse-failure budget has been exhausted for this turn.
    pub fn feed(&mut self, chunk: &str) -> Vec<ExtractedCall> {
        self.buffer.push_str(chunk);
        if self.exhausted {
            return Vec::new();
        }

        let mut extracted = Vec::new();
        loop {
            let remainder = &self.buffer[self.last_processed_offset..];
            if !(remainder.contains("\"name\"") && remainder.contains("\"arguments\"")) {
                break;
            }

            let Some(brace_start) = remainder.find('{') else {
                break;
            };
            let absolute_start = self.last_processed_offset + brace_start;

            match scan_balanced_object(&self.buffer[absolute_start..]) {
                Some(object_text) => {
                    let end_offset = absolute_start + object_text.len();
                    match serde_json::from_str::<Value>(object_text) {
                        Ok(value) => {
                            self.parse_attempts = 0;
                            match parse_call(&value) {
                                Some((name, arguments)) => {
                                    let key = format!("{name}{}", canonical(&arguments));
                                    let matched_len = object_text.len();
                                    self.last_processed_offset = end_offset;
                                    if self.seen_call_keys.insert(key) {
                                        extracted.push(ExtractedCall {
                                            name,
                                            arguments,
                                            end_offset,
                                            matched_len,
                                        });
                                    }
                                }
                                None => {
                                    // Balanced object but not a {name, arguments} shape;
                                    // skip past it and keep scanning.
                                    self.last_processed_offset = end_offset;
                                }
                            }
                        }
                        Err(_) => {
                            if !self.record_parse_failure() {
                                break;
                            }
                            // Malformed JSON despite balanced braces: skip past it,
                            // further chunks won't repair this object.
                            self.last_processed_offset = end_offset;
                        }
                    }
                }
                None => {
                    // Object not yet complete; wait for more chunks.
                    break;
                }
            }
        }
        extracted
    }

    /// Bump the consecutive-failure counter; returns `false` once the budget
    /// is exhausted, after which parsing stops for the remainder of the turn.
    fn record_parse_failure(&mut self) -> bool {
        self.parse_attempts += 1;
        if self.parse_attempts >= self.max_parse_attempts {
            self.parse_attempts = 0;
            self.exhausted = true;
            return false;
        }
        true
    }
}

fn parse_call(value: &Value) -> Option<(String, Value)> {
    let object = value.as_object()?;
    let name = object.get("name")?.as_str()?.to_string();
    let arguments = object.get("arguments")?.clone();
    Some((name, arguments))
}

/// Scan `text` (which must start with `{`) for the matching closing brace,
/// respecting string literals and backslash escapes. Returns the balanced
/// slice including both braces, or `None` if the object is not yet complete.
fn scan_balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_a_call_delivered_in_one_chunk() {
        let mut parser = StreamingToolCallParser::new(100);
        let calls = parser.feed(r#"here: {"name":"search","arguments":{"query":"TODO"}} done"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search");
        assert_eq!(calls[0].arguments, json!({"query": "TODO"}));
    }

    #[test]
    fn waits_for_the_object_to_complete_across_chunks() {
        let mut parser = StreamingToolCallParser::new(100);
        assert!(parser.feed(r#"{"name":"search","argum"#).is_empty());
        let calls = parser.feed(r#"ents":{"query":"TODO"}}"#);
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn string_literal_braces_do_not_confuse_the_scanner() {
        let mut parser = StreamingToolCallParser::new(100);
        let calls = parser.feed(r#"{"name":"search","arguments":{"query":"a{b}c"}}"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["query"], "a{b}c");
    }

    #[test]
    fn escaped_quote_inside_string_does_not_toggle_early() {
        let mut parser = StreamingToolCallParser::new(100);
        let calls = parser.feed(r#"{"name":"search","arguments":{"query":"a\"}b"}}"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["query"], "a\"}b");
    }

    #[test]
    fn duplicate_call_key_within_turn_is_only_emitted_once() {
        let mut parser = StreamingToolCallParser::new(100);
        let first = parser.feed(r#"{"name":"search","arguments":{"query":"x"}}"#);
        let second = parser.feed(r#"{"name":"search","arguments":{"query":"x"}}"#);
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn object_without_arguments_key_is_skipped_not_stuck() {
        let mut parser = StreamingToolCallParser::new(100);
        let calls = parser.feed(r#"{"name":"search","unrelated":{"query":"x"}} next {"name":"search","arguments":{"query":"y"}}"#);
        // The first object balances but isn't {name, arguments}-shaped, so it
        // is skipped past rather than getting the scanner stuck on it.
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["query"], "y");
    }

    #[test]
    fn exhausting_parse_attempts_stops_further_attempts_for_the_turn() {
        let mut parser = StreamingToolCallParser::new(2);
        parser.feed(r#"{"name":"search","arguments":not-json}"#);
        parser.feed(r#"{"name":"search","arguments":also-not-json}"#);
        // Budget exhausted after two failures; a third, well-formed object
        // is not attempted for the remainder of the turn.
        let calls = parser.feed(r#"{"name":"search","arguments":{"query":"z"}}"#);
        assert!(calls.is_empty());
    }
}
