/// Schema-agnostic message extraction across LLM provider wire shapes.
///
/// Real captured traffic mixes shapes: OpenAI chat-completion streaming and
/// non-streaming, Ollama chat, and looser "delta"/"message" variants, often in
/// the same stream. Rather than committing to one provider schema, each parsed
/// segment runs through a fixed list of field probes. Every probe is total —
/// an unexpected shape contributes nothing instead of failing — and all probes
/// run on every segment because the shapes are additive, not mutually
/// exclusive.
///
/// Extraction is a pure function of the buffer snapshot: re-running it on the
/// same text yields an identical message, no state survives between passes.
pub mod tool_calls;

pub use tool_calls::{ToolCall, ToolCallAggregator, ToolFunction};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::frame::{self, Segment};

/// The provider-agnostic message recovered from one exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedMessage {
    /// Internal deliberation text.
    pub reasoning: String,
    /// Final answer text.
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ExtractedMessage {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reasoning.is_empty() && self.content.is_empty() && self.tool_calls.is_empty()
    }
}

/// Reconstruct the accumulated body text and extract a message from it.
#[must_use]
pub fn extract_message(text: &str) -> ExtractedMessage {
    let reconstruction = frame::reconstruct(text);
    extract_from_segments(&reconstruction.segments)
}

/// Extract a message from already reconstructed segments, in segment order.
#[must_use]
pub fn extract_from_segments(segments: &[Segment]) -> ExtractedMessage {
    let mut acc = Accumulator::default();
    for segment in segments {
        match &segment.value {
            Some(Value::Object(map)) => probe_object(map, &mut acc),
            // A monolithic array document probes each element.
            Some(Value::Array(items)) => {
                for item in items {
                    if let Some(map) = item.as_object() {
                        probe_object(map, &mut acc);
                    }
                }
            }
            _ => {}
        }
    }
    acc.finish()
}

#[derive(Default)]
struct Accumulator {
    reasoning: String,
    content: String,
    tool_calls: ToolCallAggregator,
}

impl Accumulator {
    fn finish(self) -> ExtractedMessage {
        ExtractedMessage {
            reasoning: self.reasoning,
            content: self.content,
            tool_calls: self.tool_calls.finish(),
        }
    }
}

const MESSAGE_REASONING_KEYS: &[&str] = &["thinking", "reasoning", "reasoning_content"];
const REASONING_KEYS: &[&str] = &["reasoning", "reasoning_content"];

/// Run every probe, in fixed order, against one parsed segment.
fn probe_object(map: &Map<String, Value>, acc: &mut Accumulator) {
    // 1. Nested non-streaming message (Ollama chat and friends).
    if let Some(Value::Object(message)) = map.get("message") {
        probe_message(message, acc);
    }

    // 1b. Top-level delta variants stream the same fields without a choices
    // wrapper; treated as streamed fragments.
    if let Some(Value::Object(delta)) = map.get("delta") {
        probe_delta(delta, acc);
    }

    // 2. Top-level reasoning channels.
    push_text_fields(map, REASONING_KEYS, &mut acc.reasoning);

    // 3. Chat-completion choices, streaming or not.
    if let Some(Value::Array(choices)) = map.get("choices") {
        for choice in choices {
            let Some(choice) = choice.as_object() else {
                continue;
            };
            if let Some(Value::Object(delta)) = choice.get("delta") {
                probe_delta(delta, acc);
            }
            if let Some(Value::Object(message)) = choice.get("message") {
                probe_message(message, acc);
            }
            push_text_fields(choice, REASONING_KEYS, &mut acc.reasoning);
            push_text_fields(choice, &["text", "content"], &mut acc.content);
        }
    }

    // 4. Top-level complete tool-call records.
    if let Some(calls) = map.get("tool_calls") {
        acc.tool_calls.push_complete(calls);
    }
    if let Some(call) = map.get("function_call") {
        acc.tool_calls.push_complete(call);
    }
    if let Some(calls) = map.get("parallel_tool_calls").filter(|v| v.is_array()) {
        acc.tool_calls.push_complete(calls);
    }

    // 5. Top-level content channels.
    push_text_fields(map, &["content", "text"], &mut acc.content);
}

/// Probe a complete `message` mapping: reasoning, content, and whole tool-call
/// records.
fn probe_message(message: &Map<String, Value>, acc: &mut Accumulator) {
    push_text_fields(message, MESSAGE_REASONING_KEYS, &mut acc.reasoning);
    push_text_fields(message, &["content"], &mut acc.content);
    if let Some(calls) = message.get("tool_calls") {
        acc.tool_calls.push_complete(calls);
    }
    if let Some(call) = message.get("function_call") {
        acc.tool_calls.push_complete(call);
    }
}

/// Probe a streamed `delta` mapping: reasoning/content fragments plus
/// tool-call fragments for the aggregator.
fn probe_delta(delta: &Map<String, Value>, acc: &mut Accumulator) {
    push_text_fields(delta, REASONING_KEYS, &mut acc.reasoning);
    push_text_fields(delta, &["content", "text"], &mut acc.content);
    if let Some(Value::Array(fragments)) = delta.get("tool_calls") {
        for fragment in fragments {
            acc.tool_calls.push_fragment(fragment);
        }
    }
    if let Some(call) = delta.get("function_call") {
        acc.tool_calls.push_fragment(call);
    }
}

/// Append the first text recoverable from each named field. Shape-mismatched
/// fields are skipped without contributing.
fn push_text_fields(map: &Map<String, Value>, keys: &[&str], out: &mut String) {
    for key in keys {
        if let Some(text) = field_text(map.get(*key)) {
            out.push_str(&text);
        }
    }
}

/// Total text extraction from a field that may be a string, an array of
/// strings or text-bearing mappings, or a nested mapping whose own `content`
/// array elements are captured individually.
fn field_text(value: Option<&Value>) -> Option<String> {
    let mut out = String::new();
    match value? {
        Value::String(s) => out.push_str(s),
        Value::Array(items) => collect_entry_text(items, &mut out),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("content") {
                collect_entry_text(items, &mut out);
            }
        }
        _ => {}
    }
    (!out.is_empty()).then_some(out)
}

fn collect_entry_text(items: &[Value], out: &mut String) {
    for item in items {
        match item {
            Value::String(s) => out.push_str(s),
            Value::Object(entry) => {
                for key in ["text", "content", "value"] {
                    if let Some(Value::String(s)) = entry.get(key) {
                        out.push_str(s);
                        break;
                    }
                }
            }
            _ => {}
        }
    }
}
