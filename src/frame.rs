/// Transport-frame reconstruction for one exchange's accumulated body text.
///
/// Captured bodies arrive with transport noise still embedded: chunked
/// transfer sizes leaking into the stream, SSE `data:` prefixes, terminal
/// sentinels. Reconstruction strips the noise and yields the logical payload
/// segments that extraction and rendering both work from.
///
/// Framing is sniffed structurally, in priority order:
/// 1. SSE when the literal `data:` marker is present anywhere
/// 2. one monolithic JSON document (object or array) covering the whole body
/// 3. NDJSON when the body spans multiple lines
/// 4. a single raw segment otherwise
use memchr::memchr;
use serde_json::Value;

const DONE_SENTINEL: &str = "[DONE]";

/// How the accumulated text was framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    EventStream,
    Monolithic,
    NdJson,
    Raw,
}

/// One logical payload unit recovered from the buffer.
#[derive(Debug, Clone)]
pub struct Segment {
    pub text: String,
    /// Parsed JSON when the segment text (or its brace-truncated form) parses.
    /// `None` drops the segment from structured extraction only; the renderer
    /// may still show the verbatim text.
    pub value: Option<Value>,
    /// `[DONE]` terminal sentinel; carries no content.
    pub terminal: bool,
}

impl Segment {
    fn payload(text: String) -> Self {
        if text == DONE_SENTINEL {
            return Self {
                text,
                value: None,
                terminal: true,
            };
        }
        let value = parse_segment_json(&text);
        Self {
            text,
            value,
            terminal: false,
        }
    }
}

/// The result of one reconstruction pass over the buffer snapshot.
///
/// Ephemeral: recomputed from the buffer on every pass, never persisted, so a
/// partially arrived stream simply produces a shorter segment list this time
/// around.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub framing: Framing,
    pub segments: Vec<Segment>,
}

/// Reconstruct logical payload segments from accumulated body text.
#[must_use]
pub fn reconstruct(text: &str) -> Reconstruction {
    if text.contains("data:") {
        return Reconstruction {
            framing: Framing::EventStream,
            segments: sse_segments(text),
        };
    }

    let trimmed = text.trim();
    if let Some(value) = parse_whole_document(trimmed) {
        return Reconstruction {
            framing: Framing::Monolithic,
            segments: vec![Segment {
                text: trimmed.to_string(),
                value: Some(value),
                terminal: false,
            }],
        };
    }

    if text.contains('\n') {
        return Reconstruction {
            framing: Framing::NdJson,
            segments: ndjson_segments(text),
        };
    }

    Reconstruction {
        framing: Framing::Raw,
        segments: vec![Segment::payload(text.to_string())],
    }
}

/// Opportunistically parse segment text as JSON.
///
/// When the text fails to parse and carries extra trailing bytes after a
/// complete object, retry after truncating at the last `}`. Upstream chunked
/// transports occasionally append a secondary artifact after the payload; the
/// truncation tolerates that at the cost of silently dropping any meaningful
/// trailing text (a known trade-off, exercised in tests).
#[must_use]
pub fn parse_segment_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Some(value),
        Err(_) => {
            let cut = trimmed.rfind('}')?;
            serde_json::from_str(&trimmed[..=cut]).ok()
        }
    }
}

fn parse_whole_document(trimmed: &str) -> Option<Value> {
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
}

/// A line consisting purely of hex digits is a chunked-transfer size marker
/// that leaked into the body, not payload.
fn is_chunk_size_artifact(line: &str) -> bool {
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Extract the payload of an SSE `data:` line, tolerating a leaked chunk-size
/// prefix glued onto the front (`1a4data: {...}`). One leading space after the
/// colon is stripped per the SSE field rules.
fn sse_data_payload(line: &str) -> Option<&str> {
    let at = line.find("data:")?;
    if !line[..at].bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let payload = &line[at + 5..];
    Some(payload.strip_prefix(' ').unwrap_or(payload))
}

fn sse_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for line in lines_of(text) {
        if line.trim().is_empty() {
            if !pending.is_empty() {
                segments.push(Segment::payload(pending.join("\n")));
                pending.clear();
            }
            continue;
        }
        if is_chunk_size_artifact(line) {
            continue;
        }
        if let Some(payload) = sse_data_payload(line) {
            pending.push(payload);
        }
        // event:/id:/comment lines carry no payload for this core
    }

    if !pending.is_empty() {
        segments.push(Segment::payload(pending.join("\n")));
    }
    segments
}

fn ndjson_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for line in lines_of(text) {
        let line = line.trim();
        if line.is_empty() || is_chunk_size_artifact(line) {
            continue;
        }
        segments.push(Segment::payload(line.to_string()));
    }
    segments
}

/// Yield lines with `\r` and the trailing newline stripped. The final
/// unterminated line is included.
fn lines_of(text: &str) -> impl Iterator<Item = &str> {
    let mut start = 0usize;
    std::iter::from_fn(move || {
        if start >= text.len() {
            return None;
        }
        let line = match memchr(b'\n', &text.as_bytes()[start..]) {
            Some(rel) => {
                let line = &text[start..start + rel];
                start += rel + 1;
                line
            }
            None => {
                let line = &text[start..];
                start = text.len();
                line
            }
        };
        Some(line.strip_suffix('\r').unwrap_or(line))
    })
}
