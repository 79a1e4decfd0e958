/// Content classification and render-strategy selection.
///
/// Given the declared content type and the reconstructed body text, pick how
/// the body should be presented. This is display-strategy selection only — no
/// extraction happens here, and it runs independently of the extractor on the
/// same text.
///
/// Precedence: event-stream → JSON types → NDJSON sibling-header hint on
/// generic types → script/code → form-encoded → HTML/XML → other `text/*` →
/// NDJSON types → JSON-looking guess → raw text fallback → hex dump when no
/// text is derivable at all.
use std::fmt::Write as _;

use serde::Serialize;

use crate::frame;

/// Block-level language tag handed to the render collaborator's highlighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderLanguage {
    Json,
    Plain,
    Html,
    Xml,
    Javascript,
}

/// The fully prepared render decision for one exchange body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RenderDirective {
    /// One pretty-printed JSON document.
    StructuredJson { pretty: String },
    /// One prepared block per SSE event / NDJSON line.
    EventList {
        events: Vec<String>,
        language: RenderLanguage,
    },
    /// Decoded `k=v` pairs from a form-encoded body.
    FormTable { fields: Vec<(String, String)> },
    Markup {
        text: String,
        language: RenderLanguage,
    },
    PlainText {
        text: String,
        language: RenderLanguage,
    },
    /// Offset / hex columns / printable-ASCII gutter, 16 bytes per row.
    HexDump { dump: String },
    /// Size-capped single-block fallback that bounds rendering cost.
    HeavyViewer {
        text: String,
        language: RenderLanguage,
    },
}

/// Degradation thresholds for the heavier render paths.
#[derive(Debug, Clone)]
pub struct RenderLimits {
    /// Character count past which JSON-capable branches fall back to the
    /// heavy viewer.
    pub heavy_viewer_chars: usize,
    /// SSE event count past which the per-event list degrades to one block.
    pub max_sse_events: usize,
    /// NDJSON line count past which the per-line list degrades to one block.
    pub max_ndjson_lines: usize,
    /// How many leading segments vote on the merged block's language.
    pub language_vote_prefix: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            heavy_viewer_chars: 50_000,
            max_sse_events: 80,
            max_ndjson_lines: 200,
            language_vote_prefix: 200,
        }
    }
}

/// Choose a render directive for one exchange body.
///
/// `text` is the reconstructed body text (empty when the bytes were not valid
/// UTF-8), `raw` the accumulated raw bytes, `ndjson_hint` a sibling-header
/// signal that a generically-typed body is newline-delimited JSON.
#[must_use]
pub fn select_render(
    content_type: Option<&str>,
    text: &str,
    raw: &[u8],
    ndjson_hint: bool,
    limits: &RenderLimits,
) -> RenderDirective {
    if text.is_empty() {
        if !raw.is_empty() {
            return RenderDirective::HexDump {
                dump: hex_dump(raw),
            };
        }
        return RenderDirective::PlainText {
            text: String::new(),
            language: RenderLanguage::Plain,
        };
    }

    let normalized = normalize_content_type(content_type);
    let ct = normalized.as_deref().unwrap_or("");

    if ct.contains("event-stream") {
        return render_segmented(text, limits.max_sse_events, limits);
    }
    if is_json_type(ct) {
        return render_json(text, limits);
    }
    if ndjson_hint && is_generic_type(ct) {
        return render_segmented(text, limits.max_ndjson_lines, limits);
    }
    if is_script_type(ct) {
        return RenderDirective::PlainText {
            text: text.to_string(),
            language: RenderLanguage::Javascript,
        };
    }
    if ct == "application/x-www-form-urlencoded" {
        return RenderDirective::FormTable {
            fields: decode_form(text),
        };
    }
    if let Some(language) = markup_language(ct) {
        return RenderDirective::Markup {
            text: text.to_string(),
            language,
        };
    }
    if ct.starts_with("text/") {
        return RenderDirective::PlainText {
            text: text.to_string(),
            language: RenderLanguage::Plain,
        };
    }
    if is_ndjson_type(ct) {
        return render_segmented(text, limits.max_ndjson_lines, limits);
    }

    // No usable declared type: guess from the shape of the text.
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return render_json(text, limits);
    }

    RenderDirective::PlainText {
        text: text.to_string(),
        language: RenderLanguage::Plain,
    }
}

fn normalize_content_type(content_type: Option<&str>) -> Option<String> {
    let ct = content_type?;
    let base = ct.split(';').next().unwrap_or(ct).trim();
    if base.is_empty() {
        return None;
    }
    Some(base.to_ascii_lowercase())
}

fn is_json_type(ct: &str) -> bool {
    ct == "application/json" || ct.ends_with("+json")
}

fn is_ndjson_type(ct: &str) -> bool {
    matches!(
        ct,
        "application/x-ndjson" | "application/ndjson" | "application/jsonl" | "application/jsonlines"
    )
}

fn is_script_type(ct: &str) -> bool {
    matches!(
        ct,
        "application/javascript"
            | "application/x-javascript"
            | "text/javascript"
            | "application/ecmascript"
            | "text/ecmascript"
    )
}

/// Types vague enough that a sibling-header NDJSON hint overrides them.
fn is_generic_type(ct: &str) -> bool {
    ct.is_empty() || ct == "application/octet-stream" || ct == "text/plain"
}

fn markup_language(ct: &str) -> Option<RenderLanguage> {
    if ct == "text/html" || ct == "application/xhtml+xml" {
        return Some(RenderLanguage::Html);
    }
    if ct == "application/xml" || ct == "text/xml" || ct.ends_with("+xml") {
        return Some(RenderLanguage::Xml);
    }
    None
}

/// JSON-capable single-document path, degrading by size.
fn render_json(text: &str, limits: &RenderLimits) -> RenderDirective {
    if text.len() > limits.heavy_viewer_chars {
        return RenderDirective::HeavyViewer {
            text: text.to_string(),
            language: RenderLanguage::Json,
        };
    }
    if let Some(value) = frame::parse_segment_json(text) {
        if let Ok(pretty) = serde_json::to_string_pretty(&value) {
            return RenderDirective::StructuredJson { pretty };
        }
    }
    // Declared JSON that is really a stream of documents.
    let reconstruction = frame::reconstruct(text);
    if reconstruction.segments.len() > 1 {
        return segmented_directive(&reconstruction.segments, limits.max_ndjson_lines, limits);
    }
    RenderDirective::PlainText {
        text: text.to_string(),
        language: RenderLanguage::Json,
    }
}

/// SSE / NDJSON path: per-event list, degrading by count or size.
fn render_segmented(text: &str, max_events: usize, limits: &RenderLimits) -> RenderDirective {
    let reconstruction = frame::reconstruct(text);
    segmented_directive(&reconstruction.segments, max_events, limits)
}

fn segmented_directive(
    segments: &[frame::Segment],
    max_events: usize,
    limits: &RenderLimits,
) -> RenderDirective {
    let payload: Vec<&frame::Segment> = segments.iter().filter(|s| !s.terminal).collect();
    let language = vote_language(&payload, limits.language_vote_prefix);

    let total_len: usize = payload.iter().map(|s| s.text.len()).sum();
    if payload.len() > max_events || total_len > limits.heavy_viewer_chars {
        let mut merged = String::with_capacity(total_len + payload.len());
        for (i, segment) in payload.iter().enumerate() {
            if i > 0 {
                merged.push('\n');
            }
            merged.push_str(&segment.text);
        }
        return RenderDirective::HeavyViewer {
            text: merged,
            language,
        };
    }

    let events = payload
        .iter()
        .map(|segment| match &segment.value {
            Some(value) => serde_json::to_string_pretty(value)
                .unwrap_or_else(|_| segment.text.clone()),
            None => segment.text.clone(),
        })
        .collect();
    RenderDirective::EventList { events, language }
}

/// Majority vote over a bounded prefix of segments: JSON-shaped segments
/// (starting with `{`/`[`) versus the rest.
fn vote_language(segments: &[&frame::Segment], prefix: usize) -> RenderLanguage {
    let sample = &segments[..segments.len().min(prefix)];
    if sample.is_empty() {
        return RenderLanguage::Plain;
    }
    let json_shaped = sample
        .iter()
        .filter(|s| {
            let t = s.text.trim_start();
            t.starts_with('{') || t.starts_with('[')
        })
        .count();
    if json_shaped * 2 >= sample.len() {
        RenderLanguage::Json
    } else {
        RenderLanguage::Plain
    }
}

/// Decode `k=v&k2=v2` pairs: percent-decoding, `+` as space, per-field decode
/// failures tolerated (lossy).
fn decode_form(text: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(text.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

const BYTES_PER_ROW: usize = 16;

/// Classic hex dump: offset, hex columns split at 8, printable-ASCII gutter.
#[must_use]
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4 + 16);
    for (row, chunk) in bytes.chunks(BYTES_PER_ROW).enumerate() {
        let _ = write!(out, "{:08x}  ", row * BYTES_PER_ROW);
        for i in 0..BYTES_PER_ROW {
            if i == BYTES_PER_ROW / 2 {
                out.push(' ');
            }
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{b:02x} ");
                }
                None => out.push_str("   "),
            }
        }
        out.push_str(" |");
        for b in chunk {
            out.push(if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '.'
            });
        }
        out.push_str("|\n");
    }
    out
}
