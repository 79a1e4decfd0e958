/// Body byte decoding for captured frames.
///
/// The capture collaborator ships body fragments as standard base64. Both
/// steps here are total: corrupt input degrades to "no data" instead of an
/// error, since frames originate from arbitrary upstream traffic. Nothing is
/// logged on these paths.
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;

/// Decode a base64-encoded body fragment into raw bytes.
///
/// Absent or corrupt input yields `None`.
#[must_use]
pub fn decode_body(body_base64: Option<&str>) -> Option<Bytes> {
    let encoded = body_base64?;
    BASE64.decode(encoded).ok().map(Bytes::from)
}

/// Interpret raw bytes as UTF-8 text.
///
/// Invalid byte sequences fall back to an empty string; callers that still
/// hold the raw bytes can fall through to a hex dump.
#[must_use]
pub fn text_from_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => String::new(),
    }
}
