/// Exchange accumulation: the surrounding collector for the inspection core.
///
/// One [`Exchange`] per logical request/response pair, created on the first
/// observed frame for its id and appended to by every later frame. Buffers are
/// append-only and monotonic; inspection reads an owned snapshot and recomputes
/// everything from it, so interleaved frames can never corrupt a half-built
/// extraction. The store itself applies the retention cap — the core never
/// deletes an exchange.
use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::capture::{FrameEvent, Header};
use crate::decode;
use crate::extract::{self, ExtractedMessage};
use crate::render::{self, RenderDirective, RenderLimits};

#[derive(Debug, Default)]
struct Exchange {
    content_type: Option<String>,
    headers: Vec<Header>,
    ndjson_hint: bool,
    body: Vec<u8>,
    text: String,
}

/// Owned copy of one exchange's accumulated state, safe to inspect while new
/// frames keep arriving.
#[derive(Debug, Clone)]
pub struct ExchangeSnapshot {
    pub id: String,
    pub content_type: Option<String>,
    pub headers: Vec<Header>,
    pub ndjson_hint: bool,
    pub body: Bytes,
    pub text: String,
}

/// The lazily recomputed inspection result for one exchange.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub message: ExtractedMessage,
    pub render: RenderDirective,
}

struct StoreInner {
    exchanges: FxHashMap<String, Exchange>,
    order: VecDeque<String>,
}

/// Mutex-guarded exchange map with insertion-ordered retention.
///
/// The single guard around append/snapshot is all the synchronization this
/// model needs: one producer appends, readers take owned snapshots.
pub struct ExchangeStore {
    inner: Mutex<StoreInner>,
    retention: usize,
}

impl ExchangeStore {
    #[must_use]
    pub fn new(retention: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                exchanges: FxHashMap::default(),
                order: VecDeque::new(),
            }),
            retention: retention.max(1),
        }
    }

    /// Append one captured frame to its exchange, creating the exchange on
    /// first sight and evicting the oldest exchanges past the retention cap.
    pub fn push_frame(&self, frame: &FrameEvent) {
        let mut inner = self.inner.lock();

        if !inner.exchanges.contains_key(&frame.exchange_id) {
            inner
                .exchanges
                .insert(frame.exchange_id.clone(), Exchange::default());
            inner.order.push_back(frame.exchange_id.clone());
            while inner.order.len() > self.retention {
                if let Some(evicted) = inner.order.pop_front() {
                    inner.exchanges.remove(&evicted);
                    tracing::debug!(exchange_id = %evicted, "evicted exchange past retention cap");
                }
            }
        }

        let Some(exchange) = inner.exchanges.get_mut(&frame.exchange_id) else {
            return;
        };

        if exchange.content_type.is_none() {
            exchange.content_type = frame.content_type.clone();
        }
        for header in &frame.headers {
            if header.value.to_ascii_lowercase().contains("ndjson") {
                exchange.ndjson_hint = true;
            }
        }
        exchange.headers.extend(frame.headers.iter().cloned());

        if let Some(bytes) = decode::decode_body(frame.body_base64.as_deref()) {
            exchange.text.push_str(&decode::text_from_bytes(&bytes));
            exchange.body.extend_from_slice(&bytes);
        }
    }

    /// Owned snapshot of one exchange, or `None` for an unknown id.
    #[must_use]
    pub fn snapshot(&self, id: &str) -> Option<ExchangeSnapshot> {
        let inner = self.inner.lock();
        let exchange = inner.exchanges.get(id)?;
        Some(ExchangeSnapshot {
            id: id.to_string(),
            content_type: exchange.content_type.clone(),
            headers: exchange.headers.clone(),
            ndjson_hint: exchange.ndjson_hint,
            body: Bytes::copy_from_slice(&exchange.body),
            text: exchange.text.clone(),
        })
    }

    /// Recompute extraction and render selection for one exchange from a
    /// fresh snapshot. Deferred work: call this only for the exchange being
    /// inspected, not on every arriving frame.
    #[must_use]
    pub fn inspect(&self, id: &str, limits: &RenderLimits) -> Option<Inspection> {
        let snapshot = self.snapshot(id)?;
        Some(Inspection {
            message: extract::extract_message(&snapshot.text),
            render: render::select_render(
                snapshot.content_type.as_deref(),
                &snapshot.text,
                &snapshot.body,
                snapshot.ndjson_hint,
                limits,
            ),
        })
    }

    /// Exchange ids in arrival order (oldest first).
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner.order.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().exchanges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    fn frame(id: &str, body: &[u8]) -> FrameEvent {
        FrameEvent {
            exchange_id: id.to_string(),
            content_type: None,
            headers: Vec::new(),
            body_base64: Some(BASE64.encode(body)),
        }
    }

    #[test]
    fn test_first_frame_creates_exchange() {
        let store = ExchangeStore::new(8);
        store.push_frame(&frame("ex-1", b"hello"));
        let snapshot = store.snapshot("ex-1").unwrap();
        assert_eq!(snapshot.text, "hello");
        assert_eq!(&snapshot.body[..], b"hello");
    }

    #[test]
    fn test_frames_append_in_order() {
        let store = ExchangeStore::new(8);
        store.push_frame(&frame("ex-1", b"data: {\"content\":\"a\"}\n\n"));
        store.push_frame(&frame("ex-1", b"data: {\"content\":\"b\"}\n\n"));
        let snapshot = store.snapshot("ex-1").unwrap();
        assert!(snapshot.text.contains("\"a\""));
        assert!(snapshot.text.contains("\"b\""));

        let inspection = store.inspect("ex-1", &RenderLimits::default()).unwrap();
        assert_eq!(inspection.message.content, "ab");
    }

    #[test]
    fn test_content_type_first_seen_wins() {
        let store = ExchangeStore::new(8);
        let mut first = frame("ex-1", b"{}");
        first.content_type = Some("application/json".to_string());
        store.push_frame(&first);
        let mut second = frame("ex-1", b"{}");
        second.content_type = Some("text/plain".to_string());
        store.push_frame(&second);
        assert_eq!(
            store.snapshot("ex-1").unwrap().content_type.as_deref(),
            Some("application/json")
        );
    }

    #[test]
    fn test_retention_evicts_oldest() {
        let store = ExchangeStore::new(2);
        store.push_frame(&frame("ex-1", b"a"));
        store.push_frame(&frame("ex-2", b"b"));
        store.push_frame(&frame("ex-3", b"c"));
        assert_eq!(store.len(), 2);
        assert!(store.snapshot("ex-1").is_none());
        assert!(store.snapshot("ex-3").is_some());
        assert_eq!(store.ids(), vec!["ex-2".to_string(), "ex-3".to_string()]);
    }

    #[test]
    fn test_corrupt_body_fragment_ignored() {
        let store = ExchangeStore::new(8);
        let mut bad = frame("ex-1", b"");
        bad.body_base64 = Some("%%%not base64%%%".to_string());
        store.push_frame(&bad);
        store.push_frame(&frame("ex-1", b"ok"));
        assert_eq!(store.snapshot("ex-1").unwrap().text, "ok");
    }

    #[test]
    fn test_ndjson_hint_from_headers() {
        let store = ExchangeStore::new(8);
        let mut event = frame("ex-1", b"{}");
        event.headers.push(Header {
            name: "accept".to_string(),
            value: "application/x-ndjson".to_string(),
        });
        store.push_frame(&event);
        assert!(store.snapshot("ex-1").unwrap().ndjson_hint);
    }

    #[test]
    fn test_inspect_unknown_exchange() {
        let store = ExchangeStore::new(8);
        assert!(store.inspect("nope", &RenderLimits::default()).is_none());
    }

    #[test]
    fn test_inspect_is_idempotent() {
        let store = ExchangeStore::new(8);
        store.push_frame(&frame(
            "ex-1",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
        ));
        let first = store.inspect("ex-1", &RenderLimits::default()).unwrap();
        let second = store.inspect("ex-1", &RenderLimits::default()).unwrap();
        assert_eq!(first.message, second.message);
        assert_eq!(first.render, second.render);
    }

    #[test]
    fn test_invalid_utf8_body_yields_hex_dump() {
        let store = ExchangeStore::new(8);
        store.push_frame(&frame("ex-1", &[0xff, 0xfe, 0x00]));
        let inspection = store.inspect("ex-1", &RenderLimits::default()).unwrap();
        assert!(matches!(inspection.render, RenderDirective::HexDump { .. }));
        assert!(inspection.message.is_empty());
    }
}
