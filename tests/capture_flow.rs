//! Frame-by-frame flow through the exchange store, the way the capture layer
//! actually delivers streamed responses: many small base64 fragments per
//! exchange, split without regard for event boundaries.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use wirelens_rs::capture::{FrameEvent, Header};
use wirelens_rs::collector::ExchangeStore;
use wirelens_rs::render::{RenderDirective, RenderLimits};
use wirelens_rs::rules::ProviderRules;

fn frame(id: &str, content_type: Option<&str>, body: &[u8]) -> FrameEvent {
    FrameEvent {
        exchange_id: id.to_string(),
        content_type: content_type.map(str::to_string),
        headers: Vec::new(),
        body_base64: Some(BASE64.encode(body)),
    }
}

#[test]
fn streamed_sse_split_mid_event_across_frames() {
    let store = ExchangeStore::new(16);
    let full = "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n\ndata: [DONE]\n\n";

    // Split at an arbitrary byte boundary, mid-event.
    let (a, b) = full.split_at(37);
    store.push_frame(&frame("ex-1", Some("text/event-stream"), a.as_bytes()));
    store.push_frame(&frame("ex-1", None, b.as_bytes()));

    let inspection = store.inspect("ex-1", &RenderLimits::default()).unwrap();
    assert_eq!(inspection.message.content, "Hello world");
    assert!(matches!(
        inspection.render,
        RenderDirective::EventList { .. }
    ));
}

#[test]
fn every_new_frame_allows_reinspection() {
    let store = ExchangeStore::new(16);
    let limits = RenderLimits::default();

    store.push_frame(&frame(
        "ex-1",
        Some("text/event-stream"),
        b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
    ));
    let first = store.inspect("ex-1", &limits).unwrap();
    assert_eq!(first.message.content, "a");

    store.push_frame(&frame(
        "ex-1",
        None,
        b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
    ));
    let second = store.inspect("ex-1", &limits).unwrap();
    assert_eq!(second.message.content, "ab");

    // The earlier result is simply superseded; nothing mutated in place.
    assert_eq!(first.message.content, "a");
}

#[test]
fn provider_detection_over_accumulated_text() {
    let store = ExchangeStore::new(16);
    let rules = ProviderRules::load(None);

    store.push_frame(&frame(
        "openai-ish",
        Some("text/event-stream"),
        b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
    ));
    store.push_frame(&frame(
        "ollama-ish",
        Some("application/x-ndjson"),
        b"{\"message\":{\"role\":\"assistant\",\"content\":\"hi\"}}\n",
    ));

    let openai = store.snapshot("openai-ish").unwrap();
    assert_eq!(
        rules.match_exchange(&openai.headers, &openai.text).as_deref(),
        Some("openai_compatible")
    );

    let ollama = store.snapshot("ollama-ish").unwrap();
    assert_eq!(
        rules.match_exchange(&ollama.headers, &ollama.text).as_deref(),
        Some("ollama")
    );
}

#[test]
fn headers_accumulate_and_hint_ndjson() {
    let store = ExchangeStore::new(16);
    let mut event = frame("ex-1", None, b"{\"a\":1}\n{\"b\":2}\n");
    event.headers.push(Header {
        name: "content-type".to_string(),
        value: "application/x-ndjson; charset=utf-8".to_string(),
    });
    store.push_frame(&event);

    let snapshot = store.snapshot("ex-1").unwrap();
    assert!(snapshot.ndjson_hint);
    assert_eq!(snapshot.headers.len(), 1);

    let inspection = store.inspect("ex-1", &RenderLimits::default()).unwrap();
    assert!(matches!(
        inspection.render,
        RenderDirective::EventList { .. }
    ));
}

#[test]
fn retention_cap_bounds_store_growth() {
    let store = ExchangeStore::new(4);
    for i in 0..20 {
        store.push_frame(&frame(&format!("ex-{i}"), None, b"x"));
    }
    assert_eq!(store.len(), 4);
    assert_eq!(
        store.ids(),
        vec!["ex-16", "ex-17", "ex-18", "ex-19"]
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
    );
}

#[test]
fn frames_without_bodies_only_carry_metadata() {
    let store = ExchangeStore::new(16);
    store.push_frame(&FrameEvent {
        exchange_id: "ex-1".to_string(),
        content_type: Some("application/json".to_string()),
        headers: Vec::new(),
        body_base64: None,
    });
    let snapshot = store.snapshot("ex-1").unwrap();
    assert!(snapshot.text.is_empty());
    assert_eq!(snapshot.content_type.as_deref(), Some("application/json"));
}
