/// Input contract from the capture collaborator.
///
/// One [`FrameEvent`] per observed transport frame. Frames for the same
/// exchange id arrive multiple times while a response streams; each carries an
/// incremental body fragment. Everything beyond these fields (addresses,
/// timing, process attribution) stays with the capture layer.
use serde::{Deserialize, Serialize};

/// A single HTTP header as captured off the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// One captured transport frame belonging to an exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameEvent {
    pub exchange_id: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Body fragment, base64-encoded by the capture layer. Absent for frames
    /// that carried headers only.
    #[serde(default)]
    pub body_base64: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_event_minimal_json() {
        let frame: FrameEvent = serde_json::from_str(r#"{"exchange_id":"ex-1"}"#).unwrap();
        assert_eq!(frame.exchange_id, "ex-1");
        assert!(frame.content_type.is_none());
        assert!(frame.headers.is_empty());
        assert!(frame.body_base64.is_none());
    }

    #[test]
    fn test_frame_event_full_json() {
        let frame: FrameEvent = serde_json::from_str(
            r#"{"exchange_id":"ex-2","content_type":"application/json",
                "headers":[{"name":"content-type","value":"application/json"}],
                "body_base64":"e30="}"#,
        )
        .unwrap();
        assert_eq!(frame.content_type.as_deref(), Some("application/json"));
        assert_eq!(frame.headers.len(), 1);
    }
}
