//! Outbound broker messages built from events

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Event;

/// Transport header names carrying the event envelope.
pub mod header {
    pub const EVENT_ID: &str = "eventId";
    pub const EVENT_TYPE: &str = "eventType";
    pub const STREAM_TYPE: &str = "streamType";
    pub const STREAM_ID: &str = "streamId";
    pub const VERSION: &str = "version";
    pub const TIMESTAMP: &str = "timestamp";
}

/// One message handed to the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Partitioning key (the event's `streamId`)
    pub key: String,
    /// Event payload
    pub value: Bytes,
    pub headers: BTreeMap<String, String>,
}

impl OutboundMessage {
    /// Build the message for an event.
    ///
    /// Writer headers come first; the envelope fields are written over them,
    /// so a writer header named e.g. `version` never shadows the real one.
    pub fn from_event(event: &Event) -> Self {
        let mut headers = event.headers.clone();
        headers.insert(header::EVENT_ID.into(), event.event_id.clone());
        headers.insert(header::EVENT_TYPE.into(), event.event_type.clone());
        headers.insert(header::STREAM_TYPE.into(), event.stream_type.clone());
        headers.insert(header::STREAM_ID.into(), event.stream_id.clone());
        headers.insert(header::VERSION.into(), event.version.to_string());
        headers.insert(header::TIMESTAMP.into(), event.timestamp.to_string());

        Self {
            key: event.stream_id.clone(),
            value: event.data.clone(),
            headers,
        }
    }
}

/// Ordered batch addressed to one topic; forwarded entirely or not at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkBatch {
    pub topic: String,
    pub messages: Vec<OutboundMessage>,
}

impl SinkBatch {
    pub fn from_events(topic: impl Into<String>, events: &[Event]) -> Self {
        Self {
            topic: topic.into(),
            messages: events.iter().map(OutboundMessage::from_event).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamKey;

    fn event_with_headers(headers: &[(&str, &str)]) -> Event {
        Event {
            id: StreamKey::compose("order", "42"),
            version: 4,
            event_id: "e-4".into(),
            event_type: "Shipped".into(),
            stream_id: "42".into(),
            stream_type: "order".into(),
            timestamp: 123,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            data: Bytes::from_static(b"payload"),
        }
    }

    #[test]
    fn test_message_envelope() {
        let msg = OutboundMessage::from_event(&event_with_headers(&[("traceId", "t-1")]));
        assert_eq!(msg.key, "42");
        assert_eq!(msg.value, Bytes::from_static(b"payload"));
        assert_eq!(msg.headers["traceId"], "t-1");
        assert_eq!(msg.headers[header::EVENT_ID], "e-4");
        assert_eq!(msg.headers[header::EVENT_TYPE], "Shipped");
        assert_eq!(msg.headers[header::STREAM_TYPE], "order");
        assert_eq!(msg.headers[header::STREAM_ID], "42");
        assert_eq!(msg.headers[header::VERSION], "4");
        assert_eq!(msg.headers[header::TIMESTAMP], "123");
    }

    #[test]
    fn test_envelope_wins_header_collision() {
        let msg = OutboundMessage::from_event(&event_with_headers(&[
            ("version", "999"),
            ("eventType", "Forged"),
        ]));
        assert_eq!(msg.headers[header::VERSION], "4");
        assert_eq!(msg.headers[header::EVENT_TYPE], "Shipped");
        assert_eq!(msg.headers.len(), 6);
    }
}
