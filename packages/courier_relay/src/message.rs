//! Canonical message records and the factory that stamps them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

/// Fields of a text message as supplied by the sending client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInput {
    pub content: String,
    pub sender: String,
    pub receiver: String,
}

/// Fields of an image or video message. `media_id` is whatever name the
/// storage service handed back on upload; it is never dereferenced here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInput {
    pub media_id: String,
    pub description: String,
    pub sender: String,
    pub receiver: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// Type-specific part of a [`Message`], tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageBody {
    Text(TextInput),
    Image(MediaInput),
    Video(MediaInput),
}

impl MessageBody {
    pub fn media(kind: MediaKind, input: MediaInput) -> Self {
        match kind {
            MediaKind::Image => Self::Image(input),
            MediaKind::Video => Self::Video(input),
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            Self::Text(t) => &t.sender,
            Self::Image(m) | Self::Video(m) => &m.sender,
        }
    }

    pub fn receiver(&self) -> &str {
        match self {
            Self::Text(t) => &t.receiver,
            Self::Image(m) | Self::Video(m) => &m.receiver,
        }
    }
}

/// An immutable, relay-ready message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    #[serde(serialize_with = "serialize_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: MessageBody,
}

/// RFC 3339 with exactly three fractional digits and a `Z` suffix.
fn serialize_millis<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl Message {
    pub fn sender(&self) -> &str {
        self.body.sender()
    }

    pub fn receiver(&self) -> &str {
        self.body.receiver()
    }
}

/// Stamps payloads with a fresh id and creation time.
///
/// Timestamps handed out by one factory never go backwards, even if the
/// wall clock is stepped back between calls.
#[derive(Debug)]
pub struct MessageFactory {
    /// Last issued stamp, milliseconds since the epoch.
    last_stamp: AtomicI64,
}

impl Default for MessageFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageFactory {
    pub fn new() -> Self {
        Self {
            last_stamp: AtomicI64::new(i64::MIN),
        }
    }

    pub fn new_text_message(&self, input: TextInput) -> Message {
        self.stamp(MessageBody::Text(input))
    }

    pub fn new_media_message(&self, kind: MediaKind, input: MediaInput) -> Message {
        self.stamp(MessageBody::media(kind, input))
    }

    fn stamp(&self, body: MessageBody) -> Message {
        Message {
            id: Uuid::new_v4(),
            created_at: self.next_timestamp(),
            body,
        }
    }

    /// Stamps carry millisecond precision, the same as they have on the wire.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now().timestamp_millis();
        let previous = self.last_stamp.fetch_max(now, Ordering::AcqRel);
        DateTime::from_timestamp_millis(previous.max(now)).unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(content: &str) -> TextInput {
        TextInput {
            content: content.to_string(),
            sender: "alice".to_string(),
            receiver: "bob".to_string(),
        }
    }

    #[test]
    fn text_message_keeps_input_fields() {
        let factory = MessageFactory::new();
        let msg = factory.new_text_message(text("hi"));

        assert_eq!(msg.body, MessageBody::Text(text("hi")));
        assert_eq!(msg.sender(), "alice");
        assert_eq!(msg.receiver(), "bob");
        assert!(!msg.id.is_nil());
    }

    #[test]
    fn media_kind_selects_variant() {
        let factory = MessageFactory::new();
        let input = MediaInput {
            media_id: "abc.mp4".to_string(),
            description: "clip".to_string(),
            sender: "alice".to_string(),
            receiver: "bob".to_string(),
        };

        let video = factory.new_media_message(MediaKind::Video, input.clone());
        assert!(matches!(video.body, MessageBody::Video(ref m) if m.media_id == "abc.mp4"));

        let image = factory.new_media_message(MediaKind::Image, input);
        assert!(matches!(image.body, MessageBody::Image(_)));
    }

    #[test]
    fn text_message_wire_shape() {
        let factory = MessageFactory::new();
        let msg = factory.new_text_message(text("hi"));
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "text");
        assert_eq!(json["content"], "hi");
        assert_eq!(json["sender"], "alice");
        assert_eq!(json["receiver"], "bob");
        assert_eq!(json["id"], msg.id.to_string());
        assert!(json["createdAt"].is_string());
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn media_message_wire_shape() {
        let factory = MessageFactory::new();
        let msg = factory.new_media_message(
            MediaKind::Image,
            MediaInput {
                media_id: "f00d.png".to_string(),
                description: "cat".to_string(),
                sender: "alice".to_string(),
                receiver: "bob".to_string(),
            },
        );
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "image");
        assert_eq!(json["mediaId"], "f00d.png");
        assert_eq!(json["description"], "cat");
        assert!(json.get("media_id").is_none());
    }

    #[test]
    fn timestamp_clamps_to_last_issued() {
        let factory = MessageFactory::new();
        let future = Utc::now() + chrono::Duration::seconds(60);
        factory
            .last_stamp
            .store(future.timestamp_millis(), Ordering::Release);

        let msg = factory.new_text_message(text("late"));
        assert_eq!(msg.created_at.timestamp_millis(), future.timestamp_millis());
        assert_eq!(msg.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn clamped_stamp_never_precedes_earlier_stamp() {
        let factory = MessageFactory::new();
        let first = factory.new_text_message(text("one")).created_at;

        // Pretend the clock stepped back after `first` was issued.
        factory
            .last_stamp
            .store(first.timestamp_millis() + 5, Ordering::Release);
        let second = factory.new_text_message(text("two")).created_at;
        let third = factory.new_text_message(text("three")).created_at;

        assert!(second >= first);
        assert!(third >= second);
        assert_eq!(first.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn created_at_has_millisecond_precision_on_the_wire() {
        let factory = MessageFactory::new();
        let msg = factory.new_text_message(text("hi"));
        let json = serde_json::to_value(&msg).unwrap();

        let created_at = json["createdAt"].as_str().unwrap();
        let (_, fraction) = created_at.rsplit_once('.').unwrap();
        assert_eq!(fraction.len(), 4, "{created_at}");
        assert!(fraction.ends_with('Z'));
        assert!(fraction[..3].chars().all(|c| c.is_ascii_digit()));

        let parsed = DateTime::parse_from_rfc3339(created_at).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), msg.created_at);
    }
}
