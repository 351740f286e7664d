use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// OneBot v11 event report, dispatched on `post_type`
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(tag = "post_type", rename_all = "snake_case")]
pub enum Event {
    Message(MessageEvent),
    Notice(NoticeEvent),
    // meta_event, request, ...
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MessageEvent {
    #[serde(default)]
    pub time: i64,
    pub self_id: i64,
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    // array format only; string (CQ code) reports are not supported
    #[serde(default)]
    pub message: Vec<Segment>,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
}

impl MessageEvent {
    pub fn chat(&self) -> Chat {
        Chat::new(self.group_id, self.user_id)
    }

    // Text segments joined, trimmed
    pub fn plain_text(&self) -> String {
        self.message
            .iter()
            .filter_map(Segment::text_content)
            .collect::<String>()
            .trim()
            .to_string()
    }

    pub fn mentions(&self) -> impl Iterator<Item = i64> + '_ {
        self.message.iter().filter_map(Segment::at_target)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Sender {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NoticeEvent {
    #[serde(default)]
    pub time: i64,
    pub self_id: i64,
    pub notice_type: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub target_id: Option<i64>,
    // NapCat sets this on private pokes, where user_id is the friend
    #[serde(default)]
    pub sender_id: Option<i64>,
}

impl NoticeEvent {
    pub fn is_poke(&self) -> bool {
        self.notice_type == "notify" && self.sub_type.as_deref() == Some("poke")
    }

    // Who did the poking
    pub fn poker(&self) -> i64 {
        self.sender_id.unwrap_or(self.user_id)
    }

    pub fn chat(&self) -> Chat {
        Chat::new(self.group_id, self.poker())
    }
}

/// Where a reply goes: a group, or a private chat with one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chat {
    Group(i64),
    Private(i64),
}

impl Chat {
    pub fn new(group_id: Option<i64>, user_id: i64) -> Self {
        match group_id {
            Some(group_id) if group_id != 0 => Chat::Group(group_id),
            _ => Chat::Private(user_id),
        }
    }

    pub fn group_id(&self) -> Option<i64> {
        match self {
            Chat::Group(id) => Some(*id),
            Chat::Private(_) => None,
        }
    }
}

/// One message segment, `{"type": ..., "data": {...}}`.
///
/// Kept loosely typed: implementations disagree on whether ids are numbers
/// or strings, and unknown segment types must survive a relay untouched.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Segment {
    fn with(kind: &str, key: &str, value: Value) -> Self {
        let mut data = Map::new();
        data.insert(key.to_string(), value);
        Self {
            kind: kind.to_string(),
            data,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::with("text", "text", Value::String(text.into()))
    }

    pub fn at(user_id: i64) -> Self {
        Self::with("at", "qq", Value::String(user_id.to_string()))
    }

    pub fn face(id: u32) -> Self {
        Self::with("face", "id", Value::String(id.to_string()))
    }

    pub fn image(file: impl Into<String>) -> Self {
        Self::with("image", "file", Value::String(file.into()))
    }

    pub fn text_content(&self) -> Option<&str> {
        if self.kind != "text" {
            return None;
        }
        self.data.get("text").and_then(Value::as_str)
    }

    // `@all` and malformed ids yield None
    pub fn at_target(&self) -> Option<i64> {
        if self.kind != "at" {
            return None;
        }
        match self.data.get("qq")? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

// Ollama API request format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system: String,
    #[serde(default)]
    pub stream: bool,
}

// Ollama API response format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GenerateResponse {
    pub model: String,
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_group_poke_notice() {
        let raw = r#"{
            "time": 1729000000, "self_id": 10001, "post_type": "notice",
            "notice_type": "notify", "sub_type": "poke",
            "group_id": 555, "user_id": 42, "target_id": 10001
        }"#;
        let Event::Notice(notice) = serde_json::from_str::<Event>(raw).unwrap() else {
            panic!("expected a notice");
        };
        assert!(notice.is_poke());
        assert_eq!(notice.poker(), 42);
        assert_eq!(notice.chat(), Chat::Group(555));
    }

    #[test]
    fn private_poke_uses_sender_id() {
        let raw = r#"{
            "self_id": 10001, "post_type": "notice", "notice_type": "notify",
            "sub_type": "poke", "user_id": 42, "sender_id": 42, "target_id": 10001
        }"#;
        let Event::Notice(notice) = serde_json::from_str::<Event>(raw).unwrap() else {
            panic!("expected a notice");
        };
        assert_eq!(notice.chat(), Chat::Private(42));
    }

    #[test]
    fn parses_message_segments() {
        let raw = r#"{
            "self_id": 10001, "post_type": "message", "message_type": "group",
            "user_id": 42, "group_id": 555, "raw_message": "",
            "message": [
                {"type": "text", "data": {"text": "戳 "}},
                {"type": "at", "data": {"qq": "777"}},
                {"type": "at", "data": {"qq": 888}},
                {"type": "at", "data": {"qq": "all"}},
                {"type": "text", "data": {"text": " 3"}},
                {"type": "mface", "data": {"emoji_id": "x"}}
            ],
            "sender": {"user_id": 42, "nickname": "alice"}
        }"#;
        let Event::Message(msg) = serde_json::from_str::<Event>(raw).unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(msg.plain_text(), "戳  3");
        assert_eq!(msg.mentions().collect::<Vec<_>>(), vec![777, 888]);
        assert_eq!(msg.message.len(), 6);
    }

    #[test]
    fn unknown_post_type_is_other() {
        let raw = r#"{"post_type": "meta_event", "meta_event_type": "heartbeat", "self_id": 1}"#;
        assert!(matches!(serde_json::from_str::<Event>(raw).unwrap(), Event::Other));
    }

    #[test]
    fn segment_builders_use_onebot_shape() {
        let json = serde_json::to_value(Segment::face(287)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "face", "data": {"id": "287"}}));
    }
}
