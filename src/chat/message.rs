// Chat message records and their text rendering

use chrono::{Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Marker shown on private messages
pub const WHISPER_MARKER: &str = "[私聊]";

/// Whether a record was sent to the group or to one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Group,
    Whisper,
}

/// A chat message as stored in messages.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Author
    pub username: String,
    pub message: String,
    /// Local wall-clock time shown to users
    pub timestamp: String,
    /// ISO-8601 UTC send time
    pub time: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    /// Recipient, for whispers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl MessageRecord {
    /// A group message sent now
    pub fn group(username: &str, message: &str) -> Self {
        Self {
            username: username.to_string(),
            message: message.to_string(),
            timestamp: display_time(),
            time: iso_time(),
            kind: MessageKind::Group,
            target: None,
        }
    }

    /// A whisper sent now
    pub fn whisper(username: &str, target: &str, message: &str) -> Self {
        Self {
            username: username.to_string(),
            message: message.to_string(),
            timestamp: display_time(),
            time: iso_time(),
            kind: MessageKind::Whisper,
            target: Some(target.to_string()),
        }
    }

    /// Whether the record has anything worth showing
    pub fn is_blank(&self) -> bool {
        self.message.trim().is_empty()
    }

    /// Line used when replaying history to a newly authenticated session
    pub fn render_history(&self) -> String {
        match (self.kind, &self.target) {
            (MessageKind::Whisper, Some(target)) => format!(
                "[{}] {} {} -> {}: {}\n",
                self.timestamp, WHISPER_MARKER, self.username, target, self.message
            ),
            _ => format!("[{}] {}: {}\n", self.timestamp, self.username, self.message),
        }
    }

    /// Live group line delivered to other members
    pub fn render_group(&self) -> String {
        format!("[{}] {}: {}\n", self.timestamp, self.username, self.message)
    }

    /// Live whisper line delivered to the recipient
    pub fn render_whisper_incoming(&self) -> String {
        format!(
            "[{}] {} {}: {}\n",
            self.timestamp, WHISPER_MARKER, self.username, self.message
        )
    }

    /// Confirmation echoed back to the whisper's sender
    pub fn render_whisper_echo(&self) -> String {
        format!(
            "[{}] [你 -> {}]: {}\n",
            self.timestamp,
            self.target.as_deref().unwrap_or_default(),
            self.message
        )
    }
}

fn display_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

fn iso_time() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(kind: MessageKind, target: Option<&str>) -> MessageRecord {
        MessageRecord {
            username: "bob".to_string(),
            message: "hello".to_string(),
            timestamp: "12:00:00".to_string(),
            time: "2024-01-01T04:00:00.000Z".to_string(),
            kind,
            target: target.map(str::to_string),
        }
    }

    #[test]
    fn test_rendering() {
        let group = fixed(MessageKind::Group, None);
        assert_eq!(group.render_group(), "[12:00:00] bob: hello\n");
        assert_eq!(group.render_history(), "[12:00:00] bob: hello\n");

        let whisper = fixed(MessageKind::Whisper, Some("alice"));
        assert_eq!(whisper.render_whisper_incoming(), "[12:00:00] [私聊] bob: hello\n");
        assert_eq!(whisper.render_whisper_echo(), "[12:00:00] [你 -> alice]: hello\n");
        assert_eq!(
            whisper.render_history(),
            "[12:00:00] [私聊] bob -> alice: hello\n"
        );
    }

    #[test]
    fn test_original_file_layout() {
        // Group records were stored without a type field
        let json = r#"[
            {"username":"bob","message":"hi","timestamp":"1:02:03 PM","time":"2024-01-01T05:02:03.000Z"},
            {"username":"bob","message":"psst","target":"alice","type":"whisper","timestamp":"1:02:04 PM","time":"2024-01-01T05:02:04.000Z"}
        ]"#;
        let records: Vec<MessageRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].kind, MessageKind::Group);
        assert_eq!(records[0].target, None);
        assert_eq!(records[1].kind, MessageKind::Whisper);
        assert_eq!(records[1].target.as_deref(), Some("alice"));
    }

    #[test]
    fn test_constructors() {
        let record = MessageRecord::whisper("bob", "alice", "hello");
        assert_eq!(record.kind, MessageKind::Whisper);
        assert_eq!(record.target.as_deref(), Some("alice"));
        assert!(record.time.ends_with('Z'));
        assert_eq!(record.timestamp.len(), 8);

        assert!(MessageRecord::group("bob", "   ").is_blank());
        assert!(!MessageRecord::group("bob", "x").is_blank());
    }
}
