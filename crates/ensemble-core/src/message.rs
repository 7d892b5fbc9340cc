use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reserved receiver name that delivers a message to every registered role
/// except the sender.
pub const BROADCAST: &str = "broadcast";

/// Closed set of inter-agent message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Work assignment for a role.
    Task,
    /// Progress or completion report.
    Status,
    /// Sign-off for a downstream stage.
    Approval,
    /// Peer-review verdict for an artifact.
    Review,
    /// Rework instruction driven by QA findings.
    Feedback,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Task => write!(f, "task"),
            MessageType::Status => write!(f, "status"),
            MessageType::Approval => write!(f, "approval"),
            MessageType::Review => write!(f, "review"),
            MessageType::Feedback => write!(f, "feedback"),
        }
    }
}

/// A single message exchanged between agents.
///
/// Messages are owned by the [`MessageLog`] once appended and are never
/// mutated or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Role that sent the message. May be left empty on a draft; the
    /// orchestrator fills in the acting role when the turn is applied.
    #[serde(default)]
    pub sender: String,
    /// Receiving role name, or [`BROADCAST`].
    pub receiver: String,
    /// Human-readable message body.
    pub content: String,
    /// Kind of message.
    pub msg_type: MessageType,
    /// Artifact references (`key:vN`) this message is about.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Arbitrary key-value metadata attached to the message.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// UTC timestamp of when the message was created.
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    /// Creates a new message with an explicit sender.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: impl Into<String>,
        msg_type: MessageType,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            content: content.into(),
            msg_type,
            artifacts: Vec::new(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a draft with no sender; the orchestrator fills in the acting
    /// role before routing.
    pub fn draft(
        receiver: impl Into<String>,
        content: impl Into<String>,
        msg_type: MessageType,
    ) -> Self {
        Self::new(String::new(), receiver, content, msg_type)
    }

    /// Attaches artifact references.
    pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Attaches a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// True if this message is addressed to every role.
    pub fn is_broadcast(&self) -> bool {
        self.receiver == BROADCAST
    }
}

/// Append-only ordered record of inter-agent messages.
///
/// Insertion order is semantic order. The filter methods are read-only
/// projections, not separate storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLog {
    messages: Vec<AgentMessage>,
}

impl MessageLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one message.
    pub fn append(&mut self, message: AgentMessage) {
        self.messages.push(message);
    }

    /// Appends a batch of messages in order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = AgentMessage>) {
        self.messages.extend(messages);
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    /// Number of messages in the log.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if no message has been logged yet.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages sent by `sender`, oldest first.
    pub fn by_sender(&self, sender: &str) -> Vec<&AgentMessage> {
        self.messages.iter().filter(|m| m.sender == sender).collect()
    }

    /// Messages addressed to `receiver`, oldest first.
    pub fn by_receiver(&self, receiver: &str) -> Vec<&AgentMessage> {
        self.messages
            .iter()
            .filter(|m| m.receiver == receiver)
            .collect()
    }

    /// The most recent `limit` messages, oldest first. `limit == 0` yields
    /// an empty slice.
    pub fn recent(&self, limit: usize) -> &[AgentMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn msg(sender: &str, receiver: &str, content: &str) -> AgentMessage {
        AgentMessage::new(sender, receiver, content, MessageType::Task)
    }

    #[test]
    fn test_append_preserves_order() {
        let mut log = MessageLog::new();
        log.append(msg("pm", "architect", "first"));
        log.extend(vec![msg("architect", "backend_dev", "second")]);
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[0].content, "first");
        assert_eq!(log.messages()[1].content, "second");
    }

    #[test]
    fn test_filters() {
        let mut log = MessageLog::new();
        log.append(msg("pm", "architect", "a"));
        log.append(msg("architect", "pm", "b"));
        log.append(msg("pm", "qa", "c"));
        assert_eq!(log.by_sender("pm").len(), 2);
        assert_eq!(log.by_receiver("pm").len(), 1);
        assert!(log.by_sender("devops").is_empty());
    }

    #[test]
    fn test_recent_window() {
        let mut log = MessageLog::new();
        for i in 0..5 {
            log.append(msg("pm", "qa", &format!("m{i}")));
        }
        assert!(log.recent(0).is_empty());
        assert_eq!(log.recent(2).len(), 2);
        assert_eq!(log.recent(2)[0].content, "m3");
        assert_eq!(log.recent(100).len(), 5);
    }

    #[test]
    fn test_broadcast_detection() {
        assert!(msg("pm", BROADCAST, "hello").is_broadcast());
        assert!(!msg("pm", "qa", "hello").is_broadcast());
    }

    #[test]
    fn test_serialization_round_trip() {
        let m = msg("qa", "devops", "QA passed")
            .with_artifacts(vec!["qa_report:v1".to_string()])
            .with_metadata("phase", serde_json::json!("complete"));
        let json = serde_json::to_string(&m).unwrap();
        let parsed: AgentMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.msg_type, MessageType::Task);
        assert_eq!(parsed.artifacts, vec!["qa_report:v1"]);
    }
}
