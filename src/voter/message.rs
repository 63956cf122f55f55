//! Message and poll types observed from the messaging client.

/// What kind of message was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// A new poll carrying a question and selectable options.
    PollCreation,
    /// Anything else (text, media, reactions, ...), with the raw type name.
    Other(String),
}

/// A single selectable poll option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOption {
    pub name: String,
}

impl PollOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One message observed in a conversation. Immutable once observed.
#[derive(Debug, Clone)]
pub struct Message {
    /// Stable unique message id.
    pub id: String,
    /// Poll question text (empty for non-poll messages without text).
    pub body: String,
    /// Seconds since epoch, sender-assigned.
    pub timestamp: i64,
    /// Conversation the message belongs to.
    pub chat_id: String,
    /// Sender id within the conversation.
    pub sender: String,
    pub kind: MessageKind,
    /// Poll options in original order. Name uniqueness is not guaranteed.
    pub options: Vec<PollOption>,
}

impl Message {
    pub fn is_poll(&self) -> bool {
        self.kind == MessageKind::PollCreation
    }
}
