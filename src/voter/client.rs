//! Collaborator contract for the external messaging client.

use async_trait::async_trait;

use crate::voter::message::Message;

/// Connection lifecycle and message events delivered by the client.
///
/// Delivery is unreliable by contract: events may be dropped, duplicated, or
/// delayed, which is why the recovery scanner exists alongside the listener.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Client is connected and operational.
    Ready,
    /// Session authenticated.
    Authenticated,
    /// Any other connection state transition, with the raw state name.
    StateChange(String),
    /// Connection lost, with the reason.
    Disconnected(String),
    /// Message received from another participant.
    Inbound(Message),
    /// Message sent from our own account (self-created polls still count).
    Outbound(Message),
}

/// Operations the voter needs from the messaging client.
///
/// Implementations must bound every call with a timeout so nothing blocks
/// indefinitely; errors come back as strings suitable for logging.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Fetch the most recent `limit` messages of a conversation, in the
    /// order the client returns them.
    async fn fetch_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, String>;

    /// Cast a vote on a poll message for the named options.
    async fn vote(&self, message: &Message, selected_options: &[String]) -> Result<(), String>;
}
