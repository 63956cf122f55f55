//! Casting a vote through the messaging client.

use tracing::{info, warn};

use crate::voter::client::MessagingClient;
use crate::voter::message::{Message, PollOption};

/// Vote for `option` on the given poll message.
///
/// Delegates to the client with a single-element selection. Client errors
/// are logged and returned as values; they never tear down the caller.
/// Recording the vote in history is the caller's responsibility.
pub async fn cast_vote<C: MessagingClient>(
    client: &C,
    message: &Message,
    option: &PollOption,
) -> Result<(), String> {
    info!(
        "Found option \"{}\", voting on poll {}",
        option.name, message.id
    );

    match client.vote(message, &[option.name.clone()]).await {
        Ok(()) => {
            info!(
                "Successfully voted for \"{}\" on poll {}",
                option.name, message.id
            );
            Ok(())
        }
        Err(e) => {
            warn!("Vote failed for poll {}: {e}", message.id);
            Err(e)
        }
    }
}
