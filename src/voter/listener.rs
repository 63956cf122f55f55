//! Live event stream consumer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::voter::client::{ClientEvent, MessagingClient};
use crate::voter::evaluator::PollEvaluator;
use crate::voter::message::Message;

/// Consume client events until the channel closes.
///
/// Lifecycle events are logged; poll creations in the target conversation
/// are fed to the evaluator. Handling one event can never break the loop.
pub async fn run_listener<C: MessagingClient>(
    mut events: mpsc::Receiver<ClientEvent>,
    evaluator: Arc<PollEvaluator<C>>,
) {
    while let Some(event) = events.recv().await {
        handle_event(&evaluator, event).await;
    }
    info!("Event stream closed, listener exiting");
}

/// Handle a single client event.
pub async fn handle_event<C: MessagingClient>(evaluator: &PollEvaluator<C>, event: ClientEvent) {
    match event {
        ClientEvent::Ready => info!("Client is ready and connected"),
        ClientEvent::Authenticated => info!("Authentication successful"),
        ClientEvent::StateChange(state) => info!("State changed to: {state}"),
        ClientEvent::Disconnected(reason) => warn!("Client disconnected: {reason}"),
        ClientEvent::Inbound(msg) => handle_message(evaluator, &msg, "message").await,
        ClientEvent::Outbound(msg) => handle_message(evaluator, &msg, "message_create").await,
    }
}

async fn handle_message<C: MessagingClient>(
    evaluator: &PollEvaluator<C>,
    msg: &Message,
    source: &str,
) {
    if msg.chat_id != evaluator.policy().chat_id || !msg.is_poll() {
        return;
    }

    info!("Poll received via {source}: \"{}\"", msg.body);
    let outcome = evaluator.evaluate(msg).await;
    debug!("Outcome for poll {} via {source}: {:?}", msg.id, outcome);
}
