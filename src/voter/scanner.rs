//! Periodic recovery scan over recent conversation history.
//!
//! The live event stream may drop, duplicate, or delay events; re-fetching
//! the last few messages on a timer catches anything the listener missed.

use std::sync::Arc;

use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::voter::client::MessagingClient;
use crate::voter::evaluator::PollEvaluator;

/// Re-fetch recent messages on a fixed period, forever.
///
/// The first pass runs after a short delay so the connection can settle.
/// Fetch failures are logged; the next tick retries independently.
pub async fn run_scanner<C: MessagingClient>(evaluator: Arc<PollEvaluator<C>>, client: Arc<C>) {
    let policy = evaluator.policy().clone();
    let start = Instant::now() + policy.initial_scan_delay;
    let mut interval = time::interval_at(start, policy.scan_interval);

    loop {
        interval.tick().await;
        scan_once(evaluator.as_ref(), client.as_ref()).await;
    }
}

/// One recovery pass: fetch, filter to polls, evaluate each in fetch order.
pub async fn scan_once<C: MessagingClient>(evaluator: &PollEvaluator<C>, client: &C) {
    let policy = evaluator.policy();
    let messages = match client
        .fetch_recent_messages(&policy.chat_id, policy.scan_depth)
        .await
    {
        Ok(messages) => messages,
        Err(e) => {
            warn!("Recovery scan failed: {e}");
            return;
        }
    };

    debug!("Recovery scan fetched {} message(s)", messages.len());
    for message in messages.iter().filter(|m| m.is_poll()) {
        let outcome = evaluator.evaluate(message).await;
        debug!("Scan outcome for poll {}: {:?}", message.id, outcome);
    }
}
