//! Eligibility gate and vote orchestration for candidate poll messages.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::voter::caster::cast_vote;
use crate::voter::client::MessagingClient;
use crate::voter::history::VoteHistory;
use crate::voter::matcher::find_matching_option;
use crate::voter::message::Message;

/// Immutable voting configuration.
#[derive(Debug, Clone)]
pub struct VotingPolicy {
    /// Conversation to watch.
    pub chat_id: String,
    /// Option text to vote for.
    pub target_option: String,
    /// Polls older than this many hours are ignored.
    pub eligibility_window_hours: i64,
    /// Recovery scan period.
    pub scan_interval: Duration,
    /// Messages fetched per recovery scan.
    pub scan_depth: usize,
    /// Delay before the first recovery scan, so the connection can settle.
    pub initial_scan_delay: Duration,
}

impl Default for VotingPolicy {
    fn default() -> Self {
        Self {
            chat_id: String::new(),
            target_option: "Yes".to_string(),
            eligibility_window_hours: 24,
            scan_interval: Duration::from_secs(60),
            scan_depth: 10,
            initial_scan_delay: Duration::from_secs(5),
        }
    }
}

/// Why a message was skipped without a vote attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a poll-creation message.
    NotAPoll,
    /// Already recorded in the history.
    AlreadyVoted,
    /// Older than the eligibility window.
    Stale,
}

/// Why an attempted vote did not happen or did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// Poll carried no options.
    NoOptions,
    /// No option matched the configured target.
    NoMatchingOption,
    /// The client vote call failed.
    VoteError(String),
}

/// Result of evaluating one candidate message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Voted,
    Skipped(SkipReason),
    Failed(FailReason),
}

/// The single funnel both ingestion paths flow through.
///
/// Owns the vote history behind a mutex held across the whole evaluation, so
/// concurrent listener and scanner deliveries of the same poll serialize on
/// the check-then-vote sequence and at most one vote is cast per poll id.
pub struct PollEvaluator<C> {
    client: Arc<C>,
    policy: VotingPolicy,
    history: Mutex<VoteHistory>,
}

impl<C: MessagingClient> PollEvaluator<C> {
    pub fn new(client: Arc<C>, policy: VotingPolicy, history: VoteHistory) -> Self {
        Self {
            client,
            policy,
            history: Mutex::new(history),
        }
    }

    pub fn policy(&self) -> &VotingPolicy {
        &self.policy
    }

    /// Whether a poll id is already recorded as voted.
    pub async fn has_voted(&self, poll_id: &str) -> bool {
        self.history.lock().await.contains(poll_id)
    }

    /// Evaluate one candidate message and vote if it qualifies.
    ///
    /// Safe to invoke concurrently for different poll ids and twice for the
    /// same id: the second invocation short-circuits at the history check.
    pub async fn evaluate(&self, message: &Message) -> Outcome {
        if !message.is_poll() {
            return Outcome::Skipped(SkipReason::NotAPoll);
        }

        let mut history = self.history.lock().await;

        if history.contains(&message.id) {
            debug!("Poll {} already voted, skipping", message.id);
            return Outcome::Skipped(SkipReason::AlreadyVoted);
        }

        // Lower bound only: future-dated timestamps (clock skew) still pass.
        let message_ms = message.timestamp * 1000;
        let window_start =
            Utc::now().timestamp_millis() - self.policy.eligibility_window_hours * 60 * 60 * 1000;
        if message_ms <= window_start {
            debug!(
                "Poll {} is older than {}h, skipping",
                message.id, self.policy.eligibility_window_hours
            );
            return Outcome::Skipped(SkipReason::Stale);
        }

        if message.options.is_empty() {
            warn!("No poll options found for message {}", message.id);
            return Outcome::Failed(FailReason::NoOptions);
        }

        info!("Evaluating poll {}: \"{}\"", message.id, message.body);

        let Some(option) = find_matching_option(&message.options, &self.policy.target_option)
        else {
            let available: Vec<&str> = message.options.iter().map(|o| o.name.as_str()).collect();
            warn!(
                "Could not find option matching \"{}\". Available options: {:?}",
                self.policy.target_option, available
            );
            return Outcome::Failed(FailReason::NoMatchingOption);
        };

        match cast_vote(self.client.as_ref(), message, option).await {
            Ok(()) => {
                history.mark_voted(&message.id);
                Outcome::Voted
            }
            Err(e) => Outcome::Failed(FailReason::VoteError(e)),
        }
    }
}
