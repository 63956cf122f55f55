//! Behavior tests for the evaluator, listener, and scanner, driven through a
//! mock messaging client that records every vote call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use crate::voter::client::{ClientEvent, MessagingClient};
use crate::voter::evaluator::{FailReason, Outcome, PollEvaluator, SkipReason, VotingPolicy};
use crate::voter::history::VoteHistory;
use crate::voter::listener::{handle_event, run_listener};
use crate::voter::message::{Message, MessageKind, PollOption};
use crate::voter::scanner::{run_scanner, scan_once};

const CHAT: &str = "123@g.us";

struct MockClient {
    /// Messages returned by every fetch.
    fetched: Mutex<Vec<Message>>,
    /// (poll id, selected options) per vote call.
    votes: Mutex<Vec<(String, Vec<String>)>>,
    fail_votes: AtomicBool,
    fail_fetch: AtomicBool,
}

impl MockClient {
    fn new() -> Self {
        Self {
            fetched: Mutex::new(Vec::new()),
            votes: Mutex::new(Vec::new()),
            fail_votes: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
        }
    }

    fn with_fetched(messages: Vec<Message>) -> Self {
        let client = Self::new();
        *client.fetched.lock().unwrap() = messages;
        client
    }

    fn vote_count(&self) -> usize {
        self.votes.lock().unwrap().len()
    }

    fn votes(&self) -> Vec<(String, Vec<String>)> {
        self.votes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingClient for MockClient {
    async fn fetch_recent_messages(
        &self,
        _chat_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, String> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err("fetch failed".to_string());
        }
        let fetched = self.fetched.lock().unwrap();
        Ok(fetched.iter().take(limit).cloned().collect())
    }

    async fn vote(&self, message: &Message, selected_options: &[String]) -> Result<(), String> {
        if self.fail_votes.load(Ordering::SeqCst) {
            return Err("vote failed".to_string());
        }
        self.votes
            .lock()
            .unwrap()
            .push((message.id.clone(), selected_options.to_vec()));
        Ok(())
    }
}

/// A poll created `age_hours` ago in the target chat.
fn poll(id: &str, age_hours: i64, options: &[&str]) -> Message {
    Message {
        id: id.to_string(),
        body: "Tomorrow's game".to_string(),
        timestamp: Utc::now().timestamp() - age_hours * 3600,
        chat_id: CHAT.to_string(),
        sender: "456@c.us".to_string(),
        kind: MessageKind::PollCreation,
        options: options.iter().map(|n| PollOption::new(*n)).collect(),
    }
}

fn text_message(id: &str) -> Message {
    Message {
        id: id.to_string(),
        body: "hello".to_string(),
        timestamp: Utc::now().timestamp(),
        chat_id: CHAT.to_string(),
        sender: "456@c.us".to_string(),
        kind: MessageKind::Other("textMessage".to_string()),
        options: vec![],
    }
}

fn policy() -> VotingPolicy {
    VotingPolicy {
        chat_id: CHAT.to_string(),
        ..VotingPolicy::default()
    }
}

fn evaluator(client: &Arc<MockClient>) -> PollEvaluator<MockClient> {
    PollEvaluator::new(client.clone(), policy(), VoteHistory::in_memory())
}

// =============================================================================
// EVALUATOR
// =============================================================================

#[tokio::test]
async fn test_fresh_poll_gets_voted() {
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    let outcome = evaluator.evaluate(&poll("m1", 1, &["Yes", "No"])).await;
    assert_eq!(outcome, Outcome::Voted);
    assert_eq!(client.votes(), vec![("m1".to_string(), vec!["Yes".to_string()])]);
    assert!(evaluator.has_voted("m1").await);
}

#[tokio::test]
async fn test_second_evaluation_short_circuits() {
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);
    let message = poll("m1", 1, &["Yes", "No"]);

    assert_eq!(evaluator.evaluate(&message).await, Outcome::Voted);
    assert_eq!(
        evaluator.evaluate(&message).await,
        Outcome::Skipped(SkipReason::AlreadyVoted)
    );
    assert_eq!(client.vote_count(), 1);
}

#[tokio::test]
async fn test_already_voted_never_reaches_the_client() {
    let client = Arc::new(MockClient::new());
    let mut history = VoteHistory::in_memory();
    history.mark_voted("m1");
    let evaluator = PollEvaluator::new(client.clone(), policy(), history);

    let outcome = evaluator.evaluate(&poll("m1", 1, &["Yes"])).await;
    assert_eq!(outcome, Outcome::Skipped(SkipReason::AlreadyVoted));
    assert_eq!(client.vote_count(), 0);
}

#[tokio::test]
async fn test_stale_poll_is_skipped() {
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    let outcome = evaluator.evaluate(&poll("m1", 25, &["Yes"])).await;
    assert_eq!(outcome, Outcome::Skipped(SkipReason::Stale));
    assert_eq!(client.vote_count(), 0);
    assert!(!evaluator.has_voted("m1").await);
}

#[tokio::test]
async fn test_poll_inside_window_is_voted() {
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    let outcome = evaluator.evaluate(&poll("m1", 23, &["Yes"])).await;
    assert_eq!(outcome, Outcome::Voted);
}

#[tokio::test]
async fn test_future_timestamp_is_accepted() {
    // Only a lower bound is enforced; clock skew into the future passes.
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    let outcome = evaluator.evaluate(&poll("m1", -1, &["Yes"])).await;
    assert_eq!(outcome, Outcome::Voted);
}

#[tokio::test]
async fn test_non_poll_is_skipped() {
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    let outcome = evaluator.evaluate(&text_message("m1")).await;
    assert_eq!(outcome, Outcome::Skipped(SkipReason::NotAPoll));
    assert_eq!(client.vote_count(), 0);
}

#[tokio::test]
async fn test_poll_without_options_fails() {
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    let outcome = evaluator.evaluate(&poll("m1", 1, &[])).await;
    assert_eq!(outcome, Outcome::Failed(FailReason::NoOptions));
}

#[tokio::test]
async fn test_no_matching_option_leaves_history_unchanged() {
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    let outcome = evaluator.evaluate(&poll("m1", 1, &["Maybe", "No"])).await;
    assert_eq!(outcome, Outcome::Failed(FailReason::NoMatchingOption));
    assert_eq!(client.vote_count(), 0);
    assert!(!evaluator.has_voted("m1").await);
}

#[tokio::test]
async fn test_vote_selection_uses_option_text_verbatim() {
    // Matching normalizes, but the vote is cast with the option's own text.
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    let outcome = evaluator.evaluate(&poll("m1", 1, &["  YES  ", "No"])).await;
    assert_eq!(outcome, Outcome::Voted);
    assert_eq!(
        client.votes(),
        vec![("m1".to_string(), vec!["  YES  ".to_string()])]
    );
}

#[tokio::test]
async fn test_vote_error_is_retryable() {
    let client = Arc::new(MockClient::new());
    client.fail_votes.store(true, Ordering::SeqCst);
    let evaluator = evaluator(&client);
    let message = poll("m1", 1, &["Yes"]);

    let outcome = evaluator.evaluate(&message).await;
    assert!(matches!(outcome, Outcome::Failed(FailReason::VoteError(_))));
    assert!(!evaluator.has_voted("m1").await);

    // The next delivery of the same poll retries and succeeds.
    client.fail_votes.store(false, Ordering::SeqCst);
    assert_eq!(evaluator.evaluate(&message).await, Outcome::Voted);
    assert_eq!(client.vote_count(), 1);
}

#[tokio::test]
async fn test_concurrent_evaluations_vote_once() {
    let client = Arc::new(MockClient::new());
    let evaluator = Arc::new(evaluator(&client));
    let message = poll("m1", 1, &["Yes"]);

    let (a, b) = tokio::join!(evaluator.evaluate(&message), evaluator.evaluate(&message));

    let outcomes = [a, b];
    let voted = outcomes.iter().filter(|o| **o == Outcome::Voted).count();
    let skipped = outcomes
        .iter()
        .filter(|o| **o == Outcome::Skipped(SkipReason::AlreadyVoted))
        .count();
    assert_eq!((voted, skipped), (1, 1));
    assert_eq!(client.vote_count(), 1);
}

// =============================================================================
// LISTENER
// =============================================================================

#[tokio::test]
async fn test_listener_votes_on_inbound_poll() {
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    handle_event(&evaluator, ClientEvent::Inbound(poll("m1", 1, &["Yes", "No"]))).await;
    assert_eq!(client.vote_count(), 1);
}

#[tokio::test]
async fn test_listener_votes_on_outbound_poll() {
    // Self-created polls arrive as outbound events and still qualify.
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    handle_event(&evaluator, ClientEvent::Outbound(poll("m1", 1, &["Yes"]))).await;
    assert_eq!(client.vote_count(), 1);
}

#[tokio::test]
async fn test_listener_ignores_other_conversations() {
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    let mut message = poll("m1", 1, &["Yes"]);
    message.chat_id = "999@g.us".to_string();
    handle_event(&evaluator, ClientEvent::Inbound(message)).await;
    assert_eq!(client.vote_count(), 0);
}

#[tokio::test]
async fn test_listener_ignores_non_poll_messages() {
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    handle_event(&evaluator, ClientEvent::Inbound(text_message("m1"))).await;
    assert_eq!(client.vote_count(), 0);
}

#[tokio::test]
async fn test_listener_logs_lifecycle_events() {
    let client = Arc::new(MockClient::new());
    let evaluator = evaluator(&client);

    handle_event(&evaluator, ClientEvent::Ready).await;
    handle_event(&evaluator, ClientEvent::Authenticated).await;
    handle_event(&evaluator, ClientEvent::StateChange("starting".to_string())).await;
    handle_event(&evaluator, ClientEvent::Disconnected("logout".to_string())).await;
    assert_eq!(client.vote_count(), 0);
}

#[tokio::test]
async fn test_listener_drains_channel_until_close() {
    let client = Arc::new(MockClient::new());
    let evaluator = Arc::new(evaluator(&client));

    let (tx, rx) = mpsc::channel(16);
    tx.send(ClientEvent::Ready).await.unwrap();
    tx.send(ClientEvent::Inbound(poll("m1", 1, &["Yes"]))).await.unwrap();
    tx.send(ClientEvent::Inbound(poll("m1", 1, &["Yes"]))).await.unwrap();
    tx.send(ClientEvent::Inbound(poll("m2", 2, &["Yes"]))).await.unwrap();
    drop(tx);

    run_listener(rx, evaluator).await;

    // Duplicate delivery of m1 produced only one vote.
    assert_eq!(client.vote_count(), 2);
}

// =============================================================================
// SCANNER
// =============================================================================

#[tokio::test]
async fn test_scan_votes_on_fetched_polls() {
    let client = Arc::new(MockClient::with_fetched(vec![
        poll("m1", 1, &["Yes", "No"]),
        text_message("m2"),
        poll("m3", 2, &["Yes"]),
    ]));
    let evaluator = evaluator(&client);

    scan_once(&evaluator, client.as_ref()).await;
    assert_eq!(client.vote_count(), 2);
}

#[tokio::test]
async fn test_scan_is_idempotent_across_passes() {
    let client = Arc::new(MockClient::with_fetched(vec![poll("m1", 1, &["Yes"])]));
    let evaluator = evaluator(&client);

    scan_once(&evaluator, client.as_ref()).await;
    scan_once(&evaluator, client.as_ref()).await;
    assert_eq!(client.vote_count(), 1);
}

#[tokio::test]
async fn test_scan_survives_fetch_errors() {
    let client = Arc::new(MockClient::with_fetched(vec![poll("m1", 1, &["Yes"])]));
    client.fail_fetch.store(true, Ordering::SeqCst);
    let evaluator = evaluator(&client);

    scan_once(&evaluator, client.as_ref()).await;
    assert_eq!(client.vote_count(), 0);

    // The next pass retries independently.
    client.fail_fetch.store(false, Ordering::SeqCst);
    scan_once(&evaluator, client.as_ref()).await;
    assert_eq!(client.vote_count(), 1);
}

#[tokio::test]
async fn test_scanner_ticks_on_interval() {
    let client = Arc::new(MockClient::with_fetched(vec![poll("m1", 1, &["Yes"])]));
    let short_policy = VotingPolicy {
        chat_id: CHAT.to_string(),
        scan_interval: Duration::from_millis(30),
        initial_scan_delay: Duration::from_millis(10),
        ..VotingPolicy::default()
    };
    let evaluator = Arc::new(PollEvaluator::new(
        client.clone(),
        short_policy,
        VoteHistory::in_memory(),
    ));

    let handle = tokio::spawn(run_scanner(evaluator, client.clone()));
    tokio::time::sleep(Duration::from_millis(120)).await;
    handle.abort();

    // Several passes ran; the poll was still voted exactly once.
    assert_eq!(client.vote_count(), 1);
}
