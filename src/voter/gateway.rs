//! HTTP client for the WhatsApp gateway.
//!
//! Speaks the Green API wire format: instance-scoped REST methods at
//! `{base}/waInstance{id}/{method}/{token}`, a `receiveNotification` /
//! `deleteNotification` long-poll queue for the live event stream, and
//! `getChatHistory` for recent-message fetches.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::voter::client::{ClientEvent, MessagingClient};
use crate::voter::message::{Message, MessageKind, PollOption};

/// Request timeout for every gateway call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Pause before retrying after a failed notification poll.
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// REST client for the gateway. Stateless besides the connection pool.
pub struct GatewayClient {
    http: reqwest::Client,
    api_url: String,
    id_instance: String,
    api_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateResponse {
    state_instance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Notification {
    receipt_id: i64,
    body: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookBody {
    type_webhook: String,
    #[serde(default)]
    id_message: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    sender_data: Option<SenderData>,
    #[serde(default)]
    message_data: Option<MessageData>,
    #[serde(default)]
    state_instance: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SenderData {
    #[serde(default)]
    chat_id: String,
    #[serde(default)]
    sender: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageData {
    type_message: String,
    #[serde(default)]
    poll_message_data: Option<PollMessageData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollMessageData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    options: Vec<RawPollOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPollOption {
    option_name: String,
}

/// One entry returned by `getChatHistory`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
    id_message: String,
    #[serde(default)]
    timestamp: i64,
    type_message: String,
    #[serde(default)]
    chat_id: String,
    #[serde(default)]
    sender_id: String,
    #[serde(default)]
    text_message: Option<String>,
    #[serde(default)]
    poll_message_data: Option<PollMessageData>,
}

impl GatewayClient {
    pub fn new(api_url: &str, id_instance: &str, api_token: &str) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            id_instance: id_instance.to_string(),
            api_token: api_token.to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!(
            "{}/waInstance{}/{}/{}",
            self.api_url, self.id_instance, method, self.api_token
        )
    }

    /// Current connection state of the gateway instance.
    pub async fn get_state(&self) -> Result<String, String> {
        let state: StateResponse = self
            .http
            .get(self.url("getStateInstance"))
            .send()
            .await
            .map_err(|e| format!("getStateInstance request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("getStateInstance returned error: {e}"))?
            .json()
            .await
            .map_err(|e| format!("getStateInstance returned invalid body: {e}"))?;

        Ok(state.state_instance)
    }

    /// Long-poll the gateway for webhooks and forward them as client events.
    ///
    /// Runs until the receiving side of `tx` is dropped. Poll and parse
    /// errors are logged and retried after a short pause; unrecognized
    /// payloads are acknowledged and dropped so they cannot wedge the queue.
    pub async fn run_notification_loop(self: Arc<Self>, tx: mpsc::Sender<ClientEvent>) {
        info!("Notification loop started");
        loop {
            let notification = match self.receive_notification().await {
                Ok(Some(notification)) => notification,
                Ok(None) => continue,
                Err(e) => {
                    warn!("receiveNotification failed: {e}");
                    tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                    continue;
                }
            };

            if let Some(event) = map_webhook(notification.body)
                && tx.send(event).await.is_err()
            {
                info!("Event channel closed, stopping notification loop");
                return;
            }

            if let Err(e) = self.delete_notification(notification.receipt_id).await {
                warn!(
                    "deleteNotification {} failed: {e}",
                    notification.receipt_id
                );
            }
        }
    }

    async fn receive_notification(&self) -> Result<Option<Notification>, String> {
        let value: Value = self
            .http
            .get(self.url("receiveNotification"))
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("gateway returned error: {e}"))?
            .json()
            .await
            .map_err(|e| format!("invalid response body: {e}"))?;

        // The gateway answers null when the queue is empty.
        if value.is_null() {
            return Ok(None);
        }

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| format!("unrecognized notification envelope: {e}"))
    }

    async fn delete_notification(&self, receipt_id: i64) -> Result<(), String> {
        self.http
            .delete(format!("{}/{}", self.url("deleteNotification"), receipt_id))
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("gateway returned error: {e}"))?;
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for GatewayClient {
    async fn fetch_recent_messages(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, String> {
        let payload = serde_json::json!({ "chatId": chat_id, "count": limit });
        let entries: Vec<Value> = self
            .http
            .post(self.url("getChatHistory"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("getChatHistory request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("getChatHistory returned error: {e}"))?
            .json()
            .await
            .map_err(|e| format!("getChatHistory returned invalid body: {e}"))?;

        let mut messages = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<HistoryEntry>(entry) {
                Ok(entry) => messages.push(message_from_history(entry)),
                Err(e) => warn!("Skipping unrecognized history entry: {e}"),
            }
        }
        Ok(messages)
    }

    async fn vote(&self, message: &Message, selected_options: &[String]) -> Result<(), String> {
        let payload = serde_json::json!({
            "chatId": message.chat_id,
            "idMessage": message.id,
            "optionNames": selected_options,
        });
        self.http
            .post(self.url("sendPollVote"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("sendPollVote request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("sendPollVote returned error: {e}"))?;
        Ok(())
    }
}

/// Map one webhook payload to a client event, or drop it.
fn map_webhook(body: Value) -> Option<ClientEvent> {
    let body: WebhookBody = match serde_json::from_value(body) {
        Ok(body) => body,
        Err(e) => {
            warn!("Unrecognized webhook payload: {e}");
            return None;
        }
    };

    match body.type_webhook.as_str() {
        "stateInstanceChanged" => {
            let state = body.state_instance.unwrap_or_default();
            match state.as_str() {
                "authorized" => Some(ClientEvent::Authenticated),
                "notAuthorized" | "blocked" => Some(ClientEvent::Disconnected(state)),
                _ => Some(ClientEvent::StateChange(state)),
            }
        }
        "incomingMessageReceived" => message_from_webhook(body).map(ClientEvent::Inbound),
        "outgoingMessageReceived" | "outgoingAPIMessageReceived" => {
            message_from_webhook(body).map(ClientEvent::Outbound)
        }
        other => {
            debug!("Ignoring webhook type {other}");
            None
        }
    }
}

fn message_from_webhook(body: WebhookBody) -> Option<Message> {
    let id = body.id_message?;
    let sender_data = body.sender_data?;
    let MessageData {
        type_message,
        poll_message_data,
    } = body.message_data?;

    let (kind, text, options) = message_parts(type_message, poll_message_data, None);
    Some(Message {
        id,
        body: text,
        timestamp: body.timestamp.unwrap_or(0),
        chat_id: sender_data.chat_id,
        sender: sender_data.sender,
        kind,
        options,
    })
}

fn message_from_history(entry: HistoryEntry) -> Message {
    let (kind, text, options) = message_parts(
        entry.type_message,
        entry.poll_message_data,
        entry.text_message,
    );
    Message {
        id: entry.id_message,
        body: text,
        timestamp: entry.timestamp,
        chat_id: entry.chat_id,
        sender: entry.sender_id,
        kind,
        options,
    }
}

fn message_parts(
    type_message: String,
    poll_message_data: Option<PollMessageData>,
    text_message: Option<String>,
) -> (MessageKind, String, Vec<PollOption>) {
    if type_message == "pollMessage" {
        let poll = poll_message_data.unwrap_or_default();
        let options = poll
            .options
            .into_iter()
            .map(|o| PollOption { name: o.option_name })
            .collect();
        (MessageKind::PollCreation, poll.name, options)
    } else {
        (
            MessageKind::Other(type_message),
            text_message.unwrap_or_default(),
            Vec::new(),
        )
    }
}
