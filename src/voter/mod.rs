//! Poll auto-voting core: event listener, recovery scanner, evaluator,
//! vote history, and the messaging-client seam.

pub mod caster;
pub mod client;
pub mod evaluator;
pub mod gateway;
pub mod history;
pub mod listener;
pub mod matcher;
pub mod message;
pub mod scanner;

#[cfg(test)]
mod tests;

pub use client::{ClientEvent, MessagingClient};
pub use evaluator::{FailReason, Outcome, PollEvaluator, SkipReason, VotingPolicy};
pub use gateway::GatewayClient;
pub use history::VoteHistory;
pub use message::{Message, MessageKind, PollOption};
