//! Conversation Driver: sequences turns and applies the manager's verdict.
//!
//! Flow per turn: pick participant → obtain reply → append → record stats →
//! evaluate termination. Turns never overlap, and cancellation is honoured
//! only between turns.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::agent_client::AgentError;
use crate::orchestration::manager::{next_participant, should_terminate, StopCause};
use crate::orchestration::stats::StatisticsTracker;
use crate::orchestration::transcript::{
    Message, MessageRole, Transcript, ERROR_SENDER, SYSTEM_SENDER,
};

/// Produces a participant's next reply from the transcript so far.
///
/// One call is one atomic turn; the driver never interrupts it.
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    async fn produce_reply(&self, transcript: &[Message]) -> Result<String, AgentError>;
}

/// A roster entry: identifier plus the provider that speaks for it.
#[derive(Clone)]
pub struct Participant {
    pub id: String,
    pub provider: Arc<dyn ReplyProvider>,
}

impl Participant {
    pub fn new(id: impl Into<String>, provider: Arc<dyn ReplyProvider>) -> Self {
        Self {
            id: id.into(),
            provider,
        }
    }
}

/// Receives every appended message, in append order.
pub trait TranscriptObserver: Send + Sync {
    fn message_appended(&self, message: &Message);

    fn round_completed(&self, _round: u32) {}
}

/// How a run ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    RoundLimit,
    Cancelled,
    Failed,
}

impl From<StopCause> for RunOutcome {
    fn from(cause: StopCause) -> Self {
        match cause {
            StopCause::Sentinel => RunOutcome::Completed,
            StopCause::RoundLimit => RunOutcome::RoundLimit,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub reason: String,
    pub rounds: u32,
    pub transcript: Transcript,
}

pub struct ConversationDriver<'a> {
    roster: &'a [Participant],
    max_rounds: u32,
    stats: &'a StatisticsTracker,
    observer: &'a dyn TranscriptObserver,
}

impl<'a> ConversationDriver<'a> {
    pub fn new(
        roster: &'a [Participant],
        max_rounds: u32,
        stats: &'a StatisticsTracker,
        observer: &'a dyn TranscriptObserver,
    ) -> Self {
        Self {
            roster,
            max_rounds,
            stats,
            observer,
        }
    }

    /// Runs the conversation from `kickoff` until termination, failure or cancellation.
    pub async fn run(&self, kickoff: &str, cancel: &CancellationToken) -> RunReport {
        let mut transcript = Transcript::new();
        self.append(&mut transcript, SYSTEM_SENDER, MessageRole::System, kickoff.to_string());

        let mut rounds = 0u32;

        loop {
            if cancel.is_cancelled() {
                let reason = format!("Run cancelled: stop requested after {rounds} round(s).");
                warn!("{reason}");
                return self.finish(transcript, rounds, RunOutcome::Cancelled, reason);
            }

            let Some(participant) = next_participant(self.roster, rounds) else {
                let reason = "Error: the participant roster is empty.".to_string();
                error!("{reason}");
                return self.finish(transcript, rounds, RunOutcome::Failed, reason);
            };

            info!("Round {}: waiting on {}", rounds + 1, participant.id);

            let reply = match participant.provider.produce_reply(transcript.messages()).await {
                Ok(reply) => reply,
                Err(e) => {
                    let reason = format!("Error: {} failed to reply: {e}", participant.id);
                    error!("{reason}");
                    return self.finish(transcript, rounds, RunOutcome::Failed, reason);
                }
            };

            let timestamp = self.append(
                &mut transcript,
                &participant.id,
                MessageRole::Participant,
                annotate_reply(&reply),
            );
            self.stats.record(&participant.id, &reply, timestamp);

            rounds += 1;
            self.observer.round_completed(rounds);
            info!(
                "Round {rounds}: {} replied ({} chars)",
                participant.id,
                reply.chars().count()
            );

            let verdict = should_terminate(transcript.messages(), rounds, self.max_rounds);
            if let Some(cause) = verdict.cause.filter(|_| verdict.terminate) {
                info!("Conversation finished after {rounds} round(s): {}", verdict.reason);
                return self.finish(transcript, rounds, cause.into(), verdict.reason);
            }
        }
    }

    /// Appends the closing notice. System role for a normal stop, error role otherwise.
    fn finish(
        &self,
        mut transcript: Transcript,
        rounds: u32,
        outcome: RunOutcome,
        reason: String,
    ) -> RunReport {
        let (sender, role) = match outcome {
            RunOutcome::Completed | RunOutcome::RoundLimit => (SYSTEM_SENDER, MessageRole::System),
            RunOutcome::Cancelled | RunOutcome::Failed => (ERROR_SENDER, MessageRole::Error),
        };
        self.append(&mut transcript, sender, role, reason.clone());

        RunReport {
            outcome,
            reason,
            rounds,
            transcript,
        }
    }

    fn append(
        &self,
        transcript: &mut Transcript,
        sender: &str,
        role: MessageRole,
        content: String,
    ) -> DateTime<Utc> {
        let message = transcript.append(sender, role, content);
        self.observer.message_appended(message);
        message.timestamp
    }
}

/// Tags replies that show delegation or document search, for display.
pub fn annotate_reply(content: &str) -> String {
    if content.contains("connected_agent") {
        format!("[DELEGATION] {content}")
    } else if content.contains("myfiles_browser") || content.contains("file_search") {
        format!("[SEARCH] {content}")
    } else {
        content.to_string()
    }
}
