//! Conversation Manager: turn order and termination policy.
//!
//! Two ordered checks run after every turn:
//! 1. the last message carries the completion sentinel (case-insensitive)
//! 2. the completed round count has reached `max_rounds`
//!
//! Turn order is strict round-robin over the roster.

use serde::{Deserialize, Serialize};

/// Token a participant emits to end the conversation early.
pub const COMPLETION_SENTINEL: &str = "COMPLETED";

pub const COMPLETION_REASON: &str = "Termination condition met.";

/// Why a conversation stopped on its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    Sentinel,
    RoundLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub terminate: bool,
    pub cause: Option<StopCause>,
    pub reason: String,
}

impl Verdict {
    fn proceed() -> Self {
        Self {
            terminate: false,
            cause: None,
            reason: String::new(),
        }
    }
}

/// Decides whether the conversation is finished.
///
/// `round_count` is the number of participant turns completed so far.
/// An empty transcript carries no termination signal.
pub fn should_terminate<M: AsRef<str>>(
    transcript: &[M],
    round_count: u32,
    max_rounds: u32,
) -> Verdict {
    let sentinel_seen = transcript
        .last()
        .map(|m| m.as_ref().to_uppercase().contains(COMPLETION_SENTINEL))
        .unwrap_or(false);

    if sentinel_seen {
        return Verdict {
            terminate: true,
            cause: Some(StopCause::Sentinel),
            reason: COMPLETION_REASON.to_string(),
        };
    }

    if round_count >= max_rounds {
        return Verdict {
            terminate: true,
            cause: Some(StopCause::RoundLimit),
            reason: format!("Maximum number of rounds reached ({max_rounds})."),
        };
    }

    Verdict::proceed()
}

/// Strict round-robin: `roster[round_count mod len]`. `None` only for an empty roster.
pub fn next_participant<T>(roster: &[T], round_count: u32) -> Option<&T> {
    if roster.is_empty() {
        return None;
    }
    roster.get(round_count as usize % roster.len())
}
