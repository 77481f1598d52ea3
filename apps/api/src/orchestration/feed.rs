//! Observer feed: ordered transcript updates plus heartbeats.
//!
//! A cursor follows whichever run is current. When it attaches to a run it
//! replays the transcript so far, then forwards live messages, dropping any
//! whose sequence it already delivered. A subscriber that falls behind the
//! broadcast buffer re-attaches the same way. Within one run, messages
//! therefore arrive exactly once and in append order.

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{self, Stream};
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::orchestration::run::RunController;
use crate::orchestration::transcript::Message;

/// Quiet period after which a heartbeat is emitted.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Message(Message),
    Heartbeat,
}

impl FeedEvent {
    /// JSON payload for one SSE `data:` frame.
    pub fn to_json(&self) -> String {
        match self {
            FeedEvent::Message(message) => {
                serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string())
            }
            FeedEvent::Heartbeat => json!({ "type": "heartbeat" }).to_string(),
        }
    }
}

enum Step {
    RunStarted,
    ControllerGone,
    Live(Result<Message, RecvError>),
    Quiet,
}

pub struct FeedCursor {
    controller: RunController,
    runs: watch::Receiver<u64>,
    run_id: Option<Uuid>,
    live: Option<broadcast::Receiver<Message>>,
    pending: VecDeque<FeedEvent>,
    next_sequence: usize,
    heartbeat: Duration,
}

impl FeedCursor {
    pub fn new(controller: RunController, heartbeat: Duration) -> Self {
        let runs = controller.run_changes();
        let mut cursor = Self {
            controller,
            runs,
            run_id: None,
            live: None,
            pending: VecDeque::new(),
            next_sequence: 0,
            heartbeat,
        };
        cursor.attach();
        cursor
    }

    fn attach(&mut self) {
        let attachment = self.controller.attach_feed();
        if attachment.run_id != self.run_id {
            self.run_id = attachment.run_id;
            self.next_sequence = 0;
        }
        for message in attachment.backlog {
            self.accept(message);
        }
        self.live = attachment.receiver;
    }

    fn accept(&mut self, message: Message) {
        if message.sequence >= self.next_sequence {
            self.next_sequence = message.sequence + 1;
            self.pending.push_back(FeedEvent::Message(message));
        }
    }

    /// Next event for the subscriber. `None` once the controller is gone.
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            let step = tokio::select! {
                changed = self.runs.changed() => {
                    if changed.is_ok() { Step::RunStarted } else { Step::ControllerGone }
                }
                received = recv_live(&mut self.live) => Step::Live(received),
                () = tokio::time::sleep(self.heartbeat) => Step::Quiet,
            };

            match step {
                Step::RunStarted => self.attach(),
                Step::ControllerGone => return None,
                Step::Live(Ok(message)) => self.accept(message),
                Step::Quiet => return Some(FeedEvent::Heartbeat),
                // Overrun: replay the snapshot; already delivered sequences are skipped.
                Step::Live(Err(RecvError::Lagged(skipped))) => {
                    debug!("Feed subscriber lagged by {skipped} messages, resyncing");
                    self.attach();
                }
                Step::Live(Err(RecvError::Closed)) => self.live = None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = FeedEvent> + Send {
        stream::unfold(self, |mut cursor| async move {
            cursor.next_event().await.map(|event| (event, cursor))
        })
    }
}

async fn recv_live(
    live: &mut Option<broadcast::Receiver<Message>>,
) -> Result<Message, RecvError> {
    match live {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use async_trait::async_trait;

    use crate::agent_client::AgentError;
    use crate::orchestration::driver::testing::ScriptedReplies;
    use crate::orchestration::driver::{Participant, ReplyProvider};
    use crate::orchestration::run::tests::{wait_for_messages, wait_until_finished, GatedReply};
    use crate::orchestration::run::FEED_CAPACITY;

    async fn next_message(cursor: &mut FeedCursor) -> Message {
        loop {
            match cursor.next_event().await {
                Some(FeedEvent::Message(m)) => return m,
                Some(FeedEvent::Heartbeat) => continue,
                None => panic!("feed ended"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_feed_emits_heartbeats() {
        let controller = RunController::new();
        let mut cursor = FeedCursor::new(controller, HEARTBEAT_INTERVAL);
        assert_eq!(cursor.next_event().await, Some(FeedEvent::Heartbeat));
        assert_eq!(cursor.next_event().await, Some(FeedEvent::Heartbeat));
    }

    #[tokio::test]
    async fn test_cursor_follows_run_started_after_connect() {
        let controller = RunController::new();
        let mut cursor = FeedCursor::new(controller.clone(), HEARTBEAT_INTERVAL);

        let a = ScriptedReplies::ok(&["working on it", "COMPLETED"]);
        controller
            .start(vec![Participant::new("A", a)], 10, "start".to_string())
            .unwrap();

        let mut sequences = Vec::new();
        for _ in 0..4 {
            sequences.push(next_message(&mut cursor).await.sequence);
        }
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_backlog_then_live_without_duplicates() {
        let controller = RunController::new();
        let gated = Arc::new(GatedReply {
            gate: tokio::sync::Notify::new(),
        });
        controller
            .start(vec![Participant::new("A", gated.clone())], 1, "start".to_string())
            .unwrap();
        wait_for_messages(&controller, 1).await;

        let mut cursor = FeedCursor::new(controller.clone(), HEARTBEAT_INTERVAL);
        let kickoff = next_message(&mut cursor).await;
        assert_eq!(kickoff.sequence, 0);
        assert_eq!(kickoff.content, "start");

        gated.gate.notify_one();
        let reply = next_message(&mut cursor).await;
        let notice = next_message(&mut cursor).await;
        assert_eq!((reply.sequence, reply.content.as_str()), (1, "released"));
        assert_eq!(notice.sequence, 2);

        wait_until_finished(&controller).await;
    }

    #[tokio::test]
    async fn test_connect_after_run_replays_finished_transcript() {
        let controller = RunController::new();
        let a = ScriptedReplies::ok(&["COMPLETED"]);
        controller
            .start(vec![Participant::new("A", a)], 10, "start".to_string())
            .unwrap();
        wait_until_finished(&controller).await;

        let mut cursor = FeedCursor::new(controller, HEARTBEAT_INTERVAL);
        let contents: Vec<String> = [
            next_message(&mut cursor).await,
            next_message(&mut cursor).await,
            next_message(&mut cursor).await,
        ]
        .into_iter()
        .map(|m| m.content)
        .collect();
        assert_eq!(contents[0], "start");
        assert_eq!(contents[1], "COMPLETED");
        assert_eq!(cursor.pending.len(), 0);
    }

    /// Holds its first turn until released, then answers immediately.
    struct HeldFirstTurn {
        gate: tokio::sync::Notify,
        released: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ReplyProvider for HeldFirstTurn {
        async fn produce_reply(&self, _transcript: &[Message]) -> Result<String, AgentError> {
            if !self.released.swap(true, std::sync::atomic::Ordering::SeqCst) {
                self.gate.notified().await;
            }
            Ok("still checking".to_string())
        }
    }

    #[tokio::test]
    async fn test_lagging_subscriber_still_receives_every_message() {
        let controller = RunController::new();
        let held = Arc::new(HeldFirstTurn {
            gate: tokio::sync::Notify::new(),
            released: std::sync::atomic::AtomicBool::new(false),
        });
        controller
            .start(vec![Participant::new("A", held.clone())], 400, "start".to_string())
            .unwrap();
        wait_for_messages(&controller, 1).await;

        // Attached mid-run, but not polled until the run is over.
        let mut cursor = FeedCursor::new(controller.clone(), HEARTBEAT_INTERVAL);
        held.gate.notify_one();
        let finished = wait_until_finished(&controller).await;
        let total = finished.messages.len();
        assert_eq!(total, 402);
        assert!(total > FEED_CAPACITY);

        let mut sequences = Vec::with_capacity(total);
        while sequences.len() < total {
            sequences.push(next_message(&mut cursor).await.sequence);
        }
        assert_eq!(sequences, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn test_heartbeat_json_shape() {
        assert_eq!(FeedEvent::Heartbeat.to_json(), r#"{"type":"heartbeat"}"#);
    }
}
