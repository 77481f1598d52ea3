//! Run controller: owns the lifecycle of the single active run.
//!
//! At most one run is `running`. Its turn loop executes on its own task;
//! handlers only ever read snapshots, so a slow agent never blocks them.
//! Each run gets a fresh broadcast channel for the observer feed, created at
//! start and dropped when the run ends.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::orchestration::driver::{
    ConversationDriver, Participant, RunOutcome, RunReport, TranscriptObserver,
};
use crate::orchestration::stats::{AgentStatistics, StatisticsTracker};
use crate::orchestration::transcript::Message;

pub(crate) const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

impl From<RunOutcome> for RunStatus {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed | RunOutcome::RoundLimit => RunStatus::Completed,
            RunOutcome::Cancelled | RunOutcome::Failed => RunStatus::Error,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("Workflow already running")]
    AlreadyRunning,

    #[error("The participant roster is empty")]
    EmptyRoster,

    #[error("Participant '{0}' appears more than once in the roster")]
    DuplicateParticipant(String),

    #[error("max_rounds must be greater than zero")]
    ZeroRounds,
}

/// Read-only view of the current (or most recent) run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSnapshot {
    pub run_id: Option<Uuid>,
    pub status: RunStatus,
    pub outcome: Option<RunOutcome>,
    pub reason: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub current_round: u32,
    pub max_rounds: u32,
    pub participants: Vec<String>,
    pub messages: Vec<Message>,
}

/// What a feed subscriber needs to join the current run without gaps.
pub struct FeedAttachment {
    pub run_id: Option<Uuid>,
    pub backlog: Vec<Message>,
    pub receiver: Option<broadcast::Receiver<Message>>,
}

#[derive(Default)]
struct RunState {
    snapshot: RunSnapshot,
    feed: Option<broadcast::Sender<Message>>,
    cancel: Option<CancellationToken>,
}

struct Shared {
    state: RwLock<RunState>,
    stats: StatisticsTracker,
    /// Bumped every time a run starts.
    runs: watch::Sender<u64>,
}

impl Shared {
    fn read(&self) -> RwLockReadGuard<'_, RunState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RunState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, run_id: Uuid, report: &RunReport) {
        let mut state = self.write();
        if state.snapshot.run_id != Some(run_id) {
            return;
        }
        state.snapshot.status = report.outcome.into();
        state.snapshot.outcome = Some(report.outcome);
        state.snapshot.reason = Some(report.reason.clone());
        state.snapshot.current_round = report.rounds;
        state.feed = None;
        state.cancel = None;
    }
}

/// Publishes the driver's messages into the shared snapshot and the feed.
struct RunRecorder {
    shared: Arc<Shared>,
    feed: broadcast::Sender<Message>,
}

impl TranscriptObserver for RunRecorder {
    fn message_appended(&self, message: &Message) {
        // Snapshot push and broadcast happen under one lock so a subscriber
        // attaching concurrently sees each message in exactly one of them.
        let mut state = self.shared.write();
        state.snapshot.messages.push(message.clone());
        // No receivers is not an error.
        let _ = self.feed.send(message.clone());
    }

    fn round_completed(&self, round: u32) {
        self.shared.write().snapshot.current_round = round;
    }
}

#[derive(Clone)]
pub struct RunController {
    shared: Arc<Shared>,
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

impl RunController {
    pub fn new() -> Self {
        let (runs, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(RunState::default()),
                stats: StatisticsTracker::new(),
                runs,
            }),
        }
    }

    /// Starts a run on a background task.
    ///
    /// Rejected without touching any state while another run is `running`.
    pub fn start(
        &self,
        roster: Vec<Participant>,
        max_rounds: u32,
        kickoff: String,
    ) -> Result<Uuid, StartError> {
        let mut state = self.shared.write();
        if state.snapshot.status == RunStatus::Running {
            return Err(StartError::AlreadyRunning);
        }
        validate(&roster, max_rounds)?;

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (feed, _) = broadcast::channel(FEED_CAPACITY);

        state.snapshot = RunSnapshot {
            run_id: Some(run_id),
            status: RunStatus::Running,
            start_time: Some(Utc::now()),
            max_rounds,
            participants: roster.iter().map(|p| p.id.clone()).collect(),
            ..RunSnapshot::default()
        };
        state.feed = Some(feed.clone());
        state.cancel = Some(cancel.clone());
        self.shared.stats.reset();
        self.shared.runs.send_modify(|n| *n += 1);
        drop(state);

        info!(
            "Run {run_id} started: roster={:?}, max_rounds={max_rounds}",
            roster.iter().map(|p| p.id.as_str()).collect::<Vec<_>>()
        );

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let recorder = RunRecorder {
                shared: Arc::clone(&shared),
                feed,
            };
            let report = ConversationDriver::new(&roster, max_rounds, &shared.stats, &recorder)
                .run(&kickoff, &cancel)
                .await;
            info!(
                "Run {run_id} ended: outcome={:?}, rounds={}, messages={}",
                report.outcome,
                report.rounds,
                report.transcript.len()
            );
            shared.finish(run_id, &report);
        });

        Ok(run_id)
    }

    /// Asks the running run to stop before its next turn. Returns false when nothing is running.
    pub fn stop(&self) -> bool {
        let state = self.shared.read();
        match (&state.snapshot.status, &state.cancel) {
            (RunStatus::Running, Some(cancel)) => {
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.shared.read().snapshot.clone()
    }

    pub fn statistics(&self, participant_id: &str) -> Option<AgentStatistics> {
        self.shared.stats.snapshot(participant_id)
    }

    /// Transcript so far plus a live receiver, taken atomically.
    pub fn attach_feed(&self) -> FeedAttachment {
        let state = self.shared.read();
        FeedAttachment {
            run_id: state.snapshot.run_id,
            backlog: state.snapshot.messages.clone(),
            receiver: state.feed.as_ref().map(broadcast::Sender::subscribe),
        }
    }

    /// Notifies whenever a new run starts.
    pub fn run_changes(&self) -> watch::Receiver<u64> {
        self.shared.runs.subscribe()
    }
}

fn validate(roster: &[Participant], max_rounds: u32) -> Result<(), StartError> {
    if roster.is_empty() {
        return Err(StartError::EmptyRoster);
    }
    if max_rounds == 0 {
        return Err(StartError::ZeroRounds);
    }
    let mut seen = HashSet::new();
    for participant in roster {
        if !seen.insert(participant.id.as_str()) {
            return Err(StartError::DuplicateParticipant(participant.id.clone()));
        }
    }
    Ok(())
}
