use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use loop_run_lib::RunRecord;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::clock::Clock;

pub const DEFAULT_CONTEST_DAYS: i64 = 15;

/// Current champion of a loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestRecord {
    pub champion: String,
    pub best_time_seconds: u64,
    pub end_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// Whether the submitted time took the lead.
    pub accepted: bool,
    /// The contest as it stands after the submission.
    pub contest: ContestRecord,
}

impl fmt::Display for SubmissionReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.accepted {
            write!(
                f,
                "new best time {}s, contest open until {}",
                self.contest.best_time_seconds, self.contest.end_timestamp
            )
        } else {
            write!(
                f,
                "not accepted, best time is {}s by {}",
                self.contest.best_time_seconds, self.contest.champion
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("submitter is not authorized: {0:?}")]
    Unauthorized(String),
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Writes finished runs somewhere durable. Implementations do their own
/// transport; callers do not retry.
#[async_trait]
pub trait RunSubmitter: Send + Sync {
    async fn submit(&self, record: &RunRecord) -> Result<SubmissionReceipt, SubmissionError>;
}

/// In-memory loop contest: the first time on a loop opens a contest, and a
/// strictly faster time before the contest ends takes it over and restarts
/// the window.
pub struct ContestLedger {
    contests: Mutex<HashMap<String, ContestRecord>>,
    contest_duration: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl ContestLedger {
    pub fn new(clock: Arc<dyn Clock>, contest_duration: TimeDelta) -> Self {
        Self {
            contests: Mutex::new(HashMap::new()),
            contest_duration,
            clock,
        }
    }

    pub async fn record(&self, loop_id: &str) -> Option<ContestRecord> {
        self.contests.lock().await.get(loop_id).cloned()
    }
}

#[async_trait]
impl RunSubmitter for ContestLedger {
    async fn submit(&self, record: &RunRecord) -> Result<SubmissionReceipt, SubmissionError> {
        if record.submitter_address().trim().is_empty() {
            return Err(SubmissionError::Unauthorized(record.submitter_address().to_string()));
        }

        let now = self.clock.now();
        let mut contests = self.contests.lock().await;

        if let Some(current) = contests.get(record.loop_id()) {
            let faster = record.elapsed_seconds() < current.best_time_seconds;
            if !faster || now >= current.end_timestamp {
                return Ok(SubmissionReceipt {
                    accepted: false,
                    contest: current.clone(),
                });
            }
        }

        let contest = ContestRecord {
            champion: record.submitter_address().to_string(),
            best_time_seconds: record.elapsed_seconds(),
            end_timestamp: now + self.contest_duration,
        };
        contests.insert(record.loop_id().to_string(), contest.clone());

        Ok(SubmissionReceipt {
            accepted: true,
            contest,
        })
    }
}
