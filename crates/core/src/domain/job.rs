// Job Domain Model
//
// A job is a file. Its identity is the file name; its state is the directory
// the file currently lives in.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;

use crate::domain::error::{DomainError, Result};

/// Job ID (the job's file name, never a path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Validate a bare file name as a job id.
    ///
    /// Rejects empty names, `.`/`..` and anything containing a path separator,
    /// so a job id can always be joined onto a state directory safely.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name == "." || name == ".." {
            return Err(DomainError::InvalidJobId(format!("'{}' is not a file name", name)));
        }
        if name.contains('/') || name.contains('\\') || name.contains('\0') {
            return Err(DomainError::InvalidJobId(format!(
                "'{}' contains a path separator",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Build a job id from a directory entry name.
    ///
    /// Names that are not valid UTF-8 are rejected.
    pub fn from_file_name(name: &OsStr) -> Result<Self> {
        match name.to_str() {
            Some(s) => Self::new(s),
            None => Err(DomainError::InvalidJobId(format!(
                "'{}' is not valid UTF-8",
                name.to_string_lossy()
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for JobId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

/// Job State, encoded as membership of one of the four state directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Active,
    Done,
    Failed,
}

impl JobState {
    /// Every state, in lifecycle order
    pub const ALL: [JobState; 4] = [
        JobState::Queued,
        JobState::Active,
        JobState::Done,
        JobState::Failed,
    ];

    /// Name of the directory (under `queue/`) holding jobs in this state
    pub fn dir_name(self) -> &'static str {
        match self {
            JobState::Queued => "in",
            JobState::Active => "active",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }

    /// Terminal states are never re-examined by the engine
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }

    /// Transitions the engine is allowed to perform.
    ///
    /// Requeueing out of a terminal state is an operator action and is not
    /// listed here.
    pub fn can_transition_to(self, to: JobState) -> bool {
        matches!(
            (self, to),
            (JobState::Queued, JobState::Active)
                | (JobState::Active, JobState::Done)
                | (JobState::Active, JobState::Failed)
        )
    }

    /// Validate a transition, returning a domain error when it is not allowed
    pub fn check_transition(self, to: JobState) -> Result<()> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Active => write!(f, "ACTIVE"),
            JobState::Done => write!(f, "DONE"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Outcome of handling one dispatched job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub id: JobId,
    /// Directory the job file is believed to be in after handling
    pub final_state: JobState,
    pub activated_at: Option<i64>, // epoch ms
    pub finished_at: Option<i64>,  // epoch ms
}

impl JobReport {
    /// Report for a job that was never moved out of `Queued`
    pub fn not_activated(id: JobId) -> Self {
        Self {
            id,
            final_state: JobState::Queued,
            activated_at: None,
            finished_at: None,
        }
    }

    /// True when the job reached `Done` or `Failed`
    pub fn is_resolved(&self) -> bool {
        self.final_state.is_terminal()
    }
}
