//! Per-candidate download task and its status transitions.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Status of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Not attempted yet.
    Pending,
    /// An attempt is running.
    InProgress,
    /// The artifact was written and validated. Terminal.
    Succeeded,
    /// The last attempt failed. Only the recovery sweep reopens it.
    Failed,
}

impl TaskStatus {
    /// Returns the lowercase label used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected status transition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The transition is not allowed from the current status.
    #[error("task {candidate_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The task's candidate id.
        candidate_id: String,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },
}

/// One candidate's download, created when the candidate list is frozen.
///
/// Transitions: `Pending -> InProgress -> {Succeeded | Failed}`, plus
/// `Failed -> InProgress` through [`DownloadTask::reopen`]. `Succeeded` never
/// moves again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    candidate_id: String,
    destination: PathBuf,
    status: TaskStatus,
    last_error: Option<String>,
}

impl DownloadTask {
    /// Creates a pending task.
    #[must_use]
    pub fn new(candidate_id: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            destination: destination.into(),
            status: TaskStatus::Pending,
            last_error: None,
        }
    }

    /// The candidate this task downloads.
    #[must_use]
    pub fn candidate_id(&self) -> &str {
        &self.candidate_id
    }

    /// Where the artifact is written.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Message of the most recent failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// `Pending -> InProgress`.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] from any other status.
    pub fn start(&mut self) -> Result<(), TaskError> {
        self.transition(TaskStatus::Pending, TaskStatus::InProgress)
    }

    /// `InProgress -> Succeeded`.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] from any other status.
    pub fn succeed(&mut self) -> Result<(), TaskError> {
        self.transition(TaskStatus::InProgress, TaskStatus::Succeeded)
    }

    /// `InProgress -> Failed`, recording `error`.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] from any other status.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TaskError> {
        self.transition(TaskStatus::InProgress, TaskStatus::Failed)?;
        self.last_error = Some(error.into());
        Ok(())
    }

    /// `Failed -> InProgress`, for a recovery sweep attempt.
    ///
    /// # Errors
    ///
    /// [`TaskError::InvalidTransition`] from any other status.
    pub fn reopen(&mut self) -> Result<(), TaskError> {
        self.transition(TaskStatus::Failed, TaskStatus::InProgress)
    }

    fn transition(&mut self, expected: TaskStatus, to: TaskStatus) -> Result<(), TaskError> {
        if self.status != expected {
            return Err(TaskError::InvalidTransition {
                candidate_id: self.candidate_id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
