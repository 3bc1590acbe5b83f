//! crates/course_workflow_core/src/error.rs

use uuid::Uuid;

use crate::ports::PortError;
use crate::state::{StepRequirement, TransitionError, WorkflowStep};

/// Errors returned by workflow operations.
///
/// Synchronous validation errors reach the caller directly; failures of
/// background workers are only ever recorded in session, lesson, or
/// presentation state.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow session {0} not found")]
    SessionNotFound(Uuid),
    #[error("topic suggestion {0} not found")]
    SuggestionNotFound(Uuid),
    #[error("refined topic {0} not found")]
    TopicNotFound(Uuid),
    #[error("lesson {0} not found")]
    LessonNotFound(Uuid),
    #[error("presentation for lesson {0} not found")]
    PresentationNotFound(Uuid),
    #[error("course {0} not found")]
    CourseNotFound(Uuid),
    #[error("cannot {operation} while the workflow is at step '{current}'")]
    InvalidStep {
        operation: String,
        current: WorkflowStep,
    },
    #[error("{0} already in progress")]
    AlreadyInProgress(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("{0} is not configured")]
    CapabilityUnavailable(&'static str),
    #[error("generation failed: {0}")]
    Generation(PortError),
    #[error(transparent)]
    Port(#[from] PortError),
}

impl WorkflowError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            WorkflowError::SessionNotFound(_)
                | WorkflowError::SuggestionNotFound(_)
                | WorkflowError::TopicNotFound(_)
                | WorkflowError::LessonNotFound(_)
                | WorkflowError::PresentationNotFound(_)
                | WorkflowError::CourseNotFound(_)
        )
    }

    /// Translates a step requirement failure for the named operation.
    pub(crate) fn requirement(operation: &str, requirement: StepRequirement) -> Self {
        match requirement {
            StepRequirement::WrongStep(current) => WorkflowError::InvalidStep {
                operation: operation.to_string(),
                current,
            },
            StepRequirement::Busy(current) => {
                WorkflowError::AlreadyInProgress(format!("{} step", current))
            }
        }
    }
}

impl From<TransitionError> for WorkflowError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidStep { action, current } => WorkflowError::InvalidStep {
                operation: format!("start {}", action),
                current,
            },
            TransitionError::AlreadyInProgress(action) => {
                WorkflowError::AlreadyInProgress(action.to_string())
            }
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Maps a store `NotFound` onto the domain-specific not-found error.
pub(crate) fn or_not_found(
    missing: WorkflowError,
) -> impl FnOnce(PortError) -> WorkflowError {
    move |err| match err {
        PortError::NotFound(_) => missing,
        other => WorkflowError::Port(other),
    }
}
