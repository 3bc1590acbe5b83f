//! crates/course_workflow_core/src/state.rs
//!
//! The workflow state machine. A session's position is a single `WorkflowState`
//! value (coarse step + job status) and every legal move is listed in one
//! transition table, so no operation checks step/status combinations on its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//=========================================================================================
// Step and Status
//=========================================================================================

/// Coarse position of a session in the generation pipeline.
///
/// The declaration order is the pipeline order; `Ord` is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    Research,
    Selection,
    Refinement,
    Script,
    Video,
    Questions,
    Completed,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Research => "research",
            WorkflowStep::Selection => "selection",
            WorkflowStep::Refinement => "refinement",
            WorkflowStep::Script => "script",
            WorkflowStep::Video => "video",
            WorkflowStep::Questions => "questions",
            WorkflowStep::Completed => "completed",
        }
    }

    /// The step a successful worker on this step advances to.
    pub fn next(&self) -> WorkflowStep {
        match self {
            WorkflowStep::Research => WorkflowStep::Selection,
            WorkflowStep::Selection => WorkflowStep::Refinement,
            WorkflowStep::Refinement => WorkflowStep::Script,
            WorkflowStep::Script => WorkflowStep::Video,
            WorkflowStep::Video => WorkflowStep::Questions,
            WorkflowStep::Questions | WorkflowStep::Completed => WorkflowStep::Completed,
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "research" => Ok(WorkflowStep::Research),
            "selection" => Ok(WorkflowStep::Selection),
            "refinement" => Ok(WorkflowStep::Refinement),
            "script" => Ok(WorkflowStep::Script),
            "video" => Ok(WorkflowStep::Video),
            "questions" => Ok(WorkflowStep::Questions),
            "completed" => Ok(WorkflowStep::Completed),
            other => Err(format!("unknown workflow step '{}'", other)),
        }
    }
}

/// Fine-grained state of whatever job is attached to the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

//=========================================================================================
// Combined State and Transition Table
//=========================================================================================

/// The actions that launch a background step worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepAction {
    RetryResearch,
    Refine,
    GenerateScripts,
    GenerateVideos,
    GenerateQuestions,
}

impl StepAction {
    /// The step a worker for this action runs on.
    pub fn step(&self) -> WorkflowStep {
        match self {
            StepAction::RetryResearch => WorkflowStep::Research,
            StepAction::Refine => WorkflowStep::Refinement,
            StepAction::GenerateScripts => WorkflowStep::Script,
            StepAction::GenerateVideos => WorkflowStep::Video,
            StepAction::GenerateQuestions => WorkflowStep::Questions,
        }
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepAction::RetryResearch => "research",
            StepAction::Refine => "refinement",
            StepAction::GenerateScripts => "script generation",
            StepAction::GenerateVideos => "video generation",
            StepAction::GenerateQuestions => "question generation",
        };
        f.write_str(s)
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot start {action} while the workflow is at step '{current}'")]
    InvalidStep {
        action: StepAction,
        current: WorkflowStep,
    },
    #[error("{0} already in progress")]
    AlreadyInProgress(StepAction),
}

/// A session's position: `(step, status)` handled as one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub current_step: WorkflowStep,
    pub status: JobStatus,
}

impl WorkflowState {
    pub fn new(current_step: WorkflowStep, status: JobStatus) -> Self {
        Self {
            current_step,
            status,
        }
    }

    /// The state of a freshly created session whose research worker is starting.
    pub fn researching() -> Self {
        Self::new(WorkflowStep::Research, JobStatus::Processing)
    }

    pub fn is_processing(&self) -> bool {
        self.status == JobStatus::Processing
    }

    /// Validates `action` against the current state and returns the state to claim.
    pub fn begin(&self, action: StepAction) -> Result<WorkflowState, TransitionError> {
        use JobStatus::*;
        use WorkflowStep::*;

        let allowed = match (action, self.current_step, self.status) {
            (StepAction::RetryResearch, Research, Failed) => true,
            (StepAction::Refine, Selection, s) if s != Processing => true,
            (StepAction::Refine, Refinement, Failed) => true,
            (StepAction::GenerateScripts, Script, s) if s != Processing => true,
            (StepAction::GenerateVideos, Video, s) if s != Processing => true,
            (StepAction::GenerateQuestions, Questions, s) if s != Processing => true,
            _ => false,
        };

        if allowed {
            return Ok(WorkflowState::new(action.step(), Processing));
        }
        if self.status == Processing && self.current_step == action.step() {
            return Err(TransitionError::AlreadyInProgress(action));
        }
        Err(TransitionError::InvalidStep {
            action,
            current: self.current_step,
        })
    }

    /// The state after the running worker succeeded.
    pub fn succeed(&self) -> WorkflowState {
        WorkflowState::new(self.current_step.next(), JobStatus::Completed)
    }

    /// The state after the running worker failed; the step is kept for retry.
    pub fn fail(&self) -> WorkflowState {
        WorkflowState::new(self.current_step, JobStatus::Failed)
    }

    /// Succeeds when the session sits on one of `steps` and no worker is running.
    pub fn require_idle_at(&self, steps: &[WorkflowStep]) -> Result<(), StepRequirement> {
        if !steps.contains(&self.current_step) {
            return Err(StepRequirement::WrongStep(self.current_step));
        }
        if self.is_processing() {
            return Err(StepRequirement::Busy(self.current_step));
        }
        Ok(())
    }
}

/// Outcome of `require_idle_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRequirement {
    WrongStep(WorkflowStep),
    Busy(WorkflowStep),
}
