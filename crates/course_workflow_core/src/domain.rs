//! crates/course_workflow_core/src/domain.rs
//!
//! Defines the pure, core data structures of the course-generation workflow.
//! These structs are independent of any database; the serde derives only fix
//! the JSON shape seen by API clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::state::{JobStatus, WorkflowState};

//=========================================================================================
// Workflow Session Aggregate
//=========================================================================================

/// One end-to-end run of the course-generation workflow for one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSession {
    pub id: Uuid,
    pub main_topic: String,
    pub target_audience: String,
    pub difficulty_level: String,
    pub language: String,
    pub video_duration_min: i32,
    #[serde(flatten)]
    pub state: WorkflowState,
    pub course_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub suggestions: Vec<TopicSuggestion>,
    pub refined_topics: Vec<RefinedTopic>,
    pub lesson_scripts: Vec<LessonScript>,
}

impl WorkflowSession {
    pub fn approved_suggestions(&self) -> Vec<TopicSuggestion> {
        self.suggestions
            .iter()
            .filter(|s| s.status == SuggestionStatus::Approved)
            .cloned()
            .collect()
    }

    /// The sort order the next appended suggestion should take.
    pub fn next_suggestion_order(&self) -> i32 {
        self.suggestions
            .iter()
            .map(|s| s.sort_order + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Parameters for starting a new session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub topic: String,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub difficulty_level: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub video_duration_min: i32,
}

//=========================================================================================
// Suggestions and Refined Topics
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Approved => "approved",
            SuggestionStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for SuggestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SuggestionStatus::Pending),
            "approved" => Ok(SuggestionStatus::Approved),
            "rejected" => Ok(SuggestionStatus::Rejected),
            other => Err(format!("unknown suggestion status '{}'", other)),
        }
    }
}

/// A candidate subtopic proposed by research or added by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSuggestion {
    pub id: Uuid,
    pub session_id: Uuid,
    pub title: String,
    pub description: String,
    pub is_custom: bool,
    pub status: SuggestionStatus,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// An approved suggestion expanded with learning goals and a time estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinedTopic {
    pub id: Uuid,
    pub session_id: Uuid,
    pub suggestion_id: Uuid,
    pub title: String,
    pub description: String,
    pub learning_goals: Vec<String>,
    pub estimated_time_min: i32,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// User-supplied replacement content for a refined topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicEdit {
    pub title: String,
    pub description: String,
    pub learning_goals: Vec<String>,
    pub estimated_time_min: i32,
}

/// One entry of a bulk reorder request. Duplicate sort orders are accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicOrder {
    pub topic_id: Uuid,
    pub sort_order: i32,
}

//=========================================================================================
// Lesson Scripts
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    Video,
    Presentation,
}

impl OutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputType::Video => "video",
            OutputType::Presentation => "presentation",
        }
    }
}

impl FromStr for OutputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(OutputType::Video),
            "presentation" => Ok(OutputType::Presentation),
            other => Err(format!("unknown output type '{}'", other)),
        }
    }
}

/// Lifecycle of an externally rendered lesson video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::InProgress => "in_progress",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    /// Accepts both our own names and the video service's vocabulary (`complete`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VideoStatus::Pending),
            "in_progress" | "processing" => Ok(VideoStatus::InProgress),
            "completed" | "complete" => Ok(VideoStatus::Completed),
            "failed" | "rejected" => Ok(VideoStatus::Failed),
            other => Err(format!("unknown video status '{}'", other)),
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Narration/content for one refined topic, destined for video or slides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonScript {
    pub id: Uuid,
    pub session_id: Uuid,
    pub topic_id: Uuid,
    pub title: String,
    pub script: String,
    pub duration_min: i32,
    pub sort_order: i32,
    pub output_type: Option<OutputType>,
    pub video_id: Option<String>,
    pub video_url: Option<String>,
    pub video_status: Option<VideoStatus>,
    pub video_error: Option<String>,
    pub presentation_status: Option<JobStatus>,
    pub created_at: DateTime<Utc>,
}

impl LessonScript {
    /// Lessons without an explicit choice are rendered as video.
    pub fn effective_output_type(&self) -> OutputType {
        self.output_type.unwrap_or(OutputType::Video)
    }
}

/// User-supplied replacement for a lesson's narration. An empty title keeps the old one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonEdit {
    #[serde(default)]
    pub title: Option<String>,
    pub script: String,
}

/// Video bookkeeping written by the fan-out worker and the status poller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoUpdate {
    pub video_id: Option<String>,
    pub video_url: Option<String>,
    pub video_status: Option<VideoStatus>,
    pub video_error: Option<String>,
}

//=========================================================================================
// Presentations
//=========================================================================================

/// Per-asset result for a slide's image or audio.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssetOutcome {
    Attached,
    #[default]
    Pending,
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

impl AssetOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        AssetOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        AssetOutcome::Failed {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub title: String,
    pub content: String,
    pub script: String,
    pub image_keywords: String,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub image_alt: Option<String>,
    #[serde(default)]
    pub audio: AssetOutcome,
    #[serde(default)]
    pub image: AssetOutcome,
}

/// Status of a slide deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationStatus {
    Processing,
    Completed,
    Failed,
}

impl PresentationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresentationStatus::Processing => "processing",
            PresentationStatus::Completed => "completed",
            PresentationStatus::Failed => "failed",
        }
    }

    /// The mirrored value on the owning lesson's `presentation_status`.
    pub fn as_job_status(&self) -> JobStatus {
        match self {
            PresentationStatus::Processing => JobStatus::Processing,
            PresentationStatus::Completed => JobStatus::Completed,
            PresentationStatus::Failed => JobStatus::Failed,
        }
    }
}

impl FromStr for PresentationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(PresentationStatus::Processing),
            "completed" => Ok(PresentationStatus::Completed),
            "failed" => Ok(PresentationStatus::Failed),
            other => Err(format!("unknown presentation status '{}'", other)),
        }
    }
}

/// A deck of slides for one presentation-typed lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPresentation {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub slides: Vec<Slide>,
    pub status: PresentationStatus,
    pub created_at: DateTime<Utc>,
}

/// A lesson of a materialized course, joined with its presentation when one is ready.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseLesson {
    pub id: Uuid,
    pub title: String,
    pub output_type: OutputType,
    pub video_url: Option<String>,
    pub video_status: Option<VideoStatus>,
    pub presentation_status: Option<JobStatus>,
    pub presentation: Option<LessonPresentation>,
}

//=========================================================================================
// Course, Test, and Question Records
//=========================================================================================

/// The permanent course record handed to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video_url: Option<String>,
    pub video_id: Option<String>,
    pub video_status: Option<VideoStatus>,
    pub pass_percentage: i32,
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    pub passing_score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoiceData {
    pub options: Vec<String>,
    pub correct_indices: Vec<usize>,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragDropData {
    pub items: Vec<String>,
    pub drop_zones: Vec<String>,
    #[serde(default)]
    pub correct_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillBlankData {
    /// Uses `{{blank}}` as placeholder.
    pub template: String,
    pub blanks: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingData {
    pub left_items: Vec<String>,
    pub right_items: Vec<String>,
    #[serde(default)]
    pub correct_pairs: BTreeMap<String, String>,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderingData {
    pub items: Vec<String>,
    pub correct_order: Vec<usize>,
    #[serde(default)]
    pub explanation: String,
}

/// A question body, typed per question kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "questionType", content = "questionData", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice(MultipleChoiceData),
    DragDrop(DragDropData),
    FillBlank(FillBlankData),
    Matching(MatchingData),
    Ordering(OrderingData),
}

impl QuestionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice(_) => "multiple_choice",
            QuestionKind::DragDrop(_) => "drag_drop",
            QuestionKind::FillBlank(_) => "fill_blank",
            QuestionKind::Matching(_) => "matching",
            QuestionKind::Ordering(_) => "ordering",
        }
    }
}

/// A question as produced by quiz generation, before it belongs to a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub question_text: String,
    pub points: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub test_id: Uuid,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub question_text: String,
    pub points: i32,
    pub order_index: i32,
}

/// Everything written to the catalog by one materialization.
#[derive(Debug, Clone)]
pub struct MaterializedCourse {
    pub course: Course,
    pub test: Test,
    pub questions: Vec<Question>,
}
