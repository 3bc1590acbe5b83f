//! crates/course_workflow_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the workflow core.
//! These traits form the boundary of the hexagonal architecture: the orchestrator
//! only talks to generation capabilities and storage through them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    GeneratedQuestion, LessonPresentation, LessonScript, MaterializedCourse, OutputType,
    PresentationStatus, RefinedTopic, Slide, SuggestionStatus, TopicOrder, TopicSuggestion,
    VideoStatus, VideoUpdate, WorkflowSession,
};
use crate::state::{JobStatus, WorkflowState};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Call timed out after {0}s")]
    Timeout(u64),
    #[error("Capability unavailable: {0}")]
    Unavailable(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Generation Requests and Drafts
//=========================================================================================

/// Audience parameters shared by every language-model prompt of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audience {
    pub topic: String,
    pub target_audience: String,
    pub difficulty_level: String,
    pub language: String,
}

impl Audience {
    pub fn of(session: &WorkflowSession) -> Self {
        Self {
            topic: session.main_topic.clone(),
            target_audience: session.target_audience.clone(),
            difficulty_level: session.difficulty_level.clone(),
            language: session.language.clone(),
        }
    }
}

/// A researched subtopic candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDraft {
    pub title: String,
    pub description: String,
}

/// One approved suggestion handed to refinement. `index` is echoed back as `source_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineInput {
    pub index: usize,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinedDraft {
    pub source_index: Option<usize>,
    pub original_title: String,
    pub title: String,
    pub description: String,
    pub learning_goals: Vec<String>,
    pub estimated_time_min: i32,
}

/// One refined topic handed to script generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInput {
    pub index: usize,
    pub title: String,
    pub description: String,
    pub learning_goals: Vec<String>,
    pub estimated_time_min: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDraft {
    pub source_index: Option<usize>,
    pub topic_title: String,
    pub title: String,
    pub script: String,
    pub duration_min: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideDraft {
    pub title: String,
    pub content: String,
    pub script: String,
    pub image_keywords: String,
}

impl SlideDraft {
    /// A slide with no assets resolved yet.
    pub fn into_slide(self) -> Slide {
        Slide {
            title: self.title,
            content: self.content,
            script: self.script,
            image_keywords: self.image_keywords,
            ..Slide::default()
        }
    }
}

/// Progress of an externally rendered video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoJob {
    pub status: VideoStatus,
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub url: String,
    pub alt: String,
}

//=========================================================================================
// Generation Ports
//=========================================================================================

/// The language-model capability, one method per prompt shape.
#[async_trait]
pub trait ContentGenerationService: Send + Sync {
    async fn research_topics(&self, audience: &Audience, count: usize) -> PortResult<Vec<TopicDraft>>;

    async fn refine_topics(
        &self,
        audience: &Audience,
        topics: &[RefineInput],
    ) -> PortResult<Vec<RefinedDraft>>;

    async fn generate_scripts(
        &self,
        audience: &Audience,
        topics: &[ScriptInput],
        video_duration_min: i32,
    ) -> PortResult<Vec<ScriptDraft>>;

    async fn generate_slides(
        &self,
        lesson_title: &str,
        script: &str,
        language: &str,
    ) -> PortResult<Vec<SlideDraft>>;

    async fn generate_quiz(
        &self,
        topic: &str,
        scripts: &[String],
        language: &str,
        count: usize,
    ) -> PortResult<Vec<GeneratedQuestion>>;
}

#[async_trait]
pub trait VideoGenerationService: Send + Sync {
    /// Submits a render job and returns the provider's video id.
    async fn create_video(&self, script: &str, title: &str) -> PortResult<String>;

    async fn video_status(&self, video_id: &str) -> PortResult<VideoJob>;
}

#[async_trait]
pub trait SpeechSynthesisService: Send + Sync {
    /// Synthesizes narration and returns a URL the audio can be fetched from.
    async fn synthesize(&self, text: &str, language: &str) -> PortResult<String>;

    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait ImageSearchService: Send + Sync {
    /// Returns the best matching photo, or `None` when the search found nothing.
    async fn find_photo(&self, keywords: &str) -> PortResult<Option<Photo>>;

    fn is_available(&self) -> bool {
        true
    }
}

//=========================================================================================
// Persistence Ports
//=========================================================================================

/// Single persistence gateway for sessions and their owned collections.
///
/// Child lookups (`get_suggestion`, `get_topic`, `get_lesson`) do not filter by
/// session; the orchestrator checks ownership itself.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    // --- Sessions ---
    async fn insert_session(&self, session: &WorkflowSession) -> PortResult<()>;

    /// Loads a session with its suggestions, topics and lessons in read order.
    async fn get_session(&self, session_id: Uuid) -> PortResult<WorkflowSession>;

    async fn find_session_by_course(&self, course_id: Uuid) -> PortResult<WorkflowSession>;

    /// Ids of sessions with at least one lesson whose video is still rendering.
    async fn sessions_with_pending_videos(&self) -> PortResult<Vec<Uuid>>;

    /// Moves the session to `next` only if it is still at `expected`. Returns whether it moved.
    async fn compare_and_set_state(
        &self,
        session_id: Uuid,
        expected: WorkflowState,
        next: WorkflowState,
    ) -> PortResult<bool>;

    // --- Suggestions ---
    async fn insert_suggestions(&self, suggestions: &[TopicSuggestion]) -> PortResult<()>;

    async fn get_suggestion(&self, suggestion_id: Uuid) -> PortResult<TopicSuggestion>;

    async fn update_suggestion_status(
        &self,
        suggestion_id: Uuid,
        status: SuggestionStatus,
    ) -> PortResult<()>;

    // --- Refined topics ---
    /// Replaces every refined topic of the session in one write.
    async fn replace_refined_topics(&self, session_id: Uuid, topics: &[RefinedTopic]) -> PortResult<()>;

    async fn get_topic(&self, topic_id: Uuid) -> PortResult<RefinedTopic>;

    /// Overwrites the content fields of one topic; sort order is left alone.
    async fn update_topic(&self, topic: &RefinedTopic) -> PortResult<()>;

    async fn update_topic_sort_orders(&self, session_id: Uuid, orders: &[TopicOrder]) -> PortResult<()>;

    // --- Lesson scripts ---
    /// Replaces every lesson of the session in one write.
    async fn replace_lesson_scripts(&self, session_id: Uuid, lessons: &[LessonScript]) -> PortResult<()>;

    async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<LessonScript>;

    async fn update_lesson_content(
        &self,
        lesson_id: Uuid,
        title: &str,
        script: &str,
        duration_min: i32,
    ) -> PortResult<()>;

    async fn set_output_type(&self, lesson_id: Uuid, output_type: OutputType) -> PortResult<()>;

    async fn update_lesson_video(&self, lesson_id: Uuid, update: &VideoUpdate) -> PortResult<()>;

    async fn set_presentation_status(&self, lesson_id: Uuid, status: Option<JobStatus>) -> PortResult<()>;
}

/// Slide decks, stored apart from the session aggregate and keyed by lesson.
#[async_trait]
pub trait PresentationStore: Send + Sync {
    async fn find_presentation_by_lesson(&self, lesson_id: Uuid) -> PortResult<Option<LessonPresentation>>;

    /// Stores `candidate` as the lesson's deck, or moves the existing deck to
    /// `processing` keeping its slides. Returns `None`, writing nothing, while the
    /// existing deck is already `processing`.
    async fn claim_presentation(&self, candidate: &LessonPresentation) -> PortResult<Option<LessonPresentation>>;

    async fn update_presentation(
        &self,
        presentation_id: Uuid,
        slides: &[Slide],
        status: PresentationStatus,
    ) -> PortResult<()>;
}

/// The permanent course records owned by the wider platform.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Links the course to the session and writes the course, its test and every
    /// question, all as one unit. Returns `false`, writing nothing, when the session
    /// already has a course.
    async fn create_course_for_session(&self, session_id: Uuid, course: &MaterializedCourse) -> PortResult<bool>;
}
