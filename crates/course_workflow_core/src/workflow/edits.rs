//! crates/course_workflow_core/src/workflow/edits.rs
//!
//! Item-level edit and regenerate operations on topics and lessons.

use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

use super::steps::script_input;
use super::WorkflowOrchestrator;
use crate::domain::{
    CourseLesson, LessonEdit, LessonScript, OutputType, PresentationStatus, RefinedTopic,
    TopicEdit, TopicOrder, WorkflowSession,
};
use crate::error::{or_not_found, WorkflowError, WorkflowResult};
use crate::ports::{Audience, PortError, RefineInput};
use crate::state::{JobStatus, WorkflowStep};

/// Topics are editable after refinement and before scripts consume them.
const TOPIC_EDIT_STEPS: &[WorkflowStep] = &[WorkflowStep::Script];
/// Scripts stay editable after the course is finished.
const LESSON_EDIT_STEPS: &[WorkflowStep] = &[WorkflowStep::Video, WorkflowStep::Completed];
const OUTPUT_TYPE_STEPS: &[WorkflowStep] = &[WorkflowStep::Script, WorkflowStep::Video];

impl WorkflowOrchestrator {
    //=====================================================================================
    // Refined topics
    //=====================================================================================

    async fn owned_topic(&self, session_id: Uuid, topic_id: Uuid) -> WorkflowResult<RefinedTopic> {
        let topic = self
            .store
            .get_topic(topic_id)
            .await
            .map_err(or_not_found(WorkflowError::TopicNotFound(topic_id)))?;
        if topic.session_id != session_id {
            return Err(WorkflowError::TopicNotFound(topic_id));
        }
        Ok(topic)
    }

    pub async fn update_topic(
        &self,
        session_id: Uuid,
        topic_id: Uuid,
        edit: TopicEdit,
    ) -> WorkflowResult<RefinedTopic> {
        let session = self.get_session(session_id).await?;
        session
            .state
            .require_idle_at(TOPIC_EDIT_STEPS)
            .map_err(|r| WorkflowError::requirement("edit a topic", r))?;
        if edit.title.trim().is_empty() {
            return Err(WorkflowError::Precondition("a topic title is required".to_string()));
        }

        let mut topic = self.owned_topic(session_id, topic_id).await?;
        topic.title = edit.title;
        topic.description = edit.description;
        topic.learning_goals = edit.learning_goals;
        topic.estimated_time_min = edit.estimated_time_min;
        self.store.update_topic(&topic).await?;
        Ok(topic)
    }

    /// Re-refines one topic from its originating suggestion. Siblings are untouched.
    pub async fn regenerate_topic(&self, session_id: Uuid, topic_id: Uuid) -> WorkflowResult<RefinedTopic> {
        let session = self.get_session(session_id).await?;
        session
            .state
            .require_idle_at(TOPIC_EDIT_STEPS)
            .map_err(|r| WorkflowError::requirement("regenerate a topic", r))?;

        let mut topic = self.owned_topic(session_id, topic_id).await?;
        let suggestion = self
            .store
            .get_suggestion(topic.suggestion_id)
            .await
            .map_err(or_not_found(WorkflowError::SuggestionNotFound(topic.suggestion_id)))?;

        let input = [RefineInput {
            index: 0,
            title: suggestion.title,
            description: suggestion.description,
        }];
        let draft = self
            .generation(
                self.capabilities
                    .content
                    .refine_topics(&Audience::of(&session), &input),
            )
            .await
            .and_then(|drafts| {
                drafts
                    .into_iter()
                    .next()
                    .ok_or_else(|| PortError::Unexpected("refinement returned no topic".to_string()))
            })
            .map_err(WorkflowError::Generation)?;

        topic.title = draft.title;
        topic.description = draft.description;
        topic.learning_goals = draft.learning_goals;
        topic.estimated_time_min = draft.estimated_time_min;
        self.store.update_topic(&topic).await?;
        info!(session_id = %session_id, topic_id = %topic_id, "Topic regenerated.");
        Ok(topic)
    }

    /// Applies new sort orders. Duplicates and gaps are accepted as given.
    pub async fn reorder_topics(
        &self,
        session_id: Uuid,
        orders: &[TopicOrder],
    ) -> WorkflowResult<WorkflowSession> {
        let session = self.get_session(session_id).await?;
        session
            .state
            .require_idle_at(TOPIC_EDIT_STEPS)
            .map_err(|r| WorkflowError::requirement("reorder topics", r))?;

        let known: HashSet<Uuid> = session.refined_topics.iter().map(|t| t.id).collect();
        if let Some(stranger) = orders.iter().find(|o| !known.contains(&o.topic_id)) {
            return Err(WorkflowError::TopicNotFound(stranger.topic_id));
        }

        self.store.update_topic_sort_orders(session_id, orders).await?;
        self.get_session(session_id).await
    }

    //=====================================================================================
    // Lesson scripts
    //=====================================================================================

    pub async fn update_lesson(
        &self,
        session_id: Uuid,
        lesson_id: Uuid,
        edit: LessonEdit,
    ) -> WorkflowResult<LessonScript> {
        let session = self.get_session(session_id).await?;
        session
            .state
            .require_idle_at(LESSON_EDIT_STEPS)
            .map_err(|r| WorkflowError::requirement("edit a lesson", r))?;
        let lesson = self.owned_lesson(session_id, lesson_id).await?;
        self.apply_lesson_edit(lesson, edit).await
    }

    pub async fn regenerate_lesson(&self, session_id: Uuid, lesson_id: Uuid) -> WorkflowResult<LessonScript> {
        let session = self.get_session(session_id).await?;
        session
            .state
            .require_idle_at(LESSON_EDIT_STEPS)
            .map_err(|r| WorkflowError::requirement("regenerate a lesson", r))?;
        let lesson = self.owned_lesson(session_id, lesson_id).await?;
        self.rewrite_lesson(&session, lesson).await
    }

    pub async fn set_output_type(
        &self,
        session_id: Uuid,
        lesson_id: Uuid,
        output_type: OutputType,
    ) -> WorkflowResult<LessonScript> {
        let session = self.get_session(session_id).await?;
        session
            .state
            .require_idle_at(OUTPUT_TYPE_STEPS)
            .map_err(|r| WorkflowError::requirement("change a lesson's output type", r))?;
        let mut lesson = self.owned_lesson(session_id, lesson_id).await?;

        self.store.set_output_type(lesson_id, output_type).await?;
        lesson.output_type = Some(output_type);
        Ok(lesson)
    }

    //---------------------------------------------------------------------------------
    // Course-scoped access for finished sessions
    //---------------------------------------------------------------------------------

    pub async fn update_course_lesson(
        &self,
        course_id: Uuid,
        lesson_id: Uuid,
        edit: LessonEdit,
    ) -> WorkflowResult<LessonScript> {
        let session = self.session_for_course(course_id).await?;
        let lesson = self.owned_lesson(session.id, lesson_id).await?;
        self.apply_lesson_edit(lesson, edit).await
    }

    pub async fn regenerate_course_lesson(&self, course_id: Uuid, lesson_id: Uuid) -> WorkflowResult<LessonScript> {
        let session = self.session_for_course(course_id).await?;
        let lesson = self.owned_lesson(session.id, lesson_id).await?;
        self.rewrite_lesson(&session, lesson).await
    }

    /// Every lesson of a materialized course, with finished decks attached.
    pub async fn course_lessons(&self, course_id: Uuid) -> WorkflowResult<Vec<CourseLesson>> {
        let session = self.session_for_course(course_id).await?;

        let mut lessons = Vec::with_capacity(session.lesson_scripts.len());
        for lesson in session.lesson_scripts {
            let output_type = lesson.effective_output_type();
            let presentation = if output_type == OutputType::Presentation
                && lesson.presentation_status == Some(JobStatus::Completed)
            {
                self.presentations
                    .find_presentation_by_lesson(lesson.id)
                    .await?
                    .filter(|p| p.status == PresentationStatus::Completed)
            } else {
                None
            };
            lessons.push(CourseLesson {
                id: lesson.id,
                title: lesson.title,
                output_type,
                video_url: lesson.video_url,
                video_status: lesson.video_status,
                presentation_status: lesson.presentation_status,
                presentation,
            });
        }
        Ok(lessons)
    }

    //---------------------------------------------------------------------------------
    // Shared helpers
    //---------------------------------------------------------------------------------

    async fn apply_lesson_edit(&self, mut lesson: LessonScript, edit: LessonEdit) -> WorkflowResult<LessonScript> {
        if edit.script.trim().is_empty() {
            return Err(WorkflowError::Precondition("a lesson script cannot be empty".to_string()));
        }
        if let Some(title) = edit.title.filter(|t| !t.trim().is_empty()) {
            lesson.title = title;
        }
        lesson.script = edit.script;

        self.store
            .update_lesson_content(lesson.id, &lesson.title, &lesson.script, lesson.duration_min)
            .await?;
        Ok(lesson)
    }

    /// Regenerates one lesson's script from its refined topic.
    async fn rewrite_lesson(&self, session: &WorkflowSession, mut lesson: LessonScript) -> WorkflowResult<LessonScript> {
        let topic = self
            .store
            .get_topic(lesson.topic_id)
            .await
            .map_err(or_not_found(WorkflowError::TopicNotFound(lesson.topic_id)))?;

        let input = [script_input((0, &topic))];
        let draft = self
            .generation(self.capabilities.content.generate_scripts(
                &Audience::of(session),
                &input,
                session.video_duration_min,
            ))
            .await
            .and_then(|drafts| {
                drafts
                    .into_iter()
                    .next()
                    .ok_or_else(|| PortError::Unexpected("script generation returned no lesson".to_string()))
            })
            .map_err(WorkflowError::Generation)?;

        lesson.title = draft.title;
        lesson.script = draft.script;
        lesson.duration_min = draft.duration_min;
        self.store
            .update_lesson_content(lesson.id, &lesson.title, &lesson.script, lesson.duration_min)
            .await?;
        info!(session_id = %session.id, lesson_id = %lesson.id, "Lesson script regenerated.");
        Ok(lesson)
    }
}
