//! crates/course_workflow_core/src/memory.rs
//!
//! An in-process implementation of the persistence ports. Used by the core's
//! tests and handy for running the service without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    LessonPresentation, LessonScript, MaterializedCourse, OutputType, PresentationStatus,
    RefinedTopic, Slide, SuggestionStatus, TopicOrder, TopicSuggestion, VideoStatus, VideoUpdate,
    WorkflowSession,
};
use crate::ports::{
    CourseCatalog, PortError, PortResult, PresentationStore, WorkflowStore,
};
use crate::state::{JobStatus, WorkflowState};

/// Rows carry an insertion sequence so equal sort orders still read back stably.
#[derive(Default)]
struct Tables {
    seq: u64,
    sessions: HashMap<Uuid, WorkflowSession>,
    suggestions: Vec<(u64, TopicSuggestion)>,
    topics: Vec<(u64, RefinedTopic)>,
    lessons: Vec<(u64, LessonScript)>,
    presentations: Vec<LessonPresentation>,
    courses: Vec<MaterializedCourse>,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn session_mut(&mut self, session_id: Uuid) -> PortResult<&mut WorkflowSession> {
        self.sessions
            .get_mut(&session_id)
            .ok_or_else(|| PortError::NotFound(format!("session {}", session_id)))
    }

    fn lesson_mut(&mut self, lesson_id: Uuid) -> PortResult<&mut LessonScript> {
        self.lessons
            .iter_mut()
            .map(|(_, l)| l)
            .find(|l| l.id == lesson_id)
            .ok_or_else(|| PortError::NotFound(format!("lesson {}", lesson_id)))
    }

    fn assemble(&self, row: &WorkflowSession) -> WorkflowSession {
        let mut session = row.clone();

        let mut suggestions: Vec<_> = self
            .suggestions
            .iter()
            .filter(|(_, s)| s.session_id == row.id)
            .collect();
        suggestions.sort_by_key(|(seq, s)| (s.sort_order, s.created_at, *seq));
        session.suggestions = suggestions.into_iter().map(|(_, s)| s.clone()).collect();

        let mut topics: Vec<_> = self
            .topics
            .iter()
            .filter(|(_, t)| t.session_id == row.id)
            .collect();
        topics.sort_by_key(|(seq, t)| (t.sort_order, t.created_at, *seq));
        session.refined_topics = topics.into_iter().map(|(_, t)| t.clone()).collect();

        let mut lessons: Vec<_> = self
            .lessons
            .iter()
            .filter(|(_, l)| l.session_id == row.id)
            .collect();
        lessons.sort_by_key(|(seq, l)| (l.sort_order, l.created_at, *seq));
        session.lesson_scripts = lessons.into_iter().map(|(_, l)| l.clone()).collect();

        session
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every course written through the catalog port.
    pub async fn courses(&self) -> Vec<MaterializedCourse> {
        self.tables.read().await.courses.clone()
    }

    pub async fn presentations_for(&self, lesson_id: Uuid) -> Vec<LessonPresentation> {
        self.tables
            .read()
            .await
            .presentations
            .iter()
            .filter(|p| p.lesson_id == lesson_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn insert_session(&self, session: &WorkflowSession) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let mut row = session.clone();
        row.suggestions.clear();
        row.refined_topics.clear();
        row.lesson_scripts.clear();
        tables.sessions.insert(row.id, row);
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<WorkflowSession> {
        let tables = self.tables.read().await;
        let row = tables
            .sessions
            .get(&session_id)
            .ok_or_else(|| PortError::NotFound(format!("session {}", session_id)))?;
        Ok(tables.assemble(row))
    }

    async fn find_session_by_course(&self, course_id: Uuid) -> PortResult<WorkflowSession> {
        let tables = self.tables.read().await;
        let row = tables
            .sessions
            .values()
            .find(|s| s.course_id == Some(course_id))
            .ok_or_else(|| PortError::NotFound(format!("session for course {}", course_id)))?;
        Ok(tables.assemble(row))
    }

    async fn sessions_with_pending_videos(&self) -> PortResult<Vec<Uuid>> {
        let tables = self.tables.read().await;
        let mut ids: Vec<Uuid> = tables
            .lessons
            .iter()
            .filter(|(_, l)| {
                l.video_id.is_some()
                    && matches!(
                        l.video_status,
                        Some(VideoStatus::Pending) | Some(VideoStatus::InProgress)
                    )
            })
            .map(|(_, l)| l.session_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn compare_and_set_state(
        &self,
        session_id: Uuid,
        expected: WorkflowState,
        next: WorkflowState,
    ) -> PortResult<bool> {
        let mut tables = self.tables.write().await;
        let session = tables.session_mut(session_id)?;
        if session.state != expected {
            return Ok(false);
        }
        session.state = next;
        session.updated_at = Utc::now();
        Ok(true)
    }

    async fn insert_suggestions(&self, suggestions: &[TopicSuggestion]) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        for suggestion in suggestions {
            let seq = tables.next_seq();
            tables.suggestions.push((seq, suggestion.clone()));
        }
        Ok(())
    }

    async fn get_suggestion(&self, suggestion_id: Uuid) -> PortResult<TopicSuggestion> {
        self.tables
            .read()
            .await
            .suggestions
            .iter()
            .map(|(_, s)| s)
            .find(|s| s.id == suggestion_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("suggestion {}", suggestion_id)))
    }

    async fn update_suggestion_status(
        &self,
        suggestion_id: Uuid,
        status: SuggestionStatus,
    ) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let suggestion = tables
            .suggestions
            .iter_mut()
            .map(|(_, s)| s)
            .find(|s| s.id == suggestion_id)
            .ok_or_else(|| PortError::NotFound(format!("suggestion {}", suggestion_id)))?;
        suggestion.status = status;
        Ok(())
    }

    async fn replace_refined_topics(&self, session_id: Uuid, topics: &[RefinedTopic]) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        tables.topics.retain(|(_, t)| t.session_id != session_id);
        for topic in topics {
            let seq = tables.next_seq();
            tables.topics.push((seq, topic.clone()));
        }
        Ok(())
    }

    async fn get_topic(&self, topic_id: Uuid) -> PortResult<RefinedTopic> {
        self.tables
            .read()
            .await
            .topics
            .iter()
            .map(|(_, t)| t)
            .find(|t| t.id == topic_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("topic {}", topic_id)))
    }

    async fn update_topic(&self, topic: &RefinedTopic) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .topics
            .iter_mut()
            .map(|(_, t)| t)
            .find(|t| t.id == topic.id)
            .ok_or_else(|| PortError::NotFound(format!("topic {}", topic.id)))?;
        row.title = topic.title.clone();
        row.description = topic.description.clone();
        row.learning_goals = topic.learning_goals.clone();
        row.estimated_time_min = topic.estimated_time_min;
        Ok(())
    }

    async fn update_topic_sort_orders(&self, session_id: Uuid, orders: &[TopicOrder]) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        for order in orders {
            if let Some(topic) = tables
                .topics
                .iter_mut()
                .map(|(_, t)| t)
                .find(|t| t.id == order.topic_id && t.session_id == session_id)
            {
                topic.sort_order = order.sort_order;
            }
        }
        Ok(())
    }

    async fn replace_lesson_scripts(&self, session_id: Uuid, lessons: &[LessonScript]) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        tables.lessons.retain(|(_, l)| l.session_id != session_id);
        for lesson in lessons {
            let seq = tables.next_seq();
            tables.lessons.push((seq, lesson.clone()));
        }
        Ok(())
    }

    async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<LessonScript> {
        self.tables
            .read()
            .await
            .lessons
            .iter()
            .map(|(_, l)| l)
            .find(|l| l.id == lesson_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("lesson {}", lesson_id)))
    }

    async fn update_lesson_content(
        &self,
        lesson_id: Uuid,
        title: &str,
        script: &str,
        duration_min: i32,
    ) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let lesson = tables.lesson_mut(lesson_id)?;
        lesson.title = title.to_string();
        lesson.script = script.to_string();
        lesson.duration_min = duration_min;
        Ok(())
    }

    async fn set_output_type(&self, lesson_id: Uuid, output_type: OutputType) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        tables.lesson_mut(lesson_id)?.output_type = Some(output_type);
        Ok(())
    }

    async fn update_lesson_video(&self, lesson_id: Uuid, update: &VideoUpdate) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let lesson = tables.lesson_mut(lesson_id)?;
        lesson.video_id = update.video_id.clone();
        lesson.video_url = update.video_url.clone();
        lesson.video_status = update.video_status;
        lesson.video_error = update.video_error.clone();
        Ok(())
    }

    async fn set_presentation_status(&self, lesson_id: Uuid, status: Option<JobStatus>) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        tables.lesson_mut(lesson_id)?.presentation_status = status;
        Ok(())
    }
}

#[async_trait]
impl PresentationStore for InMemoryStore {
    async fn find_presentation_by_lesson(&self, lesson_id: Uuid) -> PortResult<Option<LessonPresentation>> {
        Ok(self
            .tables
            .read()
            .await
            .presentations
            .iter()
            .find(|p| p.lesson_id == lesson_id)
            .cloned())
    }

    async fn claim_presentation(&self, candidate: &LessonPresentation) -> PortResult<Option<LessonPresentation>> {
        let mut tables = self.tables.write().await;
        match tables
            .presentations
            .iter_mut()
            .find(|p| p.lesson_id == candidate.lesson_id)
        {
            Some(existing) if existing.status == PresentationStatus::Processing => Ok(None),
            Some(existing) => {
                existing.status = PresentationStatus::Processing;
                Ok(Some(existing.clone()))
            }
            None => {
                let mut created = candidate.clone();
                created.status = PresentationStatus::Processing;
                tables.presentations.push(created.clone());
                Ok(Some(created))
            }
        }
    }

    async fn update_presentation(
        &self,
        presentation_id: Uuid,
        slides: &[Slide],
        status: PresentationStatus,
    ) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let presentation = tables
            .presentations
            .iter_mut()
            .find(|p| p.id == presentation_id)
            .ok_or_else(|| PortError::NotFound(format!("presentation {}", presentation_id)))?;
        presentation.slides = slides.to_vec();
        presentation.status = status;
        Ok(())
    }
}

#[async_trait]
impl CourseCatalog for InMemoryStore {
    async fn create_course_for_session(&self, session_id: Uuid, course: &MaterializedCourse) -> PortResult<bool> {
        let mut tables = self.tables.write().await;
        let session = tables.session_mut(session_id)?;
        if session.course_id.is_some() {
            return Ok(false);
        }
        session.course_id = Some(course.course.id);
        session.updated_at = Utc::now();
        tables.courses.push(course.clone());
        Ok(true)
    }
}
