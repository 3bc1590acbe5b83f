//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the persistence ports from the `core` crate (`WorkflowStore`,
//! `PresentationStore` and `CourseCatalog`). It handles all interactions with the
//! PostgreSQL database using `sqlx`.
//!
//! Step transitions are conditional updates on `(current_step, status)` and every
//! batch write runs in a single transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_workflow_core::domain::{
    LessonPresentation, LessonScript, MaterializedCourse, OutputType, PresentationStatus,
    RefinedTopic, Slide, SuggestionStatus, TopicOrder, TopicSuggestion, VideoStatus, VideoUpdate,
    WorkflowSession,
};
use course_workflow_core::ports::{
    CourseCatalog, PortError, PortResult, PresentationStore, WorkflowStore,
};
use course_workflow_core::state::{JobStatus, WorkflowState};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the persistence ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Loads the owned collections and assembles the aggregate.
    async fn assemble(&self, record: SessionRecord) -> PortResult<WorkflowSession> {
        let suggestions = sqlx::query_as::<_, SuggestionRecord>(
            "SELECT id, session_id, title, description, is_custom, status, sort_order, created_at
             FROM topic_suggestions WHERE session_id = $1
             ORDER BY sort_order, created_at, seq",
        )
        .bind(record.id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(SuggestionRecord::to_domain)
        .collect::<PortResult<Vec<_>>>()?;

        let refined_topics = sqlx::query_as::<_, TopicRecord>(
            "SELECT id, session_id, suggestion_id, title, description, learning_goals,
                    estimated_time_min, sort_order, created_at
             FROM refined_topics WHERE session_id = $1
             ORDER BY sort_order, created_at, seq",
        )
        .bind(record.id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(TopicRecord::to_domain)
        .collect();

        let lesson_scripts = sqlx::query_as::<_, LessonRecord>(&format!(
            "SELECT {} FROM lesson_scripts WHERE session_id = $1 ORDER BY sort_order, created_at, seq",
            LESSON_COLUMNS
        ))
        .bind(record.id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(LessonRecord::to_domain)
        .collect::<PortResult<Vec<_>>>()?;

        record.to_domain(suggestions, refined_topics, lesson_scripts)
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps "no row" to `NotFound` and everything else to `Unexpected`.
fn missing(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        other => unexpected(other),
    }
}

fn ensure_touched(rows: u64, what: impl FnOnce() -> String) -> PortResult<()> {
    if rows == 0 {
        return Err(PortError::NotFound(what()));
    }
    Ok(())
}

fn column<T>(name: &str, raw: &str) -> PortResult<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| PortError::Unexpected(format!("column {}: {}", name, e)))
}

fn optional_column<T>(name: &str, raw: Option<String>) -> PortResult<Option<T>>
where
    T: FromStr<Err = String>,
{
    raw.map(|r| column(name, &r)).transpose()
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    main_topic: String,
    target_audience: String,
    difficulty_level: String,
    language: String,
    video_duration_min: i32,
    current_step: String,
    status: String,
    course_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(
        self,
        suggestions: Vec<TopicSuggestion>,
        refined_topics: Vec<RefinedTopic>,
        lesson_scripts: Vec<LessonScript>,
    ) -> PortResult<WorkflowSession> {
        Ok(WorkflowSession {
            id: self.id,
            main_topic: self.main_topic,
            target_audience: self.target_audience,
            difficulty_level: self.difficulty_level,
            language: self.language,
            video_duration_min: self.video_duration_min,
            state: WorkflowState {
                current_step: column("current_step", &self.current_step)?,
                status: column("status", &self.status)?,
            },
            course_id: self.course_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            suggestions,
            refined_topics,
            lesson_scripts,
        })
    }
}

const SESSION_COLUMNS: &str = "id, main_topic, target_audience, difficulty_level, language, \
    video_duration_min, current_step, status, course_id, created_at, updated_at";

#[derive(FromRow)]
struct SuggestionRecord {
    id: Uuid,
    session_id: Uuid,
    title: String,
    description: String,
    is_custom: bool,
    status: String,
    sort_order: i32,
    created_at: DateTime<Utc>,
}
impl SuggestionRecord {
    fn to_domain(self) -> PortResult<TopicSuggestion> {
        Ok(TopicSuggestion {
            id: self.id,
            session_id: self.session_id,
            title: self.title,
            description: self.description,
            is_custom: self.is_custom,
            status: column::<SuggestionStatus>("status", &self.status)?,
            sort_order: self.sort_order,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct TopicRecord {
    id: Uuid,
    session_id: Uuid,
    suggestion_id: Uuid,
    title: String,
    description: String,
    learning_goals: Json<Vec<String>>,
    estimated_time_min: i32,
    sort_order: i32,
    created_at: DateTime<Utc>,
}
impl TopicRecord {
    fn to_domain(self) -> RefinedTopic {
        RefinedTopic {
            id: self.id,
            session_id: self.session_id,
            suggestion_id: self.suggestion_id,
            title: self.title,
            description: self.description,
            learning_goals: self.learning_goals.0,
            estimated_time_min: self.estimated_time_min,
            sort_order: self.sort_order,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct LessonRecord {
    id: Uuid,
    session_id: Uuid,
    topic_id: Uuid,
    title: String,
    script: String,
    duration_min: i32,
    sort_order: i32,
    output_type: Option<String>,
    video_id: Option<String>,
    video_url: Option<String>,
    video_status: Option<String>,
    video_error: Option<String>,
    presentation_status: Option<String>,
    created_at: DateTime<Utc>,
}
impl LessonRecord {
    fn to_domain(self) -> PortResult<LessonScript> {
        Ok(LessonScript {
            id: self.id,
            session_id: self.session_id,
            topic_id: self.topic_id,
            title: self.title,
            script: self.script,
            duration_min: self.duration_min,
            sort_order: self.sort_order,
            output_type: optional_column::<OutputType>("output_type", self.output_type)?,
            video_id: self.video_id,
            video_url: self.video_url,
            video_status: optional_column::<VideoStatus>("video_status", self.video_status)?,
            video_error: self.video_error,
            presentation_status: optional_column::<JobStatus>(
                "presentation_status",
                self.presentation_status,
            )?,
            created_at: self.created_at,
        })
    }
}

const LESSON_COLUMNS: &str = "id, session_id, topic_id, title, script, duration_min, sort_order, \
    output_type, video_id, video_url, video_status, video_error, presentation_status, created_at";

#[derive(FromRow)]
struct PresentationRecord {
    id: Uuid,
    lesson_id: Uuid,
    slides: Json<Vec<Slide>>,
    status: String,
    created_at: DateTime<Utc>,
}
impl PresentationRecord {
    fn to_domain(self) -> PortResult<LessonPresentation> {
        Ok(LessonPresentation {
            id: self.id,
            lesson_id: self.lesson_id,
            slides: self.slides.0,
            status: column::<PresentationStatus>("status", &self.status)?,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `WorkflowStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl WorkflowStore for DbAdapter {
    async fn insert_session(&self, session: &WorkflowSession) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO course_workflow_sessions
                (id, main_topic, target_audience, difficulty_level, language, video_duration_min,
                 current_step, status, course_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(session.id)
        .bind(&session.main_topic)
        .bind(&session.target_audience)
        .bind(&session.difficulty_level)
        .bind(&session.language)
        .bind(session.video_duration_min)
        .bind(session.state.current_step.as_str())
        .bind(session.state.status.as_str())
        .bind(session.course_id)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<WorkflowSession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM course_workflow_sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing(format!("session {}", session_id)))?;
        self.assemble(record).await
    }

    async fn find_session_by_course(&self, course_id: Uuid) -> PortResult<WorkflowSession> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {} FROM course_workflow_sessions WHERE course_id = $1 LIMIT 1",
            SESSION_COLUMNS
        ))
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing(format!("session for course {}", course_id)))?;
        self.assemble(record).await
    }

    async fn sessions_with_pending_videos(&self) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT session_id FROM lesson_scripts
             WHERE video_id IS NOT NULL AND video_status IN ('pending', 'in_progress')",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn compare_and_set_state(
        &self,
        session_id: Uuid,
        expected: WorkflowState,
        next: WorkflowState,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE course_workflow_sessions
             SET current_step = $1, status = $2, updated_at = NOW()
             WHERE id = $3 AND current_step = $4 AND status = $5",
        )
        .bind(next.current_step.as_str())
        .bind(next.status.as_str())
        .bind(session_id)
        .bind(expected.current_step.as_str())
        .bind(expected.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_suggestions(&self, suggestions: &[TopicSuggestion]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for s in suggestions {
            sqlx::query(
                "INSERT INTO topic_suggestions
                    (id, session_id, title, description, is_custom, status, sort_order, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(s.id)
            .bind(s.session_id)
            .bind(&s.title)
            .bind(&s.description)
            .bind(s.is_custom)
            .bind(s.status.as_str())
            .bind(s.sort_order)
            .bind(s.created_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)
    }

    async fn get_suggestion(&self, suggestion_id: Uuid) -> PortResult<TopicSuggestion> {
        sqlx::query_as::<_, SuggestionRecord>(
            "SELECT id, session_id, title, description, is_custom, status, sort_order, created_at
             FROM topic_suggestions WHERE id = $1",
        )
        .bind(suggestion_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing(format!("suggestion {}", suggestion_id)))?
        .to_domain()
    }

    async fn update_suggestion_status(
        &self,
        suggestion_id: Uuid,
        status: SuggestionStatus,
    ) -> PortResult<()> {
        let result = sqlx::query("UPDATE topic_suggestions SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(suggestion_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_touched(result.rows_affected(), || format!("suggestion {}", suggestion_id))
    }

    async fn replace_refined_topics(&self, session_id: Uuid, topics: &[RefinedTopic]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query("DELETE FROM refined_topics WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        for t in topics {
            sqlx::query(
                "INSERT INTO refined_topics
                    (id, session_id, suggestion_id, title, description, learning_goals,
                     estimated_time_min, sort_order, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(t.id)
            .bind(session_id)
            .bind(t.suggestion_id)
            .bind(&t.title)
            .bind(&t.description)
            .bind(Json(&t.learning_goals))
            .bind(t.estimated_time_min)
            .bind(t.sort_order)
            .bind(t.created_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)
    }

    async fn get_topic(&self, topic_id: Uuid) -> PortResult<RefinedTopic> {
        let record = sqlx::query_as::<_, TopicRecord>(
            "SELECT id, session_id, suggestion_id, title, description, learning_goals,
                    estimated_time_min, sort_order, created_at
             FROM refined_topics WHERE id = $1",
        )
        .bind(topic_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing(format!("topic {}", topic_id)))?;
        Ok(record.to_domain())
    }

    async fn update_topic(&self, topic: &RefinedTopic) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE refined_topics
             SET title = $1, description = $2, learning_goals = $3, estimated_time_min = $4
             WHERE id = $5",
        )
        .bind(&topic.title)
        .bind(&topic.description)
        .bind(Json(&topic.learning_goals))
        .bind(topic.estimated_time_min)
        .bind(topic.id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        ensure_touched(result.rows_affected(), || format!("topic {}", topic.id))
    }

    async fn update_topic_sort_orders(&self, session_id: Uuid, orders: &[TopicOrder]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for order in orders {
            sqlx::query("UPDATE refined_topics SET sort_order = $1 WHERE id = $2 AND session_id = $3")
                .bind(order.sort_order)
                .bind(order.topic_id)
                .bind(session_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)
    }

    async fn replace_lesson_scripts(&self, session_id: Uuid, lessons: &[LessonScript]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query("DELETE FROM lesson_scripts WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        for l in lessons {
            sqlx::query(&format!(
                "INSERT INTO lesson_scripts ({}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
                LESSON_COLUMNS
            ))
            .bind(l.id)
            .bind(session_id)
            .bind(l.topic_id)
            .bind(&l.title)
            .bind(&l.script)
            .bind(l.duration_min)
            .bind(l.sort_order)
            .bind(l.output_type.map(|o| o.as_str()))
            .bind(&l.video_id)
            .bind(&l.video_url)
            .bind(l.video_status.map(|s| s.as_str()))
            .bind(&l.video_error)
            .bind(l.presentation_status.map(|s| s.as_str()))
            .bind(l.created_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)
    }

    async fn get_lesson(&self, lesson_id: Uuid) -> PortResult<LessonScript> {
        sqlx::query_as::<_, LessonRecord>(&format!(
            "SELECT {} FROM lesson_scripts WHERE id = $1",
            LESSON_COLUMNS
        ))
        .bind(lesson_id)
        .fetch_one(&self.pool)
        .await
        .map_err(missing(format!("lesson {}", lesson_id)))?
        .to_domain()
    }

    async fn update_lesson_content(
        &self,
        lesson_id: Uuid,
        title: &str,
        script: &str,
        duration_min: i32,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE lesson_scripts SET title = $1, script = $2, duration_min = $3 WHERE id = $4",
        )
        .bind(title)
        .bind(script)
        .bind(duration_min)
        .bind(lesson_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        ensure_touched(result.rows_affected(), || format!("lesson {}", lesson_id))
    }

    async fn set_output_type(&self, lesson_id: Uuid, output_type: OutputType) -> PortResult<()> {
        let result = sqlx::query("UPDATE lesson_scripts SET output_type = $1 WHERE id = $2")
            .bind(output_type.as_str())
            .bind(lesson_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_touched(result.rows_affected(), || format!("lesson {}", lesson_id))
    }

    async fn update_lesson_video(&self, lesson_id: Uuid, update: &VideoUpdate) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE lesson_scripts
             SET video_id = $1, video_url = $2, video_status = $3, video_error = $4
             WHERE id = $5",
        )
        .bind(&update.video_id)
        .bind(&update.video_url)
        .bind(update.video_status.map(|s| s.as_str()))
        .bind(&update.video_error)
        .bind(lesson_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        ensure_touched(result.rows_affected(), || format!("lesson {}", lesson_id))
    }

    async fn set_presentation_status(&self, lesson_id: Uuid, status: Option<JobStatus>) -> PortResult<()> {
        let result = sqlx::query("UPDATE lesson_scripts SET presentation_status = $1 WHERE id = $2")
            .bind(status.map(|s| s.as_str()))
            .bind(lesson_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        ensure_touched(result.rows_affected(), || format!("lesson {}", lesson_id))
    }
}

//=========================================================================================
// `PresentationStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl PresentationStore for DbAdapter {
    async fn find_presentation_by_lesson(&self, lesson_id: Uuid) -> PortResult<Option<LessonPresentation>> {
        sqlx::query_as::<_, PresentationRecord>(
            "SELECT id, lesson_id, slides, status, created_at
             FROM lesson_presentations WHERE lesson_id = $1",
        )
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(PresentationRecord::to_domain)
        .transpose()
    }

    async fn claim_presentation(&self, candidate: &LessonPresentation) -> PortResult<Option<LessonPresentation>> {
        // The conflict branch only fires for a deck that is not already processing;
        // otherwise no row comes back.
        sqlx::query_as::<_, PresentationRecord>(
            "INSERT INTO lesson_presentations (id, lesson_id, slides, status, created_at)
             VALUES ($1, $2, $3, 'processing', $4)
             ON CONFLICT (lesson_id) DO UPDATE
                SET status = 'processing', updated_at = NOW()
                WHERE lesson_presentations.status <> 'processing'
             RETURNING id, lesson_id, slides, status, created_at",
        )
        .bind(candidate.id)
        .bind(candidate.lesson_id)
        .bind(Json(&candidate.slides))
        .bind(candidate.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(PresentationRecord::to_domain)
        .transpose()
    }

    async fn update_presentation(
        &self,
        presentation_id: Uuid,
        slides: &[Slide],
        status: PresentationStatus,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE lesson_presentations SET slides = $1, status = $2, updated_at = NOW()
             WHERE id = $3",
        )
        .bind(Json(slides))
        .bind(status.as_str())
        .bind(presentation_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        ensure_touched(result.rows_affected(), || format!("presentation {}", presentation_id))
    }
}

//=========================================================================================
// `CourseCatalog` Trait Implementation
//=========================================================================================

#[async_trait]
impl CourseCatalog for DbAdapter {
    async fn create_course_for_session(
        &self,
        session_id: Uuid,
        materialized: &MaterializedCourse,
    ) -> PortResult<bool> {
        let MaterializedCourse {
            course,
            test,
            questions,
        } = materialized;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let linked = sqlx::query(
            "UPDATE course_workflow_sessions SET course_id = $1, updated_at = NOW()
             WHERE id = $2 AND course_id IS NULL",
        )
        .bind(course.id)
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        if linked.rows_affected() != 1 {
            tx.rollback().await.map_err(unexpected)?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO courses
                (id, title, description, video_url, video_id, video_status, pass_percentage, is_published)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(course.id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.video_url)
        .bind(&course.video_id)
        .bind(course.video_status.map(|s| s.as_str()))
        .bind(course.pass_percentage)
        .bind(course.is_published)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO tests (id, course_id, title, description, passing_score)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(test.id)
        .bind(test.course_id)
        .bind(&test.title)
        .bind(&test.description)
        .bind(test.passing_score)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        for q in questions {
            // The kind serializes as {"questionType": .., "questionData": ..}.
            let tagged = serde_json::to_value(&q.kind)
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            let data = tagged
                .get("questionData")
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            sqlx::query(
                "INSERT INTO questions
                    (id, test_id, question_type, question_data, question_text, points, order_index)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(q.id)
            .bind(q.test_id)
            .bind(q.kind.type_name())
            .bind(Json(data))
            .bind(&q.question_text)
            .bind(q.points)
            .bind(q.order_index)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(true)
    }
}
