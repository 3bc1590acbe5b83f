//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the course-workflow REST API and the master
//! definition for the OpenAPI specification.
//!
//! Step-advancing endpoints answer `202 Accepted` with the session snapshot taken
//! when the step was claimed; the step itself keeps running in the background and
//! its outcome shows up in the session's `currentStep`/`status`.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use course_workflow_core::{
    LessonEdit, NewSession, OutputType, SuggestionStatus, TopicEdit, TopicOrder, WorkflowError,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        start_research_handler,
        get_session_handler,
        retry_research_handler,
        update_suggestion_handler,
        add_custom_topic_handler,
        generate_more_handler,
        refine_handler,
        update_topic_handler,
        regenerate_topic_handler,
        reorder_topics_handler,
        scripts_handler,
        update_lesson_handler,
        regenerate_lesson_handler,
        set_output_type_handler,
        videos_handler,
        sync_videos_handler,
        generate_presentation_handler,
        get_presentation_handler,
        regenerate_audio_handler,
        questions_handler,
        preview_questions_handler,
        course_lessons_handler,
        update_course_lesson_handler,
        regenerate_course_lesson_handler,
        regenerate_course_presentation_handler,
    ),
    components(
        schemas(
            StartResearchRequest,
            UpdateSuggestionRequest,
            AddCustomTopicRequest,
            UpdateTopicRequest,
            ReorderTopicsRequest,
            TopicOrderPayload,
            UpdateLessonRequest,
            SetOutputTypeRequest,
        )
    ),
    tags(
        (name = "Course Workflow API", description = "Multi-step AI course generation: research, selection, refinement, scripts, videos, questions.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Payload Structs
//=========================================================================================

/// Starts a new workflow session for a topic.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartResearchRequest {
    topic: String,
    #[serde(default)]
    target_audience: String,
    #[serde(default)]
    difficulty_level: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    video_duration_min: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateSuggestionRequest {
    /// `approved`, `rejected` or `pending`.
    status: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AddCustomTopicRequest {
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTopicRequest {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    learning_goals: Vec<String>,
    #[serde(default)]
    estimated_time_min: i32,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicOrderPayload {
    topic_id: Uuid,
    sort_order: i32,
}

#[derive(Deserialize, ToSchema)]
pub struct ReorderTopicsRequest {
    orders: Vec<TopicOrderPayload>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateLessonRequest {
    /// An empty or missing title keeps the current one.
    #[serde(default)]
    title: Option<String>,
    script: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetOutputTypeRequest {
    /// `video` or `presentation`.
    output_type: String,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a workflow error onto the HTTP status the client should see.
pub fn error_status(err: &WorkflowError) -> StatusCode {
    match err {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        WorkflowError::InvalidStep { .. } | WorkflowError::Precondition(_) => StatusCode::BAD_REQUEST,
        WorkflowError::AlreadyInProgress(_) => StatusCode::CONFLICT,
        WorkflowError::CapabilityUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        WorkflowError::Generation(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: WorkflowError) -> (StatusCode, String) {
    let status = error_status(&err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Workflow request failed: {:?}", err);
        return (status, "Internal server error".to_string());
    }
    (status, err.to_string())
}

fn bad_request(message: String) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message)
}

type HandlerResult = Result<axum::response::Response, (StatusCode, String)>;

fn ok<T: serde::Serialize>(body: T) -> HandlerResult {
    Ok(Json(body).into_response())
}

fn accepted<T: serde::Serialize>(body: T) -> HandlerResult {
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

//=========================================================================================
// Session and Suggestion Handlers
//=========================================================================================

/// Create a session and start researching subtopics.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/start",
    request_body = StartResearchRequest,
    responses(
        (status = 202, description = "Session created; research is running"),
        (status = 400, description = "Missing topic")
    )
)]
pub async fn start_research_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<StartResearchRequest>,
) -> HandlerResult {
    let request = NewSession {
        topic: payload.topic,
        target_audience: payload.target_audience,
        difficulty_level: payload.difficulty_level,
        language: payload.language,
        video_duration_min: payload.video_duration_min,
    };
    let launch = app_state.orchestrator.start_research(request).await.map_err(reject)?;
    accepted(launch.detach())
}

/// Get a session with its suggestions, refined topics and lessons.
#[utoipa::path(
    get,
    path = "/api/v1/admin/workflow/{session_id}",
    params(("session_id" = Uuid, Path, description = "Workflow session id")),
    responses(
        (status = 200, description = "The session"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> HandlerResult {
    ok(app_state.orchestrator.get_session(session_id).await.map_err(reject)?)
}

/// Re-run research after it failed.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/research/retry",
    params(("session_id" = Uuid, Path, description = "Workflow session id")),
    responses(
        (status = 202, description = "Research restarted"),
        (status = 400, description = "Research has not failed"),
        (status = 409, description = "Research already running")
    )
)]
pub async fn retry_research_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> HandlerResult {
    let launch = app_state.orchestrator.retry_research(session_id).await.map_err(reject)?;
    accepted(launch.detach())
}

/// Approve or reject a suggestion.
#[utoipa::path(
    put,
    path = "/api/v1/admin/workflow/{session_id}/suggestions/{suggestion_id}",
    request_body = UpdateSuggestionRequest,
    params(
        ("session_id" = Uuid, Path, description = "Workflow session id"),
        ("suggestion_id" = Uuid, Path, description = "Suggestion id")
    ),
    responses(
        (status = 200, description = "Updated suggestion"),
        (status = 400, description = "Unknown status or wrong step"),
        (status = 404, description = "Unknown session or suggestion")
    )
)]
pub async fn update_suggestion_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, suggestion_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateSuggestionRequest>,
) -> HandlerResult {
    let status = payload.status.parse::<SuggestionStatus>().map_err(bad_request)?;
    ok(app_state
        .orchestrator
        .update_suggestion_status(session_id, suggestion_id, status)
        .await
        .map_err(reject)?)
}

/// Add a user-written topic; it is approved immediately.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/suggestions",
    request_body = AddCustomTopicRequest,
    params(("session_id" = Uuid, Path, description = "Workflow session id")),
    responses(
        (status = 201, description = "Created suggestion"),
        (status = 400, description = "Missing title or wrong step")
    )
)]
pub async fn add_custom_topic_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<AddCustomTopicRequest>,
) -> HandlerResult {
    let suggestion = app_state
        .orchestrator
        .add_custom_topic(session_id, &payload.title, &payload.description)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(suggestion)).into_response())
}

/// Ask the model for more suggestions.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/generate-more",
    params(("session_id" = Uuid, Path, description = "Workflow session id")),
    responses(
        (status = 200, description = "The appended suggestions"),
        (status = 502, description = "The model call failed")
    )
)]
pub async fn generate_more_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> HandlerResult {
    ok(app_state
        .orchestrator
        .generate_more_suggestions(session_id)
        .await
        .map_err(reject)?)
}

//=========================================================================================
// Refinement Handlers
//=========================================================================================

/// Refine the approved suggestions into topics.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/refine",
    params(("session_id" = Uuid, Path, description = "Workflow session id")),
    responses(
        (status = 202, description = "Refinement started"),
        (status = 400, description = "No approved suggestions or wrong step"),
        (status = 409, description = "Another step is running")
    )
)]
pub async fn refine_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> HandlerResult {
    let launch = app_state
        .orchestrator
        .proceed_to_refinement(session_id)
        .await
        .map_err(reject)?;
    accepted(launch.detach())
}

/// Replace a refined topic's content.
#[utoipa::path(
    put,
    path = "/api/v1/admin/workflow/{session_id}/topics/{topic_id}",
    request_body = UpdateTopicRequest,
    params(
        ("session_id" = Uuid, Path, description = "Workflow session id"),
        ("topic_id" = Uuid, Path, description = "Refined topic id")
    ),
    responses((status = 200, description = "Updated topic"))
)]
pub async fn update_topic_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, topic_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateTopicRequest>,
) -> HandlerResult {
    let edit = TopicEdit {
        title: payload.title,
        description: payload.description,
        learning_goals: payload.learning_goals,
        estimated_time_min: payload.estimated_time_min,
    };
    ok(app_state
        .orchestrator
        .update_topic(session_id, topic_id, edit)
        .await
        .map_err(reject)?)
}

/// Re-refine one topic from its suggestion.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/topics/{topic_id}/regenerate",
    params(
        ("session_id" = Uuid, Path, description = "Workflow session id"),
        ("topic_id" = Uuid, Path, description = "Refined topic id")
    ),
    responses(
        (status = 200, description = "Regenerated topic"),
        (status = 502, description = "The model call failed")
    )
)]
pub async fn regenerate_topic_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, topic_id)): Path<(Uuid, Uuid)>,
) -> HandlerResult {
    ok(app_state
        .orchestrator
        .regenerate_topic(session_id, topic_id)
        .await
        .map_err(reject)?)
}

/// Apply new sort orders to refined topics.
#[utoipa::path(
    put,
    path = "/api/v1/admin/workflow/{session_id}/topics/reorder",
    request_body = ReorderTopicsRequest,
    params(("session_id" = Uuid, Path, description = "Workflow session id")),
    responses(
        (status = 200, description = "The session with topics in their new order"),
        (status = 404, description = "A topic does not belong to the session")
    )
)]
pub async fn reorder_topics_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<ReorderTopicsRequest>,
) -> HandlerResult {
    let orders: Vec<TopicOrder> = payload
        .orders
        .into_iter()
        .map(|o| TopicOrder {
            topic_id: o.topic_id,
            sort_order: o.sort_order,
        })
        .collect();
    ok(app_state
        .orchestrator
        .reorder_topics(session_id, &orders)
        .await
        .map_err(reject)?)
}

//=========================================================================================
// Script Handlers
//=========================================================================================

/// Generate one lesson script per refined topic.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/scripts",
    params(("session_id" = Uuid, Path, description = "Workflow session id")),
    responses(
        (status = 202, description = "Script generation started"),
        (status = 409, description = "Another step is running")
    )
)]
pub async fn scripts_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> HandlerResult {
    let launch = app_state.orchestrator.proceed_to_scripts(session_id).await.map_err(reject)?;
    accepted(launch.detach())
}

/// Replace a lesson's script.
#[utoipa::path(
    put,
    path = "/api/v1/admin/workflow/{session_id}/lessons/{lesson_id}",
    request_body = UpdateLessonRequest,
    params(
        ("session_id" = Uuid, Path, description = "Workflow session id"),
        ("lesson_id" = Uuid, Path, description = "Lesson id")
    ),
    responses((status = 200, description = "Updated lesson"))
)]
pub async fn update_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, lesson_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateLessonRequest>,
) -> HandlerResult {
    let edit = LessonEdit {
        title: payload.title,
        script: payload.script,
    };
    ok(app_state
        .orchestrator
        .update_lesson(session_id, lesson_id, edit)
        .await
        .map_err(reject)?)
}

/// Regenerate one lesson's script from its topic.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/lessons/{lesson_id}/regenerate",
    params(
        ("session_id" = Uuid, Path, description = "Workflow session id"),
        ("lesson_id" = Uuid, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "Regenerated lesson"),
        (status = 502, description = "The model call failed")
    )
)]
pub async fn regenerate_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> HandlerResult {
    ok(app_state
        .orchestrator
        .regenerate_lesson(session_id, lesson_id)
        .await
        .map_err(reject)?)
}

/// Choose between video and presentation output for a lesson.
#[utoipa::path(
    put,
    path = "/api/v1/admin/workflow/{session_id}/lessons/{lesson_id}/output-type",
    request_body = SetOutputTypeRequest,
    params(
        ("session_id" = Uuid, Path, description = "Workflow session id"),
        ("lesson_id" = Uuid, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "Updated lesson"),
        (status = 400, description = "Unknown output type or wrong step")
    )
)]
pub async fn set_output_type_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, lesson_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SetOutputTypeRequest>,
) -> HandlerResult {
    let output_type = payload.output_type.parse::<OutputType>().map_err(bad_request)?;
    ok(app_state
        .orchestrator
        .set_output_type(session_id, lesson_id, output_type)
        .await
        .map_err(reject)?)
}

//=========================================================================================
// Video Handlers
//=========================================================================================

/// Submit every video lesson to the video service.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/videos",
    params(("session_id" = Uuid, Path, description = "Workflow session id")),
    responses(
        (status = 202, description = "Video generation started"),
        (status = 503, description = "No video service configured")
    )
)]
pub async fn videos_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> HandlerResult {
    let launch = app_state.orchestrator.proceed_to_videos(session_id).await.map_err(reject)?;
    accepted(launch.detach())
}

/// Poll the video service for this session's unfinished videos.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/videos/sync",
    params(("session_id" = Uuid, Path, description = "Workflow session id")),
    responses(
        (status = 200, description = "Counts from the sync pass"),
        (status = 503, description = "No video service configured")
    )
)]
pub async fn sync_videos_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> HandlerResult {
    ok(app_state.orchestrator.sync_videos(session_id).await.map_err(reject)?)
}

//=========================================================================================
// Presentation Handlers
//=========================================================================================

/// Generate (or regenerate) a lesson's slide deck.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/lessons/{lesson_id}/presentation",
    params(
        ("session_id" = Uuid, Path, description = "Workflow session id"),
        ("lesson_id" = Uuid, Path, description = "Lesson id")
    ),
    responses(
        (status = 202, description = "Deck generation started"),
        (status = 400, description = "Lesson is not a presentation lesson"),
        (status = 409, description = "Deck generation already running")
    )
)]
pub async fn generate_presentation_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> HandlerResult {
    let launch = app_state
        .orchestrator
        .generate_presentation(session_id, lesson_id)
        .await
        .map_err(reject)?;
    accepted(launch.detach())
}

/// Get a lesson's slide deck.
#[utoipa::path(
    get,
    path = "/api/v1/admin/workflow/{session_id}/lessons/{lesson_id}/presentation",
    params(
        ("session_id" = Uuid, Path, description = "Workflow session id"),
        ("lesson_id" = Uuid, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "The deck"),
        (status = 404, description = "No deck yet")
    )
)]
pub async fn get_presentation_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> HandlerResult {
    ok(app_state
        .orchestrator
        .get_presentation(session_id, lesson_id)
        .await
        .map_err(reject)?)
}

/// Re-synthesize the narration audio of every slide.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/lessons/{lesson_id}/regenerate-audio",
    params(
        ("session_id" = Uuid, Path, description = "Workflow session id"),
        ("lesson_id" = Uuid, Path, description = "Lesson id")
    ),
    responses(
        (status = 200, description = "The deck with new audio"),
        (status = 503, description = "No speech service configured")
    )
)]
pub async fn regenerate_audio_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> HandlerResult {
    ok(app_state
        .orchestrator
        .regenerate_audio(session_id, lesson_id)
        .await
        .map_err(reject)?)
}

//=========================================================================================
// Question Handlers
//=========================================================================================

/// Generate the quiz and create the course.
#[utoipa::path(
    post,
    path = "/api/v1/admin/workflow/{session_id}/questions",
    params(("session_id" = Uuid, Path, description = "Workflow session id")),
    responses(
        (status = 202, description = "Question generation started"),
        (status = 409, description = "Another step is running")
    )
)]
pub async fn questions_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> HandlerResult {
    let launch = app_state
        .orchestrator
        .proceed_to_questions(session_id)
        .await
        .map_err(reject)?;
    accepted(launch.detach())
}

/// Generate quiz questions without saving them.
#[utoipa::path(
    get,
    path = "/api/v1/admin/workflow/{session_id}/questions/preview",
    params(("session_id" = Uuid, Path, description = "Workflow session id")),
    responses(
        (status = 200, description = "The generated questions"),
        (status = 502, description = "The model call failed")
    )
)]
pub async fn preview_questions_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> HandlerResult {
    ok(app_state
        .orchestrator
        .preview_questions(session_id)
        .await
        .map_err(reject)?)
}

//=========================================================================================
// Course Handlers
//=========================================================================================

/// List a course's lessons with their videos and finished decks.
#[utoipa::path(
    get,
    path = "/api/v1/courses/{course_id}/lessons",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "The course lessons"),
        (status = 404, description = "No workflow produced this course")
    )
)]
pub async fn course_lessons_handler(
    State(app_state): State<Arc<AppState>>,
    Path(course_id): Path<Uuid>,
) -> HandlerResult {
    ok(app_state.orchestrator.course_lessons(course_id).await.map_err(reject)?)
}

/// Replace a course lesson's script.
#[utoipa::path(
    put,
    path = "/api/v1/admin/courses/{course_id}/lessons/{lesson_id}",
    request_body = UpdateLessonRequest,
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        ("lesson_id" = Uuid, Path, description = "Lesson id")
    ),
    responses((status = 200, description = "Updated lesson"))
)]
pub async fn update_course_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateLessonRequest>,
) -> HandlerResult {
    let edit = LessonEdit {
        title: payload.title,
        script: payload.script,
    };
    ok(app_state
        .orchestrator
        .update_course_lesson(course_id, lesson_id, edit)
        .await
        .map_err(reject)?)
}

/// Regenerate a course lesson's script.
#[utoipa::path(
    post,
    path = "/api/v1/admin/courses/{course_id}/lessons/{lesson_id}/regenerate",
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        ("lesson_id" = Uuid, Path, description = "Lesson id")
    ),
    responses((status = 200, description = "Regenerated lesson"))
)]
pub async fn regenerate_course_lesson_handler(
    State(app_state): State<Arc<AppState>>,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> HandlerResult {
    ok(app_state
        .orchestrator
        .regenerate_course_lesson(course_id, lesson_id)
        .await
        .map_err(reject)?)
}

/// Regenerate a course lesson's slide deck.
#[utoipa::path(
    post,
    path = "/api/v1/admin/courses/{course_id}/lessons/{lesson_id}/regenerate-presentation",
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        ("lesson_id" = Uuid, Path, description = "Lesson id")
    ),
    responses((status = 202, description = "Deck generation started"))
)]
pub async fn regenerate_course_presentation_handler(
    State(app_state): State<Arc<AppState>>,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> HandlerResult {
    let launch = app_state
        .orchestrator
        .generate_course_presentation(course_id, lesson_id)
        .await
        .map_err(reject)?;
    accepted(launch.detach())
}
