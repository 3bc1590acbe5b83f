pub mod poller;
pub mod rest;
pub mod state;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};

use rest::*;
use state::AppState;
use crate::adapters::tts::AUDIO_URL_PREFIX;

/// Builds the full `/api/v1` router, including the static narration audio.
pub fn api_router(app_state: Arc<AppState>, cors: CorsLayer) -> Router {
    let workflow = Router::new()
        .route("/start", post(start_research_handler))
        // Static segment; matched ahead of the `{session_id}` capture below.
        .route("/{session_id}", get(get_session_handler))
        .route("/{session_id}/research/retry", post(retry_research_handler))
        .route("/{session_id}/suggestions", post(add_custom_topic_handler))
        .route(
            "/{session_id}/suggestions/{suggestion_id}",
            put(update_suggestion_handler),
        )
        .route("/{session_id}/generate-more", post(generate_more_handler))
        .route("/{session_id}/refine", post(refine_handler))
        .route("/{session_id}/topics/reorder", put(reorder_topics_handler))
        .route("/{session_id}/topics/{topic_id}", put(update_topic_handler))
        .route(
            "/{session_id}/topics/{topic_id}/regenerate",
            post(regenerate_topic_handler),
        )
        .route("/{session_id}/scripts", post(scripts_handler))
        .route("/{session_id}/lessons/{lesson_id}", put(update_lesson_handler))
        .route(
            "/{session_id}/lessons/{lesson_id}/regenerate",
            post(regenerate_lesson_handler),
        )
        .route(
            "/{session_id}/lessons/{lesson_id}/output-type",
            put(set_output_type_handler),
        )
        .route(
            "/{session_id}/lessons/{lesson_id}/presentation",
            post(generate_presentation_handler).get(get_presentation_handler),
        )
        .route(
            "/{session_id}/lessons/{lesson_id}/regenerate-audio",
            post(regenerate_audio_handler),
        )
        .route("/{session_id}/videos", post(videos_handler))
        .route("/{session_id}/videos/sync", post(sync_videos_handler))
        .route("/{session_id}/questions", post(questions_handler))
        .route("/{session_id}/questions/preview", get(preview_questions_handler));

    let courses = Router::new()
        .route(
            "/admin/courses/{course_id}/lessons/{lesson_id}",
            put(update_course_lesson_handler),
        )
        .route(
            "/admin/courses/{course_id}/lessons/{lesson_id}/regenerate",
            post(regenerate_course_lesson_handler),
        )
        .route(
            "/admin/courses/{course_id}/lessons/{lesson_id}/regenerate-presentation",
            post(regenerate_course_presentation_handler),
        )
        .route("/courses/{course_id}/lessons", get(course_lessons_handler));

    let audio_dir = app_state.config.audio_output_dir.clone();
    let api = Router::new()
        .nest("/admin/workflow", workflow)
        .merge(courses)
        .with_state(app_state);

    Router::new()
        .nest("/api/v1", api)
        .nest_service(AUDIO_URL_PREFIX, ServeDir::new(audio_dir))
        .layer(cors)
}
