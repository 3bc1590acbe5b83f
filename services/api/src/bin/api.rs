//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        tts::{speech_model, voice_by_name},
        DbAdapter, OpenAiContentAdapter, OpenAiSpeechAdapter, SynthesiaVideoAdapter,
        UnsplashImageAdapter,
    },
    config::Config,
    error::ApiError,
    web::{api_router, poller::{join_video_poller, run_video_poller}, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use course_workflow_core::{Capabilities, WorkflowOrchestrator, WorkflowSettings};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let llm_config = OpenAIConfig::new()
        .with_api_base(&config.llm.base_url)
        .with_api_key(&config.llm.api_key);
    let content_adapter = Arc::new(OpenAiContentAdapter::new(
        Client::with_config(llm_config),
        config.llm.model.clone(),
    ));
    let mut capabilities = Capabilities::new(content_adapter);

    match &config.tts {
        Some(tts) => {
            let mut tts_config = OpenAIConfig::new().with_api_key(&tts.api_key);
            if let Some(base_url) = &tts.base_url {
                tts_config = tts_config.with_api_base(base_url);
            }
            let voice = match tts.voice.as_deref() {
                Some(name) => Some(voice_by_name(name).ok_or_else(|| {
                    ApiError::Internal(format!("Invalid TTS voice specified in config: '{}'", name))
                })?),
                None => None,
            };
            tokio::fs::create_dir_all(&config.audio_output_dir).await?;
            capabilities.speech = Some(Arc::new(OpenAiSpeechAdapter::new(
                Client::with_config(tts_config),
                speech_model(&tts.model),
                voice,
                config.audio_output_dir.clone(),
            )));
        }
        None => warn!("TTS_API_KEY not set; slides will be generated without narration audio."),
    }

    match &config.synthesia {
        Some(synthesia) => {
            let adapter = SynthesiaVideoAdapter::new(synthesia.clone(), config.external_call_timeout)
                .map_err(|e| ApiError::Internal(format!("Failed to build Synthesia client: {}", e)))?;
            capabilities.video = Some(Arc::new(adapter));
        }
        None => warn!("SYNTHESIA_API_KEY not set; video generation is disabled."),
    }

    match &config.unsplash {
        Some(unsplash) => {
            let adapter = UnsplashImageAdapter::new(unsplash.clone(), config.external_call_timeout)
                .map_err(|e| ApiError::Internal(format!("Failed to build Unsplash client: {}", e)))?;
            capabilities.images = Some(Arc::new(adapter));
        }
        None => warn!("UNSPLASH_ACCESS_KEY not set; slides will have no images."),
    }

    // --- 4. Build the Orchestrator & Shared AppState ---
    let video_enabled = capabilities.video.is_some();
    let settings = WorkflowSettings {
        generation_timeout: config.llm.timeout,
        external_call_timeout: config.external_call_timeout,
        video_concurrency: config.video_concurrency,
        ..WorkflowSettings::default()
    };
    let orchestrator = WorkflowOrchestrator::new(
        db_adapter.clone(),
        db_adapter.clone(),
        db_adapter,
        capabilities,
        settings,
    );
    let app_state = Arc::new(AppState {
        orchestrator: orchestrator.clone(),
        config: config.clone(),
    });

    // --- 5. Start the Video Status Poller ---
    let shutdown = CancellationToken::new();
    let poller = video_enabled.then(|| {
        tokio::spawn(run_video_poller(
            orchestrator.clone(),
            config.video_poll_interval,
            shutdown.clone(),
        ))
    });

    // --- 6. Create the Web Router ---
    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>().map_err(|e| {
                ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", origin, e))
            })?)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE]),
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };
    let app = api_router(app_state, cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for the shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
        })
        .await?;

    // --- 8. Drain Background Work ---
    shutdown.cancel();
    if let Some(poller) = poller {
        join_video_poller(poller).await;
    }
    orchestrator.shutdown().await;
    info!("Server stopped.");

    Ok(())
}
