//! crates/course_workflow_core/src/workflow/videos.rs
//!
//! Per-lesson video fan-out and video status synchronization.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{StepLaunch, WorkflowOrchestrator};
use crate::domain::{LessonScript, OutputType, VideoStatus, VideoUpdate, WorkflowSession};
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::VideoGenerationService;
use crate::state::StepAction;

/// Counts from one status synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSyncReport {
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    pub still_rendering: usize,
    pub poll_errors: usize,
}

impl WorkflowOrchestrator {
    /// Launches video creation for every video-typed lesson.
    ///
    /// Presentation lessons are skipped; their decks are generated on demand.
    pub async fn proceed_to_videos(&self, session_id: Uuid) -> WorkflowResult<StepLaunch<WorkflowSession>> {
        let session = self.get_session(session_id).await?;
        session.state.begin(StepAction::GenerateVideos)?;
        if session.lesson_scripts.is_empty() {
            return Err(WorkflowError::Precondition(
                "there are no lesson scripts to render".to_string(),
            ));
        }

        let video_lessons: Vec<LessonScript> = session
            .lesson_scripts
            .iter()
            .filter(|l| l.effective_output_type() == OutputType::Video)
            .cloned()
            .collect();
        let video = match (&self.capabilities.video, video_lessons.is_empty()) {
            (Some(video), _) => Some(Arc::clone(video)),
            (None, true) => None,
            (None, false) => return Err(WorkflowError::CapabilityUnavailable("video generation")),
        };

        let snapshot = self.claim(&session, StepAction::GenerateVideos).await?;
        let skipped = snapshot.lesson_scripts.len() - video_lessons.len();
        if skipped > 0 {
            info!(session_id = %session_id, "Skipping {} presentation lesson(s) in video fan-out.", skipped);
        }

        let this = self.clone();
        Ok(self.launch(snapshot, async move {
            if let Some(video) = video {
                this.render_videos(session_id, video, video_lessons).await;
            }
            Ok(())
        }))
    }

    /// Submits every lesson independently. A failed lesson is recorded on that
    /// lesson and never fails the step.
    async fn render_videos(
        &self,
        session_id: Uuid,
        video: Arc<dyn VideoGenerationService>,
        lessons: Vec<LessonScript>,
    ) {
        let total = lessons.len();
        let failed = stream::iter(lessons)
            .map(|lesson| {
                let video = Arc::clone(&video);
                async move {
                    let update = match self
                        .external(video.create_video(&lesson.script, &lesson.title))
                        .await
                    {
                        Ok(video_id) => {
                            info!(lesson_id = %lesson.id, "Video job {} created.", video_id);
                            VideoUpdate {
                                video_id: Some(video_id),
                                video_status: Some(VideoStatus::Pending),
                                ..VideoUpdate::default()
                            }
                        }
                        Err(e) => {
                            warn!(lesson_id = %lesson.id, "Video creation failed: {}", e);
                            VideoUpdate {
                                video_status: Some(VideoStatus::Failed),
                                video_error: Some(e.to_string()),
                                ..VideoUpdate::default()
                            }
                        }
                    };
                    if let Err(e) = self.store.update_lesson_video(lesson.id, &update).await {
                        error!(lesson_id = %lesson.id, "Failed to record video outcome: {}", e);
                    }
                    update.video_status == Some(VideoStatus::Failed)
                }
            })
            .buffer_unordered(self.settings.video_concurrency.max(1))
            .fold(0usize, |failed, lesson_failed| async move {
                failed + usize::from(lesson_failed)
            })
            .await;

        info!(
            session_id = %session_id,
            "Video fan-out finished: {} of {} lesson(s) failed.",
            failed,
            total
        );
    }

    //=====================================================================================
    // Status synchronization
    //=====================================================================================

    /// Polls the video service for every lesson of the session that is still rendering.
    pub async fn sync_videos(&self, session_id: Uuid) -> WorkflowResult<VideoSyncReport> {
        let session = self.get_session(session_id).await?;
        let video = self
            .capabilities
            .video
            .clone()
            .ok_or(WorkflowError::CapabilityUnavailable("video generation"))?;

        let mut report = VideoSyncReport::default();
        for lesson in &session.lesson_scripts {
            let (Some(video_id), Some(status)) = (&lesson.video_id, lesson.video_status) else {
                continue;
            };
            if status.is_settled() {
                continue;
            }
            report.checked += 1;

            let job = match self.external(video.video_status(video_id)).await {
                Ok(job) => job,
                Err(e) => {
                    warn!(lesson_id = %lesson.id, "Video status poll failed: {}", e);
                    report.poll_errors += 1;
                    continue;
                }
            };

            let update = match job.status {
                VideoStatus::Completed => {
                    report.completed += 1;
                    VideoUpdate {
                        video_id: Some(video_id.clone()),
                        video_url: job.download_url,
                        video_status: Some(VideoStatus::Completed),
                        video_error: None,
                    }
                }
                VideoStatus::Failed => {
                    report.failed += 1;
                    VideoUpdate {
                        video_id: Some(video_id.clone()),
                        video_url: None,
                        video_status: Some(VideoStatus::Failed),
                        video_error: Some("the video service reported a failed render".to_string()),
                    }
                }
                rendering => {
                    report.still_rendering += 1;
                    if rendering == status {
                        continue;
                    }
                    VideoUpdate {
                        video_id: Some(video_id.clone()),
                        video_status: Some(rendering),
                        ..VideoUpdate::default()
                    }
                }
            };
            self.store.update_lesson_video(lesson.id, &update).await?;
        }

        if report.checked > 0 {
            info!(session_id = %session_id, "Video sync: {:?}", report);
        }
        Ok(report)
    }

    /// Runs `sync_videos` for every session with a video still rendering.
    pub async fn sync_all_pending_videos(&self) -> WorkflowResult<VideoSyncReport> {
        let mut total = VideoSyncReport::default();
        if self.capabilities.video.is_none() {
            return Ok(total);
        }
        for session_id in self.store.sessions_with_pending_videos().await? {
            match self.sync_videos(session_id).await {
                Ok(report) => {
                    total.checked += report.checked;
                    total.completed += report.completed;
                    total.failed += report.failed;
                    total.still_rendering += report.still_rendering;
                    total.poll_errors += report.poll_errors;
                }
                Err(e) => error!(session_id = %session_id, "Video sync failed: {}", e),
            }
        }
        Ok(total)
    }
}
