//! crates/course_workflow_core/src/workflow/presentation.rs
//!
//! On-demand slide decks for presentation-typed lessons.
//!
//! One slide-generation call produces the deck; each slide then gets an optional
//! stock photo and optional narration audio. Asset failures are recorded on the
//! slide and never abort the deck. A failed slide-generation call fails the whole
//! deck and keeps no slides.

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{StepLaunch, WorkflowOrchestrator};
use crate::domain::{
    AssetOutcome, LessonPresentation, LessonScript, OutputType, PresentationStatus, Slide,
};
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::SlideDraft;

impl WorkflowOrchestrator {
    /// Generates (or regenerates) the deck for a lesson of the session.
    pub async fn generate_presentation(
        &self,
        session_id: Uuid,
        lesson_id: Uuid,
    ) -> WorkflowResult<StepLaunch<LessonPresentation>> {
        let session = self.get_session(session_id).await?;
        let lesson = self.owned_lesson(session_id, lesson_id).await?;
        self.start_presentation(lesson, session.language).await
    }

    /// Same as `generate_presentation`, addressed through the materialized course.
    pub async fn generate_course_presentation(
        &self,
        course_id: Uuid,
        lesson_id: Uuid,
    ) -> WorkflowResult<StepLaunch<LessonPresentation>> {
        let session = self.session_for_course(course_id).await?;
        let lesson = self.owned_lesson(session.id, lesson_id).await?;
        self.start_presentation(lesson, session.language).await
    }

    pub async fn get_presentation(&self, session_id: Uuid, lesson_id: Uuid) -> WorkflowResult<LessonPresentation> {
        self.get_session(session_id).await?;
        self.owned_lesson(session_id, lesson_id).await?;
        self.presentations
            .find_presentation_by_lesson(lesson_id)
            .await?
            .ok_or(WorkflowError::PresentationNotFound(lesson_id))
    }

    /// Re-synthesizes narration for every slide that has narration text.
    pub async fn regenerate_audio(&self, session_id: Uuid, lesson_id: Uuid) -> WorkflowResult<LessonPresentation> {
        let session = self.get_session(session_id).await?;
        self.owned_lesson(session_id, lesson_id).await?;
        let mut presentation = self
            .presentations
            .find_presentation_by_lesson(lesson_id)
            .await?
            .ok_or(WorkflowError::PresentationNotFound(lesson_id))?;
        if presentation.status == PresentationStatus::Processing {
            return Err(WorkflowError::AlreadyInProgress("presentation generation".to_string()));
        }
        let speech = self
            .capabilities
            .speech()
            .cloned()
            .ok_or(WorkflowError::CapabilityUnavailable("speech synthesis"))?;

        let mut failures = 0;
        for (i, slide) in presentation.slides.iter_mut().enumerate() {
            if slide.script.trim().is_empty() {
                continue;
            }
            match self.external(speech.synthesize(&slide.script, &session.language)).await {
                Ok(url) => {
                    slide.audio_url = Some(url);
                    slide.audio = AssetOutcome::Attached;
                }
                Err(e) => {
                    warn!(presentation_id = %presentation.id, "Audio for slide {} failed: {}", i + 1, e);
                    slide.audio = AssetOutcome::failed(e.to_string());
                    failures += 1;
                }
            }
        }

        self.presentations
            .update_presentation(presentation.id, &presentation.slides, presentation.status)
            .await?;
        info!(
            presentation_id = %presentation.id,
            "Audio regenerated for {} slide(s), {} failure(s).",
            presentation.slides.len(),
            failures
        );
        Ok(presentation)
    }

    async fn start_presentation(
        &self,
        lesson: LessonScript,
        language: String,
    ) -> WorkflowResult<StepLaunch<LessonPresentation>> {
        if lesson.effective_output_type() != OutputType::Presentation {
            return Err(WorkflowError::Precondition(
                "lesson is not set to presentation output".to_string(),
            ));
        }

        let candidate = LessonPresentation {
            id: Uuid::new_v4(),
            lesson_id: lesson.id,
            slides: Vec::new(),
            status: PresentationStatus::Processing,
            created_at: Utc::now(),
        };
        let presentation = self
            .presentations
            .claim_presentation(&candidate)
            .await?
            .ok_or_else(|| WorkflowError::AlreadyInProgress("presentation generation".to_string()))?;
        self.store
            .set_presentation_status(lesson.id, Some(PresentationStatus::Processing.as_job_status()))
            .await?;

        info!(lesson_id = %lesson.id, presentation_id = %presentation.id, "Presentation generation started.");
        let this = self.clone();
        let presentation_id = presentation.id;
        let handle = self.spawn(async move {
            this.build_deck(presentation_id, lesson, language).await;
        });
        Ok(StepLaunch {
            snapshot: presentation,
            handle,
        })
    }

    async fn build_deck(&self, presentation_id: Uuid, lesson: LessonScript, language: String) {
        let drafts = match self
            .generation(
                self.capabilities
                    .content
                    .generate_slides(&lesson.title, &lesson.script, &language),
            )
            .await
        {
            Ok(drafts) => drafts,
            Err(e) => {
                error!(lesson_id = %lesson.id, "Slide generation failed: {}", e);
                self.finish_deck(presentation_id, lesson.id, &[], PresentationStatus::Failed)
                    .await;
                return;
            }
        };

        let count = drafts.len();
        let mut slides = Vec::with_capacity(count);
        for (i, draft) in drafts.into_iter().enumerate() {
            info!(presentation_id = %presentation_id, "Preparing slide {}/{}.", i + 1, count);
            slides.push(self.dress_slide(draft, &language).await);
        }

        self.finish_deck(presentation_id, lesson.id, &slides, PresentationStatus::Completed)
            .await;
    }

    /// Attaches image and audio to one slide, recording each asset's outcome.
    async fn dress_slide(&self, draft: SlideDraft, language: &str) -> Slide {
        let mut slide = draft.into_slide();

        slide.image = match self.capabilities.images() {
            None => AssetOutcome::skipped("image search is not configured"),
            Some(_) if slide.image_keywords.trim().is_empty() => AssetOutcome::skipped("no image keywords"),
            Some(images) => match self.external(images.find_photo(&slide.image_keywords)).await {
                Ok(Some(photo)) => {
                    slide.image_url = Some(photo.url);
                    slide.image_alt = Some(photo.alt);
                    AssetOutcome::Attached
                }
                Ok(None) => AssetOutcome::skipped("no matching photo"),
                Err(e) => {
                    warn!("Image search for '{}' failed: {}", slide.image_keywords, e);
                    AssetOutcome::failed(e.to_string())
                }
            },
        };

        slide.audio = match self.capabilities.speech() {
            None => AssetOutcome::skipped("speech synthesis is not configured"),
            Some(_) if slide.script.trim().is_empty() => AssetOutcome::skipped("no narration"),
            Some(speech) => match self.external(speech.synthesize(&slide.script, language)).await {
                Ok(url) => {
                    slide.audio_url = Some(url);
                    AssetOutcome::Attached
                }
                Err(e) => {
                    warn!("Audio synthesis for slide '{}' failed: {}", slide.title, e);
                    AssetOutcome::failed(e.to_string())
                }
            },
        };

        slide
    }

    /// Persists the deck, then mirrors its status onto the lesson.
    async fn finish_deck(
        &self,
        presentation_id: Uuid,
        lesson_id: Uuid,
        slides: &[Slide],
        status: PresentationStatus,
    ) {
        let status = match self
            .presentations
            .update_presentation(presentation_id, slides, status)
            .await
        {
            Ok(()) => status,
            Err(e) => {
                error!(presentation_id = %presentation_id, "Failed to save slides: {}", e);
                if let Err(e) = self
                    .presentations
                    .update_presentation(presentation_id, &[], PresentationStatus::Failed)
                    .await
                {
                    error!(presentation_id = %presentation_id, "Failed to mark presentation failed: {}", e);
                }
                PresentationStatus::Failed
            }
        };

        if let Err(e) = self
            .store
            .set_presentation_status(lesson_id, Some(status.as_job_status()))
            .await
        {
            error!(lesson_id = %lesson_id, "Failed to mirror presentation status: {}", e);
        }
        info!(
            presentation_id = %presentation_id,
            "Presentation {} with {} slide(s).",
            status.as_str(),
            slides.len()
        );
    }
}
