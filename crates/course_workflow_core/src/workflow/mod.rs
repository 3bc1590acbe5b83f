//! crates/course_workflow_core/src/workflow/mod.rs
//!
//! The workflow orchestrator. It owns the state machine, sequences calls to the
//! generation capabilities and writes every result through the persistence ports.
//!
//! Step-advancing operations are synchronous up to the moment the session is
//! claimed (`status = processing`); the remainder runs as a tracked background
//! task whose handle is returned to the caller.

mod edits;
mod presentation;
mod steps;
mod videos;

#[cfg(test)]
mod tests;

pub use videos::VideoSyncReport;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{LessonScript, WorkflowSession};
use crate::error::{or_not_found, WorkflowError, WorkflowResult};
use crate::ports::{
    ContentGenerationService, CourseCatalog, ImageSearchService, PortError, PortResult,
    PresentationStore, SpeechSynthesisService, VideoGenerationService, WorkflowStore,
};
use crate::state::{StepAction, WorkflowState};

//=========================================================================================
// Settings and Capabilities
//=========================================================================================

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Suggestions requested when research starts.
    pub research_count: usize,
    /// Suggestions requested by "generate more".
    pub more_suggestions_count: usize,
    pub quiz_question_count: usize,
    /// Upper bound for one language-model call.
    pub generation_timeout: Duration,
    /// Upper bound for one video, speech, or image call.
    pub external_call_timeout: Duration,
    /// Lessons submitted to the video service at the same time.
    pub video_concurrency: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            research_count: 6,
            more_suggestions_count: 4,
            quiz_question_count: 10,
            generation_timeout: Duration::from_secs(300),
            external_call_timeout: Duration::from_secs(60),
            video_concurrency: 4,
        }
    }
}

/// The generation capabilities. Only the language model is mandatory.
#[derive(Clone)]
pub struct Capabilities {
    pub content: Arc<dyn ContentGenerationService>,
    pub video: Option<Arc<dyn VideoGenerationService>>,
    pub speech: Option<Arc<dyn SpeechSynthesisService>>,
    pub images: Option<Arc<dyn ImageSearchService>>,
}

impl Capabilities {
    pub fn new(content: Arc<dyn ContentGenerationService>) -> Self {
        Self {
            content,
            video: None,
            speech: None,
            images: None,
        }
    }

    fn speech(&self) -> Option<&Arc<dyn SpeechSynthesisService>> {
        self.speech.as_ref().filter(|s| s.is_available())
    }

    fn images(&self) -> Option<&Arc<dyn ImageSearchService>> {
        self.images.as_ref().filter(|i| i.is_available())
    }
}

//=========================================================================================
// Background Task Handles
//=========================================================================================

/// A supervised background worker.
pub struct StepHandle(JoinHandle<()>);

impl StepHandle {
    /// Waits for the worker to finish. The worker records its own outcome in storage.
    pub async fn finished(self) {
        if let Err(e) = self.0.await {
            error!("Workflow worker terminated abnormally: {}", e);
        }
    }

    /// Lets the worker run on without anyone waiting for it.
    pub fn detach(self) {}
}

/// The snapshot taken when a background step was claimed, plus its worker.
#[must_use = "the worker handle should be awaited or explicitly detached"]
pub struct StepLaunch<T> {
    pub snapshot: T,
    pub handle: StepHandle,
}

impl<T> StepLaunch<T> {
    /// Detaches the worker and returns the snapshot.
    pub fn detach(self) -> T {
        self.handle.detach();
        self.snapshot
    }
}

//=========================================================================================
// Orchestrator
//=========================================================================================

#[derive(Clone)]
pub struct WorkflowOrchestrator {
    store: Arc<dyn WorkflowStore>,
    presentations: Arc<dyn PresentationStore>,
    catalog: Arc<dyn CourseCatalog>,
    capabilities: Capabilities,
    settings: WorkflowSettings,
    tracker: TaskTracker,
}

impl WorkflowOrchestrator {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        presentations: Arc<dyn PresentationStore>,
        catalog: Arc<dyn CourseCatalog>,
        capabilities: Capabilities,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            presentations,
            catalog,
            capabilities,
            settings,
            tracker: TaskTracker::new(),
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Stops accepting new workers and waits for the running ones.
    pub async fn shutdown(&self) {
        self.tracker.close();
        info!("Waiting for {} workflow worker(s) to finish.", self.tracker.len());
        self.tracker.wait().await;
    }

    /// Loads a session with its suggestions, topics and lessons.
    pub async fn get_session(&self, session_id: Uuid) -> WorkflowResult<WorkflowSession> {
        self.store
            .get_session(session_id)
            .await
            .map_err(or_not_found(WorkflowError::SessionNotFound(session_id)))
    }

    async fn session_for_course(&self, course_id: Uuid) -> WorkflowResult<WorkflowSession> {
        self.store
            .find_session_by_course(course_id)
            .await
            .map_err(or_not_found(WorkflowError::CourseNotFound(course_id)))
    }

    /// Loads a lesson and checks that it belongs to `session_id`.
    async fn owned_lesson(&self, session_id: Uuid, lesson_id: Uuid) -> WorkflowResult<LessonScript> {
        let lesson = self
            .store
            .get_lesson(lesson_id)
            .await
            .map_err(or_not_found(WorkflowError::LessonNotFound(lesson_id)))?;
        if lesson.session_id != session_id {
            return Err(WorkflowError::LessonNotFound(lesson_id));
        }
        Ok(lesson)
    }

    //---------------------------------------------------------------------------------
    // State transitions
    //---------------------------------------------------------------------------------

    /// Moves the session into `(action.step(), processing)` with a conditional write.
    async fn claim(&self, session: &WorkflowSession, action: StepAction) -> WorkflowResult<WorkflowSession> {
        let claimed = session.state.begin(action)?;
        let moved = self
            .store
            .compare_and_set_state(session.id, session.state, claimed)
            .await?;
        if !moved {
            warn!(session_id = %session.id, "Lost the race to start {}.", action);
            return Err(WorkflowError::AlreadyInProgress(action.to_string()));
        }
        let mut snapshot = session.clone();
        snapshot.state = claimed;
        Ok(snapshot)
    }

    /// Records a worker's outcome: advance on success, `failed` on error.
    async fn settle(&self, session_id: Uuid, claimed: WorkflowState, outcome: WorkflowResult<()>) {
        let next = match &outcome {
            Ok(()) => claimed.succeed(),
            Err(e) => {
                error!(session_id = %session_id, step = %claimed.current_step, "Step failed: {}", e);
                claimed.fail()
            }
        };
        match self.store.compare_and_set_state(session_id, claimed, next).await {
            Ok(true) => info!(
                session_id = %session_id,
                "Session moved to {}/{}.",
                next.current_step,
                next.status
            ),
            Ok(false) => warn!(
                session_id = %session_id,
                "Session left {}/{} while its worker ran; outcome not recorded.",
                claimed.current_step,
                claimed.status
            ),
            Err(e) => error!(session_id = %session_id, "Failed to record step outcome: {}", e),
        }
    }

    /// Runs `work` as a tracked task that settles the claimed session when done.
    fn launch<F>(&self, snapshot: WorkflowSession, work: F) -> StepLaunch<WorkflowSession>
    where
        F: Future<Output = WorkflowResult<()>> + Send + 'static,
    {
        let this = self.clone();
        let session_id = snapshot.id;
        let claimed = snapshot.state;
        let handle = self.spawn(async move {
            let outcome = work.await;
            this.settle(session_id, claimed, outcome).await;
        });
        StepLaunch { snapshot, handle }
    }

    fn spawn<F>(&self, task: F) -> StepHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        StepHandle(self.tracker.spawn(task))
    }

    //---------------------------------------------------------------------------------
    // Bounded external calls
    //---------------------------------------------------------------------------------

    async fn generation<T>(&self, call: impl Future<Output = PortResult<T>>) -> PortResult<T> {
        bounded(self.settings.generation_timeout, call).await
    }

    async fn external<T>(&self, call: impl Future<Output = PortResult<T>>) -> PortResult<T> {
        bounded(self.settings.external_call_timeout, call).await
    }
}

async fn bounded<T>(limit: Duration, call: impl Future<Output = PortResult<T>>) -> PortResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PortError::Timeout(limit.as_secs())),
    }
}
