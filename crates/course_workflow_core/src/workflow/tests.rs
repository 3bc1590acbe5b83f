//! Orchestrator tests against the in-memory store and scripted fake capabilities.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use uuid::Uuid;

use super::{Capabilities, WorkflowOrchestrator, WorkflowSettings};
use crate::domain::{
    AssetOutcome, GeneratedQuestion, LessonEdit, MaterializedCourse, MultipleChoiceData, NewSession, OutputType,
    PresentationStatus, QuestionKind, SuggestionStatus, TopicEdit, TopicOrder, VideoStatus,
    WorkflowSession,
};
use crate::error::WorkflowError;
use crate::memory::InMemoryStore;
use crate::ports::{
    Audience, ContentGenerationService, CourseCatalog, ImageSearchService, Photo, PortError, PortResult,
    RefineInput, RefinedDraft, ScriptDraft, ScriptInput, SlideDraft, SpeechSynthesisService,
    TopicDraft, VideoGenerationService, VideoJob, WorkflowStore,
};
use crate::state::{JobStatus, WorkflowStep};

//=========================================================================================
// Fake capabilities
//=========================================================================================

#[derive(Default)]
struct FakeContent {
    calls: Mutex<Vec<String>>,
    research_failures: Mutex<VecDeque<PortError>>,
    /// Research calls answered with an empty list before normal replies resume.
    empty_research: AtomicUsize,
    refine_failures: Mutex<VecDeque<PortError>>,
    drafted: AtomicUsize,
    refine_passes: AtomicUsize,
    script_gate: Option<Arc<Semaphore>>,
    slide_gate: Option<Arc<Semaphore>>,
    fail_slides: bool,
    fail_quiz: bool,
}

impl FakeContent {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls_to(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl ContentGenerationService for FakeContent {
    async fn research_topics(&self, audience: &Audience, count: usize) -> PortResult<Vec<TopicDraft>> {
        self.record(format!("research:{}", count));
        if let Some(err) = self.research_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        if self
            .empty_research
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(Vec::new());
        }
        Ok((0..count)
            .map(|_| {
                let n = self.drafted.fetch_add(1, Ordering::SeqCst) + 1;
                TopicDraft {
                    title: format!("{} subtopic {}", audience.topic, n),
                    description: format!("About subtopic {}", n),
                }
            })
            .collect())
    }

    /// Answers in reverse order so only the echoed index pairs results correctly.
    async fn refine_topics(&self, _audience: &Audience, topics: &[RefineInput]) -> PortResult<Vec<RefinedDraft>> {
        self.record(format!("refine:{}", topics.len()));
        if let Some(err) = self.refine_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let pass = self.refine_passes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(topics
            .iter()
            .rev()
            .map(|t| RefinedDraft {
                source_index: Some(t.index),
                original_title: t.title.clone(),
                title: format!("Refined {}", t.title),
                description: format!("{} (pass {})", t.description, pass),
                learning_goals: vec!["Recognise the signs".to_string()],
                estimated_time_min: 15,
            })
            .collect())
    }

    async fn generate_scripts(
        &self,
        _audience: &Audience,
        topics: &[ScriptInput],
        video_duration_min: i32,
    ) -> PortResult<Vec<ScriptDraft>> {
        self.record(format!("scripts:{}", topics.len()));
        if let Some(gate) = &self.script_gate {
            let _permit = gate.acquire().await.unwrap();
        }
        Ok(topics
            .iter()
            .map(|t| ScriptDraft {
                source_index: Some(t.index),
                topic_title: t.title.clone(),
                title: format!("Lesson: {}", t.title),
                script: format!("Narration for {}", t.title),
                duration_min: video_duration_min,
            })
            .collect())
    }

    async fn generate_slides(&self, lesson_title: &str, _script: &str, _language: &str) -> PortResult<Vec<SlideDraft>> {
        self.record("slides");
        if let Some(gate) = &self.slide_gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if self.fail_slides {
            return Err(PortError::Unexpected("model returned invalid JSON".to_string()));
        }
        Ok((1..=5)
            .map(|n| SlideDraft {
                title: format!("{} slide {}", lesson_title, n),
                content: "- point".to_string(),
                script: format!("Narration {}", n),
                image_keywords: "email security".to_string(),
            })
            .collect())
    }

    async fn generate_quiz(
        &self,
        _topic: &str,
        scripts: &[String],
        _language: &str,
        count: usize,
    ) -> PortResult<Vec<GeneratedQuestion>> {
        self.record(format!("quiz:{}", scripts.len()));
        if self.fail_quiz {
            return Err(PortError::Unexpected("model unavailable".to_string()));
        }
        Ok((0..count)
            .map(|n| GeneratedQuestion {
                kind: QuestionKind::MultipleChoice(MultipleChoiceData {
                    options: vec!["Yes".into(), "No".into()],
                    correct_indices: vec![0],
                    explanation: String::new(),
                }),
                question_text: format!("Question {}", n + 1),
                points: 10,
            })
            .collect())
    }
}

#[derive(Default)]
struct FakeVideo {
    failing_titles: HashSet<String>,
    created: AtomicUsize,
}

#[async_trait]
impl VideoGenerationService for FakeVideo {
    async fn create_video(&self, _script: &str, title: &str) -> PortResult<String> {
        if self.failing_titles.contains(title) {
            return Err(PortError::Unexpected("render quota exceeded".to_string()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("vid-{}", n))
    }

    async fn video_status(&self, video_id: &str) -> PortResult<VideoJob> {
        Ok(VideoJob {
            status: VideoStatus::Completed,
            download_url: Some(format!("https://videos.test/{}.mp4", video_id)),
        })
    }
}

/// Fails the calls whose 1-based number is in `failing_calls`.
#[derive(Default)]
struct FakeSpeech {
    calls: AtomicUsize,
    failing_calls: HashSet<usize>,
}

#[async_trait]
impl SpeechSynthesisService for FakeSpeech {
    async fn synthesize(&self, _text: &str, _language: &str) -> PortResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_calls.contains(&n) {
            return Err(PortError::Unavailable("voice quota exceeded".to_string()));
        }
        Ok(format!("/api/v1/audio/{}.mp3", n))
    }
}

#[derive(Default)]
struct FakeImages {
    available: bool,
    calls: AtomicUsize,
    failing_calls: HashSet<usize>,
}

#[async_trait]
impl ImageSearchService for FakeImages {
    async fn find_photo(&self, keywords: &str) -> PortResult<Option<Photo>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_calls.contains(&n) {
            return Err(PortError::Timeout(60));
        }
        Ok(Some(Photo {
            url: format!("https://photos.test/{}", keywords.replace(' ', "-")),
            alt: keywords.to_string(),
        }))
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Links the session to a rival course right before delegating, as a concurrent
/// writer would between the orchestrator's read and its write.
struct RacingCatalog {
    store: Arc<InMemoryStore>,
}

#[async_trait]
impl CourseCatalog for RacingCatalog {
    async fn create_course_for_session(&self, session_id: Uuid, course: &MaterializedCourse) -> PortResult<bool> {
        let mut rival = course.clone();
        rival.course.id = Uuid::new_v4();
        self.store.create_course_for_session(session_id, &rival).await?;
        self.store.create_course_for_session(session_id, course).await
    }
}

//=========================================================================================
// Harness
//=========================================================================================

struct Harness {
    store: Arc<InMemoryStore>,
    content: Arc<FakeContent>,
    speech: Arc<FakeSpeech>,
    workflow: WorkflowOrchestrator,
}

fn harness_with(content: FakeContent, video: Option<FakeVideo>, images_available: bool) -> Harness {
    let images = FakeImages {
        available: images_available,
        ..FakeImages::default()
    };
    harness_with_assets(content, video, images, FakeSpeech::default())
}

fn harness_with_assets(
    content: FakeContent,
    video: Option<FakeVideo>,
    images: FakeImages,
    speech: FakeSpeech,
) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let content = Arc::new(content);
    let speech = Arc::new(speech);
    let capabilities = Capabilities {
        content: content.clone(),
        video: video.map(|v| Arc::new(v) as Arc<dyn VideoGenerationService>),
        speech: Some(speech.clone()),
        images: Some(Arc::new(images)),
    };
    let workflow = WorkflowOrchestrator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        capabilities,
        WorkflowSettings::default(),
    );
    Harness {
        store,
        content,
        speech,
        workflow,
    }
}

fn harness() -> Harness {
    harness_with(FakeContent::default(), Some(FakeVideo::default()), true)
}

fn phishing() -> NewSession {
    NewSession {
        topic: "Phishing Awareness".to_string(),
        target_audience: "office staff".to_string(),
        difficulty_level: "beginner".to_string(),
        language: "en".to_string(),
        video_duration_min: 0,
    }
}

impl Harness {
    async fn researched(&self) -> WorkflowSession {
        let launch = self.workflow.start_research(phishing()).await.unwrap();
        let id = launch.snapshot.id;
        launch.handle.finished().await;
        self.workflow.get_session(id).await.unwrap()
    }

    /// Approves the first `approve` suggestions, rejects the rest, and refines.
    async fn refined(&self, approve: usize) -> WorkflowSession {
        let session = self.researched().await;
        for (i, s) in session.suggestions.iter().enumerate() {
            let status = if i < approve {
                SuggestionStatus::Approved
            } else {
                SuggestionStatus::Rejected
            };
            self.workflow
                .update_suggestion_status(session.id, s.id, status)
                .await
                .unwrap();
        }
        let launch = self.workflow.proceed_to_refinement(session.id).await.unwrap();
        launch.handle.finished().await;
        self.workflow.get_session(session.id).await.unwrap()
    }

    async fn scripted(&self, approve: usize) -> WorkflowSession {
        let session = self.refined(approve).await;
        let launch = self.workflow.proceed_to_scripts(session.id).await.unwrap();
        launch.handle.finished().await;
        self.workflow.get_session(session.id).await.unwrap()
    }

    async fn rendered(&self, approve: usize) -> WorkflowSession {
        let session = self.scripted(approve).await;
        let launch = self.workflow.proceed_to_videos(session.id).await.unwrap();
        launch.handle.finished().await;
        self.workflow.get_session(session.id).await.unwrap()
    }
}

//=========================================================================================
// Forward steps
//=========================================================================================

#[tokio::test]
async fn research_produces_six_pending_suggestions() {
    let h = harness();
    let launch = h.workflow.start_research(phishing()).await.unwrap();
    assert_eq!(launch.snapshot.state.current_step, WorkflowStep::Research);
    assert_eq!(launch.snapshot.state.status, JobStatus::Processing);
    assert_eq!(launch.snapshot.video_duration_min, 5);

    let id = launch.snapshot.id;
    launch.handle.finished().await;

    let session = h.workflow.get_session(id).await.unwrap();
    assert_eq!(session.state.current_step, WorkflowStep::Selection);
    assert_eq!(session.state.status, JobStatus::Completed);
    assert_eq!(session.suggestions.len(), 6);
    assert!(session
        .suggestions
        .iter()
        .all(|s| s.status == SuggestionStatus::Pending && !s.is_custom));
    let orders: Vec<i32> = session.suggestions.iter().map(|s| s.sort_order).collect();
    assert_eq!(orders, vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn failed_research_stays_on_step_and_can_be_retried() {
    let content = FakeContent::default();
    content
        .research_failures
        .lock()
        .unwrap()
        .push_back(PortError::Unexpected("connection refused".to_string()));
    let h = harness_with(content, None, true);

    let launch = h.workflow.start_research(phishing()).await.unwrap();
    let id = launch.snapshot.id;
    launch.handle.finished().await;
    let failed = h.workflow.get_session(id).await.unwrap();
    assert_eq!(failed.state.current_step, WorkflowStep::Research);
    assert_eq!(failed.state.status, JobStatus::Failed);
    assert!(failed.suggestions.is_empty());

    let retry = h.workflow.retry_research(id).await.unwrap();
    retry.handle.finished().await;
    let session = h.workflow.get_session(id).await.unwrap();
    assert_eq!(session.state.current_step, WorkflowStep::Selection);
    assert_eq!(session.suggestions.len(), 6);
}

#[tokio::test]
async fn empty_research_fails_the_step_and_can_be_retried() {
    let content = FakeContent {
        empty_research: AtomicUsize::new(1),
        ..FakeContent::default()
    };
    let h = harness_with(content, None, true);

    let launch = h.workflow.start_research(phishing()).await.unwrap();
    let id = launch.snapshot.id;
    launch.handle.finished().await;
    let failed = h.workflow.get_session(id).await.unwrap();
    assert_eq!(failed.state.current_step, WorkflowStep::Research);
    assert_eq!(failed.state.status, JobStatus::Failed);
    assert!(failed.suggestions.is_empty());

    h.workflow.retry_research(id).await.unwrap().handle.finished().await;
    let session = h.workflow.get_session(id).await.unwrap();
    assert_eq!(session.state.current_step, WorkflowStep::Selection);
    assert_eq!(session.suggestions.len(), 6);
}

#[tokio::test]
async fn generate_more_and_custom_topics_append_to_the_sort_sequence() {
    let h = harness();
    let session = h.researched().await;

    let more = h.workflow.generate_more_suggestions(session.id).await.unwrap();
    assert_eq!(more.len(), 4);
    assert_eq!(more[0].sort_order, 6);

    let custom = h
        .workflow
        .add_custom_topic(session.id, "Reporting incidents", "Who to call")
        .await
        .unwrap();
    assert!(custom.is_custom);
    assert_eq!(custom.status, SuggestionStatus::Approved);
    assert_eq!(custom.sort_order, 10);

    let session = h.workflow.get_session(session.id).await.unwrap();
    assert_eq!(session.suggestions.len(), 11);
    assert_eq!(h.content.calls_to("research:4"), 1);
}

#[tokio::test]
async fn refinement_without_approved_topics_fails_and_leaves_state_alone() {
    let h = harness();
    let session = h.researched().await;
    let before = session.state;

    let err = h.workflow.proceed_to_refinement(session.id).await.err().unwrap();
    assert!(matches!(err, WorkflowError::Precondition(_)));

    let after = h.workflow.get_session(session.id).await.unwrap();
    assert_eq!(after.state, before);
    assert_eq!(h.content.calls_to("refine"), 0);
}

#[tokio::test]
async fn failed_refinement_can_be_retried_from_the_same_step() {
    let content = FakeContent::default();
    content
        .refine_failures
        .lock()
        .unwrap()
        .push_back(PortError::Timeout(300));
    let h = harness_with(content, None, true);
    let session = h.researched().await;
    for s in &session.suggestions[..2] {
        h.workflow
            .update_suggestion_status(session.id, s.id, SuggestionStatus::Approved)
            .await
            .unwrap();
    }

    h.workflow.proceed_to_refinement(session.id).await.unwrap().handle.finished().await;
    let failed = h.workflow.get_session(session.id).await.unwrap();
    assert_eq!(failed.state.current_step, WorkflowStep::Refinement);
    assert_eq!(failed.state.status, JobStatus::Failed);
    assert!(failed.refined_topics.is_empty());

    let retry = h.workflow.proceed_to_refinement(session.id).await.unwrap();
    assert!(retry.snapshot.state.is_processing());
    retry.handle.finished().await;
    let refined = h.workflow.get_session(session.id).await.unwrap();
    assert_eq!(refined.state.current_step, WorkflowStep::Script);
    assert_eq!(refined.refined_topics.len(), 2);
    assert_eq!(h.content.calls_to("refine"), 2);
}

#[tokio::test]
async fn refinement_creates_one_topic_per_approved_suggestion() {
    let h = harness();
    let session = h.refined(3).await;

    assert_eq!(session.state.current_step, WorkflowStep::Script);
    assert_eq!(session.state.status, JobStatus::Completed);
    assert_eq!(session.refined_topics.len(), 3);

    // Output came back reversed; the echoed index still pairs each topic correctly.
    for topic in &session.refined_topics {
        let source = session
            .suggestions
            .iter()
            .find(|s| s.id == topic.suggestion_id)
            .unwrap();
        assert_eq!(topic.title, format!("Refined {}", source.title));
        assert_eq!(source.status, SuggestionStatus::Approved);
    }
}

#[tokio::test]
async fn script_generation_cannot_run_twice_at_once() {
    let gate = Arc::new(Semaphore::new(0));
    let content = FakeContent {
        script_gate: Some(gate.clone()),
        ..FakeContent::default()
    };
    let h = harness_with(content, Some(FakeVideo::default()), true);
    let session = h.refined(2).await;

    let first = h.workflow.proceed_to_scripts(session.id).await.unwrap();
    assert!(first.snapshot.state.is_processing());

    let second = h.workflow.proceed_to_scripts(session.id).await.err().unwrap();
    assert!(matches!(second, WorkflowError::AlreadyInProgress(_)));

    gate.add_permits(1);
    first.handle.finished().await;

    let session = h.workflow.get_session(session.id).await.unwrap();
    assert_eq!(session.state.current_step, WorkflowStep::Video);
    assert_eq!(session.lesson_scripts.len(), 2);
    assert_eq!(h.content.calls_to("scripts"), 1);
}

#[tokio::test]
async fn video_fan_out_isolates_failures_and_skips_presentations() {
    let video = FakeVideo {
        failing_titles: ["Lesson: Refined Phishing Awareness subtopic 2".to_string()]
            .into_iter()
            .collect(),
        ..FakeVideo::default()
    };
    let h = harness_with(FakeContent::default(), Some(video), true);
    let session = h.scripted(3).await;
    let slides_lesson = session.lesson_scripts[2].id;
    h.workflow
        .set_output_type(session.id, slides_lesson, OutputType::Presentation)
        .await
        .unwrap();

    let launch = h.workflow.proceed_to_videos(session.id).await.unwrap();
    launch.handle.finished().await;
    let session = h.workflow.get_session(session.id).await.unwrap();

    assert_eq!(session.state.current_step, WorkflowStep::Questions);
    assert_eq!(session.state.status, JobStatus::Completed);

    let by_title = |t: &str| {
        session
            .lesson_scripts
            .iter()
            .find(|l| l.title == t)
            .unwrap()
            .clone()
    };
    let ok = by_title("Lesson: Refined Phishing Awareness subtopic 1");
    assert_eq!(ok.video_status, Some(VideoStatus::Pending));
    assert!(ok.video_id.is_some());

    let failed = by_title("Lesson: Refined Phishing Awareness subtopic 2");
    assert_eq!(failed.video_status, Some(VideoStatus::Failed));
    assert!(failed.video_error.unwrap().contains("quota"));

    let skipped = session
        .lesson_scripts
        .iter()
        .find(|l| l.id == slides_lesson)
        .unwrap();
    assert_eq!(skipped.video_status, None);
}

#[tokio::test]
async fn video_step_without_video_service_is_refused() {
    let h = harness_with(FakeContent::default(), None, true);
    let session = h.scripted(1).await;

    let err = h.workflow.proceed_to_videos(session.id).await.err().unwrap();
    assert!(matches!(err, WorkflowError::CapabilityUnavailable(_)));
    let after = h.workflow.get_session(session.id).await.unwrap();
    assert_eq!(after.state, session.state);
}

#[tokio::test]
async fn question_generation_materializes_exactly_one_course() {
    let h = harness();
    let session = h.rendered(2).await;

    let launch = h.workflow.proceed_to_questions(session.id).await.unwrap();
    launch.handle.finished().await;
    let done = h.workflow.get_session(session.id).await.unwrap();

    assert_eq!(done.state.current_step, WorkflowStep::Completed);
    let courses = h.store.courses().await;
    assert_eq!(courses.len(), 1);
    let made = &courses[0];
    assert_eq!(done.course_id, Some(made.course.id));
    assert_eq!(made.course.title, "Phishing Awareness");
    assert_eq!(made.test.passing_score, 70);
    assert_eq!(made.questions.len(), 10);
    assert!(made.questions.iter().all(|q| q.test_id == made.test.id));

    // Nothing moves a completed session; its course link is fixed.
    let again = h.workflow.proceed_to_questions(session.id).await.err().unwrap();
    assert!(matches!(again, WorkflowError::InvalidStep { .. }));
    assert!(!h.store.create_course_for_session(session.id, made).await.unwrap());
    let still = h.workflow.get_session(session.id).await.unwrap();
    assert_eq!(still.course_id, Some(made.course.id));
    assert_eq!(h.store.courses().await.len(), 1);
}

#[tokio::test]
async fn failed_quiz_leaves_session_retryable_without_a_course() {
    let content = FakeContent {
        fail_quiz: true,
        ..FakeContent::default()
    };
    let h = harness_with(content, Some(FakeVideo::default()), true);
    let session = h.rendered(1).await;

    let launch = h.workflow.proceed_to_questions(session.id).await.unwrap();
    launch.handle.finished().await;
    let failed = h.workflow.get_session(session.id).await.unwrap();

    assert_eq!(failed.state.current_step, WorkflowStep::Questions);
    assert_eq!(failed.state.status, JobStatus::Failed);
    assert!(failed.course_id.is_none());
    assert!(h.store.courses().await.is_empty());
}

#[tokio::test]
async fn lost_course_link_writes_no_orphan_and_retry_completes() {
    let store = Arc::new(InMemoryStore::new());
    let content = Arc::new(FakeContent::default());
    let capabilities = Capabilities {
        content: content.clone(),
        video: Some(Arc::new(FakeVideo::default()) as Arc<dyn VideoGenerationService>),
        speech: None,
        images: None,
    };
    let workflow = WorkflowOrchestrator::new(
        store.clone(),
        store.clone(),
        Arc::new(RacingCatalog { store: store.clone() }),
        capabilities,
        WorkflowSettings::default(),
    );
    let h = Harness {
        store,
        content,
        speech: Arc::new(FakeSpeech::default()),
        workflow,
    };
    let session = h.rendered(1).await;

    h.workflow.proceed_to_questions(session.id).await.unwrap().handle.finished().await;
    let failed = h.workflow.get_session(session.id).await.unwrap();
    assert_eq!(failed.state.current_step, WorkflowStep::Questions);
    assert_eq!(failed.state.status, JobStatus::Failed);

    // Only the rival course exists and it is the one the session points at.
    let courses = h.store.courses().await;
    assert_eq!(courses.len(), 1);
    assert_eq!(failed.course_id, Some(courses[0].course.id));

    // A retry finds the linked course and completes without writing another.
    h.workflow.proceed_to_questions(session.id).await.unwrap().handle.finished().await;
    let done = h.workflow.get_session(session.id).await.unwrap();
    assert_eq!(done.state.current_step, WorkflowStep::Completed);
    assert_eq!(done.course_id, failed.course_id);
    assert_eq!(h.store.courses().await.len(), 1);
}

#[tokio::test]
async fn steps_never_move_backwards_through_a_full_run() {
    let h = harness();
    let mut seen = Vec::new();

    let launch = h.workflow.start_research(phishing()).await.unwrap();
    let id = launch.snapshot.id;
    seen.push(launch.snapshot.state.current_step);
    launch.handle.finished().await;
    seen.push(h.workflow.get_session(id).await.unwrap().state.current_step);

    let session = h.workflow.get_session(id).await.unwrap();
    h.workflow
        .update_suggestion_status(id, session.suggestions[0].id, SuggestionStatus::Approved)
        .await
        .unwrap();

    let launch = h.workflow.proceed_to_refinement(id).await.unwrap();
    seen.push(launch.snapshot.state.current_step);
    launch.handle.finished().await;
    seen.push(h.workflow.get_session(id).await.unwrap().state.current_step);

    let launch = h.workflow.proceed_to_scripts(id).await.unwrap();
    launch.handle.finished().await;
    seen.push(h.workflow.get_session(id).await.unwrap().state.current_step);

    // Out-of-order requests are refused without moving the step.
    assert!(h.workflow.proceed_to_refinement(id).await.is_err());
    assert!(h.workflow.proceed_to_questions(id).await.is_err());
    seen.push(h.workflow.get_session(id).await.unwrap().state.current_step);

    let launch = h.workflow.proceed_to_videos(id).await.unwrap();
    launch.handle.finished().await;
    let launch = h.workflow.proceed_to_questions(id).await.unwrap();
    launch.handle.finished().await;
    seen.push(h.workflow.get_session(id).await.unwrap().state.current_step);

    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert_eq!(seen.last(), Some(&WorkflowStep::Completed));
}

//=========================================================================================
// Item-level edits
//=========================================================================================

#[tokio::test]
async fn regenerating_a_topic_leaves_siblings_untouched() {
    let h = harness();
    let session = h.refined(3).await;
    let target = session.refined_topics[1].clone();

    let regenerated = h
        .workflow
        .regenerate_topic(session.id, target.id)
        .await
        .unwrap();
    assert_eq!(regenerated.id, target.id);
    assert_eq!(regenerated.sort_order, target.sort_order);
    assert!(regenerated.description.ends_with("(pass 2)"));

    let after = h.workflow.get_session(session.id).await.unwrap();
    for (before, now) in session.refined_topics.iter().zip(after.refined_topics.iter()) {
        if before.id == target.id {
            continue;
        }
        assert_eq!(before.title, now.title);
        assert_eq!(before.description, now.description);
        assert_eq!(before.sort_order, now.sort_order);
    }
}

#[tokio::test]
async fn reorder_accepts_duplicate_and_out_of_range_orders() {
    let h = harness();
    let session = h.refined(3).await;
    let ids: Vec<Uuid> = session.refined_topics.iter().map(|t| t.id).collect();

    let orders = [
        TopicOrder { topic_id: ids[0], sort_order: 100 },
        TopicOrder { topic_id: ids[1], sort_order: -3 },
        TopicOrder { topic_id: ids[2], sort_order: 100 },
    ];
    let after = h.workflow.reorder_topics(session.id, &orders).await.unwrap();
    let read: Vec<Uuid> = after.refined_topics.iter().map(|t| t.id).collect();
    assert_eq!(read, vec![ids[1], ids[0], ids[2]]);

    let last = [TopicOrder { topic_id: ids[2], sort_order: -10 }];
    let after = h.workflow.reorder_topics(session.id, &last).await.unwrap();
    assert_eq!(after.refined_topics[0].id, ids[2]);
}

#[tokio::test]
async fn reorder_rejects_topics_of_another_session() {
    let h = harness();
    let mine = h.refined(1).await;
    let theirs = h.refined(1).await;

    let orders = [TopicOrder {
        topic_id: theirs.refined_topics[0].id,
        sort_order: 0,
    }];
    let err = h.workflow.reorder_topics(mine.id, &orders).await.err().unwrap();
    assert!(matches!(err, WorkflowError::TopicNotFound(_)));
}

#[tokio::test]
async fn topic_edits_are_limited_to_the_script_step() {
    let h = harness();
    let session = h.scripted(1).await;
    let edit = TopicEdit {
        title: "Edited".to_string(),
        description: String::new(),
        learning_goals: vec![],
        estimated_time_min: 5,
    };
    let err = h
        .workflow
        .update_topic(session.id, session.refined_topics[0].id, edit)
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        WorkflowError::InvalidStep {
            current: WorkflowStep::Video,
            ..
        }
    ));
}

#[tokio::test]
async fn lessons_of_another_session_are_not_found() {
    let h = harness();
    let mine = h.scripted(1).await;
    let theirs = h.scripted(1).await;
    let foreign = theirs.lesson_scripts[0].id;

    let edit = LessonEdit {
        title: None,
        script: "Rewritten".to_string(),
    };
    let err = h.workflow.update_lesson(mine.id, foreign, edit).await.err().unwrap();
    assert!(matches!(err, WorkflowError::LessonNotFound(id) if id == foreign));

    let err = h.workflow.get_presentation(mine.id, foreign).await.err().unwrap();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn lesson_edits_keep_title_when_blank_and_work_after_completion() {
    let h = harness();
    let session = h.scripted(1).await;
    let lesson = session.lesson_scripts[0].clone();

    let edited = h
        .workflow
        .update_lesson(
            session.id,
            lesson.id,
            LessonEdit {
                title: Some("  ".to_string()),
                script: "Shorter narration".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.title, lesson.title);
    assert_eq!(edited.script, "Shorter narration");

    h.workflow.proceed_to_videos(session.id).await.unwrap().handle.finished().await;
    let launch = h.workflow.proceed_to_questions(session.id).await.unwrap();
    launch.handle.finished().await;
    let course_id = h.workflow.get_session(session.id).await.unwrap().course_id.unwrap();

    let regenerated = h
        .workflow
        .regenerate_course_lesson(course_id, lesson.id)
        .await
        .unwrap();
    assert!(regenerated.script.starts_with("Narration for"));
}

//=========================================================================================
// Presentations
//=========================================================================================

#[tokio::test]
async fn presentation_completes_without_images_when_search_is_unavailable() {
    let h = harness_with(FakeContent::default(), Some(FakeVideo::default()), false);
    let session = h.scripted(1).await;
    let lesson = session.lesson_scripts[0].id;
    h.workflow
        .set_output_type(session.id, lesson, OutputType::Presentation)
        .await
        .unwrap();

    let launch = h.workflow.generate_presentation(session.id, lesson).await.unwrap();
    assert_eq!(launch.snapshot.status, PresentationStatus::Processing);
    launch.handle.finished().await;

    let deck = h.workflow.get_presentation(session.id, lesson).await.unwrap();
    assert_eq!(deck.status, PresentationStatus::Completed);
    assert_eq!(deck.slides.len(), 5);
    for slide in &deck.slides {
        assert!(slide.image_url.is_none());
        assert!(matches!(slide.image, AssetOutcome::Skipped { .. }));
        assert!(slide.audio_url.is_some());
        assert_eq!(slide.audio, AssetOutcome::Attached);
    }
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 5);

    let lesson = h.store.get_lesson(lesson).await.unwrap();
    assert_eq!(lesson.presentation_status, Some(JobStatus::Completed));
}

#[tokio::test]
async fn failed_slide_generation_fails_the_deck_and_keeps_no_slides() {
    let content = FakeContent {
        fail_slides: true,
        ..FakeContent::default()
    };
    let h = harness_with(content, Some(FakeVideo::default()), true);
    let session = h.scripted(1).await;
    let lesson = session.lesson_scripts[0].id;
    h.workflow
        .set_output_type(session.id, lesson, OutputType::Presentation)
        .await
        .unwrap();

    let launch = h.workflow.generate_presentation(session.id, lesson).await.unwrap();
    launch.handle.finished().await;

    let deck = h.workflow.get_presentation(session.id, lesson).await.unwrap();
    assert_eq!(deck.status, PresentationStatus::Failed);
    assert!(deck.slides.is_empty());
    let lesson = h.store.get_lesson(lesson).await.unwrap();
    assert_eq!(lesson.presentation_status, Some(JobStatus::Failed));
}

#[tokio::test]
async fn slide_asset_failures_stay_on_their_own_slide() {
    let images = FakeImages {
        available: true,
        failing_calls: HashSet::from([4]),
        ..FakeImages::default()
    };
    let speech = FakeSpeech {
        failing_calls: HashSet::from([2]),
        ..FakeSpeech::default()
    };
    let h = harness_with_assets(FakeContent::default(), Some(FakeVideo::default()), images, speech);
    let session = h.scripted(1).await;
    let lesson = session.lesson_scripts[0].id;
    h.workflow
        .set_output_type(session.id, lesson, OutputType::Presentation)
        .await
        .unwrap();

    h.workflow
        .generate_presentation(session.id, lesson)
        .await
        .unwrap()
        .handle
        .finished()
        .await;

    let deck = h.workflow.get_presentation(session.id, lesson).await.unwrap();
    assert_eq!(deck.status, PresentationStatus::Completed);
    assert_eq!(deck.slides.len(), 5);
    for (i, slide) in deck.slides.iter().enumerate() {
        if i == 1 {
            assert!(matches!(slide.audio, AssetOutcome::Failed { .. }));
            assert!(slide.audio_url.is_none());
        } else {
            assert_eq!(slide.audio, AssetOutcome::Attached, "slide {}", i);
            assert!(slide.audio_url.is_some());
        }
        if i == 3 {
            assert!(matches!(slide.image, AssetOutcome::Failed { .. }));
            assert!(slide.image_url.is_none());
        } else {
            assert_eq!(slide.image, AssetOutcome::Attached, "slide {}", i);
            assert!(slide.image_url.is_some());
        }
    }
    let lesson = h.store.get_lesson(lesson).await.unwrap();
    assert_eq!(lesson.presentation_status, Some(JobStatus::Completed));
}

#[tokio::test]
async fn a_running_deck_cannot_be_claimed_again() {
    let gate = Arc::new(Semaphore::new(0));
    let content = FakeContent {
        slide_gate: Some(gate.clone()),
        ..FakeContent::default()
    };
    let h = harness_with(content, Some(FakeVideo::default()), true);
    let session = h.scripted(1).await;
    let lesson = session.lesson_scripts[0].id;
    h.workflow
        .set_output_type(session.id, lesson, OutputType::Presentation)
        .await
        .unwrap();

    let first = h.workflow.generate_presentation(session.id, lesson).await.unwrap();
    let second = h.workflow.generate_presentation(session.id, lesson).await.err().unwrap();
    assert!(matches!(second, WorkflowError::AlreadyInProgress(_)));
    assert_eq!(h.store.presentations_for(lesson).await.len(), 1);

    gate.add_permits(1);
    first.handle.finished().await;
    assert_eq!(h.content.calls_to("slides"), 1);

    // Once settled the deck can be claimed again, keeping its record.
    gate.add_permits(1);
    let third = h.workflow.generate_presentation(session.id, lesson).await.unwrap();
    assert_eq!(third.snapshot.id, first.snapshot.id);
    assert_eq!(third.snapshot.status, PresentationStatus::Processing);
    third.handle.finished().await;
}

#[tokio::test]
async fn presentations_require_presentation_lessons_and_reuse_the_record() {
    let h = harness();
    let session = h.scripted(1).await;
    let lesson = session.lesson_scripts[0].id;

    let err = h.workflow.generate_presentation(session.id, lesson).await.err().unwrap();
    assert!(matches!(err, WorkflowError::Precondition(_)));

    h.workflow
        .set_output_type(session.id, lesson, OutputType::Presentation)
        .await
        .unwrap();
    let first = h.workflow.generate_presentation(session.id, lesson).await.unwrap();
    first.handle.finished().await;
    let second = h.workflow.generate_presentation(session.id, lesson).await.unwrap();
    second.handle.finished().await;

    assert_eq!(first.snapshot.id, second.snapshot.id);
    assert_eq!(h.store.presentations_for(lesson).await.len(), 1);
}

#[tokio::test]
async fn audio_regeneration_resynthesizes_every_narrated_slide() {
    let h = harness();
    let session = h.scripted(1).await;
    let lesson = session.lesson_scripts[0].id;
    h.workflow
        .set_output_type(session.id, lesson, OutputType::Presentation)
        .await
        .unwrap();
    h.workflow
        .generate_presentation(session.id, lesson)
        .await
        .unwrap()
        .handle
        .finished()
        .await;

    let deck = h.workflow.regenerate_audio(session.id, lesson).await.unwrap();
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 10);
    assert_eq!(deck.slides[0].audio_url.as_deref(), Some("/api/v1/audio/6.mp3"));
    assert_eq!(deck.status, PresentationStatus::Completed);
}

#[tokio::test]
async fn audio_regeneration_tolerates_a_failing_slide() {
    let speech = FakeSpeech {
        failing_calls: HashSet::from([8]),
        ..FakeSpeech::default()
    };
    let images = FakeImages {
        available: true,
        ..FakeImages::default()
    };
    let h = harness_with_assets(FakeContent::default(), Some(FakeVideo::default()), images, speech);
    let session = h.scripted(1).await;
    let lesson = session.lesson_scripts[0].id;
    h.workflow
        .set_output_type(session.id, lesson, OutputType::Presentation)
        .await
        .unwrap();
    h.workflow
        .generate_presentation(session.id, lesson)
        .await
        .unwrap()
        .handle
        .finished()
        .await;

    let deck = h.workflow.regenerate_audio(session.id, lesson).await.unwrap();
    assert_eq!(deck.status, PresentationStatus::Completed);
    assert!(matches!(deck.slides[2].audio, AssetOutcome::Failed { .. }));
    assert_eq!(deck.slides[0].audio_url.as_deref(), Some("/api/v1/audio/6.mp3"));
    assert_eq!(deck.slides[4].audio_url.as_deref(), Some("/api/v1/audio/10.mp3"));
    assert_eq!(h.speech.calls.load(Ordering::SeqCst), 10);

    let stored = h.workflow.get_presentation(session.id, lesson).await.unwrap();
    assert!(matches!(stored.slides[2].audio, AssetOutcome::Failed { .. }));
    assert_eq!(stored.slides[3].audio, AssetOutcome::Attached);
}

#[tokio::test]
async fn course_lessons_include_finished_decks() {
    let h = harness();
    let session = h.scripted(2).await;
    let deck_lesson = session.lesson_scripts[1].id;
    h.workflow
        .set_output_type(session.id, deck_lesson, OutputType::Presentation)
        .await
        .unwrap();
    h.workflow.proceed_to_videos(session.id).await.unwrap().handle.finished().await;
    h.workflow.proceed_to_questions(session.id).await.unwrap().handle.finished().await;
    let course_id = h.workflow.get_session(session.id).await.unwrap().course_id.unwrap();

    h.workflow
        .generate_course_presentation(course_id, deck_lesson)
        .await
        .unwrap()
        .handle
        .finished()
        .await;

    let lessons = h.workflow.course_lessons(course_id).await.unwrap();
    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[0].output_type, OutputType::Video);
    assert!(lessons[0].presentation.is_none());
    assert_eq!(lessons[1].output_type, OutputType::Presentation);
    assert_eq!(lessons[1].presentation.as_ref().unwrap().slides.len(), 5);

    let err = h.workflow.course_lessons(Uuid::new_v4()).await.err().unwrap();
    assert!(matches!(err, WorkflowError::CourseNotFound(_)));
}

//=========================================================================================
// Video status sync
//=========================================================================================

#[tokio::test]
async fn video_sync_records_finished_renders() {
    let h = harness();
    let session = h.rendered(2).await;
    assert_eq!(h.store.sessions_with_pending_videos().await.unwrap(), vec![session.id]);

    let report = h.workflow.sync_all_pending_videos().await.unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.completed, 2);

    let session = h.workflow.get_session(session.id).await.unwrap();
    for lesson in &session.lesson_scripts {
        assert_eq!(lesson.video_status, Some(VideoStatus::Completed));
        assert!(lesson.video_url.as_deref().unwrap().starts_with("https://videos.test/"));
    }
    assert!(h.store.sessions_with_pending_videos().await.unwrap().is_empty());
}
