//! crates/course_workflow_core/src/workflow/steps.rs
//!
//! The forward steps of the pipeline: research, selection, refinement,
//! script generation and question generation. Video fan-out lives in `videos.rs`.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{StepLaunch, WorkflowOrchestrator};
use crate::domain::{
    GeneratedQuestion, LessonScript, NewSession, RefinedTopic, SuggestionStatus, TopicSuggestion,
    WorkflowSession,
};
use crate::error::{or_not_found, WorkflowError, WorkflowResult};
use crate::matching::associate;
use crate::materialize::materialize;
use crate::ports::{Audience, PortError, RefineInput, ScriptInput, TopicDraft};
use crate::state::{StepAction, WorkflowState, WorkflowStep};

const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_VIDEO_DURATION_MIN: i32 = 5;

fn suggestions_from(session_id: Uuid, drafts: Vec<TopicDraft>, first_order: i32) -> Vec<TopicSuggestion> {
    let now = Utc::now();
    drafts
        .into_iter()
        .enumerate()
        .map(|(i, draft)| TopicSuggestion {
            id: Uuid::new_v4(),
            session_id,
            title: draft.title,
            description: draft.description,
            is_custom: false,
            status: SuggestionStatus::Pending,
            sort_order: first_order + i as i32,
            created_at: now,
        })
        .collect()
}

impl WorkflowOrchestrator {
    //=====================================================================================
    // Research
    //=====================================================================================

    /// Creates a session and launches topic research for it.
    pub async fn start_research(&self, request: NewSession) -> WorkflowResult<StepLaunch<WorkflowSession>> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(WorkflowError::Precondition("a topic is required".to_string()));
        }

        let now = Utc::now();
        let session = WorkflowSession {
            id: Uuid::new_v4(),
            main_topic: topic.to_string(),
            target_audience: request.target_audience,
            difficulty_level: request.difficulty_level,
            language: if request.language.trim().is_empty() {
                DEFAULT_LANGUAGE.to_string()
            } else {
                request.language
            },
            video_duration_min: if request.video_duration_min > 0 {
                request.video_duration_min
            } else {
                DEFAULT_VIDEO_DURATION_MIN
            },
            state: WorkflowState::researching(),
            course_id: None,
            created_at: now,
            updated_at: now,
            suggestions: Vec::new(),
            refined_topics: Vec::new(),
            lesson_scripts: Vec::new(),
        };
        self.store.insert_session(&session).await?;
        info!(session_id = %session.id, "Workflow session created for topic '{}'.", session.main_topic);

        let this = self.clone();
        let input = session.clone();
        Ok(self.launch(session, async move { this.research(input).await }))
    }

    /// Relaunches research after it failed.
    pub async fn retry_research(&self, session_id: Uuid) -> WorkflowResult<StepLaunch<WorkflowSession>> {
        let session = self.get_session(session_id).await?;
        let snapshot = self.claim(&session, StepAction::RetryResearch).await?;

        let this = self.clone();
        let input = snapshot.clone();
        Ok(self.launch(snapshot, async move { this.research(input).await }))
    }

    async fn research(&self, session: WorkflowSession) -> WorkflowResult<()> {
        let drafts = self
            .generation(
                self.capabilities
                    .content
                    .research_topics(&Audience::of(&session), self.settings.research_count),
            )
            .await?;
        if drafts.is_empty() {
            return Err(PortError::Unexpected("research returned no suggestions".to_string()).into());
        }

        let suggestions = suggestions_from(session.id, drafts, session.next_suggestion_order());
        self.store.insert_suggestions(&suggestions).await?;
        info!(session_id = %session.id, "Stored {} topic suggestions.", suggestions.len());
        Ok(())
    }

    //=====================================================================================
    // Selection
    //=====================================================================================

    /// Requests a few more suggestions and appends them to the session.
    pub async fn generate_more_suggestions(&self, session_id: Uuid) -> WorkflowResult<Vec<TopicSuggestion>> {
        let session = self.get_session(session_id).await?;
        session
            .state
            .require_idle_at(&[WorkflowStep::Selection])
            .map_err(|r| WorkflowError::requirement("generate more suggestions", r))?;

        let drafts = self
            .generation(self.capabilities.content.research_topics(
                &Audience::of(&session),
                self.settings.more_suggestions_count,
            ))
            .await
            .map_err(WorkflowError::Generation)?;

        let suggestions = suggestions_from(session.id, drafts, session.next_suggestion_order());
        self.store.insert_suggestions(&suggestions).await?;
        info!(session_id = %session.id, "Appended {} topic suggestions.", suggestions.len());
        Ok(suggestions)
    }

    pub async fn update_suggestion_status(
        &self,
        session_id: Uuid,
        suggestion_id: Uuid,
        status: SuggestionStatus,
    ) -> WorkflowResult<TopicSuggestion> {
        let session = self.get_session(session_id).await?;
        session
            .state
            .require_idle_at(&[WorkflowStep::Selection])
            .map_err(|r| WorkflowError::requirement("change a suggestion", r))?;

        let mut suggestion = self
            .store
            .get_suggestion(suggestion_id)
            .await
            .map_err(or_not_found(WorkflowError::SuggestionNotFound(suggestion_id)))?;
        if suggestion.session_id != session_id {
            return Err(WorkflowError::SuggestionNotFound(suggestion_id));
        }

        self.store.update_suggestion_status(suggestion_id, status).await?;
        suggestion.status = status;
        Ok(suggestion)
    }

    /// Adds a user-written topic. Custom topics are approved on creation.
    pub async fn add_custom_topic(
        &self,
        session_id: Uuid,
        title: &str,
        description: &str,
    ) -> WorkflowResult<TopicSuggestion> {
        let session = self.get_session(session_id).await?;
        session
            .state
            .require_idle_at(&[WorkflowStep::Selection])
            .map_err(|r| WorkflowError::requirement("add a custom topic", r))?;
        if title.trim().is_empty() {
            return Err(WorkflowError::Precondition("a topic title is required".to_string()));
        }

        let suggestion = TopicSuggestion {
            id: Uuid::new_v4(),
            session_id,
            title: title.trim().to_string(),
            description: description.to_string(),
            is_custom: true,
            status: SuggestionStatus::Approved,
            sort_order: session.next_suggestion_order(),
            created_at: Utc::now(),
        };
        self.store
            .insert_suggestions(std::slice::from_ref(&suggestion))
            .await?;
        Ok(suggestion)
    }

    //=====================================================================================
    // Refinement
    //=====================================================================================

    pub async fn proceed_to_refinement(&self, session_id: Uuid) -> WorkflowResult<StepLaunch<WorkflowSession>> {
        let session = self.get_session(session_id).await?;
        session.state.begin(StepAction::Refine)?;

        let approved = session.approved_suggestions();
        if approved.is_empty() {
            return Err(WorkflowError::Precondition(
                "approve at least one topic before refinement".to_string(),
            ));
        }

        let snapshot = self.claim(&session, StepAction::Refine).await?;
        let this = self.clone();
        let audience = Audience::of(&snapshot);
        Ok(self.launch(snapshot, async move {
            this.refine(session_id, audience, approved).await
        }))
    }

    async fn refine(
        &self,
        session_id: Uuid,
        audience: Audience,
        approved: Vec<TopicSuggestion>,
    ) -> WorkflowResult<()> {
        let inputs: Vec<RefineInput> = approved
            .iter()
            .enumerate()
            .map(|(index, s)| RefineInput {
                index,
                title: s.title.clone(),
                description: s.description.clone(),
            })
            .collect();

        let drafts = self
            .generation(self.capabilities.content.refine_topics(&audience, &inputs))
            .await?;
        if drafts.is_empty() {
            return Err(PortError::Unexpected("refinement returned no topics".to_string()).into());
        }

        let titles: Vec<&str> = approved.iter().map(|s| s.title.as_str()).collect();
        let association = associate(&titles, drafts, |d| (d.source_index, d.original_title.clone()));
        if association.unmatched > 0 || association.fell_back() > 0 {
            warn!(
                session_id = %session_id,
                "Refinement re-association: {} unmatched, {} matched without an echoed index.",
                association.unmatched,
                association.fell_back()
            );
        }

        // Topics keep the order of the suggestions they came from.
        let now = Utc::now();
        let topics: Vec<RefinedTopic> = association
            .pairs
            .into_iter()
            .map(|(input, draft, _)| RefinedTopic {
                id: Uuid::new_v4(),
                session_id,
                suggestion_id: approved[input].id,
                title: draft.title,
                description: draft.description,
                learning_goals: draft.learning_goals,
                estimated_time_min: draft.estimated_time_min,
                sort_order: input as i32,
                created_at: now,
            })
            .collect();

        self.store.replace_refined_topics(session_id, &topics).await?;
        info!(session_id = %session_id, "Stored {} refined topics.", topics.len());
        Ok(())
    }

    //=====================================================================================
    // Scripts
    //=====================================================================================

    pub async fn proceed_to_scripts(&self, session_id: Uuid) -> WorkflowResult<StepLaunch<WorkflowSession>> {
        let session = self.get_session(session_id).await?;
        session.state.begin(StepAction::GenerateScripts)?;
        if session.refined_topics.is_empty() {
            return Err(WorkflowError::Precondition(
                "there are no refined topics to write scripts for".to_string(),
            ));
        }

        let snapshot = self.claim(&session, StepAction::GenerateScripts).await?;
        let this = self.clone();
        let input = snapshot.clone();
        Ok(self.launch(snapshot, async move { this.write_scripts(input).await }))
    }

    async fn write_scripts(&self, session: WorkflowSession) -> WorkflowResult<()> {
        let topics = &session.refined_topics;
        let inputs: Vec<ScriptInput> = topics.iter().enumerate().map(script_input).collect();

        let drafts = self
            .generation(self.capabilities.content.generate_scripts(
                &Audience::of(&session),
                &inputs,
                session.video_duration_min,
            ))
            .await?;
        if drafts.is_empty() {
            return Err(PortError::Unexpected("script generation returned no lessons".to_string()).into());
        }

        let titles: Vec<&str> = topics.iter().map(|t| t.title.as_str()).collect();
        let association = associate(&titles, drafts, |d| (d.source_index, d.topic_title.clone()));
        if association.unmatched > 0 || association.fell_back() > 0 {
            warn!(
                session_id = %session.id,
                "Script re-association: {} unmatched, {} matched without an echoed index.",
                association.unmatched,
                association.fell_back()
            );
        }

        let now = Utc::now();
        let lessons: Vec<LessonScript> = association
            .pairs
            .into_iter()
            .map(|(input, draft, _)| LessonScript {
                id: Uuid::new_v4(),
                session_id: session.id,
                topic_id: topics[input].id,
                title: draft.title,
                script: draft.script,
                duration_min: draft.duration_min,
                sort_order: topics[input].sort_order,
                output_type: None,
                video_id: None,
                video_url: None,
                video_status: None,
                video_error: None,
                presentation_status: None,
                created_at: now,
            })
            .collect();

        self.store.replace_lesson_scripts(session.id, &lessons).await?;
        info!(session_id = %session.id, "Stored {} lesson scripts.", lessons.len());
        Ok(())
    }

    //=====================================================================================
    // Questions and Materialization
    //=====================================================================================

    pub async fn proceed_to_questions(&self, session_id: Uuid) -> WorkflowResult<StepLaunch<WorkflowSession>> {
        let session = self.get_session(session_id).await?;
        session.state.begin(StepAction::GenerateQuestions)?;
        if session.lesson_scripts.is_empty() {
            return Err(WorkflowError::Precondition(
                "there are no lesson scripts to build questions from".to_string(),
            ));
        }

        let snapshot = self.claim(&session, StepAction::GenerateQuestions).await?;
        let this = self.clone();
        let input = snapshot.clone();
        Ok(self.launch(snapshot, async move { this.build_course(input).await }))
    }

    async fn build_course(&self, session: WorkflowSession) -> WorkflowResult<()> {
        let questions = self.quiz_for(&session).await?;
        if questions.is_empty() {
            return Err(PortError::Unexpected("quiz generation returned no questions".to_string()).into());
        }
        info!(session_id = %session.id, "Generated {} questions.", questions.len());

        // Materialize from the latest persisted artifacts, not the launch snapshot.
        let current = self.get_session(session.id).await?;
        if let Some(course_id) = current.course_id {
            // An earlier attempt wrote the course but could not record its outcome.
            info!(session_id = %session.id, course_id = %course_id, "Course already exists; nothing to write.");
            return Ok(());
        }
        let course = materialize(&current, questions);
        if !self.catalog.create_course_for_session(session.id, &course).await? {
            return Err(WorkflowError::Precondition(format!(
                "session {} already has a course",
                session.id
            )));
        }
        info!(
            session_id = %session.id,
            course_id = %course.course.id,
            "Course '{}' created with {} questions.",
            course.course.title,
            course.questions.len()
        );
        Ok(())
    }

    /// Generates questions without storing anything.
    pub async fn preview_questions(&self, session_id: Uuid) -> WorkflowResult<Vec<GeneratedQuestion>> {
        let session = self.get_session(session_id).await?;
        if session.lesson_scripts.is_empty() {
            return Err(WorkflowError::Precondition(
                "there are no lesson scripts to build questions from".to_string(),
            ));
        }
        self.quiz_for(&session).await.map_err(|e| match e {
            WorkflowError::Port(p) => WorkflowError::Generation(p),
            other => other,
        })
    }

    async fn quiz_for(&self, session: &WorkflowSession) -> WorkflowResult<Vec<GeneratedQuestion>> {
        let scripts: Vec<String> = session
            .lesson_scripts
            .iter()
            .map(|l| l.script.clone())
            .collect();
        let questions = self
            .generation(self.capabilities.content.generate_quiz(
                &session.main_topic,
                &scripts,
                &session.language,
                self.settings.quiz_question_count,
            ))
            .await?;
        Ok(questions)
    }
}

pub(super) fn script_input((index, topic): (usize, &RefinedTopic)) -> ScriptInput {
    ScriptInput {
        index,
        title: topic.title.clone(),
        description: topic.description.clone(),
        learning_goals: topic.learning_goals.clone(),
        estimated_time_min: topic.estimated_time_min,
    }
}
