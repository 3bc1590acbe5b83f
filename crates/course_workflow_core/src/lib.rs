pub mod domain;
pub mod error;
pub mod matching;
pub mod materialize;
pub mod memory;
pub mod ports;
pub mod state;
pub mod workflow;

pub use domain::{
    AssetOutcome, Course, CourseLesson, GeneratedQuestion, LessonEdit, LessonPresentation,
    LessonScript, MaterializedCourse, NewSession, OutputType, PresentationStatus, Question,
    QuestionKind, RefinedTopic, Slide, SuggestionStatus, Test, TopicEdit, TopicOrder,
    TopicSuggestion, VideoStatus, VideoUpdate, WorkflowSession,
};
pub use error::{WorkflowError, WorkflowResult};
pub use memory::InMemoryStore;
pub use ports::{
    Audience, ContentGenerationService, CourseCatalog, ImageSearchService, Photo, PortError,
    PortResult, PresentationStore, RefineInput, RefinedDraft, ScriptDraft, ScriptInput,
    SlideDraft, SpeechSynthesisService, TopicDraft, VideoGenerationService, VideoJob,
    WorkflowStore,
};
pub use state::{JobStatus, StepAction, WorkflowState, WorkflowStep};
pub use workflow::{
    Capabilities, StepHandle, StepLaunch, VideoSyncReport, WorkflowOrchestrator, WorkflowSettings,
};
