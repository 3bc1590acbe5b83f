//! crates/course_workflow_core/src/materialize.rs
//!
//! Derives the permanent course, test and question records from a finished
//! session. Pure: no storage access and no external calls.

use std::fmt::Write;
use uuid::Uuid;

use crate::domain::{
    Course, GeneratedQuestion, MaterializedCourse, OutputType, Question, Test, WorkflowSession,
};

pub const DEFAULT_PASS_PERCENTAGE: i32 = 70;
pub const TEST_PASSING_SCORE: i32 = 70;

pub fn course_description(session: &WorkflowSession) -> String {
    let mut description = String::from("Course generated from AI Workflow.\n\nTopics covered:\n");
    for (i, topic) in session.refined_topics.iter().enumerate() {
        let _ = writeln!(description, "{}. {}", i + 1, topic.title);
    }
    description
}

pub fn materialize(session: &WorkflowSession, questions: Vec<GeneratedQuestion>) -> MaterializedCourse {
    let primary_video = session.lesson_scripts.iter().find(|lesson| {
        lesson.effective_output_type() == OutputType::Video && lesson.video_url.is_some()
    });

    let course = Course {
        id: Uuid::new_v4(),
        title: session.main_topic.clone(),
        description: course_description(session),
        video_url: primary_video.and_then(|l| l.video_url.clone()),
        video_id: primary_video.and_then(|l| l.video_id.clone()),
        video_status: primary_video.and_then(|l| l.video_status),
        pass_percentage: DEFAULT_PASS_PERCENTAGE,
        is_published: false,
    };

    let test = Test {
        id: Uuid::new_v4(),
        course_id: course.id,
        title: format!("{} - Assessment", course.title),
        description: "Test your knowledge of the course material".to_string(),
        passing_score: TEST_PASSING_SCORE,
    };

    let questions = questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| Question {
            id: Uuid::new_v4(),
            test_id: test.id,
            kind: q.kind,
            question_text: q.question_text,
            points: q.points,
            order_index: i as i32,
        })
        .collect();

    MaterializedCourse {
        course,
        test,
        questions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LessonScript, MultipleChoiceData, QuestionKind, RefinedTopic, VideoStatus};
    use crate::state::WorkflowState;
    use chrono::Utc;

    fn session() -> WorkflowSession {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let topic = |title: &str, order| RefinedTopic {
            id: Uuid::new_v4(),
            session_id: id,
            suggestion_id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            learning_goals: vec![],
            estimated_time_min: 10,
            sort_order: order,
            created_at: now,
        };
        let lesson = |title: &str, output_type, url: Option<&str>| LessonScript {
            id: Uuid::new_v4(),
            session_id: id,
            topic_id: Uuid::new_v4(),
            title: title.into(),
            script: "narration".into(),
            duration_min: 5,
            sort_order: 0,
            output_type,
            video_id: url.map(|_| "vid-1".to_string()),
            video_url: url.map(str::to_string),
            video_status: url.map(|_| VideoStatus::Completed),
            video_error: None,
            presentation_status: None,
            created_at: now,
        };
        WorkflowSession {
            id,
            main_topic: "Phishing Awareness".into(),
            target_audience: "staff".into(),
            difficulty_level: "beginner".into(),
            language: "en".into(),
            video_duration_min: 5,
            state: WorkflowState::researching(),
            course_id: None,
            created_at: now,
            updated_at: now,
            suggestions: vec![],
            refined_topics: vec![topic("Email", 0), topic("Links", 1)],
            lesson_scripts: vec![
                lesson("Slides", Some(OutputType::Presentation), Some("https://x/p.mp4")),
                lesson("Email", None, Some("https://x/e.mp4")),
            ],
        }
    }

    #[test]
    fn description_lists_topics_in_order() {
        assert_eq!(
            course_description(&session()),
            "Course generated from AI Workflow.\n\nTopics covered:\n1. Email\n2. Links\n"
        );
    }

    #[test]
    fn primary_video_comes_from_first_video_lesson_with_url() {
        let questions = vec![GeneratedQuestion {
            kind: QuestionKind::MultipleChoice(MultipleChoiceData {
                options: vec!["a".into(), "b".into()],
                correct_indices: vec![0],
                explanation: String::new(),
            }),
            question_text: "Which?".into(),
            points: 10,
        }];
        let made = materialize(&session(), questions);
        assert_eq!(made.course.video_url.as_deref(), Some("https://x/e.mp4"));
        assert_eq!(made.course.pass_percentage, 70);
        assert!(!made.course.is_published);
        assert_eq!(made.test.title, "Phishing Awareness - Assessment");
        assert_eq!(made.test.passing_score, 70);
        assert_eq!(made.questions[0].test_id, made.test.id);
        assert_eq!(made.questions[0].order_index, 0);
    }
}
