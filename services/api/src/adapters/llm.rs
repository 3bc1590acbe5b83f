//! services/api/src/adapters/llm.rs
//!
//! This module contains the adapter for the content-generating LLM.
//! It implements the `ContentGenerationService` port from the `core` crate against
//! any OpenAI-compatible chat endpoint (OpenAI itself, or a local Ollama).
//!
//! Models are asked for a single JSON object. Replies are parsed leniently: code
//! fences and surrounding prose are stripped, numbers may arrive as strings, and
//! quiz questions are normalized per type and dropped when unusable.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use course_workflow_core::domain::{
    DragDropData, FillBlankData, GeneratedQuestion, MatchingData, MultipleChoiceData,
    OrderingData, QuestionKind,
};
use course_workflow_core::ports::{
    Audience, ContentGenerationService, PortError, PortResult, RefineInput, RefinedDraft,
    ScriptDraft, ScriptInput, SlideDraft, TopicDraft,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Scripts are cut to this many characters when quoted in the quiz prompt.
const QUIZ_SCRIPT_EXCERPT: usize = 1500;
const DEFAULT_POINTS: i32 = 10;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ContentGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiContentAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiContentAdapter {
    /// Creates a new `OpenAiContentAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Sends one system + user exchange and returns the text of the first choice.
    async fn complete(&self, system: &str, user: String) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Content LLM response contained no text content.".to_string())
            })
    }

    async fn complete_json<T: DeserializeOwned>(&self, system: &str, user: String) -> PortResult<T> {
        let raw = self.complete(system, user).await?;
        parse_reply(&raw)
    }
}

const SYSTEM_PROMPT: &str = "You are an expert instructional designer who builds e-learning courses. \
Always respond with a single valid JSON object and nothing else.";

fn audience_line(audience: &Audience) -> String {
    format!(
        "Main topic: {}\nTarget audience: {}\nDifficulty level: {}\nWrite all content in the language with code '{}'.",
        audience.topic,
        or_default(&audience.target_audience, "general learners"),
        or_default(&audience.difficulty_level, "beginner"),
        audience.language
    )
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

//=========================================================================================
// `ContentGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentGenerationService for OpenAiContentAdapter {
    async fn research_topics(&self, audience: &Audience, count: usize) -> PortResult<Vec<TopicDraft>> {
        let prompt = format!(
            "{}\n\nPropose {} distinct subtopics that together make a complete course on the main topic. \
Each subtopic should be teachable in one short video lesson.\n\n\
Respond in this exact format:\n\
{{\"topics\": [{{\"title\": \"...\", \"description\": \"one or two sentences\"}}]}}",
            audience_line(audience),
            count
        );
        let reply: TopicList = self.complete_json(SYSTEM_PROMPT, prompt).await?;
        let topics: Vec<TopicDraft> = reply
            .topics
            .into_iter()
            .filter(|t| !t.title.trim().is_empty())
            .map(|t| TopicDraft {
                title: t.title.trim().to_string(),
                description: t.description,
            })
            .collect();
        info!("Research returned {} topic suggestions.", topics.len());
        Ok(topics)
    }

    async fn refine_topics(
        &self,
        audience: &Audience,
        topics: &[RefineInput],
    ) -> PortResult<Vec<RefinedDraft>> {
        let mut listing = String::new();
        for topic in topics {
            let _ = writeln!(listing, "[{}] {}: {}", topic.index, topic.title, topic.description);
        }
        let prompt = format!(
            "{}\n\nRefine each of the following approved subtopics into a lesson plan entry. \
Keep the bracketed index of every topic in the `index` field and its original title in `originalTitle`.\n\n\
{}\n\
Respond in this exact format:\n\
{{\"topics\": [{{\"index\": 0, \"originalTitle\": \"...\", \"title\": \"...\", \"description\": \"...\", \
\"learningGoals\": [\"...\"], \"estimatedTimeMin\": 5}}]}}",
            audience_line(audience),
            listing
        );
        let reply: RefinedList = self.complete_json(SYSTEM_PROMPT, prompt).await?;
        Ok(reply.topics.into_iter().map(RawRefined::into_draft).collect())
    }

    async fn generate_scripts(
        &self,
        audience: &Audience,
        topics: &[ScriptInput],
        video_duration_min: i32,
    ) -> PortResult<Vec<ScriptDraft>> {
        let mut listing = String::new();
        for topic in topics {
            let _ = writeln!(
                listing,
                "[{}] {}: {}\n    Learning goals: {}",
                topic.index,
                topic.title,
                topic.description,
                topic.learning_goals.join("; ")
            );
        }
        let prompt = format!(
            "{}\n\nWrite a spoken narration script for a video lesson of about {} minutes \
(roughly {} words) for each of the following topics. Scripts are read aloud by a presenter, \
so use plain sentences without headings or stage directions. Keep the bracketed index of every \
topic in the `index` field and its title in `topicTitle`.\n\n\
{}\n\
Respond in this exact format:\n\
{{\"lessons\": [{{\"index\": 0, \"topicTitle\": \"...\", \"title\": \"...\", \"script\": \"...\", \"durationMin\": {}}}]}}",
            audience_line(audience),
            video_duration_min,
            video_duration_min * 150,
            listing,
            video_duration_min
        );
        let reply: ScriptList = self.complete_json(SYSTEM_PROMPT, prompt).await?;
        Ok(reply
            .lessons
            .into_iter()
            .filter(|l| !l.script.trim().is_empty())
            .map(|l| l.into_draft(video_duration_min))
            .collect())
    }

    async fn generate_slides(
        &self,
        lesson_title: &str,
        script: &str,
        language: &str,
    ) -> PortResult<Vec<SlideDraft>> {
        let prompt = format!(
            "Turn the following lesson into a slide presentation of 4 to 8 slides. \
Write all content in the language with code '{}'.\n\
For every slide give a short title, the bullet content (markdown, one bullet per line), \
the narration the presenter speaks on that slide, and 2 to 4 English keywords for a stock photo.\n\n\
Lesson title: {}\n\nLesson script:\n{}\n\n\
Respond in this exact format:\n\
{{\"slides\": [{{\"title\": \"...\", \"content\": \"- ...\", \"script\": \"...\", \"imageKeywords\": \"...\"}}]}}",
            language, lesson_title, script
        );
        let reply: SlideList = self.complete_json(SYSTEM_PROMPT, prompt).await?;
        let slides: Vec<SlideDraft> = reply
            .slides
            .into_iter()
            .filter(|s| !s.title.trim().is_empty() || !s.content.trim().is_empty())
            .map(RawSlide::into_draft)
            .collect();
        if slides.is_empty() {
            return Err(PortError::Unexpected("slide generation returned no slides".to_string()));
        }
        Ok(slides)
    }

    async fn generate_quiz(
        &self,
        topic: &str,
        scripts: &[String],
        language: &str,
        count: usize,
    ) -> PortResult<Vec<GeneratedQuestion>> {
        let mut material = String::new();
        for (i, script) in scripts.iter().enumerate() {
            let _ = writeln!(material, "Lesson {}:\n{}\n", i + 1, excerpt(script, QUIZ_SCRIPT_EXCERPT));
        }
        let prompt = format!(
            "Write {} quiz questions that test the material of the course \"{}\" below. \
Write all content in the language with code '{}'. Mix the question types multiple_choice, \
drag_drop, fill_blank, matching and ordering.\n\n{}\n\
Question data per type:\n\
- multiple_choice: {{\"options\": [\"...\"], \"correctIndices\": [0], \"explanation\": \"...\"}}\n\
- drag_drop: {{\"items\": [\"...\"], \"dropZones\": [\"...\"], \"correctMapping\": {{\"item\": \"zone\"}}, \"explanation\": \"...\"}}\n\
- fill_blank: {{\"template\": \"text with {{{{blank}}}} markers\", \"blanks\": [\"...\"], \"explanation\": \"...\"}}\n\
- matching: {{\"leftItems\": [\"...\"], \"rightItems\": [\"...\"], \"correctPairs\": {{\"left\": \"right\"}}, \"explanation\": \"...\"}}\n\
- ordering: {{\"items\": [\"...\"], \"correctOrder\": [0, 1], \"explanation\": \"...\"}}\n\n\
Respond in this exact format:\n\
{{\"questions\": [{{\"questionType\": \"multiple_choice\", \"questionText\": \"...\", \"questionData\": {{}}, \"points\": 10}}]}}",
            count, topic, language, material
        );
        let reply: QuestionList = self.complete_json(SYSTEM_PROMPT, prompt).await?;

        let total = reply.questions.len();
        let questions: Vec<GeneratedQuestion> = reply
            .questions
            .into_iter()
            .filter_map(|raw| match parse_question(raw) {
                Ok(q) => Some(q),
                Err(reason) => {
                    warn!("Dropping generated question: {}", reason);
                    None
                }
            })
            .collect();
        info!("Quiz generation kept {}/{} questions.", questions.len(), total);
        Ok(questions)
    }
}

//=========================================================================================
// Reply Parsing
//=========================================================================================

fn fence() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").ok())
        .as_ref()
}

/// Pulls the JSON object out of a model reply that may be wrapped in a code fence or prose.
pub fn extract_json(reply: &str) -> &str {
    if let Some(inner) = fence()
        .and_then(|re| re.captures(reply))
        .and_then(|caps| caps.get(1))
    {
        return inner.as_str().trim();
    }
    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if end > start => &reply[start..=end],
        _ => reply.trim(),
    }
}

fn parse_reply<T: DeserializeOwned>(reply: &str) -> PortResult<T> {
    serde_json::from_str(extract_json(reply)).map_err(|e| {
        PortError::Unexpected(format!(
            "could not parse model reply as JSON ({}): {}",
            e,
            excerpt(reply, 200)
        ))
    })
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Narrows a model-supplied count; negative or out-of-range values take `fallback`.
fn small_number(value: Option<i64>, fallback: i32) -> i32 {
    value
        .and_then(|v| i32::try_from(v).ok())
        .filter(|v| *v >= 0)
        .unwrap_or(fallback)
}

/// Accepts integers, floats and numeric strings ("5", "5 minutes").
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    })
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawTopic {
    title: String,
    description: String,
}

#[derive(Deserialize)]
struct TopicList {
    #[serde(default)]
    topics: Vec<RawTopic>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRefined {
    #[serde(default, deserialize_with = "lenient_number")]
    index: Option<i64>,
    #[serde(default)]
    original_title: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    learning_goals: Vec<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    estimated_time_min: Option<i64>,
}

impl RawRefined {
    fn into_draft(self) -> RefinedDraft {
        RefinedDraft {
            source_index: self.index.and_then(|i| usize::try_from(i).ok()),
            original_title: self.original_title,
            title: self.title,
            description: self.description,
            learning_goals: self.learning_goals,
            estimated_time_min: small_number(self.estimated_time_min, 0),
        }
    }
}

#[derive(Deserialize)]
struct RefinedList {
    #[serde(default)]
    topics: Vec<RawRefined>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScript {
    #[serde(default, deserialize_with = "lenient_number")]
    index: Option<i64>,
    #[serde(default)]
    topic_title: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    script: String,
    #[serde(default, deserialize_with = "lenient_number")]
    duration_min: Option<i64>,
}

impl RawScript {
    fn into_draft(self, default_duration: i32) -> ScriptDraft {
        ScriptDraft {
            source_index: self.index.and_then(|i| usize::try_from(i).ok()),
            title: if self.title.trim().is_empty() {
                self.topic_title.clone()
            } else {
                self.title
            },
            topic_title: self.topic_title,
            script: self.script,
            duration_min: small_number(self.duration_min, default_duration),
        }
    }
}

#[derive(Deserialize)]
struct ScriptList {
    #[serde(default)]
    lessons: Vec<RawScript>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSlide {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    script: String,
    #[serde(default)]
    image_keywords: Value,
}

impl RawSlide {
    fn into_draft(self) -> SlideDraft {
        SlideDraft {
            title: self.title,
            content: flatten_text(self.content, "\n"),
            script: self.script,
            image_keywords: flatten_text(self.image_keywords, " "),
        }
    }
}

/// Models sometimes send lists where a string was asked for.
fn flatten_text(value: Value, separator: &str) -> String {
    match value {
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(|v| flatten_text(v, separator))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(separator),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct SlideList {
    #[serde(default)]
    slides: Vec<RawSlide>,
}

#[derive(Deserialize)]
struct QuestionList {
    #[serde(default)]
    questions: Vec<Value>,
}

//=========================================================================================
// Question Normalization
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuestionType {
    MultipleChoice,
    DragDrop,
    FillBlank,
    Matching,
    Ordering,
}

/// Maps the many spellings models use onto a known question type.
fn normalize_question_type(raw: &str) -> Option<QuestionType> {
    let t = raw.trim().to_lowercase().replace(['-', ' '], "_");
    match t.as_str() {
        "multiple_choice" | "multiplechoice" | "mc" | "mcq" => Some(QuestionType::MultipleChoice),
        "drag_drop" | "dragdrop" | "drag_and_drop" | "draganddrop" => Some(QuestionType::DragDrop),
        "fill_blank" | "fillblank" | "fill_in_blank" | "fill_in_the_blank" | "fillintheblank" => {
            Some(QuestionType::FillBlank)
        }
        "matching" | "match" => Some(QuestionType::Matching),
        "ordering" | "order" | "sequence" => Some(QuestionType::Ordering),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    #[serde(default)]
    question_type: String,
    #[serde(default)]
    question_text: String,
    #[serde(default)]
    question_data: Value,
    #[serde(default, deserialize_with = "lenient_number")]
    points: Option<i64>,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawQuestionData {
    options: Vec<String>,
    correct_indices: Vec<i64>,
    items: Vec<String>,
    drop_zones: Vec<String>,
    correct_mapping: BTreeMap<String, String>,
    template: String,
    blanks: Vec<String>,
    left_items: Vec<String>,
    right_items: Vec<String>,
    correct_pairs: BTreeMap<String, String>,
    correct_order: Vec<i64>,
    explanation: String,
}

/// Validates one generated question and fills typed defaults. Errors name the defect.
fn parse_question(raw: Value) -> Result<GeneratedQuestion, String> {
    let raw: RawQuestion = serde_json::from_value(raw).map_err(|e| e.to_string())?;
    let question_type = normalize_question_type(&raw.question_type)
        .ok_or_else(|| format!("unknown question type '{}'", raw.question_type))?;
    if raw.question_text.trim().is_empty() {
        return Err("question text is empty".to_string());
    }
    if raw.question_data.is_null() {
        return Err("question data is missing".to_string());
    }
    let data: RawQuestionData =
        serde_json::from_value(raw.question_data).map_err(|e| format!("question data: {}", e))?;

    let kind = match question_type {
        QuestionType::MultipleChoice => {
            if data.options.len() < 2 {
                return Err("multiple choice needs at least 2 options".to_string());
            }
            let mut correct_indices: Vec<usize> = data
                .correct_indices
                .iter()
                .filter_map(|&i| usize::try_from(i).ok())
                .filter(|&i| i < data.options.len())
                .collect();
            if correct_indices.is_empty() {
                correct_indices.push(0);
            }
            QuestionKind::MultipleChoice(MultipleChoiceData {
                options: data.options,
                correct_indices,
                explanation: data.explanation,
            })
        }
        QuestionType::DragDrop => {
            if data.items.is_empty() || data.drop_zones.is_empty() {
                return Err("drag drop needs items and drop zones".to_string());
            }
            QuestionKind::DragDrop(DragDropData {
                items: data.items,
                drop_zones: data.drop_zones,
                correct_mapping: data.correct_mapping,
                explanation: data.explanation,
            })
        }
        QuestionType::FillBlank => {
            if data.template.trim().is_empty() || data.blanks.is_empty() {
                return Err("fill blank needs a template and blanks".to_string());
            }
            QuestionKind::FillBlank(FillBlankData {
                template: data.template,
                blanks: data.blanks,
                explanation: data.explanation,
            })
        }
        QuestionType::Matching => {
            if data.left_items.is_empty() || data.right_items.is_empty() {
                return Err("matching needs left and right items".to_string());
            }
            QuestionKind::Matching(MatchingData {
                left_items: data.left_items,
                right_items: data.right_items,
                correct_pairs: data.correct_pairs,
                explanation: data.explanation,
            })
        }
        QuestionType::Ordering => {
            if data.items.is_empty() {
                return Err("ordering needs items".to_string());
            }
            let mut correct_order: Vec<usize> = data
                .correct_order
                .iter()
                .filter_map(|&i| usize::try_from(i).ok())
                .collect();
            if correct_order.len() != data.items.len() {
                correct_order = (0..data.items.len()).collect();
            }
            QuestionKind::Ordering(OrderingData {
                items: data.items,
                correct_order,
                explanation: data.explanation,
            })
        }
    };

    Ok(GeneratedQuestion {
        kind,
        question_text: raw.question_text,
        points: small_number(raw.points.filter(|p| *p > 0), DEFAULT_POINTS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_json_from_code_fences_and_prose() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("Sure! Here you go: {\"a\": {\"b\": 2}} Enjoy."), "{\"a\": {\"b\": 2}}");
        assert_eq!(extract_json("  no json here "), "no json here");
    }

    #[test]
    fn refined_reply_tolerates_string_numbers() {
        let reply = r#"{"topics": [{"index": "1", "originalTitle": "Phishing", "title": "Spotting phishing",
            "description": "d", "learningGoals": ["g"], "estimatedTimeMin": "7 minutes"}]}"#;
        let list: RefinedList = parse_reply(reply).unwrap();
        let draft = list.topics.into_iter().next().unwrap().into_draft();
        assert_eq!(draft.source_index, Some(1));
        assert_eq!(draft.estimated_time_min, 7);
        assert_eq!(draft.original_title, "Phishing");
    }

    #[test]
    fn oversized_model_numbers_fall_back_instead_of_wrapping() {
        let reply = r#"{"topics": [{"title": "t", "estimatedTimeMin": 4294967311}]}"#;
        let list: RefinedList = parse_reply(reply).unwrap();
        assert_eq!(list.topics.into_iter().next().unwrap().into_draft().estimated_time_min, 0);

        let reply = r#"{"lessons": [{"topicTitle": "t", "script": "s", "durationMin": -3}]}"#;
        let list: ScriptList = parse_reply(reply).unwrap();
        assert_eq!(list.lessons.into_iter().next().unwrap().into_draft(5).duration_min, 5);

        let question = parse_question(json!({
            "questionType": "multiple_choice",
            "questionText": "Is MFA useful?",
            "questionData": {"options": ["Yes", "No"], "correctIndices": [0]},
            "points": 9999999999i64
        }))
        .unwrap();
        assert_eq!(question.points, DEFAULT_POINTS);
    }

    #[test]
    fn script_without_title_falls_back_to_topic_title() {
        let list: ScriptList =
            parse_reply(r#"{"lessons": [{"topicTitle": "Passwords", "script": "Hello."}]}"#).unwrap();
        let draft = list.lessons.into_iter().next().unwrap().into_draft(5);
        assert_eq!(draft.title, "Passwords");
        assert_eq!(draft.source_index, None);
        assert_eq!(draft.duration_min, 5);
    }

    #[test]
    fn slide_lists_are_flattened_to_text() {
        let list: SlideList = parse_reply(
            r#"{"slides": [{"title": "Intro", "content": ["- a", "- b"], "script": "s", "imageKeywords": ["lock", "key"]}]}"#,
        )
        .unwrap();
        let slide = list.slides.into_iter().next().unwrap().into_draft();
        assert_eq!(slide.content, "- a\n- b");
        assert_eq!(slide.image_keywords, "lock key");
    }

    #[test]
    fn question_types_are_normalized() {
        assert_eq!(normalize_question_type("Multiple-Choice"), Some(QuestionType::MultipleChoice));
        assert_eq!(normalize_question_type("fill in the blank"), Some(QuestionType::FillBlank));
        assert_eq!(normalize_question_type("drag and drop"), Some(QuestionType::DragDrop));
        assert_eq!(normalize_question_type("sequence"), Some(QuestionType::Ordering));
        assert_eq!(normalize_question_type("essay"), None);
    }

    #[test]
    fn multiple_choice_gets_default_answer_and_points() {
        let q = parse_question(json!({
            "questionType": "mcq",
            "questionText": "Which is strongest?",
            "questionData": {"options": ["a", "b", "c"], "correctIndices": [7]},
            "points": "abc"
        }))
        .unwrap();
        assert_eq!(q.points, DEFAULT_POINTS);
        match q.kind {
            QuestionKind::MultipleChoice(data) => assert_eq!(data.correct_indices, vec![0]),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn ordering_without_answer_defaults_to_sequence() {
        let q = parse_question(json!({
            "questionType": "ordering",
            "questionText": "Order the steps",
            "questionData": {"items": ["x", "y", "z"]},
            "points": 5
        }))
        .unwrap();
        assert_eq!(q.points, 5);
        match q.kind {
            QuestionKind::Ordering(data) => assert_eq!(data.correct_order, vec![0, 1, 2]),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn unusable_questions_are_rejected() {
        assert!(parse_question(json!({
            "questionType": "multiple_choice",
            "questionText": "Only one option?",
            "questionData": {"options": ["a"]}
        }))
        .is_err());
        assert!(parse_question(json!({
            "questionType": "essay",
            "questionText": "Discuss.",
            "questionData": {}
        }))
        .is_err());
        assert!(parse_question(json!({
            "questionType": "matching",
            "questionText": "Match",
        }))
        .is_err());
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("äöüß", 2), "äö...");
        assert_eq!(excerpt("short", 10), "short");
    }
}
