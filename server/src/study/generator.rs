use async_trait::async_trait;
use comms::study::QuizType;
use serde_json::{json, Value};

use crate::error::StudyError;

/// A single structured generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_text: String,
    /// JSON schema the model output has to follow
    pub response_schema: Value,
}

/// [ContentGenerator] turns a prompt into raw JSON text produced by a language model
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, StudyError>;
}

/// Context shared by every generation request
#[derive(Debug, Clone)]
pub struct GenerationContext<'a> {
    pub server_name: &'a str,
    pub username: &'a str,
    /// Title the user asked for, may be empty
    pub title_hint: &'a str,
    pub prompt: &'a str,
}

pub fn flashcard_request(context: &GenerationContext<'_>, card_count: u32) -> GenerationRequest {
    let system_prompt = [
        "You are a study assistant that creates high-quality flashcards.".to_string(),
        "Output ONLY valid JSON matching the response schema.".to_string(),
        "Create clear and concise cards with one fact/concept per card.".to_string(),
        "Avoid duplicates and avoid cards that are too vague.".to_string(),
        format!("Generate up to {} cards.", card_count),
        format!("Server context: {}", context.server_name),
        format!("User: {}", context.username),
    ]
    .join("\n");

    let mut lines = Vec::new();
    if !context.title_hint.is_empty() {
        lines.push(format!("Deck title hint: {}", context.title_hint));
    }
    lines.push(format!("Topic prompt: {}", context.prompt));
    lines.push(format!("Target cards: {}", card_count));

    GenerationRequest {
        system_prompt,
        user_text: lines.join("\n"),
        response_schema: json!({
            "type": "OBJECT",
            "properties": {
                "deckTitle": { "type": "STRING" },
                "cards": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "question": { "type": "STRING" },
                            "answer": { "type": "STRING" }
                        },
                        "required": ["question", "answer"]
                    }
                }
            },
            "required": ["deckTitle", "cards"]
        }),
    }
}

fn quiz_type_name(quiz_type: QuizType) -> &'static str {
    match quiz_type {
        QuizType::Mcq => "mcq",
        QuizType::Short => "short",
        QuizType::Long => "long",
    }
}

pub fn quiz_request(
    context: &GenerationContext<'_>,
    quiz_type: QuizType,
    question_count: u32,
) -> GenerationRequest {
    let kind = match quiz_type {
        QuizType::Mcq => "multiple choice questions with one clearly correct answer",
        QuizType::Short => "short-answer questions with concise expected answers",
        QuizType::Long => {
            "long-answer or calculation-focused questions requiring deeper explanation"
        }
    };

    let mut system_lines = vec![
        "You are a study assistant that creates practical quizzes.".to_string(),
        "Output ONLY valid JSON matching the response schema.".to_string(),
        format!("Generate {} {}.", question_count, kind),
        "Use clear wording and avoid duplicate questions.".to_string(),
    ];
    if quiz_type == QuizType::Mcq {
        system_lines.extend([
            "For MCQ: keep each question concise (max ~20 words).".to_string(),
            "For MCQ: each answer choice must be short (max ~8 words).".to_string(),
            "For MCQ: avoid long sentence-style options.".to_string(),
        ]);
    }
    system_lines.push(format!("Server context: {}", context.server_name));
    system_lines.push(format!("User: {}", context.username));

    let mut lines = Vec::new();
    if !context.title_hint.is_empty() {
        lines.push(format!("Title hint: {}", context.title_hint));
    }
    lines.push(format!("Topic prompt: {}", context.prompt));
    lines.push(format!("Quiz type: {}", quiz_type_name(quiz_type)));
    lines.push(format!("Question count: {}", question_count));

    GenerationRequest {
        system_prompt: system_lines.join("\n"),
        user_text: lines.join("\n"),
        response_schema: json!({
            "type": "OBJECT",
            "properties": {
                "quizTitle": { "type": "STRING" },
                "questions": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "questionText": { "type": "STRING" },
                            "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                            "correctOptionIndex": { "type": "NUMBER" },
                            "answerText": { "type": "STRING" },
                            "rubricKeywords": { "type": "ARRAY", "items": { "type": "STRING" } }
                        },
                        "required": ["questionText"]
                    }
                }
            },
            "required": ["quizTitle", "questions"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context<'a>(title_hint: &'a str) -> GenerationContext<'a> {
        GenerationContext {
            server_name: "Biology",
            username: "ada",
            title_hint,
            prompt: "cell respiration",
        }
    }

    #[test]
    fn test_flashcard_request() {
        let request = flashcard_request(&context("Cells"), 12);

        assert!(request.system_prompt.contains("Generate up to 12 cards."));
        assert!(request.system_prompt.ends_with("Server context: Biology\nUser: ada"));
        assert_eq!(
            request.user_text,
            "Deck title hint: Cells\nTopic prompt: cell respiration\nTarget cards: 12"
        );
        assert_eq!(request.response_schema["required"], json!(["deckTitle", "cards"]));
    }

    #[test]
    fn test_quiz_request_without_title_hint() {
        let request = quiz_request(&context(""), QuizType::Short, 5);

        assert!(request
            .system_prompt
            .contains("Generate 5 short-answer questions with concise expected answers."));
        assert!(!request.system_prompt.contains("For MCQ"));
        assert_eq!(
            request.user_text,
            "Topic prompt: cell respiration\nQuiz type: short\nQuestion count: 5"
        );
    }

    #[test]
    fn test_mcq_request_adds_formatting_rules() {
        let request = quiz_request(&context(""), QuizType::Mcq, 10);

        assert!(request.system_prompt.contains("For MCQ: avoid long sentence-style options."));
    }
}
