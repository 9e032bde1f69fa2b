use std::collections::BTreeMap;

use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardDeck {
    pub id: String,
    pub title: String,
    pub prompt: String,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
    pub card_count_target: u32,
    pub cards_count: usize,
    pub cards: Vec<Flashcard>,
}

/// Kind of questions a quiz is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    Mcq,
    Short,
    Long,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoiceQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeTextQuestion {
    pub id: String,
    pub prompt: String,
    pub answer_text: String,
    pub rubric_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuizQuestion {
    MultipleChoice(MultipleChoiceQuestion),
    FreeText(FreeTextQuestion),
}

impl QuizQuestion {
    pub fn id(&self) -> &str {
        match self {
            QuizQuestion::MultipleChoice(question) => &question.id,
            QuizQuestion::FreeText(question) => &question.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub quiz_type: QuizType,
    pub created_at: u64,
    pub question_count_target: u32,
    pub questions_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(flatten)]
    pub summary: QuizSummary,
    pub questions: Vec<QuizQuestion>,
}

/// An answer as typed or picked by the user.
/// Multiple choice answers are option indexes, free text answers are strings.
/// Anything else (`null`, booleans, objects) is graded as unanswered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmittedAnswer {
    Index(f64),
    Text(String),
    Other(serde_json::Value),
}

impl Default for SubmittedAnswer {
    fn default() -> Self {
        SubmittedAnswer::Other(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswer {
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub answer: SubmittedAnswer,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SubmittedAnswers {
    List(Vec<QuizAnswer>),
    ByQuestion(BTreeMap<String, SubmittedAnswer>),
    Other(IgnoredAny),
}

/// Reads quiz answers either as a `[{questionId, answer}]` list
/// or as a `{questionId: answer}` map. Any other value means no answers.
pub fn deserialize_answers<'de, D>(deserializer: D) -> Result<Vec<QuizAnswer>, D::Error>
where
    D: Deserializer<'de>,
{
    let answers = match SubmittedAnswers::deserialize(deserializer)? {
        SubmittedAnswers::List(answers) => answers,
        SubmittedAnswers::ByQuestion(answers) => answers
            .into_iter()
            .map(|(question_id, answer)| QuizAnswer {
                question_id,
                answer,
            })
            .collect(),
        SubmittedAnswers::Other(_) => Vec::new(),
    };

    Ok(answers)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: String,
    pub points: f64,
    pub max_points: f64,
    pub is_correct: bool,
    pub is_almost_correct: bool,
    pub feedback: String,
    /// Only reported for free text questions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub submitted_answer: String,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizScore {
    pub earned: f64,
    pub max: usize,
    pub percent: u32,
    pub label: String,
}
