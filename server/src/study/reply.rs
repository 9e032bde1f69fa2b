use comms::study::{FreeTextQuestion, MultipleChoiceQuestion, QuizQuestion, QuizType};
use serde_json::Value;

use crate::util::{clip, random_id};

const DECK_TITLE_MAX_CHARS: usize = 80;
const CARD_QUESTION_MAX_CHARS: usize = 240;
const CARD_ANSWER_MAX_CHARS: usize = 500;
const MCQ_PROMPT_MAX_CHARS: usize = 180;
const FREE_TEXT_PROMPT_MAX_CHARS: usize = 400;
const OPTION_MAX_CHARS: usize = 90;
const MAX_OPTIONS: usize = 4;
const ANSWER_MAX_CHARS: usize = 500;
const KEYWORD_MAX_CHARS: usize = 40;
const MAX_KEYWORDS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct CardDraft {
    pub question: String,
    pub answer: String,
}

/// Flashcards as understood from a model reply
#[derive(Debug, Clone, PartialEq)]
pub struct DeckDraft {
    /// May be empty
    pub title: String,
    pub cards: Vec<CardDraft>,
}

/// Quiz questions as understood from a model reply
#[derive(Debug, Clone, PartialEq)]
pub struct QuizDraft {
    /// May be empty
    pub title: String,
    pub questions: Vec<QuizQuestion>,
}

// Models are loose with types, strings, numbers and booleans are all taken as text.
fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(true)) => String::from("true"),
        _ => String::new(),
    }
}

fn trimmed(value: Option<&Value>, max_chars: usize) -> String {
    clip(text_of(value).trim(), max_chars)
}

/// First non empty text among the given keys
fn first_text(item: &Value, keys: &[&str]) -> String {
    keys.iter()
        .map(|key| text_of(item.get(key)))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

fn number_of(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

fn strings_of(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(|item| text_of(Some(item))).collect(),
        _ => Vec::new(),
    }
}

/// Parses the flashcard deck JSON, keeping at most `limit` complete cards.
/// Returns [None] when the text is not JSON or holds no usable card.
pub fn parse_deck_reply(text: &str, limit: usize) -> Option<DeckDraft> {
    let parsed: Value = serde_json::from_str(text).ok()?;

    let cards: Vec<CardDraft> = match parsed.get("cards") {
        Some(Value::Array(cards)) => cards
            .iter()
            .map(|card| CardDraft {
                question: trimmed(card.get("question"), CARD_QUESTION_MAX_CHARS),
                answer: trimmed(card.get("answer"), CARD_ANSWER_MAX_CHARS),
            })
            .filter(|card| !card.question.is_empty() && !card.answer.is_empty())
            .take(limit)
            .collect(),
        _ => Vec::new(),
    };

    if cards.is_empty() {
        return None;
    }

    Some(DeckDraft {
        title: trimmed(parsed.get("deckTitle"), DECK_TITLE_MAX_CHARS),
        cards,
    })
}

fn parse_multiple_choice(item: &Value, prompt: String) -> Option<QuizQuestion> {
    let options: Vec<String> = strings_of(item.get("options"))
        .iter()
        .map(|option| clip(option.trim(), OPTION_MAX_CHARS))
        .filter(|option| !option.is_empty())
        .collect();

    if options.len() < 2 {
        return None;
    }

    let mut deduped: Vec<String> = Vec::new();
    for option in options.iter() {
        if !deduped.contains(option) {
            deduped.push(option.clone());
        }
    }
    deduped.truncate(MAX_OPTIONS);

    let options = if deduped.len() >= 2 {
        deduped
    } else {
        options.into_iter().take(2).collect()
    };

    let correct_option_index = number_of(item.get("correctOptionIndex"))
        .map(|index| index.floor().clamp(0.0, (options.len() - 1) as f64) as usize)
        .unwrap_or(0);

    Some(QuizQuestion::MultipleChoice(MultipleChoiceQuestion {
        id: random_id("quizq"),
        prompt,
        options,
        correct_option_index,
    }))
}

fn parse_free_text(item: &Value, prompt: String) -> Option<QuizQuestion> {
    let answer_text = clip(
        first_text(item, &["answerText", "answer"]).trim(),
        ANSWER_MAX_CHARS,
    );

    if answer_text.is_empty() {
        return None;
    }

    let rubric_keywords = strings_of(item.get("rubricKeywords"))
        .iter()
        .map(|keyword| clip(&keyword.trim().to_lowercase(), KEYWORD_MAX_CHARS))
        .filter(|keyword| !keyword.is_empty())
        .take(MAX_KEYWORDS)
        .collect();

    Some(QuizQuestion::FreeText(FreeTextQuestion {
        id: random_id("quizq"),
        prompt,
        answer_text,
        rubric_keywords,
    }))
}

/// Parses the quiz JSON, keeping at most `limit` usable questions of the given type.
/// Returns [None] when the text is not JSON or holds no usable question.
pub fn parse_quiz_reply(text: &str, quiz_type: QuizType, limit: usize) -> Option<QuizDraft> {
    let parsed: Value = serde_json::from_str(text).ok()?;

    let prompt_limit = match quiz_type {
        QuizType::Mcq => MCQ_PROMPT_MAX_CHARS,
        _ => FREE_TEXT_PROMPT_MAX_CHARS,
    };

    let questions: Vec<QuizQuestion> = match parsed.get("questions") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let prompt = clip(
                    first_text(item, &["questionText", "question", "prompt"]).trim(),
                    prompt_limit,
                );
                if prompt.is_empty() {
                    return None;
                }

                match quiz_type {
                    QuizType::Mcq => parse_multiple_choice(item, prompt),
                    _ => parse_free_text(item, prompt),
                }
            })
            .take(limit)
            .collect(),
        _ => Vec::new(),
    };

    if questions.is_empty() {
        return None;
    }

    let title = clip(
        first_text(&parsed, &["quizTitle", "title"]).trim(),
        DECK_TITLE_MAX_CHARS,
    );

    Some(QuizDraft { title, questions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deck_reply() {
        let text = r#"{
            "deckTitle": "  Cell Biology  ",
            "cards": [
                {"question": " What is ATP? ", "answer": "Energy currency"},
                {"question": "", "answer": "dropped"},
                {"question": "Powerhouse?", "answer": "Mitochondria"},
                {"question": "Third", "answer": "over the limit"}
            ]
        }"#;

        let deck = parse_deck_reply(text, 2).unwrap();

        assert_eq!(deck.title, "Cell Biology");
        assert_eq!(
            deck.cards,
            vec![
                CardDraft {
                    question: "What is ATP?".to_string(),
                    answer: "Energy currency".to_string()
                },
                CardDraft {
                    question: "Powerhouse?".to_string(),
                    answer: "Mitochondria".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_deck_reply_rejects_unusable_replies() {
        assert_eq!(parse_deck_reply("not json", 10), None);
        assert_eq!(parse_deck_reply(r#"{"deckTitle":"x","cards":[]}"#, 10), None);
        assert_eq!(parse_deck_reply(r#"{"cards":"nope"}"#, 10), None);
    }

    #[test]
    fn test_parse_deck_reply_clips_long_fields() {
        let text = serde_json::json!({
            "deckTitle": "t".repeat(200),
            "cards": [{"question": "q".repeat(500), "answer": "a".repeat(900)}]
        })
        .to_string();

        let deck = parse_deck_reply(&text, 10).unwrap();

        assert_eq!(deck.title.len(), 80);
        assert_eq!(deck.cards[0].question.len(), 240);
        assert_eq!(deck.cards[0].answer.len(), 500);
    }

    #[test]
    fn test_parse_mcq_reply() {
        let text = r#"{
            "quizTitle": "Cells",
            "questions": [
                {"questionText": "Powerhouse?", "options": ["Nucleus", "Mitochondria", "Nucleus", "Ribosome", "Golgi", "Vacuole"], "correctOptionIndex": 1},
                {"question": "Only one option", "options": ["A"], "correctOptionIndex": 0},
                {"prompt": "Index out of range", "options": ["A", "B"], "correctOptionIndex": 7.8},
                {"questionText": "String index", "options": ["A", "B", "C"], "correctOptionIndex": "2"},
                {"questionText": "Duplicates only", "options": ["A", "A", "A"]},
                {"options": ["A", "B"]}
            ]
        }"#;

        let quiz = parse_quiz_reply(text, QuizType::Mcq, 10).unwrap();

        assert_eq!(quiz.title, "Cells");
        assert_eq!(quiz.questions.len(), 4);

        let options_and_index: Vec<(Vec<String>, usize)> = quiz
            .questions
            .iter()
            .map(|question| match question {
                QuizQuestion::MultipleChoice(q) => (q.options.clone(), q.correct_option_index),
                other => panic!("unexpected question {:?}", other),
            })
            .collect();

        assert_eq!(
            options_and_index[0],
            (
                vec![
                    "Nucleus".to_string(),
                    "Mitochondria".to_string(),
                    "Ribosome".to_string(),
                    "Golgi".to_string()
                ],
                1
            )
        );
        assert_eq!(options_and_index[1].1, 1);
        assert_eq!(options_and_index[2].1, 2);
        assert_eq!(
            options_and_index[3],
            (vec!["A".to_string(), "A".to_string()], 0)
        );
        assert!(quiz.questions[0].id().starts_with("quizq_"));
    }

    #[test]
    fn test_parse_free_text_reply() {
        let text = r#"{
            "title": "Thermo",
            "questions": [
                {"questionText": "State the first law", "answerText": "Energy is conserved", "rubricKeywords": [" Energy ", "", "CONSERVED", "a", "b", "c", "d", "e", "f", "g"]},
                {"questionText": "No answer"},
                {"questionText": "Fallback key", "answer": "works"}
            ]
        }"#;

        let quiz = parse_quiz_reply(text, QuizType::Long, 10).unwrap();

        assert_eq!(quiz.title, "Thermo");
        assert_eq!(quiz.questions.len(), 2);

        let QuizQuestion::FreeText(first) = &quiz.questions[0] else {
            panic!("expected a free text question");
        };
        assert_eq!(first.answer_text, "Energy is conserved");
        assert_eq!(first.rubric_keywords.len(), 8);
        assert_eq!(first.rubric_keywords[0], "energy");
        assert_eq!(first.rubric_keywords[1], "conserved");

        let QuizQuestion::FreeText(second) = &quiz.questions[1] else {
            panic!("expected a free text question");
        };
        assert_eq!(second.answer_text, "works");
    }

    #[test]
    fn test_parse_quiz_reply_respects_limit() {
        let text = r#"{"quizTitle":"x","questions":[
            {"questionText":"1","answerText":"a"},
            {"questionText":"2","answerText":"b"},
            {"questionText":"3","answerText":"c"}
        ]}"#;

        let quiz = parse_quiz_reply(text, QuizType::Short, 2).unwrap();

        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(parse_quiz_reply("[]", QuizType::Short, 2), None);
    }
}
