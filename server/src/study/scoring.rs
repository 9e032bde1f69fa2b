use std::collections::{HashMap, HashSet};

use comms::study::{
    QuestionResult, QuizAnswer, QuizQuestion, QuizScore, QuizType, SubmittedAnswer,
};

use crate::util::clip;

const SUBMITTED_ANSWER_MAX_CHARS: usize = 1200;
const LONG_ANSWER_MIN_CHARS: usize = 40;

/// Outcome of comparing a free text answer with its reference answer
#[derive(Debug, Clone, PartialEq)]
pub struct FreeTextScore {
    pub points: f64,
    pub correct: bool,
    pub almost: bool,
    /// Blended similarity in `0.0..=1.0`
    pub score: f64,
    pub feedback: &'static str,
}

impl FreeTextScore {
    fn zero(feedback: &'static str) -> Self {
        FreeTextScore {
            points: 0.0,
            correct: false,
            almost: false,
            score: 0.0,
            feedback,
        }
    }
}

/// Lowercases and reduces the text to ascii letters, digits and single spaces
pub fn normalize_comparable_text(value: &str) -> String {
    let replaced: String = value
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn token_set(value: &str) -> HashSet<String> {
    normalize_comparable_text(value)
        .split(' ')
        .filter(|token| token.len() >= 3)
        .map(String::from)
        .collect()
}

/// Sørensen–Dice coefficient over character bigrams of the normalized texts
pub fn bigram_dice_coefficient(a: &str, b: &str) -> f64 {
    let left = normalize_comparable_text(a);
    let right = normalize_comparable_text(b);

    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    if left == right {
        return 1.0;
    }
    if left.len() < 2 || right.len() < 2 {
        return 0.0;
    }

    // normalized text is ascii only, byte windows are character bigrams
    let mut left_bigrams: HashMap<&[u8], usize> = HashMap::new();
    for gram in left.as_bytes().windows(2) {
        *left_bigrams.entry(gram).or_insert(0) += 1;
    }

    let mut overlap = 0;
    for gram in right.as_bytes().windows(2) {
        if let Some(count) = left_bigrams.get_mut(gram) {
            if *count > 0 {
                overlap += 1;
                *count -= 1;
            }
        }
    }

    let total = (left.len() - 1) + (right.len() - 1);

    (2 * overlap) as f64 / total as f64
}

/// Scores a free text answer against the reference answer and rubric keywords
pub fn score_free_text_answer(
    user_answer: &str,
    expected_answer: &str,
    rubric_keywords: &[String],
    quiz_type: QuizType,
) -> FreeTextScore {
    let user_text = user_answer.trim();
    let expected_text = expected_answer.trim();

    if user_text.is_empty() {
        return FreeTextScore::zero("No answer submitted.");
    }

    let user_norm = normalize_comparable_text(user_text);
    let expected_norm = normalize_comparable_text(expected_text);

    if expected_norm.is_empty() {
        return FreeTextScore::zero("No reference answer configured.");
    }

    let expected_tokens = token_set(expected_text);
    let user_tokens = token_set(user_text);
    let overlap_score = if expected_tokens.is_empty() {
        if user_norm.contains(&expected_norm) {
            1.0
        } else {
            0.0
        }
    } else {
        expected_tokens.intersection(&user_tokens).count() as f64 / expected_tokens.len() as f64
    };

    let keywords: Vec<String> = rubric_keywords
        .iter()
        .map(|keyword| normalize_comparable_text(keyword))
        .filter(|keyword| !keyword.is_empty())
        .collect();
    let keyword_score = if keywords.is_empty() {
        overlap_score
    } else {
        let hits = keywords
            .iter()
            .filter(|keyword| user_norm.contains(keyword.as_str()))
            .count();
        hits as f64 / keywords.len() as f64
    };

    let string_score = bigram_dice_coefficient(&user_norm, &expected_norm);

    let long_answer_penalty = if quiz_type == QuizType::Long
        && user_norm.len() < LONG_ANSWER_MIN_CHARS
    {
        (user_norm.len() as f64 / LONG_ANSWER_MIN_CHARS as f64).max(0.55)
    } else {
        1.0
    };

    let blended =
        (0.45 * overlap_score + 0.35 * string_score + 0.2 * keyword_score) * long_answer_penalty;
    let exact_match = user_norm.contains(&expected_norm);
    let score = if exact_match {
        1.0
    } else {
        blended.clamp(0.0, 1.0)
    };

    let (correct_threshold, almost_threshold) = match quiz_type {
        QuizType::Long => (0.55, 0.38),
        _ => (0.62, 0.44),
    };

    if score >= correct_threshold {
        FreeTextScore {
            points: 1.0,
            correct: true,
            almost: false,
            score,
            feedback: "Correct answer.",
        }
    } else if score >= almost_threshold {
        FreeTextScore {
            points: 0.5,
            correct: false,
            almost: true,
            score,
            feedback: "Almost correct. You have the main idea but missed some details.",
        }
    } else {
        FreeTextScore {
            points: 0.0,
            correct: false,
            almost: false,
            score,
            feedback: "Not quite correct yet. Review the expected answer and try again.",
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn score_label(percent: u32) -> &'static str {
    if percent >= 85 {
        "Excellent"
    } else if percent >= 70 {
        "Good"
    } else if percent >= 50 {
        "Fair"
    } else {
        "Needs Review"
    }
}

fn answer_as_text(answer: Option<&SubmittedAnswer>) -> String {
    match answer {
        Some(SubmittedAnswer::Text(text)) => text.clone(),
        Some(SubmittedAnswer::Index(value)) if value.fract() == 0.0 && value.is_finite() => {
            format!("{}", *value as i64)
        }
        Some(SubmittedAnswer::Index(value)) => value.to_string(),
        Some(SubmittedAnswer::Other(_)) | None => String::new(),
    }
}

fn answer_as_index(answer: Option<&SubmittedAnswer>) -> Option<f64> {
    match answer {
        Some(SubmittedAnswer::Index(value)) if value.is_finite() => Some(*value),
        Some(SubmittedAnswer::Text(text)) => {
            text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
        }
        _ => None,
    }
}

fn option_at(options: &[String], index: f64) -> String {
    if index >= 0.0 && index.fract() == 0.0 {
        options.get(index as usize).cloned().unwrap_or_default()
    } else {
        String::new()
    }
}

/// Grades every question of a quiz. Questions without a submitted answer earn no points.
pub fn grade_quiz(
    quiz_type: QuizType,
    questions: &[QuizQuestion],
    answers: &[QuizAnswer],
) -> (QuizScore, Vec<QuestionResult>) {
    let answers: HashMap<&str, &SubmittedAnswer> = answers
        .iter()
        .filter(|answer| !answer.question_id.trim().is_empty())
        .map(|answer| (answer.question_id.trim(), &answer.answer))
        .collect();

    let mut total = 0.0;
    let results: Vec<QuestionResult> = questions
        .iter()
        .map(|question| {
            let submitted = answers.get(question.id()).copied();

            let result = match question {
                QuizQuestion::MultipleChoice(question) => {
                    let selected = answer_as_index(submitted);
                    let expected = question.correct_option_index as f64;
                    let is_correct = selected == Some(expected);

                    QuestionResult {
                        question_id: question.id.clone(),
                        points: if is_correct { 1.0 } else { 0.0 },
                        max_points: 1.0,
                        is_correct,
                        is_almost_correct: false,
                        feedback: String::from(if is_correct {
                            "Correct answer."
                        } else {
                            "Incorrect. Check the correct option and try again."
                        }),
                        similarity: None,
                        submitted_answer: selected
                            .map(|index| option_at(&question.options, index))
                            .unwrap_or_default(),
                        correct_answer: option_at(&question.options, expected),
                    }
                }
                QuizQuestion::FreeText(question) => {
                    let submitted = answer_as_text(submitted);
                    let scored = score_free_text_answer(
                        &submitted,
                        &question.answer_text,
                        &question.rubric_keywords,
                        quiz_type,
                    );

                    QuestionResult {
                        question_id: question.id.clone(),
                        points: scored.points,
                        max_points: 1.0,
                        is_correct: scored.correct,
                        is_almost_correct: scored.almost,
                        feedback: String::from(scored.feedback),
                        similarity: Some(round_to(scored.score, 3)),
                        submitted_answer: clip(submitted.trim(), SUBMITTED_ANSWER_MAX_CHARS),
                        correct_answer: question.answer_text.clone(),
                    }
                }
            };

            total += result.points;
            result
        })
        .collect();

    let max = questions.len();
    let percent = if max == 0 {
        0
    } else {
        ((total / max as f64) * 100.0).round().clamp(0.0, 100.0) as u32
    };

    (
        QuizScore {
            earned: round_to(total, 2),
            max,
            percent,
            label: String::from(score_label(percent)),
        },
        results,
    )
}
