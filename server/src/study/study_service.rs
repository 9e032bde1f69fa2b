use std::sync::Arc;

use comms::command::{
    CreateDeckCommand, CreateQuizCommand, DeckCommand, GetQuizCommand, ListStudyItemsCommand,
    RegenerateDeckCommand, SubmitQuizCommand,
};
use comms::event::QuizResultReplyEvent;
use comms::study::{Flashcard, FlashcardDeck, Quiz, QuizSummary, QuizType};
use tokio::sync::Mutex;
use tracing::info;

use super::generator::{flashcard_request, quiz_request, ContentGenerator, GenerationContext};
use super::library::StudyLibrary;
use super::reply::{parse_deck_reply, parse_quiz_reply, CardDraft};
use super::scoring::grade_quiz;
use crate::error::StudyError;
use crate::util::{clamp_count, clip, normalize_name, now_millis, random_id};

const PROMPT_MAX_CHARS: usize = 1200;
const TITLE_MAX_CHARS: usize = 80;
const MIN_ITEM_COUNT: u32 = 1;
const MAX_ITEM_COUNT: u32 = 50;
const DEFAULT_ITEM_COUNT: u32 = 10;

fn username_of(username: &Option<String>) -> String {
    normalize_name(username.as_deref(), "Guest")
}

fn server_name_of(server_name: &Option<String>) -> String {
    normalize_name(server_name.as_deref(), "My Server")
}

fn title_hint_of(title: &Option<String>) -> String {
    clip(title.as_deref().unwrap_or_default().trim(), TITLE_MAX_CHARS)
}

fn prompt_of(prompt: &str) -> Result<String, StudyError> {
    match clip(prompt.trim(), PROMPT_MAX_CHARS) {
        prompt if prompt.is_empty() => Err(StudyError::PromptRequired),
        prompt => Ok(prompt),
    }
}

fn item_count(count: Option<f64>) -> u32 {
    clamp_count(count, MIN_ITEM_COUNT, MAX_ITEM_COUNT, DEFAULT_ITEM_COUNT)
}

fn required_id(id: &str, missing: StudyError) -> Result<&str, StudyError> {
    match id.trim() {
        "" => Err(missing),
        id => Ok(id),
    }
}

/// First non empty title of the candidates
fn pick_title(candidates: [&str; 2], fallback: &str) -> String {
    candidates
        .into_iter()
        .find(|title| !title.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn to_flashcards(cards: Vec<CardDraft>) -> Vec<Flashcard> {
    cards
        .into_iter()
        .map(|card| Flashcard {
            id: random_id("card"),
            question: card.question,
            answer: card.answer,
        })
        .collect()
}

/// [StudyService] owns the flashcard and quiz library of every user
/// and generates new study material through an optional [ContentGenerator].
/// The library lock is never held while content is being generated.
pub struct StudyService {
    library: Mutex<StudyLibrary>,
    generator: Option<Arc<dyn ContentGenerator>>,
}

impl std::fmt::Debug for StudyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudyService")
            .field("generator", &self.generator.is_some())
            .finish()
    }
}

impl StudyService {
    pub fn new(generator: Option<Arc<dyn ContentGenerator>>) -> Self {
        StudyService {
            library: Mutex::new(StudyLibrary::default()),
            generator,
        }
    }

    fn generator(&self) -> Result<&Arc<dyn ContentGenerator>, StudyError> {
        self.generator
            .as_ref()
            .ok_or(StudyError::GeneratorUnavailable)
    }

    pub async fn list_decks(&self, cmd: &ListStudyItemsCommand) -> Vec<FlashcardDeck> {
        self.library.lock().await.decks(&username_of(&cmd.username))
    }

    pub async fn get_deck(&self, cmd: &DeckCommand) -> Result<FlashcardDeck, StudyError> {
        let deck_id = required_id(&cmd.deck_id, StudyError::DeckIdRequired)?;

        self.library
            .lock()
            .await
            .deck(&username_of(&cmd.username), deck_id)
            .cloned()
            .ok_or(StudyError::DeckNotFound)
    }

    pub async fn create_deck(&self, cmd: &CreateDeckCommand) -> Result<FlashcardDeck, StudyError> {
        let username = username_of(&cmd.username);
        let server_name = server_name_of(&cmd.server_name);
        let title_hint = title_hint_of(&cmd.title);
        let prompt = prompt_of(&cmd.prompt)?;
        let card_count = item_count(cmd.card_count);
        let generator = self.generator()?;

        let request = flashcard_request(
            &GenerationContext {
                server_name: &server_name,
                username: &username,
                title_hint: &title_hint,
                prompt: &prompt,
            },
            card_count,
        );
        let reply = generator.generate(request).await?;
        let draft =
            parse_deck_reply(&reply, card_count as usize).ok_or(StudyError::InvalidDeckReply)?;

        let cards = to_flashcards(draft.cards);
        let deck = FlashcardDeck {
            id: random_id("deck"),
            title: pick_title([title_hint.as_str(), draft.title.as_str()], "Untitled Deck"),
            prompt,
            created_at: now_millis(),
            updated_at: None,
            card_count_target: card_count,
            cards_count: cards.len(),
            cards,
        };

        self.library
            .lock()
            .await
            .insert_deck(&username, deck.clone());
        info!(deck_id = %deck.id, %username, cards = deck.cards_count, "flashcard deck created");

        Ok(deck)
    }

    /// Replaces the cards of an existing deck, keeping its title and prompt
    pub async fn regenerate_deck(
        &self,
        cmd: &RegenerateDeckCommand,
    ) -> Result<FlashcardDeck, StudyError> {
        let username = username_of(&cmd.username);
        let deck_id = required_id(&cmd.deck_id, StudyError::DeckIdRequired)?;
        let card_count = item_count(cmd.card_count);

        let (title, prompt) = {
            let library = self.library.lock().await;
            let deck = library
                .deck(&username, deck_id)
                .ok_or(StudyError::DeckNotFound)?;
            (deck.title.clone(), deck.prompt.clone())
        };

        let generator = self.generator()?;
        let server_name = server_name_of(&cmd.server_name);
        let request = flashcard_request(
            &GenerationContext {
                server_name: &server_name,
                username: &username,
                title_hint: &title,
                prompt: &prompt,
            },
            card_count,
        );
        let reply = generator.generate(request).await?;
        let draft =
            parse_deck_reply(&reply, card_count as usize).ok_or(StudyError::InvalidDeckReply)?;

        // the deck may have been deleted while generating
        let mut library = self.library.lock().await;
        let deck = library
            .deck_mut(&username, deck_id)
            .ok_or(StudyError::DeckNotFound)?;
        deck.cards = to_flashcards(draft.cards);
        deck.cards_count = deck.cards.len();
        deck.card_count_target = card_count;
        deck.updated_at = Some(now_millis());
        info!(deck_id = %deck.id, %username, cards = deck.cards_count, "flashcard deck regenerated");

        Ok(deck.clone())
    }

    /// Returns the id of the deleted deck
    pub async fn delete_deck(&self, cmd: &DeckCommand) -> Result<String, StudyError> {
        let deck_id = required_id(&cmd.deck_id, StudyError::DeckIdRequired)?;

        if self
            .library
            .lock()
            .await
            .remove_deck(&username_of(&cmd.username), deck_id)
        {
            Ok(deck_id.to_string())
        } else {
            Err(StudyError::DeckNotFound)
        }
    }

    pub async fn list_quizzes(&self, cmd: &ListStudyItemsCommand) -> Vec<QuizSummary> {
        self.library
            .lock()
            .await
            .quiz_summaries(&username_of(&cmd.username))
    }

    pub async fn get_quiz(&self, cmd: &GetQuizCommand) -> Result<Quiz, StudyError> {
        let quiz_id = required_id(&cmd.quiz_id, StudyError::QuizIdRequired)?;

        self.library
            .lock()
            .await
            .quiz(&username_of(&cmd.username), quiz_id)
            .cloned()
            .ok_or(StudyError::QuizNotFound)
    }

    pub async fn create_quiz(&self, cmd: &CreateQuizCommand) -> Result<Quiz, StudyError> {
        let username = username_of(&cmd.username);
        let server_name = server_name_of(&cmd.server_name);
        let title_hint = title_hint_of(&cmd.title);
        let prompt = prompt_of(&cmd.prompt)?;
        let quiz_type = cmd.quiz_type.unwrap_or(QuizType::Mcq);
        let question_count = item_count(cmd.question_count);
        let generator = self.generator()?;

        let request = quiz_request(
            &GenerationContext {
                server_name: &server_name,
                username: &username,
                title_hint: &title_hint,
                prompt: &prompt,
            },
            quiz_type,
            question_count,
        );
        let reply = generator.generate(request).await?;
        let draft = parse_quiz_reply(&reply, quiz_type, question_count as usize)
            .ok_or(StudyError::InvalidQuizReply)?;

        let quiz = Quiz {
            summary: QuizSummary {
                id: random_id("quiz"),
                title: pick_title([title_hint.as_str(), draft.title.as_str()], "Untitled Quiz"),
                prompt,
                quiz_type,
                created_at: now_millis(),
                question_count_target: question_count,
                questions_count: draft.questions.len(),
            },
            questions: draft.questions,
        };

        self.library
            .lock()
            .await
            .insert_quiz(&username, quiz.clone());
        info!(quiz_id = %quiz.summary.id, %username, questions = quiz.summary.questions_count, "quiz created");

        Ok(quiz)
    }

    pub async fn submit_quiz(
        &self,
        cmd: &SubmitQuizCommand,
    ) -> Result<QuizResultReplyEvent, StudyError> {
        let quiz_id = required_id(&cmd.quiz_id, StudyError::QuizIdRequired)?;
        let quiz = self
            .library
            .lock()
            .await
            .quiz(&username_of(&cmd.username), quiz_id)
            .cloned()
            .ok_or(StudyError::QuizNotFound)?;

        let (score, results) = grade_quiz(quiz.summary.quiz_type, &quiz.questions, &cmd.answers);

        Ok(QuizResultReplyEvent {
            score,
            results,
            quiz,
        })
    }
}
