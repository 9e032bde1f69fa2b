use std::collections::HashMap;

use comms::study::{FlashcardDeck, Quiz, QuizSummary};

use crate::util::username_key;

const MAX_DECKS_PER_USER: usize = 60;
const MAX_QUIZZES_PER_USER: usize = 80;

fn owner_key(username: &str) -> String {
    match username_key(username) {
        key if key.is_empty() => String::from("guest"),
        key => key,
    }
}

/// Appends `item` and drops the oldest entries above `cap`
fn push_capped<T>(items: &mut Vec<T>, item: T, cap: usize) {
    items.push(item);
    if items.len() > cap {
        let overflow = items.len() - cap;
        items.drain(..overflow);
    }
}

/// Newest first, equal timestamps keep the order they were stored in
fn newest_first<T: Clone>(items: &[T], created_at: impl Fn(&T) -> u64) -> Vec<T> {
    let mut sorted = items.to_vec();
    sorted.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    sorted
}

/// Flashcard decks and quizzes of every user, kept in memory
#[derive(Debug, Default)]
pub struct StudyLibrary {
    decks: HashMap<String, Vec<FlashcardDeck>>,
    quizzes: HashMap<String, Vec<Quiz>>,
}

impl StudyLibrary {
    pub fn decks(&self, username: &str) -> Vec<FlashcardDeck> {
        self.decks
            .get(&owner_key(username))
            .map(|decks| newest_first(decks, |deck| deck.created_at))
            .unwrap_or_default()
    }

    pub fn deck(&self, username: &str, deck_id: &str) -> Option<&FlashcardDeck> {
        self.decks
            .get(&owner_key(username))?
            .iter()
            .find(|deck| deck.id == deck_id)
    }

    pub fn deck_mut(&mut self, username: &str, deck_id: &str) -> Option<&mut FlashcardDeck> {
        self.decks
            .get_mut(&owner_key(username))?
            .iter_mut()
            .find(|deck| deck.id == deck_id)
    }

    pub fn insert_deck(&mut self, username: &str, deck: FlashcardDeck) {
        let decks = self.decks.entry(owner_key(username)).or_default();
        push_capped(decks, deck, MAX_DECKS_PER_USER);
    }

    /// Returns true if the deck existed
    pub fn remove_deck(&mut self, username: &str, deck_id: &str) -> bool {
        let Some(decks) = self.decks.get_mut(&owner_key(username)) else {
            return false;
        };

        match decks.iter().position(|deck| deck.id == deck_id) {
            Some(index) => {
                decks.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn quiz_summaries(&self, username: &str) -> Vec<QuizSummary> {
        self.quizzes
            .get(&owner_key(username))
            .map(|quizzes| {
                newest_first(quizzes, |quiz| quiz.summary.created_at)
                    .into_iter()
                    .map(|quiz| quiz.summary)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn quiz(&self, username: &str, quiz_id: &str) -> Option<&Quiz> {
        self.quizzes
            .get(&owner_key(username))?
            .iter()
            .find(|quiz| quiz.summary.id == quiz_id)
    }

    pub fn insert_quiz(&mut self, username: &str, quiz: Quiz) {
        let quizzes = self.quizzes.entry(owner_key(username)).or_default();
        push_capped(quizzes, quiz, MAX_QUIZZES_PER_USER);
    }
}

#[cfg(test)]
mod tests {
    use comms::study::QuizType;

    use super::*;

    fn deck(id: &str, created_at: u64) -> FlashcardDeck {
        FlashcardDeck {
            id: id.to_string(),
            title: "Deck".to_string(),
            prompt: "prompt".to_string(),
            created_at,
            updated_at: None,
            card_count_target: 10,
            cards_count: 0,
            cards: vec![],
        }
    }

    fn quiz(id: &str, created_at: u64) -> Quiz {
        Quiz {
            summary: QuizSummary {
                id: id.to_string(),
                title: "Quiz".to_string(),
                prompt: "prompt".to_string(),
                quiz_type: QuizType::Mcq,
                created_at,
                question_count_target: 10,
                questions_count: 0,
            },
            questions: vec![],
        }
    }

    fn ids(decks: &[FlashcardDeck]) -> Vec<&str> {
        decks.iter().map(|deck| deck.id.as_str()).collect()
    }

    #[test]
    fn test_decks_are_listed_newest_first() {
        let mut library = StudyLibrary::default();
        library.insert_deck("ada", deck("deck_old", 1));
        library.insert_deck("ada", deck("deck_new", 3));
        library.insert_deck("ada", deck("deck_mid", 2));
        library.insert_deck("ada", deck("deck_mid_later", 2));

        assert_eq!(
            ids(&library.decks("ada")),
            vec!["deck_new", "deck_mid", "deck_mid_later", "deck_old"]
        );
    }

    #[test]
    fn test_usernames_are_case_insensitive_and_default_to_guest() {
        let mut library = StudyLibrary::default();
        library.insert_deck("  Ada ", deck("deck_1", 1));
        library.insert_deck("", deck("deck_2", 1));

        assert_eq!(ids(&library.decks("ada")), vec!["deck_1"]);
        assert!(library.deck("ADA", "deck_1").is_some());
        assert_eq!(ids(&library.decks("Guest")), vec!["deck_2"]);
        assert!(library.decks("grace").is_empty());
    }

    #[test]
    fn test_deck_cap_drops_oldest() {
        let mut library = StudyLibrary::default();
        for i in 0..(MAX_DECKS_PER_USER + 2) {
            library.insert_deck("ada", deck(&format!("deck_{}", i), i as u64));
        }

        let decks = library.decks("ada");
        assert_eq!(decks.len(), MAX_DECKS_PER_USER);
        assert!(library.deck("ada", "deck_0").is_none());
        assert!(library.deck("ada", "deck_1").is_none());
        assert!(library.deck("ada", "deck_2").is_some());
    }

    #[test]
    fn test_remove_deck() {
        let mut library = StudyLibrary::default();
        library.insert_deck("ada", deck("deck_1", 1));

        assert!(!library.remove_deck("grace", "deck_1"));
        assert!(library.remove_deck("ada", "deck_1"));
        assert!(!library.remove_deck("ada", "deck_1"));
        assert!(library.decks("ada").is_empty());
    }

    #[test]
    fn test_quizzes() {
        let mut library = StudyLibrary::default();
        for i in 0..(MAX_QUIZZES_PER_USER + 1) {
            library.insert_quiz("ada", quiz(&format!("quiz_{}", i), i as u64));
        }

        let summaries = library.quiz_summaries("ada");
        assert_eq!(summaries.len(), MAX_QUIZZES_PER_USER);
        assert_eq!(summaries[0].id, format!("quiz_{}", MAX_QUIZZES_PER_USER));
        assert!(library.quiz("ada", "quiz_0").is_none());
        assert!(library.quiz("ada", "quiz_1").is_some());
    }
}
