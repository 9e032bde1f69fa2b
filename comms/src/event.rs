use serde::{Deserialize, Serialize};

use crate::snapshot::{
    ChatMessage, MemberSnapshot, ServerSnapshot, ServerSummary, SharedOverlay,
};
use crate::study::{FlashcardDeck, QuestionResult, Quiz, QuizScore, QuizSummary};

/// Sent once to every new session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeReplyEvent {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReplyEvent {
    pub ok: bool,
    pub servers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerListReplyEvent {
    pub servers: Vec<ServerSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDetailReplyEvent {
    pub server: ServerSnapshot,
}

/// Reply for commands which create, join or bind to a membership
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipReplyEvent {
    pub server: ServerSnapshot,
    pub member: MemberSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerLeftReplyEvent {
    pub server_id: String,
    pub member_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySetReplyEvent {
    pub shared_overlay: SharedOverlay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSentReplyEvent {
    pub message: ChatMessage,
}

/// The session is no longer bound to any member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeftReplyEvent {
    pub server_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckListReplyEvent {
    pub decks: Vec<FlashcardDeck>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckReplyEvent {
    pub deck: FlashcardDeck,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckDeletedReplyEvent {
    pub deck_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizListReplyEvent {
    pub quizzes: Vec<QuizSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizReplyEvent {
    pub quiz: Quiz,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResultReplyEvent {
    pub score: QuizScore,
    pub results: Vec<QuestionResult>,
    pub quiz: Quiz,
}

/// Category of a failed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Conflict,
    Unavailable,
    Upstream,
    Internal,
}

/// A command could not be processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReplyEvent {
    /// Name of the command that failed, if it could be decoded
    pub command: Option<String>,
    pub kind: ErrorKind,
    pub error: String,
}

/// State of a study room has changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembersBroadcastEvent {
    pub server: ServerSnapshot,
}

/// A member has posted to the room chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageBroadcastEvent {
    pub server_id: String,
    pub message: ChatMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
/// Events that can be sent to the client
/// Reply events answer a command of the receiving session,
/// broadcast events originate from the study room the session is subscribed to
pub enum Event {
    Welcome(WelcomeReplyEvent),
    Health(HealthReplyEvent),
    ServerList(ServerListReplyEvent),
    ServerDetail(ServerDetailReplyEvent),
    ServerCreated(MembershipReplyEvent),
    ServerJoined(MembershipReplyEvent),
    ServerLeft(ServerLeftReplyEvent),
    Subscribed(MembershipReplyEvent),
    OverlaySet(OverlaySetReplyEvent),
    ChatSent(ChatSentReplyEvent),
    Left(LeftReplyEvent),
    DeckList(DeckListReplyEvent),
    Deck(DeckReplyEvent),
    DeckDeleted(DeckDeletedReplyEvent),
    QuizList(QuizListReplyEvent),
    Quiz(QuizReplyEvent),
    QuizResult(QuizResultReplyEvent),
    Error(ErrorReplyEvent),
    Members(MembersBroadcastEvent),
    ChatMessage(ChatMessageBroadcastEvent),
}
