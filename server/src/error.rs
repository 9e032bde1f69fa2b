use comms::event::ErrorKind;
use thiserror::Error;

/// Failures of study room operations
#[derive(Debug, Error, PartialEq)]
pub enum RoomError {
    #[error("Server name is required")]
    ServerNameRequired,
    #[error("Join code is required")]
    JoinCodeRequired,
    #[error("serverId and memberId are required")]
    MembershipIdsRequired,
    #[error("Username already taken. Choose another one.")]
    UsernameTaken,
    #[error("Server code not found")]
    JoinCodeNotFound,
    #[error("Server is full")]
    ServerFull,
    #[error("Server not found")]
    ServerNotFound,
    #[error("Member not found in server")]
    MemberNotInServer,
    #[error("Member not found")]
    MemberNotFound,
    #[error("Not in a server")]
    NotSubscribed,
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Invalid URL")]
    InvalidUrl,
}

impl RoomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoomError::ServerNameRequired
            | RoomError::JoinCodeRequired
            | RoomError::MembershipIdsRequired
            | RoomError::NotSubscribed
            | RoomError::EmptyMessage
            | RoomError::InvalidUrl => ErrorKind::BadRequest,
            RoomError::UsernameTaken | RoomError::ServerFull => ErrorKind::Conflict,
            RoomError::JoinCodeNotFound
            | RoomError::ServerNotFound
            | RoomError::MemberNotInServer
            | RoomError::MemberNotFound => ErrorKind::NotFound,
        }
    }
}

/// Failures of flashcard and quiz operations
#[derive(Debug, Error, PartialEq)]
pub enum StudyError {
    #[error("Prompt is required")]
    PromptRequired,
    #[error("deckId is required")]
    DeckIdRequired,
    #[error("Deck not found")]
    DeckNotFound,
    #[error("quizId is required")]
    QuizIdRequired,
    #[error("Quiz not found")]
    QuizNotFound,
    #[error("Missing GEMINI_API_KEY on backend. Add it to server environment variables.")]
    GeneratorUnavailable,
    /// The content provider answered with an error
    #[error("{0}")]
    Upstream(String),
    #[error("Gemini returned an invalid flashcard deck response")]
    InvalidDeckReply,
    #[error("Gemini returned an invalid quiz response")]
    InvalidQuizReply,
    #[error("Could not reach Gemini service: {0}")]
    Unreachable(String),
}

impl StudyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StudyError::PromptRequired | StudyError::DeckIdRequired | StudyError::QuizIdRequired => {
                ErrorKind::BadRequest
            }
            StudyError::DeckNotFound | StudyError::QuizNotFound => ErrorKind::NotFound,
            StudyError::GeneratorUnavailable => ErrorKind::Unavailable,
            StudyError::Upstream(_)
            | StudyError::InvalidDeckReply
            | StudyError::InvalidQuizReply => ErrorKind::Upstream,
            StudyError::Unreachable(_) => ErrorKind::Internal,
        }
    }
}

/// Any failure a single user command can end with
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Study(#[from] StudyError),
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Room(err) => err.kind(),
            CommandError::Study(err) => err.kind(),
        }
    }
}
