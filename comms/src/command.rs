use serde::{Deserialize, Serialize};

use crate::study::{deserialize_answers, QuizAnswer, QuizType};

/// User Command for creating a study room, the creator becomes its first member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServerCommand {
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    /// "public" or "private", case insensitive
    #[serde(default)]
    pub server_type: Option<String>,
    #[serde(default)]
    pub max_players: Option<f64>,
}

/// User Command for becoming a member of a study room via its join code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinServerCommand {
    pub code: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// User Command for removing a member from a study room without being subscribed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveServerCommand {
    pub server_id: String,
    pub member_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetServerCommand {
    pub server_id: String,
}

/// User Command for binding the session to a member of a study room.
/// Afterwards the session receives every broadcast of that room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeCommand {
    pub server_id: String,
    pub member_id: String,
    #[serde(default)]
    pub selected_cat: Option<String>,
    #[serde(default)]
    pub selected_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveCommand {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOverlayCommand {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimerCommand {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub is_running: Option<bool>,
    #[serde(default)]
    pub seconds_left: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendChatCommand {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStudyItemsCommand {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckCommand {
    #[serde(default)]
    pub username: Option<String>,
    pub deck_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeckCommand {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub card_count: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateDeckCommand {
    #[serde(default)]
    pub username: Option<String>,
    pub deck_id: String,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub card_count: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetQuizCommand {
    #[serde(default)]
    pub username: Option<String>,
    pub quiz_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizCommand {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub quiz_type: Option<QuizType>,
    #[serde(default)]
    pub question_count: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizCommand {
    #[serde(default)]
    pub username: Option<String>,
    pub quiz_id: String,
    #[serde(default, deserialize_with = "deserialize_answers")]
    pub answers: Vec<QuizAnswer>,
}

/// A user command which can be sent to the server by a single user session.
/// All commands are processed in the context of the study server paired with an individual user session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "_ct", rename_all = "snake_case")]
pub enum UserCommand {
    Health,
    ListServers,
    GetServer(GetServerCommand),
    CreateServer(CreateServerCommand),
    JoinServer(JoinServerCommand),
    LeaveServer(LeaveServerCommand),
    Subscribe(SubscribeCommand),
    Unsubscribe,
    Move(MoveCommand),
    SetOverlay(SetOverlayCommand),
    UpdateTimer(UpdateTimerCommand),
    SendChat(SendChatCommand),
    Leave,
    ListDecks(ListStudyItemsCommand),
    GetDeck(DeckCommand),
    CreateDeck(CreateDeckCommand),
    RegenerateDeck(RegenerateDeckCommand),
    DeleteDeck(DeckCommand),
    ListQuizzes(ListStudyItemsCommand),
    GetQuiz(GetQuizCommand),
    CreateQuiz(CreateQuizCommand),
    SubmitQuiz(SubmitQuizCommand),
    Quit,
}

impl UserCommand {
    /// Wire name of the command, used to correlate error replies
    pub fn name(&self) -> &'static str {
        match self {
            UserCommand::Health => "health",
            UserCommand::ListServers => "list_servers",
            UserCommand::GetServer(_) => "get_server",
            UserCommand::CreateServer(_) => "create_server",
            UserCommand::JoinServer(_) => "join_server",
            UserCommand::LeaveServer(_) => "leave_server",
            UserCommand::Subscribe(_) => "subscribe",
            UserCommand::Unsubscribe => "unsubscribe",
            UserCommand::Move(_) => "move",
            UserCommand::SetOverlay(_) => "set_overlay",
            UserCommand::UpdateTimer(_) => "update_timer",
            UserCommand::SendChat(_) => "send_chat",
            UserCommand::Leave => "leave",
            UserCommand::ListDecks(_) => "list_decks",
            UserCommand::GetDeck(_) => "get_deck",
            UserCommand::CreateDeck(_) => "create_deck",
            UserCommand::RegenerateDeck(_) => "regenerate_deck",
            UserCommand::DeleteDeck(_) => "delete_deck",
            UserCommand::ListQuizzes(_) => "list_quizzes",
            UserCommand::GetQuiz(_) => "get_quiz",
            UserCommand::CreateQuiz(_) => "create_quiz",
            UserCommand::SubmitQuiz(_) => "submit_quiz",
            UserCommand::Quit => "quit",
        }
    }
}
