use serde::{Deserialize, Serialize};

/// Visibility of a study room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerType {
    Public,
    Private,
}

/// Pomodoro phase of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PomodoroPhase {
    Focus,
    Break,
}

/// Pomodoro timer as last reported by a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroState {
    pub phase: PomodoroPhase,
    pub is_running: bool,
    pub seconds_left: u32,
    /// Client reported time of the last change, in epoch milliseconds
    pub updated_at: f64,
}

/// A link shared with every member of a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedOverlay {
    pub name: String,
    pub url: String,
    pub updated_by: String,
    pub updated_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSnapshot {
    pub id: String,
    pub username: String,
    pub online: bool,
    pub selected_cat: Option<String>,
    pub selected_action: Option<String>,
    pub x: f64,
    pub y: f64,
    pub joined_at: u64,
    pub pomodoro: Option<PomodoroState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub member_id: String,
    pub username: String,
    pub text: String,
    pub created_at: u64,
}

/// Full state of a study room, as broadcast to its subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    pub max_players: u32,
    pub created_at: u64,
    pub members_online: usize,
    pub total_members: usize,
    pub shared_overlay: Option<SharedOverlay>,
    pub chat_messages: Vec<ChatMessage>,
    pub members: Vec<MemberSnapshot>,
}

/// Lobby listing entry of a study room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    pub max_players: u32,
    pub members_online: usize,
    pub total_members: usize,
    pub players_label: String,
}

impl From<&ServerSnapshot> for ServerSummary {
    fn from(snapshot: &ServerSnapshot) -> Self {
        ServerSummary {
            id: snapshot.id.clone(),
            code: snapshot.code.clone(),
            name: snapshot.name.clone(),
            server_type: snapshot.server_type,
            max_players: snapshot.max_players,
            members_online: snapshot.members_online,
            total_members: snapshot.total_members,
            players_label: format!("{}/{}", snapshot.total_members, snapshot.max_players),
        }
    }
}
