use std::collections::HashMap;

use comms::{
    command::{
        CreateServerCommand, JoinServerCommand, SetOverlayCommand, SubscribeCommand,
        UpdateTimerCommand,
    },
    event::Event,
    snapshot::{ChatMessage, MemberSnapshot, ServerSnapshot, ServerSummary, ServerType, SharedOverlay},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};
use url::Url;

use super::room::{normalize_pomodoro, Member, StudyRoom};
use crate::{
    error::RoomError,
    util::{clamp_count, normalize_name, now_millis, random_join_code, username_key},
};

const MAX_PLAYERS: u32 = 12;
const DEFAULT_USERNAME: &str = "Guest";
const DEFAULT_OVERLAY_NAME: &str = "Shared Link";

/// Identifies the member a session is subscribed on behalf of
#[derive(Debug, Clone, PartialEq)]
pub struct MemberSession {
    pub server_id: String,
    pub member_id: String,
    pub session_id: String,
}

/// Result of a successful subscription
#[derive(Debug)]
pub struct Subscription {
    pub broadcast_rx: broadcast::Receiver<Event>,
    pub server: ServerSnapshot,
    pub member: MemberSnapshot,
}

#[derive(Debug, Default)]
struct Registry {
    rooms: HashMap<String, StudyRoom>,
    /// Room ids in creation order
    room_order: Vec<String>,
    code_to_room: HashMap<String, String>,
}

impl Registry {
    fn room(&self, server_id: &str) -> Result<&StudyRoom, RoomError> {
        self.rooms.get(server_id).ok_or(RoomError::ServerNotFound)
    }

    fn room_mut(&mut self, server_id: &str) -> Result<&mut StudyRoom, RoomError> {
        self.rooms.get_mut(server_id).ok_or(RoomError::ServerNotFound)
    }

    /// Usernames are unique across every room
    fn is_username_taken(&self, username: &str) -> bool {
        let key = username_key(username);
        if key.is_empty() {
            return false;
        }

        self.rooms
            .values()
            .flat_map(|room| room.members())
            .any(|member| username_key(&member.username) == key)
    }

    fn unused_join_code(&self) -> String {
        loop {
            let code = random_join_code();
            if !self.code_to_room.contains_key(&code) {
                return code;
            }
        }
    }

    /// The room and member a session is subscribed to, as long as both still exist
    fn bound_member(
        &mut self,
        member_session: Option<&MemberSession>,
    ) -> Result<(&mut StudyRoom, String), RoomError> {
        let member_session = member_session.ok_or(RoomError::NotSubscribed)?;
        let room = self.room_mut(&member_session.server_id)?;
        let member = room
            .member(&member_session.member_id)
            .ok_or(RoomError::MemberNotFound)?;
        let member_id = member.id.clone();

        Ok((room, member_id))
    }

    /// Mark the member offline if it is still bound to the session and let the room know
    fn release(&mut self, member_session: &MemberSession) {
        let Some(room) = self.rooms.get_mut(&member_session.server_id) else {
            return;
        };

        if let Some(member) = room.member_mut(&member_session.member_id) {
            if member.is_bound_to(&member_session.session_id) {
                member.unbind();
            }
        }

        room.broadcast_members();
    }
}

/// [RoomManager] owns every study room of the process.
///
/// All rooms live behind a single lock since usernames are unique across rooms,
/// every mutation broadcasts the new room state to the room's subscribers.
#[derive(Debug, Default)]
pub struct RoomManager {
    registry: Mutex<Registry>,
}

impl RoomManager {
    pub fn new() -> Self {
        RoomManager::default()
    }

    pub async fn server_count(&self) -> usize {
        self.registry.lock().await.rooms.len()
    }

    pub async fn list_servers(&self) -> Vec<ServerSummary> {
        let registry = self.registry.lock().await;

        registry
            .room_order
            .iter()
            .filter_map(|server_id| registry.rooms.get(server_id))
            .map(|room| ServerSummary::from(&room.snapshot()))
            .collect()
    }

    pub async fn get_server(&self, server_id: &str) -> Result<ServerSnapshot, RoomError> {
        let registry = self.registry.lock().await;

        Ok(registry.room(server_id)?.snapshot())
    }

    /// Create a room with the requesting user as its first member
    pub async fn create_server(
        &self,
        cmd: &CreateServerCommand,
    ) -> Result<(ServerSnapshot, MemberSnapshot), RoomError> {
        let name = normalize_name(Some(&cmd.name), "");
        let username = normalize_name(cmd.username.as_deref(), DEFAULT_USERNAME);

        if name.is_empty() {
            return Err(RoomError::ServerNameRequired);
        }

        let mut registry = self.registry.lock().await;

        if registry.is_username_taken(&username) {
            return Err(RoomError::UsernameTaken);
        }

        let server_type = match cmd.server_type.as_deref().map(str::to_lowercase) {
            Some(requested) if requested == "private" => ServerType::Private,
            _ => ServerType::Public,
        };
        // zero counts as not given
        let requested_max = cmd.max_players.filter(|max_players| *max_players != 0.0);
        let max_players = clamp_count(requested_max, 1, MAX_PLAYERS, MAX_PLAYERS);
        let code = registry.unused_join_code();

        let mut room = StudyRoom::new(code.clone(), name, server_type, max_players);
        let member = room.add_member(username).snapshot();
        let server = room.snapshot();

        info!(server_id = %server.id, code = %code, host = %member.username, "study room created");

        registry.code_to_room.insert(code.clone(), server.id.clone());
        registry.room_order.push(server.id.clone());
        registry.rooms.insert(server.id.clone(), room);

        Ok((server, member))
    }

    /// Add a new member to the room the join code belongs to
    pub async fn join_server(
        &self,
        cmd: &JoinServerCommand,
    ) -> Result<(ServerSnapshot, MemberSnapshot), RoomError> {
        let code = cmd.code.trim().to_uppercase();
        let username = normalize_name(cmd.username.as_deref(), DEFAULT_USERNAME);

        if code.is_empty() {
            return Err(RoomError::JoinCodeRequired);
        }

        let mut registry = self.registry.lock().await;

        if registry.is_username_taken(&username) {
            return Err(RoomError::UsernameTaken);
        }

        let server_id = registry
            .code_to_room
            .get(&code)
            .cloned()
            .ok_or(RoomError::JoinCodeNotFound)?;
        let room = registry
            .rooms
            .get_mut(&server_id)
            .ok_or(RoomError::JoinCodeNotFound)?;

        if room.is_full() {
            return Err(RoomError::ServerFull);
        }

        let member = room.add_member(username).snapshot();

        info!(server_id = %server_id, member_id = %member.id, "member joined study room");

        Ok((room.snapshot(), member))
    }

    /// Remove a member from a room and let the remaining members know
    pub async fn remove_member(&self, server_id: &str, member_id: &str) -> Result<(), RoomError> {
        let server_id = server_id.trim();
        let member_id = member_id.trim();

        if server_id.is_empty() || member_id.is_empty() {
            return Err(RoomError::MembershipIdsRequired);
        }

        let mut registry = self.registry.lock().await;
        let room = registry
            .rooms
            .get_mut(server_id)
            .ok_or(RoomError::MemberNotInServer)?;

        if !room.remove_member(member_id) {
            return Err(RoomError::MemberNotInServer);
        }

        info!(server_id = %server_id, member_id = %member_id, "member left study room");
        room.broadcast_members();

        Ok(())
    }

    /// Bind a session to a member, releasing whatever member the session was bound to before.
    ///
    /// # Returns
    ///
    /// - A broadcast receiver which already observes the members broadcast of this subscription
    /// - Snapshots of the room and the member
    pub async fn subscribe(
        &self,
        session_id: &str,
        cmd: &SubscribeCommand,
        previous: Option<&MemberSession>,
    ) -> Result<Subscription, RoomError> {
        let mut registry = self.registry.lock().await;

        let room = registry.room(&cmd.server_id)?;
        if room.member(&cmd.member_id).is_none() {
            return Err(RoomError::MemberNotInServer);
        }

        if let Some(previous) = previous {
            registry.release(previous);
        }

        let room = registry.room_mut(&cmd.server_id)?;
        let broadcast_rx = room.subscribe();
        let member = room
            .member_mut(&cmd.member_id)
            .ok_or(RoomError::MemberNotInServer)?;

        member.bind(
            session_id,
            cmd.selected_cat.as_deref(),
            cmd.selected_action.as_deref(),
        );
        let member = member.snapshot();

        room.broadcast_members();

        debug!(server_id = %cmd.server_id, member_id = %member.id, session_id, "session subscribed");

        Ok(Subscription {
            broadcast_rx,
            server: room.snapshot(),
            member,
        })
    }

    /// Mark the member of the session offline, unless another session took it over meanwhile
    pub async fn unsubscribe(&self, member_session: &MemberSession) {
        self.registry.lock().await.release(member_session);
    }

    pub async fn move_member(
        &self,
        member_session: Option<&MemberSession>,
        x: Option<f64>,
        y: Option<f64>,
    ) -> Result<(), RoomError> {
        self.update_member(member_session, |member| member.move_to(x, y))
            .await
    }

    pub async fn update_pomodoro(
        &self,
        member_session: Option<&MemberSession>,
        update: &UpdateTimerCommand,
    ) -> Result<(), RoomError> {
        let pomodoro = normalize_pomodoro(update);

        self.update_member(member_session, |member| member.pomodoro = Some(pomodoro))
            .await
    }

    /// Share a http(s) link with every member of the room
    pub async fn set_overlay(
        &self,
        member_session: Option<&MemberSession>,
        cmd: &SetOverlayCommand,
    ) -> Result<SharedOverlay, RoomError> {
        let mut registry = self.registry.lock().await;
        let (room, member_id) = registry.bound_member(member_session)?;

        let url = Url::parse(cmd.url.trim()).map_err(|_| RoomError::InvalidUrl)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(RoomError::InvalidUrl);
        }

        let updated_by = room
            .member(&member_id)
            .map(|member| member.username.clone())
            .ok_or(RoomError::MemberNotFound)?;
        let overlay = SharedOverlay {
            name: normalize_name(cmd.name.as_deref(), DEFAULT_OVERLAY_NAME),
            url: url.to_string(),
            updated_by,
            updated_at: now_millis(),
        };

        room.set_overlay(overlay.clone());
        room.broadcast_members();

        Ok(overlay)
    }

    /// Post a chat message on behalf of the member of the session
    pub async fn send_chat(
        &self,
        member_session: Option<&MemberSession>,
        text: &str,
    ) -> Result<ChatMessage, RoomError> {
        let mut registry = self.registry.lock().await;
        let (room, member_id) = registry.bound_member(member_session)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(RoomError::EmptyMessage);
        }

        let username = room
            .member(&member_id)
            .map(|member| member.username.clone())
            .ok_or(RoomError::MemberNotFound)?;

        Ok(room.post_chat(&member_id, &username, text))
    }

    async fn update_member(
        &self,
        member_session: Option<&MemberSession>,
        update: impl FnOnce(&mut Member),
    ) -> Result<(), RoomError> {
        let mut registry = self.registry.lock().await;
        let (room, member_id) = registry.bound_member(member_session)?;

        if let Some(member) = room.member_mut(&member_id) {
            update(member);
        }
        room.broadcast_members();

        Ok(())
    }
}
