use std::collections::VecDeque;

use comms::{
    event::{self, Event},
    snapshot::{ChatMessage, ServerSnapshot, ServerType, SharedOverlay},
};
use tokio::sync::broadcast;

use super::member::Member;
use crate::util::{clip, now_millis, random_id};

const BROADCAST_CHANNEL_CAPACITY: usize = 100;
const CHAT_HISTORY_LIMIT: usize = 200;
const CHAT_MESSAGE_MAX_CHARS: usize = 400;

#[derive(Debug)]
/// [StudyRoom] holds the members, chat history and shared overlay of a study room
/// alongside the broadcast channel every subscribed session listens on
pub struct StudyRoom {
    id: String,
    code: String,
    name: String,
    server_type: ServerType,
    max_players: u32,
    created_at: u64,
    shared_overlay: Option<SharedOverlay>,
    chat_messages: VecDeque<ChatMessage>,
    /// Kept in join order
    members: Vec<Member>,
    broadcast_tx: broadcast::Sender<Event>,
}

impl StudyRoom {
    pub fn new(code: String, name: String, server_type: ServerType, max_players: u32) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);

        StudyRoom {
            id: random_id("server"),
            code,
            name,
            server_type,
            max_players,
            created_at: now_millis(),
            shared_overlay: None,
            chat_messages: VecDeque::new(),
            members: Vec::new(),
            broadcast_tx,
        }
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_players as usize
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.id == member_id)
    }

    pub fn member_mut(&mut self, member_id: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|member| member.id == member_id)
    }

    pub fn add_member(&mut self, username: String) -> &Member {
        self.members.push(Member::new(username));

        &self.members[self.members.len() - 1]
    }

    /// Returns false if no such member exists
    pub fn remove_member(&mut self, member_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|member| member.id != member_id);

        self.members.len() != before
    }

    pub fn set_overlay(&mut self, overlay: SharedOverlay) {
        self.shared_overlay = Some(overlay);
    }

    /// Append a message to the chat history and broadcast it to all subscribers
    pub fn post_chat(&mut self, member_id: &str, username: &str, text: &str) -> ChatMessage {
        let message = ChatMessage {
            id: random_id("chat"),
            member_id: String::from(member_id),
            username: String::from(username),
            text: clip(text, CHAT_MESSAGE_MAX_CHARS),
            created_at: now_millis(),
        };

        self.chat_messages.push_back(message.clone());
        while self.chat_messages.len() > CHAT_HISTORY_LIMIT {
            self.chat_messages.pop_front();
        }

        let _ = self
            .broadcast_tx
            .send(Event::ChatMessage(event::ChatMessageBroadcastEvent {
                server_id: self.id.clone(),
                message: message.clone(),
            }));

        message
    }

    /// A broadcast receiver for a session to receive the events of the room
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.broadcast_tx.subscribe()
    }

    /// Broadcast the whole room state to all subscribers.
    /// Nobody listening is not an error, the room simply has no online members.
    pub fn broadcast_members(&self) {
        let _ = self
            .broadcast_tx
            .send(Event::Members(event::MembersBroadcastEvent {
                server: self.snapshot(),
            }));
    }

    pub fn snapshot(&self) -> ServerSnapshot {
        let members: Vec<_> = self.members.iter().map(Member::snapshot).collect();

        ServerSnapshot {
            id: self.id.clone(),
            code: self.code.clone(),
            name: self.name.clone(),
            server_type: self.server_type,
            max_players: self.max_players,
            created_at: self.created_at,
            members_online: members.iter().filter(|member| member.online).count(),
            total_members: members.len(),
            shared_overlay: self.shared_overlay.clone(),
            chat_messages: self.chat_messages.iter().cloned().collect(),
            members,
        }
    }
}
