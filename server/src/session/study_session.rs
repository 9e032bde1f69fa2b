use std::{future::Future, sync::Arc};

use anyhow::Context;
use comms::{
    command::UserCommand,
    event::{
        ChatSentReplyEvent, DeckDeletedReplyEvent, DeckListReplyEvent, DeckReplyEvent,
        ErrorKind, ErrorReplyEvent, Event, HealthReplyEvent, LeftReplyEvent,
        MembershipReplyEvent, OverlaySetReplyEvent, QuizListReplyEvent, QuizReplyEvent,
        ServerDetailReplyEvent, ServerLeftReplyEvent, ServerListReplyEvent,
    },
};
use tokio::{
    sync::{broadcast, mpsc},
    task::{AbortHandle, JoinSet},
};
use tracing::{debug, warn};

use crate::{
    error::{CommandError, StudyError},
    room_manager::{MemberSession, RoomManager},
    study::StudyService,
};

/// Builds the error reply for a failed command
pub(super) fn error_event(command: Option<&str>, err: &CommandError) -> Event {
    match err.kind() {
        ErrorKind::Upstream | ErrorKind::Internal => warn!(command, %err, "command failed"),
        _ => debug!(command, %err, "command rejected"),
    }

    Event::Error(ErrorReplyEvent {
        command: command.map(String::from),
        kind: err.kind(),
        error: err.to_string(),
    })
}

/// Forwards room broadcasts to the session funnel until either side goes away
async fn forward_broadcasts(
    mut broadcast_rx: broadcast::Receiver<Event>,
    mpsc_tx: mpsc::Sender<Event>,
) {
    loop {
        match broadcast_rx.recv().await {
            Ok(event) => {
                if mpsc_tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "session is lagging behind the room broadcasts");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

pub(super) struct StudySession {
    session_id: String,
    rooms: Arc<RoomManager>,
    study: Arc<StudyService>,
    /// Member this session is subscribed as, with the task forwarding its room broadcasts
    presence: Option<(MemberSession, AbortHandle)>,
    join_set: JoinSet<()>,
    mpsc_tx: mpsc::Sender<Event>,
    mpsc_rx: mpsc::Receiver<Event>,
}

impl StudySession {
    pub fn new(session_id: &str, rooms: Arc<RoomManager>, study: Arc<StudyService>) -> Self {
        let (mpsc_tx, mpsc_rx) = mpsc::channel(100);

        StudySession {
            session_id: String::from(session_id),
            rooms,
            study,
            presence: None,
            join_set: JoinSet::new(),
            mpsc_tx,
            mpsc_rx,
        }
    }

    fn member_session(&self) -> Option<&MemberSession> {
        self.presence.as_ref().map(|(member_session, _)| member_session)
    }

    /// Handle a single user command. Failures are turned into an error reply.
    ///
    /// # Returns
    ///
    /// The reply event for the user, if the command has an immediate one.
    /// Commands generating study material reply later through [StudySession::recv].
    pub async fn handle_user_command(&mut self, cmd: UserCommand) -> Option<Event> {
        let command = cmd.name();

        match self.dispatch(cmd).await {
            Ok(reply) => reply,
            Err(err) => Some(error_event(Some(command), &err)),
        }
    }

    async fn dispatch(&mut self, cmd: UserCommand) -> Result<Option<Event>, CommandError> {
        let reply = match cmd {
            UserCommand::Health => Event::Health(HealthReplyEvent {
                ok: true,
                servers: self.rooms.server_count().await,
            }),
            UserCommand::ListServers => Event::ServerList(ServerListReplyEvent {
                servers: self.rooms.list_servers().await,
            }),
            UserCommand::GetServer(cmd) => Event::ServerDetail(ServerDetailReplyEvent {
                server: self.rooms.get_server(&cmd.server_id).await?,
            }),
            UserCommand::CreateServer(cmd) => {
                let (server, member) = self.rooms.create_server(&cmd).await?;
                Event::ServerCreated(MembershipReplyEvent { server, member })
            }
            UserCommand::JoinServer(cmd) => {
                let (server, member) = self.rooms.join_server(&cmd).await?;
                Event::ServerJoined(MembershipReplyEvent { server, member })
            }
            UserCommand::LeaveServer(cmd) => {
                let server_id = cmd.server_id.trim();
                let member_id = cmd.member_id.trim();
                self.rooms.remove_member(server_id, member_id).await?;

                let is_own_member = self.member_session().is_some_and(|member_session| {
                    member_session.server_id == server_id && member_session.member_id == member_id
                });
                if is_own_member {
                    self.drop_presence();
                }

                Event::ServerLeft(ServerLeftReplyEvent {
                    server_id: String::from(server_id),
                    member_id: String::from(member_id),
                })
            }
            UserCommand::Subscribe(cmd) => {
                let subscription = self
                    .rooms
                    .subscribe(&self.session_id, &cmd, self.member_session())
                    .await?;

                // the previous member has been released by the subscription
                self.drop_presence();
                let abort_handle = self.join_set.spawn(forward_broadcasts(
                    subscription.broadcast_rx,
                    self.mpsc_tx.clone(),
                ));
                let member_session = MemberSession {
                    server_id: subscription.server.id.clone(),
                    member_id: subscription.member.id.clone(),
                    session_id: self.session_id.clone(),
                };
                self.presence = Some((member_session, abort_handle));

                Event::Subscribed(MembershipReplyEvent {
                    server: subscription.server,
                    member: subscription.member,
                })
            }
            UserCommand::Unsubscribe => {
                let server_id = self.release_presence().await;
                Event::Left(LeftReplyEvent { server_id })
            }
            UserCommand::Move(cmd) => {
                if let Err(err) = self
                    .rooms
                    .move_member(self.member_session(), cmd.x, cmd.y)
                    .await
                {
                    debug!(%err, "move ignored");
                }
                return Ok(None);
            }
            UserCommand::UpdateTimer(cmd) => {
                if let Err(err) = self
                    .rooms
                    .update_pomodoro(self.member_session(), &cmd)
                    .await
                {
                    debug!(%err, "timer update ignored");
                }
                return Ok(None);
            }
            UserCommand::SetOverlay(cmd) => Event::OverlaySet(OverlaySetReplyEvent {
                shared_overlay: self.rooms.set_overlay(self.member_session(), &cmd).await?,
            }),
            UserCommand::SendChat(cmd) => Event::ChatSent(ChatSentReplyEvent {
                message: self
                    .rooms
                    .send_chat(self.member_session(), &cmd.text)
                    .await?,
            }),
            UserCommand::Leave => {
                let server_id = match self.presence.take() {
                    Some((member_session, abort_handle)) => {
                        abort_handle.abort();
                        self.reap_finished_tasks();
                        if let Err(err) = self
                            .rooms
                            .remove_member(&member_session.server_id, &member_session.member_id)
                            .await
                        {
                            debug!(%err, "member was already gone");
                        }
                        Some(member_session.server_id)
                    }
                    None => None,
                };

                Event::Left(LeftReplyEvent { server_id })
            }
            UserCommand::ListDecks(cmd) => Event::DeckList(DeckListReplyEvent {
                decks: self.study.list_decks(&cmd).await,
            }),
            UserCommand::GetDeck(cmd) => Event::Deck(DeckReplyEvent {
                deck: self.study.get_deck(&cmd).await?,
            }),
            UserCommand::DeleteDeck(cmd) => Event::DeckDeleted(DeckDeletedReplyEvent {
                deck_id: self.study.delete_deck(&cmd).await?,
            }),
            UserCommand::CreateDeck(cmd) => {
                let study = self.study.clone();
                self.spawn_generation("create_deck", async move {
                    let deck = study.create_deck(&cmd).await;
                    deck.map(|deck| Event::Deck(DeckReplyEvent { deck }))
                });
                return Ok(None);
            }
            UserCommand::RegenerateDeck(cmd) => {
                let study = self.study.clone();
                self.spawn_generation("regenerate_deck", async move {
                    let deck = study.regenerate_deck(&cmd).await;
                    deck.map(|deck| Event::Deck(DeckReplyEvent { deck }))
                });
                return Ok(None);
            }
            UserCommand::ListQuizzes(cmd) => Event::QuizList(QuizListReplyEvent {
                quizzes: self.study.list_quizzes(&cmd).await,
            }),
            UserCommand::GetQuiz(cmd) => Event::Quiz(QuizReplyEvent {
                quiz: self.study.get_quiz(&cmd).await?,
            }),
            UserCommand::CreateQuiz(cmd) => {
                let study = self.study.clone();
                self.spawn_generation("create_quiz", async move {
                    let quiz = study.create_quiz(&cmd).await;
                    quiz.map(|quiz| Event::Quiz(QuizReplyEvent { quiz }))
                });
                return Ok(None);
            }
            UserCommand::SubmitQuiz(cmd) => Event::QuizResult(self.study.submit_quiz(&cmd).await?),
            // ending the session is up to the session loop
            UserCommand::Quit => return Ok(None),
        };

        Ok(Some(reply))
    }

    /// Run a slow study command in the background, its reply arrives through [StudySession::recv]
    fn spawn_generation<F>(&mut self, command: &'static str, future: F)
    where
        F: Future<Output = Result<Event, StudyError>> + Send + 'static,
    {
        self.reap_finished_tasks();

        let mpsc_tx = self.mpsc_tx.clone();
        self.join_set.spawn(async move {
            let event = match future.await {
                Ok(event) => event,
                Err(err) => error_event(Some(command), &CommandError::from(err)),
            };
            let _ = mpsc_tx.send(event).await;
        });
    }

    /// Forget the tasks that finished or got aborted so far
    fn reap_finished_tasks(&mut self) {
        while self.join_set.try_join_next().is_some() {}
    }

    /// Stop forwarding the broadcasts of the current room, if any
    fn drop_presence(&mut self) {
        if let Some((_, abort_handle)) = self.presence.take() {
            abort_handle.abort();
        }
        self.reap_finished_tasks();
    }

    /// Mark the subscribed member offline and stop forwarding its room broadcasts
    ///
    /// # Returns
    ///
    /// The id of the room the session was subscribed to
    async fn release_presence(&mut self) -> Option<String> {
        let (member_session, abort_handle) = self.presence.take()?;
        abort_handle.abort();
        self.reap_finished_tasks();
        self.rooms.unsubscribe(&member_session).await;

        Some(member_session.server_id)
    }

    /// Release every resource of the session so the other members see it going offline
    pub async fn cleanup(&mut self) {
        self.release_presence().await;
        self.join_set.abort_all();
    }

    /// Receive an event that originated from the subscribed room or a finished background command
    pub async fn recv(&mut self) -> anyhow::Result<Event> {
        self.mpsc_rx
            .recv()
            .await
            .context("could not recv from the session channel")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use comms::{
        command::{
            CreateDeckCommand, CreateServerCommand, JoinServerCommand, MoveCommand,
            SendChatCommand, SetOverlayCommand, SubscribeCommand,
        },
        snapshot::{MemberSnapshot, ServerSnapshot},
    };
    use tokio::time::timeout;

    use super::*;

    fn new_session(session_id: &str, rooms: &Arc<RoomManager>) -> StudySession {
        StudySession::new(session_id, rooms.clone(), Arc::new(StudyService::new(None)))
    }

    async fn next_event(session: &mut StudySession) -> Event {
        timeout(Duration::from_secs(1), session.recv())
            .await
            .expect("timed out waiting for an event")
            .unwrap()
    }

    async fn create_server(
        session: &mut StudySession,
        name: &str,
        username: &str,
    ) -> (ServerSnapshot, MemberSnapshot) {
        let reply = session
            .handle_user_command(UserCommand::CreateServer(CreateServerCommand {
                name: name.to_string(),
                username: Some(username.to_string()),
                server_type: None,
                max_players: None,
            }))
            .await;

        match reply {
            Some(Event::ServerCreated(MembershipReplyEvent { server, member })) => (server, member),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    fn subscribe_command(server: &ServerSnapshot, member: &MemberSnapshot) -> UserCommand {
        UserCommand::Subscribe(SubscribeCommand {
            server_id: server.id.clone(),
            member_id: member.id.clone(),
            selected_cat: Some("tabby".to_string()),
            selected_action: None,
        })
    }

    fn assert_error(reply: Option<Event>, command: &str, kind: ErrorKind, error: &str) {
        assert_eq!(
            reply,
            Some(Event::Error(ErrorReplyEvent {
                command: Some(command.to_string()),
                kind,
                error: error.to_string(),
            }))
        );
    }

    #[tokio::test]
    async fn test_health_and_listing() {
        let rooms = Arc::new(RoomManager::new());
        let mut session = new_session("session_1", &rooms);

        create_server(&mut session, "Biology", "ada").await;

        assert_eq!(
            session.handle_user_command(UserCommand::Health).await,
            Some(Event::Health(HealthReplyEvent {
                ok: true,
                servers: 1
            }))
        );
        match session.handle_user_command(UserCommand::ListServers).await {
            Some(Event::ServerList(list)) => {
                assert_eq!(list.servers.len(), 1);
                assert_eq!(list.servers[0].players_label, "1/12");
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subscribe_then_receive_room_broadcasts() {
        let rooms = Arc::new(RoomManager::new());
        let mut host = new_session("session_host", &rooms);
        let mut guest = new_session("session_guest", &rooms);

        let (server, host_member) = create_server(&mut host, "Biology", "ada").await;
        let reply = host
            .handle_user_command(subscribe_command(&server, &host_member))
            .await;
        match reply {
            Some(Event::Subscribed(MembershipReplyEvent { member, .. })) => {
                assert!(member.online);
                assert_eq!(member.selected_cat.as_deref(), Some("tabby"));
            }
            other => panic!("unexpected reply {:?}", other),
        }
        // own subscription broadcast
        assert!(matches!(next_event(&mut host).await, Event::Members(_)));

        let guest_member = match guest
            .handle_user_command(UserCommand::JoinServer(JoinServerCommand {
                code: server.code.to_lowercase(),
                username: Some("grace".to_string()),
            }))
            .await
        {
            Some(Event::ServerJoined(MembershipReplyEvent { member, .. })) => member,
            other => panic!("unexpected reply {:?}", other),
        };

        guest
            .handle_user_command(subscribe_command(&server, &guest_member))
            .await;
        assert!(matches!(next_event(&mut guest).await, Event::Members(_)));
        match next_event(&mut host).await {
            Event::Members(members) => {
                assert_eq!(members.server.total_members, 2);
                assert_eq!(members.server.members_online, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let reply = guest
            .handle_user_command(UserCommand::SendChat(SendChatCommand {
                text: " hello ".to_string(),
            }))
            .await;
        assert!(matches!(reply, Some(Event::ChatSent(_))));

        match next_event(&mut host).await {
            Event::ChatMessage(chat) => {
                assert_eq!(chat.server_id, server.id);
                assert_eq!(chat.message.text, "hello");
                assert_eq!(chat.message.username, "grace");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_commands_requiring_a_subscription() {
        let rooms = Arc::new(RoomManager::new());
        let mut session = new_session("session_1", &rooms);

        assert_error(
            session
                .handle_user_command(UserCommand::SendChat(SendChatCommand {
                    text: "hello".to_string(),
                }))
                .await,
            "send_chat",
            ErrorKind::BadRequest,
            "Not in a server",
        );
        assert_error(
            session
                .handle_user_command(UserCommand::SetOverlay(SetOverlayCommand {
                    name: None,
                    url: "https://example.com".to_string(),
                }))
                .await,
            "set_overlay",
            ErrorKind::BadRequest,
            "Not in a server",
        );
        // silently ignored
        assert_eq!(
            session
                .handle_user_command(UserCommand::Move(MoveCommand {
                    x: Some(1.0),
                    y: Some(2.0)
                }))
                .await,
            None
        );
        assert_eq!(
            session.handle_user_command(UserCommand::Leave).await,
            Some(Event::Left(LeftReplyEvent { server_id: None }))
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_marks_member_offline() {
        let rooms = Arc::new(RoomManager::new());
        let mut session = new_session("session_1", &rooms);
        let (server, member) = create_server(&mut session, "Biology", "ada").await;
        session
            .handle_user_command(subscribe_command(&server, &member))
            .await;

        assert_eq!(
            session.handle_user_command(UserCommand::Unsubscribe).await,
            Some(Event::Left(LeftReplyEvent {
                server_id: Some(server.id.clone())
            }))
        );

        let snapshot = rooms.get_server(&server.id).await.unwrap();
        assert_eq!(snapshot.members_online, 0);
        assert_eq!(snapshot.total_members, 1);
    }

    #[tokio::test]
    async fn test_leave_removes_member() {
        let rooms = Arc::new(RoomManager::new());
        let mut session = new_session("session_1", &rooms);
        let (server, member) = create_server(&mut session, "Biology", "ada").await;
        session
            .handle_user_command(subscribe_command(&server, &member))
            .await;

        assert_eq!(
            session.handle_user_command(UserCommand::Leave).await,
            Some(Event::Left(LeftReplyEvent {
                server_id: Some(server.id.clone())
            }))
        );
        assert_eq!(rooms.get_server(&server.id).await.unwrap().total_members, 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_member_taken_over_by_another_session() {
        let rooms = Arc::new(RoomManager::new());
        let mut first = new_session("session_1", &rooms);
        let mut second = new_session("session_2", &rooms);
        let (server, member) = create_server(&mut first, "Biology", "ada").await;

        first
            .handle_user_command(subscribe_command(&server, &member))
            .await;
        second
            .handle_user_command(subscribe_command(&server, &member))
            .await;
        first.cleanup().await;

        let snapshot = rooms.get_server(&server.id).await.unwrap();
        assert_eq!(snapshot.members_online, 1);
    }

    #[tokio::test]
    async fn test_resubscribing_does_not_pile_up_forwarders() {
        let rooms = Arc::new(RoomManager::new());
        let mut session = new_session("session_1", &rooms);
        let (server, member) = create_server(&mut session, "Biology", "ada").await;

        for _ in 0..200 {
            session
                .handle_user_command(subscribe_command(&server, &member))
                .await;
            session.handle_user_command(UserCommand::Unsubscribe).await;
            // let the runtime drop the aborted forwarder
            tokio::task::yield_now().await;
        }

        assert!(
            session.join_set.len() <= 2,
            "{} tasks left",
            session.join_set.len()
        );
    }

    #[tokio::test]
    async fn test_generation_without_generator_replies_later() {
        let rooms = Arc::new(RoomManager::new());
        let mut session = new_session("session_1", &rooms);

        let reply = session
            .handle_user_command(UserCommand::CreateDeck(CreateDeckCommand {
                username: Some("ada".to_string()),
                server_name: None,
                title: None,
                prompt: "cells".to_string(),
                card_count: None,
            }))
            .await;
        assert_eq!(reply, None);

        assert_eq!(
            next_event(&mut session).await,
            Event::Error(ErrorReplyEvent {
                command: Some("create_deck".to_string()),
                kind: ErrorKind::Unavailable,
                error: "Missing GEMINI_API_KEY on backend. Add it to server environment variables."
                    .to_string(),
            })
        );
    }
}
