use std::sync::Arc;

use comms::{
    command::UserCommand,
    event::{self, ErrorKind},
    transport,
};
use nanoid::nanoid;
use tokio::{net::TcpStream, sync::broadcast};
use tokio_stream::StreamExt;
use tracing::{debug, info};

use crate::{room_manager::RoomManager, study::StudyService};

use self::study_session::StudySession;

mod study_session;

/// Shared state every user session works with
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub rooms: Arc<RoomManager>,
    pub study: Arc<StudyService>,
}

/// Given a tcp stream and the shared state, handles the user session
/// until the user quits the session, or the tcp stream is closed for some reason, or the server shuts down
pub async fn handle_user_session(
    context: SessionContext,
    mut quit_rx: broadcast::Receiver<()>,
    stream: TcpStream,
) -> anyhow::Result<()> {
    let session_id = nanoid!();
    let peer = stream.peer_addr()?;
    // Split the tcp stream into a command stream and an event writer with better ergonomics
    let (mut commands, mut event_writer) = transport::server::split_tcp_stream(stream);

    info!(%session_id, %peer, "session started");

    event_writer
        .write(&event::Event::Welcome(event::WelcomeReplyEvent {
            session_id: session_id.clone(),
        }))
        .await?;

    // Study session abstracts the membership and study library handling of a single user
    let mut study_session = StudySession::new(&session_id, context.rooms, context.study);

    let result = loop {
        tokio::select! {
            cmd = commands.next() => match cmd {
                // If the user closes the tcp stream, or sends a quit cmd
                // the subscribed member goes offline for the other users
                None | Some(Ok(UserCommand::Quit)) => break Ok(()),
                Some(Ok(cmd)) => {
                    debug!(%session_id, command = cmd.name(), "handling command");
                    if let Some(reply) = study_session.handle_user_command(cmd).await {
                        if let Err(err) = event_writer.write(&reply).await {
                            break Err(err);
                        }
                    }
                }
                // A line that is not a valid command is answered, connection errors end the session
                Some(Err(err)) => {
                    if !transport::is_bad_frame(&err) {
                        break Err(err);
                    }

                    let reply = event::Event::Error(event::ErrorReplyEvent {
                        command: None,
                        kind: ErrorKind::BadRequest,
                        error: format!("Invalid command: {}", err.root_cause()),
                    });
                    if let Err(err) = event_writer.write(&reply).await {
                        break Err(err);
                    }
                }
            },
            // Room broadcasts and replies of background commands are sent to the user
            Ok(event) = study_session.recv() => {
                if let Err(err) = event_writer.write(&event).await {
                    break Err(err);
                }
            }
            // If the server is shutting down, we can just close the tcp streams
            // and exit the session handler without touching the shared state
            Ok(_) = quit_rx.recv() => {
                drop(event_writer);
                debug!(%session_id, "gracefully shutting down user tcp stream");
                return Ok(());
            }
        }
    };

    study_session.cleanup().await;
    info!(%session_id, %peer, "session ended");

    result
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use comms::event::{ErrorReplyEvent, Event, HealthReplyEvent};
    use tokio::{io::AsyncWriteExt, net::TcpListener, time::timeout};

    use super::*;

    fn assert_invalid_command(event: Option<anyhow::Result<Event>>) {
        match event {
            Some(Ok(Event::Error(ErrorReplyEvent {
                command,
                kind,
                error,
            }))) => {
                assert_eq!(command, None);
                assert_eq!(kind, ErrorKind::BadRequest);
                assert!(error.starts_with("Invalid command: "), "{}", error);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_lines_are_answered_and_the_session_goes_on() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (_quit_tx, quit_rx) = broadcast::channel(1);
        let context = SessionContext {
            rooms: Arc::new(RoomManager::new()),
            study: Arc::new(StudyService::new(None)),
        };

        let session = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            handle_user_session(context, quit_rx, stream).await
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        // not utf-8, truncated json, then valid commands
        stream
            .write_all(b"\xff\xfe\r\n{\"_ct\":\"move\"\r\n{\"_ct\":\"health\"}\r\n{\"_ct\":\"quit\"}\r\n")
            .await
            .unwrap();
        let (mut events, _command_writer) = transport::client::split_tcp_stream(stream);

        let mut received = Vec::new();
        while let Some(event) = timeout(Duration::from_secs(1), events.next())
            .await
            .expect("timed out waiting for an event")
        {
            received.push(event);
        }
        let mut received = received.into_iter();

        assert!(matches!(received.next(), Some(Ok(Event::Welcome(_)))));
        assert_invalid_command(received.next());
        assert_invalid_command(received.next());
        assert_eq!(
            received.next().map(Result::unwrap),
            Some(Event::Health(HealthReplyEvent {
                ok: true,
                servers: 0
            }))
        );
        assert!(received.next().is_none());

        assert!(session.await.unwrap().is_ok());
    }
}
