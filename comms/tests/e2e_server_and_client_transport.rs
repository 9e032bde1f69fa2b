use comms::{
    command::{self, UserCommand},
    event::{self, Event},
    transport,
};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};
use tokio_stream::StreamExt;

const PORT: usize = 8081;

#[tokio::test]
async fn assert_server_client_transport() {
    let (server_collected_commands, client_collected_events) =
        tokio::join!(execute_server(), execute_client());

    assert!(server_collected_commands.is_ok());
    assert!(client_collected_events.is_ok());

    assert_eq!(
        server_collected_commands.unwrap(),
        vec![
            UserCommand::JoinServer(command::JoinServerCommand {
                code: "ABC234".into(),
                username: Some("ada".into()),
            }),
            UserCommand::SendChat(command::SendChatCommand {
                text: "content-1".into(),
            }),
        ]
    );

    assert_eq!(
        client_collected_events.unwrap(),
        vec![Event::Welcome(event::WelcomeReplyEvent {
            session_id: "session-id-1".into(),
        })]
    );
}

#[tokio::test]
async fn undecodable_line_does_not_end_the_command_stream() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("could not bind to a port");
    let addr = listener.local_addr().unwrap();

    let client = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"{\"_ct\":\"no_such_command\"}\r\n{\"_ct\":\"health\"}\r\n")
            .await
            .unwrap();
    });

    let (tcp_stream, _) = listener.accept().await.unwrap();
    let (mut command_stream, _event_writer) = transport::server::split_tcp_stream(tcp_stream);

    assert!(matches!(command_stream.next().await, Some(Err(_))));
    assert!(matches!(
        command_stream.next().await,
        Some(Ok(UserCommand::Health))
    ));

    client.await.unwrap();
}

async fn execute_server() -> anyhow::Result<Vec<command::UserCommand>> {
    // bind to the example port to wait for client connection
    let listener = TcpListener::bind(format!("0.0.0.0:{}", PORT))
        .await
        .expect("could not bind to the port");

    // accept the only client connection we will have
    let tcp_stream = match listener.accept().await {
        Ok((tcp_stream, _addr)) => tcp_stream,
        Err(e) => return Err(anyhow::anyhow!("failed to accept client: {}", e)),
    };

    // break the client connection into higher level API for ease of use
    let (mut command_stream, mut event_writer) = transport::server::split_tcp_stream(tcp_stream);
    // store commands received from the client
    let mut collected_commands = Vec::new();

    // welcome the user with the session id
    event_writer
        .write(&Event::Welcome(event::WelcomeReplyEvent {
            session_id: "session-id-1".into(),
        }))
        .await?;

    // listen for commands from the client until the connection is closed
    while let Some(result) = command_stream.next().await {
        match result {
            Ok(command) => collected_commands.push(command),
            Err(e) => return Err(anyhow::anyhow!("failed to read command: {}", e)),
        }
    }

    Ok(collected_commands)
}

async fn execute_client() -> anyhow::Result<Vec<event::Event>> {
    // give the listener a moment to bind before connecting
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let tcp_stream = match TcpStream::connect(format!("localhost:{}", PORT)).await {
        Ok(tcp_stream) => tcp_stream,
        Err(e) => return Err(anyhow::anyhow!("failed to connect to server: {}", e)),
    };

    let (mut event_stream, mut command_writer) = transport::client::split_tcp_stream(tcp_stream);
    let mut collected_events = Vec::new();

    match event_stream.next().await {
        Some(Ok(event)) => collected_events.push(event),
        Some(Err(e)) => return Err(anyhow::anyhow!("could not parse event: {}", e)),
        None => return Err(anyhow::anyhow!("server closed the connection")),
    }

    command_writer
        .write(&UserCommand::JoinServer(command::JoinServerCommand {
            code: "ABC234".into(),
            username: Some("ada".into()),
        }))
        .await?;

    command_writer
        .write(&UserCommand::SendChat(command::SendChatCommand {
            text: "content-1".into(),
        }))
        .await?;

    Ok(collected_events)
}
