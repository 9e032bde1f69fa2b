use anyhow::Context;
use comms::{
    command::{self, UserCommand},
    event::{self, Event},
    transport,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::StreamExt;

const PORT: usize = 8082;

async fn server_example() -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("0.0.0.0:{}", PORT))
        .await
        .context("could not bind to the port")?;

    let tcp_stream = match listener.accept().await {
        Ok((tcp_stream, _addr)) => tcp_stream,
        Err(e) => return Err(anyhow::anyhow!("failed to accept client: {}", e)),
    };

    let (mut command_stream, mut event_writer) = transport::server::split_tcp_stream(tcp_stream);

    event_writer
        .write(&Event::Welcome(event::WelcomeReplyEvent {
            session_id: "session-id-1".into(),
        }))
        .await?;

    while let Some(result) = command_stream.next().await {
        match result {
            Ok(command) => println!("SERVER: received command: {:?}", command),
            Err(e) => println!("SERVER: failed to read command: {}", e),
        }
    }

    Ok(())
}

async fn client_example() -> anyhow::Result<()> {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let tcp_stream = TcpStream::connect(format!("localhost:{}", PORT))
        .await
        .context("failed to connect to server")?;

    let (mut event_stream, mut command_writer) = transport::client::split_tcp_stream(tcp_stream);

    match event_stream.next().await {
        Some(Ok(event)) => println!("CLIENT: received event: {:?}", event),
        Some(Err(e)) => println!("CLIENT: failed to read event: {}", e),
        None => return Err(anyhow::anyhow!("server closed the connection")),
    }

    command_writer
        .write(&UserCommand::CreateServer(command::CreateServerCommand {
            name: "Organic Chemistry".into(),
            username: Some("ada".into()),
            server_type: Some("private".into()),
            max_players: Some(4.0),
        }))
        .await?;

    command_writer
        .write(&UserCommand::Move(command::MoveCommand {
            x: Some(120.0),
            y: Some(64.0),
        }))
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tokio::try_join!(server_example(), client_example()).context("one of the examples failed")?;

    println!("example ran without problems");

    Ok(())
}
