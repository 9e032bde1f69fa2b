use tokio::net::{tcp::OwnedWriteHalf, TcpStream};

use crate::{command, event};

use super::common::{frame_stream, BoxedStream, FrameWriter};

/// [EventStream] is a stream of [crate::event::Event]s sent by the server
///
/// # Cancel Safety
///
/// This stream is cancel-safe, meaning that it can be used in [tokio::select]
/// without the risk of missing events.
pub type EventStream = BoxedStream<anyhow::Result<event::Event>>;

/// [CommandWriter] writes [crate::command::UserCommand]s to the server
pub type CommandWriter = FrameWriter<OwnedWriteHalf, command::UserCommand>;

/// Splits a TCP stream into a stream of events and a command writer.
///
/// # Arguments
///
/// - `stream` - A [TcpStream] to split
pub fn split_tcp_stream(stream: TcpStream) -> (EventStream, CommandWriter) {
    let (reader, writer) = stream.into_split();

    (frame_stream(reader, "server"), CommandWriter::new(writer))
}
