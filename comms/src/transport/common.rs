use std::{io, marker::PhantomData, pin::Pin};

use anyhow::Context;
use futures_util::stream;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio_stream::{Stream, StreamExt};

pub const NEW_LINE: &[u8; 2] = b"\r\n";

pub type BoxedStream<Item> = Pin<Box<dyn Stream<Item = Item> + Send>>;

/// Writes values of type `T` as newline delimited JSON documents
pub struct FrameWriter<W, T> {
    writer: W,
    _frame: PhantomData<fn(&T)>,
}

impl<W: AsyncWrite + Unpin, T: Serialize> FrameWriter<W, T> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            _frame: PhantomData,
        }
    }

    /// Serialize a single frame and write it to the backing writer
    ///
    /// # Cancel Safety
    ///
    /// This method is not cancellation safe. If it is used as the event
    /// in a [tokio::select!] statement and some other
    /// branch completes first, then the frame may have been
    /// partially written, but future calls to `write` will start over
    /// from the beginning of the buffer. Causing undefined behaviour.
    pub async fn write(&mut self, frame: &T) -> anyhow::Result<()> {
        let mut serialized_bytes = serde_json::to_vec(frame)?;
        serialized_bytes.extend_from_slice(NEW_LINE);

        self.writer.write_all(serialized_bytes.as_slice()).await?;

        Ok(())
    }
}

/// Longest line accepted from a peer, line ending included
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Reads the next line without its line ending.
/// A line longer than [MAX_LINE_BYTES] is skipped up to its newline and reported as
/// an [io::ErrorKind::InvalidData] error, same as a line that is not valid UTF-8.
async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<io::Result<String>> {
    let mut line = Vec::new();
    let mut too_long = false;

    loop {
        let read = match AsyncReadExt::take(&mut *reader, MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut line)
            .await
        {
            Ok(read) => read,
            Err(err) => return Some(Err(err)),
        };

        if line.len() > MAX_LINE_BYTES {
            too_long = true;
            line.clear();
        }
        if read == 0 || line.ends_with(b"\n") {
            break;
        }
    }

    if too_long {
        return Some(Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line is longer than {} bytes", MAX_LINE_BYTES),
        )));
    }
    if line.is_empty() {
        return None;
    }

    if line.ends_with(b"\n") {
        line.pop();
        if line.ends_with(b"\r") {
            line.pop();
        }
    }

    Some(String::from_utf8(line).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err)))
}

/// Whether the error is about a single line the peer sent, rather than the connection itself.
/// The stream keeps going after such an error.
pub fn is_bad_frame(err: &anyhow::Error) -> bool {
    err.is::<serde_json::Error>()
        || err
            .downcast_ref::<io::Error>()
            .is_some_and(|err| err.kind() == io::ErrorKind::InvalidData)
}

/// Turns a reader into a stream of JSON documents, one per line.
/// A line that can not be decoded yields an error but does not end the stream.
pub fn frame_stream<R, T>(reader: R, peer: &'static str) -> BoxedStream<anyhow::Result<T>>
where
    R: AsyncRead + Unpin + Send + 'static,
    T: DeserializeOwned + 'static,
{
    let lines = stream::unfold(BufReader::new(reader), |mut reader| async move {
        read_line(&mut reader).await.map(|line| (line, reader))
    });

    Box::pin(lines.map(move |line| {
        line.with_context(|| format!("could not read line from the {}", peer))
            .and_then(|line| {
                serde_json::from_str::<T>(&line)
                    .with_context(|| format!("failed to deserialize frame from the {}", peer))
            })
    }))
}
