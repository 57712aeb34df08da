//! Decode: turns a raw runtime log stream into `LogEvent`s.
//!
//! Non-TTY containers produce multiplexed records: an 8-byte header
//! (stream id in byte 0, big-endian payload length in bytes 4..8) followed
//! by the payload. TTY containers produce plain newline-terminated text.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::model::{LogError, LogEvent};
use crate::docker::container::LOG_HEADER_LENGTH;

pub const INITIAL_BUFFER_SIZE: usize = 2048;

/// Reads until `buf` is full or the reader hits EOF. Returns bytes read.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize, LogError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Decoder for the framed (non-TTY) shape.
pub struct FrameDecoder<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: vec![0; INITIAL_BUFFER_SIZE],
        }
    }

    /// Current payload buffer size. Grows to fit the largest payload seen
    /// and never shrinks.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Next non-empty payload. A partially read payload is discarded.
    pub async fn next_message(&mut self) -> Result<String, LogError> {
        loop {
            let mut header = [0u8; LOG_HEADER_LENGTH];
            match read_full(&mut self.reader, &mut header).await? {
                0 => return Err(LogError::Eof),
                LOG_HEADER_LENGTH => {}
                read => return Err(LogError::Truncated { expected: LOG_HEADER_LENGTH, read }),
            }

            let size = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
            if size > self.buffer.len() {
                self.buffer.resize(size, 0);
            }

            let read = read_full(&mut self.reader, &mut self.buffer[..size]).await?;
            if read < size {
                return Err(LogError::Truncated { expected: size, read });
            }
            if size > 0 {
                return Ok(String::from_utf8_lossy(&self.buffer[..size]).into_owned());
            }
        }
    }
}

/// Decoder for the raw (TTY) shape.
pub struct LineDecoder<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: Vec::new(),
        }
    }

    /// Next line including its newline. An unterminated last line is dropped.
    pub async fn next_message(&mut self) -> Result<String, LogError> {
        self.line.clear();
        self.reader.read_until(b'\n', &mut self.line).await?;
        if self.line.last() != Some(&b'\n') {
            return Err(LogError::Eof);
        }
        Ok(String::from_utf8_lossy(&self.line).into_owned())
    }
}

enum Decoder<R> {
    Framed(FrameDecoder<R>),
    Lines(LineDecoder<R>),
}

impl<R: AsyncRead + Unpin> Decoder<R> {
    async fn next_message(&mut self) -> Result<String, LogError> {
        match self {
            Decoder::Framed(d) => d.next_message().await,
            Decoder::Lines(d) => d.next_message().await,
        }
    }
}

/// Decodes `reader` until it fails, ends, or `cancel` fires, sending each
/// event on `tx`. The last event sent is always an error.
pub async fn pump<R>(reader: R, tty: bool, tx: mpsc::Sender<LogEvent>, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = if tty {
        Decoder::Lines(LineDecoder::new(reader))
    } else {
        Decoder::Framed(FrameDecoder::new(reader))
    };

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => LogEvent::Error(LogError::Cancelled),
            next = decoder.next_message() => match next {
                Ok(message) => LogEvent::Message(message),
                Err(e) => LogEvent::Error(e),
            },
        };

        let last = matches!(event, LogEvent::Error(_));
        if tx.send(event).await.is_err() || last {
            break;
        }
    }
}
