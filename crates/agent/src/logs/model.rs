//! Log session types shared by the decoder and the relay.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("end of log stream")]
    Eof,
    #[error("log stream cancelled")]
    Cancelled,
    #[error("log frame truncated: expected {expected} bytes, read {read}")]
    Truncated { expected: usize, read: usize },
    #[error("log stream read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl LogError {
    /// Expected ends of a session that are not worth an error log.
    /// A clean EOF only counts when the stream was not following.
    pub fn is_expected(&self, following: bool) -> bool {
        match self {
            LogError::Cancelled => true,
            LogError::Eof => !following,
            LogError::Truncated { .. } | LogError::Io(_) => false,
        }
    }
}

/// One decoded log record, or the error that ended the stream.
/// An `Error` is always the last event a reader yields.
#[derive(Debug)]
pub enum LogEvent {
    Message(String),
    Error(LogError),
}

/// Consumer half of a decoder task.
pub struct ContainerLogReader {
    events: mpsc::Receiver<LogEvent>,
    task: AbortHandle,
}

impl ContainerLogReader {
    pub(crate) fn new(events: mpsc::Receiver<LogEvent>, task: AbortHandle) -> Self {
        Self { events, task }
    }

    /// Next event, or `None` once the decoder task is gone.
    pub async fn next(&mut self) -> Option<LogEvent> {
        self.events.recv().await
    }

    /// Stops the decoder task, which drops the runtime log stream.
    pub fn close(&mut self) {
        self.task.abort();
        self.events.close();
    }
}

impl Drop for ContainerLogReader {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct LogContext {
    pub reader: ContainerLogReader,
    /// False when the target is the agent's own container.
    pub echo: bool,
    /// Whether the runtime stream was opened in follow mode.
    pub following: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_terminations() {
        assert!(LogError::Cancelled.is_expected(true));
        assert!(LogError::Eof.is_expected(false));
        assert!(!LogError::Eof.is_expected(true));
        assert!(!LogError::Truncated { expected: 5, read: 2 }.is_expected(false));
    }
}
