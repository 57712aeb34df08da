//! Sub-stream: one session-scoped client stream to the orchestrator.
//!
//! Frames go out through a single-slot channel, so a slow orchestrator
//! stalls the producer. A background task awaits the call itself and
//! cancels the session token once the orchestrator closes the stream.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::Status;

use super::client::ControlFuture;

pub struct SubStream<T> {
    frames: mpsc::Sender<T>,
    closed: JoinHandle<Result<(), Status>>,
    token: CancellationToken,
}

impl<T: Send + 'static> SubStream<T> {
    /// Opens the stream with `call`. The session token is a child of
    /// `parent`, so shutdown reaches every open session.
    pub fn open<F>(parent: &CancellationToken, call: F) -> Self
    where
        F: FnOnce(mpsc::Receiver<T>) -> ControlFuture<()>,
    {
        let (frames, rx) = mpsc::channel(1);
        let token = parent.child_token();
        let response = call(rx);

        let on_close = token.clone();
        let closed = tokio::spawn(async move {
            let result = response.await;
            on_close.cancel();
            result
        });

        Self { frames, closed, token }
    }

    /// Cancelled when the orchestrator closes the stream or the agent
    /// shuts down.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Sends one frame. Fails once the orchestrator side is gone.
    pub async fn send(&self, frame: T) -> Result<(), Status> {
        self.frames
            .send(frame)
            .await
            .map_err(|_| Status::cancelled("sub-stream closed by orchestrator"))
    }

    /// Closes the sending side, then waits for the orchestrator to close
    /// its side.
    pub async fn finish(self) -> Result<(), Status> {
        drop(self.frames);
        match self.closed.await {
            Ok(result) => result,
            Err(e) => Err(Status::internal(format!("sub-stream task failed: {}", e))),
        }
    }
}
