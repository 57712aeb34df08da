//! Channel module: the control channel to the orchestrator. Covers dialing,
//! the reconnect loop, command dispatch and per-session sub-streams.

pub mod cert;
pub mod client;
pub mod dial;
pub mod dispatch;
pub mod error;
pub mod fake;
pub mod session;
pub mod substream;
#[cfg(test)]
pub(crate) mod tls_fixture;

pub use client::{ControlClient, GrpcControlClient};
pub use dispatch::{Dispatcher, SessionContext};
pub use error::{ConnectionError, SessionError};
pub use session::{ClientLoop, LoopExit, RetryPolicy};
pub use substream::SubStream;
