//! Watch module: container state streaming.

pub mod map;
pub mod reconcile;
pub mod route;

use thiserror::Error;

use crate::docker::RuntimeError;

pub use reconcile::{watch_containers, WatchContext};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Container event has no name attribute")]
    MissingName,

    #[error("Runtime event feed ended")]
    FeedEnded,

    #[error("Watch cancelled")]
    Cancelled,

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
