//! Logs module: container log sessions and the log frame decoder.

pub mod decode;
pub mod model;
pub mod open;
pub mod route;

pub use model::{ContainerLogReader, LogContext, LogError, LogEvent};
