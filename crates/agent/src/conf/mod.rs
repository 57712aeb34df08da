//! Conf module: configuration model, loading, and node token decoding.

pub mod model;
pub mod load;
pub mod token;

pub use model::AgentConfig;
pub use token::{ConnectionParams, TokenError};
