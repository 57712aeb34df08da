//! Client module: the runtime trait seam and helpers built on it.

pub mod docker;
pub mod fake;
pub mod live;
pub mod query;

pub use docker::RuntimeOps;
