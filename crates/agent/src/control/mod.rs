//! Control module: one-shot command sessions.

pub mod route;
