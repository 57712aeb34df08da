//! Runtime module: process lifecycle (boot, serve, shutdown).

pub mod boot;
pub mod serve;
pub mod stop;
