//! Runtime trait: abstract interface for every container runtime call.
//!
//! Session handlers and the state reconciler reach the runtime only
//! through this trait. `live.rs` provides the real Bollard-backed
//! implementation, `fake.rs` an in-memory test double.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use tokio::io::AsyncRead;

use crate::docker::{ContainerFilter, ContainerInfo, Inspection, LogOptions, RuntimeError, RuntimeEvent};

pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RuntimeError>> + Send + 'a>>;

pub type EventStream<'a> = Pin<Box<dyn Stream<Item = Result<RuntimeEvent, RuntimeError>> + Send + 'a>>;

pub type LogReader<'a> = Pin<Box<dyn AsyncRead + Send + 'a>>;

/// Unified async interface over the container runtime.
///
/// Object-safe thanks to `Pin<Box<…>>` returns. Implementations must be
/// `Send + Sync` so they can live inside `Arc<AgentState>`.
pub trait RuntimeOps: Send + Sync {
    // ── Container queries ───────────────────────────────────────

    /// All containers in every state, narrowed by `filter`.
    fn list_containers<'a>(&'a self, filter: &'a ContainerFilter) -> RuntimeFuture<'a, Vec<ContainerInfo>>;

    fn inspect_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, Inspection>;

    // ── Container lifecycle ─────────────────────────────────────

    fn start_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ()>;

    fn stop_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ()>;

    fn restart_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ()>;

    fn remove_container<'a>(&'a self, id: &'a str, force: bool) -> RuntimeFuture<'a, ()>;

    // ── Streams ─────────────────────────────────────────────────

    /// Unfiltered engine event feed.
    fn events(&self) -> EventStream<'_>;

    /// Raw log bytes: 8-byte framed records for non-TTY containers,
    /// plain text for TTY containers.
    fn container_logs<'a>(&'a self, id: &'a str, options: LogOptions) -> LogReader<'a>;
}
