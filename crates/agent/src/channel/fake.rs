//! Fake: in-memory orchestrator for session and client loop tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tonic::Status;

use super::client::{CommandStream, ControlClient, ControlFuture};
use crate::proto::{
    AgentCommand, AgentInfo, ContainerInspectMessage, ContainerLogMessage,
    ContainerStateListMessage,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of one `connect` call.
pub enum ScriptedConnect {
    /// The stream fails to open.
    Refuse(Status),
    /// The stream yields these items, then ends.
    Open(Vec<Result<AgentCommand, Status>>),
}

#[derive(Default)]
struct Recorded {
    state_frames: Vec<ContainerStateListMessage>,
    log_frames: Vec<(String, ContainerLogMessage)>,
    inspections: Vec<ContainerInspectMessage>,
}

/// Scripted [`ControlClient`].
///
/// Sub-streams record every frame and complete once the sender is
/// dropped, unless `close_streams` makes the orchestrator side close them
/// straight away. When the connect script runs out, `connect` returns a
/// stream that never yields.
#[derive(Default)]
pub struct FakeControl {
    script: Mutex<VecDeque<ScriptedConnect>>,
    connects: AtomicUsize,
    agents: Mutex<Vec<AgentInfo>>,
    recorded: Arc<Mutex<Recorded>>,
    close_streams: AtomicBool,
}

impl FakeControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_connect(&self, outcome: ScriptedConnect) {
        lock(&self.script).push_back(outcome);
    }

    /// Sub-streams opened from now on are closed by the orchestrator
    /// without reading any frame.
    pub fn close_streams(&self) {
        self.close_streams.store(true, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn agents(&self) -> Vec<AgentInfo> {
        lock(&self.agents).clone()
    }

    pub fn state_frames(&self) -> Vec<ContainerStateListMessage> {
        lock(&self.recorded).state_frames.clone()
    }

    pub fn log_frames(&self) -> Vec<(String, ContainerLogMessage)> {
        lock(&self.recorded).log_frames.clone()
    }

    pub fn inspections(&self) -> Vec<ContainerInspectMessage> {
        lock(&self.recorded).inspections.clone()
    }
}

impl ControlClient for FakeControl {
    fn connect(&self, info: AgentInfo) -> ControlFuture<CommandStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        lock(&self.agents).push(info);
        let next = lock(&self.script).pop_front();

        Box::pin(async move {
            match next {
                Some(ScriptedConnect::Refuse(status)) => Err(status),
                Some(ScriptedConnect::Open(items)) => {
                    Ok(Box::pin(futures_util::stream::iter(items)) as CommandStream)
                }
                None => Ok(Box::pin(futures_util::stream::pending()) as CommandStream),
            }
        })
    }

    fn container_state(&self, mut frames: mpsc::Receiver<ContainerStateListMessage>) -> ControlFuture<()> {
        let recorded = self.recorded.clone();
        let close = self.close_streams.load(Ordering::SeqCst);
        Box::pin(async move {
            if close {
                return Ok(());
            }
            while let Some(frame) = frames.recv().await {
                lock(&recorded).state_frames.push(frame);
            }
            Ok(())
        })
    }

    fn container_log(&self, name: &str, mut frames: mpsc::Receiver<ContainerLogMessage>) -> ControlFuture<()> {
        let recorded = self.recorded.clone();
        let close = self.close_streams.load(Ordering::SeqCst);
        let name = name.to_string();
        Box::pin(async move {
            if close {
                return Ok(());
            }
            while let Some(frame) = frames.recv().await {
                lock(&recorded).log_frames.push((name.clone(), frame));
            }
            Ok(())
        })
    }

    fn container_inspect(&self, message: ContainerInspectMessage) -> ControlFuture<()> {
        let recorded = self.recorded.clone();
        Box::pin(async move {
            lock(&recorded).inspections.push(message);
            Ok(())
        })
    }
}
