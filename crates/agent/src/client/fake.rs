//! Fake: test double for runtime operations.
//!
//! Provides a deterministic [`FakeRuntime`] that implements [`RuntimeOps`]
//! using in-memory state. Every call is recorded so tests can assert on
//! what a handler asked the runtime to do.

use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::client::docker::{EventStream, LogReader, RuntimeFuture, RuntimeOps};
use crate::docker::{ContainerFilter, ContainerInfo, Inspection, LogOptions, RuntimeError, RuntimeEvent};

/// A canned container for the fake store.
#[derive(Clone, Debug, Default)]
pub struct FakeContainer {
    pub info: ContainerInfo,
    pub tty: bool,
    /// Raw bytes served by `container_logs`, already in wire shape.
    pub logs: Vec<u8>,
}

impl FakeContainer {
    pub fn new(id: &str, name: &str, state: &str) -> Self {
        Self {
            info: ContainerInfo {
                id: id.to_string(),
                name: name.to_string(),
                state: state.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_logs(mut self, tty: bool, logs: impl Into<Vec<u8>>) -> Self {
        self.tty = tty;
        self.logs = logs.into();
        self
    }
}

#[derive(Default)]
struct Inner {
    containers: Vec<FakeContainer>,
    calls: Vec<String>,
    fail_list: bool,
}

/// A fake container runtime for deterministic testing.
pub struct FakeRuntime {
    inner: Mutex<Inner>,
    event_tx: Mutex<Option<mpsc::UnboundedSender<RuntimeEvent>>>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<RuntimeEvent>>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Mutex::new(Inner::default()),
            event_tx: Mutex::new(Some(tx)),
            event_rx: Mutex::new(Some(rx)),
        }
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a container into the fake store.
    pub fn add_container(&self, container: FakeContainer) {
        self.state().containers.push(container);
    }

    /// Make every list call fail.
    pub fn fail_list(&self) {
        self.state().fail_list = true;
    }

    /// Queue an engine event for the (single) event subscriber.
    pub fn push_event(&self, event: RuntimeEvent) {
        let tx = self.event_tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = tx.as_ref() {
            let _ = tx.send(event);
        }
    }

    /// End the event feed once the queued events are drained.
    pub fn close_events(&self) {
        self.event_tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Calls made so far, e.g. `list:name=web-1`, `stop:abc`, `events`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }

    fn find(&self, id: &str) -> Result<FakeContainer, RuntimeError> {
        self.state()
            .containers
            .iter()
            .find(|c| c.info.id == id)
            .cloned()
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.to_string()))
    }

    fn lifecycle(&self, verb: &str, id: &str, new_state: Option<&str>) -> Result<(), RuntimeError> {
        self.record(format!("{}:{}", verb, id));
        let mut state = self.state();
        let container = state
            .containers
            .iter_mut()
            .find(|c| c.info.id == id)
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.to_string()))?;
        if let Some(s) = new_state {
            container.info.state = s.to_string();
        }
        Ok(())
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(info: &ContainerInfo, filter: &ContainerFilter) -> bool {
    match filter {
        ContainerFilter::All => true,
        ContainerFilter::Name(name) => &info.name == name,
        ContainerFilter::Id(id) => info.id.starts_with(id.as_str()),
        ContainerFilter::Label(label) => match label.split_once('=') {
            Some((key, value)) => info.labels.get(key).is_some_and(|v| v == value),
            None => info.labels.contains_key(label.as_str()),
        },
    }
}

fn describe(filter: &ContainerFilter) -> String {
    match filter {
        ContainerFilter::All => "list:all".to_string(),
        ContainerFilter::Name(name) => format!("list:name={}", name),
        ContainerFilter::Id(id) => format!("list:id={}", id),
        ContainerFilter::Label(label) => format!("list:label={}", label),
    }
}

impl RuntimeOps for FakeRuntime {
    fn list_containers<'a>(&'a self, filter: &'a ContainerFilter) -> RuntimeFuture<'a, Vec<ContainerInfo>> {
        Box::pin(async move {
            self.record(describe(filter));
            let state = self.state();
            if state.fail_list {
                return Err(RuntimeError::ConnectionFailed("list refused".to_string()));
            }
            Ok(state
                .containers
                .iter()
                .filter(|c| matches(&c.info, filter))
                .map(|c| c.info.clone())
                .collect())
        })
    }

    fn inspect_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, Inspection> {
        Box::pin(async move {
            self.record(format!("inspect:{}", id));
            let container = self.find(id)?;
            Ok(Inspection {
                id: container.info.id.clone(),
                tty: container.tty,
                document: serde_json::json!({
                    "Id": container.info.id,
                    "Name": format!("/{}", container.info.name),
                    "Config": { "Tty": container.tty },
                }),
            })
        })
    }

    fn start_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move { self.lifecycle("start", id, Some("running")) })
    }

    fn stop_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move { self.lifecycle("stop", id, Some("exited")) })
    }

    fn restart_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(async move { self.lifecycle("restart", id, Some("running")) })
    }

    fn remove_container<'a>(&'a self, id: &'a str, force: bool) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            let verb = if force { "remove-force" } else { "remove" };
            self.lifecycle(verb, id, None)?;
            self.state().containers.retain(|c| c.info.id != id);
            Ok(())
        })
    }

    /// The first subscriber gets the queued feed, later ones an empty
    /// feed that never yields.
    fn events(&self) -> EventStream<'_> {
        self.record("events".to_string());
        let rx = self.event_rx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match rx {
            Some(rx) => Box::pin(UnboundedReceiverStream::new(rx).map(Ok)),
            None => Box::pin(futures_util::stream::pending()),
        }
    }

    fn container_logs<'a>(&'a self, id: &'a str, options: LogOptions) -> LogReader<'a> {
        self.record(format!("logs:{}:follow={}:tail={}", id, options.follow, options.tail));
        let bytes = self.find(id).map(|c| c.logs).unwrap_or_default();
        Box::pin(Cursor::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> FakeRuntime {
        let fake = FakeRuntime::new();
        let mut web = FakeContainer::new("aaa111", "web-1", "running");
        web.info.labels.insert("tier".into(), "front".into());
        fake.add_container(web);
        fake.add_container(FakeContainer::new("bbb222", "db", "exited"));
        fake
    }

    #[tokio::test]
    async fn test_list_filters() {
        let fake = runtime();
        let by_name = fake.list_containers(&ContainerFilter::Name("web-1".into())).await.unwrap();
        assert_eq!(by_name.len(), 1);

        let by_prefix = fake.list_containers(&ContainerFilter::Id("bbb".into())).await.unwrap();
        assert_eq!(by_prefix[0].name, "db");

        let by_label = fake.list_containers(&ContainerFilter::Label("tier=front".into())).await.unwrap();
        assert_eq!(by_label[0].id, "aaa111");

        let all = fake.list_containers(&ContainerFilter::All).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(fake.calls()[0], "list:name=web-1");
    }

    #[tokio::test]
    async fn test_remove_drops_container() {
        let fake = runtime();
        fake.remove_container("bbb222", false).await.unwrap();
        let all = fake.list_containers(&ContainerFilter::All).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(fake.calls().contains(&"remove:bbb222".to_string()));
    }

    #[tokio::test]
    async fn test_events_are_single_subscriber() {
        let fake = runtime();
        fake.push_event(RuntimeEvent { action: "start".into(), ..Default::default() });
        fake.close_events();

        let mut feed = fake.events();
        assert_eq!(feed.next().await.unwrap().unwrap().action, "start");
        assert!(feed.next().await.is_none());
    }
}
