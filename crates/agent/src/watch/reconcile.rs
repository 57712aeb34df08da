//! Reconcile: turns the runtime's raw event feed into state batches.
//!
//! The first batch is always the full snapshot. After that every
//! qualifying container event becomes a one-item batch.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::map::{map_container_state, map_container_state_list, removed_state_item, ContainerAction};
use super::WatchError;
use crate::client::query;
use crate::client::RuntimeOps;
use crate::docker::{ContainerFilter, RuntimeEvent};
use crate::proto::{ContainerState, ContainerStateItem};

/// Receiving side of a running watch. `events` closes when the
/// reconciler stops; a failure is delivered on `error` first.
pub struct WatchContext {
    pub events: mpsc::Receiver<Vec<ContainerStateItem>>,
    pub error: mpsc::Receiver<WatchError>,
}

/// Lists every container, then follows the event feed until `cancel`
/// fires or the receiving side goes away.
pub async fn watch_containers(
    runtime: Arc<dyn RuntimeOps>,
    cancel: CancellationToken,
) -> Result<WatchContext, WatchError> {
    let containers = tokio::select! {
        biased;

        _ = cancel.cancelled() => return Err(WatchError::Cancelled),
        listed = runtime.list_containers(&ContainerFilter::All) => listed?,
    };
    let snapshot = map_container_state_list(&containers);

    let (events_tx, events) = mpsc::channel(1);
    let (error_tx, error) = mpsc::channel(1);

    tokio::spawn(async move {
        if let Err(e) = reconcile(runtime.as_ref(), snapshot, events_tx, &cancel).await {
            let _ = error_tx.send(e).await;
        }
    });

    Ok(WatchContext { events, error })
}

async fn reconcile(
    runtime: &dyn RuntimeOps,
    snapshot: Vec<ContainerStateItem>,
    tx: mpsc::Sender<Vec<ContainerStateItem>>,
    cancel: &CancellationToken,
) -> Result<(), WatchError> {
    // Subscribe before the snapshot goes out.
    let mut feed = runtime.events();
    if !emit(&tx, snapshot, cancel).await {
        return Ok(());
    }

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = feed.next() => next,
        };

        let event = match next {
            Some(event) => event?,
            None => return Err(WatchError::FeedEnded),
        };

        let item = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            item = message_to_state_item(runtime, &event) => item?,
        };

        if let Some(item) = item {
            if !emit(&tx, vec![item], cancel).await {
                return Ok(());
            }
        }
    }
}

/// False once the watch should stop.
async fn emit(tx: &mpsc::Sender<Vec<ContainerStateItem>>, batch: Vec<ContainerStateItem>, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(batch) => sent.is_ok(),
    }
}

/// Maps one raw event to a state item. `None` means the event carries
/// no state change.
pub async fn message_to_state_item(
    runtime: &dyn RuntimeOps,
    event: &RuntimeEvent,
) -> Result<Option<ContainerStateItem>, WatchError> {
    if event.kind != "container" {
        trace!(kind = %event.kind, action = %event.action, "Skipping non-container event");
        return Ok(None);
    }

    let name = event.attribute("name").ok_or(WatchError::MissingName)?;

    let action = ContainerAction::parse(&event.action);
    if action == ContainerAction::Destroy {
        return Ok(Some(removed_state_item(name)));
    }

    let state = action.state();
    if state == ContainerState::Unspecified {
        trace!(name, action = %event.action, "Skipping container event");
        return Ok(None);
    }

    let Some(info) = query::get_container_by_id(runtime, &event.actor_id).await? else {
        debug!(name, id = %event.actor_id, "Container vanished before lookup");
        return Ok(None);
    };

    // The event is newer than whatever the list call saw.
    let mut item = map_container_state(&info);
    item.state = state as i32;
    Ok(Some(item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{FakeContainer, FakeRuntime};
    use std::collections::HashMap;
    use std::time::Duration;

    fn container_event(action: &str, id: &str, name: Option<&str>) -> RuntimeEvent {
        let mut attributes = HashMap::new();
        if let Some(name) = name {
            attributes.insert("name".to_string(), name.to_string());
        }
        RuntimeEvent {
            kind: "container".to_string(),
            action: action.to_string(),
            actor_id: id.to_string(),
            attributes,
        }
    }

    #[tokio::test]
    async fn test_destroy_needs_no_lookup() {
        let fake = FakeRuntime::new();
        let item = message_to_state_item(&fake, &container_event("destroy", "aaa", Some("web-1")))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(item.name, "web-1");
        assert_eq!(item.state, ContainerState::Removed as i32);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_noise_actions_are_dropped() {
        let fake = FakeRuntime::new();
        for action in ["oom", "exec_start: sh -c ls", "tty", "attach"] {
            let item = message_to_state_item(&fake, &container_event(action, "aaa", Some("web-1")))
                .await
                .unwrap();
            assert!(item.is_none(), "{} should be dropped", action);
        }
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_container_events_are_ignored() {
        let fake = FakeRuntime::new();
        let mut event = container_event("pull", "nginx", None);
        event.kind = "image".to_string();

        assert!(message_to_state_item(&fake, &event).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_name_is_an_error() {
        let fake = FakeRuntime::new();
        let err = message_to_state_item(&fake, &container_event("start", "aaa", None)).await;
        assert!(matches!(err, Err(WatchError::MissingName)));
    }

    #[tokio::test]
    async fn test_action_state_overrides_listed_state() {
        let fake = FakeRuntime::new();
        // The list call still reports "exited" while the start event is already in.
        fake.add_container(FakeContainer::new("aaa", "web-1", "exited"));

        let item = message_to_state_item(&fake, &container_event("start", "aaa", Some("web-1")))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(item.state, ContainerState::Running as i32);
        assert_eq!(item.reason, "exited");
        assert_eq!(fake.calls(), vec!["list:id=aaa".to_string()]);
    }

    #[tokio::test]
    async fn test_vanished_container_is_dropped() {
        let fake = FakeRuntime::new();
        let item = message_to_state_item(&fake, &container_event("die", "gone", Some("old"))).await;
        assert!(matches!(item, Ok(None)));
    }

    #[tokio::test]
    async fn test_snapshot_comes_first() {
        let fake = Arc::new(FakeRuntime::new());
        fake.add_container(FakeContainer::new("aaa", "web-1", "running"));
        fake.add_container(FakeContainer::new("bbb", "db", "exited"));
        fake.push_event(container_event("stop", "aaa", Some("web-1")));

        let mut watch = watch_containers(fake.clone(), CancellationToken::new()).await.unwrap();

        let snapshot = watch.events.recv().await.unwrap();
        assert_eq!(snapshot.len(), 2);

        let update = watch.events.recv().await.unwrap();
        assert_eq!(update.len(), 1);
        assert_eq!(update[0].name, "web-1");
        assert_eq!(update[0].state, ContainerState::Exited as i32);
    }

    #[tokio::test]
    async fn test_feed_end_is_reported() {
        let fake = Arc::new(FakeRuntime::new());
        fake.close_events();

        let mut watch = watch_containers(fake, CancellationToken::new()).await.unwrap();
        assert!(watch.events.recv().await.unwrap().is_empty());
        assert!(watch.events.recv().await.is_none());
        assert!(matches!(watch.error.recv().await, Some(WatchError::FeedEnded)));
    }

    #[tokio::test]
    async fn test_list_failure_fails_watch() {
        let fake = Arc::new(FakeRuntime::new());
        fake.fail_list();
        let err = watch_containers(fake, CancellationToken::new()).await;
        assert!(matches!(err, Err(WatchError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_cancel_stops_reconciler() {
        let fake = Arc::new(FakeRuntime::new());
        let cancel = CancellationToken::new();
        let mut watch = watch_containers(fake, cancel.clone()).await.unwrap();

        watch.events.recv().await.unwrap();
        cancel.cancel();
        assert!(watch.events.recv().await.is_none());
        assert!(watch.error.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_watch_skips_list() {
        let fake = Arc::new(FakeRuntime::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = watch_containers(fake.clone(), cancel).await;
        assert!(matches!(err, Err(WatchError::Cancelled)));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_is_open_before_snapshot_is_taken_up() {
        let fake = Arc::new(FakeRuntime::new());
        let watch = watch_containers(fake.clone(), CancellationToken::new()).await.unwrap();

        // Nobody reads the snapshot, yet the feed is already subscribed.
        drop(watch);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fake.calls(), vec!["list:all".to_string(), "events".to_string()]);
    }
}
