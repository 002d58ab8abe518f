//! # Cycle Runner
//!
//! The single consumer that drives [`SyncEngine::run_cycle`]: a fixed poll
//! interval plus a manual "update now" trigger.
//!
//! Manual triggers are coalesced through a depth-1 queue: if a cycle is
//! already running, one follow-up cycle is queued at most; further requests
//! are no-ops until it drains. Two cycles can never run concurrently, which
//! protects the single staging area.

use std::time::Duration;

use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::SyncEngine;
use crate::error::{Result, SyncError};

/// Handle for requesting an immediate sync cycle.
#[derive(Debug, Clone)]
pub struct UpdateTrigger {
    tx: mpsc::Sender<()>,
}

impl UpdateTrigger {
    /// Request a cycle as soon as the runner is free.
    ///
    /// Returns `false` when a follow-up cycle is already queued; the
    /// request coalesces into it.
    pub fn request(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Drives the engine on a timer and on manual triggers until cancelled.
pub struct CycleRunner {
    engine: SyncEngine,
    interval: Duration,
    trigger_rx: mpsc::Receiver<()>,
    events: EventBus,
}

impl CycleRunner {
    pub fn new(
        engine: SyncEngine,
        interval: Duration,
        events: EventBus,
    ) -> (Self, UpdateTrigger) {
        // Capacity 1 is the coalescing depth: one running cycle, at most
        // one queued behind it.
        let (tx, trigger_rx) = mpsc::channel(1);
        (
            Self {
                engine,
                interval,
                trigger_rx,
                events,
            },
            UpdateTrigger { tx },
        )
    }

    /// Run until the token is cancelled or a fatal error occurs.
    ///
    /// The first interval tick fires immediately, so startup runs a cycle
    /// without waiting a full poll period.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let trigger = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => "interval",
                received = self.trigger_rx.recv() => match received {
                    Some(()) => "manual",
                    None => break,
                },
            };

            debug!(trigger, "Starting cycle");
            self.events
                .emit(CoreEvent::Sync(SyncEvent::CycleStarted {
                    trigger: trigger.to_string(),
                }))
                .ok();

            let result = self.engine.run_cycle(&cancel).await;
            if let Some(e) = result.error {
                if e.is_fatal() {
                    error!(error = %e, "Fatal sync error; stopping runner");
                    return Err(e);
                }
                if matches!(e, SyncError::Cancelled) {
                    break;
                }
            }
        }

        info!("Cycle runner stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::store::{ObjectBody, ObjectStore, RemoteObject};
    use core_library::LibraryStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Store with nothing in it; counts listings so tests can count cycles.
    #[derive(Default)]
    struct CountingStore {
        list_calls: AtomicU32,
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn list(&self, _prefix: &str) -> BridgeResult<Vec<RemoteObject>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn fetch(&self, key: &str) -> BridgeResult<ObjectBody> {
            Err(bridge_traits::BridgeError::NotFound(key.to_string()))
        }
    }

    fn setup(root: &std::path::Path) -> (CycleRunner, UpdateTrigger, Arc<CountingStore>) {
        let store = Arc::new(CountingStore::default());
        let library = Arc::new(LibraryStore::open(root).unwrap());
        let events = EventBus::new(64);
        let engine = SyncEngine::new(
            EngineConfig {
                media_prefix: "dev/media/".to_string(),
                playlist_key: "dev/playlist.json".to_string(),
                retry_policy: Default::default(),
            },
            store.clone(),
            library,
            events.clone(),
        );
        let (runner, trigger) = CycleRunner::new(engine, Duration::from_secs(3600), events);
        (runner, trigger, store)
    }

    #[test]
    fn test_triggers_coalesce_to_depth_one() {
        let root = tempfile::tempdir().unwrap();
        let (_runner, trigger, _store) = setup(root.path());

        // Nobody is consuming: the first request queues, the second is a
        // no-op because one is already queued.
        assert!(trigger.request());
        assert!(!trigger.request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_executes_initial_and_manual_cycles() {
        let root = tempfile::tempdir().unwrap();
        let (runner, trigger, store) = setup(root.path());

        // Queue a manual cycle before the runner even starts.
        assert!(trigger.request());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(runner.run(cancel.clone()));

        // Startup tick + queued manual trigger.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 2);

        // A full poll period later the interval fires again.
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(store.list_calls.load(Ordering::SeqCst) >= 3);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_runner() {
        let root = tempfile::tempdir().unwrap();
        let (runner, _trigger, _store) = setup(root.path());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(runner.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
