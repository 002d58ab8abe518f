//! Integration tests for full sync cycles
//!
//! These tests drive the engine end to end against an in-memory object
//! store and a real on-disk library, covering:
//! - Partial corruption isolation (bad entries skipped, rest promoted)
//! - Entries vanishing between list and fetch
//! - Retaining the previous version of a file whose update is corrupt
//! - Atomicity under mid-download stream faults
//! - Rollback restoring the exact pre-promotion manifest
//! - Playlist fallback and ordering end to end

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::RetryPolicy;
use bridge_traits::store::{ObjectBody, ObjectStore, RemoteObject};
use core_library::LibraryStore;
use core_runtime::events::EventBus;
use core_sync::{EngineConfig, SyncEngine, SyncError};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PREFIX: &str = "lobby/dev1/media/";
const PLAYLIST_KEY: &str = "lobby/dev1/playlist.json";

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// One mocked remote object: the bytes served, the digest declared, and
/// optional fault injection.
#[derive(Clone)]
struct MockObject {
    data: Vec<u8>,
    declared_digest: String,
    /// Listed, but fetch returns NotFound (deleted between list and fetch).
    vanish_on_fetch: bool,
    /// Stream errors out after this many bytes.
    interrupt_after: Option<usize>,
}

#[derive(Default)]
struct MockStore {
    objects: Mutex<HashMap<String, MockObject>>,
}

impl MockStore {
    fn put(&self, key: &str, data: &[u8]) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            MockObject {
                data: data.to_vec(),
                declared_digest: sha256_hex(data),
                vanish_on_fetch: false,
                interrupt_after: None,
            },
        );
    }

    /// Serve `data` while declaring the digest of `claimed`: a corrupt
    /// upload from the device's point of view.
    fn put_corrupt(&self, key: &str, data: &[u8], claimed: &[u8]) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            MockObject {
                data: data.to_vec(),
                declared_digest: sha256_hex(claimed),
                vanish_on_fetch: false,
                interrupt_after: None,
            },
        );
    }

    fn vanish_on_fetch(&self, key: &str) {
        if let Some(object) = self.objects.lock().unwrap().get_mut(key) {
            object.vanish_on_fetch = true;
        }
    }

    fn interrupt_after(&self, key: &str, bytes: usize) {
        if let Some(object) = self.objects.lock().unwrap().get_mut(key) {
            object.interrupt_after = Some(bytes);
        }
    }

    fn remove(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }
}

/// Reader that yields a prefix of the data then fails, simulating a
/// network drop mid-download.
struct InterruptedReader {
    data: Vec<u8>,
    position: usize,
    fail_at: usize,
}

impl tokio::io::AsyncRead for InterruptedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.position >= self.fail_at {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset mid-stream",
            )));
        }
        let end = self.fail_at.min(self.data.len());
        let n = (end - self.position).min(buf.remaining());
        let start = self.position;
        buf.put_slice(&self.data[start..start + n]);
        self.position += n;
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn list(&self, prefix: &str) -> BridgeResult<Vec<RemoteObject>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| RemoteObject {
                key: key.clone(),
                size: object.data.len() as u64,
                digest: Some(object.declared_digest.clone()),
                modified_at: Some(1),
            })
            .collect())
    }

    async fn fetch(&self, key: &str) -> BridgeResult<ObjectBody> {
        let object = {
            let objects = self.objects.lock().unwrap();
            objects
                .get(key)
                .cloned()
                .ok_or_else(|| BridgeError::NotFound(key.to_string()))?
        };
        if object.vanish_on_fetch {
            return Err(BridgeError::NotFound(key.to_string()));
        }

        let reader: Box<dyn tokio::io::AsyncRead + Send + Unpin> = match object.interrupt_after {
            Some(fail_at) => Box::new(InterruptedReader {
                data: object.data.clone(),
                position: 0,
                fail_at,
            }),
            None => Box::new(std::io::Cursor::new(object.data.clone())),
        };

        Ok(ObjectBody {
            declared_size: Some(object.data.len() as u64),
            digest: Some(object.declared_digest.clone()),
            reader,
        })
    }
}

struct Harness {
    engine: SyncEngine,
    store: Arc<MockStore>,
    library: Arc<LibraryStore>,
    cancel: CancellationToken,
}

impl Harness {
    fn new(root: &std::path::Path) -> Self {
        let store = Arc::new(MockStore::default());
        let library = Arc::new(LibraryStore::open(root).unwrap());
        let engine = SyncEngine::new(
            EngineConfig {
                media_prefix: PREFIX.to_string(),
                playlist_key: PLAYLIST_KEY.to_string(),
                retry_policy: RetryPolicy {
                    max_attempts: 3,
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(4),
                    use_exponential_backoff: true,
                },
            },
            store.clone(),
            library.clone(),
            EventBus::new(128),
        );
        Self {
            engine,
            store,
            library,
            cancel: CancellationToken::new(),
        }
    }

    async fn cycle(&mut self) -> core_sync::CycleResult {
        self.engine.run_cycle(&self.cancel).await
    }

    fn playlist_filenames(&self) -> Vec<String> {
        self.engine
            .subscribe_playlist()
            .borrow()
            .entries
            .iter()
            .map(|e| e.filename.clone())
            .collect()
    }

    fn manifest_filenames(&self) -> HashSet<String> {
        self.library
            .current_manifest()
            .map(|m| m.filenames().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[tokio::test]
async fn partial_corruption_is_isolated_to_one_entry() {
    let root = tempfile::tempdir().unwrap();
    let mut h = Harness::new(root.path());

    for name in ["a.mp4", "b.mp4", "c.mp4", "d.mp4"] {
        h.store
            .put(&format!("{}{}", PREFIX, name), name.as_bytes());
    }
    // Fifth file declares one digest and serves other bytes: every retry
    // fails verification.
    h.store
        .put_corrupt(&format!("{}bad.mp4", PREFIX), b"garbage", b"intended");

    let result = h.cycle().await;

    assert!(result.changed);
    assert!(matches!(
        result.error,
        Some(SyncError::CorruptDownload { .. })
    ));

    // The other four are promoted and playable; the playlist drops only
    // the corrupt entry.
    let manifest = h.manifest_filenames();
    assert_eq!(manifest.len(), 4);
    assert!(!manifest.contains("bad.mp4"));
    let playlist = h.playlist_filenames();
    assert_eq!(playlist, vec!["a.mp4", "b.mp4", "c.mp4", "d.mp4"]);
}

#[tokio::test]
async fn vanished_entry_is_skipped_not_fatal() {
    let root = tempfile::tempdir().unwrap();
    let mut h = Harness::new(root.path());

    h.store.put(&format!("{}stays.mp4", PREFIX), b"stays");
    h.store.put(&format!("{}ghost.mp4", PREFIX), b"ghost");
    h.store.vanish_on_fetch(&format!("{}ghost.mp4", PREFIX));

    let result = h.cycle().await;

    assert!(result.changed);
    assert!(matches!(result.error, Some(SyncError::NotFound(_))));
    assert_eq!(h.playlist_filenames(), vec!["stays.mp4"]);
}

#[tokio::test]
async fn corrupt_update_retains_previous_version() {
    let root = tempfile::tempdir().unwrap();
    let mut h = Harness::new(root.path());

    let key = format!("{}loop.mp4", PREFIX);
    h.store.put(&key, b"version-1");
    assert!(h.cycle().await.changed);

    // The remote upload of version 2 is corrupt.
    h.store.put_corrupt(&key, b"version-2-garbled", b"version-2");
    let result = h.cycle().await;
    assert!(matches!(
        result.error,
        Some(SyncError::CorruptDownload { .. })
    ));

    // The device keeps playing version 1.
    let snapshot = h.library.snapshot().unwrap();
    assert_eq!(
        std::fs::read(snapshot.path_for("loop.mp4")).unwrap(),
        b"version-1"
    );
    assert_eq!(h.playlist_filenames(), vec!["loop.mp4"]);
}

#[tokio::test]
async fn mid_download_fault_never_breaks_the_current_generation() {
    let root = tempfile::tempdir().unwrap();
    let mut h = Harness::new(root.path());

    h.store.put(&format!("{}a.mp4", PREFIX), b"a-bytes");
    let b_key = format!("{}b.mp4", PREFIX);
    h.store.put(&b_key, b"b-version-1");
    h.store.put(
        PLAYLIST_KEY,
        br#"[{"filename": "a.mp4", "order": 1}, {"filename": "b.mp4", "order": 2}]"#,
    );
    assert!(h.cycle().await.changed);

    // b.mp4 gets a remote update whose stream always drops mid-transfer.
    h.store.put(&b_key, b"b-version-2-longer-content");
    h.store.interrupt_after(&b_key, 4);
    let result = h.cycle().await;
    assert!(matches!(result.error, Some(SyncError::Unavailable(_))));

    // Atomicity: the current generation still holds every file the
    // playlist requires, with the previous contents of the faulted one.
    let manifest = h.manifest_filenames();
    assert!(manifest.contains("a.mp4"));
    assert!(manifest.contains("b.mp4"));
    let snapshot = h.library.snapshot().unwrap();
    assert_eq!(
        std::fs::read(snapshot.path_for("b.mp4")).unwrap(),
        b"b-version-1"
    );
    assert_eq!(h.playlist_filenames(), vec!["a.mp4", "b.mp4"]);
}

#[tokio::test]
async fn rollback_restores_pre_promotion_manifest() {
    let root = tempfile::tempdir().unwrap();
    let mut h = Harness::new(root.path());

    let key = format!("{}spot.mp4", PREFIX);
    h.store.put(&key, b"first");
    h.cycle().await;
    let before = h.library.current_manifest().unwrap();

    h.store.put(&key, b"second");
    h.cycle().await;
    let after = h.library.current_manifest().unwrap();
    assert_ne!(before.entries, after.entries);

    let restored = h.library.rollback().unwrap().unwrap();
    assert_eq!(restored.manifest.entries, before.entries);
    assert_eq!(
        std::fs::read(restored.path_for("spot.mp4")).unwrap(),
        b"first"
    );
}

#[tokio::test]
async fn missing_descriptor_yields_alphabetical_fallback() {
    let root = tempfile::tempdir().unwrap();
    let mut h = Harness::new(root.path());

    for name in ["zulu.mp4", "alpha.png", "mike.mov"] {
        h.store
            .put(&format!("{}{}", PREFIX, name), name.as_bytes());
    }

    let result = h.cycle().await;
    assert!(result.changed);
    assert!(result.error.is_none());
    assert_eq!(
        h.playlist_filenames(),
        vec!["alpha.png", "mike.mov", "zulu.mp4"]
    );
}

#[tokio::test]
async fn descriptor_order_is_respected_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let mut h = Harness::new(root.path());

    h.store.put(&format!("{}f1.mp4", PREFIX), b"f1");
    h.store.put(&format!("{}f2.mp4", PREFIX), b"f2");
    h.store.put(
        PLAYLIST_KEY,
        br#"[{"filename": "f2.mp4", "order": 2}, {"filename": "f1.mp4", "order": 1}]"#,
    );

    h.cycle().await;
    assert_eq!(h.playlist_filenames(), vec!["f1.mp4", "f2.mp4"]);
}

#[tokio::test]
async fn retired_entries_leave_the_next_generation() {
    let root = tempfile::tempdir().unwrap();
    let mut h = Harness::new(root.path());

    h.store.put(&format!("{}keep.mp4", PREFIX), b"keep");
    h.store.put(&format!("{}drop.mp4", PREFIX), b"drop");
    h.cycle().await;
    assert_eq!(h.manifest_filenames().len(), 2);

    h.store.remove(&format!("{}drop.mp4", PREFIX));
    let result = h.cycle().await;

    assert!(result.changed);
    assert!(result.error.is_none());
    let manifest = h.manifest_filenames();
    assert_eq!(manifest.len(), 1);
    assert!(manifest.contains("keep.mp4"));
    assert_eq!(h.playlist_filenames(), vec!["keep.mp4"]);
}
