use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use loro::LoroDoc;
use tokio::sync::{broadcast, OnceCell};
use tracing::{error, info};

use crate::bridge;
use crate::clients::content_api::ContentApiClient;
use crate::models::{BroadcastMessage, RelayError};

use super::pagekey::PageKey;

/// Shared in-memory state for one page.
///
/// Every client connected to the page holds the same group; concurrent edits
/// merge through the shared LoroDoc.
pub struct PageGroup {
    key: PageKey,
    doc: LoroDoc,
    seeded: OnceCell<()>,
    connected: AtomicUsize,
    dirty: AtomicBool,
    broadcast: broadcast::Sender<BroadcastMessage>,
}

impl PageGroup {
    pub fn new(key: PageKey) -> Self {
        let (broadcast, _rx) = broadcast::channel::<BroadcastMessage>(100);
        Self {
            key,
            doc: LoroDoc::new(),
            seeded: OnceCell::new(),
            connected: AtomicUsize::new(0),
            dirty: AtomicBool::new(false),
            broadcast,
        }
    }

    pub fn key(&self) -> &PageKey {
        &self.key
    }

    /// Seed the document from the content API exactly once.
    ///
    /// Concurrent callers await the same in-flight load, so racing
    /// connections observe one fetch and one seeded snapshot. A failed load
    /// leaves the group unseeded so the registry can evict it.
    pub async fn ensure_seeded(&self, client: &ContentApiClient) -> Result<(), RelayError> {
        self.seeded
            .get_or_try_init(|| async {
                info!("Loading page '{}'", self.key);
                let page = client.fetch_page(&self.key).await?;
                let snapshot = bridge::page_to_snapshot(&page)?;
                self.doc.import(&snapshot).map_err(|e| {
                    RelayError::Conversion(format!("seed snapshot does not import: {}", e))
                })?;
                info!("Seeded page '{}' ({} bytes)", self.key, snapshot.len());
                Ok(())
            })
            .await
            .map(|_| ())
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded.initialized()
    }

    /// Apply a client delta to the shared document.
    ///
    /// Merge semantics belong entirely to loro; the relay only marks the
    /// document dirty for the next flush.
    pub fn apply_update(&self, delta: &[u8]) -> Result<(), RelayError> {
        self.doc
            .import(delta)
            .map_err(|e| RelayError::Conversion(format!("update delta does not import: {}", e)))?;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn export_snapshot(&self) -> Result<Vec<u8>, RelayError> {
        self.doc
            .export(loro::ExportMode::Snapshot)
            .map_err(|e| RelayError::Conversion(format!("failed to export snapshot: {}", e)))
    }

    /// Persist the current snapshot if the document is dirty.
    ///
    /// Returns whether a store happened. On failure the dirty flag is
    /// restored so the next flush retries; updates arriving mid-store mark
    /// the document dirty again on their own.
    pub async fn flush(&self, client: &ContentApiClient) -> Result<bool, RelayError> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }

        let result = async {
            let snapshot = self.export_snapshot()?;
            let tree = bridge::snapshot_to_tree(&snapshot)?;
            client.store_page(&self.key, &snapshot, &tree).await?;
            Ok(snapshot.len())
        }
        .await;

        match result {
            Ok(bytes) => {
                info!("Stored page '{}' ({} bytes)", self.key, bytes);
                Ok(true)
            }
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn connected(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.broadcast.subscribe()
    }

    /// Fan an update out to the other connections of this page.
    pub fn publish(&self, msg: BroadcastMessage) {
        if let Err(e) = self.broadcast.send(msg) {
            error!("Failed to broadcast for '{}': {}", self.key, e);
        }
    }

    // Connection accounting; callers hold the registry lock.
    pub(super) fn client_connected(&self) -> usize {
        self.connected.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(super) fn client_disconnected(&self) -> usize {
        self.connected.fetch_sub(1, Ordering::SeqCst) - 1
    }
}
