use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::clients::content_api::ContentApiClient;
use crate::models::RelayError;

use super::group::PageGroup;
use super::pagekey::PageKey;

/// Counters reported by the diagnostics endpoint.
pub struct RegistryStats {
    pub n_clients: u32,
    pub n_active_pages: u32,
    pub n_idle_pages: u32,
    pub n_dirty_pages: u32,
}

/// Explicit per-page session bookkeeping: identifier → shared group.
///
/// Groups whose last client disconnected are parked in an idle cache for a
/// grace period, so a quick reconnect does not refetch the page; eviction
/// from the idle cache is the unloaded state.
pub struct SessionRegistry {
    client: Arc<ContentApiClient>,
    active: Mutex<HashMap<String, Arc<PageGroup>>>,
    idle: Cache<String, Arc<PageGroup>>,
    save_interval: Duration,
}

impl SessionRegistry {
    pub fn new(
        client: Arc<ContentApiClient>,
        save_interval: Duration,
        idle_grace: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            active: Mutex::new(HashMap::new()),
            idle: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(idle_grace)
                .build(),
            save_interval,
        })
    }

    /// Resolve the group for a connecting client, seeding it on first use.
    ///
    /// A load failure refuses this connection and drops the group again
    /// unless another client is already attached to it.
    pub async fn checkout(&self, key: &PageKey) -> Result<Arc<PageGroup>, RelayError> {
        let cache_key = key.to_string();
        let group = {
            let mut active = self.active.lock().await;
            if let Some(group) = active.get(&cache_key) {
                let group = group.clone();
                group.client_connected();
                group
            } else if let Some(group) = self.idle.remove(&cache_key).await {
                info!("Reactivating idle page '{}'", key);
                group.client_connected();
                active.insert(cache_key.clone(), group.clone());
                group
            } else {
                let group = Arc::new(PageGroup::new(key.clone()));
                group.client_connected();
                active.insert(cache_key.clone(), group.clone());
                self.spawn_flusher(&group);
                group
            }
        };

        if let Err(e) = group.ensure_seeded(&self.client).await {
            let mut active = self.active.lock().await;
            if group.client_disconnected() == 0 && !group.is_seeded() {
                if let Some(current) = active.get(&cache_key) {
                    if Arc::ptr_eq(current, &group) {
                        active.remove(&cache_key);
                    }
                }
            }
            return Err(e);
        }

        Ok(group)
    }

    /// Release one client; on last disconnect flush the snapshot and park
    /// the group in the idle cache.
    pub async fn release(&self, group: Arc<PageGroup>) {
        let cache_key = group.key().to_string();

        let remaining = {
            let _active = self.active.lock().await;
            group.client_disconnected()
        };
        if remaining > 0 {
            return;
        }

        if let Err(e) = group.flush(&self.client).await {
            error!("Degraded save for '{}' on disconnect: {}", group.key(), e);
        }

        // The group stayed in the active map during the flush, so a client
        // connecting meanwhile joined it instead of creating a twin. Only
        // park it if it is still abandoned.
        let mut active = self.active.lock().await;
        if group.connected() == 0 {
            if let Some(current) = active.get(&cache_key) {
                if Arc::ptr_eq(current, &group) {
                    active.remove(&cache_key);
                    self.idle.insert(cache_key, group.clone()).await;
                    info!("Parked idle page '{}'", group.key());
                }
            }
        }
    }

    pub async fn stats(&self) -> RegistryStats {
        let active = self.active.lock().await;
        let mut n_clients = 0usize;
        let mut n_dirty = 0u32;
        for group in active.values() {
            n_clients += group.connected();
            if group.is_dirty() {
                n_dirty += 1;
            }
        }
        RegistryStats {
            n_clients: n_clients as u32,
            n_active_pages: active.len() as u32,
            n_idle_pages: self.idle.entry_count() as u32,
            n_dirty_pages: n_dirty,
        }
    }

    /// Spawn the periodic dirty-flush task for a freshly created group.
    ///
    /// The task holds only a weak reference and exits once the group has
    /// been dropped, so idle eviction also retires the flusher.
    fn spawn_flusher(&self, group: &Arc<PageGroup>) {
        let weak = Arc::downgrade(group);
        let client = self.client.clone();
        let interval = self.save_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(group) = weak.upgrade() else { break };
                if let Err(e) = group.flush(&client).await {
                    error!("Degraded save for '{}': {}", group.key(), e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge;
    use crate::clients::content_api::Credential;
    use crate::models::{PageNodeChildren, RelayError};
    use base64::{engine::general_purpose, Engine as _};
    use loro::{LoroDoc, LoroList, LoroMap, LoroText};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_key() -> PageKey {
        PageKey::new("acme", "p1", "pg1")
    }

    fn test_registry(server: &MockServer) -> Arc<SessionRegistry> {
        let client = Arc::new(ContentApiClient::new(
            server.uri(),
            Credential::Static("test-token".to_string()),
            Duration::from_secs(5),
        ));
        // A long save interval keeps the background flusher out of the way.
        SessionRegistry::new(client, Duration::from_secs(600), Duration::from_secs(600))
    }

    async fn mount_empty_page(server: &MockServer, expected_fetches: u64) {
        Mock::given(method("GET"))
            .and(path("/api/workspaces/acme/projects/p1/pages/pg1/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(50))
                    .set_body_json(json!({
                        "id": "pg1",
                        "name": "Roadmap",
                        "description": null,
                        "description_binary": null
                    })),
            )
            .expect(expected_fetches)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn racing_connections_share_one_fetch_and_one_snapshot() {
        let server = MockServer::start().await;
        mount_empty_page(&server, 1).await;

        let registry = test_registry(&server);
        let key = test_key();
        let (a, b) = tokio::join!(registry.checkout(&key), registry.checkout(&key));
        let a = a.unwrap();
        let b = b.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.connected(), 2);
        assert_eq!(a.export_snapshot().unwrap(), b.export_snapshot().unwrap());
    }

    #[tokio::test]
    async fn fetch_failure_refuses_the_connection_and_evicts_the_group() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such page"))
            .mount(&server)
            .await;

        let registry = test_registry(&server);
        let result = registry.checkout(&test_key()).await;
        assert!(matches!(result, Err(RelayError::NotFound { .. })));

        let stats = registry.stats().await;
        assert_eq!(stats.n_active_pages, 0);
        assert_eq!(stats.n_clients, 0);
    }

    #[tokio::test]
    async fn reconnect_within_grace_period_does_not_refetch() {
        let server = MockServer::start().await;
        mount_empty_page(&server, 1).await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let registry = test_registry(&server);
        let key = test_key();
        let group = registry.checkout(&key).await.unwrap();
        registry.release(group).await;

        let stats = registry.stats().await;
        assert_eq!(stats.n_active_pages, 0);

        // Second checkout must come from the idle cache, not a second GET.
        let group = registry.checkout(&key).await.unwrap();
        assert_eq!(group.connected(), 1);
    }

    #[tokio::test]
    async fn store_failure_keeps_the_document_dirty_and_retries() {
        let server = MockServer::start().await;
        mount_empty_page(&server, 1).await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(500).set_body_string("storage exploded"))
            .mount(&server)
            .await;

        let registry = test_registry(&server);
        let group = registry.checkout(&test_key()).await.unwrap();
        group.apply_update(&edit_hello(&group)).unwrap();

        let client = Arc::new(ContentApiClient::new(
            server.uri(),
            Credential::Static("test-token".to_string()),
            Duration::from_secs(5),
        ));
        assert!(group.flush(&client).await.is_err());
        assert!(group.is_dirty());

        // Once the content API recovers, the same dirty state flushes fine.
        server.reset().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        assert!(group.flush(&client).await.unwrap());
        assert!(!group.is_dirty());
    }

    // Simulate a client edit: import the shared snapshot, append a paragraph
    // reading "Hello", export the merged state as the delta bytes.
    fn edit_hello(group: &Arc<PageGroup>) -> Vec<u8> {
        let client_doc = LoroDoc::new();
        client_doc.import(&group.export_snapshot().unwrap()).unwrap();

        let page_map = client_doc.get_map("page");
        let children = page_map
            .get_or_create_container("children", LoroList::new())
            .unwrap();
        let paragraph = children.insert_container(0, LoroMap::new()).unwrap();
        paragraph.insert("nodeName", "paragraph").unwrap();
        paragraph
            .get_or_create_container("attributes", LoroMap::new())
            .unwrap();
        let paragraph_children = paragraph
            .get_or_create_container("children", LoroList::new())
            .unwrap();
        let text = paragraph_children
            .insert_container(0, LoroText::new())
            .unwrap();
        text.insert(0, "Hello").unwrap();

        client_doc.export(loro::ExportMode::Snapshot).unwrap()
    }

    #[tokio::test]
    async fn empty_page_edit_and_flush_persists_hello() {
        let server = MockServer::start().await;
        mount_empty_page(&server, 1).await;
        Mock::given(method("PATCH"))
            .and(path("/api/workspaces/acme/projects/p1/pages/pg1/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let registry = test_registry(&server);
        let group = registry.checkout(&test_key()).await.unwrap();
        group.apply_update(&edit_hello(&group)).unwrap();
        assert!(group.is_dirty());

        registry.release(group).await;

        // The disconnect flush must have stored bytes that decode to "Hello".
        let requests = server.received_requests().await.unwrap();
        let patch = requests
            .iter()
            .find(|r| r.method.to_string() == "PATCH")
            .expect("no PATCH request recorded");
        let body: serde_json::Value = serde_json::from_slice(&patch.body).unwrap();

        let snapshot = general_purpose::STANDARD
            .decode(body["description_binary"].as_str().unwrap())
            .unwrap();
        let tree = bridge::snapshot_to_tree(&snapshot).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert!(matches!(
            tree.children[0].children,
            PageNodeChildren::AsStringArray(ref v) if v == &["Hello"]
        ));
        assert_eq!(body["description"]["children"][0]["children"][0], "Hello");
    }
}
