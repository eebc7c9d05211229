//! Robustness tests for edge cases and error conditions, driven through the
//! public API with in-memory collaborators.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use relaysync::cidr::{normalize, NormalizeOptions};
use relaysync::config::{SecureString, SyncSettings};
use relaysync::error::SyncError;
use relaysync::fetcher::SourceFetcher;
use relaysync::reconciler::{same_set, Action, Phase, Reconciler, RunOutcome};
use relaysync::store::{CloudflareListStore, ListStore, ReplaceConfirmation};
use relaysync::transport::{HttpRequest, HttpResponse, Method, RetryPolicy, Transport};

const V4_URL: &str = "https://feeds.example.com/v4.txt";
const V6_URL: &str = "https://feeds.example.com/v6.txt";

fn settings() -> SyncSettings {
    SyncSettings {
        account_id: "acct".to_string(),
        api_token: SecureString::from("token"),
        list_name: "relay_egress".to_string(),
        list_description: "relay egress ranges".to_string(),
        ipv4_url: V4_URL.to_string(),
        ipv6_url: V6_URL.to_string(),
        retry: RetryPolicy::default(),
        normalize: NormalizeOptions::default(),
        api_base: "https://api.example.com/client/v4".to_string(),
        page_size: 500,
        max_list_items: 20_000,
        dry_run: false,
    }
}

/// Serves fixed feed bodies by URL
struct StaticFeeds {
    bodies: Mutex<BTreeMap<String, String>>,
}

impl StaticFeeds {
    fn new(v4: &str, v6: &str) -> Arc<Self> {
        let mut bodies = BTreeMap::new();
        bodies.insert(V4_URL.to_string(), v4.to_string());
        bodies.insert(V6_URL.to_string(), v6.to_string());
        Arc::new(Self {
            bodies: Mutex::new(bodies),
        })
    }

    fn set(&self, url: &str, body: &str) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }
}

#[async_trait]
impl Transport for StaticFeeds {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, SyncError> {
        match self.bodies.lock().unwrap().get(&request.url) {
            Some(body) => Ok(HttpResponse {
                status: 200,
                content_type: Some("text/plain".to_string()),
                body: body.clone(),
            }),
            None => Err(SyncError::Transport(format!("HTTP 404 for {}", request.url))),
        }
    }
}

/// A list store that counts writes
#[derive(Default)]
struct CountingStore {
    items: Mutex<Vec<String>>,
    writes: Mutex<usize>,
}

#[async_trait]
impl ListStore for CountingStore {
    async fn get_or_create_list(&self, _name: &str) -> Result<String, SyncError> {
        Ok("list-1".to_string())
    }

    async fn get_all_items(
        &self,
        _list_id: &str,
        _expected_count_hint: Option<usize>,
    ) -> Result<Vec<String>, SyncError> {
        Ok(self.items.lock().unwrap().clone())
    }

    async fn replace_all_items(
        &self,
        _list_id: &str,
        items: &[String],
    ) -> Result<ReplaceConfirmation, SyncError> {
        *self.writes.lock().unwrap() += 1;
        *self.items.lock().unwrap() = items.to_vec();
        Ok(ReplaceConfirmation::default())
    }
}

struct SharedStore(Arc<CountingStore>);

#[async_trait]
impl ListStore for SharedStore {
    async fn get_or_create_list(&self, name: &str) -> Result<String, SyncError> {
        self.0.get_or_create_list(name).await
    }

    async fn get_all_items(
        &self,
        list_id: &str,
        hint: Option<usize>,
    ) -> Result<Vec<String>, SyncError> {
        self.0.get_all_items(list_id, hint).await
    }

    async fn replace_all_items(
        &self,
        list_id: &str,
        items: &[String],
    ) -> Result<ReplaceConfirmation, SyncError> {
        self.0.replace_all_items(list_id, items).await
    }
}

fn reconciler(feeds: &Arc<StaticFeeds>, store: &Arc<CountingStore>) -> Reconciler {
    let transport: Arc<dyn Transport> = feeds.clone();
    Reconciler::new(
        settings(),
        SourceFetcher::new(transport),
        Box::new(SharedStore(Arc::clone(store))),
    )
}

#[tokio::test]
async fn test_one_write_then_none() {
    let feeds = StaticFeeds::new("203.0.113.0/24\n203.0.113.5\n", "2001:db8::/32\n");
    let store = Arc::new(CountingStore::default());
    let reconciler = reconciler(&feeds, &store);

    for _ in 0..3 {
        assert!(reconciler.run().await.is_success());
    }
    assert_eq!(*store.writes.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_upstream_change_triggers_one_more_write() {
    let feeds = StaticFeeds::new("203.0.113.0/24\n", "2001:db8::/32\n");
    let store = Arc::new(CountingStore::default());
    let reconciler = reconciler(&feeds, &store);

    reconciler.run().await;
    feeds.set(V4_URL, "203.0.113.0/24\n198.51.100.0/24\n");
    let outcome = reconciler.run().await;
    reconciler.run().await;

    let RunOutcome::Success(report) = outcome else {
        panic!("expected success");
    };
    assert_eq!(report.action, Action::Replaced);
    assert_eq!(report.added, 1);
    assert_eq!(report.removed, 0);
    assert_eq!(*store.writes.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_missing_feed_leaves_list_untouched() {
    let feeds = StaticFeeds::new("203.0.113.0/24\n", "2001:db8::/32\n");
    feeds.bodies.lock().unwrap().remove(V6_URL);
    let store = Arc::new(CountingStore::default());
    *store.items.lock().unwrap() = vec!["192.0.2.0/24".to_string()];

    let outcome = reconciler(&feeds, &store).run().await;
    let RunOutcome::Failed(failure) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.phase, Phase::FetchingSources);
    assert_eq!(*store.writes.lock().unwrap(), 0);
    assert_eq!(*store.items.lock().unwrap(), vec!["192.0.2.0/24"]);
}

#[test]
fn test_scenario_entries() {
    let opts = NormalizeOptions::default();
    let out = |raw: &str| normalize(raw, opts).map(|c| c.into_string());

    assert_eq!(out("203.0.113.0/24").as_deref(), Some("203.0.113.0/24"));
    assert_eq!(out("203.0.113.5").as_deref(), Some("203.0.113.5/32"));
    assert_eq!(out("2001:db8::/32").as_deref(), Some("2001:db8::/32"));
    assert_eq!(out("2001:db8::"), None);
    assert_eq!(out("not-an-ip"), None);
    assert_eq!(out("10.0.0.0/7"), None);
}

#[test]
fn test_hostile_inputs_do_not_panic() {
    let opts = NormalizeOptions {
        promote_ipv6_to_slash64: true,
    };
    let long = "9".repeat(10_000);
    let inputs = [
        "",
        "/",
        "//",
        "1.2.3.4/",
        "1.2.3.4//24",
        "1.2.3.4/99999999999999999999",
        "::/::",
        "ü.ñ.î.ç/8",
        "1.2.3.4/-1",
        "[::1]/64",
        "fe80::1%eth0/64",
        long.as_str(),
    ];
    for input in inputs {
        assert!(normalize(input, opts).is_none(), "accepted {:?}", input);
    }
}

#[test]
fn test_same_set_with_large_inputs() {
    let forward: Vec<String> = (0..5000).map(|i| format!("10.{}.{}.0/24", i / 256, i % 256)).collect();
    let mut backward = forward.clone();
    backward.reverse();
    backward.extend(forward.iter().take(100).cloned());
    assert!(same_set(&forward, &backward));
}

/// Cloudflare-shaped API over the public transport seam
struct FakeApi {
    items: Vec<String>,
    requests: Mutex<Vec<(Method, String)>>,
}

#[async_trait]
impl Transport for FakeApi {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, SyncError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.method, request.url.clone()));
        let url = reqwest::Url::parse(&request.url).unwrap();

        let body = if url.path().ends_with("/rules/lists") {
            serde_json::json!({
                "success": true,
                "errors": [],
                "result": [{"id": "abc", "name": "relay_egress", "kind": "ip"}]
            })
        } else {
            let page: usize = url
                .query_pairs()
                .find(|(k, _)| k == "cursor")
                .map(|(_, v)| v.parse().unwrap())
                .unwrap_or(0);
            let per_page: usize = url
                .query_pairs()
                .find(|(k, _)| k == "per_page")
                .map(|(_, v)| v.parse().unwrap())
                .unwrap();
            let start = page * per_page;
            let chunk: Vec<_> = self
                .items
                .iter()
                .skip(start)
                .take(per_page)
                .map(|ip| serde_json::json!({"id": "i", "ip": ip}))
                .collect();
            let mut envelope = serde_json::json!({"success": true, "errors": [], "result": chunk});
            if start + per_page < self.items.len() {
                envelope["result_info"] = serde_json::json!({"cursors": {"after": (page + 1).to_string()}});
            }
            envelope
        };

        Ok(HttpResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
        })
    }
}

#[tokio::test]
async fn test_cloudflare_store_pages_through_public_api() {
    let api = Arc::new(FakeApi {
        items: (0..1200).map(|i| format!("10.0.{}.{}/32", i / 256, i % 256)).collect(),
        requests: Mutex::new(Vec::new()),
    });
    let transport: Arc<dyn Transport> = api.clone();
    let store = CloudflareListStore::new(transport, &settings());

    let list_id = store.get_or_create_list("relay_egress").await.unwrap();
    assert_eq!(list_id, "abc");

    let items = store.get_all_items(&list_id, None).await.unwrap();
    assert_eq!(items.len(), 1200);
    assert_eq!(items[0], "10.0.0.0/32");

    let requests = api.requests.lock().unwrap();
    let item_gets = requests
        .iter()
        .filter(|(method, url)| *method == Method::Get && url.contains("/items"))
        .count();
    assert_eq!(item_gets, 3);
}
