use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use ferry::domain::{serialized_size, validate_share};
use ferry::{
    Clock, PutResponse, RetentionPolicy, Share, ShareStore, ShareSummary, StorageKind,
    StoreSettings,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{Error, Result};
use std::fmt::Debug;
use std::sync::Arc;

const SELECT_COLUMNS: &str = "share_id,data,created_at";

/// Share store backed by a PostgREST-style table API (e.g. Supabase).
///
/// The remote service stamps `created_at` itself; expiry is still decided
/// here against the local retention policy. Purging expired rows is left to
/// maintenance scheduled on the remote side, so `sweep` does nothing.
pub struct RemoteShareStore {
    client: Client,
    endpoint: Url,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Deserialize)]
struct ShareRow {
    share_id: String,
    #[serde(default)]
    data: Value,
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct NewShareRow<'a> {
    share_id: &'a str,
    data: &'a Value,
}

impl RemoteShareStore {
    /// `base_url` is the project URL; rows live under `<base_url>/rest/v1/<table>`
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        table: &str,
        settings: StoreSettings,
    ) -> Result<Self> {
        let endpoint = Url::parse(&format!(
            "{}/rest/v1/{}",
            base_url.trim_end_matches('/'),
            table
        ))
        .map_err(|e| Error::invalid_input(format!("Invalid remote URL '{}': {}", base_url, e)))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let apikey = HeaderValue::from_str(key)
                .map_err(|_| Error::invalid_input("Remote API key is not a valid header value"))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| Error::invalid_input("Remote API key is not a valid header value"))?;
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.io_timeout)
            .build()
            .map_err(|e| Error::unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            retention: settings.retention,
            clock: settings.clock,
        })
    }

    fn url_with(&self, pairs: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().extend_pairs(pairs);
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::unavailable(format!("Remote request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::unavailable(format!(
            "Remote table returned {}: {}",
            status, body
        )))
    }

    async fn rows<T: DeserializeOwned>(&self, response: Response) -> Result<Vec<T>> {
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| Error::unavailable(format!("Unexpected remote response: {}", e)))
    }

    async fn delete_row(&self, id: &str) -> Result<()> {
        let filter = format!("eq.{}", id);
        let url = self.url_with(&[("share_id", filter.as_str())]);
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

#[async_trait]
impl ShareStore for RemoteShareStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Remote
    }

    fn supports_sweep(&self) -> bool {
        false
    }

    async fn put(&self, id: &str, value: Value) -> Result<PutResponse> {
        validate_share(id, &value)?;

        // `created_at` is listed but omitted from the body, so the column
        // default stamps it on insert and on conflict-update alike
        let url = self.url_with(&[("on_conflict", "share_id"), ("columns", SELECT_COLUMNS)]);
        let request = self
            .client
            .post(url)
            .header(
                "Prefer",
                "resolution=merge-duplicates,missing=default,return=representation",
            )
            .json(&NewShareRow {
                share_id: id,
                data: &value,
            });

        let response = self.send(request).await?;
        let rows: Vec<ShareRow> = self.rows(response).await?;
        let created_at = rows
            .first()
            .map(|row| row.created_at)
            .unwrap_or_else(|| self.clock.now());

        // Upserts don't say whether a row was replaced
        Ok(PutResponse::new(false, created_at))
    }

    async fn get(&self, id: &str) -> Result<Share> {
        let filter = format!("eq.{}", id);
        let url = self.url_with(&[
            ("share_id", filter.as_str()),
            ("select", SELECT_COLUMNS),
            ("limit", "1"),
        ]);

        let response = self.send(self.client.get(url)).await?;
        let row = self
            .rows::<ShareRow>(response)
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NotFound)?;

        if self.retention.is_expired(row.created_at, self.clock.now()) {
            if let Err(e) = self.delete_row(id).await {
                tracing::warn!("Failed to delete expired remote share '{}': {}", id, e);
            }
            return Err(Error::NotFound);
        }

        Ok(Share {
            id: row.share_id,
            value: row.data,
            created_at: row.created_at,
        })
    }

    async fn list(&self, limit: usize) -> Result<Vec<ShareSummary>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let cutoff = format!(
            "gte.{}",
            self.retention
                .cutoff(now)
                .to_rfc3339_opts(SecondsFormat::Micros, true)
        );
        let limit_param = limit.to_string();
        let url = self.url_with(&[
            ("select", SELECT_COLUMNS),
            ("created_at", cutoff.as_str()),
            ("order", "created_at.desc"),
            ("limit", limit_param.as_str()),
        ]);

        let response = self.send(self.client.get(url)).await?;
        let rows: Vec<ShareRow> = self.rows(response).await?;

        Ok(rows
            .into_iter()
            .filter(|row| !self.retention.is_expired(row.created_at, now))
            .take(limit)
            .map(|row| ShareSummary {
                size: Some(serialized_size(&row.data)),
                id: row.share_id,
                created_at: row.created_at,
            })
            .collect())
    }

    async fn sweep(&self) -> Result<usize> {
        tracing::debug!("Remote storage purges expired shares on its own schedule, nothing to sweep");
        Ok(0)
    }

    async fn count(&self) -> Result<Option<usize>> {
        Ok(None)
    }
}

impl Debug for RemoteShareStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteShareStore")
            .field("endpoint", &self.endpoint.as_str())
            .field("retention", &self.retention)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::get;
    use axum::{Json, Router};
    use ferry::ManualClock;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    /// In-process stand-in for the table API, stamping rows with a shared clock
    #[derive(Clone)]
    struct FakeTable {
        rows: Arc<Mutex<HashMap<String, (Value, DateTime<Utc>)>>>,
        seen_headers: Arc<Mutex<Vec<AxumHeaders>>>,
        seen_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
        fail_deletes: Arc<AtomicBool>,
        clock: Arc<ManualClock>,
    }

    impl FakeTable {
        fn row_json(id: &str, data: &Value, created_at: &DateTime<Utc>) -> Value {
            json!({
                "share_id": id,
                "data": data,
                "created_at": created_at.to_rfc3339_opts(SecondsFormat::Micros, false),
            })
        }

        fn record(&self, headers: &AxumHeaders, query: &HashMap<String, String>) {
            self.seen_headers.lock().unwrap().push(headers.clone());
            self.seen_queries.lock().unwrap().push(query.clone());
        }
    }

    async fn select_rows(
        State(table): State<FakeTable>,
        Path(name): Path<String>,
        headers: AxumHeaders,
        Query(query): Query<HashMap<String, String>>,
    ) -> AxumResponse {
        table.record(&headers, &query);
        if name == "broken" {
            return (StatusCode::INTERNAL_SERVER_ERROR, "relation does not exist").into_response();
        }

        let rows = table.rows.lock().unwrap();
        let mut matched: Vec<(&String, &(Value, DateTime<Utc>))> = rows
            .iter()
            .filter(|(id, _)| match query.get("share_id") {
                Some(filter) => filter.strip_prefix("eq.") == Some(id.as_str()),
                None => true,
            })
            .filter(|(_, (_, created_at))| match query.get("created_at") {
                Some(filter) => {
                    let bound: DateTime<Utc> =
                        filter.trim_start_matches("gte.").parse().unwrap();
                    *created_at >= bound
                }
                None => true,
            })
            .collect();
        matched.sort_by(|a, b| b.1.1.cmp(&a.1.1));

        let limit = query
            .get("limit")
            .and_then(|l| l.parse::<usize>().ok())
            .unwrap_or(usize::MAX);
        let body: Vec<Value> = matched
            .into_iter()
            .take(limit)
            .map(|(id, (data, created_at))| FakeTable::row_json(id, data, created_at))
            .collect();

        Json(body).into_response()
    }

    async fn upsert_row(
        State(table): State<FakeTable>,
        headers: AxumHeaders,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> AxumResponse {
        table.record(&headers, &query);

        let id = body["share_id"].as_str().unwrap_or_default().to_string();
        let data = body["data"].clone();
        let created_at = table.clock.now();
        table
            .rows
            .lock()
            .unwrap()
            .insert(id.clone(), (data.clone(), created_at));

        (
            StatusCode::CREATED,
            Json(json!([FakeTable::row_json(&id, &data, &created_at)])),
        )
            .into_response()
    }

    async fn delete_row(
        State(table): State<FakeTable>,
        headers: AxumHeaders,
        Query(query): Query<HashMap<String, String>>,
    ) -> StatusCode {
        table.record(&headers, &query);
        if table.fail_deletes.load(Ordering::SeqCst) {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        if let Some(id) = query.get("share_id").and_then(|f| f.strip_prefix("eq.")) {
            table.rows.lock().unwrap().remove(id);
        }
        StatusCode::NO_CONTENT
    }

    async fn spawn_fake(clock: Arc<ManualClock>) -> (String, FakeTable) {
        let table = FakeTable {
            rows: Arc::default(),
            seen_headers: Arc::default(),
            seen_queries: Arc::default(),
            fail_deletes: Arc::default(),
            clock,
        };
        let app = Router::new()
            .route(
                "/rest/v1/{table}",
                get(select_rows).post(upsert_row).delete(delete_row),
            )
            .with_state(table.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), table)
    }

    fn settings(clock: Arc<ManualClock>) -> StoreSettings {
        StoreSettings {
            retention: RetentionPolicy::default(),
            io_timeout: Duration::from_secs(5),
            clock,
        }
    }

    #[tokio::test]
    async fn test_remote_store_put_and_get() {
        let clock = Arc::new(ManualClock::starting_now());
        let (base_url, fake) = spawn_fake(clock.clone()).await;
        let store =
            RemoteShareStore::new(&base_url, Some("secret"), "shares", settings(clock)).unwrap();

        let put_response = store.put("abc123", json!({"angle": 45})).await.unwrap();
        let share = store.get("abc123").await.unwrap();
        assert_eq!(share.id, "abc123");
        assert_eq!(share.value, json!({"angle": 45}));
        assert_eq!(share.created_at, put_response.created_at);

        let headers = fake.seen_headers.lock().unwrap();
        let upsert = &headers[0];
        assert_eq!(upsert.get("apikey").unwrap(), "secret");
        assert_eq!(upsert.get("authorization").unwrap(), "Bearer secret");
        assert!(
            upsert
                .get("prefer")
                .unwrap()
                .to_str()
                .unwrap()
                .contains("resolution=merge-duplicates")
        );

        let queries = fake.seen_queries.lock().unwrap();
        assert_eq!(queries[0]["on_conflict"], "share_id");
        assert_eq!(queries[1]["share_id"], "eq.abc123");
    }

    #[tokio::test]
    async fn test_remote_store_missing_and_expired() {
        let clock = Arc::new(ManualClock::starting_now());
        let (base_url, fake) = spawn_fake(clock.clone()).await;
        let store = RemoteShareStore::new(&base_url, None, "shares", settings(clock.clone()))
            .unwrap();

        assert!(matches!(
            store.get("missing").await.unwrap_err(),
            Error::NotFound
        ));

        store.put("abc123", json!({"angle": 45})).await.unwrap();
        clock.advance(DAY * 8);
        assert!(matches!(
            store.get("abc123").await.unwrap_err(),
            Error::NotFound
        ));

        // The expired row was deleted on read
        assert!(fake.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_store_expired_is_not_found_when_delete_fails() {
        let clock = Arc::new(ManualClock::starting_now());
        let (base_url, fake) = spawn_fake(clock.clone()).await;
        let store = RemoteShareStore::new(&base_url, None, "shares", settings(clock.clone()))
            .unwrap();

        store.put("abc123", json!({"angle": 45})).await.unwrap();
        clock.advance(DAY * 8);
        fake.fail_deletes.store(true, Ordering::SeqCst);

        assert!(matches!(
            store.get("abc123").await.unwrap_err(),
            Error::NotFound
        ));

        // The row is still there, but stays hidden
        assert_eq!(fake.rows.lock().unwrap().len(), 1);
        assert!(matches!(
            store.get("abc123").await.unwrap_err(),
            Error::NotFound
        ));
    }

    #[tokio::test]
    async fn test_remote_store_list_is_newest_first_and_live_only() {
        let clock = Arc::new(ManualClock::starting_now());
        let (base_url, _fake) = spawn_fake(clock.clone()).await;
        let store = RemoteShareStore::new(&base_url, None, "shares", settings(clock.clone()))
            .unwrap();

        store.put("stale", json!(0)).await.unwrap();
        clock.advance(DAY * 8);
        for id in ["a", "b", "c"] {
            store.put(id, json!({"id": id})).await.unwrap();
            clock.advance(Duration::from_secs(60));
        }

        let listed = store.list(2).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(listed[0].size, Some(10));

        assert_eq!(store.list(10).await.unwrap().len(), 3);
        assert!(store.list(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_store_sweep_is_a_no_op() {
        let clock = Arc::new(ManualClock::starting_now());
        let (base_url, fake) = spawn_fake(clock.clone()).await;
        let store = RemoteShareStore::new(&base_url, None, "shares", settings(clock.clone()))
            .unwrap();

        store.put("abc", json!(1)).await.unwrap();
        clock.advance(DAY * 8);

        assert!(!store.supports_sweep());
        assert_eq!(store.sweep().await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), None);
        assert_eq!(fake.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remote_store_errors_are_backend_unavailable() {
        let clock = Arc::new(ManualClock::starting_now());
        let (base_url, _fake) = spawn_fake(clock.clone()).await;
        let store = RemoteShareStore::new(&base_url, None, "broken", settings(clock.clone()))
            .unwrap();
        assert!(matches!(
            store.get("abc").await.unwrap_err(),
            Error::BackendUnavailable(_)
        ));

        // Nothing listening on this port once the listener is dropped
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let store = RemoteShareStore::new(
            &format!("http://{}", addr),
            None,
            "shares",
            settings(clock),
        )
        .unwrap();
        assert!(matches!(
            store.put("abc", json!(1)).await.unwrap_err(),
            Error::BackendUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_remote_store_rejects_invalid_input_locally() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = RemoteShareStore::new("http://127.0.0.1:9", None, "shares", settings(clock))
            .unwrap();

        assert!(matches!(
            store.put("", json!(1)).await.unwrap_err(),
            Error::InvalidInput(_)
        ));
        assert!(matches!(
            store.put("abc", Value::Null).await.unwrap_err(),
            Error::InvalidInput(_)
        ));
    }
}
