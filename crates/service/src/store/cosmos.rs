//! Cosmos DB over its REST API.
//!
//! Every request is signed on the way out: an HMAC over the verb, resource
//! and date for a static account key, or a bearer token from the host's
//! managed identity otherwise.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::credential::is_loopback_host;
use super::query::QuerySpec;
use super::{
    ContainerRef, ContainerSpec, Credential, DocumentStore, QueryOptions, ResourceKind, StoreConnector, StoreError,
    PARTITION_KEY_PATH,
};

const API_VERSION: &str = "2018-12-31";
const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
/// `x-ms-substatus` for a request whose parent container does not exist.
const OWNER_MISSING: &str = "1003";
/// Refresh tokens this many seconds before they expire.
const TOKEN_SKEW_SECS: i64 = 300;
const QUERY_PAGE_SIZE: u32 = 1000;

/// Builds a [`CosmosClient`] per lifecycle initialization.
#[derive(Debug, Clone)]
pub struct CosmosConnector {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl CosmosConnector {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self { Self { connect_timeout, request_timeout } }
}

#[async_trait]
impl StoreConnector for CosmosConnector {
    async fn connect(&self, endpoint: &str, credential: &Credential) -> Result<Arc<dyn DocumentStore>, StoreError> {
        let client = CosmosClient::new(endpoint, credential, self.connect_timeout, self.request_timeout)?;
        info!(endpoint, credential = credential.kind(), "cosmos client ready");
        Ok(Arc::new(client))
    }
}

/// Where a managed identity token comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityEndpoint {
    /// App Service and Container Apps style endpoint with its secret header.
    Hosted { url: String, secret: String },
    /// Instance metadata service.
    Imds,
}

impl IdentityEndpoint {
    pub fn from_env() -> Self {
        match (std::env::var("IDENTITY_ENDPOINT"), std::env::var("IDENTITY_HEADER")) {
            (Ok(url), Ok(secret)) if !url.is_empty() => IdentityEndpoint::Hosted { url, secret },
            _ => IdentityEndpoint::Imds,
        }
    }
}

struct CachedToken {
    value: String,
    expires_on: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<Value>,
    #[serde(default)]
    expires_in: Option<Value>,
}

fn epoch_seconds(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Fetches and caches an identity token for the account's resource.
pub struct TokenSource {
    resource: String,
    identity: IdentityEndpoint,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(resource: impl Into<String>, identity: IdentityEndpoint) -> Self {
        Self { resource: resource.into(), identity, cached: Mutex::new(None) }
    }

    pub async fn token(&self, http: &reqwest::Client) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();
        if let Some(tok) = cached.as_ref() {
            if tok.expires_on - TOKEN_SKEW_SECS > now {
                return Ok(tok.value.clone());
            }
        }
        let fresh = self.fetch(http, now).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn fetch(&self, http: &reqwest::Client, now: i64) -> Result<CachedToken, StoreError> {
        let req = match &self.identity {
            IdentityEndpoint::Hosted { url, secret } => http
                .get(url)
                .query(&[("api-version", "2019-08-01"), ("resource", self.resource.as_str())])
                .header("X-IDENTITY-HEADER", secret),
            IdentityEndpoint::Imds => http
                .get(IMDS_TOKEN_URL)
                .query(&[("api-version", "2018-02-01"), ("resource", self.resource.as_str())])
                .header("Metadata", "true"),
        };
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Unauthorized(format!("managed identity unreachable: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Unauthorized(format!("managed identity returned {status}: {body}")));
        }
        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Unauthorized(format!("malformed token response: {e}")))?;
        let expires_on = body
            .expires_on
            .as_ref()
            .and_then(epoch_seconds)
            .or_else(|| body.expires_in.as_ref().and_then(epoch_seconds).map(|secs| now + secs))
            .unwrap_or(now + TOKEN_SKEW_SECS);
        debug!(resource = %self.resource, expires_on, "identity token refreshed");
        Ok(CachedToken { value: body.access_token, expires_on })
    }
}

enum Auth {
    MasterKey(Vec<u8>),
    Identity(TokenSource),
}

/// `authorization` value for a master-key signed request.
pub fn master_key_header(
    key: &[u8],
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> Result<String, StoreError> {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );
    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|e| StoreError::Unauthorized(e.to_string()))?;
    mac.update(payload.as_bytes());
    let sig = STANDARD.encode(mac.finalize().into_bytes());
    Ok(urlencoding::encode(&format!("type=master&ver=1.0&sig={sig}")).into_owned())
}

/// `authorization` value for a bearer-token request.
pub fn token_header(token: &str) -> String { urlencoding::encode(&format!("type=aad&ver=1.0&sig={token}")).into_owned() }

fn rfc1123_now() -> String { Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string() }

fn seg(name: &str) -> String { urlencoding::encode(name).into_owned() }

fn partition_header(pk: &str) -> String { json!([pk]).to_string() }

fn partition_key_of(document: &Value) -> Result<String, StoreError> {
    match document.pointer(PARTITION_KEY_PATH) {
        Some(Value::String(pk)) if !pk.is_empty() => Ok(pk.clone()),
        _ => Err(StoreError::BadRequest(format!("document requires a non-empty string at {PARTITION_KEY_PATH}"))),
    }
}

/// Pulls `message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.to_string())
}

/// Maps a non-success response onto [`StoreError`]. `missing` decides what a
/// 404 means for this call given its `x-ms-substatus`.
pub async fn check_response(
    resp: Response,
    missing: impl FnOnce(Option<&str>) -> StoreError,
) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let substatus = resp.headers().get("x-ms-substatus").and_then(|v| v.to_str().ok()).map(str::to_owned);
    let body = resp.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => missing(substatus.as_deref()),
        StatusCode::CONFLICT => StoreError::Conflict(error_message(&body)),
        StatusCode::BAD_REQUEST => StoreError::BadRequest(error_message(&body)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(error_message(&body)),
        StatusCode::TOO_MANY_REQUESTS => StoreError::Unavailable(format!("throttled: {}", error_message(&body))),
        other => StoreError::Unavailable(format!("{other}: {}", error_message(&body))),
    })
}

#[derive(Deserialize)]
struct QueryPage {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

/// [`DocumentStore`] backed by a Cosmos DB account.
pub struct CosmosClient {
    http: reqwest::Client,
    base: String,
    auth: Auth,
    request_timeout: Duration,
}

impl CosmosClient {
    pub fn new(
        endpoint: &str,
        credential: &Credential,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let url = Url::parse(endpoint).map_err(|e| StoreError::BadRequest(format!("invalid store endpoint {endpoint:?}: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| StoreError::BadRequest(format!("store endpoint {endpoint:?} has no host")))?;
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            // the emulator serves a self-signed certificate
            .danger_accept_invalid_certs(is_loopback_host(host))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("http client: {e}")))?;
        let auth = match credential {
            Credential::Key(key) => Auth::MasterKey(
                STANDARD
                    .decode(key.trim())
                    .map_err(|e| StoreError::Unauthorized(format!("account key is not valid base64: {e}")))?,
            ),
            Credential::Ambient => {
                let resource = format!("{}://{}", url.scheme(), host);
                Auth::Identity(TokenSource::new(resource, IdentityEndpoint::from_env()))
            }
        };
        Ok(Self { http, base: endpoint.trim_end_matches('/').to_string(), auth, request_timeout })
    }

    fn transport_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.request_timeout)
        } else {
            StoreError::Unavailable(e.to_string())
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        resource_type: &str,
        resource_link: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, StoreError> {
        let date = rfc1123_now();
        let auth = match &self.auth {
            Auth::MasterKey(key) => master_key_header(key, method.as_str(), resource_type, resource_link, &date)?,
            Auth::Identity(source) => token_header(&source.token(&self.http).await?),
        };
        let req = self
            .http
            .request(method, format!("{}{}", self.base, path))
            .header("authorization", auth)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header(ACCEPT, "application/json");
        build(req).send().await.map_err(|e| self.transport_error(e))
    }

    async fn json_body(&self, resp: Response) -> Result<Value, StoreError> {
        resp.json().await.map_err(|e| StoreError::Unavailable(format!("malformed store response: {e}")))
    }
}

fn db_link(database: &str) -> String { format!("dbs/{database}") }

fn coll_link(target: &ContainerRef) -> String { format!("dbs/{}/colls/{}", target.database, target.container) }

fn coll_path(target: &ContainerRef) -> String { format!("/dbs/{}/colls/{}", seg(&target.database), seg(&target.container)) }

fn missing_container(target: &ContainerRef) -> impl FnOnce(Option<&str>) -> StoreError + '_ {
    move |_| StoreError::not_found(ResourceKind::Container, target.to_string())
}

fn missing_item<'a>(target: &'a ContainerRef, id: &'a str) -> impl FnOnce(Option<&str>) -> StoreError + 'a {
    move |substatus| match substatus {
        Some(OWNER_MISSING) => StoreError::not_found(ResourceKind::Container, target.to_string()),
        _ => StoreError::not_found(ResourceKind::Item, id),
    }
}

#[async_trait]
impl DocumentStore for CosmosClient {
    async fn read_database(&self, database: &str) -> Result<(), StoreError> {
        let resp = self
            .send(Method::GET, &format!("/dbs/{}", seg(database)), "dbs", &db_link(database), |r| r)
            .await?;
        check_response(resp, |_| StoreError::not_found(ResourceKind::Database, database)).await?;
        Ok(())
    }

    async fn read_container(&self, target: &ContainerRef) -> Result<(), StoreError> {
        let resp = self.send(Method::GET, &coll_path(target), "colls", &coll_link(target), |r| r).await?;
        check_response(resp, missing_container(target)).await?;
        Ok(())
    }

    async fn create_database_if_not_exists(&self, database: &str) -> Result<bool, StoreError> {
        let body = json!({ "id": database });
        let resp = self.send(Method::POST, "/dbs", "dbs", "", |r| r.json(&body)).await?;
        match check_response(resp, |_| StoreError::not_found(ResourceKind::Database, database)).await {
            Ok(_) => {
                debug!(database, "database created");
                Ok(true)
            }
            Err(StoreError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_container_if_not_exists(&self, database: &str, spec: &ContainerSpec) -> Result<bool, StoreError> {
        let body = json!({
            "id": spec.id,
            "partitionKey": { "paths": [spec.partition_key_path], "kind": "Hash" },
        });
        let path = format!("/dbs/{}/colls", seg(database));
        let throughput = spec.throughput.to_string();
        let resp = self
            .send(Method::POST, &path, "colls", &db_link(database), |r| {
                r.header("x-ms-offer-throughput", throughput).json(&body)
            })
            .await?;
        match check_response(resp, |_| StoreError::not_found(ResourceKind::Database, database)).await {
            Ok(_) => {
                debug!(database, container = %spec.id, "container created");
                Ok(true)
            }
            Err(StoreError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_item(&self, target: &ContainerRef, document: Value) -> Result<Value, StoreError> {
        let pk = partition_key_of(&document)?;
        let id = pk.clone();
        let resp = self
            .send(Method::POST, &format!("{}/docs", coll_path(target)), "docs", &coll_link(target), |r| {
                r.header("x-ms-documentdb-partitionkey", partition_header(&pk)).json(&document)
            })
            .await?;
        let resp = check_response(resp, missing_item(target, &id)).await?;
        self.json_body(resp).await
    }

    async fn read_item(&self, target: &ContainerRef, id: &str, partition_key: &str) -> Result<Value, StoreError> {
        let path = format!("{}/docs/{}", coll_path(target), seg(id));
        let link = format!("{}/docs/{id}", coll_link(target));
        let resp = self
            .send(Method::GET, &path, "docs", &link, |r| {
                r.header("x-ms-documentdb-partitionkey", partition_header(partition_key))
            })
            .await?;
        let resp = check_response(resp, missing_item(target, id)).await?;
        self.json_body(resp).await
    }

    async fn replace_item(&self, target: &ContainerRef, id: &str, document: Value) -> Result<Value, StoreError> {
        let pk = partition_key_of(&document)?;
        let path = format!("{}/docs/{}", coll_path(target), seg(id));
        let link = format!("{}/docs/{id}", coll_link(target));
        let resp = self
            .send(Method::PUT, &path, "docs", &link, |r| {
                r.header("x-ms-documentdb-partitionkey", partition_header(&pk)).json(&document)
            })
            .await?;
        let resp = check_response(resp, missing_item(target, id)).await?;
        self.json_body(resp).await
    }

    async fn delete_item(&self, target: &ContainerRef, id: &str, partition_key: &str) -> Result<(), StoreError> {
        let path = format!("{}/docs/{}", coll_path(target), seg(id));
        let link = format!("{}/docs/{id}", coll_link(target));
        let resp = self
            .send(Method::DELETE, &path, "docs", &link, |r| {
                r.header("x-ms-documentdb-partitionkey", partition_header(partition_key))
            })
            .await?;
        check_response(resp, missing_item(target, id)).await?;
        Ok(())
    }

    async fn query_items(&self, target: &ContainerRef, query: &QuerySpec, options: &QueryOptions) -> Result<Vec<Value>, StoreError> {
        // The gateway cannot merge ORDER BY, TOP or OFFSET across partitions,
        // so windowed queries fetch every match and finish here.
        let windowed = options.enable_cross_partition && query.is_windowed();
        let wire = if windowed { query.filter_only() } else { query.clone() };
        let body = serde_json::to_vec(&json!({ "query": wire.text(), "parameters": wire.parameters }))
            .map_err(|e| StoreError::BadRequest(e.to_string()))?;
        let cap = match (windowed, &query.order_by, &query.slice) {
            (false, _, _) => options.max_item_count,
            // TOP alone: any N matches will do
            (true, None, None) => query.top.into_iter().chain(options.max_item_count).min(),
            (true, _, _) => None,
        };
        let page_size = cap.unwrap_or(QUERY_PAGE_SIZE).to_string();
        let cross = if options.enable_cross_partition { "True" } else { "False" };

        let mut rows = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let resp = self
                .send(Method::POST, &format!("{}/docs", coll_path(target)), "docs", &coll_link(target), |r| {
                    let r = r
                        .header(CONTENT_TYPE, "application/query+json")
                        .header("x-ms-documentdb-isquery", "True")
                        .header("x-ms-documentdb-query-enablecrosspartition", cross)
                        .header("x-ms-max-item-count", page_size.as_str())
                        .body(body.clone());
                    match &continuation {
                        Some(token) => r.header("x-ms-continuation", token.as_str()),
                        None => r,
                    }
                })
                .await?;
            let resp = check_response(resp, missing_container(target)).await?;
            let next = resp
                .headers()
                .get("x-ms-continuation")
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_owned);
            let page: QueryPage =
                resp.json().await.map_err(|e| StoreError::Unavailable(format!("malformed query page: {e}")))?;
            rows.extend(page.documents);

            let full = cap.is_some_and(|c| rows.len() >= c as usize);
            match next {
                Some(token) if !full => continuation = Some(token),
                _ => break,
            }
        }

        if windowed {
            return query.finish(rows, options.max_item_count);
        }
        if let Some(c) = cap {
            rows.truncate(c as usize);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::query::{OrderBy, Operand, Slice};
    use axum::body::Bytes;
    use axum::extract::{Path, State};
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::{get, post};
    use axum::{Json, Router};

    // base64 of "petpal-emulator-test-key"
    const KEY: &str = "cGV0cGFsLWVtdWxhdG9yLXRlc3Qta2V5";

    fn mock_response(status: u16, substatus: Option<&str>, body: &str) -> Response {
        let mut builder = ::http::Response::builder().status(status);
        if let Some(s) = substatus {
            builder = builder.header("x-ms-substatus", s);
        }
        Response::from(builder.body(body.to_string()).unwrap())
    }

    #[test]
    fn master_key_signature_matches_reference() {
        let key = STANDARD.decode(KEY).unwrap();
        let header = master_key_header(&key, "GET", "dbs", "dbs/petservice", "Thu, 27 Apr 2017 00:51:12 GMT").unwrap();
        assert_eq!(header, "type%3Dmaster%26ver%3D1.0%26sig%3DBTQ0yXG0Rv7NY0qoGm%2B709kd87jGQosUvZUY9IBfZyE%3D");
    }

    #[test]
    fn token_header_is_url_encoded() {
        assert_eq!(token_header("abc.def"), "type%3Daad%26ver%3D1.0%26sig%3Dabc.def");
    }

    #[test]
    fn bad_account_key_is_unauthorized() {
        let err = CosmosClient::new(
            "https://localhost:8081",
            &Credential::Key("not base64!".into()),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .err()
        .unwrap();
        assert!(matches!(err, StoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn status_mapping() {
        let target = ContainerRef::new("petservice", "pets");
        let err = check_response(mock_response(404, Some("1003"), ""), missing_item(&target, "p1")).await.unwrap_err();
        assert!(err.is_schema_not_found());
        let err = check_response(mock_response(404, None, ""), missing_item(&target, "p1")).await.unwrap_err();
        assert!(err.is_item_not_found());

        let conflict = r#"{"code":"Conflict","message":"Entity with the specified id already exists"}"#;
        let err = check_response(mock_response(409, None, conflict), missing_item(&target, "p1")).await.unwrap_err();
        assert_eq!(err, StoreError::Conflict("Entity with the specified id already exists".into()));

        for (status, expect) in [(400, "bad"), (401, "auth"), (403, "auth"), (429, "down"), (503, "down")] {
            let err = check_response(mock_response(status, None, "{}"), missing_container(&target)).await.unwrap_err();
            let got = match err {
                StoreError::BadRequest(_) => "bad",
                StoreError::Unauthorized(_) => "auth",
                StoreError::Unavailable(_) => "down",
                other => panic!("{status}: unexpected {other:?}"),
            };
            assert_eq!(got, expect, "{status}");
        }
        assert!(check_response(mock_response(201, None, "{}"), missing_container(&target)).await.is_ok());
    }

    #[derive(Default)]
    struct Gateway {
        queries: std::sync::Mutex<Vec<(String, Option<String>)>>,
    }

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> { headers.get(name).and_then(|v| v.to_str().ok()) }

    fn cosmos_error(status: axum::http::StatusCode, substatus: Option<&'static str>, message: &str) -> AxumResponse {
        let body = Json(json!({ "code": status.as_str(), "message": message }));
        match substatus {
            Some(s) => (status, [("x-ms-substatus", s)], body).into_response(),
            None => (status, body).into_response(),
        }
    }

    async fn read_db(Path(db): Path<String>, headers: HeaderMap) -> AxumResponse {
        let date = header(&headers, "x-ms-date").unwrap_or_default();
        let expected = master_key_header(&STANDARD.decode(KEY).unwrap(), "GET", "dbs", &format!("dbs/{db}"), date).unwrap();
        if header(&headers, "authorization") != Some(expected.as_str())
            || header(&headers, "x-ms-version") != Some(API_VERSION)
        {
            return cosmos_error(axum::http::StatusCode::UNAUTHORIZED, None, "signature mismatch");
        }
        match db.as_str() {
            "petservice" => Json(json!({ "id": db })).into_response(),
            _ => cosmos_error(axum::http::StatusCode::NOT_FOUND, None, "database missing"),
        }
    }

    async fn docs(
        State(gw): State<Arc<Gateway>>,
        Path((_db, container)): Path<(String, String)>,
        headers: HeaderMap,
        body: Bytes,
    ) -> AxumResponse {
        if container == "gone" {
            return cosmos_error(axum::http::StatusCode::NOT_FOUND, Some("1003"), "Owner resource does not exist");
        }
        let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        if header(&headers, "x-ms-documentdb-isquery") != Some("True") {
            let pk = Value::Array(vec![body["id"].clone()]).to_string();
            if header(&headers, "x-ms-documentdb-partitionkey") != Some(pk.as_str()) {
                return cosmos_error(axum::http::StatusCode::BAD_REQUEST, None, "partition key mismatch");
            }
            return (axum::http::StatusCode::CREATED, Json(body)).into_response();
        }
        let continuation = header(&headers, "x-ms-continuation").map(str::to_owned);
        let text = body["query"].as_str().unwrap_or_default().to_string();
        gw.queries.lock().unwrap().push((text, continuation.clone()));
        match continuation.as_deref() {
            None => (
                [("x-ms-continuation", "page-2")],
                Json(json!({ "Documents": [
                    { "id": "a", "createdAt": "2024-01-01T00:00:00Z" },
                    { "id": "b", "createdAt": "2024-03-01T00:00:00Z" },
                ] })),
            )
                .into_response(),
            Some("page-2") => Json(json!({ "Documents": [{ "id": "c", "createdAt": "2024-02-01T00:00:00Z" }] })).into_response(),
            Some(_) => cosmos_error(axum::http::StatusCode::BAD_REQUEST, None, "unknown continuation"),
        }
    }

    async fn read_doc() -> AxumResponse { cosmos_error(axum::http::StatusCode::NOT_FOUND, None, "Entity not found") }

    async fn gateway() -> (String, Arc<Gateway>) {
        let state = Arc::new(Gateway::default());
        let app = Router::new()
            .route("/dbs/:db", get(read_db))
            .route("/dbs/:db/colls/:container/docs", post(docs))
            .route("/dbs/:db/colls/:container/docs/:id", get(read_doc))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/"), state)
    }

    async fn connect(endpoint: &str) -> Arc<dyn DocumentStore> {
        CosmosConnector::new(Duration::from_secs(2), Duration::from_secs(5))
            .connect(endpoint, &Credential::Key(KEY.into()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn signed_requests_and_not_found_classes() {
        let (endpoint, _gw) = gateway().await;
        let store = connect(&endpoint).await;

        store.read_database("petservice").await.unwrap();
        let err = store.read_database("elsewhere").await.unwrap_err();
        assert_eq!(err, StoreError::not_found(ResourceKind::Database, "elsewhere"));

        let doc = json!({ "id": "p1", "name": "Buddy" });
        let created = store.create_item(&ContainerRef::new("petservice", "pets"), doc.clone()).await.unwrap();
        assert_eq!(created, doc);

        let err = store.create_item(&ContainerRef::new("petservice", "gone"), doc).await.unwrap_err();
        assert!(err.is_schema_not_found());

        let err = store.read_item(&ContainerRef::new("petservice", "pets"), "p9", "p9").await.unwrap_err();
        assert!(err.is_item_not_found());
    }

    #[tokio::test]
    async fn windowed_queries_page_and_finish_locally() {
        let (endpoint, gw) = gateway().await;
        let store = connect(&endpoint).await;
        let target = ContainerRef::new("petservice", "pets");

        let listing = QuerySpec {
            order_by: Some(OrderBy { field: "createdAt".into(), descending: true }),
            slice: Some(Slice { offset: Operand::Literal(json!(0)), limit: Operand::Literal(json!(2)) }),
            ..Default::default()
        };
        let rows = store.query_items(&target, &listing, &QueryOptions::cross_partition(None)).await.unwrap();
        let ids: Vec<&str> = rows.iter().filter_map(|r| r["id"].as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
        {
            let seen = gw.queries.lock().unwrap();
            assert_eq!(seen.len(), 2);
            assert!(seen.iter().all(|(text, _)| text == "SELECT * FROM c"));
            assert_eq!(seen[1].1.as_deref(), Some("page-2"));
        }

        // TOP without ORDER BY stops after the first page too
        let rows = store.query_items(&target, &QuerySpec::existence(), &QueryOptions::cross_partition(Some(1))).await.unwrap();
        assert_eq!(rows, vec![json!({ "id": "a" })]);
        assert_eq!(gw.queries.lock().unwrap().len(), 3);

        // a capped plain query stops after the page that fills it
        let rows = store.query_items(&target, &QuerySpec::default(), &QueryOptions::cross_partition(Some(2))).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(gw.queries.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn identity_tokens_are_cached_until_near_expiry() {
        use std::collections::HashMap;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        let app = Router::new().route(
            "/token",
            get(move |headers: HeaderMap, axum::extract::Query(q): axum::extract::Query<HashMap<String, String>>| {
                let counter = counter.clone();
                async move {
                    if header(&headers, "x-identity-header") != Some("s3cret") || q.get("resource").map(String::as_str) != Some("https://acct.documents.example.net") {
                        return cosmos_error(axum::http::StatusCode::FORBIDDEN, None, "bad identity request");
                    }
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    // the second token is already inside the refresh window
                    let ttl = if n == 0 { 3600 } else { 60 };
                    let expires_on = (Utc::now().timestamp() + ttl).to_string();
                    Json(json!({ "access_token": format!("tok-{n}"), "expires_on": expires_on })).into_response()
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let hosted = IdentityEndpoint::Hosted { url: format!("http://{addr}/token"), secret: "s3cret".into() };
        let source = TokenSource::new("https://acct.documents.example.net", hosted);
        let http = reqwest::Client::new();
        assert_eq!(source.token(&http).await.unwrap(), "tok-0");
        assert_eq!(source.token(&http).await.unwrap(), "tok-0");
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        *source.cached.lock().await = None;
        assert_eq!(source.token(&http).await.unwrap(), "tok-1");
        assert_eq!(source.token(&http).await.unwrap(), "tok-2");
        assert_eq!(fetches.load(Ordering::SeqCst), 3);

        let wrong = TokenSource::new(
            "https://acct.documents.example.net",
            IdentityEndpoint::Hosted { url: format!("http://{addr}/token"), secret: "nope".into() },
        );
        assert!(matches!(wrong.token(&http).await, Err(StoreError::Unauthorized(_))));
    }
}
