//! PostgREST backend over HTTP.
//!
//! Reads go to `GET {endpoint}/rest/v1/{table}`, procedure calls to
//! `POST {endpoint}/rest/v1/rpc/{name}`. Procedure existence is answered from
//! the OpenAPI document served at `GET {endpoint}/rest/v1/`, fetched once per
//! store and cached.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{DataStore, Query, Row};
use crate::error::StoreError;

const REST_PREFIX: &str = "rest/v1";
const OPENAPI_MEDIA_TYPE: &str = "application/openapi+json";

pub struct RestStore {
    base_url: String,
    api_key: String,
    client: Client,
    procedures: OnceCell<HashSet<String>>,
}

impl RestStore {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(RestStore {
            base_url: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            procedures: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, REST_PREFIX, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Turn a non-success response into `StoreError::Api`, preferring the
    /// `message` field of PostgREST's JSON error body.
    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body.trim().to_string()
                }
            });

        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn load_procedures(&self) -> Result<HashSet<String>, StoreError> {
        log::debug!("[Store] Fetching OpenAPI schema from {}", self.base_url);
        let response = self
            .authorized(self.client.get(self.url("")))
            .header(ACCEPT, OPENAPI_MEDIA_TYPE)
            .send()
            .await?;
        let schema: Value = Self::check(response).await?.json().await?;
        let procedures = procedures_from_openapi(&schema);
        log::debug!("[Store] Schema exposes {} procedure(s)", procedures.len());
        Ok(procedures)
    }
}

/// Names of every `/rpc/<name>` path in a PostgREST OpenAPI document.
pub fn procedures_from_openapi(schema: &Value) -> HashSet<String> {
    schema
        .get("paths")
        .and_then(Value::as_object)
        .map(|paths| {
            paths
                .keys()
                .filter_map(|p| p.strip_prefix("/rpc/"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl DataStore for RestStore {
    fn backend_tag(&self) -> &'static str {
        "postgrest"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        log::debug!("[Store] GET {} {:?}", query.table, query.to_pairs());
        let response = self
            .authorized(self.client.get(self.url(&query.table)))
            .query(&query.to_pairs())
            .send()
            .await?;
        let rows: Vec<Row> = Self::check(response).await?.json().await?;
        log::debug!("[Store] {} returned {} row(s)", query.table, rows.len());
        Ok(rows)
    }

    async fn rpc(&self, procedure: &str, args: &Value) -> Result<Value, StoreError> {
        log::debug!("[Store] RPC {}", procedure);
        let response = self
            .authorized(self.client.post(self.url(&format!("rpc/{}", procedure))))
            .json(args)
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn procedure_exists(&self, procedure: &str) -> Result<bool, StoreError> {
        let procedures = self
            .procedures
            .get_or_try_init(|| self.load_procedures())
            .await?;
        Ok(procedures.contains(procedure))
    }
}
