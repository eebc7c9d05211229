//! Cloudflare Rules Lists backend.
//!
//! Uses four account-level endpoints:
//! - `GET  /accounts/{account}/rules/lists`
//! - `POST /accounts/{account}/rules/lists`
//! - `GET  /accounts/{account}/rules/lists/{id}/items?per_page=N&cursor=C`
//! - `PUT  /accounts/{account}/rules/lists/{id}/items`

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ListStore, ReplaceConfirmation};
use crate::config::{SecureString, SyncSettings, MAX_PAGE_SIZE};
use crate::error::SyncError;
use crate::transport::{HttpRequest, Transport};

/// Kind used when the list has to be created
const LIST_KIND: &str = "ip";

/// Standard Cloudflare v4 response envelope
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    cursors: Option<Cursors>,
}

#[derive(Debug, Default, Deserialize)]
struct Cursors {
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListSummary {
    id: String,
    name: String,
}

impl ApiEnvelope {
    fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "request was not successful".to_string();
        }
        self.errors
            .iter()
            .map(|e| match e.code {
                Some(code) => format!("{} ({})", e.message, code),
                None => e.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn next_cursor(&self) -> Option<&str> {
        self.result_info
            .as_ref()
            .and_then(|info| info.cursors.as_ref())
            .and_then(|cursors| cursors.after.as_deref())
            .filter(|cursor| !cursor.is_empty())
    }
}

/// List store backed by the Cloudflare API
pub struct CloudflareListStore {
    transport: Arc<dyn Transport>,
    api_base: String,
    account_id: String,
    token: SecureString,
    list_description: String,
    page_size: usize,
    max_items: usize,
}

impl CloudflareListStore {
    pub fn new(transport: Arc<dyn Transport>, settings: &SyncSettings) -> Self {
        Self {
            transport,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            account_id: settings.account_id.clone(),
            token: settings.api_token.clone(),
            list_description: settings.list_description.clone(),
            page_size: settings.page_size.clamp(1, MAX_PAGE_SIZE),
            max_items: settings.max_list_items,
        }
    }

    fn lists_url(&self) -> String {
        format!("{}/accounts/{}/rules/lists", self.api_base, self.account_id)
    }

    fn items_url(&self, list_id: &str) -> String {
        format!("{}/{}/items", self.lists_url(), list_id)
    }

    fn page_url(&self, list_id: &str, cursor: Option<&str>) -> Result<String, SyncError> {
        let per_page = self.page_size.to_string();
        let mut params = vec![("per_page", per_page.as_str())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        Url::parse_with_params(&self.items_url(list_id), &params)
            .map(String::from)
            .map_err(|e| SyncError::Config(format!("Invalid list store URL: {}", e)))
    }

    /// Send an authenticated request and unwrap the envelope
    async fn call(&self, request: HttpRequest) -> Result<ApiEnvelope, SyncError> {
        let what = format!("{:?} {}", request.method, request.url);
        let response = self.transport.execute(request.bearer(self.token.clone())).await?;

        let envelope: ApiEnvelope = serde_json::from_str(&response.body)
            .map_err(|e| SyncError::Store(format!("{}: malformed response: {}", what, e)))?;

        if !envelope.success {
            return Err(SyncError::Store(format!(
                "{}: {}",
                what,
                envelope.error_summary()
            )));
        }
        Ok(envelope)
    }

    async fn find_list(&self, name: &str) -> Result<Option<String>, SyncError> {
        let envelope = self.call(HttpRequest::get(self.lists_url())).await?;
        let result = envelope
            .result
            .ok_or_else(|| SyncError::Store("list lookup response has no result".to_string()))?;
        let lists: Vec<ListSummary> = serde_json::from_value(result)
            .map_err(|e| SyncError::Store(format!("list lookup result is malformed: {}", e)))?;

        Ok(lists.into_iter().find(|l| l.name == name).map(|l| l.id))
    }

    async fn create_list(&self, name: &str) -> Result<String, SyncError> {
        let body = json!({
            "name": name,
            "kind": LIST_KIND,
            "description": self.list_description,
        });
        let envelope = self
            .call(HttpRequest::post(self.lists_url(), body))
            .await?;

        envelope
            .result
            .as_ref()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SyncError::Store("create list response has no id".to_string()))
    }
}

#[async_trait]
impl ListStore for CloudflareListStore {
    async fn get_or_create_list(&self, name: &str) -> Result<String, SyncError> {
        if let Some(id) = self.find_list(name).await? {
            debug!("Found list '{}' ({})", name, id);
            return Ok(id);
        }

        info!("List '{}' not found, creating it", name);
        let id = self.create_list(name).await?;
        info!("Created list '{}' ({})", name, id);
        Ok(id)
    }

    async fn get_all_items(
        &self,
        list_id: &str,
        expected_count_hint: Option<usize>,
    ) -> Result<Vec<String>, SyncError> {
        let ceiling = expected_count_hint.unwrap_or(self.max_items);
        let mut items: Vec<String> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            if items.len() >= ceiling {
                warn!(
                    "Stopped reading list {} at the {} item ceiling; more pages may exist",
                    list_id, ceiling
                );
                break;
            }

            let url = self.page_url(list_id, cursor.as_deref())?;
            let envelope = self.call(HttpRequest::get(url)).await?;
            pages += 1;

            let page = match envelope.result.as_ref() {
                Some(Value::Array(page)) => page,
                Some(_) => {
                    return Err(SyncError::Store(format!(
                        "items page {} of list {}: result is not an array",
                        pages, list_id
                    )))
                }
                None => {
                    return Err(SyncError::Store(format!(
                        "items page {} of list {}: result is missing",
                        pages, list_id
                    )))
                }
            };

            if page.is_empty() {
                break;
            }

            let remaining = ceiling - items.len();
            for item in page.iter().take(remaining) {
                let ip = item.get("ip").and_then(Value::as_str).ok_or_else(|| {
                    SyncError::Store(format!(
                        "items page {} of list {}: item without an ip: {}",
                        pages, list_id, item
                    ))
                })?;
                items.push(ip.to_string());
            }
            debug!("Page {} of list {}: {} item(s), {} total", pages, list_id, page.len(), items.len());

            match envelope.next_cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        debug!("Read {} item(s) from list {} in {} page(s)", items.len(), list_id, pages);
        Ok(items)
    }

    async fn replace_all_items(
        &self,
        list_id: &str,
        items: &[String],
    ) -> Result<ReplaceConfirmation, SyncError> {
        let body = Value::Array(items.iter().map(|ip| json!({ "ip": ip })).collect());
        let envelope = self
            .call(HttpRequest::put(self.items_url(list_id), body))
            .await?;

        let operation_id = envelope
            .result
            .as_ref()
            .and_then(|r| r.get("operation_id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(ReplaceConfirmation { operation_id })
    }
}
