//! Source feed fetching.
//!
//! A feed is either a JSON array or newline-delimited text. Entries are
//! returned raw; validation happens in [`crate::cidr`].

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::SyncError;
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::utils::format_count;

/// Raw entries of both address families, IPv4 first
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceEntries {
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
}

impl SourceEntries {
    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenation with every IPv4 entry ahead of every IPv6 entry
    pub fn combined(self) -> Vec<String> {
        let mut all = self.ipv4;
        all.extend(self.ipv6);
        all
    }
}

/// Fetches raw entries from feed URLs
#[derive(Clone)]
pub struct SourceFetcher {
    transport: Arc<dyn Transport>,
}

impl SourceFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch one feed and split it into raw entries
    pub async fn fetch_list(&self, url: &str) -> Result<Vec<String>, SyncError> {
        debug!("Fetching {}", url);
        let response = self.transport.execute(HttpRequest::get(url)).await?;
        let entries = parse_feed(&response)
            .map_err(|e| SyncError::Format(format!("{}: {}", url, e)))?;
        info!("Fetched {} - {} entries", url, format_count(entries.len()));
        Ok(entries)
    }

    /// Fetch both feeds concurrently; the result order does not depend on
    /// which request finishes first
    pub async fn fetch_sources(
        &self,
        ipv4_url: &str,
        ipv6_url: &str,
    ) -> Result<SourceEntries, SyncError> {
        let (ipv4, ipv6) =
            futures::future::try_join(self.fetch_list(ipv4_url), self.fetch_list(ipv6_url))
                .await?;
        Ok(SourceEntries { ipv4, ipv6 })
    }
}

/// Turn a feed response into raw entries.
///
/// Declared JSON must be an array. Anything else is trimmed; if it looks like
/// an array it is tried as JSON first, then read as one entry per line.
pub fn parse_feed(response: &HttpResponse) -> Result<Vec<String>, String> {
    if response.is_json() {
        return parse_json_array(&response.body);
    }

    let body = response.body.trim();
    if body.starts_with('[') {
        if let Ok(entries) = parse_json_array(body) {
            return Ok(entries);
        }
        debug!("Body looks like JSON but does not parse as an array, reading as text");
    }

    Ok(parse_lines(body))
}

fn parse_json_array(body: &str) -> Result<Vec<String>, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("invalid JSON body: {}", e))?;
    match value {
        Value::Array(items) => Ok(items.into_iter().map(stringify).collect()),
        other => Err(format!("expected a JSON array, got {}", json_kind(&other))),
    }
}

fn stringify(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One entry per line (`\n` or `\r\n`), trimmed, blank lines dropped
pub fn parse_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn text(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            content_type: Some("text/plain".to_string()),
            body: body.to_string(),
        }
    }

    fn json(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_parse_text_lines() {
        let entries = parse_feed(&text("172.224.224.0/27\n172.224.224.32/27\n")).unwrap();
        assert_eq!(entries, vec!["172.224.224.0/27", "172.224.224.32/27"]);
    }

    #[test]
    fn test_parse_text_crlf_and_blank_lines() {
        let entries = parse_feed(&text("  1.1.1.0/24 \r\n\r\n\t2.2.2.0/24\r\n   \n")).unwrap();
        assert_eq!(entries, vec!["1.1.1.0/24", "2.2.2.0/24"]);
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(parse_feed(&text("")).unwrap().is_empty());
        assert!(parse_feed(&text("\n\n  \n")).unwrap().is_empty());
    }

    #[test]
    fn test_parse_declared_json_array() {
        let entries = parse_feed(&json(r#"["2001:db8::/32", "192.0.2.0/24"]"#)).unwrap();
        assert_eq!(entries, vec!["2001:db8::/32", "192.0.2.0/24"]);
    }

    #[test]
    fn test_parse_json_non_string_elements_stringified() {
        let entries = parse_feed(&json(r#"["192.0.2.0/24", 42, null, true]"#)).unwrap();
        assert_eq!(entries, vec!["192.0.2.0/24", "42", "null", "true"]);
    }

    #[test]
    fn test_parse_declared_json_object_is_format_error() {
        let err = parse_feed(&json(r#"{"prefixes": []}"#)).unwrap_err();
        assert!(err.contains("expected a JSON array"));
    }

    #[test]
    fn test_parse_declared_json_invalid_is_format_error() {
        assert!(parse_feed(&json("192.0.2.0/24\n")).is_err());
    }

    #[test]
    fn test_parse_undeclared_json_array_fallback() {
        let entries = parse_feed(&text("  [\"192.0.2.0/24\", \"198.51.100.0/24\"]\n")).unwrap();
        assert_eq!(entries, vec!["192.0.2.0/24", "198.51.100.0/24"]);
    }

    #[test]
    fn test_parse_bracketed_text_falls_back_to_lines() {
        let entries = parse_feed(&text("[2001:db8::]/32\n192.0.2.0/24")).unwrap();
        assert_eq!(entries, vec!["[2001:db8::]/32", "192.0.2.0/24"]);
    }

    #[test]
    fn test_parse_missing_content_type_is_text() {
        let response = HttpResponse {
            status: 200,
            content_type: None,
            body: "192.0.2.0/24".to_string(),
        };
        assert_eq!(parse_feed(&response).unwrap(), vec!["192.0.2.0/24"]);
    }

    #[test]
    fn test_combined_keeps_ipv4_first() {
        let entries = SourceEntries {
            ipv4: vec!["1.1.1.0/24".to_string()],
            ipv6: vec!["2001:db8::/32".to_string()],
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.combined(), vec!["1.1.1.0/24", "2001:db8::/32"]);
    }

    #[tokio::test]
    async fn test_fetch_list_uses_transport() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| req.url == "https://feeds.example.com/v4.txt" && req.bearer.is_none())
            .times(1)
            .returning(|_| Ok(text("192.0.2.0/24\n198.51.100.7")));

        let fetcher = SourceFetcher::new(Arc::new(transport));
        let entries = fetcher
            .fetch_list("https://feeds.example.com/v4.txt")
            .await
            .unwrap();
        assert_eq!(entries, vec!["192.0.2.0/24", "198.51.100.7"]);
    }

    #[tokio::test]
    async fn test_fetch_list_format_error() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .returning(|_| Ok(json(r#"{"not": "an array"}"#)));

        let fetcher = SourceFetcher::new(Arc::new(transport));
        let result = fetcher.fetch_list("https://feeds.example.com/v4.json").await;
        assert!(matches!(result, Err(SyncError::Format(_))));
    }

    #[tokio::test]
    async fn test_fetch_list_transport_error_propagates() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .returning(|_| Err(SyncError::Transport("HTTP 503".to_string())));

        let fetcher = SourceFetcher::new(Arc::new(transport));
        let result = fetcher.fetch_list("https://feeds.example.com/v4.txt").await;
        assert!(matches!(result, Err(SyncError::Transport(_))));
    }

    #[tokio::test]
    async fn test_fetch_sources_orders_by_family() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| req.url.ends_with("v6.txt"))
            .returning(|_| Ok(text("2001:db8::/32")));
        transport
            .expect_execute()
            .withf(|req| req.url.ends_with("v4.txt"))
            .returning(|_| Ok(text("192.0.2.0/24")));

        let fetcher = SourceFetcher::new(Arc::new(transport));
        let entries = fetcher
            .fetch_sources(
                "https://feeds.example.com/v4.txt",
                "https://feeds.example.com/v6.txt",
            )
            .await
            .unwrap();
        assert_eq!(entries.combined(), vec!["192.0.2.0/24", "2001:db8::/32"]);
    }

    #[tokio::test]
    async fn test_fetch_sources_fails_if_either_fails() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| req.url.ends_with("v6.txt"))
            .returning(|_| Err(SyncError::Transport("HTTP 500".to_string())));
        transport
            .expect_execute()
            .withf(|req| req.url.ends_with("v4.txt"))
            .returning(|_| Ok(text("192.0.2.0/24")));

        let fetcher = SourceFetcher::new(Arc::new(transport));
        let result = fetcher
            .fetch_sources(
                "https://feeds.example.com/v4.txt",
                "https://feeds.example.com/v6.txt",
            )
            .await;
        assert!(result.is_err());
    }
}
