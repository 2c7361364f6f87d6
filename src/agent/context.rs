//! Request and response metadata captured into transactions.

use axum::http::{HeaderMap, Request, Response, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;

/// Replacement value for sanitized headers.
pub const REDACTED: &str = "[REDACTED]";

/// Everything captured about one HTTP exchange.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionContext {
    pub request: RequestContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub method: String,
    pub url: UrlContext,
    pub http_version: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlContext {
    pub full: String,
    pub pathname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseContext {
    pub status_code: u16,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// Rules applied when copying headers into a context.
#[derive(Debug, Clone, Default)]
pub struct HeaderPolicy {
    pub capture: bool,
    /// Lowercased header names whose values are redacted.
    pub sanitize: Vec<String>,
}

impl HeaderPolicy {
    pub fn new(capture: bool, sanitize: &[String]) -> Self {
        Self {
            capture,
            sanitize: sanitize.iter().map(|name| name.to_ascii_lowercase()).collect(),
        }
    }

    /// Copy headers, joining repeated values and redacting sensitive ones.
    pub fn collect(&self, headers: &HeaderMap) -> BTreeMap<String, String> {
        let mut out: BTreeMap<String, String> = BTreeMap::new();
        if !self.capture {
            return out;
        }

        for (name, value) in headers {
            let key = name.as_str();
            let value = if self.sanitize.iter().any(|s| s == key) {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };

            out.entry(key.to_string())
                .and_modify(|existing| {
                    if existing != REDACTED {
                        existing.push_str(", ");
                        existing.push_str(&value);
                    }
                })
                .or_insert(value);
        }
        out
    }
}

impl RequestContext {
    pub fn from_request<B>(request: &Request<B>, policy: &HeaderPolicy) -> Self {
        let uri = request.uri();
        let hostname = uri
            .host()
            .map(str::to_string)
            .or_else(|| {
                request
                    .headers()
                    .get("host")
                    .and_then(|h| h.to_str().ok())
                    .map(|h| h.split(':').next().unwrap_or(h).to_string())
            });

        Self {
            method: request.method().to_string(),
            url: UrlContext {
                full: uri.to_string(),
                pathname: uri.path().to_string(),
                search: uri.query().map(str::to_string),
                hostname,
            },
            http_version: format!("{:?}", request.version()),
            headers: policy.collect(request.headers()),
        }
    }
}

impl ResponseContext {
    pub fn from_response<B>(response: &Response<B>, policy: &HeaderPolicy) -> Self {
        Self::from_parts(response.status(), response.headers(), policy)
    }

    pub fn from_parts(status: StatusCode, headers: &HeaderMap, policy: &HeaderPolicy) -> Self {
        Self {
            status_code: status.as_u16(),
            headers: policy.collect(headers),
        }
    }
}
