//! HTTP utilities for Graph REST API calls

use crate::error::{ConnectorError, Result};
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut cut = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Status and parsed body of a mutating call
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

/// HTTP client wrapper for Graph API calls
#[derive(Clone)]
pub struct GraphHttpClient {
    client: Client,
}

impl GraphHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("dataconnect/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConnectorError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Underlying reqwest client, shared with the token endpoint
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Make a GET request and parse the JSON body
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        let request = self.client.get(url).bearer_auth(token);
        let (_, body) = self.send(request).await?;
        serde_json::from_str(&body).map_err(Into::into)
    }

    /// GET keeping the reply status alongside the parsed body
    pub async fn get_reply(&self, url: &str, token: &str) -> Result<Reply> {
        tracing::debug!("GET {}", url);
        let request = self.client.get(url).bearer_auth(token);
        self.send_reply(request).await
    }

    /// GET with one extra request header
    pub async fn get_with_header(
        &self,
        url: &str,
        token: &str,
        name: &str,
        value: &str,
    ) -> Result<Value> {
        tracing::debug!("GET {} ({}: {})", url, name, value);
        let request = self.client.get(url).bearer_auth(token).header(name, value);
        let (_, body) = self.send(request).await?;
        serde_json::from_str(&body).map_err(Into::into)
    }

    /// Download raw content; pre-authenticated URLs take no token
    pub async fn get_bytes(&self, url: &str, token: Option<&str>) -> Result<Bytes> {
        tracing::debug!("GET {} (content)", url);

        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(api_error(status, body));
        }

        Ok(response.bytes().await?)
    }

    /// Make a POST request with an optional JSON body
    pub async fn post(&self, url: &str, token: &str, body: Option<&Value>) -> Result<Reply> {
        tracing::debug!("POST {}", url);

        let mut request = self.client.post(url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        } else {
            request = request.header(reqwest::header::CONTENT_LENGTH, 0);
        }

        self.send_reply(request).await
    }

    /// Make a PATCH request with a JSON body
    pub async fn patch(&self, url: &str, token: &str, body: &Value) -> Result<Reply> {
        tracing::debug!("PATCH {}", url);
        let request = self.client.patch(url).bearer_auth(token).json(body);
        self.send_reply(request).await
    }

    /// Upload raw bytes with PUT
    pub async fn put_bytes(&self, url: &str, token: &str, data: Vec<u8>) -> Result<Reply> {
        tracing::debug!("PUT {} ({} bytes)", url, data.len());
        let request = self.client.put(url).bearer_auth(token).body(data);
        self.send_reply(request).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, token: &str) -> Result<Reply> {
        tracing::debug!("DELETE {}", url);
        let request = self.client.delete(url).bearer_auth(token);
        self.send_reply(request).await
    }

    async fn send_reply(&self, request: RequestBuilder) -> Result<Reply> {
        let (status, body) = self.send(request).await?;

        // Handle empty response
        let body = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)?
        };

        Ok(Reply {
            status: status.as_u16(),
            body,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, body));
        }

        Ok((status, body))
    }
}

fn api_error(status: StatusCode, body: String) -> ConnectorError {
    // Only log sanitized/truncated error body to avoid leaking sensitive data
    tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
    ConnectorError::Api {
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(200)));
        assert!(sanitized.contains("500 bytes total"));
    }

    #[test]
    fn test_sanitize_multibyte_boundary() {
        let body = "é".repeat(150);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated"));
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }
}
