//! `http_request` tool backed by `reqwest`.
//!
//! Transport failures are reported to the model as `{"error": ...}` rather
//! than as a tool error, so the model can read the reason and retry.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use pmassist_core::tool::{Tool, ToolContext, ToolError, input_schema, parse_input};
use pmassist_types::config::ToolsConfig;
use pmassist_types::llm::ToolDefinition;

#[derive(Debug, Clone, Copy, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Make an HTTP request to a URL.
#[derive(Debug, Deserialize, JsonSchema)]
struct HttpRequestInput {
    /// The URL to make the request to
    url: String,
    /// HTTP method (default: GET)
    #[serde(default)]
    method: HttpMethod,
    /// HTTP headers
    #[serde(default)]
    headers: Option<BTreeMap<String, String>>,
    /// Request body, sent as JSON for methods other than GET
    #[serde(default)]
    data: Option<Value>,
}

pub struct HttpRequestTool {
    client: reqwest::Client,
}

impl HttpRequestTool {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &ToolsConfig) -> Result<Self, reqwest::Error> {
        Self::new(Duration::from_secs(config.http_timeout_secs))
    }

    fn request_headers(extra: Option<&BTreeMap<String, String>>) -> Result<HeaderMap, ToolError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in extra.into_iter().flatten() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ToolError::InvalidInput(format!("header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ToolError::InvalidInput(format!("header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    async fn send(&self, input: HttpRequestInput) -> Result<Value, reqwest::Error> {
        let headers = match Self::request_headers(input.headers.as_ref()) {
            Ok(headers) => headers,
            // Rejected headers surface as a normal error payload.
            Err(e) => return Ok(json!({ "error": e.to_string() })),
        };

        let mut builder = self
            .client
            .request(input.method.into(), &input.url)
            .headers(headers);
        if let Some(data) = input.data.filter(|d| !d.is_null()) {
            if !matches!(input.method, HttpMethod::Get) {
                builder = builder.json(&data);
            }
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let data = response.text().await?;

        Ok(json!({
            "status": status,
            "headers": headers,
            "data": data,
        }))
    }
}

impl Tool for HttpRequestTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "http_request".to_string(),
            description: "Make an HTTP request to a URL. Returns the response status, headers and body."
                .to_string(),
            parameters: input_schema::<HttpRequestInput>(),
        }
    }

    async fn call(&self, ctx: &ToolContext, input: Value) -> Result<Value, ToolError> {
        let input: HttpRequestInput = parse_input(input)?;
        let url = input.url.clone();

        match self.send(input).await {
            Ok(result) => {
                tracing::debug!(thread_id = %ctx.thread_id, %url, status = %result["status"], "http_request finished");
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(thread_id = %ctx.thread_id, %url, error = %e, "http_request failed");
                Ok(json!({ "error": e.to_string() }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP server that returns a fixed body and hands back the raw request.
    async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 201 Created\r\nContent-Type: text/plain\r\nX-Test: yes\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });
        (format!("http://{addr}/items"), handle)
    }

    /// Read headers, then `Content-Length` bytes of body.
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    fn ctx() -> ToolContext {
        ToolContext::new("t1", "u1", Vec::new())
    }

    fn tool() -> HttpRequestTool {
        HttpRequestTool::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_status_headers_and_body() {
        let (url, server) = serve_once("created").await;
        let out = tool().call(&ctx(), json!({ "url": url })).await.unwrap();

        assert_eq!(out["status"], 201);
        assert_eq!(out["data"], "created");
        assert_eq!(out["headers"]["x-test"], "yes");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /items"), "{request}");
    }

    #[tokio::test]
    async fn test_post_sends_json_body_and_custom_headers() {
        let (url, server) = serve_once("ok").await;
        let out = tool()
            .call(
                &ctx(),
                json!({
                    "url": url,
                    "method": "POST",
                    "headers": {"X-Trace": "abc"},
                    "data": {"name": "widget"},
                }),
            )
            .await
            .unwrap();
        assert_eq!(out["status"], 201);

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("post /items"));
        assert!(request.contains("x-trace: abc"));
        assert!(request.contains("content-type: application/json"));
        assert!(request.contains("{\"name\":\"widget\"}"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_error_payload() {
        // Bind then drop so the port is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let out = tool()
            .call(&ctx(), json!({ "url": format!("http://{addr}/") }))
            .await
            .unwrap();
        assert!(out["error"].is_string());
        assert!(out.get("status").is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_is_invalid_input() {
        let err = tool()
            .call(&ctx(), json!({ "url": "http://localhost/", "method": "TRACE" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[test]
    fn test_definition_schema() {
        let def = tool().definition();
        assert_eq!(def.name, "http_request");
        assert_eq!(def.parameters["required"], json!(["url"]));
    }
}
