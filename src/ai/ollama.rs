//! Inference Client Adapter
//!
//! The pipeline only sees [`InferenceClient`]. [`OllamaClient`] implements it
//! over the Ollama-style HTTP API:
//! - `GET  {base}/api/tags`     → `{ "models": [{ "name": ... }] }`
//! - `POST {base}/api/generate` → `{ "response": ... }`

use super::http_client::{inference_client, probe_client};
use super::server::ServerAddress;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default vision model
pub const DEFAULT_MODEL: &str = "llava";

/// Encoded payloads above this size get a warning
pub const DEFAULT_PAYLOAD_WARN_BYTES: usize = 10 * 1024 * 1024;

/// Operations the pipeline needs from an inference server
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Succeeds only on a 2xx answer from the server
    async fn health_check(&self) -> Result<()>;

    /// Model identifiers in server order (callers sort)
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Describe one image; returns the trimmed model response
    async fn describe_image(
        &self,
        image: &[u8],
        prompt: &str,
        model_override: Option<&str>,
    ) -> Result<String>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// HTTP adapter for an Ollama-compatible server
pub struct OllamaClient {
    http: Client,
    probe: Client,
    address: ServerAddress,
    model: String,
    payload_warn_bytes: usize,
}

impl OllamaClient {
    /// Create a client using the shared connection pools
    pub fn new(address: ServerAddress, model: impl Into<String>) -> Self {
        Self {
            http: inference_client().clone(),
            probe: probe_client().clone(),
            address,
            model: model.into(),
            payload_warn_bytes: DEFAULT_PAYLOAD_WARN_BYTES,
        }
    }

    /// Create a client on a caller-provided `reqwest::Client` (used by tests)
    pub fn with_http_client(
        address: ServerAddress,
        model: impl Into<String>,
        http: Client,
    ) -> Self {
        Self {
            probe: http.clone(),
            http,
            address,
            model: model.into(),
            payload_warn_bytes: DEFAULT_PAYLOAD_WARN_BYTES,
        }
    }

    pub fn with_payload_warning(mut self, bytes: usize) -> Self {
        self.payload_warn_bytes = bytes;
        self
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether an encoded payload of this size triggers the warning
    pub fn is_oversized(&self, encoded_len: usize) -> bool {
        encoded_len > self.payload_warn_bytes
    }

    async fn get_tags(&self) -> Result<String> {
        let response = self.probe.get(self.address.endpoint("/api/tags")).send().await?;
        read_success_body(response).await
    }
}

/// Body of a 2xx response, or `HttpStatus` carrying code and body
async fn read_success_body(response: Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(Error::HttpStatus {
            code: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn decode<T: DeserializeOwned>(body: String) -> Result<T> {
    serde_json::from_str(&body).map_err(|e| Error::DecodingFailed {
        reason: e.to_string(),
        body,
    })
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn health_check(&self) -> Result<()> {
        self.get_tags().await?;
        tracing::debug!(server = %self.address, "Inference server healthy");
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let body = self.get_tags().await?;
        let tags: TagsResponse = decode(body)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn describe_image(
        &self,
        image: &[u8],
        prompt: &str,
        model_override: Option<&str>,
    ) -> Result<String> {
        let encoded = STANDARD.encode(image);
        if self.is_oversized(encoded.len()) {
            tracing::warn!(
                encoded_bytes = encoded.len(),
                threshold = self.payload_warn_bytes,
                "Large image payload, the server may reject it"
            );
        }

        let model = model_override
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(self.model.as_str());

        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            images: vec![encoded],
        };

        let response = self
            .http
            .post(self.address.endpoint("/api/generate"))
            .json(&request)
            .send()
            .await?;

        let body = read_success_body(response).await?;
        let generated: GenerateResponse = decode(body)?;

        Ok(generated.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::server::normalize_server_address;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Serves one canned response per connection, returns captured request bodies
    async fn serve(
        responses: Vec<(u16, &'static str)>,
    ) -> (ServerAddress, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let mut bodies = Vec::new();
            for (code, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                bodies.push(read_request_body(&mut stream).await);
                let reply = format!(
                    "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    code,
                    body.len(),
                    body
                );
                stream.write_all(reply.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
            bodies
        });

        let address = normalize_server_address(&format!("127.0.0.1:{}", port)).unwrap();
        (address, handle)
    }

    async fn read_request_body(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return String::new();
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + len {
                    return String::from_utf8_lossy(&buf[pos + 4..pos + 4 + len]).to_string();
                }
            }
        }
    }

    fn client(address: ServerAddress) -> OllamaClient {
        OllamaClient::with_http_client(address, "llava", Client::new())
    }

    #[tokio::test]
    async fn test_health_check_ok() {
        let (address, server) = serve(vec![(200, r#"{"models":[]}"#)]).await;
        client(address).health_check().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_health_check_status_error_carries_body() {
        let (address, server) = serve(vec![(503, "loading")]).await;
        let err = client(address).health_check().await.unwrap_err();
        match err {
            Error::HttpStatus { code, body } => {
                assert_eq!(code, 503);
                assert_eq!(body, "loading");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_list_models() {
        let (address, server) = serve(vec![(
            200,
            r#"{"models":[{"name":"llava:13b","size":1},{"name":"bakllava"}]}"#,
        )])
        .await;
        let models = client(address).list_models().await.unwrap();
        assert_eq!(models, vec!["llava:13b".to_string(), "bakllava".to_string()]);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_list_models_bad_shape_keeps_body() {
        let (address, server) = serve(vec![(200, r#"{"tags":"nope"}"#)]).await;
        let err = client(address).list_models().await.unwrap_err();
        match err {
            Error::DecodingFailed { body, .. } => assert_eq!(body, r#"{"tags":"nope"}"#),
            other => panic!("unexpected error: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_describe_image_sends_encoded_image() {
        let (address, server) =
            serve(vec![(200, r#"{"response":"  A cat on a sofa \n","done":true}"#)]).await;

        let text = client(address)
            .describe_image(b"pixels", "Describe. Respond in French.", Some("moondream"))
            .await
            .unwrap();
        assert_eq!(text, "A cat on a sofa");

        let bodies = server.await.unwrap();
        let sent: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
        assert_eq!(sent["model"], "moondream");
        assert_eq!(sent["prompt"], "Describe. Respond in French.");
        assert_eq!(sent["stream"], false);
        assert_eq!(sent["images"][0], STANDARD.encode(b"pixels"));
    }

    #[tokio::test]
    async fn test_describe_image_uses_default_model() {
        let (address, server) = serve(vec![(200, r#"{"response":"dog"}"#)]).await;
        client(address)
            .describe_image(b"x", "p", None)
            .await
            .unwrap();
        let bodies = server.await.unwrap();
        let sent: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
        assert_eq!(sent["model"], "llava");
    }

    #[tokio::test]
    async fn test_oversized_payload_still_sent() {
        let (address, server) = serve(vec![(200, r#"{"response":"big picture"}"#)]).await;
        let client = client(address).with_payload_warning(4);
        let encoded_len = STANDARD.encode(b"pixels").len();
        assert!(client.is_oversized(encoded_len));

        let text = client.describe_image(b"pixels", "p", None).await.unwrap();
        assert_eq!(text, "big picture");

        let bodies = server.await.unwrap();
        let sent: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
        assert_eq!(sent["images"][0], STANDARD.encode(b"pixels"));
    }

    #[test]
    fn test_default_payload_threshold() {
        let client = OllamaClient::new(ServerAddress::default(), "llava");
        assert!(!client.is_oversized(STANDARD.encode(b"pixels").len()));
        assert!(client.is_oversized(DEFAULT_PAYLOAD_WARN_BYTES + 1));
    }

    #[tokio::test]
    async fn test_truncated_body_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request_body(&mut stream).await;
            let reply = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"mod";
            stream.write_all(reply.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        });

        let address = normalize_server_address(&format!("127.0.0.1:{}", port)).unwrap();
        let err = client(address).list_models().await.unwrap_err();
        assert!(matches!(err, Error::ServerUnreachable(_)), "got {err:?}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_describe_image_500() {
        let (address, server) = serve(vec![(500, "boom")]).await;
        let err = client(address)
            .describe_image(b"x", "p", None)
            .await
            .unwrap_err();
        assert!(err.is_server_error_500());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let address = normalize_server_address(&format!("127.0.0.1:{}", port)).unwrap();
        let err = client(address).health_check().await.unwrap_err();
        assert!(matches!(err, Error::ServerUnreachable(_)));
    }
}
