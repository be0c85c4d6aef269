//! Client for the Gemini `generateContent` REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GeminiConfig;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no GEMINI_API_KEY configured")]
    NotConfigured,
    #[error("model endpoint unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned no text")]
    Empty,
}

/// Bytes sent to the model alongside the prompt.
#[derive(Debug, Clone, Copy)]
pub struct InlineDocument<'a> {
    pub mime_type: &'a str,
    pub data: &'a [u8],
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Runs one prompt and returns the concatenated text of the first
    /// candidate. With `json_output` the model is asked for raw JSON.
    async fn generate(
        &self,
        prompt: &str,
        document: Option<InlineDocument<'_>>,
        json_output: bool,
    ) -> Result<String, ExtractError>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn request_body(prompt: &str, document: Option<InlineDocument<'_>>, json_output: bool) -> Value {
        let mut parts = Vec::with_capacity(2);
        if let Some(doc) = document {
            parts.push(json!({
                "inline_data": {
                    "mime_type": doc.mime_type,
                    "data": Base64::encode_string(doc.data),
                }
            }));
        }
        parts.push(json!({ "text": prompt }));

        let mut body = json!({ "contents": [{ "parts": parts }] });
        if json_output {
            body["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Extractor for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        document: Option<InlineDocument<'_>>,
        json_output: bool,
    ) -> Result<String, ExtractError> {
        let key = self.api_key.as_deref().ok_or(ExtractError::NotConfigured)?;
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);

        debug!(model = %self.model, with_document = document.is_some(), "calling model");
        let res = self
            .client
            .post(url)
            .header("x-goog-api-key", key)
            .json(&Self::request_body(prompt, document, json_output))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "model request failed");
            return Err(ExtractError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = res.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str, key: Option<&str>) -> GeminiClient {
        GeminiClient::new(&GeminiConfig {
            api_key: key.map(str::to_string),
            base_url: base.to_string(),
            model: "gemini-2.5-flash".into(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn sends_inline_document_and_joins_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "k-123"))
            .and(body_partial_json(json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "{\"name\":" }, { "text": "\"BSNL\"}" }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let doc = InlineDocument {
            mime_type: "application/pdf",
            data: b"%PDF-1.7",
        };
        let text = client(&server.uri(), Some("k-123"))
            .generate("extract", Some(doc), true)
            .await
            .unwrap();
        assert_eq!(text, "{\"name\":\"BSNL\"}");
    }

    #[test]
    fn request_body_encodes_document_first() {
        let body = GeminiClient::request_body(
            "describe",
            Some(InlineDocument {
                mime_type: "image/png",
                data: b"hi",
            }),
            false,
        );
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["inline_data"]["data"], "aGk=");
        assert_eq!(parts[1]["text"], "describe");
        assert!(body.get("generationConfig").is_none());
    }

    #[tokio::test]
    async fn missing_key_fails_fast() {
        let err = client("http://127.0.0.1:9", None)
            .generate("x", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::NotConfigured));
    }

    #[tokio::test]
    async fn empty_candidates_are_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;
        let err = client(&server.uri(), Some("k"))
            .generate("x", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Empty));
    }
}
