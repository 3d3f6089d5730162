//! A [`Transcriber`] backed by Google's Gemini `generateContent` REST API.
//!
//! Images are sent inline as base64 alongside a fixed extraction prompt. The
//! model is asked for a JSON response; a markdown fence around it is
//! tolerated. Quota (HTTP 429) and availability (HTTP 503) failures are
//! reported distinctly so callers can tell the user to retry later.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use storewalk_core::transcribe::{
  ImageInput, TranscribeError, TranscribeFailure, Transcriber, parse_reply,
};
use tracing::{debug, warn};

const PROMPT: &str = include_str!("prompt.md");

const TEMPERATURE: f64 = 0.1;
const TOP_P: f64 = 0.85;
const MAX_OUTPUT_TOKENS: u32 = 8192;

// ─── Config ──────────────────────────────────────────────────────────────────

/// Connection settings for the Gemini API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
  #[serde(default)]
  pub api_key:  String,
  #[serde(default = "default_model")]
  pub model:    String,
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Request timeout in seconds.
  #[serde(default = "default_timeout")]
  pub timeout:  u64,
}

fn default_model() -> String { "gemini-2.5-flash".to_string() }
fn default_base_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_timeout() -> u64 { 120 }

impl Default for GeminiConfig {
  fn default() -> Self {
    Self {
      api_key:  String::new(),
      model:    default_model(),
      base_url: default_base_url(),
      timeout:  default_timeout(),
    }
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Async client for Gemini visit sheet transcription.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based. Without an
/// API key every request fails as [`TranscribeFailure::Unavailable`].
#[derive(Clone)]
pub struct GeminiClient {
  client: Client,
  config: GeminiConfig,
}

impl GeminiClient {
  pub fn new(config: GeminiConfig) -> reqwest::Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout))
      .build()?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!(
      "{}/v1beta/models/{}:generateContent",
      self.config.base_url.trim_end_matches('/'),
      self.config.model
    )
  }
}

/// The `generateContent` request body for `images`.
fn request_body(images: &[ImageInput]) -> Value {
  let mut parts: Vec<Value> = images
    .iter()
    .map(|image| {
      json!({
        "inline_data": {
          "mime_type": image.media_type,
          "data": B64.encode(&image.bytes),
        }
      })
    })
    .collect();
  parts.push(json!({ "text": PROMPT }));

  json!({
    "contents": [{ "role": "user", "parts": parts }],
    "generationConfig": {
      "temperature": TEMPERATURE,
      "topP": TOP_P,
      "maxOutputTokens": MAX_OUTPUT_TOKENS,
      "responseMimeType": "application/json",
    },
  })
}

/// Map a non-success HTTP status to a failure kind.
fn classify(status: StatusCode, body: &str) -> TranscribeFailure {
  match status {
    StatusCode::TOO_MANY_REQUESTS => TranscribeFailure::QuotaExceeded,
    StatusCode::SERVICE_UNAVAILABLE => TranscribeFailure::Unavailable,
    _ if body.contains("RESOURCE_EXHAUSTED") => TranscribeFailure::QuotaExceeded,
    _ => TranscribeFailure::Request,
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
  text: Option<String>,
}

/// The concatenated text of the first candidate.
fn reply_text(response: GenerateResponse) -> Option<String> {
  let content = response.candidates.into_iter().next()?.content?;
  let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
  (!text.trim().is_empty()).then_some(text)
}

impl Transcriber for GeminiClient {
  async fn transcribe(&self, images: Vec<ImageInput>) -> Result<Value, TranscribeError> {
    if self.config.api_key.trim().is_empty() {
      return Err(TranscribeError::new(
        TranscribeFailure::Unavailable,
        "transcription is not configured",
      ));
    }
    let request_failed = |e: reqwest::Error| {
      let kind = if e.is_timeout() {
        TranscribeFailure::Unavailable
      } else {
        TranscribeFailure::Request
      };
      TranscribeError::new(kind, format!("gemini request failed: {e}"))
    };

    debug!(images = images.len(), model = %self.config.model, "sending transcription request");
    let resp = self
      .client
      .post(self.url())
      .header("x-goog-api-key", &self.config.api_key)
      .json(&request_body(&images))
      .send()
      .await
      .map_err(request_failed)?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      let kind = classify(status, &body);
      warn!(%status, ?kind, "gemini returned an error");
      return Err(TranscribeError::new(kind, format!("gemini returned {status}")));
    }

    let response: GenerateResponse = resp.json().await.map_err(|e| {
      TranscribeError::new(TranscribeFailure::MalformedResponse, format!("decoding response: {e}"))
    })?;
    let text = reply_text(response).ok_or_else(|| {
      TranscribeError::new(TranscribeFailure::MalformedResponse, "gemini returned no text")
    })?;
    parse_reply(&text)
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use axum::{Json, Router, http::StatusCode as AxumStatus, routing::post};

  use super::*;

  fn image() -> ImageInput {
    ImageInput { media_type: "image/jpeg".into(), bytes: b"sheet".to_vec() }
  }

  #[test]
  fn body_carries_images_prompt_and_generation_config() {
    let body = request_body(&[image(), image()]);
    let parts = body["contents"][0]["parts"].as_array().unwrap();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0]["inline_data"]["mime_type"], "image/jpeg");
    assert_eq!(parts[0]["inline_data"]["data"], B64.encode(b"sheet"));
    assert!(parts[2]["text"].as_str().unwrap().contains("storeNbr"));

    let config = &body["generationConfig"];
    assert_eq!(config["temperature"], 0.1);
    assert_eq!(config["topP"], 0.85);
    assert_eq!(config["maxOutputTokens"], 8192);
    assert_eq!(config["responseMimeType"], "application/json");
  }

  #[test]
  fn statuses_classify() {
    assert_eq!(classify(StatusCode::TOO_MANY_REQUESTS, ""), TranscribeFailure::QuotaExceeded);
    assert_eq!(classify(StatusCode::SERVICE_UNAVAILABLE, ""), TranscribeFailure::Unavailable);
    assert_eq!(
      classify(StatusCode::FORBIDDEN, r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#),
      TranscribeFailure::QuotaExceeded
    );
    assert_eq!(classify(StatusCode::BAD_REQUEST, "bad"), TranscribeFailure::Request);
  }

  #[test]
  fn reply_text_joins_first_candidate_parts() {
    let response: GenerateResponse = serde_json::from_value(json!({
      "candidates": [
        { "content": { "parts": [{ "text": "{\"rating\":" }, { "text": "\"Red\"}" }] } },
        { "content": { "parts": [{ "text": "ignored" }] } },
      ]
    }))
    .unwrap();
    assert_eq!(reply_text(response).unwrap(), "{\"rating\":\"Red\"}");

    let empty: GenerateResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
    assert!(reply_text(empty).is_none());
  }

  #[tokio::test]
  async fn missing_api_key_is_unavailable() {
    let client = GeminiClient::new(GeminiConfig::default()).unwrap();
    let err = client.transcribe(vec![image()]).await.unwrap_err();
    assert_eq!(err.kind, TranscribeFailure::Unavailable);
  }

  /// Serve `router` on an ephemeral port and return a client pointed at it.
  async fn client_for(router: Router) -> GeminiClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    GeminiClient::new(GeminiConfig {
      api_key: "test-key".into(),
      base_url: format!("http://{addr}"),
      ..GeminiConfig::default()
    })
    .unwrap()
  }

  #[tokio::test]
  async fn fenced_reply_is_parsed() {
    let router = Router::new().route(
      "/v1beta/models/gemini-2.5-flash:generateContent",
      post(|| async {
        Json(json!({
          "candidates": [{ "content": { "parts": [
            { "text": "```json\n{\"storeNbr\": \"2508\", \"rating\": \"G\"}\n```" }
          ] } }]
        }))
      }),
    );
    let client = client_for(router).await;
    let value = client.transcribe(vec![image()]).await.unwrap();
    assert_eq!(value["storeNbr"], "2508");
  }

  #[tokio::test]
  async fn quota_and_unavailable_are_distinct() {
    for (status, expected) in [
      (AxumStatus::TOO_MANY_REQUESTS, TranscribeFailure::QuotaExceeded),
      (AxumStatus::SERVICE_UNAVAILABLE, TranscribeFailure::Unavailable),
      (AxumStatus::INTERNAL_SERVER_ERROR, TranscribeFailure::Request),
    ] {
      let router = Router::new().route(
        "/v1beta/models/gemini-2.5-flash:generateContent",
        post(move || async move { (status, "nope") }),
      );
      let client = client_for(router).await;
      let err = client.transcribe(vec![image()]).await.unwrap_err();
      assert_eq!(err.kind, expected);
    }
  }

  #[tokio::test]
  async fn non_object_reply_is_malformed() {
    let router = Router::new().route(
      "/v1beta/models/gemini-2.5-flash:generateContent",
      post(|| async {
        Json(json!({ "candidates": [{ "content": { "parts": [{ "text": "[1, 2]" }] } }] }))
      }),
    );
    let client = client_for(router).await;
    let err = client.transcribe(vec![image()]).await.unwrap_err();
    assert_eq!(err.kind, TranscribeFailure::MalformedResponse);
  }
}
