//! Text-generation endpoint client (Gemini `generateContent` contract).
//!
//! The `TextGenerator` trait is the seam: detection recommendations and the
//! agronomy chat both go through it, and tests swap in `MockTextGenerator`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::resolve_api_key;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Text generation is not configured (no API key)")]
    NotConfigured,

    #[error("HTTP client error: {0}")]
    Transport(String),

    #[error("Generation endpoint returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

// ═══════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════

/// Request body for `POST /v1beta/models/{model}:generateContent`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// Single-turn request carrying one prompt.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                role: None,
                parts: vec![Part::text(prompt)],
            }],
            generation_config: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Response body. Everything is optional so partial payloads still parse.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// First non-empty text part, scanning candidates and parts in order.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .find(|text| !text.trim().is_empty())
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".into()),
                    parts: vec![Part::text(text)],
                }),
            }],
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Client seam
// ═══════════════════════════════════════════════════════════

/// Remote text-generation abstraction (allows mocking).
pub trait TextGenerator: Send + Sync {
    /// Whether a usable credential is present. No network access.
    fn is_configured(&self) -> bool;

    /// Issue exactly one request. No retry.
    fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError>;
}

/// HTTP client for the hosted Gemini API.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    /// Build a client. A blank or placeholder key leaves the client unconfigured.
    /// No request timeout is set beyond the transport default.
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: resolve_api_key(api_key),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

impl TextGenerator for GeminiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let key = self.api_key.as_deref().ok_or(GenerationError::NotConfigured)?;

        // Key travels in a header so it never appears in logged URLs.
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(request)
            .send()
            .map_err(|e| GenerationError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<GenerateContentResponse>()
            .map_err(|e| GenerationError::ResponseParsing(e.without_url().to_string()))
    }
}

// ═══════════════════════════════════════════════════════════
// Test double
// ═══════════════════════════════════════════════════════════

/// Mock generator for testing: returns a configurable outcome and counts calls.
#[cfg(test)]
pub struct MockTextGenerator {
    configured: bool,
    outcome: MockOutcome,
    calls: std::sync::atomic::AtomicUsize,
    last_request: std::sync::Mutex<Option<GenerateContentRequest>>,
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Text(String),
    EmptyResponse,
    Status(u16),
    Transport,
}

#[cfg(test)]
impl MockTextGenerator {
    pub fn replying(text: &str) -> Self {
        Self::with_outcome(MockOutcome::Text(text.to_string()))
    }

    pub fn with_outcome(outcome: MockOutcome) -> Self {
        Self {
            configured: true,
            outcome,
            calls: std::sync::atomic::AtomicUsize::new(0),
            last_request: std::sync::Mutex::new(None),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::replying("unused")
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerateContentRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TextGenerator for MockTextGenerator {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if !self.configured {
            return Err(GenerationError::NotConfigured);
        }
        match &self.outcome {
            MockOutcome::Text(text) => Ok(GenerateContentResponse::from_text(text.clone())),
            MockOutcome::EmptyResponse => Ok(GenerateContentResponse::default()),
            MockOutcome::Status(status) => Err(GenerationError::Status {
                status: *status,
                body: "mock failure".into(),
            }),
            MockOutcome::Transport => Err(GenerationError::Transport("connection refused".into())),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_wire_shape() {
        let mut request = GenerateContentRequest::from_prompt("hello");
        request.generation_config = Some(GenerationConfig {
            max_output_tokens: 500,
            temperature: 0.3,
        });
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert!(json["contents"][0].get("role").is_none());
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 500);
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn generation_config_omitted_when_absent() {
        let json = serde_json::to_value(GenerateContentRequest::from_prompt("x")).unwrap();
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn first_text_skips_empty_and_missing_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r###"{"candidates":[
                {"finishReason":"SAFETY"},
                {"content":{"parts":[{"inlineData":{}},{"text":"  "}]}},
                {"content":{"role":"model","parts":[{"text":"## Immediate Actions"}]}}
            ]}"###,
        )
        .unwrap();
        assert_eq!(response.first_text(), Some("## Immediate Actions"));
    }

    #[test]
    fn first_text_none_for_empty_response() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.first_text(), None);
    }

    #[test]
    fn client_trims_trailing_slash_and_builds_endpoint() {
        let client = GeminiClient::new("https://api.example/", "gemini-2.0-flash", None).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://api.example/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(client.model(), "gemini-2.0-flash");
    }

    #[test]
    fn placeholder_key_leaves_client_unconfigured() {
        let client = GeminiClient::new(
            "https://api.example",
            "m",
            Some(crate::config::PLACEHOLDER_API_KEY.into()),
        )
        .unwrap();
        assert!(!client.is_configured());
        let err = client
            .generate(&GenerateContentRequest::from_prompt("x"))
            .unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured));
    }

    #[test]
    fn successful_response_parses_text_and_sends_key_header() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Spray copper."}]}}]}"#;
        let (base, handle) = test_server::serve_once("200 OK", body.to_string());
        let client = GeminiClient::new(&base, "gemini-2.0-flash", Some("secret-key".into())).unwrap();

        let response = client
            .generate(&GenerateContentRequest::from_prompt("treat rust"))
            .unwrap();
        assert_eq!(response.first_text(), Some("Spray copper."));

        let raw_request = handle.join().unwrap();
        assert!(raw_request.starts_with("POST /v1beta/models/gemini-2.0-flash:generateContent"));
        assert!(raw_request.to_ascii_lowercase().contains("x-goog-api-key: secret-key"));
        assert!(raw_request.contains("treat rust"));
    }

    #[test]
    fn server_error_maps_to_status_error() {
        let (base, handle) =
            test_server::serve_once("500 Internal Server Error", r#"{"error":"boom"}"#.into());
        let client = GeminiClient::new(&base, "m", Some("k".into())).unwrap();

        let err = client
            .generate(&GenerateContentRequest::from_prompt("x"))
            .unwrap_err();
        match err {
            GenerationError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
        handle.join().unwrap();
    }

    #[test]
    fn malformed_body_maps_to_parse_error() {
        let (base, handle) = test_server::serve_once("200 OK", "not json".into());
        let client = GeminiClient::new(&base, "m", Some("k".into())).unwrap();
        let err = client
            .generate(&GenerateContentRequest::from_prompt("x"))
            .unwrap_err();
        assert!(matches!(err, GenerationError::ResponseParsing(_)));
        handle.join().unwrap();
    }

    #[test]
    fn mock_counts_calls_and_records_request() {
        let mock = MockTextGenerator::replying("ok");
        let request = GenerateContentRequest::from_prompt("p");
        let response = mock.generate(&request).unwrap();
        assert_eq!(response.first_text(), Some("ok"));
        assert_eq!(mock.call_count(), 1);
        assert_eq!(mock.last_request(), Some(request));
    }
}
