//! OpenAI-compatible chat completion client.
//!
//! Supports full and incremental (SSE) response modes. Message content is a
//! tagged union of parts; the dict-shaped wire format exists only at the
//! request boundary.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// One part of a message's content.
#[derive(Debug, Clone)]
pub enum ContentPart {
    Text(String),
    Image { data_url: String },
}

impl ContentPart {
    /// The text component, if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            ContentPart::Image { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self { role, content: vec![ContentPart::Text(text.into())] }
    }
}

/// Token accounting attached to the final response/chunk.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// One increment of a streamed response.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub delta: Option<String>,
    pub usage: Option<Usage>,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, LlmError>> + Send>>;

#[derive(Debug)]
pub enum LlmError {
    Http(String),
    Api(String),
    Parse(String),
    Empty,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::Http(e) => write!(f, "HTTP error: {e}"),
            LlmError::Api(e) => write!(f, "API error: {e}"),
            LlmError::Parse(e) => write!(f, "Parse error: {e}"),
            LlmError::Empty => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for LlmError {}

pub struct ChatClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        max_tokens: u32,
        proxy: Option<&str>,
    ) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder().timeout(std::time::Duration::from_secs(120));
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| LlmError::Http(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| LlmError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
            http,
        })
    }

    /// Full-response mode.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
    ) -> Result<(String, Option<Usage>), LlmError> {
        let request = self.build_request(messages, false);
        let response = self.send(&request).await?;

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::Empty)?;

        Ok((text, parsed.usage))
    }

    /// Incremental-chunk mode. Each chunk carries an optional text delta and
    /// an optional final usage record.
    pub async fn stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, LlmError> {
        let request = self.build_request(messages, true);
        let response = self.send(&request).await?;

        let chunks = response.bytes_stream().eventsource().filter_map(|event| async move {
            match event {
                Ok(event) if event.data == "[DONE]" => None,
                Ok(event) => Some(parse_chunk(&event.data)),
                Err(e) => Some(Err(LlmError::Http(e.to_string()))),
            }
        });

        Ok(Box::pin(chunks))
    }

    async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{status}: {body}")));
        }
        Ok(response)
    }

    fn build_request(&self, messages: &[ChatMessage], stream: bool) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: messages.iter().map(to_wire_message).collect(),
            stream: stream.then_some(true),
            stream_options: stream.then_some(StreamOptions { include_usage: true }),
        }
    }
}

fn parse_chunk(data: &str) -> Result<StreamChunk, LlmError> {
    let chunk: ApiChunk =
        serde_json::from_str(data).map_err(|e| LlmError::Parse(e.to_string()))?;
    Ok(StreamChunk {
        delta: chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content),
        usage: chunk.usage,
    })
}

// ---- wire types ----

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: WireContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: WireImageUrl },
}

#[derive(Serialize)]
struct WireImageUrl {
    url: String,
    detail: &'static str,
}

fn to_wire_message(msg: &ChatMessage) -> WireMessage {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };

    // Plain string for text-only messages, parts array otherwise.
    let content = match msg.content.as_slice() {
        [ContentPart::Text(text)] => WireContent::Text(text.clone()),
        parts => WireContent::Parts(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => WirePart::Text { text: text.clone() },
                    ContentPart::Image { data_url } => WirePart::ImageUrl {
                        image_url: WireImageUrl { url: data_url.clone(), detail: "low" },
                    },
                })
                .collect(),
        ),
    };

    WireMessage { role, content }
}

// ---- response types ----

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiChunk {
    #[serde(default)]
    choices: Vec<ApiChunkChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ApiChunkChoice {
    #[serde(default)]
    delta: ApiDelta,
}

#[derive(Deserialize, Default)]
struct ApiDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_serializes_as_string() {
        let msg = ChatMessage::text(Role::User, "hello");
        let wire = to_wire_message(&msg);
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn test_image_message_serializes_as_parts() {
        let msg = ChatMessage {
            role: Role::User,
            content: vec![
                ContentPart::Text("look".to_string()),
                ContentPart::Image { data_url: "data:image/jpeg;base64,AAAA".to_string() },
            ],
        };
        let json = serde_json::to_value(to_wire_message(&msg)).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "look");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "data:image/jpeg;base64,AAAA"
        );
        assert_eq!(json["content"][1]["image_url"]["detail"], "low");
    }

    #[test]
    fn test_parse_delta_chunk() {
        let chunk = parse_chunk(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(chunk.delta.as_deref(), Some("Hi"));
        assert!(chunk.usage.is_none());
    }

    #[test]
    fn test_parse_usage_chunk() {
        let chunk = parse_chunk(
            r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        )
        .unwrap();
        assert!(chunk.delta.is_none());
        let usage = chunk.usage.unwrap();
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_empty_delta_chunk() {
        let chunk = parse_chunk(r#"{"choices":[{"delta":{}}]}"#).unwrap();
        assert!(chunk.delta.is_none());
    }

    #[test]
    fn test_malformed_chunk_is_error() {
        assert!(parse_chunk("not json").is_err());
    }

    #[test]
    fn test_stream_request_shape() {
        let client = ChatClient::new("https://api.example.com/v1", "key", "model-x", 1000, None)
            .unwrap();
        let request = client.build_request(&[ChatMessage::text(Role::User, "q")], true);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["stream_options"]["include_usage"], true);
        assert_eq!(json["max_tokens"], 1000);
    }

    #[test]
    fn test_full_request_omits_stream_fields() {
        let client = ChatClient::new("https://api.example.com/v1", "key", "model-x", 1000, None)
            .unwrap();
        let request = client.build_request(&[ChatMessage::text(Role::User, "q")], false);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("stream").is_none());
        assert!(json.get("stream_options").is_none());
    }
}
