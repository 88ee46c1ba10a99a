//! OpenRouter chat-completions client: request composition, submission,
//! response interpretation, and the image download path.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Fixed chat-completions endpoint.
pub const CHAT_COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
/// Fixed target model.
pub const MODEL: &str = "google/gemini-2.5-flash-image-preview";
/// Descriptive headers sent with every generation request.
pub const REFERER: &str = "https://github.com/keinakamura/gazou";
pub const CLIENT_TITLE: &str = "Gazou Image Chat";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Message extracted from the API error body, or synthesized from the
    /// HTTP status when the body carries none.
    #[error("{0}")]
    Api(String),

    #[error("No response from API")]
    NoResponse,

    #[error("Invalid response format")]
    InvalidFormat,

    #[error("No readable content in response")]
    NoContent,

    #[error("Failed to download image")]
    Download,

    #[error("{0}")]
    Network(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;

// ---- wire types ------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: &'static str,
    messages: Vec<RequestMessage>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<ResponseImage>>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseImage {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub image_url: Option<ResponseImageUrl>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseImageUrl {
    #[serde(default)]
    pub url: Option<String>,
}

// ---- interpretation --------------------------------------------------------

/// One renderable piece of a generation result, in response order.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedPart {
    /// Plain text, rendered literally (no markup interpretation).
    Text(String),
    /// An image descriptor with its synthesized download filename.
    Image { url: String, filename: String },
}

/// Walk the response body into renderable parts, or one of the three fixed
/// shape errors.
pub fn interpret_response(response: ChatResponse) -> Result<Vec<RenderedPart>> {
    let choice = response.choices.into_iter().next().ok_or(ChatError::NoResponse)?;
    let message = choice.message.ok_or(ChatError::InvalidFormat)?;

    let mut parts = Vec::new();

    if let Some(text) = message.content {
        if !text.is_empty() {
            parts.push(RenderedPart::Text(text));
        }
    }

    for image in message.images.unwrap_or_default() {
        if image.kind.as_deref() != Some("image_url") {
            continue;
        }
        let Some(url) = image.image_url.and_then(|u| u.url) else {
            continue;
        };
        // The timestamp is taken per image at render time, not per response;
        // two images interpreted in the same millisecond collide.
        let filename = format!(
            "generated-image-{}.png",
            chrono::Utc::now().timestamp_millis()
        );
        parts.push(RenderedPart::Image { url, filename });
    }

    if parts.is_empty() {
        return Err(ChatError::NoContent);
    }
    Ok(parts)
}

// ---- client ----------------------------------------------------------------

pub struct Client {
    http: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Submit one generation request. `images` is the ordered list of
    /// (mime type, base64 payload) pairs for every image whose payload has
    /// resolved; callers skip still-pending images before getting here.
    pub async fn generate(
        &self,
        credential: &str,
        prompt: &str,
        images: &[(String, String)],
    ) -> Result<ChatResponse> {
        let mut content = vec![ContentPart::Text {
            text: prompt.to_string(),
        }];
        for (mime, payload) in images {
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", mime, payload),
                },
            });
        }

        let body = ChatRequest {
            model: MODEL,
            messages: vec![RequestMessage {
                role: "user",
                content,
            }],
        };

        tracing::debug!("Submitting generation request with {} image(s)", images.len());

        let response = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(credential)
            .header("HTTP-Referer", REFERER)
            .header("X-Title", CLIENT_TITLE)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            return Err(ChatError::Api(message));
        }

        Ok(response.json().await?)
    }

    /// Re-fetch a rendered image URL as binary and write it under `dir` with
    /// the part's filename. Any failure collapses to the generic download
    /// error; there is no retry.
    pub async fn download(&self, url: &str, dir: &Path, filename: &str) -> Result<PathBuf> {
        let bytes = self.fetch_image_bytes(url).await?;
        let dest = dir.join(filename);
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|_| ChatError::Download)?;
        Ok(dest)
    }

    async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>> {
        // Generated images commonly come back inline as data URIs, which an
        // HTTP client cannot dereference.
        if let Some(rest) = url.strip_prefix("data:") {
            let payload = rest.split_once(";base64,").map(|(_, p)| p).ok_or(ChatError::Download)?;
            return base64::engine::general_purpose::STANDARD
                .decode(payload)
                .map_err(|_| ChatError::Download);
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|_| ChatError::Download)?;
        if !response.status().is_success() {
            return Err(ChatError::Download);
        }
        let bytes = response.bytes().await.map_err(|_| ChatError::Download)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_from(value: serde_json::Value) -> ChatResponse {
        serde_json::from_value(value).unwrap()
    }

    fn filename_matches(filename: &str) -> bool {
        filename
            .strip_prefix("generated-image-")
            .and_then(|rest| rest.strip_suffix(".png"))
            .map(|stamp| !stamp.is_empty() && stamp.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    }

    #[test]
    fn test_text_and_image_render_as_two_parts() {
        let response = response_from(serde_json::json!({
            "choices": [{
                "message": {
                    "content": "hi",
                    "images": [
                        {"type": "image_url", "image_url": {"url": "http://x/a.png"}}
                    ]
                }
            }]
        }));

        let parts = interpret_response(response).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], RenderedPart::Text("hi".to_string()));
        match &parts[1] {
            RenderedPart::Image { url, filename } => {
                assert_eq!(url, "http://x/a.png");
                assert!(filename_matches(filename), "bad filename: {}", filename);
            }
            other => panic!("expected image part, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_choices_is_no_response() {
        let response = response_from(serde_json::json!({ "choices": [] }));
        assert!(matches!(interpret_response(response), Err(ChatError::NoResponse)));

        let response = response_from(serde_json::json!({}));
        assert!(matches!(interpret_response(response), Err(ChatError::NoResponse)));
    }

    #[test]
    fn test_null_message_is_invalid_format() {
        let response = response_from(serde_json::json!({ "choices": [{ "message": null }] }));
        assert!(matches!(interpret_response(response), Err(ChatError::InvalidFormat)));
    }

    #[test]
    fn test_message_without_content_or_images_is_no_content() {
        let response = response_from(serde_json::json!({ "choices": [{ "message": {} }] }));
        assert!(matches!(interpret_response(response), Err(ChatError::NoContent)));

        // An empty content string does not count as readable content.
        let response = response_from(serde_json::json!({
            "choices": [{ "message": { "content": "" } }]
        }));
        assert!(matches!(interpret_response(response), Err(ChatError::NoContent)));
    }

    #[test]
    fn test_image_descriptors_missing_url_are_skipped() {
        let response = response_from(serde_json::json!({
            "choices": [{
                "message": {
                    "content": "text",
                    "images": [
                        {"type": "image_url"},
                        {"type": "something_else", "image_url": {"url": "http://x/b.png"}},
                        {"type": "image_url", "image_url": {"url": "http://x/c.png"}}
                    ]
                }
            }]
        }));

        let parts = interpret_response(response).unwrap();
        let urls: Vec<&str> = parts
            .iter()
            .filter_map(|p| match p {
                RenderedPart::Image { url, .. } => Some(url.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(urls, vec!["http://x/c.png"]);
    }

    #[test]
    fn test_error_taxonomy_messages() {
        assert_eq!(ChatError::NoResponse.to_string(), "No response from API");
        assert_eq!(ChatError::InvalidFormat.to_string(), "Invalid response format");
        assert_eq!(ChatError::NoContent.to_string(), "No readable content in response");
        assert_eq!(ChatError::Download.to_string(), "Failed to download image");
        assert_eq!(
            ChatError::Api("HTTP error! status: 500".to_string()).to_string(),
            "HTTP error! status: 500"
        );
    }
}
