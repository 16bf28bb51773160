//! OpenAI chat-completions client implementation.

use std::time::Duration;

use base64::Engine;
use reqwest::Client;

use artesia_core::{ConversionOutput, ImageFormat};

use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ContentPart, ErrorResponse,
    ImageUrl,
};
use crate::{TransformError, TransformationService};

/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default completion budget.
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Instruction appended to every style prompt.
const TRANSFORM_INSTRUCTION: &str = "Please transform this image according to the style \
described above. Return a detailed description of how the image would look when transformed \
into this artistic style.";

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiTransformer {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiTransformer {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `"https://api.openai.com/v1"`
    /// * `api_key` - secret API key
    /// * `model` - vision-capable chat model
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with default settings).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Override the completion budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_request(&self, prompt: &str, image: &[u8], format: ImageFormat) -> ChatCompletionRequest {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: format!("{prompt}\n\n{TRANSFORM_INSTRUCTION}"),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{};base64,{encoded}", format.mime_type()),
                            detail: "high",
                        },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
        }
    }

    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> Result<ConversionOutput, TransformError> {
        let status = response.status();

        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => match body.error.error_type {
                    Some(kind) => format!("{kind}: {}", body.error.message),
                    None => body.error.message,
                },
                Err(_) => format!("HTTP {status}"),
            };
            return Err(TransformError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| TransformError::MalformedResponse(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TransformError::MalformedResponse("no choices in response".into()))?;

        let description = choice
            .message
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(TransformError::EmptyResult)?;

        Ok(ConversionOutput {
            description,
            model: body.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

#[async_trait::async_trait]
impl TransformationService for OpenAiTransformer {
    async fn transform(
        &self,
        prompt: &str,
        image: &[u8],
        format: ImageFormat,
    ) -> Result<ConversionOutput, TransformError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self.build_request(prompt, image, format);

        tracing::debug!(
            model = %self.model,
            image_bytes = image.len(),
            "Sending transformation request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    fn client(server: &MockServer) -> OpenAiTransformer {
        OpenAiTransformer::new(server.uri(), "sk-test", DEFAULT_MODEL)
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-4o", "max_tokens": 500 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gpt-4o-2024-08-06",
                "choices": [{ "message": { "role": "assistant", "content": "  A luminous oil harbour.  " } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = client(&server)
            .transform("Paint it in oils", JPEG, ImageFormat::Jpeg)
            .await
            .unwrap();

        assert_eq!(output.description, "A luminous oil harbour.");
        assert_eq!(output.model, "gpt-4o-2024-08-06");
    }

    #[tokio::test]
    async fn request_carries_prompt_and_data_url() {
        let transformer = OpenAiTransformer::new("http://unused", "k", "gpt-4o");
        let request = transformer.build_request("Paint it", JPEG, ImageFormat::Jpeg);
        let body = serde_json::to_value(&request).unwrap();

        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert!(content[0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Paint it\n\nPlease transform this image"));
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["detail"], "high");
        assert_eq!(
            content[1]["image_url"]["url"],
            "data:image/jpeg;base64,/9j/4AAQ"
        );
    }

    #[tokio::test]
    async fn api_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "Rate limit reached", "type": "rate_limit_error" }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .transform("p", JPEG, ImageFormat::Jpeg)
            .await
            .unwrap_err();

        match err {
            TransformError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate_limit_error: Rate limit reached");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_content_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": null } }]
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .transform("p", JPEG, ImageFormat::Jpeg)
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::EmptyResult));
    }

    #[tokio::test]
    async fn missing_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = client(&server)
            .transform("p", JPEG, ImageFormat::Jpeg)
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server)
            .transform("p", JPEG, ImageFormat::Jpeg)
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::MalformedResponse(_)));
    }
}
