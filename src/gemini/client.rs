use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use crate::gemini::types::*;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini REST client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            });

        let base_url = base_url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            client,
            api_key,
            base_url,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let response = self
            .client
            .post(self.endpoint(model))
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))
    }
}

pub fn build_text_request(request: &TextRequest) -> GenerateContentRequest {
    let generation_config = request.fast.then(|| GenerationConfig {
        thinking_config: Some(ThinkingConfig { thinking_budget: 0 }),
        ..Default::default()
    });

    GenerateContentRequest {
        contents: vec![user_content(&request.prompt)],
        generation_config,
    }
}

pub fn build_image_request(request: &ImageRequest) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![user_content(&request.prompt)],
        generation_config: Some(GenerationConfig {
            image_config: Some(ImageConfig {
                aspect_ratio: request.aspect_ratio.clone(),
            }),
            response_modalities: Some(vec!["IMAGE".to_string()]),
            ..Default::default()
        }),
    }
}

fn user_content(prompt: &str) -> Content {
    Content {
        role: Some("user".to_string()),
        parts: vec![Part {
            text: Some(prompt.to_string()),
            inline_data: None,
        }],
    }
}

/// Decode the first inline image of a response
pub fn extract_inline_image(
    response: &GenerateContentResponse,
) -> Result<Option<InlineImage>, GenerationError> {
    let Some(inline) = response.first_inline_data() else {
        return Ok(None);
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(inline.data.trim())
        .map_err(|e| GenerationError::InvalidResponse(format!("bad image payload: {}", e)))?;

    Ok(Some(InlineImage {
        mime_type: inline
            .mime_type
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "image/png".to_string()),
        bytes,
    }))
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn generate_text(&self, request: TextRequest) -> Result<String, GenerationError> {
        let body = build_text_request(&request);
        let response = self.generate_content(&request.model, &body).await?;
        Ok(response.text())
    }

    async fn generate_image(
        &self,
        request: ImageRequest,
    ) -> Result<Option<InlineImage>, GenerationError> {
        let body = build_image_request(&request);
        let response = self.generate_content(&request.model, &body).await?;
        extract_inline_image(&response)
    }
}
