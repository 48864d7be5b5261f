use base64::Engine;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::content::{ContentType, Platform};
use crate::gemini::types::*;

pub const DRAFT_FALLBACK: &str = "Failed to generate draft.";
pub const THUMBNAIL_ASPECT_RATIO: &str = "16:9";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub text_model: String,
    pub image_model: String,
    pub timeout: Duration,
}

/// Draft, thumbnail and idea generation on top of a `GenerationBackend`
pub struct GenerationGateway {
    backend: Arc<dyn GenerationBackend>,
    config: GatewayConfig,
}

impl GenerationGateway {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: GatewayConfig) -> Self {
        Self { backend, config }
    }

    pub fn has_credential(&self) -> bool {
        self.backend.has_credential()
    }

    fn ensure_credential(&self) -> Result<(), GenerationError> {
        if self.backend.has_credential() {
            Ok(())
        } else {
            Err(GenerationError::MissingCredential)
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, GenerationError>
    where
        F: Future<Output = Result<T, GenerationError>>,
    {
        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.config.timeout)),
        }
    }

    /// Generate a full draft script or article
    pub async fn generate_draft(
        &self,
        topic: &str,
        content_type: ContentType,
        platform: Platform,
        research_notes: &str,
    ) -> Result<String, GenerationError> {
        self.ensure_credential()?;

        let request = TextRequest {
            model: self.config.text_model.clone(),
            prompt: build_draft_prompt(topic, content_type, platform, research_notes),
            fast: true,
        };

        let text = self
            .bounded(self.backend.generate_text(request))
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "draft generation failed"))?;

        if text.trim().is_empty() {
            return Ok(DRAFT_FALLBACK.to_string());
        }
        Ok(text)
    }

    /// Ask for an image prompt, then render it. Returns a `data:` reference.
    pub async fn generate_thumbnail(
        &self,
        topic: &str,
        platform: Platform,
    ) -> Result<String, GenerationError> {
        self.ensure_credential()?;

        let prompt_request = TextRequest {
            model: self.config.text_model.clone(),
            prompt: build_thumbnail_prompt_request(topic, platform),
            fast: false,
        };
        let image_prompt = self
            .bounded(self.backend.generate_text(prompt_request))
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "thumbnail prompt generation failed"))?;

        let image_prompt = if image_prompt.trim().is_empty() {
            format!("High quality thumbnail for {}", topic)
        } else {
            image_prompt.trim().to_string()
        };
        tracing::debug!(prompt_len = image_prompt.len(), "rendering thumbnail");

        let image_request = ImageRequest {
            model: self.config.image_model.clone(),
            prompt: image_prompt,
            aspect_ratio: THUMBNAIL_ASPECT_RATIO.to_string(),
        };
        let image = self
            .bounded(self.backend.generate_image(image_request))
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "thumbnail rendering failed"))?
            .ok_or(GenerationError::NoImage)?;

        Ok(to_data_url(&image))
    }

    /// Three content angles from free-form research notes
    pub async fn suggest_ideas(&self, notes: &str) -> Result<String, GenerationError> {
        self.ensure_credential()?;

        let request = TextRequest {
            model: self.config.text_model.clone(),
            prompt: build_ideas_prompt(notes),
            fast: false,
        };

        self.bounded(self.backend.generate_text(request))
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "idea suggestion failed"))
    }
}

pub fn to_data_url(image: &InlineImage) -> String {
    format!(
        "data:{};base64,{}",
        image.mime_type,
        base64::engine::general_purpose::STANDARD.encode(&image.bytes)
    )
}

fn platform_guidance(platform: Platform) -> &'static str {
    match platform {
        Platform::YouTube => {
            "- Structure it as a YouTube script: open with a strong hook, mark sections with timestamps (00:00), and add visual cues in brackets."
        }
        Platform::Substack => {
            "- Structure it as a Substack post: engaging headings, bullet points, and a strong intro and outro."
        }
        Platform::Both => {
            "- If it's for YouTube, include timestamps (00:00), visual cues, and a hook.\n- If it's for Substack, use engaging headings, bullet points, and a strong intro/outro."
        }
    }
}

pub fn build_draft_prompt(
    topic: &str,
    content_type: ContentType,
    platform: Platform,
    research_notes: &str,
) -> String {
    format!(
        r#"You are an expert content creator assistant.
Task: Create a detailed draft for a {platform} {kind}.
Topic: {topic}

Research Context:
{notes}

Guidelines:
{guidance}
- Tone: Professional yet engaging and authentic."#,
        platform = platform.as_str(),
        kind = content_type.as_str(),
        topic = topic,
        notes = research_notes,
        guidance = platform_guidance(platform),
    )
}

pub fn build_thumbnail_prompt_request(topic: &str, platform: Platform) -> String {
    format!(
        r#"Write a high-quality, descriptive image generation prompt for a {} thumbnail about "{}".
The style should be modern, high-contrast, clickable, and suitable for a content creator.
Frame the composition for a 16:9 landscape image.
Do not include text in the image description, just the visual elements.
Return ONLY the prompt string."#,
        platform.as_str(),
        topic
    )
}

pub fn build_ideas_prompt(notes: &str) -> String {
    format!(
        r#"Analyze these research notes and suggest exactly 3 unique content angles:
1. One long-form YouTube Video
2. One Substack Article
3. One Short

Notes:
{}"#,
        notes
    )
}
