use anyhow::{Context, Result};
use base64::Engine;
use reqwest::Client;
use serde_json::{Value, json};

use super::{AiClient, Platform, SeoResult, build_image_prompt, build_seo_prompt, parse_seo_response};
use crate::config::GenerationConfig;
use crate::queue::ImagePayload;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Lower temperature keeps tags precise.
const SEO_TEMPERATURE: f64 = 0.4;
/// Higher temperature for more creative prompt wording.
const PROMPT_TEMPERATURE: f64 = 0.7;

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiClient {
    /// `api_key` is the default credential; a non-empty
    /// [`GenerationConfig::api_key`] takes precedence per request.
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: Client::new(),
        }
    }

    /// Build a client whose default key comes from `GEMINI_API_KEY` or `API_KEY`.
    pub fn from_env(model: Option<String>) -> Self {
        let api_key = ["GEMINI_API_KEY", "API_KEY"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_default();
        Self::new(api_key, model.unwrap_or_else(|| DEFAULT_MODEL.to_string()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Pick the per-request credential.
    fn resolve_key<'a>(&'a self, config: &'a GenerationConfig) -> Result<&'a str> {
        if let Some(key) = config.api_key_override() {
            return Ok(key);
        }
        if self.api_key.is_empty() {
            anyhow::bail!("No Gemini API key configured");
        }
        Ok(&self.api_key)
    }

    async fn generate(&self, api_key: &str, body: &Value) -> Result<String> {
        let url = format!("{API_BASE}/{}:generateContent", self.model);

        let resp = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("Failed to read Gemini response")?;

        if !status.is_success() {
            anyhow::bail!("Gemini API error ({}): {}", status, text);
        }

        let json: Value =
            serde_json::from_str(&text).context("Failed to parse Gemini response JSON")?;

        response_text(&json).context("No response from AI")
    }
}

#[async_trait::async_trait]
impl AiClient for GeminiClient {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn describe_for_seo(
        &self,
        image: &ImagePayload,
        platform: Platform,
        config: &GenerationConfig,
    ) -> Result<SeoResult> {
        let key = self.resolve_key(config)?;
        let body = seo_request_body(image, platform, config);
        let text = self.generate(key, &body).await?;
        parse_seo_response(&text)
    }

    async fn describe_as_prompt(
        &self,
        image: &ImagePayload,
        config: &GenerationConfig,
    ) -> Result<String> {
        let key = self.resolve_key(config)?;
        let body = prompt_request_body(image, config);
        let text = self.generate(key, &body).await?;
        let prompt = text.trim();
        if prompt.is_empty() {
            anyhow::bail!("No response from AI");
        }
        Ok(prompt.to_string())
    }
}

fn inline_image(image: &ImagePayload) -> Value {
    let data = base64::engine::general_purpose::STANDARD.encode(image.bytes());
    json!({
        "inline_data": {
            "mime_type": image.mime_type(),
            "data": data
        }
    })
}

/// Schema forcing `title`, `description` and `keywords` into the answer.
fn seo_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING", "description": "The SEO optimized title" },
            "description": { "type": "STRING", "description": "The detailed description" },
            "keywords": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of relevant keywords"
            }
        },
        "required": ["title", "description", "keywords"]
    })
}

fn seo_request_body(image: &ImagePayload, platform: Platform, config: &GenerationConfig) -> Value {
    json!({
        "contents": [
            {
                "parts": [
                    inline_image(image),
                    { "text": build_seo_prompt(platform, config) }
                ]
            }
        ],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": seo_response_schema(),
            "temperature": SEO_TEMPERATURE
        }
    })
}

fn prompt_request_body(image: &ImagePayload, config: &GenerationConfig) -> Value {
    json!({
        "contents": [
            {
                "parts": [
                    inline_image(image),
                    { "text": build_image_prompt(config) }
                ]
            }
        ],
        "generationConfig": {
            "temperature": PROMPT_TEMPERATURE
        }
    })
}

/// Concatenate the text parts of the first candidate.
fn response_text(json: &Value) -> Option<String> {
    let parts = json["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.trim().is_empty() { None } else { Some(text) }
}
