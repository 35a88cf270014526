pub mod gemini;

pub use gemini::GeminiClient;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::GenerationConfig;
use crate::queue::ImagePayload;

/// Stock photo metadata returned in SEO mode.
///
/// All three fields are required; a response missing any of them is a failure.
/// `keywords` keeps the order the model produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoResult {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

/// Stock agency the SEO metadata is tailored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Platform {
    #[default]
    General,
    AdobeStock,
    Freepik,
    Shutterstock,
    Vecteezy,
    Depositphotos,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::General,
        Platform::AdobeStock,
        Platform::Freepik,
        Platform::Shutterstock,
        Platform::Vecteezy,
        Platform::Depositphotos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::General => "General",
            Platform::AdobeStock => "AdobeStock",
            Platform::Freepik => "Freepik",
            Platform::Shutterstock => "Shutterstock",
            Platform::Vecteezy => "Vecteezy",
            Platform::Depositphotos => "Depositphotos",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().to_lowercase() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Platform::ALL.iter().map(|p| p.as_str()).collect();
                anyhow::anyhow!("Unknown platform '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

/// Remote vision model the batch processor talks to.
///
/// Both calls are single-shot: no retry, no partial results. Implement this
/// trait to plug in another backend or a test double.
///
/// # Example
///
/// ```rust,no_run
/// use stock_seo::ai::{AiClient, GeminiClient, Platform};
/// use stock_seo::config::GenerationConfig;
/// use stock_seo::queue::ImagePayload;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = GeminiClient::new("my-key".into(), "gemini-2.5-flash".into());
/// let image = ImagePayload::from_path("photo.jpg".as_ref())?;
/// let seo = client
///     .describe_for_seo(&image, Platform::AdobeStock, &GenerationConfig::default())
///     .await?;
/// println!("{}: {} keywords", seo.title, seo.keywords.len());
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait AiClient: Send + Sync {
    /// The display name of this backend (e.g. "Gemini").
    fn name(&self) -> &str;

    /// Generate a title, description and keyword list for `image`.
    async fn describe_for_seo(
        &self,
        image: &ImagePayload,
        platform: Platform,
        config: &GenerationConfig,
    ) -> Result<SeoResult>;

    /// Reconstruct a text-to-image prompt that would recreate `image`.
    ///
    /// Returns trimmed text; an empty answer is an error.
    async fn describe_as_prompt(&self, image: &ImagePayload, config: &GenerationConfig)
    -> Result<String>;
}

/// Build the SEO instruction sent alongside the image.
pub fn build_seo_prompt(platform: Platform, config: &GenerationConfig) -> String {
    format!(
        "Analyze the uploaded stock image for the platform: {platform}.

Requirements:
1. Title: Create a SEO-friendly title between {} and {} words.
2. Description: Write a detailed description between {} and {} words.
3. Keywords: Generate between {} and {} relevant keywords (tags).
4. Language: {}.
5. Tone: {}.

Focus on visual elements, concepts, lighting, and potential usage scenarios suitable for stock photography.",
        config.min_title_words,
        config.max_title_words,
        config.min_desc_words,
        config.max_desc_words,
        config.min_keywords,
        config.max_keywords,
        config.language,
        config.tone,
    )
}

/// Build the prompt-reconstruction instruction sent alongside the image.
pub fn build_image_prompt(config: &GenerationConfig) -> String {
    format!(
        "Analyze this image and create a highly detailed text prompt that could be used to recreate it using a generative AI model (like Midjourney, Stable Diffusion, or Dall-E).

Include details about:
- Subject matter and action
- Art style, medium, and technique
- Lighting, color palette, and atmosphere
- Composition and camera angle

Output Format: A single, descriptive paragraph.
Language: {}.",
        config.language
    )
}

/// Parse the model's structured SEO answer.
///
/// The response is requested as JSON, but a markdown fence around it is
/// tolerated. Any missing field fails the parse.
pub fn parse_seo_response(text: &str) -> Result<SeoResult> {
    log::debug!("Raw SEO response:\n{text}");

    let trimmed = text.trim();
    if trimmed.is_empty() {
        anyhow::bail!("No response from AI");
    }

    let body = strip_code_fence(trimmed);
    match serde_json::from_str::<SeoResult>(body) {
        Ok(result) => Ok(result),
        Err(e) => {
            // Fall back to the outermost object if the model wrapped it in prose.
            if let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) {
                if end > start {
                    if let Ok(result) = serde_json::from_str::<SeoResult>(&body[start..=end]) {
                        return Ok(result);
                    }
                }
            }
            Err(anyhow::anyhow!("Malformed SEO response: {e}"))
        }
    }
}

/// Return the contents of a ```` ``` ```` fenced block, or `text` unchanged.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the optional language tag on the opening line.
    let rest = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    rest.rfind("```").map_or(rest, |end| &rest[..end]).trim()
}
