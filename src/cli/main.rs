use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use stock_seo::ai::{AiClient, GeminiClient, Platform};
use stock_seo::config::{ConfigStore, GenerationConfig};
use stock_seo::export;
use stock_seo::presenter::{self, ItemReport};
use stock_seo::processor::BatchProcessor;
use stock_seo::queue::{self, ImagePayload, Mode};

#[derive(Parser, Debug)]
#[command(
    name = "stock-seo",
    version,
    about = "AI-powered stock photo metadata: generate SEO titles, descriptions, keywords, or image prompts"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// What to generate: `seo` metadata or an image `prompt`
    #[arg(short, long, default_value = "seo")]
    mode: Mode,

    /// Target stock platform for SEO metadata
    #[arg(short, long, default_value = "General")]
    platform: Platform,

    /// Path to settings file (default: next to the binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write default settings and exit
    #[arg(long)]
    init: bool,

    /// Directory for the exported CSV files
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    out: PathBuf,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Gemini model name
    #[arg(long)]
    model: Option<String>,

    /// Output language (saved to settings)
    #[arg(long)]
    language: Option<String>,

    /// Writing tone (saved to settings)
    #[arg(long)]
    tone: Option<String>,

    /// Title length in words, as MIN-MAX (saved to settings)
    #[arg(long, value_name = "MIN-MAX", value_parser = parse_range)]
    title_words: Option<(u32, u32)>,

    /// Number of keywords, as MIN-MAX (saved to settings)
    #[arg(long, value_name = "MIN-MAX", value_parser = parse_range)]
    keywords: Option<(u32, u32)>,

    /// Description length in words, as MIN-MAX (saved to settings)
    #[arg(long, value_name = "MIN-MAX", value_parser = parse_range)]
    desc_words: Option<(u32, u32)>,

    /// API key overriding GEMINI_API_KEY / API_KEY (saved to settings; empty clears it)
    #[arg(long)]
    api_key: Option<String>,
}

impl Cli {
    fn has_setting_edits(&self) -> bool {
        self.language.is_some()
            || self.tone.is_some()
            || self.title_words.is_some()
            || self.keywords.is_some()
            || self.desc_words.is_some()
            || self.api_key.is_some()
    }

    fn apply_edits(&self, config: &mut GenerationConfig) {
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        if let Some(tone) = &self.tone {
            config.tone = tone.clone();
        }
        if let Some((min, max)) = self.title_words {
            config.min_title_words = min;
            config.max_title_words = max;
        }
        if let Some((min, max)) = self.keywords {
            config.min_keywords = min;
            config.max_keywords = max;
        }
        if let Some((min, max)) = self.desc_words {
            config.min_desc_words = min;
            config.max_desc_words = max;
        }
        if let Some(key) = &self.api_key {
            config.api_key = (!key.trim().is_empty()).then(|| key.trim().to_string());
        }
    }
}

/// Parse `MIN-MAX` into an ordered pair.
fn parse_range(s: &str) -> Result<(u32, u32)> {
    let (min, max) = s
        .split_once('-')
        .with_context(|| format!("Expected MIN-MAX, got '{s}'"))?;
    let min: u32 = min.trim().parse().context("Invalid minimum")?;
    let max: u32 = max.trim().parse().context("Invalid maximum")?;
    if min > max {
        anyhow::bail!("Minimum {min} is greater than maximum {max}");
    }
    Ok((min, max))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let path = match cli.config.clone() {
            Some(p) => p,
            None => ConfigStore::default_path()?,
        };
        let store = ConfigStore::with_config(path, GenerationConfig::default());
        store.save()?;
        println!("Default settings written to {}", store.path().display());
        return Ok(());
    }

    let mut store = ConfigStore::open(cli.config.as_deref())?;

    // Setting flags behave like edits in a settings panel: validated, then persisted
    if cli.has_setting_edits() {
        let mut edited = store.config().clone();
        cli.apply_edits(&mut edited);
        edited.validate()?;
        store.update(|config| *config = edited)?;
        log::info!("Settings saved to {}", store.path().display());
    }

    if cli.paths.is_empty() {
        if cli.has_setting_edits() {
            return Ok(());
        }
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let images = queue::collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }

    let client = Arc::new(GeminiClient::from_env(cli.model.clone()));
    log::info!("Using {} model {}", client.name(), client.model());

    let mut processor = BatchProcessor::new(client, store);
    processor.set_mode(cli.mode);
    processor.set_platform(cli.platform);

    for path in &images {
        match ImagePayload::from_path(path) {
            Ok(payload) => {
                processor.enqueue(payload);
            }
            Err(e) => log::error!("{e:#}"),
        }
    }

    let total = processor.queue().len();
    log::info!("Found {total} image(s) to process");

    processor.process_all().await;

    // Print results
    if cli.json {
        let reports: Vec<ItemReport> = processor.queue().iter().map(ItemReport::from).collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        let color = std::io::stdout().is_terminal();
        for item in processor.queue().iter() {
            println!("{}", presenter::render_item(item, color));
        }
    }

    // Export
    let files = export::export_files(processor.queue().items());
    if files.is_empty() {
        log::info!("Nothing to export");
    } else {
        export::write_exports(&cli.out, &files)?;
    }

    // Summary
    let (success, failed) = processor.counts();
    log::info!("Done: {success} succeeded, {failed} failed out of {total} images");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_range_ordered() {
        assert_eq!(parse_range("5-15").unwrap(), (5, 15));
        assert_eq!(parse_range(" 20 - 50 ").unwrap(), (20, 50));
    }

    #[test]
    fn parse_range_rejects_bad_input() {
        assert!(parse_range("15-5").is_err());
        assert!(parse_range("ten-20").is_err());
        assert!(parse_range("12").is_err());
    }

    #[test]
    fn blank_api_key_flag_clears_override() {
        let cli = Cli::parse_from(["stock-seo", "--api-key", " "]);
        let mut config = GenerationConfig {
            api_key: Some("old".into()),
            ..GenerationConfig::default()
        };
        cli.apply_edits(&mut config);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn mode_and_platform_flags_parse() {
        let cli = Cli::parse_from(["stock-seo", "--mode", "prompt", "--platform", "shutterstock", "a.jpg"]);
        assert_eq!(cli.mode, Mode::Prompt);
        assert_eq!(cli.platform, Platform::Shutterstock);
        assert!(!cli.has_setting_edits());
    }
}
