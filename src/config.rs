use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fixed storage key the generation settings are persisted under.
pub const STORAGE_KEY: &str = "stock-seo-config-v1";

/// User-adjustable generation parameters.
///
/// Word and keyword bounds are inclusive ranges. `min <= max` for each pair is
/// the caller's responsibility; the processor passes the values through as-is.
///
/// Field names serialize in camelCase so a saved file reads the same as the
/// settings object the web version stored.
///
/// # Example
///
/// ```rust
/// use stock_seo::config::GenerationConfig;
///
/// let mut config = GenerationConfig::default();
/// config.language = "German".into();
/// config.max_keywords = 30;
/// assert_eq!(config.min_title_words, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub min_title_words: u32,
    pub max_title_words: u32,
    pub min_keywords: u32,
    pub max_keywords: u32,
    pub min_desc_words: u32,
    pub max_desc_words: u32,
    /// Output language, free text (e.g. "English", "Español").
    pub language: String,
    /// Writing tone, free text (e.g. "Professional", "Playful").
    pub tone: String,
    /// Overrides the client's default API key when set and non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_title_words: 5,
            max_title_words: 15,
            min_keywords: 20,
            max_keywords: 50,
            min_desc_words: 15,
            max_desc_words: 50,
            language: "English".to_string(),
            tone: "Professional".to_string(),
            api_key: None,
        }
    }
}

impl GenerationConfig {
    /// The credential override, ignoring blank values.
    pub fn api_key_override(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Check that every min/max pair is ordered.
    ///
    /// Intended for input layers (CLI flags, settings forms); the batch
    /// processor never calls this.
    pub fn validate(&self) -> Result<()> {
        let pairs = [
            ("title words", self.min_title_words, self.max_title_words),
            ("keywords", self.min_keywords, self.max_keywords),
            ("description words", self.min_desc_words, self.max_desc_words),
        ];
        for (name, min, max) in pairs {
            if min > max {
                anyhow::bail!("Invalid {name} range: minimum {min} is greater than maximum {max}");
            }
        }
        Ok(())
    }
}

/// Persisted holder for the current [`GenerationConfig`].
///
/// Loaded once, edited through [`ConfigStore::update`], and written back on
/// every edit.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: GenerationConfig,
}

impl ConfigStore {
    /// Resolve the default settings path: same directory as the executable.
    pub fn default_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join(format!("{STORAGE_KEY}.json")))
    }

    /// Open the store at `path`, or at [`ConfigStore::default_path`].
    ///
    /// A missing or unreadable file yields the built-in defaults. This never
    /// fails on the file's content; only an unresolvable default path is an error.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        let config = load_or_default(&path);
        Ok(Self { path, config })
    }

    /// A store that starts from `config` and persists to `path`.
    pub fn with_config(path: impl Into<PathBuf>, config: GenerationConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current settings.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Apply an edit and persist the result immediately.
    ///
    /// The in-memory value is updated even if the write fails.
    pub fn update<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut GenerationConfig),
    {
        edit(&mut self.config);
        if let Err(e) = self.save() {
            log::warn!("Failed to persist settings to {}: {e:#}", self.path.display());
            return Err(e);
        }
        Ok(())
    }

    /// Write the current settings to disk.
    pub fn save(&self) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(&self.config).context("Failed to serialize settings")?;
        std::fs::write(&self.path, contents).context("Failed to write settings file")?;
        log::debug!("Settings saved to {}", self.path.display());
        Ok(())
    }
}

fn load_or_default(path: &Path) -> GenerationConfig {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => {
            log::debug!("No settings at {}. Using defaults.", path.display());
            return GenerationConfig::default();
        }
    };
    match serde_json::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Ignoring unreadable settings at {}: {e}", path.display());
            GenerationConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join(format!("{STORAGE_KEY}.json"))
    }

    #[test]
    fn defaults_match_initial_settings() {
        let c = GenerationConfig::default();
        assert_eq!((c.min_title_words, c.max_title_words), (5, 15));
        assert_eq!((c.min_keywords, c.max_keywords), (20, 50));
        assert_eq!((c.min_desc_words, c.max_desc_words), (15, 50));
        assert_eq!(c.language, "English");
        assert_eq!(c.tone, "Professional");
        assert!(c.api_key.is_none());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(GenerationConfig::default()).unwrap();
        assert_eq!(json["minTitleWords"], 5);
        assert_eq!(json["maxDescWords"], 50);
        assert!(json.get("apiKey").is_none());
    }

    #[test]
    fn update_then_reopen_returns_saved_values() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        let mut store = ConfigStore::open(Some(&path)).unwrap();
        store
            .update(|c| {
                c.language = "French".into();
                c.max_keywords = 25;
                c.api_key = Some("key-123".into());
            })
            .unwrap();

        let reopened = ConfigStore::open(Some(&path)).unwrap();
        assert_eq!(reopened.config(), store.config());
        assert_eq!(reopened.config().language, "French");
        assert_eq!(reopened.config().api_key.as_deref(), Some("key-123"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::open(Some(&store_path(&dir))).unwrap();
        assert_eq!(store.config(), &GenerationConfig::default());
    }

    #[test]
    fn corrupted_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        std::fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::open(Some(&path)).unwrap();
        assert_eq!(store.config(), &GenerationConfig::default());
    }

    #[test]
    fn blank_api_key_is_not_an_override() {
        let mut c = GenerationConfig::default();
        c.api_key = Some("   ".into());
        assert!(c.api_key_override().is_none());
        c.api_key = Some("abc".into());
        assert_eq!(c.api_key_override(), Some("abc"));
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let mut c = GenerationConfig::default();
        assert!(c.validate().is_ok());
        c.min_keywords = 60;
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("keywords"));
    }
}
