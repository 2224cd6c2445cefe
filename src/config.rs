use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_uploads")]
    pub uploads_folder: String,

    #[serde(default = "default_analyses")]
    pub analyses_folder: String,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub narration: NarrationConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GeminiConfig {
    /// Falls back to the GEMINI_API_KEY environment variable when empty.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    #[serde(default = "default_tts_model")]
    pub tts_model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NarrationConfig {
    /// Prebuilt TTS voice name. Selected interactively on first narrated use
    /// when unset.
    pub voice: Option<String>,

    /// Seconds to wait for remote synthesis before falling back to the
    /// on-device backend. Network stalls count as primary failure.
    #[serde(default = "default_tts_timeout")]
    pub tts_timeout_secs: u64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            voice: None,
            tts_timeout_secs: default_tts_timeout(),
        }
    }
}

fn default_uploads() -> String {
    "uploads".to_string()
}
fn default_analyses() -> String {
    "analyses".to_string()
}
fn default_vision_model() -> String {
    "gemini-3-flash-preview".to_string()
}
fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}
fn default_tts_timeout() -> u64 {
    8
}

impl Config {
    /// Loads config.yml if present, otherwise starts from defaults. Either
    /// way an empty API key is backfilled from the environment; a missing key
    /// is not an error here (analysis degrades to a placeholder result).
    pub fn load() -> Result<Self> {
        let path = Path::new("config.yml");
        let mut config: Config = if path.exists() {
            let content = fs::read_to_string(path).context("Failed to read config.yml")?;
            serde_yaml_ng::from_str(&content).context("Failed to parse config.yml")?
        } else {
            Config {
                uploads_folder: default_uploads(),
                analyses_folder: default_analyses(),
                gemini: GeminiConfig {
                    api_key: String::new(),
                    vision_model: default_vision_model(),
                    tts_model: default_tts_model(),
                },
                narration: NarrationConfig::default(),
            }
        };

        if config.gemini.api_key.is_empty() {
            if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                config.gemini.api_key = key;
            }
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write("config.yml", content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.uploads_folder)?;
        fs::create_dir_all(&self.analyses_folder)?;
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        !self.gemini.api_key.is_empty()
    }
}
