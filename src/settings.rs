use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Hosted model endpoint (the advisor chat API).
    pub model_endpoint: String,
    #[serde(default)]
    pub model_api_key: String,
    pub model: String,
    pub temperature: f32,

    /// REST data API for sessions/messages persistence.
    pub store_endpoint: String,
    #[serde(default)]
    pub store_api_key: String,

    /// Video-avatar service (action-dispatch endpoint).
    pub video_endpoint: String,
    #[serde(default)]
    pub video_api_key: String,
    pub persona_id: String,

    /// Still-image capture.
    pub jpeg_quality: u8,
    pub max_image_width: u32,

    /// Speech turn detection.
    pub silence_timeout_ms: u64,
    pub transcript_clear_delay_ms: u64,

    /// Video session lifecycle.
    pub cleanup_grace_ms: u64,
    pub video_request_timeout_secs: u64,
    pub video_ready_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_endpoint: String::new(),
            model_api_key: String::new(),
            model: "gpt-4o".into(),
            temperature: 0.7,
            store_endpoint: String::new(),
            store_api_key: String::new(),
            video_endpoint: String::new(),
            video_api_key: String::new(),
            persona_id: String::new(),
            jpeg_quality: 80,
            max_image_width: 1024,
            silence_timeout_ms: 2000,
            transcript_clear_delay_ms: 1000,
            cleanup_grace_ms: 500,
            video_request_timeout_secs: 60,
            video_ready_timeout_secs: 40,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Write settings to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}
