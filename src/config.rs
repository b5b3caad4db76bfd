use ahamai_core::RenderConfig;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    /// Characters per simulated streaming chunk
    pub stream_chunk_chars: usize,
    /// Delay between streaming chunks
    pub stream_interval_ms: u64,
    pub tick_ms: u64,
    pub log_file: Option<PathBuf>,
    pub custom_instructions: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            stream_chunk_chars: 12,
            stream_interval_ms: 40,
            tick_ms: 250,
            log_file: None,
            custom_instructions: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        config
            .render
            .validate()
            .map_err(|e| anyhow!("Invalid render config in {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn set_custom_instructions(&mut self, instructions: &str) {
        let trimmed = instructions.trim();
        self.custom_instructions = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Update the custom instructions in the default config file
    pub fn save_custom_instructions(instructions: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.set_custom_instructions(instructions);
        config.save()
    }

    /// Where logs go; the terminal UI owns stderr
    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.log_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::get_config_dir()?.join("ahamai.log")),
        }
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.json"))
    }

    fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("ahamai"))
    }
}
