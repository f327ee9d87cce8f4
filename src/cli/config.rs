//! Configuration management for AIMY
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.aimy/config.toml

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::errors::{ClientError, Result};
use crate::streaming::{Endpoint, DEFAULT_HOST, DEFAULT_PATH, MAX_LINE_BYTES};
use crate::types::Options;

/// Complete configuration for AIMY
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub session: SessionConfig,
    pub stream: StreamConfig,
    pub options: OptionOverrides,
}

/// Inference server connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` of the server
    pub host: String,
    pub path: String,
}

/// Model and prompt framing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub system: String,
    pub template: String,
    pub format: String,
}

/// Interactive loop behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub user_label: String,
    pub assistant_label: String,
    pub exit_word: String,
    /// End the session on the first failed turn
    pub fatal_errors: bool,
    /// Send the previous turn's context tokens with the next prompt
    pub keep_context: bool,
}

/// Response decoding limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub max_line_bytes: usize,
}

/// Per-field overrides applied on top of the default options.
///
/// Keys are the wire names. Any key that is not a typed option is kept
/// and sent as an extension option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numa: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_batch: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_gqa: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_gpu: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_gpu: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_vram: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f16_kv: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logits_all: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocab_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_mmap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_mlock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rope_frequency_base: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rope_frequency_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_thread: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_keep: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tfs_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typical_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_last_n: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirostat: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirostat_tau: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirostat_eta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub penalize_newline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Server options the typed fields do not model
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            path: DEFAULT_PATH.to_string(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "AIMY3".to_string(),
            system: String::new(),
            template: String::new(),
            format: String::new(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_label: "YOU: ".to_string(),
            assistant_label: "AIMY: ".to_string(),
            exit_word: "exit".to_string(),
            fatal_errors: true,
            keep_context: false,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: MAX_LINE_BYTES,
        }
    }
}

impl OptionOverrides {
    /// Apply every field that is set, leaving the others untouched
    pub fn apply(&self, options: &mut Options) {
        let r = &mut options.runner;
        if let Some(v) = self.numa {
            r.use_numa = v;
        }
        if let Some(v) = self.num_ctx {
            r.num_ctx = v;
        }
        if let Some(v) = self.num_batch {
            r.num_batch = v;
        }
        if let Some(v) = self.num_gqa {
            r.num_gqa = v;
        }
        if let Some(v) = self.num_gpu {
            r.num_gpu = v;
        }
        if let Some(v) = self.main_gpu {
            r.main_gpu = v;
        }
        if let Some(v) = self.low_vram {
            r.low_vram = v;
        }
        if let Some(v) = self.f16_kv {
            r.f16_kv = v;
        }
        if let Some(v) = self.logits_all {
            r.logits_all = v;
        }
        if let Some(v) = self.vocab_only {
            r.vocab_only = v;
        }
        if let Some(v) = self.use_mmap {
            r.use_mmap = v;
        }
        if let Some(v) = self.use_mlock {
            r.use_mlock = v;
        }
        if let Some(v) = self.embedding_only {
            r.embedding_only = v;
        }
        if let Some(v) = self.rope_frequency_base {
            r.rope_frequency_base = v;
        }
        if let Some(v) = self.rope_frequency_scale {
            r.rope_frequency_scale = v;
        }
        if let Some(v) = self.num_thread {
            r.num_thread = v;
        }

        if let Some(v) = self.num_keep {
            options.num_keep = v;
        }
        if let Some(v) = self.seed {
            options.seed = v;
        }
        if let Some(v) = self.num_predict {
            options.num_predict = v;
        }
        if let Some(v) = self.top_k {
            options.top_k = v;
        }
        if let Some(v) = self.top_p {
            options.top_p = v;
        }
        if let Some(v) = self.tfs_z {
            options.tfs_z = v;
        }
        if let Some(v) = self.typical_p {
            options.typical_p = v;
        }
        if let Some(v) = self.repeat_last_n {
            options.repeat_last_n = v;
        }
        if let Some(v) = self.temperature {
            options.temperature = v;
        }
        if let Some(v) = self.repeat_penalty {
            options.repeat_penalty = v;
        }
        if let Some(v) = self.presence_penalty {
            options.presence_penalty = v;
        }
        if let Some(v) = self.frequency_penalty {
            options.frequency_penalty = v;
        }
        if let Some(v) = self.mirostat {
            options.mirostat = v;
        }
        if let Some(v) = self.mirostat_tau {
            options.mirostat_tau = v;
        }
        if let Some(v) = self.mirostat_eta {
            options.mirostat_eta = v;
        }
        if let Some(v) = self.penalize_newline {
            options.penalize_newline = v;
        }
        if let Some(ref v) = self.stop {
            options.stop = v.clone();
        }

        for (key, value) in &self.extensions {
            options.set_extension(key.clone(), value.clone());
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("Failed to read config {}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ClientError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".aimy").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(ClientError::Config("server.host must not be empty".to_string()));
        }

        if !self.server.path.starts_with('/') {
            return Err(ClientError::Config(format!(
                "server.path must start with '/': {}",
                self.server.path
            )));
        }

        if self.model.name.trim().is_empty() {
            return Err(ClientError::Config("model.name must not be empty".to_string()));
        }

        if self.session.exit_word.is_empty() {
            return Err(ClientError::Config("session.exit_word must not be empty".to_string()));
        }

        if self.stream.max_line_bytes == 0 {
            return Err(ClientError::Config(
                "stream.max_line_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ClientError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Generate endpoint
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.server.host.clone(), self.server.path.clone())
    }

    /// Default options with the configured overrides applied
    pub fn options(&self) -> Options {
        let mut options = Options::default();
        self.options.apply(&mut options);
        options
    }
}
