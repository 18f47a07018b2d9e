use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::records::TARGET_LABELS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_backend")]
    pub default_backend: String,
    #[serde(default)]
    pub documentai: DocumentAiConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub drive: DriveConfig,
}

fn default_backend() -> String {
    "documentai".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAiConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default)]
    pub processor_id: String,
    pub processor_version: Option<String>,
    /// API key sent as `?key=`; used only when no access token is set.
    #[serde(default)]
    pub api_key: String,
    /// OAuth access token, e.g. from `gcloud auth print-access-token`.
    #[serde(default)]
    pub access_token: String,
    /// Override for the regional endpoint, mainly for proxies and tests.
    pub base_url: Option<String>,
    #[serde(default = "default_field_mask")]
    pub field_mask: String,
    #[serde(default = "default_target_entities")]
    pub target_entities: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_location() -> String {
    "us".to_string()
}

fn default_field_mask() -> String {
    "entities".to_string()
}

fn default_target_entities() -> Vec<String> {
    TARGET_LABELS.iter().map(|l| l.to_string()).collect()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for DocumentAiConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: default_location(),
            processor_id: String::new(),
            processor_version: None,
            api_key: String::new(),
            access_token: String::new(),
            base_url: None,
            field_mask: default_field_mask(),
            target_entities: default_target_entities(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tesseract")]
    pub tesseract_path: String,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm_path: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// PDFs whose text layer has fewer visible characters are treated as scans.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
}

fn default_true() -> bool {
    true
}

fn default_tesseract() -> String {
    "tesseract".to_string()
}

fn default_pdftoppm() -> String {
    "pdftoppm".to_string()
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_dpi() -> u32 {
    300
}

fn default_min_text_chars() -> usize {
    20
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tesseract_path: default_tesseract(),
            pdftoppm_path: default_pdftoppm(),
            language: default_language(),
            dpi: default_dpi(),
            min_text_chars: default_min_text_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shared secret for the review UI. When empty, any password is accepted.
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_session_ttl() -> u64 {
    8 * 60 * 60
}

fn default_max_upload_mb() -> usize {
    50
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            password: String::new(),
            session_ttl_secs: default_session_ttl(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveConfig {
    #[serde(default)]
    pub access_token: String,
    pub input_folder_id: Option<String>,
    pub output_folder_id: Option<String>,
    pub base_url: Option<String>,
    pub upload_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_backend: default_backend(),
            documentai: DocumentAiConfig::default(),
            ocr: OcrConfig::default(),
            server: ServerConfig::default(),
            drive: DriveConfig::default(),
        }
    }
}

impl Config {
    /// Get the configuration directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("labextract");
        Ok(config_dir)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Configuration file not found at {}. Run 'labextract init' first.",
                config_path.display()
            );
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.expand_env_vars();
        Ok(config)
    }

    /// Configuration written by `labextract init`
    pub fn template() -> Self {
        let mut config = Self::default();
        config.documentai.api_key = "${DOCUMENTAI_API_KEY}".to_string();
        config.documentai.access_token = "${GOOGLE_ACCESS_TOKEN}".to_string();
        config.server.password = "${LABEXTRACT_PASSWORD}".to_string();
        config.drive.access_token = "${GOOGLE_ACCESS_TOKEN}".to_string();
        config
    }

    /// Expand environment variables in secret values
    fn expand_env_vars(&mut self) {
        self.documentai.api_key = expand_env_var(&self.documentai.api_key);
        self.documentai.access_token = expand_env_var(&self.documentai.access_token);
        self.server.password = expand_env_var(&self.server.password);
        self.drive.access_token = expand_env_var(&self.drive.access_token);
    }
}

/// Expand environment variable references like ${VAR_NAME}
fn expand_env_var(value: &str) -> String {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).unwrap_or_default()
    } else if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_default()
    } else {
        value.to_string()
    }
}
