use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Locations searched, in order, when no explicit config path is given.
const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "./docchat.toml",
    "~/.config/docchat/config.toml",
    "~/.docchat.toml",
];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Where the document-QA server lives and how to reach it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the server, e.g. "http://localhost:8000"
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// TCP connect timeout for HTTP requests. Streams themselves never time out.
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_connect_timeout_seconds() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Document to select on startup when the catalog lists it
    #[serde(default)]
    pub default_document: Option<String>,
    /// Title given to conversations created with /new
    #[serde(default = "default_new_chat_title")]
    pub new_chat_title: String,
}

fn default_new_chat_title() -> String {
    "New chat".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_document: None,
            new_chat_title: default_new_chat_title(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Maximum characters of the last message shown in chat listings
    #[serde(default = "default_snippet_length")]
    pub snippet_length: usize,
}

fn default_snippet_length() -> usize {
    90
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            snippet_length: default_snippet_length(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            session: SessionConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path_to_load = match config_path {
            Some(path) => {
                if !Path::new(path).exists() {
                    anyhow::bail!("Config file '{}' does not exist", path);
                }
                Some(path.to_string())
            }
            None => find_default_config(),
        };

        // If no config exists, create and save a default config
        let Some(path) = path_to_load else {
            let default_config = Self::default();
            let config_file = default_config_dir().join("config.toml");

            std::fs::create_dir_all(default_config_dir()).ok();
            if let Err(e) = default_config.save(&config_file) {
                eprintln!("Warning: Could not save default config: {}", e);
            } else {
                println!(
                    "Created default configuration at: {}",
                    config_file.display()
                );
            }

            return Ok(default_config);
        };

        debug!("Loading configuration from {}", path);
        let config_content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn load_with_overrides(
        config_path: Option<&str>,
        base_url_override: Option<String>,
        document_override: Option<String>,
    ) -> Result<Self> {
        let mut config = Self::load(config_path)?;

        if let Some(base_url) = base_url_override {
            validate_base_url(&base_url)?;
            config.backend.base_url = base_url;
        }

        if let Some(document) = document_override {
            if document.trim().is_empty() {
                anyhow::bail!("Document override must not be empty");
            }
            config.session.default_document = Some(document);
        }

        Ok(config)
    }

    /// Check the values serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        validate_base_url(&self.backend.base_url)?;
        if self.display.snippet_length == 0 {
            anyhow::bail!("display.snippet_length must be greater than zero");
        }
        Ok(())
    }

    /// Base URL without a trailing slash, ready for path joining
    pub fn base_url(&self) -> &str {
        self.backend.base_url.trim_end_matches('/')
    }
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let parsed = url::Url::parse(base_url)
        .map_err(|e| anyhow::anyhow!("Invalid backend.base_url '{}': {}", base_url, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!(
            "Invalid backend.base_url '{}': unsupported scheme '{}'",
            base_url,
            other
        ),
    }
}

fn find_default_config() -> Option<String> {
    DEFAULT_CONFIG_PATHS.iter().find_map(|path| {
        let expanded_path = shellexpand::tilde(path);
        if Path::new(expanded_path.as_ref()).exists() {
            Some(expanded_path.to_string())
        } else {
            None
        }
    })
}

fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|mut path| {
            path.push(".config");
            path.push("docchat");
            path
        })
        .unwrap_or_else(|| PathBuf::from("."))
}
