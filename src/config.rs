use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_max_rounds() -> usize {
    5
}

fn default_search_results() -> usize {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub worker: ModelConfig,
    pub supervisor: ModelConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ModelConfig {
    pub host: String,
    pub model: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConversationConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_true")]
    pub enable_followups: bool,
    #[serde(default)]
    pub privacy_shield: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        ConversationConfig {
            max_rounds: default_max_rounds(),
            enable_followups: true,
            privacy_shield: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchConfig {
    /// SearxNG-style JSON search endpoint, e.g. "http://localhost:8888/search".
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_search_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            endpoint: "http://localhost:8888/search".to_string(),
            api_key: None,
            max_results: default_search_results(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory for per-run conversation logs. Empty disables log files.
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_dir() -> String {
    Config::get_config_dir().join("logs").to_string_lossy().into_owned()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { dir: default_log_dir() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            worker: ModelConfig {
                host: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
            },
            supervisor: ModelConfig {
                host: "http://localhost:11434".to_string(),
                model: "qwen2.5:14b".to_string(),
            },
            conversation: ConversationConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => {
                    match toml::from_str(&contents) {
                        Ok(config) => return config,
                        Err(e) => eprintln!("Error parsing config.toml: {}. Using defaults.", e),
                    }
                }
                Err(e) => eprintln!("Error reading config.toml: {}. Using defaults.", e),
            }
        } else {
            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
        }

        Config::default()
    }

    pub fn get_config_path() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/tandem/config.toml")
        } else {
            PathBuf::from("config.toml")
        }
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/tandem")
        } else {
            PathBuf::from(".")
        }
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        if self.logging.dir.is_empty() {
            None
        } else {
            Some(Path::new(&self.logging.dir).to_path_buf())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.conversation.max_rounds, 5);
        assert!(config.conversation.enable_followups);
        assert!(!config.conversation.privacy_shield);
        assert_eq!(config.search.max_results, 5);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            "[worker]\nhost = \"http://localhost:11434\"\nmodel = \"llama3.2\"\n\
             [supervisor]\nhost = \"http://localhost:11434\"\nmodel = \"qwen2.5:14b\"\n",
        )
        .unwrap();
        assert_eq!(config.conversation.max_rounds, 5);
        assert_eq!(config.search.max_results, 5);
    }
}
