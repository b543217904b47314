use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One candidate daemon to try, in file order.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerProfile {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    /// Socket timeout in seconds once connected. When absent, ten times the
    /// ladder step that succeeded.
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_port() -> u16 {
    6600
}

impl ServerProfile {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default, rename = "server")]
    pub servers: Vec<ServerProfile>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Settings {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("minim");
        path.push("config.toml");
        path
    }

    /// A missing file is not an error: it loads as an empty profile list and
    /// the connection ladder reports that there was nothing to try.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
