//! Configuration parsing and management.

use crate::manifest::{DirectorySource, HttpSource, ManifestSource};
use crate::models::ManifestKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Main configuration struct matching the testimap.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    /// Candidate locations for previously built manifests, tried in order
    #[serde(default = "default_manifest_sources")]
    pub manifest_sources: Vec<ManifestSourceConfig>,

    #[serde(default)]
    pub proxy: ProxyConfig,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the transcript source documents
    #[serde(default = "default_source")]
    pub source: PathBuf,

    /// Directory receiving one cleaned `<slug>.html` per transcript
    #[serde(default = "default_html_output")]
    pub html_output: PathBuf,

    /// Directory receiving the full and summary manifests
    #[serde(default = "default_data_output")]
    pub data_output: PathBuf,
}

fn default_source() -> PathBuf {
    PathBuf::from("content/transcripts")
}

fn default_html_output() -> PathBuf {
    PathBuf::from("static/transcript-html")
}

fn default_data_output() -> PathBuf {
    PathBuf::from("static/data")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            html_output: default_html_output(),
            data_output: default_data_output(),
        }
    }
}

/// One manifest candidate: a local directory or an HTTP base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestSourceConfig {
    Dir { dir: PathBuf },
    Url { url: String },
}

fn default_manifest_sources() -> Vec<ManifestSourceConfig> {
    vec![
        ManifestSourceConfig::Dir {
            dir: PathBuf::from("static/data"),
        },
        ManifestSourceConfig::Dir {
            dir: PathBuf::from("platform/static/data"),
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Route the proxy answers on
    #[serde(default = "default_proxy_path")]
    pub path: String,

    /// Search-index endpoint receiving forwarded requests
    #[serde(default)]
    pub upstream_url: String,

    /// Bearer credential sent upstream
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,
}

fn default_bind() -> String {
    String::from("127.0.0.1")
}

fn default_port() -> u16 {
    8787
}

fn default_proxy_path() -> String {
    String::from("/api/search")
}

fn default_allow_origin() -> String {
    String::from("*")
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            path: default_proxy_path(),
            upstream_url: String::new(),
            api_key: String::new(),
            allow_origin: default_allow_origin(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            manifest_sources: default_manifest_sources(),
            proxy: ProxyConfig::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Load the file when it exists, otherwise fall back to the
    /// conventional layout relative to the working directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Get the source directory, resolved relative to config file
    pub fn source_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.source)
    }

    /// Get the HTML output directory, resolved relative to config file
    pub fn html_output_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.html_output)
    }

    /// Get the manifest output directory, resolved relative to config file
    pub fn data_output_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.data_output)
    }

    /// Where the builder writes the given manifest
    pub fn manifest_path(&self, kind: ManifestKind) -> PathBuf {
        self.data_output_dir().join(kind.file_name())
    }

    /// Instantiate the configured manifest candidates, in order
    pub fn manifest_sources(&self, client: &reqwest::Client) -> Vec<Box<dyn ManifestSource>> {
        self.manifest_sources
            .iter()
            .map(|source| -> Box<dyn ManifestSource> {
                match source {
                    ManifestSourceConfig::Dir { dir } => {
                        Box::new(DirectorySource::new(self.resolve_path(dir)))
                    }
                    ManifestSourceConfig::Url { url } => {
                        Box::new(HttpSource::new(url.clone(), client.clone()))
                    }
                }
            })
            .collect()
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(config_path) = &self.config_path {
            if let Some(parent) = config_path.parent() {
                parent.join(path)
            } else {
                path.to_path_buf()
            }
        } else {
            path.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.paths.source, PathBuf::from("content/transcripts"));
        assert_eq!(
            config.manifest_path(ManifestKind::Summary),
            PathBuf::from("static/data/transcripts-summary.json")
        );
        assert_eq!(config.manifest_sources.len(), 2);
        assert_eq!(config.proxy.port, 8787);
        assert_eq!(config.proxy.path, "/api/search");
        assert_eq!(config.proxy.allow_origin, "*");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testimap.yml");
        fs::write(
            &path,
            r#"
paths:
  source: sources
manifest_sources:
  - dir: out/data
  - url: "https://example.org/data"
proxy:
  port: 9000
  upstream_url: "https://search.example.org/v1/graphql"
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.source_dir(), dir.path().join("sources"));
        assert_eq!(config.html_output_dir(), dir.path().join("static/transcript-html"));
        assert_eq!(config.proxy.port, 9000);
        assert_eq!(config.proxy.bind, "127.0.0.1");
        assert_eq!(
            config.manifest_sources,
            vec![
                ManifestSourceConfig::Dir {
                    dir: PathBuf::from("out/data")
                },
                ManifestSourceConfig::Url {
                    url: "https://example.org/data".into()
                },
            ]
        );

        let client = reqwest::Client::new();
        let sources = config.manifest_sources(&client);
        assert_eq!(
            sources[0].location("transcripts.json"),
            dir.path().join("out/data/transcripts.json").display().to_string()
        );
        assert_eq!(
            sources[1].location("transcripts.json"),
            "https://example.org/data/transcripts.json"
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.yml")).unwrap();
        assert_eq!(config.source_dir(), PathBuf::from("content/transcripts"));
    }

    #[test]
    fn test_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testimap.yml");
        fs::write(&path, "paths: [unclosed").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
