//! Locating and reading previously built manifests.
//!
//! A site may be served from several roots, so the reader walks an explicit,
//! ordered list of [`ManifestSource`]s and returns the first manifest that
//! loads and parses. Failures never escape the reader: they are logged and
//! the next candidate is tried.

use crate::models::{Manifest, ManifestKind, TranscriptRecord, TranscriptSummary};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use thiserror::Error;

/// Route prefix for transcript detail pages.
pub const TRANSCRIPT_ROUTE_PREFIX: &str = "/transcripts/";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {0}")]
    Status(reqwest::StatusCode),

    #[error("Invalid manifest JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A place a manifest file may live.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Human-readable location of `file_name` in this source.
    fn location(&self, file_name: &str) -> String;

    /// Raw bytes of `file_name`.
    async fn fetch(&self, file_name: &str) -> Result<Vec<u8>, SourceError>;
}

/// Manifests stored in a local directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ManifestSource for DirectorySource {
    fn location(&self, file_name: &str) -> String {
        self.root.join(file_name).display().to_string()
    }

    async fn fetch(&self, file_name: &str) -> Result<Vec<u8>, SourceError> {
        Ok(tokio::fs::read(self.root.join(file_name)).await?)
    }
}

/// Manifests published under an HTTP base URL.
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl ManifestSource for HttpSource {
    fn location(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url, file_name)
    }

    async fn fetch(&self, file_name: &str) -> Result<Vec<u8>, SourceError> {
        let response = self.client.get(self.location(file_name)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Reads manifests from the first reachable candidate.
pub struct ManifestReader {
    sources: Vec<Box<dyn ManifestSource>>,
}

impl ManifestReader {
    pub fn new(sources: Vec<Box<dyn ManifestSource>>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[Box<dyn ManifestSource>] {
        &self.sources
    }

    /// Load and parse the manifest of the given kind, or `None` when no
    /// candidate yields a valid one.
    pub async fn load<T: DeserializeOwned>(&self, kind: ManifestKind) -> Option<Manifest<T>> {
        let file_name = kind.file_name();
        let mut attempted = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let location = source.location(file_name);
            match fetch_manifest(source.as_ref(), file_name).await {
                Ok(manifest) => {
                    tracing::debug!("Loaded {} manifest from {}", kind.as_str(), location);
                    return Some(manifest);
                }
                Err(err) => {
                    tracing::debug!("Manifest candidate {} failed: {}", location, err);
                    attempted.push(location);
                }
            }
        }

        tracing::warn!(
            "Failed to load {} manifest from any candidate: {}",
            kind.as_str(),
            attempted.join(", ")
        );
        None
    }

    pub async fn load_full(&self) -> Option<Manifest<TranscriptRecord>> {
        self.load(ManifestKind::Full).await
    }

    pub async fn load_summary(&self) -> Option<Manifest<TranscriptSummary>> {
        self.load(ManifestKind::Summary).await
    }
}

async fn fetch_manifest<T: DeserializeOwned>(
    source: &dyn ManifestSource,
    file_name: &str,
) -> Result<Manifest<T>, SourceError> {
    let bytes = source.fetch(file_name).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Detail-page routes for every transcript in manifest order.
pub fn transcript_routes(manifest: Option<&Manifest<TranscriptRecord>>) -> Vec<String> {
    manifest
        .map(|m| {
            m.items
                .iter()
                .map(|item| format!("{}{}", TRANSCRIPT_ROUTE_PREFIX, item.slug))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::fs;

    const FULL_MANIFEST: &str = r#"{
  "generatedAt": "2025-01-01T00:00:00.000Z",
  "total": 1,
  "items": [
    {
      "slug": "50.030.0001",
      "rg_number": "50.030.0001",
      "interviewee": "Jane Doe",
      "birth_year": 1925,
      "birth_date": "",
      "place_of_birth": "",
      "country": "",
      "experience_group": "",
      "gender": "",
      "pdf_url": "",
      "ushmm_url": "",
      "tags": ["camp"],
      "category_summary": { "COUNTRY": ["Poland"] },
      "excerpt": "Body",
      "file": "50.030.0001.html"
    }
  ]
}"#;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_first_valid_directory_wins() {
        let empty = tempfile::tempdir().unwrap();
        let broken = tempfile::tempdir().unwrap();
        let good = tempfile::tempdir().unwrap();
        fs::write(broken.path().join("transcripts.json"), "{ not json").unwrap();
        fs::write(good.path().join("transcripts.json"), FULL_MANIFEST).unwrap();

        let reader = ManifestReader::new(vec![
            Box::new(DirectorySource::new(empty.path())),
            Box::new(DirectorySource::new(broken.path())),
            Box::new(DirectorySource::new(good.path())),
        ]);

        let manifest = reader.load_full().await.expect("manifest");
        assert_eq!(manifest.total, 1);
        assert_eq!(manifest.items[0].slug, "50.030.0001");
    }

    #[tokio::test]
    async fn test_summary_kind_reads_summary_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("transcripts.json"), FULL_MANIFEST).unwrap();
        fs::write(
            dir.path().join("transcripts-summary.json"),
            r#"{"generatedAt":"x","total":1,"items":[{"slug":"a","rg_number":"a","excerpt":"e"}]}"#,
        )
        .unwrap();

        let reader = ManifestReader::new(vec![Box::new(DirectorySource::new(dir.path()))]);
        let summary = reader.load_summary().await.expect("summary");
        assert_eq!(summary.items[0].slug, "a");
        assert_eq!(summary.items[0].birth_year, None);
    }

    #[tokio::test]
    async fn test_no_candidate_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ManifestReader::new(vec![Box::new(DirectorySource::new(dir.path()))]);
        assert!(reader.load_full().await.is_none());

        let reader = ManifestReader::new(Vec::new());
        assert!(reader.load_summary().await.is_none());
    }

    #[tokio::test]
    async fn test_http_source_falls_through_on_error_status() {
        let router = Router::new()
            .route("/missing/transcripts.json", get(|| async { StatusCode::NOT_FOUND }))
            .route("/data/transcripts.json", get(|| async { FULL_MANIFEST }));
        let base = serve(router).await;
        let client = reqwest::Client::new();

        let reader = ManifestReader::new(vec![
            Box::new(HttpSource::new(format!("{}/missing/", base), client.clone())),
            Box::new(HttpSource::new(format!("{}/data", base), client)),
        ]);

        let manifest = reader.load_full().await.expect("manifest over http");
        assert_eq!(manifest.items[0].interviewee.to_string(), "Jane Doe");
    }

    #[tokio::test]
    async fn test_unreachable_http_source_returns_none() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let reader = ManifestReader::new(vec![Box::new(HttpSource::new(
            format!("http://{}", addr),
            reqwest::Client::new(),
        ))]);
        assert!(reader.load_full().await.is_none());
    }

    #[test]
    fn test_transcript_routes() {
        let manifest: Manifest<TranscriptRecord> = serde_json::from_str(FULL_MANIFEST).unwrap();
        assert_eq!(
            transcript_routes(Some(&manifest)),
            vec!["/transcripts/50.030.0001".to_string()]
        );
        assert!(transcript_routes(None).is_empty());
    }
}
