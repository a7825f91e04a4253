//! Manifest building - orchestrates splitting, slugging, extraction and output.

use crate::{
    config::Config,
    extract::{build_excerpt, extract_categories},
    frontmatter::split_front_matter,
    models::*,
    slug::{base_slug, SlugRegistry},
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Extension of transcript source documents (compared case-insensitively).
pub const SOURCE_EXTENSION: &str = "html";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Source directory not found: {0:?}")]
    MissingSource(PathBuf),

    #[error("Failed to scan {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize manifest: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One input file.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub file_name: String,
    pub content: String,
}

impl SourceDocument {
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// File name without its final extension
    pub fn stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// What a successful build produced.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub manifest: Manifest<TranscriptRecord>,
    pub summary: Manifest<TranscriptSummary>,
    pub manifest_path: PathBuf,
    pub summary_path: PathBuf,
    pub html_files: Vec<PathBuf>,
}

/// Turn one document into its manifest record and cleaned body.
///
/// The slug is claimed from `slugs`, so documents must be passed in the
/// order the manifest lists them.
pub fn build_record(doc: &SourceDocument, slugs: &mut SlugRegistry) -> (TranscriptRecord, String) {
    let (meta, body) = split_front_matter(&doc.content);
    let stem = doc.stem();

    let rg_number = meta
        .truthy("rg_number")
        .map(|v| v.to_string())
        .unwrap_or_else(|| stem.clone());
    let slug = slugs.claim(&base_slug(&rg_number, &stem));

    let cleaned = body.trim().to_string();
    let field = |key: &str| meta.truthy(key).cloned().unwrap_or_default();
    let tags = meta
        .truthy("tags")
        .map(|v| {
            v.to_string()
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let record = TranscriptRecord {
        file: format!("{}.html", slug),
        slug,
        rg_number,
        interviewee: field("interviewee"),
        birth_year: meta.truthy("birth_year").cloned(),
        birth_date: field("birth_date"),
        place_of_birth: field("place_of_birth"),
        country: field("country"),
        experience_group: field("experience_group"),
        gender: field("gender"),
        pdf_url: field("pdf_url"),
        ushmm_url: field("ushmm_url"),
        tags,
        category_summary: extract_categories(&cleaned),
        excerpt: build_excerpt(&cleaned),
    };

    (record, cleaned)
}

/// Manifest timestamp: UTC, millisecond precision, `Z` suffix.
pub fn format_generated_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Main manifest builder
pub struct ManifestBuilder {
    config: Config,
}

impl ManifestBuilder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Build stamped with the current time
    pub fn build(&self) -> Result<Option<BuildReport>, BuildError> {
        self.build_at(Utc::now())
    }

    /// Build all artifacts. Returns `Ok(None)`, having written nothing,
    /// when the source directory holds no documents.
    pub fn build_at(&self, generated_at: DateTime<Utc>) -> Result<Option<BuildReport>, BuildError> {
        let sources = self.discover_sources()?;
        if sources.is_empty() {
            tracing::warn!(
                "No transcript source files found in {:?}",
                self.config.source_dir()
            );
            return Ok(None);
        }

        tracing::info!("Found {} transcript source files", sources.len());

        let html_dir = self.config.html_output_dir();
        fs::create_dir_all(&html_dir).map_err(io_error(&html_dir))?;
        let data_dir = self.config.data_output_dir();
        fs::create_dir_all(&data_dir).map_err(io_error(&data_dir))?;

        let mut slugs = SlugRegistry::new();
        let mut records = Vec::with_capacity(sources.len());
        let mut html_files = Vec::with_capacity(sources.len());

        for path in &sources {
            let bytes = fs::read(path).map_err(io_error(path))?;
            let content = match String::from_utf8(bytes) {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!("{:?} is not valid UTF-8, replacing invalid bytes", path);
                    String::from_utf8_lossy(err.as_bytes()).into_owned()
                }
            };
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let doc = SourceDocument::new(file_name, content);

            let (record, cleaned) = build_record(&doc, &mut slugs);

            let html_path = html_dir.join(&record.file);
            fs::write(&html_path, &cleaned).map_err(io_error(&html_path))?;
            tracing::debug!("Processed {} -> {}", doc.file_name, record.slug);

            html_files.push(html_path);
            records.push(record);
        }

        let manifest = Manifest::new(format_generated_at(generated_at), records);
        let summary = manifest.summarize();

        let manifest_path = self.config.manifest_path(ManifestKind::Full);
        write_json(&manifest_path, &manifest)?;
        let summary_path = self.config.manifest_path(ManifestKind::Summary);
        write_json(&summary_path, &summary)?;

        tracing::info!("Processed {} transcripts", manifest.total);
        tracing::info!("Full manifest written to {:?}", manifest_path);
        tracing::info!("Summary manifest written to {:?}", summary_path);

        Ok(Some(BuildReport {
            manifest,
            summary,
            manifest_path,
            summary_path,
            html_files,
        }))
    }

    /// Source documents directly inside the source directory, sorted by
    /// file name
    fn discover_sources(&self) -> Result<Vec<PathBuf>, BuildError> {
        let source_dir = self.config.source_dir();
        if !source_dir.is_dir() {
            return Err(BuildError::MissingSource(source_dir));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&source_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| BuildError::Walk {
                path: source_dir.clone(),
                source,
            })?;
            let path = entry.path();
            let is_source = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION));
            if is_source && path.is_file() {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), BuildError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(io_error(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config_for(root: &Path) -> Config {
        let path = root.join("testimap.yml");
        fs::write(
            &path,
            "paths:\n  source: src\n  html_output: out/html\n  data_output: out/data\n",
        )
        .unwrap();
        Config::from_file(path).unwrap()
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_record_from_example_document() {
        let doc = SourceDocument::new(
            "a.html",
            "---\nrg_number: 50.030.0001\ninterviewee: Jane Doe\ntags: camp, liberation\n---\nBody text with <span class=\"COUNTRY\">Poland</span> content.",
        );
        let mut slugs = SlugRegistry::new();
        let (record, body) = build_record(&doc, &mut slugs);

        assert_eq!(record.slug, "50.030.0001");
        assert_eq!(record.rg_number, "50.030.0001");
        assert_eq!(record.interviewee, MetaValue::from("Jane Doe"));
        assert_eq!(record.tags, vec!["camp", "liberation"]);
        assert_eq!(
            record.category_summary.get(&Category::Country),
            Some(&vec!["Poland".to_string()])
        );
        assert_eq!(record.category_summary.len(), 1);
        assert_eq!(record.excerpt, "Body text with Poland content.");
        assert_eq!(record.file, "50.030.0001.html");
        assert!(body.starts_with("Body text"));
    }

    #[test]
    fn test_record_defaults_for_missing_fields() {
        let doc = SourceDocument::new("Interview Two.html", "<p>No metadata</p>");
        let (record, _) = build_record(&doc, &mut SlugRegistry::new());

        assert_eq!(record.slug, "interview-two");
        assert_eq!(record.rg_number, "Interview Two");
        assert_eq!(record.interviewee, MetaValue::default());
        assert_eq!(record.birth_year, None);
        assert!(record.tags.is_empty());
        assert!(record.category_summary.is_empty());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["birth_year"], serde_json::Value::Null);
        assert_eq!(json["ushmm_url"], "");
        assert_eq!(json["tags"], serde_json::json!([]));
        assert_eq!(json["category_summary"], serde_json::json!({}));
    }

    #[test]
    fn test_numeric_fields_stay_numeric() {
        let doc = SourceDocument::new(
            "x.html",
            "---\nrg_number: 12345\nbirth_year: 1925\ngender: 0\n---\nBody",
        );
        let (record, _) = build_record(&doc, &mut SlugRegistry::new());
        assert_eq!(record.rg_number, "12345");
        assert_eq!(record.slug, "12345");
        assert_eq!(record.birth_year, Some(MetaValue::Number(1925.0)));
        assert_eq!(record.gender, MetaValue::default());

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""birth_year":1925"#));
    }

    #[test]
    fn test_colliding_slugs_get_suffixes() {
        let mut slugs = SlugRegistry::new();
        let first = SourceDocument::new("a.html", "---\nrg_number: Jane Doe\n---\nA");
        let second = SourceDocument::new("b.html", "---\nrg_number: jane doe\n---\nB");
        let third = SourceDocument::new("jane-doe.html", "C");

        assert_eq!(build_record(&first, &mut slugs).0.slug, "jane-doe");
        assert_eq!(build_record(&second, &mut slugs).0.slug, "jane-doe-2");
        let (record, _) = build_record(&third, &mut slugs);
        assert_eq!(record.slug, "jane-doe-3");
        assert_eq!(record.file, "jane-doe-3.html");
    }

    #[test]
    fn test_distinct_stems_need_no_suffix() {
        let mut slugs = SlugRegistry::new();
        let a = build_record(&SourceDocument::new("interview.html", "x"), &mut slugs).0;
        let b = build_record(&SourceDocument::new("interview2.html", "y"), &mut slugs).0;
        assert_eq!(a.slug, "interview");
        assert_eq!(b.slug, "interview2");
    }

    #[test]
    fn test_build_writes_artifacts_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("b.html"), "---\ninterviewee: B\n---\n<p>Second</p>\n").unwrap();
        fs::write(src.join("a.HTML"), "---\ninterviewee: A\n---\n---\nrg_number: dup\n---\n<p>First</p>").unwrap();
        fs::write(src.join("notes.txt"), "ignored").unwrap();
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested/c.html"), "ignored").unwrap();

        let report = ManifestBuilder::new(config)
            .build_at(fixed_time())
            .unwrap()
            .expect("report");

        let slugs: Vec<_> = report.manifest.items.iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "b"]);
        assert_eq!(report.manifest.total, 2);
        assert_eq!(report.manifest.generated_at, "2025-03-01T12:30:00.000Z");

        let html = fs::read_to_string(dir.path().join("out/html/a.html")).unwrap();
        assert_eq!(html, "<p>First</p>");
        assert_eq!(report.html_files.len(), 2);

        let full: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report.manifest_path).unwrap()).unwrap();
        assert_eq!(full["total"], 2);
        assert_eq!(full["items"][1]["interviewee"], "B");
        assert_eq!(full["items"][1]["file"], "b.html");

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report.summary_path).unwrap()).unwrap();
        assert_eq!(summary["generatedAt"], full["generatedAt"]);
        assert_eq!(summary["total"], 2);
        let item = summary["items"][0].as_object().unwrap();
        assert_eq!(item.len(), 11);
        assert!(!item.contains_key("category_summary"));
        assert!(!item.contains_key("file"));
        assert!(!item.contains_key("tags"));
        for (key, value) in item {
            assert_eq!(&full["items"][0][key], value);
        }
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("one.html"), "---\nrg_number: x\n---\nOne").unwrap();
        fs::write(src.join("two.html"), "---\nrg_number: x\n---\nTwo").unwrap();

        let builder = ManifestBuilder::new(config);
        let first = builder.build_at(fixed_time()).unwrap().unwrap();
        let bytes = fs::read(&first.manifest_path).unwrap();
        let second = builder.build_at(fixed_time()).unwrap().unwrap();
        assert_eq!(bytes, fs::read(&second.manifest_path).unwrap());
        assert_eq!(second.manifest.items[1].slug, "x-2");
    }

    #[test]
    fn test_invalid_utf8_source_is_decoded_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.html"), "<p>Valid</p>").unwrap();
        fs::write(src.join("b.html"), b"<p>Krak\xf3w</p>").unwrap();

        let report = ManifestBuilder::new(config)
            .build_at(fixed_time())
            .unwrap()
            .expect("report");

        assert_eq!(report.manifest.total, 2);
        assert!(report.manifest_path.exists());
        assert!(report.summary_path.exists());
        assert_eq!(report.manifest.items[1].excerpt, "Krak\u{FFFD}w");
    }

    #[test]
    fn test_empty_source_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        fs::create_dir_all(dir.path().join("src")).unwrap();

        let result = ManifestBuilder::new(config).build_at(fixed_time()).unwrap();
        assert!(result.is_none());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_missing_source_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let result = ManifestBuilder::new(config).build_at(fixed_time());
        assert!(matches!(result, Err(BuildError::MissingSource(_))));
    }
}
