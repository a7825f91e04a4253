//! # testimap-core
//!
//! Core library for publishing oral-history transcripts on a map-driven site.
//!
//! This crate turns a directory of transcript documents into the JSON
//! manifests the site reads, locates those manifests again at serve time, and
//! derives map filter options from a tile pyramid.

pub mod builder;
pub mod config;
pub mod extract;
pub mod frontmatter;
pub mod manifest;
pub mod mapconfig;
pub mod models;
pub mod slug;

pub use builder::{BuildError, BuildReport, ManifestBuilder, SourceDocument};
pub use config::Config;
pub use frontmatter::{split_front_matter, FrontMatter};
pub use manifest::{transcript_routes, ManifestReader, ManifestSource};
pub use models::{
    Category, CategorySummary, Manifest, ManifestKind, MetaValue, TranscriptRecord,
    TranscriptSummary,
};
pub use slug::{sanitize_slug, SlugRegistry};
