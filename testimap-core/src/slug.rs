//! Slug generation and per-run collision resolution.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Used when neither the identifier nor the filename yields a slug.
pub const FALLBACK_SLUG: &str = "transcript";

static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();
static HYPHENS_REGEX: OnceLock<Regex> = OnceLock::new();

fn whitespace_regex() -> &'static Regex {
    WHITESPACE_REGEX.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"))
}

fn hyphens_regex() -> &'static Regex {
    HYPHENS_REGEX.get_or_init(|| Regex::new(r"-+").expect("hyphen pattern"))
}

/// Convert an identifier into a URL-safe slug
///
/// Rules:
/// - Trim and lowercase
/// - Replace whitespace runs with a hyphen
/// - Drop characters outside `[a-z0-9.-]`
/// - Collapse multiple hyphens
/// - Trim leading/trailing hyphens
///
/// # Examples
///
/// ```
/// use testimap_core::sanitize_slug;
///
/// assert_eq!(sanitize_slug("Jane Doe"), "jane-doe");
/// assert_eq!(sanitize_slug("RG-50.030.0001"), "rg-50.030.0001");
/// assert_eq!(sanitize_slug("  --Hello,   World!-- "), "hello-world");
/// ```
pub fn sanitize_slug(input: &str) -> String {
    let lowercased = input.trim().to_lowercase();
    let hyphenated = whitespace_regex().replace_all(&lowercased, "-");

    let cleaned: String = hyphenated
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let collapsed = hyphens_regex().replace_all(&cleaned, "-");
    collapsed.trim_matches('-').to_string()
}

/// Slug for a document before collision handling: the preferred identifier
/// if it sanitizes to something, else the filename stem.
pub fn base_slug(preferred: &str, stem: &str) -> String {
    let slug = sanitize_slug(preferred);
    if !slug.is_empty() {
        return slug;
    }
    let slug = sanitize_slug(stem);
    if !slug.is_empty() {
        return slug;
    }
    FALLBACK_SLUG.to_string()
}

/// Slugs handed out during one manifest run.
#[derive(Debug, Default)]
pub struct SlugRegistry {
    seen: HashSet<String>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `base`, or the first free `base-N` (N >= 2) if it is taken.
    pub fn claim(&mut self, base: &str) -> String {
        let mut unique = base.to_string();
        let mut counter = 1;
        while self.seen.contains(&unique) {
            counter += 1;
            unique = format!("{}-{}", base, counter);
        }
        if unique != base {
            tracing::debug!("Slug '{}' already taken, using '{}'", base, unique);
        }
        self.seen.insert(unique.clone());
        unique
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.seen.contains(slug)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
