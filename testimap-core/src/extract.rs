//! Category and excerpt extraction from transcript bodies.

use crate::models::{Category, CategorySummary};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum excerpt length in characters, before the truncation marker.
pub const EXCERPT_LIMIT: usize = 260;

/// Appended to an excerpt that was cut short.
pub const TRUNCATION_MARKER: char = '…';

static CATEGORY_SPAN_REGEX: OnceLock<Regex> = OnceLock::new();
static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();

fn category_span_regex() -> &'static Regex {
    CATEGORY_SPAN_REGEX.get_or_init(|| {
        let classes = Category::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r#"(?is)<span class="({})"[^>]*>(.*?)</span>"#, classes);
        Regex::new(&pattern).expect("category span pattern")
    })
}

fn tag_regex() -> &'static Regex {
    TAG_REGEX.get_or_init(|| Regex::new(r"</?[^>]+>").expect("tag pattern"))
}

fn whitespace_regex() -> &'static Regex {
    WHITESPACE_REGEX.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"))
}

/// Collect the tagged entities of each category.
///
/// Values keep first-occurrence order, duplicates are dropped and
/// categories without any value are left out of the result.
///
/// ```
/// use testimap_core::extract::extract_categories;
/// use testimap_core::Category;
///
/// let html = r#"<span class="COUNTRY">Poland</span> and <span class="COUNTRY">Poland</span>"#;
/// let summary = extract_categories(html);
/// assert_eq!(summary[&Category::Country], vec!["Poland"]);
/// assert_eq!(summary.len(), 1);
/// ```
pub fn extract_categories(html: &str) -> CategorySummary {
    let mut summary = CategorySummary::new();

    for captures in category_span_regex().captures_iter(html) {
        let Some(category) = Category::from_class(&captures[1]) else {
            continue;
        };
        let value = strip_tags(&captures[2]);
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let values = summary.entry(category).or_default();
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }

    summary
}

/// Plain-text preview of a body, at most [`EXCERPT_LIMIT`] characters plus
/// [`TRUNCATION_MARKER`] when cut.
pub fn build_excerpt(html: &str) -> String {
    let text = plain_text(html);
    if text.is_empty() {
        return String::new();
    }

    let mut excerpt: String = text.chars().take(EXCERPT_LIMIT).collect();
    if excerpt.len() < text.len() {
        excerpt.push(TRUNCATION_MARKER);
    }
    excerpt
}

/// Replace tags with spaces and collapse whitespace.
pub fn plain_text(html: &str) -> String {
    let spaced = tag_regex().replace_all(html, " ");
    whitespace_regex()
        .replace_all(&spaced, " ")
        .trim()
        .to_string()
}

fn strip_tags(html: &str) -> String {
    tag_regex().replace_all(html, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_multiple_categories() {
        let html = r#"<p>Born in <span class="POPULATED_PLACE">Łódź</span>, <span class="COUNTRY">Poland</span>.
            Moved to <span class="REGION" data-id="7">Silesia</span> near the
            <span class="ENV_FEATURES">river</span> and <span class="POPULATED_PLACE">Kraków</span>.</p>"#;

        let summary = extract_categories(html);
        assert_eq!(summary.len(), 4);
        assert_eq!(summary[&Category::PopulatedPlace], vec!["Łódź", "Kraków"]);
        assert_eq!(summary[&Category::Country], vec!["Poland"]);
        assert_eq!(summary[&Category::Region], vec!["Silesia"]);
        assert_eq!(summary[&Category::EnvFeatures], vec!["river"]);
        assert!(!summary.contains_key(&Category::Npip));
    }

    #[test]
    fn test_nested_markup_is_stripped() {
        let html = r#"<span class="BUILDING"><em>the</em> synagogue </span>"#;
        let summary = extract_categories(html);
        assert_eq!(summary[&Category::Building], vec!["the synagogue"]);
    }

    #[test]
    fn test_empty_and_unknown_spans_ignored() {
        let html = r#"<span class="COUNTRY">  </span><span class="PERSON">Anna</span><span class="COUNTRY"><b></b></span>"#;
        assert!(extract_categories(html).is_empty());
    }

    #[test]
    fn test_class_match_ignores_case() {
        let html = r#"<SPAN class="country">Poland</SPAN>"#;
        let summary = extract_categories(html);
        assert_eq!(summary[&Category::Country], vec!["Poland"]);
    }

    #[test]
    fn test_multiline_span_content() {
        let html = "<span class=\"DLF\">open\nfield</span>";
        let summary = extract_categories(html);
        assert_eq!(summary[&Category::Dlf], vec!["open\nfield"]);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let html = r#"<span class="NPIP">b</span><span class="NPIP">a</span><span class="NPIP">b</span>"#;
        let first = extract_categories(html);
        let second = extract_categories(html);
        assert_eq!(first, second);
        assert_eq!(first[&Category::Npip], vec!["b", "a"]);
    }

    #[test]
    fn test_excerpt_strips_markup() {
        let html = r#"Body text with <span class="COUNTRY">Poland</span> content."#;
        assert_eq!(build_excerpt(html), "Body text with Poland content.");
        assert_eq!(build_excerpt("<p>a</p><p>b</p>"), "a b");
    }

    #[test]
    fn test_excerpt_empty_body() {
        assert_eq!(build_excerpt(""), "");
        assert_eq!(build_excerpt("<p> </p>"), "");
    }

    #[test]
    fn test_excerpt_at_limit_has_no_marker() {
        let text = "a".repeat(EXCERPT_LIMIT);
        assert_eq!(build_excerpt(&text), text);
    }

    #[test]
    fn test_excerpt_truncates_long_text() {
        let text = "ü".repeat(EXCERPT_LIMIT + 40);
        let excerpt = build_excerpt(&text);
        assert_eq!(excerpt.chars().count(), EXCERPT_LIMIT + 1);
        assert!(excerpt.ends_with(TRUNCATION_MARKER));
        assert!(excerpt.starts_with(&"ü".repeat(EXCERPT_LIMIT)));
    }
}
