//! Content model structs for transcripts and manifests.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Largest integer an IEEE double represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Return the integer form of `n` when it has no fractional part and fits
/// the exactly-representable range.
pub(crate) fn as_integral(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Some(n as i64)
    } else {
        None
    }
}

/// Convert a float into a JSON number, preferring the integer encoding.
pub(crate) fn json_number(n: f64) -> serde_json::Value {
    match as_integral(n) {
        Some(i) => serde_json::Value::from(i),
        None => serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
    }
}

/// A front-matter value: numeric when the raw text parses as a finite
/// number, otherwise the text itself.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Text(String),
    Number(f64),
}

impl MetaValue {
    /// Parse a trimmed metadata value.
    ///
    /// ```
    /// use testimap_core::MetaValue;
    ///
    /// assert_eq!(MetaValue::parse("1925"), MetaValue::Number(1925.0));
    /// assert_eq!(MetaValue::parse("50.030.0001"), MetaValue::Text("50.030.0001".into()));
    /// assert_eq!(MetaValue::parse(""), MetaValue::Text(String::new()));
    /// ```
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return MetaValue::Text(String::new());
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => MetaValue::Number(n),
            _ => MetaValue::Text(raw.to_string()),
        }
    }

    /// Empty text and zero are treated as "not set".
    pub fn is_truthy(&self) -> bool {
        match self {
            MetaValue::Text(s) => !s.is_empty(),
            MetaValue::Number(n) => *n != 0.0,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            MetaValue::Number(_) => None,
        }
    }
}

impl Default for MetaValue {
    fn default() -> Self {
        MetaValue::Text(String::new())
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Text(s) => f.write_str(s),
            MetaValue::Number(n) => match as_integral(*n) {
                Some(i) => write!(f, "{}", i),
                None => write!(f, "{}", n),
            },
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl Serialize for MetaValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetaValue::Text(s) => serializer.serialize_str(s),
            MetaValue::Number(n) => match as_integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
        }
    }
}

struct MetaValueVisitor;

impl<'de> Visitor<'de> for MetaValueVisitor {
    type Value = MetaValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or a number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MetaValue, E> {
        Ok(MetaValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<MetaValue, E> {
        Ok(MetaValue::Text(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<MetaValue, E> {
        Ok(MetaValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<MetaValue, E> {
        Ok(MetaValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<MetaValue, E> {
        Ok(MetaValue::Number(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<MetaValue, E> {
        Ok(MetaValue::default())
    }

    fn visit_none<E: de::Error>(self) -> Result<MetaValue, E> {
        Ok(MetaValue::default())
    }
}

impl<'de> Deserialize<'de> for MetaValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MetaValueVisitor)
    }
}

/// Inline markup classes that mark a semantic entity in transcript text.
///
/// Declaration order is the order categories appear in a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Region,
    Country,
    PopulatedPlace,
    EnvFeatures,
    Dlf,
    Building,
    IntSpace,
    SpatialObj,
    Npip,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Region,
        Category::Country,
        Category::PopulatedPlace,
        Category::EnvFeatures,
        Category::Dlf,
        Category::Building,
        Category::IntSpace,
        Category::SpatialObj,
        Category::Npip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Region => "REGION",
            Category::Country => "COUNTRY",
            Category::PopulatedPlace => "POPULATED_PLACE",
            Category::EnvFeatures => "ENV_FEATURES",
            Category::Dlf => "DLF",
            Category::Building => "BUILDING",
            Category::IntSpace => "INT_SPACE",
            Category::SpatialObj => "SPATIAL_OBJ",
            Category::Npip => "NPIP",
        }
    }

    /// Match a class attribute value, ignoring ASCII case.
    pub fn from_class(class: &str) -> Option<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(class))
    }
}

/// Per-category extracted values, in first-occurrence order.
pub type CategorySummary = BTreeMap<Category, Vec<String>>;

/// `null` reads as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Unknown category keys are skipped.
fn known_categories<'de, D>(deserializer: D) -> Result<CategorySummary, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<Vec<String>>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, values)| {
            Category::from_class(&key).map(|category| (category, values.unwrap_or_default()))
        })
        .collect())
}

/// One entry of the full manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rg_number: String,
    #[serde(default)]
    pub interviewee: MetaValue,
    #[serde(default)]
    pub birth_year: Option<MetaValue>,
    #[serde(default)]
    pub birth_date: MetaValue,
    #[serde(default)]
    pub place_of_birth: MetaValue,
    #[serde(default)]
    pub country: MetaValue,
    #[serde(default)]
    pub experience_group: MetaValue,
    #[serde(default)]
    pub gender: MetaValue,
    #[serde(default)]
    pub pdf_url: MetaValue,
    #[serde(default)]
    pub ushmm_url: MetaValue,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "known_categories")]
    pub category_summary: CategorySummary,
    #[serde(default, deserialize_with = "null_as_default")]
    pub excerpt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file: String,
}

/// Reduced entry of the summary manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rg_number: String,
    #[serde(default)]
    pub interviewee: MetaValue,
    #[serde(default)]
    pub birth_year: Option<MetaValue>,
    #[serde(default)]
    pub birth_date: MetaValue,
    #[serde(default)]
    pub place_of_birth: MetaValue,
    #[serde(default)]
    pub country: MetaValue,
    #[serde(default)]
    pub experience_group: MetaValue,
    #[serde(default)]
    pub gender: MetaValue,
    #[serde(default)]
    pub pdf_url: MetaValue,
    #[serde(default, deserialize_with = "null_as_default")]
    pub excerpt: String,
}

impl From<&TranscriptRecord> for TranscriptSummary {
    fn from(record: &TranscriptRecord) -> Self {
        Self {
            slug: record.slug.clone(),
            rg_number: record.rg_number.clone(),
            interviewee: record.interviewee.clone(),
            birth_year: record.birth_year.clone(),
            birth_date: record.birth_date.clone(),
            place_of_birth: record.place_of_birth.clone(),
            country: record.country.clone(),
            experience_group: record.experience_group.clone(),
            gender: record.gender.clone(),
            pdf_url: record.pdf_url.clone(),
            excerpt: record.excerpt.clone(),
        }
    }
}

/// Aggregated description of every processed transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest<T> {
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    pub total: usize,
    pub items: Vec<T>,
}

impl<T> Manifest<T> {
    pub fn new(generated_at: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            generated_at: generated_at.into(),
            total: items.len(),
            items,
        }
    }
}

impl Manifest<TranscriptRecord> {
    /// Project every record onto the summary field set, keeping order,
    /// total and timestamp.
    pub fn summarize(&self) -> Manifest<TranscriptSummary> {
        Manifest {
            generated_at: self.generated_at.clone(),
            total: self.total,
            items: self.items.iter().map(TranscriptSummary::from).collect(),
        }
    }
}

/// Which manifest artifact to read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Full,
    Summary,
}

impl ManifestKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ManifestKind::Full => "transcripts.json",
            ManifestKind::Summary => "transcripts-summary.json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestKind::Full => "full",
            ManifestKind::Summary => "summary",
        }
    }
}
