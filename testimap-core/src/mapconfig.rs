//! Map configuration generation from a scanned tile pyramid.
//!
//! Every tile in the source's zoom range is visited and, for each filter
//! control in the configuration, the values found in feature properties are
//! folded into a domain: a distinct value list for dropdowns, a min/max range
//! for sliders. The domains are then written back as control `options`.

use crate::models::json_number;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Highest zoom level a scan accepts.
pub const MAX_ZOOM: u8 = 30;

/// Name of the zoom-range descriptor in a tile directory.
pub const TILE_METADATA_FILE: &str = "metadata.json";

#[derive(Error, Debug)]
pub enum MapConfigError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Zoom level {0} exceeds the supported maximum of {max}", max = MAX_ZOOM)]
    ZoomOutOfRange(u8),
}

/// How a control presents its field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ControlKind {
    Dropdown,
    MultiSelect,
    Slider,
    TimeSlider,
    Other(String),
}

impl From<String> for ControlKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "dropdown" => ControlKind::Dropdown,
            "multi-select" => ControlKind::MultiSelect,
            "slider" => ControlKind::Slider,
            "time-slider" => ControlKind::TimeSlider,
            _ => ControlKind::Other(value),
        }
    }
}

impl From<ControlKind> for String {
    fn from(kind: ControlKind) -> Self {
        match kind {
            ControlKind::Dropdown => "dropdown".to_string(),
            ControlKind::MultiSelect => "multi-select".to_string(),
            ControlKind::Slider => "slider".to_string(),
            ControlKind::TimeSlider => "time-slider".to_string(),
            ControlKind::Other(other) => other,
        }
    }
}

impl ControlKind {
    pub fn is_categorical(&self) -> bool {
        matches!(self, ControlKind::Dropdown | ControlKind::MultiSelect)
    }

    pub fn is_range(&self) -> bool {
        matches!(self, ControlKind::Slider | ControlKind::TimeSlider)
    }
}

/// A filter control bound to one feature property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub field: String,

    #[serde(rename = "type")]
    pub kind: ControlKind,

    /// `None` when the key is absent; an explicit `null` is `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub options: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// The map configuration file. Keys this tool does not touch are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    #[serde(default)]
    pub dropdown_filters: Vec<Control>,

    #[serde(default)]
    pub field_controls_by_dataset: BTreeMap<String, Vec<Control>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MapConfig {
    pub fn from_file(path: &Path) -> Result<Self, MapConfigError> {
        read_json(path)
    }

    pub fn write(&self, path: &Path) -> Result<(), MapConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| MapConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| MapConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Dropdown filters followed by every dataset's controls.
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.dropdown_filters
            .iter()
            .chain(self.field_controls_by_dataset.values().flatten())
    }

    fn controls_mut(&mut self) -> impl Iterator<Item = &mut Control> {
        self.dropdown_filters
            .iter_mut()
            .chain(self.field_controls_by_dataset.values_mut().flatten())
    }
}

/// Feature properties of one feature.
pub type Properties = Map<String, Value>;

/// Layer name to the features of that layer.
pub type TileLayers = BTreeMap<String, Vec<Properties>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ZoomRange {
    #[serde(rename = "minzoom")]
    pub min: u8,
    #[serde(rename = "maxzoom")]
    pub max: u8,
}

/// A tile pyramid that can be scanned tile by tile.
pub trait TileSource {
    fn zoom_range(&self) -> Result<ZoomRange, MapConfigError>;

    /// Layers of tile `(z, x, y)`, or `None` when the pyramid has no such
    /// tile.
    fn tile(&self, z: u8, x: u32, y: u32) -> Result<Option<TileLayers>, MapConfigError>;
}

/// Tiles exported as `<root>/<z>/<x>/<y>.json` next to a
/// `<root>/metadata.json` zoom descriptor.
#[derive(Debug, Clone)]
pub struct DirectoryTileSource {
    root: PathBuf,
}

impl DirectoryTileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TileSource for DirectoryTileSource {
    fn zoom_range(&self) -> Result<ZoomRange, MapConfigError> {
        read_json(&self.root.join(TILE_METADATA_FILE))
    }

    fn tile(&self, z: u8, x: u32, y: u32) -> Result<Option<TileLayers>, MapConfigError> {
        let path = self
            .root
            .join(z.to_string())
            .join(x.to_string())
            .join(format!("{}.json", y));
        if !path.is_file() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, MapConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| MapConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| MapConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Values observed for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Distinct values in first-seen order.
    Categorical(Vec<Value>),
    Range { min: Option<f64>, max: Option<f64> },
}

impl Domain {
    fn for_kind(kind: &ControlKind) -> Option<Self> {
        if kind.is_categorical() {
            Some(Domain::Categorical(Vec::new()))
        } else if kind.is_range() {
            Some(Domain::Range {
                min: None,
                max: None,
            })
        } else {
            None
        }
    }

    fn fold(&mut self, n: f64) {
        if let Domain::Range { min, max } = self {
            *min = Some(min.map_or(n, |m| m.min(n)));
            *max = Some(max.map_or(n, |m| m.max(n)));
        }
    }
}

/// Domains keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct Domains {
    by_field: HashMap<String, Domain>,
    seen: HashMap<String, HashSet<String>>,
}

impl Domains {
    /// Start an empty domain for every control. A field shared by several
    /// controls keeps the domain of the last one.
    pub fn for_config(config: &MapConfig) -> Self {
        let mut domains = Self::default();
        for control in config.controls() {
            if let Some(domain) = Domain::for_kind(&control.kind) {
                domains.by_field.insert(control.field.clone(), domain);
            }
        }
        domains
    }

    pub fn get(&self, field: &str) -> Option<&Domain> {
        self.by_field.get(field)
    }

    /// Fold one feature's properties into the domains of `controls`.
    pub fn observe<'a>(
        &mut self,
        controls: impl IntoIterator<Item = &'a Control>,
        properties: &Properties,
    ) {
        for control in controls {
            let Some(value) = properties.get(&control.field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let Some(domain) = self.by_field.get_mut(&control.field) else {
                continue;
            };

            if control.kind.is_categorical() {
                if let Domain::Categorical(values) = domain {
                    let seen = self.seen.entry(control.field.clone()).or_default();
                    if seen.insert(value.to_string()) {
                        values.push(value.clone());
                    }
                }
            } else if control.kind == ControlKind::Slider {
                if let Some(n) = numeric_value(value) {
                    domain.fold(n);
                }
            } else if control.kind == ControlKind::TimeSlider {
                if let Some(ms) = date_value(value) {
                    domain.fold(ms as f64);
                }
            }
        }
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn date_value(value: &Value) -> Option<i64> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    parse_date_millis(&text).or_else(|| corrected_date_millis(&text))
}

/// Milliseconds since the epoch for an RFC 3339 timestamp or a
/// `YYYY-MM-DD`, `YYYY-MM` or `YYYY` date (midnight UTC).
pub fn parse_date_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }

    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d"))
        .ok()
        .or_else(|| {
            if text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit()) {
                NaiveDate::from_ymd_opt(text.parse().ok()?, 1, 1)
            } else {
                None
            }
        })?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// Retry a `YYYY-MM-DD` date whose year was recorded a century late
/// (20xx for 19xx).
fn corrected_date_millis(text: &str) -> Option<i64> {
    let parts: Vec<&str> = text.split('-').collect();
    if parts.len() < 3 {
        return None;
    }
    let digits: String = parts[0]
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let mut year: i64 = digits.parse().ok()?;
    if year >= 2000 {
        year -= 100;
    }
    parse_date_millis(&format!("{}-{}-{}", year, parts[1], parts[2]))
}

/// Visit every tile of the source and collect domains for all controls.
///
/// Tiles that are missing or cannot be read are skipped; only a failure to
/// determine the zoom range aborts the scan.
pub fn scan_domains(config: &MapConfig, source: &dyn TileSource) -> Result<Domains, MapConfigError> {
    let range = source.zoom_range()?;
    if range.max > MAX_ZOOM {
        return Err(MapConfigError::ZoomOutOfRange(range.max));
    }

    let controls: Vec<&Control> = config.controls().collect();
    let mut domains = Domains::for_config(config);
    let mut tiles_read = 0usize;

    for z in range.min..=range.max {
        let span = 1u32 << z;
        for x in 0..span {
            for y in 0..span {
                let layers = match source.tile(z, x, y) {
                    Ok(Some(layers)) => layers,
                    Ok(None) => continue,
                    Err(err) => {
                        tracing::debug!("Skipping tile {}/{}/{}: {}", z, x, y, err);
                        continue;
                    }
                };
                tiles_read += 1;
                for features in layers.values() {
                    for properties in features {
                        domains.observe(controls.iter().copied(), properties);
                    }
                }
            }
        }
    }

    tracing::info!(
        "Scanned {} tiles across zoom {}..={}",
        tiles_read,
        range.min,
        range.max
    );
    Ok(domains)
}

/// Write domains into control options.
///
/// Categorical controls only receive options when they have none yet;
/// range controls are always overwritten.
pub fn apply_domains(config: &mut MapConfig, domains: &Domains) {
    for control in config.controls_mut() {
        match domains.get(&control.field) {
            Some(Domain::Categorical(values)) if control.kind.is_categorical() => {
                if control.options.is_none() {
                    let mut sorted = values.clone();
                    sorted.sort_by_key(sort_key);
                    control.options = Some(Value::Array(sorted));
                }
            }
            Some(Domain::Range { min, max }) if control.kind.is_range() => {
                let bound = |v: &Option<f64>| v.map(json_number).unwrap_or(Value::Null);
                control.options = Some(json!({ "min": bound(min), "max": bound(max) }));
            }
            _ => {}
        }
    }
}

/// Values sort by their string form.
fn sort_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read `input`, scan `source`, and write the updated config to `output`.
pub fn generate_map_config(
    input: &Path,
    source: &dyn TileSource,
    output: &Path,
) -> Result<MapConfig, MapConfigError> {
    let mut config = MapConfig::from_file(input)?;
    let domains = scan_domains(&config, source)?;
    apply_domains(&mut config, &domains);
    config.write(output)?;
    tracing::info!("Updated config written to {:?}", output);
    Ok(config)
}
