//! Projections of the raw detector output into downstream GeoJSON variants.
//!
//! Geometry is always carried over untouched; only property bags change.

use crate::errors::Result;
use crate::paths;
use crate::store::ArtifactStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Provenance recorded on every exported building.
pub const SOURCE: &str = "GeoAI Detection";

/// `generator` attribute of the OSM projection.
pub const GENERATOR: &str = "Building Detector";

#[derive(Debug, Clone, Deserialize)]
pub struct RawFeatureCollection {
    pub features: Vec<RawFeature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFeature {
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub geometry: Value,
}

impl RawFeature {
    /// Detected footprint area; absent or non-numeric counts as 0.
    pub fn area(&self) -> f64 {
        self.properties
            .as_ref()
            .and_then(|p| p.get("area"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub properties: Map<String, Value>,
    pub geometry: Value,
}

/// A regenerated derived file together with the bytes written to it.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub path: PathBuf,
    pub body: Vec<u8>,
}

pub fn parse_raw(bytes: &[u8]) -> Result<RawFeatureCollection> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Reduce every feature to `building`, `source`, `source:date` and a rounded `area`.
pub fn clean_projection(raw: &RawFeatureCollection, date: NaiveDate) -> FeatureCollection {
    let date = format_date(date);
    let features = raw
        .features
        .iter()
        .map(|feature| {
            let mut properties = Map::new();
            properties.insert("building".into(), "yes".into());
            properties.insert("source".into(), SOURCE.into());
            properties.insert("source:date".into(), date.clone().into());
            properties.insert("area".into(), round1(feature.area()).into());
            Feature {
                properties,
                geometry: feature.geometry.clone(),
            }
        })
        .collect();

    FeatureCollection {
        generator: None,
        features,
    }
}

/// Fill in the required OSM tags the caller did not supply. Caller values win.
pub fn resolve_tags(mut tags: Map<String, Value>, date: NaiveDate) -> Map<String, Value> {
    tags.entry("building").or_insert_with(|| "yes".into());
    tags.entry("source").or_insert_with(|| SOURCE.into());
    tags.entry("source:date")
        .or_insert_with(|| format_date(date).into());
    tags
}

/// Every feature gets the resolved tag set plus an area `note` when the area is positive.
pub fn osm_projection(
    raw: &RawFeatureCollection,
    tags: Map<String, Value>,
    date: NaiveDate,
) -> FeatureCollection {
    let tags = resolve_tags(tags, date);
    let features = raw
        .features
        .iter()
        .map(|feature| {
            let mut properties = tags.clone();
            let area = feature.area();
            if area > 0.0 {
                properties.insert("note".into(), area_note(area).into());
            }
            Feature {
                properties,
                geometry: feature.geometry.clone(),
            }
        })
        .collect();

    FeatureCollection {
        generator: Some(GENERATOR.to_string()),
        features,
    }
}

/// Parse the `tags` query parameter. Anything but a JSON object is ignored.
pub fn parse_custom_tags(raw: Option<&str>) -> Map<String, Value> {
    let Some(raw) = raw.filter(|s| !s.is_empty()) else {
        return Map::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(tags)) => tags,
        Ok(other) => {
            tracing::warn!(tags = %other, "Tags parameter is not a JSON object, using defaults");
            Map::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Invalid JSON in tags parameter, using defaults");
            Map::new()
        }
    }
}

/// Regenerate the clean projection file from the current detection result.
pub fn write_clean(store: &ArtifactStore, date: NaiveDate) -> Result<Rendered> {
    let raw = load_current(store)?;
    let collection = clean_projection(&raw, date);
    render(store, paths::CLEAN_OUTPUT, &collection)
}

/// Regenerate the OSM projection file from the current detection result.
pub fn write_osm(
    store: &ArtifactStore,
    tags: Map<String, Value>,
    date: NaiveDate,
) -> Result<Rendered> {
    let raw = load_current(store)?;
    let collection = osm_projection(&raw, tags, date);
    render(store, paths::OSM_OUTPUT, &collection)
}

fn load_current(store: &ArtifactStore) -> Result<RawFeatureCollection> {
    let path = store.current_detection()?;
    parse_raw(&store.read(&path)?)
}

fn render(store: &ArtifactStore, file_name: &str, collection: &FeatureCollection) -> Result<Rendered> {
    let body = serde_json::to_vec(collection)?;
    let path = store.path(file_name);
    store.write(&path, &body)?;
    tracing::info!(
        path = %path.display(),
        features = collection.features.len(),
        "Export written"
    );
    Ok(Rendered { path, body })
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// One-decimal rounding of the exact binary value, ties to even.
fn round1(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

fn area_note(area: f64) -> String {
    format!("Detected building area: {area:.1} m²")
}
