// src/fetch/geometry.rs

use geojson::{GeoJson, Value};
use reqwest::blocking::Client;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{GeometryConfig, GeometrySource};
use crate::error::{PipelineError, Result};

/// One county boundary: the display name the source file carries and the
/// exterior ring of every polygon part, lon/lat pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionShape {
    pub name: String,
    pub parts: Vec<Vec<(f64, f64)>>,
}

impl RegionShape {
    /// A shape with no drawable ring. Such rows survive the join but count
    /// as nothing to plot.
    pub fn is_degenerate(&self) -> bool {
        !self.parts.iter().any(|ring| ring.len() >= 3)
    }
}

/// The loaded geometry table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionTable {
    pub regions: Vec<RegionShape>,
}

impl RegionTable {
    /// The degraded value a failed load caches.
    pub fn empty() -> Self {
        RegionTable::default()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.regions.iter().map(|r| r.name.as_str()).collect()
    }
}

/// Load county polygons from the configured source.
///
/// `Download` stages the body through a `NamedTempFile`, which is unlinked
/// when it drops, so the temporary copy is gone on every exit path, parse
/// failure included. All failures come back as `GeometryFetchFailed`; the
/// caller degrades to an empty table.
pub fn load(client: &Client, config: &GeometryConfig) -> Result<RegionTable> {
    let table = match &config.source {
        GeometrySource::Url(url) => {
            debug!(%url, "fetching geometry");
            let text = get_text(client, url)?;
            parse_feature_collection(&text, &config.name_attribute)?
        }
        GeometrySource::Download(url) => {
            debug!(%url, "downloading geometry to temporary file");
            let bytes = get_bytes(client, url)?;
            let mut tmp = NamedTempFile::new()
                .map_err(|e| geometry_failed(format!("creating temporary file: {e}")))?;
            tmp.write_all(&bytes)
                .map_err(|e| geometry_failed(format!("writing temporary file: {e}")))?;
            parse_geometry_file(tmp.path(), &config.name_attribute)?
        }
        GeometrySource::LocalPath(path) => {
            debug!(path = %path.display(), "reading local geometry file");
            parse_geometry_file(path, &config.name_attribute)?
        }
    };

    info!(regions = table.regions.len(), "geometry table loaded");
    Ok(table)
}

fn get_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .map_err(|e| geometry_failed(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(geometry_failed(format!("status {status} for {url}")));
    }
    response
        .text()
        .map_err(|e| geometry_failed(format!("reading body: {e}")))
}

fn get_bytes(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .map_err(|e| geometry_failed(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(geometry_failed(format!("status {status} for {url}")));
    }
    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| geometry_failed(format!("reading body: {e}")))
}

fn parse_geometry_file(path: &Path, name_attribute: &str) -> Result<RegionTable> {
    let text = fs::read_to_string(path)
        .map_err(|e| geometry_failed(format!("reading {}: {e}", path.display())))?;
    parse_feature_collection(&text, name_attribute)
}

/// Parse a GeoJSON FeatureCollection into the region table. Features without
/// the name attribute are skipped (and counted); Polygon and MultiPolygon
/// contribute their exterior rings, other geometry kinds are ignored as the
/// map only fills county outlines.
pub fn parse_feature_collection(
    text: &str,
    name_attribute: &str,
) -> Result<RegionTable> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let geojson = text
        .parse::<GeoJson>()
        .map_err(|e| geometry_failed(format!("parsing GeoJSON: {e}")))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        other => {
            return Err(geometry_failed(format!(
                "expected a FeatureCollection, got {}",
                geojson_kind(&other)
            )))
        }
    };

    let mut regions = Vec::with_capacity(collection.features.len());
    let mut unnamed = 0usize;
    for feature in collection.features {
        let name = match feature.property(name_attribute).and_then(|v| v.as_str()) {
            Some(n) => n.trim().to_string(),
            None => {
                unnamed += 1;
                continue;
            }
        };

        let parts = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::Polygon(rings)) => exterior_ring(rings).into_iter().collect(),
            Some(Value::MultiPolygon(polygons)) => {
                polygons.iter().filter_map(|rings| exterior_ring(rings)).collect()
            }
            // Point/line features have no fillable area; a missing geometry
            // still joins but is degenerate.
            _ => Vec::new(),
        };

        regions.push(RegionShape { name, parts });
    }

    if unnamed > 0 {
        warn!(count = unnamed, attribute = name_attribute, "features without name attribute skipped");
    }

    Ok(RegionTable { regions })
}

fn exterior_ring(rings: &[Vec<Vec<f64>>]) -> Option<Vec<(f64, f64)>> {
    let ring = rings.first()?;
    Some(
        ring.iter()
            .filter(|pos| pos.len() >= 2)
            .map(|pos| (pos[0], pos[1]))
            .collect(),
    )
}

fn geojson_kind(g: &GeoJson) -> &'static str {
    match g {
        GeoJson::Geometry(_) => "a bare Geometry",
        GeoJson::Feature(_) => "a single Feature",
        GeoJson::FeatureCollection(_) => "a FeatureCollection",
    }
}

fn geometry_failed(reason: String) -> PipelineError {
    PipelineError::GeometryFetchFailed { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeometryConfig, GeometrySource};
    use std::path::PathBuf;

    const TWO_COUNTIES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "MNIMI": "Harju maakond" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[24.0, 59.0], [25.0, 59.0], [25.0, 59.5], [24.0, 59.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "MNIMI": "Saare maakond" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[22.0, 58.0], [23.0, 58.0], [23.0, 58.5], [22.0, 58.0]]],
                        [[[21.8, 58.2], [22.1, 58.2], [22.0, 58.4], [21.8, 58.2]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "OTHER": "no name here" },
                "geometry": { "type": "Point", "coordinates": [24.7, 59.4] }
            }
        ]
    }"#;

    #[test]
    fn polygons_and_multipolygons_parse() {
        let table = parse_feature_collection(TWO_COUNTIES, "MNIMI").unwrap();
        assert_eq!(table.regions.len(), 2);
        assert_eq!(table.regions[0].name, "Harju maakond");
        assert_eq!(table.regions[0].parts.len(), 1);
        assert_eq!(table.regions[1].parts.len(), 2);
        assert!(!table.regions[0].is_degenerate());
    }

    #[test]
    fn bom_prefixed_body_parses() {
        let with_bom = format!("\u{feff}{TWO_COUNTIES}");
        let table = parse_feature_collection(&with_bom, "MNIMI").unwrap();
        assert_eq!(table.regions.len(), 2);
    }

    #[test]
    fn alternate_name_attribute_is_honored() {
        let table = parse_feature_collection(TWO_COUNTIES, "OTHER").unwrap();
        assert_eq!(table.regions.len(), 1);
        assert_eq!(table.regions[0].name, "no name here");
        // A point feature has nothing to fill.
        assert!(table.regions[0].is_degenerate());
    }

    #[test]
    fn non_collection_input_is_rejected() {
        let err = parse_feature_collection(r#"{"type":"Point","coordinates":[0,1]}"#, "MNIMI")
            .unwrap_err();
        match err {
            PipelineError::GeometryFetchFailed { reason } => {
                assert!(reason.contains("FeatureCollection"));
            }
            other => panic!("expected GeometryFetchFailed, got {other:?}"),
        }
    }

    #[test]
    fn missing_local_file_reports_geometry_failure() {
        let client = crate::fetch::build_client().unwrap();
        let config = GeometryConfig::new(GeometrySource::LocalPath(PathBuf::from(
            "/nonexistent/counties.geojson",
        )));
        match load(&client, &config) {
            Err(PipelineError::GeometryFetchFailed { .. }) => {}
            other => panic!("expected GeometryFetchFailed, got {other:?}"),
        }
    }

    #[test]
    fn local_file_roundtrip() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(TWO_COUNTIES.as_bytes()).unwrap();
        let client = crate::fetch::build_client().unwrap();
        let config = GeometryConfig::new(GeometrySource::LocalPath(tmp.path().to_path_buf()));
        let table = load(&client, &config).unwrap();
        assert_eq!(table.names(), vec!["Harju maakond", "Saare maakond"]);
    }
}
