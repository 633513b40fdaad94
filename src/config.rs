// src/config.rs

use serde::Serialize;
use std::path::PathBuf;

/// Statistikaamet PXWeb endpoint for table RV032 (natural increase by
/// county, year and sex).
pub const STATS_API_URL: &str = "https://andmed.stat.ee/api/v1/et/stat/RV032";

/// Year range exposed by the selection control and requested from the API.
pub const YEAR_MIN: i32 = 2014;
pub const YEAR_MAX: i32 = 2023;

/// Published county-polygon GeoJSON (maakond layer, MNIMI name attribute).
pub const GEOMETRY_URL: &str =
    "https://drive.google.com/file/d/1sY_lSxCXGpXUiPsGt62PfgbNbSIwVIL-";

/// The fixed statistics query: which years, counties and sexes to request.
/// This doubles as the session-cache key, so two sessions configured alike
/// share nothing but will fetch identical tables.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StatsQuery {
    pub url: String,
    pub years: Vec<String>,
    pub counties: Vec<String>,
    pub sexes: Vec<String>,
}

impl Default for StatsQuery {
    fn default() -> Self {
        StatsQuery {
            url: STATS_API_URL.to_string(),
            years: (YEAR_MIN..=YEAR_MAX).map(|y| y.to_string()).collect(),
            counties: crate::regions::COUNTIES
                .iter()
                .map(|c| c.code.to_string())
                .collect(),
            // RV032 sex dimension: "2" = males, "3" = females.
            sexes: vec!["2".to_string(), "3".to_string()],
        }
    }
}

impl StatsQuery {
    /// Build the PXWeb JSON request body: one item filter per dimension,
    /// CSV response format.
    pub fn request_body(&self) -> QueryBody {
        QueryBody {
            query: vec![
                DimensionFilter::items("Aasta", &self.years),
                DimensionFilter::items("Maakond", &self.counties),
                DimensionFilter::items("Sugu", &self.sexes),
            ],
            response: ResponseFormat { format: "csv".to_string() },
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct QueryBody {
    pub query: Vec<DimensionFilter>,
    pub response: ResponseFormat,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct DimensionFilter {
    pub code: String,
    pub selection: Selection,
}

impl DimensionFilter {
    fn items(code: &str, values: &[String]) -> Self {
        DimensionFilter {
            code: code.to_string(),
            selection: Selection {
                filter: "item".to_string(),
                values: values.to_vec(),
            },
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Selection {
    pub filter: String,
    pub values: Vec<String>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ResponseFormat {
    pub format: String,
}

/// Where the county polygons come from. Which variant is used is deployment
/// configuration, never runtime input.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GeometrySource {
    /// GET the URL and parse the response body directly.
    Url(String),
    /// GET the URL, write the body to a temporary file, parse the file.
    /// The temporary file is removed on every exit path.
    Download(String),
    /// Parse a pre-existing local file.
    LocalPath(PathBuf),
}

/// Geometry source plus the feature property that carries the county name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GeometryConfig {
    pub source: GeometrySource,
    pub name_attribute: String,
}

impl GeometryConfig {
    pub fn new(source: GeometrySource) -> Self {
        GeometryConfig {
            source,
            // Maa-amet county layers name their display-name column MNIMI.
            name_attribute: "MNIMI".to_string(),
        }
    }
}

/// Whether statistics rows whose county is absent from the geometry are
/// removed before the join (deliberate, logged) or left for the inner join
/// to drop. Either way the unmatched names end up in the reconciliation
/// report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefilterPolicy {
    RestrictToGeometry,
    JoinOnly,
}

impl PrefilterPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            PrefilterPolicy::RestrictToGeometry => "restrict-to-geometry",
            PrefilterPolicy::JoinOnly => "join-only",
        }
    }
}

impl Default for PrefilterPolicy {
    fn default() -> Self {
        PrefilterPolicy::RestrictToGeometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_query_matches_published_payload() {
        let q = StatsQuery::default();
        assert_eq!(q.url, STATS_API_URL);
        assert_eq!(q.years.first().map(String::as_str), Some("2014"));
        assert_eq!(q.years.last().map(String::as_str), Some("2023"));
        assert_eq!(q.years.len(), 10);
        assert_eq!(q.counties.len(), 14);
        assert_eq!(q.sexes, vec!["2", "3"]);
    }

    #[test]
    fn request_body_serializes_to_pxweb_shape() {
        let body = StatsQuery::default().request_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response"]["format"], "csv");
        assert_eq!(json["query"][0]["code"], "Aasta");
        assert_eq!(json["query"][0]["selection"]["filter"], "item");
        assert_eq!(json["query"][1]["code"], "Maakond");
        assert_eq!(json["query"][1]["selection"]["values"][0], "39");
        assert_eq!(json["query"][2]["code"], "Sugu");
    }

    #[test]
    fn identical_queries_hash_alike() {
        use std::collections::HashMap;
        let mut m = HashMap::new();
        m.insert(StatsQuery::default(), 1);
        assert!(m.contains_key(&StatsQuery::default()));
    }
}
