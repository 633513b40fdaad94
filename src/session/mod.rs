// src/session/mod.rs

pub mod cache;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{GeometryConfig, PrefilterPolicy, StatsQuery};
use crate::error::{PipelineError, Severity};
use crate::fetch::{self, geometry::RegionTable};
use crate::reconcile::{self, NameReport, Reconciliation};
use crate::render;
use crate::table::Table;
use cache::FetchCache;

/// What one dashboard pass ended in.
#[derive(Debug)]
pub enum PassOutcome {
    /// A figure was written to the given path.
    Rendered(PathBuf),
    /// The pass ended in a reported condition; the session stays usable.
    Reported(PipelineError),
}

/// One user's dashboard state: the fixed configuration plus the memoized
/// source tables. Fetch failures degrade to cached empty tables, so every
/// later selection reports a reconciliation condition instead of crashing;
/// `refresh` is the way out once the sources are reachable again.
pub struct Session {
    client: Client,
    query: StatsQuery,
    geometry: GeometryConfig,
    policy: PrefilterPolicy,
    stats_cache: FetchCache<StatsQuery, Table>,
    geometry_cache: FetchCache<GeometryConfig, RegionTable>,
}

impl Session {
    pub fn new(
        query: StatsQuery,
        geometry: GeometryConfig,
        policy: PrefilterPolicy,
    ) -> Result<Self> {
        Ok(Session {
            client: fetch::build_client()?,
            query,
            geometry,
            policy,
            stats_cache: FetchCache::new(),
            geometry_cache: FetchCache::new(),
        })
    }

    /// The statistics table, fetched at most once per session. On failure
    /// the error is reported and an empty table is cached; downstream then
    /// surfaces `MissingColumn`/`ReconciliationEmpty` as designed.
    pub fn indicator_table(&self) -> Arc<Table> {
        self.stats_cache.get_or_fetch(&self.query, || {
            match fetch::stats::fetch_indicator_table(&self.client, &self.query) {
                Ok(table) => table,
                Err(e) => {
                    error!(error = %e, "statistics fetch failed, continuing with an empty table");
                    Table::empty()
                }
            }
        })
    }

    /// The geometry table, same lifecycle and degradation as
    /// [`Session::indicator_table`].
    pub fn region_table(&self) -> Arc<RegionTable> {
        self.geometry_cache.get_or_fetch(&self.geometry, || {
            match fetch::geometry::load(&self.client, &self.geometry) {
                Ok(table) => table,
                Err(e) => {
                    error!(error = %e, "geometry load failed, continuing with an empty table");
                    RegionTable::empty()
                }
            }
        })
    }

    /// Drop both memoized tables; the next pass fetches fresh.
    pub fn refresh(&self) {
        self.stats_cache.clear();
        self.geometry_cache.clear();
        info!("session caches cleared");
    }

    /// Reconcile the memoized tables for one selected year.
    pub fn reconcile_year(&self, year: i32) -> Result<Reconciliation, PipelineError> {
        let stats = self.indicator_table();
        let geometry = self.region_table();
        reconcile::reconcile(&stats, &geometry, year, self.policy)
    }

    /// One full pass: reconcile, then render. Pipeline conditions are
    /// reported at their severity and returned as an outcome, never raised;
    /// only infrastructure failures (an unwritable output file) error out.
    pub fn render_year(&self, year: i32, out: &Path) -> Result<PassOutcome> {
        let reconciliation = match self.reconcile_year(year) {
            Ok(r) => r,
            Err(e) => {
                match (&e, e.severity()) {
                    (PipelineError::NoDataForYear { year }, _) => {
                        warn!("Aastal {year} ei ole visualiseeritavaid andmeid.");
                    }
                    (_, Severity::Warning) => warn!(error = %e, "pass ended without a figure"),
                    (_, Severity::Error) => error!(error = %e, "pass ended without a figure"),
                }
                return Ok(PassOutcome::Reported(e));
            }
        };

        render::choropleth(&reconciliation.set, out)
            .with_context(|| format!("rendering choropleth to {}", out.display()))?;
        info!(year, path = %out.display(), rows = reconciliation.set.rows.len(), "figure written");
        Ok(PassOutcome::Rendered(out.to_path_buf()))
    }

    /// The side-by-side county vocabularies, for mismatch debugging.
    pub fn name_report(&self) -> NameReport {
        let stats = self.indicator_table();
        let geometry = self.region_table();
        reconcile::name_report(&stats, &geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeometrySource;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    const ONE_COUNTY: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": { "MNIMI": "Harju maakond" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[24.0, 59.0], [25.0, 59.0], [25.0, 59.5], [24.0, 59.0]]]
            }
        }]
    }"#;

    fn local_geometry_session(path: std::path::PathBuf) -> Session {
        Session::new(
            // Unparseable statistics endpoint: send() fails before any
            // socket is opened, so the degradation path runs offline.
            StatsQuery { url: "not a url".to_string(), ..StatsQuery::default() },
            GeometryConfig::new(GeometrySource::LocalPath(path)),
            PrefilterPolicy::RestrictToGeometry,
        )
        .unwrap()
    }

    #[test]
    fn geometry_is_fetched_once_and_shared() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(ONE_COUNTY.as_bytes()).unwrap();
        let session = local_geometry_session(tmp.path().to_path_buf());

        let first = session.region_table();
        let second = session.region_table();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.names(), vec!["Harju maakond"]);
    }

    #[test]
    fn failed_fetch_degrades_to_cached_empty_table() {
        let session = local_geometry_session(std::path::PathBuf::from("/nonexistent.geojson"));

        let stats = session.indicator_table();
        assert!(stats.is_empty());
        // The failure result is memoized too: no second attempt until refresh.
        assert!(Arc::ptr_eq(&stats, &session.indicator_table()));

        let geometry = session.region_table();
        assert!(geometry.is_empty());

        // Degraded sources surface as a reconciliation condition, not a panic.
        match session.reconcile_year(2020) {
            Err(PipelineError::MissingColumn { .. }) => {}
            other => panic!("expected MissingColumn from empty stats, got {other:?}"),
        }
    }

    #[test]
    fn refresh_drops_the_memoized_tables() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(ONE_COUNTY.as_bytes()).unwrap();
        let session = local_geometry_session(tmp.path().to_path_buf());

        let before = session.region_table();
        session.refresh();
        let after = session.region_table();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.names(), after.names());
    }
}
