// src/reconcile/mod.rs
//
// Turns the two fetched tables into the exact set of rows to render for one
// selected year. Every row that fails to find a partner is accounted for in
// the reconciliation report; nothing vanishes silently.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::config::PrefilterPolicy;
use crate::error::{PipelineError, Result};
use crate::fetch::geometry::{RegionShape, RegionTable};
use crate::regions::{self, County};
use crate::table::{self, Table, COL_COUNTY};

/// One render-ready row: a combined statistics record joined to its county
/// boundary. Built fresh per selection, discarded after rendering.
#[derive(Clone, Debug)]
pub struct ReconciledRow {
    pub county: &'static County,
    pub year: i32,
    pub males: i64,
    pub females: i64,
    pub increase: i64,
    pub shape: RegionShape,
}

/// The year slice handed to the renderer. Non-empty by construction.
#[derive(Clone, Debug)]
pub struct ReconciledSet {
    pub year: i32,
    pub rows: Vec<ReconciledRow>,
}

impl ReconciledSet {
    /// Min and max of the derived indicator, for color normalization.
    pub fn increase_range(&self) -> (i64, i64) {
        let mut min = i64::MAX;
        let mut max = i64::MIN;
        for row in &self.rows {
            min = min.min(row.increase);
            max = max.max(row.increase);
        }
        (min, max)
    }
}

/// Raw county-name vocabularies of both sources and the names that found no
/// partner. This is what the diagnostic toggle prints side by side.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NameReport {
    pub stats_names: Vec<String>,
    pub geometry_names: Vec<String>,
    pub unmatched_stats: Vec<String>,
    pub unmatched_geometry: Vec<String>,
}

/// A successful reconciliation: the renderable slice plus the report.
#[derive(Clone, Debug)]
pub struct Reconciliation {
    pub set: ReconciledSet,
    pub report: NameReport,
}

/// Compare the county vocabularies of the two sources through the canonical
/// classification. Works on whatever is there: a statistics table with no
/// county column contributes an empty side rather than an error, so this
/// stays usable for debugging exactly the failures it exists to explain.
pub fn name_report(stats: &Table, geometry: &RegionTable) -> NameReport {
    let stats_names: BTreeSet<String> = match stats.column_index(COL_COUNTY) {
        Some(idx) => stats
            .rows
            .iter()
            .filter_map(|row| row.get(idx))
            .filter(|name| !name.is_empty())
            .cloned()
            .collect(),
        None => BTreeSet::new(),
    };
    let geometry_names: BTreeSet<String> =
        geometry.regions.iter().map(|r| r.name.clone()).collect();

    let stats_codes: BTreeSet<&str> = stats_names
        .iter()
        .filter_map(|n| regions::canonicalize(n))
        .map(|c| c.code)
        .collect();
    let geometry_codes: BTreeSet<&str> = geometry_names
        .iter()
        .filter_map(|n| regions::canonicalize(n))
        .map(|c| c.code)
        .collect();

    let unmatched_stats = stats_names
        .iter()
        .filter(|n| match regions::canonicalize(n) {
            Some(c) => !geometry_codes.contains(c.code),
            None => true,
        })
        .cloned()
        .collect();
    let unmatched_geometry = geometry_names
        .iter()
        .filter(|n| match regions::canonicalize(n) {
            Some(c) => !stats_codes.contains(c.code),
            None => true,
        })
        .cloned()
        .collect();

    NameReport {
        stats_names: stats_names.into_iter().collect(),
        geometry_names: geometry_names.into_iter().collect(),
        unmatched_stats,
        unmatched_geometry,
    }
}

/// Produce the rows to render for `year`.
///
/// Order of operations is fixed: column check, derive, pre-filter, join,
/// empty-join check, year filter, empty-year check. `ReconciliationEmpty`
/// fires before any year filtering so a total name mismatch is never
/// misreported as a sparse year.
pub fn reconcile(
    stats: &Table,
    geometry: &RegionTable,
    year: i32,
    policy: PrefilterPolicy,
) -> Result<Reconciliation> {
    // 1) required columns, before anything is derived or joined
    let indicator = table::indicator_rows(stats)?;

    // 2) derive into a fresh collection; the cached table stays untouched
    let mut combined = table::combine(&indicator);

    let report = name_report(stats, geometry);

    // Geometry side, indexed by canonical code. First feature wins if a
    // county appears twice.
    let mut by_code: BTreeMap<&str, &RegionShape> = BTreeMap::new();
    for region in &geometry.regions {
        if let Some(county) = regions::canonicalize(&region.name) {
            if by_code.insert(county.code, region).is_some() {
                warn!(county = county.name, "duplicate geometry feature, keeping the first");
            }
        }
    }

    // 3) pre-filter policy: drop statistics rows outside the geometry
    //    vocabulary deliberately, or leave them for the join to drop
    if policy == PrefilterPolicy::RestrictToGeometry {
        let before = combined.len();
        combined.retain(|row| {
            regions::canonicalize(&row.county)
                .map(|c| by_code.contains_key(c.code))
                .unwrap_or(false)
        });
        if combined.len() < before {
            info!(
                removed = before - combined.len(),
                "statistics rows outside geometry dropped before join"
            );
        }
    }

    // 4) inner join on canonical county identity
    let mut joined = Vec::with_capacity(combined.len());
    for row in &combined {
        let county = match regions::canonicalize(&row.county) {
            Some(c) => c,
            None => continue,
        };
        let shape = match by_code.get(county.code) {
            Some(s) => *s,
            None => continue,
        };
        joined.push(ReconciledRow {
            county,
            year: row.year,
            males: row.males,
            females: row.females,
            increase: row.increase,
            shape: shape.clone(),
        });
    }

    if !report.unmatched_stats.is_empty() {
        warn!(names = ?report.unmatched_stats, "statistics counties without geometry partner");
    }
    if !report.unmatched_geometry.is_empty() {
        info!(names = ?report.unmatched_geometry, "geometry counties without statistics rows");
    }

    // 5) an empty join is a vocabulary mismatch, reported before the year
    //    filter can hide it
    if joined.is_empty() {
        return Err(PipelineError::ReconciliationEmpty);
    }

    // 6) exact-match year filter; both sides are i32 by now
    joined.retain(|row| row.year == year);

    // 7) nothing left, or nothing drawable left
    if joined.is_empty() || joined.iter().all(|row| row.shape.is_degenerate()) {
        return Err(PipelineError::NoDataForYear { year });
    }

    // 8) render-ready
    Ok(Reconciliation {
        set: ReconciledSet { year, rows: joined },
        report,
    })
}
