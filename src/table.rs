// src/table.rs

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::debug;

use crate::error::PipelineError;

/// Column names as RV032 returns them in CSV form.
pub const COL_COUNTY: &str = "Maakond";
pub const COL_YEAR: &str = "Aasta";
pub const COL_MALES: &str = "Mehed Loomulik iive";
pub const COL_FEMALES: &str = "Naised Loomulik iive";
/// The derived column: males + females.
pub const COL_INCREASE: &str = "Loomulik iive";

/// A fetched table as the statistics service returned it: header row plus
/// string cells. Typed access happens at extraction, not here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// The degraded value a failed fetch caches: no columns, no rows.
    pub fn empty() -> Self {
        Table::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Parse a CSV body. Tolerates a UTF-8 BOM and ragged rows; cells are
    /// trimmed and unquoted.
    pub fn from_csv(text: &str) -> Result<Table> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .context("reading CSV header row")?
            .iter()
            .map(clean_cell)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.context("reading CSV record")?;
            rows.push(record.iter().map(clean_cell).collect());
        }

        Ok(Table { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn cell<'a>(&'a self, row: &'a [String], column: usize) -> &'a str {
        row.get(column).map(String::as_str).unwrap_or("")
    }
}

/// Trim whitespace and strip outer quotes if present.
pub fn clean_cell(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalize a year cell to the canonical integer type. The selection
/// control and the CSV disagree on representation (`2020` vs `"2020"`),
/// so everything funnels through here at the boundary.
pub fn parse_year(raw: &str) -> Option<i32> {
    clean_cell(raw).parse::<i32>().ok()
}

/// Parse an indicator count. PXWeb marks suppressed or missing values with
/// `..`, which comes back as `None` rather than an error.
pub fn parse_count(raw: &str) -> Option<i64> {
    clean_cell(raw).parse::<i64>().ok()
}

/// One statistics record: county × year with per-sex natural increase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndicatorRow {
    pub county: String,
    pub year: i32,
    pub males: i64,
    pub females: i64,
}

/// An [`IndicatorRow`] plus the derived total. Always built into a fresh
/// collection so the cached source table is never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CombinedRow {
    pub county: String,
    pub year: i32,
    pub males: i64,
    pub females: i64,
    pub increase: i64,
}

/// Extract typed indicator rows from a fetched table.
///
/// Fails with `MissingColumn` if any required column is absent (the two
/// sex-specific columns are checked first, matching what the dashboard
/// reports). Rows whose year or counts do not parse are skipped with a debug
/// log; a suppressed value should not sink the whole selection.
pub fn indicator_rows(table: &Table) -> Result<Vec<IndicatorRow>, PipelineError> {
    let males_idx = required_column(table, COL_MALES)?;
    let females_idx = required_column(table, COL_FEMALES)?;
    let county_idx = required_column(table, COL_COUNTY)?;
    let year_idx = required_column(table, COL_YEAR)?;

    let mut out = Vec::with_capacity(table.len());
    for row in &table.rows {
        let county = table.cell(row, county_idx).to_string();
        let year = match parse_year(table.cell(row, year_idx)) {
            Some(y) => y,
            None => {
                debug!(county = %county, raw = table.cell(row, year_idx), "skipping row with unparseable year");
                continue;
            }
        };
        let (males, females) = match (
            parse_count(table.cell(row, males_idx)),
            parse_count(table.cell(row, females_idx)),
        ) {
            (Some(m), Some(f)) => (m, f),
            _ => {
                debug!(county = %county, year, "skipping row with missing indicator value");
                continue;
            }
        };
        out.push(IndicatorRow { county, year, males, females });
    }

    Ok(out)
}

fn required_column(table: &Table, name: &str) -> Result<usize, PipelineError> {
    table
        .column_index(name)
        .ok_or_else(|| PipelineError::MissingColumn { column: name.to_string() })
}

/// Derive `Loomulik iive` = males + females for every row. Exact integer
/// addition, into a new collection.
pub fn combine(rows: &[IndicatorRow]) -> Vec<CombinedRow> {
    rows.iter()
        .map(|r| CombinedRow {
            county: r.county.clone(),
            year: r.year,
            males: r.males,
            females: r.females,
            increase: r.males + r.females,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV_OK: &str = "\u{feff}Maakond,Aasta,Mehed Loomulik iive,Naised Loomulik iive\n\
Harju maakond,2020,10,5\n\
Tartu maakond,2020,-3,-2\n";

    const CSV_NO_FEMALES: &str = "Maakond,Aasta,Mehed Loomulik iive\n\
Harju maakond,2020,10\n";

    const CSV_MESSY: &str = "Maakond,Aasta,Mehed Loomulik iive,Naised Loomulik iive\n\
Harju maakond,\" 2020 \",7,8\n\
Hiiu maakond,2021,..,4\n\
Tartu maakond,not-a-year,1,1\n";

    #[test]
    fn bom_is_stripped_from_first_header() {
        let t = Table::from_csv(CSV_OK).unwrap();
        assert_eq!(t.headers[0], COL_COUNTY);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn extraction_types_the_rows() {
        let t = Table::from_csv(CSV_OK).unwrap();
        let rows = indicator_rows(&t).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].county, "Harju maakond");
        assert_eq!(rows[0].year, 2020);
        assert_eq!(rows[1].males, -3);
        assert_eq!(rows[1].females, -2);
    }

    #[test]
    fn missing_sex_column_is_reported_by_name() {
        let t = Table::from_csv(CSV_NO_FEMALES).unwrap();
        match indicator_rows(&t) {
            Err(PipelineError::MissingColumn { column }) => assert_eq!(column, COL_FEMALES),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn empty_fetch_surfaces_as_missing_column() {
        match indicator_rows(&Table::empty()) {
            Err(PipelineError::MissingColumn { .. }) => {}
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn quoted_years_normalize_and_bad_cells_skip() {
        let t = Table::from_csv(CSV_MESSY).unwrap();
        let rows = indicator_rows(&t).unwrap();
        // Quoted padded year parses; `..` and `not-a-year` rows are skipped.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year, 2020);
        assert_eq!(rows[0].males, 7);
    }

    #[test]
    fn combine_adds_exactly() {
        let t = Table::from_csv(CSV_OK).unwrap();
        let combined = combine(&indicator_rows(&t).unwrap());
        for row in &combined {
            assert_eq!(row.increase, row.males + row.females);
        }
        assert_eq!(combined[0].increase, 15);
        assert_eq!(combined[1].increase, -5);
    }

    #[test]
    fn year_normalization_accepts_control_and_table_forms() {
        assert_eq!(parse_year("2020"), Some(2020));
        assert_eq!(parse_year(" 2020 "), Some(2020));
        assert_eq!(parse_year("\"2020\""), Some(2020));
        assert_eq!(parse_year("20x0"), None);
        assert_eq!(parse_year(""), None);
    }
}
