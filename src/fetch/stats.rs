// src/fetch/stats.rs

use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::config::StatsQuery;
use crate::error::{PipelineError, Result};
use crate::table::Table;

/// POST the fixed query to the statistics service and parse the CSV body.
///
/// One call per session per configuration; the session cache enforces that.
/// Transport failure, a non-success status, or an unreadable body all come
/// back as `FetchFailed`; the caller degrades to an empty table and the
/// pass continues.
pub fn fetch_indicator_table(client: &Client, query: &StatsQuery) -> Result<Table> {
    debug!(url = %query.url, "posting statistics query");

    let response = client
        .post(&query.url)
        .json(&query.request_body())
        .send()
        .map_err(|e| PipelineError::FetchFailed { reason: e.to_string() })?;

    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::FetchFailed { reason: format!("status {status}") });
    }

    let body = response
        .text()
        .map_err(|e| PipelineError::FetchFailed { reason: format!("reading body: {e}") })?;

    let table = Table::from_csv(&body)
        .map_err(|e| PipelineError::FetchFailed { reason: format!("parsing CSV body: {e}") })?;

    info!(rows = table.len(), columns = table.headers.len(), "statistics table fetched");
    Ok(table)
}
