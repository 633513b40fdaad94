// src/fetch/mod.rs

pub mod geometry;
pub mod stats;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::time::Duration;

/// Build the blocking HTTP client the statistics fetcher and the geometry
/// loader share. One dashboard pass is synchronous request-response, so a
/// blocking client is all the transport there is.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .context("building HTTP client")
}
