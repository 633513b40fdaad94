//! Fetches Estonian natural-increase statistics, joins them to county
//! polygons, and renders a per-year choropleth.

pub mod config;
pub mod error;
pub mod fetch;
pub mod reconcile;
pub mod regions;
pub mod render;
pub mod session;
pub mod table;
