//! name_report.rs
//!
//! Fetches the statistics table and the county polygons once, then prints
//! how each side's raw county names resolve against the classification and
//! which names found no partner. Run this when a county silently drops out
//! of the map.

use anyhow::Result;
use clap::Parser;
use iivekaart::{
    config::{GeometryConfig, GeometrySource, PrefilterPolicy, StatsQuery, GEOMETRY_URL},
    regions,
    session::Session,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Print both sources' county names and how they reconcile")]
struct Args {
    #[arg(long, default_value = GEOMETRY_URL)]
    geometry_url: String,
    #[arg(long)]
    geometry_download: bool,
    #[arg(long, conflicts_with_all = ["geometry_url", "geometry_download"])]
    geometry_file: Option<PathBuf>,
    #[arg(long, default_value = "MNIMI")]
    name_attribute: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let source = match &args.geometry_file {
        Some(path) => GeometrySource::LocalPath(path.clone()),
        None if args.geometry_download => GeometrySource::Download(args.geometry_url.clone()),
        None => GeometrySource::Url(args.geometry_url.clone()),
    };
    let geometry = GeometryConfig {
        source,
        name_attribute: args.name_attribute.clone(),
    };
    let session = Session::new(StatsQuery::default(), geometry, PrefilterPolicy::default())?;
    let report = session.name_report();

    println!("Statistics side ({} names):", report.stats_names.len());
    for name in &report.stats_names {
        print_resolution(name);
    }
    println!("Geometry side ({} names):", report.geometry_names.len());
    for name in &report.geometry_names {
        print_resolution(name);
    }

    println!();
    if report.unmatched_stats.is_empty() && report.unmatched_geometry.is_empty() {
        println!("Every county name found a partner.");
    }
    if !report.unmatched_stats.is_empty() {
        println!(
            "Unmatched statistics names: {}",
            report.unmatched_stats.join(", ")
        );
    }
    if !report.unmatched_geometry.is_empty() {
        println!(
            "Unmatched geometry names: {}",
            report.unmatched_geometry.join(", ")
        );
    }
    Ok(())
}

fn print_resolution(name: &str) {
    match regions::canonicalize(name) {
        Some(county) => println!("  {name} -> {} ({})", county.name, county.code),
        None => println!("  {name} -> no classification match"),
    }
}
