use anyhow::{bail, Context, Result};
use clap::Parser;
use iivekaart::{
    config::{
        GeometryConfig, GeometrySource, PrefilterPolicy, StatsQuery, GEOMETRY_URL, YEAR_MAX,
        YEAR_MIN,
    },
    error::Severity,
    reconcile::NameReport,
    session::{PassOutcome, Session},
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Choropleth of Estonian natural increase by county"
)]
struct Args {
    /// Render this year and exit; omit for the interactive prompt.
    #[arg(short, long)]
    year: Option<i32>,
    /// Where the rendered map is written.
    #[arg(short, long, default_value = "map.png")]
    out: PathBuf,
    /// Fetch the county polygons from this URL.
    #[arg(long, default_value = GEOMETRY_URL)]
    geometry_url: String,
    /// Download the polygons to a temporary file before parsing instead of
    /// parsing the response body in memory.
    #[arg(long)]
    geometry_download: bool,
    /// Read the county polygons from a local file instead of the network.
    #[arg(long, conflicts_with_all = ["geometry_url", "geometry_download"])]
    geometry_file: Option<PathBuf>,
    /// Feature property carrying the county name.
    #[arg(long, default_value = "MNIMI")]
    name_attribute: String,
    /// Leave statistics rows for counties absent from the geometry in place
    /// and let the join drop them, instead of filtering them out first.
    #[arg(long)]
    no_prefilter: bool,
    /// Print both sources' county-name vocabularies side by side and exit.
    #[arg(long)]
    names: bool,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();
    if let Some(year) = args.year {
        if !(YEAR_MIN..=YEAR_MAX).contains(&year) {
            bail!("year {year} is outside the published range {YEAR_MIN}-{YEAR_MAX}");
        }
    }
    if args.geometry_file.is_none() {
        Url::parse(&args.geometry_url)
            .with_context(|| format!("invalid --geometry-url {}", args.geometry_url))?;
    }

    let geometry = GeometryConfig {
        source: geometry_source(&args),
        name_attribute: args.name_attribute.clone(),
    };
    let policy = if args.no_prefilter {
        PrefilterPolicy::JoinOnly
    } else {
        PrefilterPolicy::RestrictToGeometry
    };
    info!(policy = policy.as_str(), "session configured");
    let session = Session::new(StatsQuery::default(), geometry, policy)?;

    if args.names {
        print_name_report(&session.name_report());
        return Ok(());
    }

    match args.year {
        Some(year) => one_shot(&session, year, &args.out),
        None => interactive(&session, &args.out),
    }
}

fn geometry_source(args: &Args) -> GeometrySource {
    match &args.geometry_file {
        Some(path) => GeometrySource::LocalPath(path.clone()),
        None if args.geometry_download => GeometrySource::Download(args.geometry_url.clone()),
        None => GeometrySource::Url(args.geometry_url.clone()),
    }
}

fn one_shot(session: &Session, year: i32, out: &Path) -> Result<()> {
    match session.render_year(year, out)? {
        PassOutcome::Rendered(path) => {
            println!("Wrote {}", path.display());
            Ok(())
        }
        // A no-data year is reported, not a failure; real errors exit nonzero.
        PassOutcome::Reported(err) => match err.severity() {
            Severity::Warning => Ok(()),
            Severity::Error => bail!(err),
        },
    }
}

fn interactive(session: &Session, out: &Path) -> Result<()> {
    println!("Years {YEAR_MIN}-{YEAR_MAX} are available.");
    loop {
        print!("Year to render ('names', 'refresh', 'quit'): ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(());
        }
        let input = input.trim();

        match input {
            "" => continue,
            "quit" | "q" => return Ok(()),
            "names" => {
                print_name_report(&session.name_report());
                continue;
            }
            "refresh" => {
                session.refresh();
                continue;
            }
            _ => {}
        }

        let year = match input.parse::<i32>() {
            Ok(y) if (YEAR_MIN..=YEAR_MAX).contains(&y) => y,
            _ => {
                println!("Please enter a year between {YEAR_MIN} and {YEAR_MAX}.");
                continue;
            }
        };

        match session.render_year(year, out) {
            Ok(PassOutcome::Rendered(path)) => println!("Wrote {}", path.display()),
            // Reported conditions were already logged at their severity.
            Ok(PassOutcome::Reported(_)) => {}
            Err(e) => error!(error = %e, "pass failed"),
        }
    }
}

fn print_name_report(report: &NameReport) {
    println!("{:<32} {:<32}", "Statistics", "Geometry");
    let rows = report.stats_names.len().max(report.geometry_names.len());
    for i in 0..rows {
        let stats = report.stats_names.get(i).map(String::as_str).unwrap_or("");
        let geo = report.geometry_names.get(i).map(String::as_str).unwrap_or("");
        println!("{stats:<32} {geo:<32}");
    }
    if !report.unmatched_stats.is_empty() {
        println!("Unmatched statistics names: {}", report.unmatched_stats.join(", "));
    }
    if !report.unmatched_geometry.is_empty() {
        println!("Unmatched geometry names: {}", report.unmatched_geometry.join(", "));
    }
}
