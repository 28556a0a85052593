use clap::Parser;
use log::{error, LevelFilter};
use polaris_atlas::config::AtlasConfig;
use polaris_atlas::geo::{format_coords, CityIndex, Coordinate, CountryIndex};
use polaris_atlas::location::AddressResolver;
use polaris_atlas::server;
use std::path::PathBuf;
use std::sync::Arc;

/// Polaris Atlas: reverse geocoding with offline fallbacks.
///
/// Resolves a coordinate to the best available address, walking from the
/// packaged country outlines and city table through the local address cache
/// to the network geocoders.
///
/// Examples:
///   atlas --lat 59.3293 --lon 18.0686
///   atlas --lat 21.4225 --lon 39.8262 --lang ar --elevation
///   atlas --lat -33.92 --lon 18.42 --offline --progress
///   atlas --serve --port 3000
#[derive(Parser)]
#[command(name = "atlas", version, about, long_about = None)]
struct Cli {
    /// Latitude (-90 to 90).
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude (-180 to 180).
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Preferred language for place names (e.g. en, ar, sv).
    #[arg(long)]
    lang: Option<String>,

    /// Offline mode: only use built-in data and the cache.
    #[arg(long)]
    offline: bool,

    /// Also estimate the elevation of the point.
    #[arg(long)]
    elevation: bool,

    /// Print every intermediate result to stderr as it improves.
    #[arg(long)]
    progress: bool,

    /// Config file. Defaults to ~/.polaris/atlas.json.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address cache file. Overrides the config file.
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace). Overrides RUST_LOG;
    /// warn when neither is set.
    #[arg(long, value_parser = parse_level)]
    log_level: Option<LevelFilter>,

    /// Run the HTTP API instead of a single lookup.
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 3000)]
    port: u16,
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.parse::<LevelFilter>()
        .map_err(|_| format!("Unknown log level '{}'. Use error, warn, info, debug or trace.", s))
}

/// Filter directives for the logger. `RUST_LOG` wins over the noisy-crate
/// defaults; an explicit `--log-level` wins over `RUST_LOG` for this crate.
fn filter_spec(level: Option<LevelFilter>, rust_log: Option<&str>) -> String {
    let (env_directives, regex) = match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(env) => match env.split_once('/') {
            Some((directives, regex)) => (directives, Some(regex)),
            None => (env, None),
        },
        None => ("", None),
    };

    let mut parts = vec!["ureq=warn".to_string(), "hyper=info".to_string()];
    if env_directives.is_empty() && level.is_none() {
        parts.push(LevelFilter::Warn.to_string());
    } else if !env_directives.is_empty() {
        parts.push(env_directives.to_string());
    }
    if let Some(level) = level {
        parts.push(level.to_string());
        parts.push(format!("polaris_atlas={}", level));
        parts.push(format!("atlas={}", level));
    }

    let mut spec = parts.join(",");
    if let Some(regex) = regex {
        spec.push('/');
        spec.push_str(regex);
    }
    spec
}

fn init_logger(level: Option<LevelFilter>) {
    let spec = filter_spec(level, std::env::var("RUST_LOG").ok().as_deref());
    let mut builder = env_logger::Builder::from_default_env();
    builder.parse_filters(&spec);
    let _ = builder.try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.log_level);

    // ── Configuration ───────────────────────────────────────────

    let loaded = match &cli.config {
        Some(path) => AtlasConfig::load_from(path),
        None => AtlasConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });
    if cli.offline {
        config.offline = true;
    }
    if let Some(ref cache) = cli.cache {
        config.cache_path = Some(cache.clone());
    }
    let lang = cli.lang.clone().or_else(|| config.language.clone());

    // ── Packaged tables ─────────────────────────────────────────

    let countries = Arc::new(config.country_index().unwrap_or_else(|e| {
        error!("Country polygons unavailable: {}", e);
        CountryIndex::default()
    }));
    let cities = Arc::new(config.city_index().unwrap_or_else(|e| {
        error!("City table unavailable: {}", e);
        CityIndex::default()
    }));

    let resolver = AddressResolver::from_config(&config, countries, cities.clone());

    // ── Server mode ─────────────────────────────────────────────

    if cli.serve {
        let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("Error: cannot start runtime: {}", e);
            std::process::exit(1);
        });
        if let Err(e) = runtime.block_on(server::start(&cli.host, cli.port, resolver, cities)) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // ── Single lookup ───────────────────────────────────────────

    let (Some(lat), Some(lon)) = (cli.lat, cli.lon) else {
        eprintln!("Error: No location specified.");
        eprintln!();
        eprintln!("Usage:");
        eprintln!("  atlas --lat 59.3293 --lon 18.0686");
        eprintln!("  atlas --serve");
        std::process::exit(1);
    };
    let at = Coordinate::new(lat, lon);
    if !at.is_valid() {
        eprintln!("Error: Invalid coordinates. Lat: -90..90, Lon: -180..180");
        std::process::exit(1);
    }

    let progress = cli.progress;
    let resolved = resolver.resolve_with(lat, lon, lang.as_deref(), |candidate| {
        if progress {
            eprintln!("  \u{2026} [{}] {}", candidate.source, candidate.formatted());
        }
    });

    let Some(address) = resolved else {
        eprintln!("Error: No address found for {}", format_coords(lat, lon));
        std::process::exit(1);
    };

    let mut summary = address.summary();
    if cli.elevation && summary.elevation.is_none() {
        summary.elevation = resolver.resolve_elevation(lat, lon);
    }

    eprintln!("  \u{1F4CD} {} [{}]", summary.formatted, summary.source);
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
