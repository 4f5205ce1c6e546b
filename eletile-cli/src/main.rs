use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

/// Elevation lookups and tagging from DEM tiles
#[derive(Parser)]
#[command(name = "eletile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads tiles.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Directory containing elevation tiles
    #[arg(short, long, env = "ELETILE_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Maximum tiles in cache
    #[arg(
        short,
        long,
        env = "ELETILE_CACHE_SIZE",
        default_value = "100",
        global = true
    )]
    pub cache_size: u64,

    /// Tile filename prefix
    #[arg(long, env = "ELETILE_TILE_PREFIX", default_value = "ASTGTM2_", global = true)]
    pub prefix: String,

    /// Tile filename suffix
    #[arg(long, env = "ELETILE_TILE_SUFFIX", default_value = "_dem", global = true)]
    pub suffix: String,

    /// Tile filename extension
    #[arg(long, env = "ELETILE_TILE_EXTENSION", default_value = "tif", global = true)]
    pub extension: String,

    /// URL template for downloading missing tiles (e.g. https://host/{filename}.zip)
    #[arg(long, env = "ELETILE_DOWNLOAD_URL", global = true)]
    pub download_url: Option<String>,

    /// HTTP basic auth user for downloads
    #[arg(long, env = "ELETILE_DOWNLOAD_USER", global = true)]
    pub download_user: Option<String>,

    /// HTTP basic auth password for downloads
    #[arg(long, env = "ELETILE_DOWNLOAD_PASSWORD", global = true, hide_env_values = true)]
    pub download_password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Query elevation for a single coordinate
    Query {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Tag every record of a CSV or GeoJSON file with its elevation
    Batch {
        /// Input file (CSV or GeoJSON)
        input: PathBuf,

        /// Output file (same format as input if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column name for latitude (CSV only)
        #[arg(long, default_value = "lat")]
        lat_col: String,

        /// Column name for longitude (CSV only)
        #[arg(long, default_value = "lon")]
        lon_col: String,

        /// Name of the elevation column or property
        #[arg(long, default_value = "ele")]
        tag: String,

        /// Keep elevations already present in the input
        #[arg(long)]
        keep_existing: bool,
    },

    /// Display information about a tile
    Info {
        /// Path to a tile file, or tile name (e.g., ASTGTM2_N47E010_dem)
        #[arg(required_unless_present_all = ["lat", "lon"])]
        tile: Option<String>,

        /// Specify tile by latitude instead of filename
        #[arg(long, conflicts_with = "tile", requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Specify tile by longitude instead of filename
        #[arg(long, conflicts_with = "tile", requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// List tiles available in the data directory
    List,
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "eletile=warn",
        1 => "eletile=info,eletile_cli=info",
        _ => "eletile=debug,eletile_cli=debug",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Query { lat, lon, json } => commands::query::run(&cli.engine, lat, lon, json),
        Commands::Batch {
            input,
            output,
            lat_col,
            lon_col,
            tag,
            keep_existing,
        } => commands::batch::run(
            &cli.engine,
            input,
            output,
            &lat_col,
            &lon_col,
            &tag,
            keep_existing,
        ),
        Commands::Info { tile, lat, lon } => commands::info::run(&cli.engine, tile, lat, lon),
        Commands::List => commands::list::run(&cli.engine),
    }
}
