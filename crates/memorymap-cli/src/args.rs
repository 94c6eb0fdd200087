use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for memorymap
#[derive(Debug, Parser)]
#[command(name = "memorymap", version, about = "Manage Memory Maps features from the terminal")]
pub struct CliArgs {
    /// Base URL of the memory maps API (overrides config and environment)
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,

    /// Bearer token for authenticated requests
    #[arg(long = "token", global = true)]
    pub token: Option<String>,

    /// Path to a JSON config file (default: <config dir>/memorymap/config.json)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List all maps
    Maps,

    /// List the features of a map
    Features {
        map_id: u64,
    },

    /// Create a new map
    CreateMap {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Make the map visible to everyone
        #[arg(long)]
        public: bool,
        /// Center latitude (default from config)
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Center longitude (default from config)
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,
        /// Initial zoom level, 1 to 20
        #[arg(long)]
        zoom: Option<u8>,
    },

    /// Import a GeoJSON, KML, KMZ or CSV file into a map
    Import {
        map_id: u64,
        file: PathBuf,
        /// CSV latitude column
        #[arg(long = "lat-column", default_value = "lat")]
        lat_column: String,
        /// CSV longitude column
        #[arg(long = "lng-column", default_value = "lng")]
        lng_column: String,
        /// CSV name column
        #[arg(long = "name-column", default_value = "name")]
        name_column: String,
    },

    /// Delete a feature after confirmation
    DeleteFeature {
        map_id: u64,
        feature_id: u64,
        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}
