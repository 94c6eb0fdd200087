//! memorymap: command-line interface for memorymap-core
//!
//! Lists maps and features, creates maps, imports files into a map and
//! deletes features against a Memory Maps API.
//!
//! Usage examples
//! --------------
//!
//! - List maps
//!   $ memorymap maps
//!
//! - Import a KML file into map 3
//!   $ memorymap import 3 trip.kml
//!
//! - Import a CSV file with custom column names
//!   $ memorymap import 3 stops.csv --lat-column latitude --lng-column longitude
//!
//! - Delete feature 42 of map 3 without asking
//!   $ memorymap delete-feature 3 42 --yes
//!
//! Configuration is read from `--config` (or the default config file), then
//! `MEMORYMAP_API_URL`, `MEMORYMAP_AUTH_TOKEN` and `MEMORYMAP_TIMEOUT_SECS`;
//! `--api-url` and `--token` override both.
mod args;

use crate::args::{CliArgs, Commands};
use anyhow::Context;
use clap::Parser;
use memorymap_core::import::sources::{self, CsvColumns, SourceFormat};
use memorymap_core::surface::DirectDelete;
use memorymap_core::{
    ClientConfig, DrawingSurfaceAdapter, Feature, FeatureId, FeatureStore, HttpRemote, ImportEngine, LoadStatus,
    MapCatalog, MapDraft, MapId,
};
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

fn load_config(args: &CliArgs) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::resolve(args.config.as_deref())?;
    if let Some(url) = &args.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(token) = &args.token {
        config.auth_token = Some(token.clone()).filter(|t| !t.is_empty());
    }
    Ok(config)
}

fn confirm(feature: &Feature) -> bool {
    print!("Delete {} '{}'? This cannot be undone. [y/N] ", feature.kind, feature.title);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

async fn load_store(remote: Arc<HttpRemote>, map: MapId) -> anyhow::Result<Arc<FeatureStore<HttpRemote>>> {
    let store = Arc::new(FeatureStore::new(remote, map));
    if let LoadStatus::Stale { reason, .. } = store.load().await {
        anyhow::bail!("Could not load features of map {}: {}", map, reason);
    }
    Ok(store)
}

async fn import(
    remote: Arc<HttpRemote>,
    map: MapId,
    file: &Path,
    columns: CsvColumns,
) -> anyhow::Result<()> {
    let store = FeatureStore::new(remote, map);
    let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let result = if SourceFormat::from_file_name(&name) == Some(SourceFormat::Csv) {
        let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        let batch = sources::parse_csv(&text, &columns)?;
        ImportEngine::run(&store, batch).await
    } else {
        ImportEngine::run_file(&store, file).await?
    };

    println!("Imported {} feature(s) into map {}", result.imported_count, map);
    for warning in &result.warnings {
        println!("  warning: {}", warning);
    }
    for failed in &result.failed_records {
        println!("  failed #{} '{}': {}", failed.index + 1, failed.title, failed.error);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = CliArgs::parse();
    let config = load_config(&args)?;
    log::debug!("Using API at {}", config.api_base_url);
    let remote = Arc::new(HttpRemote::new(&config)?);

    match args.command {
        Commands::Maps => {
            let catalog = MapCatalog::new(remote);
            for map in catalog.list().await? {
                let visibility = if map.is_public { "public" } else { "private" };
                println!("{:>6}  {} ({} features, {})", map.id, map.title, map.feature_count, visibility);
            }
        }

        Commands::Features { map_id } => {
            let store = load_store(remote, MapId(map_id)).await?;
            for feature in store.snapshot() {
                let category = if feature.category.is_empty() { "-" } else { feature.category.as_str() };
                println!("{:>6}  {:<10} {} [{}]", feature.id, feature.kind, feature.title, category);
            }
            if let Some(bounds) = store.bounds() {
                println!(
                    "bounds: ({:.5}, {:.5}) - ({:.5}, {:.5})",
                    bounds.x0, bounds.y0, bounds.x1, bounds.y1
                );
            }
        }

        Commands::CreateMap {
            title,
            description,
            public,
            lat,
            lng,
            zoom,
        } => {
            let mut view = config.default_view;
            if let Some(lat) = lat {
                view.center.lat = lat;
            }
            if let Some(lng) = lng {
                view.center.lng = lng;
            }
            if let Some(zoom) = zoom {
                view.zoom = zoom;
            }
            let draft = MapDraft {
                description: description.unwrap_or_default(),
                is_public: public,
                view,
                ..MapDraft::new(title)
            };
            let map = MapCatalog::new(remote).create(draft).await?;
            println!("Created map {} '{}'", map.id, map.title);
        }

        Commands::Import {
            map_id,
            file,
            lat_column,
            lng_column,
            name_column,
        } => {
            let columns = CsvColumns {
                lat: lat_column,
                lng: lng_column,
                name: name_column,
            };
            import(remote, MapId(map_id), &file, columns).await?;
        }

        Commands::DeleteFeature { map_id, feature_id, yes } => {
            let store = load_store(remote, MapId(map_id)).await?;
            let mut adapter = DrawingSurfaceAdapter::new(store);
            let id = FeatureId(feature_id);
            let outcome = if yes {
                adapter.delete_feature(id, &|_: &Feature| true).await?
            } else {
                adapter.delete_feature(id, &confirm).await?
            };
            match outcome {
                DirectDelete::Deleted => println!("Deleted feature {}", id),
                DirectDelete::Declined => println!("Kept feature {}", id),
            }
        }
    }

    Ok(())
}
