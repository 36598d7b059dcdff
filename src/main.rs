use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use movecache::api::{CachedApiClient, Endpoint};
use movecache::cache::{normalize, EntityCache, EntityStore};
use movecache::config::Config;
use movecache::{domain, telemetry};

#[derive(Parser, Debug)]
#[command(name = "movecache")]
#[command(about = "Normalized entity cache for relocation case management")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/movecache/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Log filter, overriding the config file (RUST_LOG still wins)
  #[arg(long, global = true)]
  log_level: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the relocation schema graph
  Schema,
  /// Normalize a JSON document and print its skeleton and entity tables
  Normalize {
    /// Entity type of the root value
    #[arg(short = 't', long = "type")]
    entity_type: String,
    /// JSON file to read (default: stdin)
    input: Option<PathBuf>,
  },
  /// Normalize, store and rebuild a JSON document, reporting whether it survived
  Roundtrip {
    /// Entity type of the root value
    #[arg(short = 't', long = "type")]
    entity_type: String,
    /// JSON file to read (default: stdin)
    input: Option<PathBuf>,
  },
  /// Fetch a resource from the API and print its denormalized form
  Fetch {
    #[command(subcommand)]
    target: FetchTarget,
  },
}

#[derive(Subcommand, Debug)]
enum FetchTarget {
  /// A move with its orders and shipments
  Move { id: String },
  /// Shipments of a move
  Shipments { move_id: String },
  /// Orders with their documents
  Orders { id: String },
  /// A document with its uploads
  Document { id: String },
  /// Move documents of a move
  MoveDocuments { move_id: String },
  /// Invoices of a shipment
  Invoices { shipment_id: String },
  /// A service member
  ServiceMember { id: String },
}

impl From<FetchTarget> for Endpoint {
  fn from(target: FetchTarget) -> Self {
    match target {
      FetchTarget::Move { id } => Endpoint::Move { id },
      FetchTarget::Shipments { move_id } => Endpoint::MoveShipments { move_id },
      FetchTarget::Orders { id } => Endpoint::Orders { id },
      FetchTarget::Document { id } => Endpoint::Document { id },
      FetchTarget::MoveDocuments { move_id } => Endpoint::MoveDocuments { move_id },
      FetchTarget::Invoices { shipment_id } => Endpoint::ShipmentInvoices { shipment_id },
      FetchTarget::ServiceMember { id } => Endpoint::ServiceMember { id },
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = telemetry::init(&config.logging, args.log_level.as_deref())?;

  // The schema is checked once, before any data is read
  let schema = Arc::new(domain::relocation_schema()?);
  let cache = EntityCache::new(schema).with_options(config.denormalize);

  match args.command {
    Command::Schema => print!("{}", cache.schema()),
    Command::Normalize { entity_type, input } => {
      let raw = read_input(input.as_deref())?;
      let normalized = normalize(&raw, cache.schema().expect_node(&entity_type)?)?;
      print_json(&serde_json::to_value(&normalized)?)?;
    }
    Command::Roundtrip { entity_type, input } => {
      let raw = read_input(input.as_deref())?;
      let mut cache = cache;
      let result = cache.ingest(&entity_type, &raw)?;
      let rebuilt = cache.denormalize(&entity_type, &result)?;
      print_json(&json!({
        "result": result,
        "denormalized": rebuilt,
        "identical": rebuilt.as_ref() == Some(&raw),
        "fingerprint": cache.store().fingerprint(),
      }))?;
    }
    Command::Fetch { target } => {
      let client = CachedApiClient::from_config(&config, cache)?;
      let fetched = client.fetch(&Endpoint::from(target)).await?;
      let value = client.denormalize(&fetched).await?;
      let store: EntityStore = client.snapshot().await;
      print_json(&json!({
        "endpoint": fetched.endpoint.to_string(),
        "fetched_at": fetched.fetched_at,
        "value": value,
        "records": store.len(),
        "fingerprint": store.fingerprint(),
      }))?;
    }
  }

  Ok(())
}

fn read_input(path: Option<&Path>) -> Result<Value> {
  let contents = match path {
    Some(p) => std::fs::read_to_string(p)
      .map_err(|e| eyre!("Failed to read input file {}: {}", p.display(), e))?,
    None => std::io::read_to_string(std::io::stdin())
      .map_err(|e| eyre!("Failed to read stdin: {}", e))?,
  };

  serde_json::from_str(&contents).map_err(|e| eyre!("Input is not valid JSON: {}", e))
}

fn print_json(value: &Value) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
