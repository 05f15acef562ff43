mod app;
mod cache;
mod catalog;
mod client;
mod commands;
mod config;
mod event;
mod logging;
mod query;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "prodcat")]
#[command(about = "A terminal UI for browsing and editing a REST product catalog")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./prodcat.yaml, then $XDG_CONFIG_HOME/prodcat/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Catalog service base URL (overrides config and PRODCAT_BASE_URL)
  #[arg(short, long)]
  base_url: Option<String>,

  /// Products per page
  #[arg(short, long)]
  page_size: Option<u32>,

  /// Directory for log files (default: $XDG_DATA_HOME/prodcat/logs)
  #[arg(long)]
  log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let overrides = config::Overrides {
    base_url: args.base_url,
    page_size: args.page_size,
  };
  let config = config::Config::load(args.config.as_deref())?
    .with_overrides(std::env::var(config::BASE_URL_ENV).ok(), &overrides)?;

  let log_dir = args.log_dir.unwrap_or_else(logging::default_log_dir);
  let _log_guard = logging::init(&log_dir)?;
  info!(base_url = %config.catalog.base_url, "Starting prodcat");

  // Initialize and run the app
  let api = catalog::CatalogApi::connect(&config)?;
  let mut app = app::App::new(api, &config);
  app.run().await?;

  info!("Bye");
  Ok(())
}
