//! Visitors CLI - runs the people-visiting-websites scenario

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use visitors::config;
use visitors::storage::Store;

#[derive(Parser)]
#[command(name = "visitors")]
#[command(version)]
#[command(about = "Many-to-one persistence demo: people visiting one website, stored in SQLite")]
#[command(long_about = r#"
Creates the person and websites tables, inserts one website and three
people visiting it, then prints who Jeff has been visiting.

By default the store lives in memory and is gone when the program exits.

Example usage:
  visitors
  visitors --echo
  visitors --database sqlite:///visitors.db
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log every SQL statement
    #[arg(short, long)]
    echo: bool,

    /// Connection string (defaults to an in-memory database)
    #[arg(short, long)]
    database: Option<String>,

    /// TOML config file with `database` and `echo` keys
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout carries only the scenario output
    let filter = EnvFilter::new(config::log_filter(cli.verbose, cli.echo));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let file_config = match &cli.config {
        Some(path) => Some(config::load_config(path)?),
        None => None,
    };
    let settings = config::resolve(cli.database.as_deref(), cli.echo, file_config.as_ref())?;

    tracing::debug!("Connecting to {}", settings.database);
    let mut store = Store::from_url(&settings.database)?.with_echo(settings.echo);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    visitors::demo::run(&mut store, &mut out)?;

    Ok(())
}
