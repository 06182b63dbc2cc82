use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sp_cli::commands::{convert, delete, list, status, upload};
use sp_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config: &Config) -> Result<sp_db::Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = sp_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok(db.with_id_style(config.id_style))
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();

    match &cli.command {
        Some(Commands::Convert(args)) => {
            // Convert doesn't touch the database
            let config = load_config(cli.config.as_deref())?;
            let count = convert::run(&mut stdout, args, &config)?;
            match &args.output {
                Some(path) => eprintln!(
                    "Conversion complete! Created {} with {count} tasks.",
                    path.display()
                ),
                None => eprintln!("Conversion complete! {count} tasks."),
            }
        }
        Some(Commands::Upload(args)) => {
            let config = load_config(cli.config.as_deref())?;
            let mut db = open_database(&config)?;
            upload::run(&mut stdout, &mut db, args, &config)?;
        }
        Some(Commands::List { json }) => {
            let config = load_config(cli.config.as_deref())?;
            let db = open_database(&config)?;
            list::run(&mut stdout, &db, *json)?;
        }
        Some(Commands::Status) => {
            let config = load_config(cli.config.as_deref())?;
            let db = open_database(&config)?;
            status::run(&mut stdout, &db, &config.database_path)?;
        }
        Some(Commands::Delete { yes }) => {
            let config = load_config(cli.config.as_deref())?;
            let mut db = open_database(&config)?;
            delete::run(&mut stdout, &mut db, *yes)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
