use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use libsql::Connection;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use flavors::config::Overrides;
use flavors::{Flavors, Loader, Module, Router, SqlStore, db};

#[derive(Parser)]
#[command(name = "flavors", version, about = "JSON CRUD service for ranked flavors")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Database URL (file path, :memory:, or libsql://)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Run the HTTP server (creates the table if it is missing)
    Serve {
        /// Insert the sample rows before serving
        #[arg(long)]
        seed: bool,
    },
    /// Create the flavors table
    Migrate {
        /// Drop the table (and every row) before recreating it
        #[arg(long)]
        reset: bool,
        /// Insert the sample rows afterwards
        #[arg(long)]
        seed: bool,
    },
}

impl Cli {
    /// The requested command; a bare invocation serves.
    fn selected(&self) -> Command {
        self.command.unwrap_or(Command::Serve { seed: false })
    }
}

/// Schema work done before a command proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SchemaSteps {
    reset: bool,
    seed: bool,
}

impl Command {
    fn schema_steps(&self) -> SchemaSteps {
        match *self {
            Command::Serve { seed } => SchemaSteps { reset: false, seed },
            Command::Migrate { reset, seed } => SchemaSteps { reset, seed },
        }
    }
}

/// Bring the schema up to date. Only `reset` destroys rows.
async fn prepare(conn: &Connection, steps: SchemaSteps) -> flavors::Result<()> {
    if steps.reset {
        db::reset(conn).await?;
    } else {
        db::migrate(conn).await?;
    }
    if steps.seed {
        db::seed(conn).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> flavors::Result<()> {
    let config = Loader::default().load(
        cli.config.as_deref(),
        Overrides {
            host: cli.host.as_deref(),
            port: cli.port,
            database_url: cli.database_url.as_deref(),
        },
    )?;

    let store = SqlStore::new(db::connect(&config.database.url).await?)?;
    info!("Connected to database");

    let command = cli.selected();
    prepare(store.connection(), command.schema_steps()).await?;

    match command {
        Command::Migrate { .. } => Ok(()),
        Command::Serve { .. } => {
            let module = Flavors::new(Arc::new(store));
            let mut router = Router::new();
            module.routes(&mut router);
            info!("Registered module {}", module.name());

            flavors::server::run(config, router.into_handle()).await
        }
    }
}
