//! Binary entry point for the CycleGraph service and local CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cyclegraph::command as cgql;
use cyclegraph::config::ServerConfig;
use cyclegraph::server;
use cyclegraph::SqliteStore;

#[derive(Parser, Debug)]
#[command(
    name = "cyclegraph",
    version,
    about = "Multi-tenant transaction-graph cycle service",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service
    Serve(ServeCmd),
    /// Create or refresh the system schema in a store file
    Init(InitCmd),
    /// Run one cgql command against a local store and print the JSON result
    Exec(ExecCmd),
}

#[derive(Args, Debug)]
struct ServeCmd {
    /// TOML config file; flags below override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Network interface to bind to
    #[arg(long)]
    host: Option<IpAddr>,

    /// Listening port
    #[arg(long)]
    port: Option<u16>,

    /// Path of the SQLite store file
    #[arg(long, value_name = "DB")]
    db: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InitCmd {
    /// Store file to initialize
    #[arg(value_name = "DB")]
    db_path: PathBuf,
}

#[derive(Args, Debug)]
struct ExecCmd {
    /// Store file to run against
    #[arg(long, value_name = "DB")]
    db: PathBuf,

    /// Tenant to act as; register and login need none
    #[arg(long = "as", value_name = "USER")]
    actor: Option<String>,

    /// The cgql command, e.g. `query cycle --start 1 --depth 6`
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required = true
    )]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(cmd) => {
            let mut config = match &cmd.config {
                Some(path) => ServerConfig::load(path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = cmd.host {
                config.host = host;
            }
            if let Some(port) = cmd.port {
                config.port = port;
            }
            if let Some(db) = cmd.db {
                config.db_path = db;
            }
            server::serve(config).await?;
        }
        Command::Init(cmd) => {
            SqliteStore::open(&cmd.db_path)?;
            println!("initialized store at {}", cmd.db_path.display());
        }
        Command::Exec(cmd) => {
            server::install_tracing_subscriber();
            let store = SqliteStore::open(&cmd.db)?;
            let result = cgql::execute(&store, cmd.actor.as_deref(), &cmd.command);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
