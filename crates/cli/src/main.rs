//! ragent CLI, the main entry point.
//!
//! Commands:
//! - `serve`    Start the HTTP/WebSocket API
//! - `chat`     Ask one question from the terminal
//! - `ingest`   Embed a file and store it for retrieval
//! - `tools`    List the tools the model may call
//! - `migrate`  Create the vector-store schema
//! - `config`   Print the effective or default configuration

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ragent_config::AppConfig;

mod commands {
    pub mod chat;
    pub mod config_cmd;
    pub mod ingest;
    pub mod migrate;
    pub mod serve;
    pub mod tools;
}

#[derive(Parser)]
#[command(
    name = "ragent",
    about = "Retrieval-augmented chat agent with business tools",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $RAGENT_CONFIG or ./ragent.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one message to the agent and print the answer
    Chat {
        message: String,

        /// Print the answer as it streams in
        #[arg(short, long)]
        stream: bool,

        /// Reuse a conversation id
        #[arg(long)]
        conversation_id: Option<String>,
    },

    /// Embed a text file and add it to the vector store
    Ingest {
        file: PathBuf,

        /// Stored as `metadata.source` (defaults to the file name)
        #[arg(long)]
        source: Option<String>,
    },

    /// List the tools offered to the model
    Tools {
        /// Print full JSON schemas
        #[arg(long)]
        schema: bool,
    },

    /// Create the vector-store extension, table and index
    Migrate,

    /// Print configuration
    Config {
        /// Print the built-in defaults as TOML instead
        #[arg(long)]
        default: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => AppConfig::load().context("Failed to load config"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    if let Commands::Config { default: true } = cli.command {
        return commands::config_cmd::print_default();
    }

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await,
        Commands::Chat {
            message,
            stream,
            conversation_id,
        } => commands::chat::run(config, message, conversation_id, stream).await,
        Commands::Ingest { file, source } => commands::ingest::run(config, &file, source).await,
        Commands::Tools { schema } => commands::tools::run(&config, schema),
        Commands::Migrate => commands::migrate::run(&config).await,
        Commands::Config { .. } => commands::config_cmd::print_effective(&config),
    }
}
