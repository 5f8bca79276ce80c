//! # CLI
//!
//! Argument parsing and dispatch. Configuration comes from the environment;
//! flags override individual fields.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::observability::{Logger, Severity};
use crate::server::HttpServer;
use crate::store::MongoStore;

#[derive(Debug, Parser)]
#[command(name = "docgate", version, about = "REST gateway for a document store")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the gateway (the default)
    Serve {
        /// Port to bind to (overrides PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Store connection string (overrides MONGODB_URI)
        #[arg(long)]
        mongodb_uri: Option<String>,

        /// Database name (overrides MONGODB_DATABASE)
        #[arg(long)]
        database: Option<String>,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve {
        port: None,
        mongodb_uri: None,
        database: None,
    });

    match command {
        Command::Serve {
            port,
            mongodb_uri,
            database,
        } => {
            let mut config = Config::from_env();
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(uri) = mongodb_uri {
                config.mongodb_uri = uri;
            }
            if let Some(database) = database {
                config.database = database;
            }

            // Every endpoint is credential-gated; an unconfigured pair must
            // not come up as an open server.
            if config.auth_username.is_empty() || config.auth_password.is_empty() {
                return Err("AUTH_USERNAME and AUTH_PASSWORD must be set".into());
            }

            // The store must be reachable before the first request is served.
            let store = MongoStore::connect(&config.mongodb_uri, &config.database).await?;
            Logger::log(
                Severity::Info,
                "store_connected",
                &[("database", config.database.clone())],
            );

            HttpServer::new(config, Arc::new(store)).start().await?;
            Ok(())
        }
    }
}
