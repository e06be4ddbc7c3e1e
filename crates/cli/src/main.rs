//! Tienda CLI - database migrations and store management.
//!
//! # Usage
//!
//! ```bash
//! # Create the schema and the session table
//! tienda migrate
//!
//! # Load products and testimonials
//! tienda seed crates/cli/seed/catalog.yaml
//!
//! # Move an order along its lifecycle
//! tienda orders advance VGL202603011234 paid
//!
//! # Moderate reviews
//! tienda reviews list
//! tienda reviews approve 42
//! ```
//!
//! All commands read `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tienda")]
#[command(author, version, about = "Tienda CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed products and testimonials from a YAML file
    Seed {
        /// Path to the catalog file
        file: PathBuf,
    },
    /// Manage orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Moderate product reviews
    Reviews {
        #[command(subcommand)]
        action: ReviewAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Move an order to a new status
    Advance {
        /// Order number, e.g. `VGL202603011234`
        number: String,

        /// Target status (`paid`, `processing`, `shipped`, `delivered`, `cancelled`)
        status: String,
    },
}

#[derive(Subcommand)]
enum ReviewAction {
    /// List reviews waiting for approval
    List,
    /// Publish a review
    Approve {
        /// Review id
        id: i32,
    },
    /// Unpublish a review
    Hide {
        /// Review id
        id: i32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::catalog(&file).await?,
        Commands::Orders { action } => match action {
            OrderAction::Advance { number, status } => {
                commands::orders::advance(&number, &status).await?;
            }
        },
        Commands::Reviews { action } => match action {
            ReviewAction::List => commands::reviews::list().await?,
            ReviewAction::Approve { id } => commands::reviews::set_approved(id, true).await?,
            ReviewAction::Hide { id } => commands::reviews::set_approved(id, false).await?,
        },
    }
    Ok(())
}
