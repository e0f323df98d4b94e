//! Cartwright CLI - Inspect and edit the signed-in customer's cart.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! cw-cli show
//!
//! # Add one unit of a product
//! cw-cli add p1 --price 19.99 --name "Ceramic Mug"
//!
//! # Change a quantity, remove a line, empty the cart
//! cw-cli set p1 3
//! cw-cli remove p1
//! cw-cli clear
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart
//! - `add` - Add one unit of a product
//! - `remove` - Remove a product's line
//! - `set` - Set a product's quantity
//! - `clear` - Empty the cart
//!
//! Configuration comes from the environment (see `cartwright::config`). A
//! configured `CART_API_TOKEN` means a signed-in session.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cartwright::CartConfig;
use cartwright_core::CurrencyCode;

mod commands;

#[derive(Parser)]
#[command(name = "cw-cli")]
#[command(author, version, about = "Cartwright cart tools")]
struct Cli {
    /// Print the cart as JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    /// ISO 4217 currency used to format prices
    #[arg(long, global = true, default_value = "USD")]
    currency: CurrencyCode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print the cart
    Show,
    /// Add one unit of a product
    Add {
        /// Product identifier
        id: String,

        /// Unit price
        #[arg(short, long)]
        price: Option<Decimal>,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Remove a product's line
    Remove {
        /// Product identifier
        id: String,
    },
    /// Set a product's quantity
    Set {
        /// Product identifier
        id: String,

        /// New quantity (must be positive; use `remove` to drop the line)
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Tracing isn't up yet; fall back to a plain subscriber for this one error
            tracing_subscriber::fmt::init();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartwright=info,cartwright_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = commands::cart::run(&config, cli.command, cli.json, cli.currency).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}
