//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! cw-cli show --json
//! cw-cli add p1 --price 12.50
//! ```
//!
//! # Environment Variables
//!
//! - `CART_SERVICE_URL` - Base URL of the Cart Service
//! - `CART_API_TOKEN` - Bearer token; without it every mutation is refused

use std::fmt::Write as _;

use cartwright::{
    CartConfig, CartController, CartError, CartSnapshot, HttpCartService, ServiceError,
    SessionIdentity, SyncOutcome,
};
use cartwright_core::{CurrencyCode, Price, ProductKey, ProductRef};
use thiserror::Error;

use crate::Commands;

/// Errors that can occur while running a cart command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The Cart Service client could not be built.
    #[error("Cart Service client error: {0}")]
    Client(#[from] ServiceError),

    /// The controller refused the request.
    #[error("{0}")]
    Cart(#[from] CartError),

    /// The Cart Service call failed.
    #[error("Cart Service call failed: {0}")]
    Failed(String),

    /// JSON output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run one cart command against the configured Cart Service.
///
/// The cart is loaded first so the printed snapshot reflects the server.
///
/// # Errors
///
/// Returns `CommandError` if the client can't be built, the controller
/// refuses the request, or the Cart Service call fails.
pub async fn run(
    config: &CartConfig,
    command: Commands,
    json: bool,
    currency: CurrencyCode,
) -> Result<(), CommandError> {
    let service = HttpCartService::new(config)?;
    let identity = SessionIdentity::new(config.api_token.is_some());
    let controller = CartController::from_config(service, identity, config);

    check(controller.load_cart().await)?;

    let outcome = match command {
        Commands::Show => SyncOutcome::Skipped,
        Commands::Add { id, price, name } => {
            let product = ProductRef {
                id: Some(id),
                price,
                name,
                ..ProductRef::default()
            };
            controller.add_item(&product).await.inspect_err(hint)?
        }
        Commands::Remove { id } => controller
            .remove_item(&ProductKey::new(id))
            .await
            .inspect_err(hint)?,
        Commands::Set { id, quantity } => controller
            .update_quantity(&ProductKey::new(id), quantity)
            .await
            .inspect_err(hint)?,
        Commands::Clear => controller.clear_cart().await.inspect_err(hint)?,
    };
    check(outcome)?;

    let snapshot = controller.snapshot();
    let output = if json {
        serde_json::to_string_pretty(&snapshot)?
    } else {
        render(&snapshot, currency)
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{output}");
    }
    Ok(())
}

fn check(outcome: SyncOutcome) -> Result<(), CommandError> {
    match outcome {
        SyncOutcome::Failed(message) => Err(CommandError::Failed(message)),
        SyncOutcome::Applied | SyncOutcome::Skipped => Ok(()),
    }
}

fn hint(error: &CartError) {
    if error.requires_login() {
        tracing::warn!("Set CART_API_TOKEN to act as a signed-in customer");
    }
}

/// Plain-text table of the cart.
fn render(snapshot: &CartSnapshot, currency: CurrencyCode) -> String {
    if snapshot.is_empty() {
        return "Cart is empty".to_string();
    }

    let mut out = String::new();
    for line in &snapshot.lines {
        let key = line.key().map(ProductKey::into_inner).unwrap_or_default();
        let name = line.product.name.as_deref().unwrap_or("");
        let _ = writeln!(
            out,
            "{key:<16} {name:<24} {qty:>4} x {price:>10} = {line_total:>10}",
            qty = line.quantity,
            price = Price::new(line.product.unit_price(), currency).display(),
            line_total = Price::new(line.line_total(), currency).display(),
        );
    }
    let _ = write!(
        out,
        "{} item(s), total {} {}",
        snapshot.item_count,
        Price::new(snapshot.total, currency),
        currency.code()
    );
    out
}
