//! Carrier rates CLI - database migrations, catalog management and test quotes.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! carrier-rates migrate
//!
//! # Record the weight and dimensions of a product
//! carrier-rates facts set --shop store.myshopify.com --product-id 7504138731625 \
//!     --weight-kg 0.48 --height-mm 220 --diameter-mm 90
//!
//! # Disable the "ship separately" option for a shop
//! carrier-rates shop set --shop store.myshopify.com --ship-separately false
//!
//! # Quote a parcel against the live aggregator
//! carrier-rates quote --country AU --postcode 3000 --grams 480
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `facts set` - Upsert product facts
//! - `shop set` - Upsert shop settings
//! - `quote` - Fetch and filter routes for one parcel

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "carrier-rates")]
#[command(author, version, about = "Carrier rates CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage product facts
    Facts {
        #[command(subcommand)]
        action: FactsAction,
    },
    /// Manage shop settings
    Shop {
        #[command(subcommand)]
        action: ShopAction,
    },
    /// Quote a parcel and print the routes checkout would show
    Quote(commands::quote::QuoteArgs),
}

#[derive(Subcommand)]
enum FactsAction {
    /// Insert or replace the facts for a product
    Set {
        /// Shop domain (e.g. store.myshopify.com)
        #[arg(long)]
        shop: String,

        /// Shopify product ID
        #[arg(long)]
        product_id: i64,

        /// Unit weight in kilograms
        #[arg(long)]
        weight_kg: Option<f64>,

        /// Height in millimetres
        #[arg(long)]
        height_mm: Option<f64>,

        /// Diameter (or width) in millimetres
        #[arg(long)]
        diameter_mm: Option<f64>,
    },
}

#[derive(Subcommand)]
enum ShopAction {
    /// Insert or replace a shop's settings
    Set {
        /// Shop domain (e.g. store.myshopify.com)
        #[arg(long)]
        shop: String,

        /// Offer a combined "ship separately" rate for multi-item carts
        #[arg(long, action = clap::ArgAction::Set)]
        ship_separately: bool,
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
        Commands::Facts { action } => match action {
            FactsAction::Set {
                shop,
                product_id,
                weight_kg,
                height_mm,
                diameter_mm,
            } => {
                commands::catalog::set_facts(&shop, product_id, weight_kg, height_mm, diameter_mm)
                    .await?;
            }
        },
        Commands::Shop { action } => match action {
            ShopAction::Set {
                shop,
                ship_separately,
            } => commands::catalog::set_shop(&shop, ship_separately).await?,
        },
        Commands::Quote(args) => commands::quote::run(args).await?,
    }
    Ok(())
}
