//! One-off quote against the live aggregator.
//!
//! Runs the same parcel aggregation and route selection as the checkout
//! callback, without the cache or the deadline, and prints the result.
//!
//! # Environment Variables
//!
//! - `BUCKYDROP_APP_CODE`, `BUCKYDROP_APP_SECRET` - Aggregator credentials
//! - `BUCKYDROP_BASE_URL`, `BUCKYDROP_API_PATH` - Optional endpoint overrides

use carrier_rates_core::{CurrencyCode, Destination, ProductId};
use carrier_rates_server::catalog::ProductFacts;
use carrier_rates_server::config::FreightConfig;
use carrier_rates_server::freight::FreightClient;
use carrier_rates_server::rates::filter;
use carrier_rates_server::rates::render::render_rates;
use carrier_rates_server::rates::{LineItem, RateRequest, Shipment};
use chrono::Utc;

use super::CommandError;

#[derive(Debug, clap::Args)]
pub struct QuoteArgs {
    /// Destination ISO country code
    #[arg(long)]
    country: String,

    /// Destination postal code
    #[arg(long, default_value = "")]
    postcode: String,

    /// Destination province or state code
    #[arg(long, default_value = "")]
    province: String,

    /// Unit weight in grams
    #[arg(long)]
    grams: f64,

    /// Number of units
    #[arg(long, default_value_t = 1)]
    quantity: u32,

    /// Product height in millimetres
    #[arg(long)]
    height_mm: Option<f64>,

    /// Product diameter in millimetres
    #[arg(long)]
    diameter_mm: Option<f64>,

    /// Item name, which decides the clothing and battery flags
    #[arg(long, default_value = "")]
    name: String,

    /// Checkout currency, which sets the price bucket width
    #[arg(long, default_value = "AUD")]
    currency: String,
}

/// Quote one parcel and print the selected routes.
///
/// # Errors
///
/// Returns an error if the arguments are invalid, aggregator credentials are
/// missing, or the aggregator call fails.
pub async fn run(args: QuoteArgs) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let destination = Destination::new(
        &args.country,
        &args.province,
        &args.province,
        &args.postcode,
        "",
    );
    if !destination.has_country() {
        return Err(CommandError::InvalidArgument(format!(
            "country must be a two-letter ISO code, got {:?}",
            args.country
        ))
        .into());
    }

    let request = RateRequest {
        destination,
        line_items: vec![LineItem {
            product_id: ProductId::new(1),
            variant_id: None,
            quantity: args.quantity.max(1),
            grams: args.grams,
            name: args.name,
        }],
        currency: CurrencyCode::from_code(&args.currency),
    };
    let facts = ProductFacts {
        weight_kg: None,
        height_mm: args.height_mm,
        diameter_mm: args.diameter_mm,
    };
    let shipment = Shipment::new("cli", request, vec![Some(facts)]);

    tracing::info!(
        country = %shipment.country.name,
        weight_kg = shipment.weight_kg,
        parcel = ?shipment.parcel,
        "Quoting parcel"
    );

    let client = FreightClient::new(&FreightConfig::from_env()?)?;
    let routes = client.fetch_rates(&shipment.consolidated_query()).await?;
    let received = routes.len();

    let selected = filter::select(routes, &shipment.filter_context());
    let rates = render_rates(&selected, None, Utc::now().date_naive())?;

    #[allow(clippy::print_stdout)]
    {
        println!(
            "{received} routes received, {} selected for {} ({})",
            rates.len(),
            shipment.country.name,
            shipment.country.code
        );
        for rate in &rates {
            println!(
                "  {:<40} {:<44} {:>8} fen  {} .. {}",
                rate.service_name,
                rate.service_code,
                rate.total_price,
                rate.min_delivery_date,
                rate.max_delivery_date
            );
        }
    }

    Ok(())
}
