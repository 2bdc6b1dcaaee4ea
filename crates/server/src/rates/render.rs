//! Conversion of selected routes into Shopify rate objects.

use carrier_rates_core::{CurrencyCode, Price, PriceError, RouteQuote};
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Service code of the combined "ship separately" option.
pub const SEPARATE_SERVICE_CODE: &str = "INDIVIDUAL_SHIPPING";

const CONSOLIDATED_NAME_SUFFIX: &str = " (Consolidated)";
const CONSOLIDATED_CODE_SUFFIX: &str = "_CONSOLIDATED";

/// One rate in the carrier-service response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRate {
    pub service_name: String,
    pub service_code: String,
    /// Price in minor units (fen), as a string.
    pub total_price: String,
    pub currency: String,
    pub min_delivery_date: String,
    pub max_delivery_date: String,
}

/// Sum of the cheapest route for every cart line shipped on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparateShipping {
    pub packages: usize,
    pub price: Decimal,
    pub min_days: u32,
    pub max_days: u32,
}

impl SeparateShipping {
    /// Combine per-line routes. `None` if there are none.
    ///
    /// Transit days are the mean over lines, rounded up.
    #[must_use]
    pub fn combine(routes: &[RouteQuote]) -> Option<Self> {
        let packages = routes.len();
        let count = u32::try_from(packages).ok().filter(|n| *n > 0)?;

        let price = routes.iter().map(|route| route.price).sum();
        let min_total: u32 = routes.iter().map(|route| route.min_days).sum();
        let max_total: u32 = routes.iter().map(|route| route.max_days).sum();

        Some(Self {
            packages,
            price,
            min_days: min_total.div_ceil(count),
            max_days: max_total.div_ceil(count),
        })
    }
}

/// Render the selected routes, plus the separate option when there is one.
///
/// # Errors
///
/// Returns `PriceError` if a price cannot be expressed in minor units.
pub fn render_rates(
    routes: &[RouteQuote],
    separate: Option<&SeparateShipping>,
    today: NaiveDate,
) -> Result<Vec<ShippingRate>, PriceError> {
    let (name_suffix, code_suffix) = if separate.is_some() {
        (CONSOLIDATED_NAME_SUFFIX, CONSOLIDATED_CODE_SUFFIX)
    } else {
        ("", "")
    };

    let mut rates = routes
        .iter()
        .map(|route| {
            rate(
                format!("{}{name_suffix}", route.service_name),
                format!("{}{code_suffix}", route.service_code),
                route.price,
                (route.min_days, route.max_days),
                today,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(separate) = separate {
        rates.push(rate(
            format!("Ship Separately ({} packages)", separate.packages),
            SEPARATE_SERVICE_CODE.to_string(),
            separate.price,
            (separate.min_days, separate.max_days),
            today,
        )?);
    }

    Ok(rates)
}

fn rate(
    service_name: String,
    service_code: String,
    price: Decimal,
    (min_days, max_days): (u32, u32),
    today: NaiveDate,
) -> Result<ShippingRate, PriceError> {
    let cents = Price::new(price, CurrencyCode::CNY).minor_units_ceil()?;

    Ok(ShippingRate {
        service_name,
        service_code,
        total_price: cents.to_string(),
        currency: CurrencyCode::CNY.code().to_string(),
        min_delivery_date: delivery_date(today, min_days),
        max_delivery_date: delivery_date(today, max_days),
    })
}

fn delivery_date(today: NaiveDate, days: u32) -> String {
    today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string()
}
