//! Route selection pipeline.
//!
//! The aggregator returns dozens of near-identical channels. Checkout should
//! show a handful of meaningfully different options. Each stage is a pure
//! function over the route list; [`select`] composes them in order:
//!
//! 1. [`exclude_ineligible`] - cargo restrictions, country rules, weight band, price
//! 2. [`prepare`] - transit buffers, display names, unique codes
//! 3. [`remove_dominated`] - drop routes both slower and dearer than another
//! 4. [`collapse_price_buckets`] - one route per price bucket
//! 5. [`collapse_similar_windows`] - one route per delivery window
//! 6. [`collapse_price_proximity`] - one route per 10% price band
//! 7. [`apply_carrier_rule`] - one route per Aramex/EMS family, unique names
//!
//! UPS, DHL and FedEx routes survive every collapsing stage.

use std::collections::HashMap;

use carrier_rates_core::{CarrierFamily, CurrencyCode, RouteQuote};
use rust_decimal::{Decimal, RoundingStrategy};

use super::naming;

/// Name fragments of channels that refuse general merchandise.
const EXCLUDED_KEYWORDS: &[&str] = &[
    "battery",
    "batteries",
    "battries",
    "liquid",
    "powder",
    "knife",
    "magnet",
    "eub",
    "clothing",
    "clothes",
    "fashion",
    "slow",
    "ocean",
    "heavy cargo",
    "post",
    "freight",
];

/// Excluded fragments that are acceptable for clothing carts.
const CLOTHING_KEYWORDS: &[&str] = &["clothing", "clothes", "fashion"];

/// Excluded fragments that are acceptable for battery carts.
const BATTERY_KEYWORDS: &[&str] = &["battery", "batteries", "battries"];

/// Per-country overrides applied on top of the keyword list.
struct CountryRule {
    country: &'static str,
    /// Names containing every fragment of any entry skip keyword exclusion.
    allow: &'static [&'static [&'static str]],
    /// Names containing any of these are always excluded.
    deny: &'static [&'static str],
}

const COUNTRY_RULES: &[CountryRule] = &[
    CountryRule {
        country: "PH",
        allow: &[&["philippines air express", "batteries"]],
        deny: &[],
    },
    CountryRule {
        country: "NZ",
        allow: &[],
        deny: &["etk-hb", "ems preferential line-hz"],
    },
];

/// Name fragment of slow consolidated services that get a transit buffer.
const SMALL_PACKAGE_MARKER: &str = "small package";

/// Shipment facts the pipeline filters against.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterContext {
    /// Destination ISO code, upper-cased.
    pub country_code: String,
    /// Packed parcel weight.
    pub weight_kg: f64,
    /// Checkout currency, which sets the price bucket width.
    pub currency: CurrencyCode,
    pub is_clothing: bool,
    pub is_battery: bool,
}

/// Run the full pipeline. The result is sorted by price, then arrival.
#[must_use]
pub fn select(routes: Vec<RouteQuote>, ctx: &FilterContext) -> Vec<RouteQuote> {
    let received = routes.len();

    let routes = exclude_ineligible(routes, ctx);
    let eligible = routes.len();
    let routes = prepare(routes);
    let routes = remove_dominated(routes);
    let undominated = routes.len();
    let routes = collapse_price_buckets(routes, ctx.currency);
    let routes = collapse_similar_windows(routes);
    let routes = collapse_price_proximity(routes);
    let routes = apply_carrier_rule(routes);

    tracing::debug!(
        received,
        eligible,
        undominated,
        selected = routes.len(),
        "Route selection complete"
    );
    routes
}

/// Cheapest route that passes eligibility, prepared for display.
#[must_use]
pub fn cheapest_eligible(routes: Vec<RouteQuote>, ctx: &FilterContext) -> Option<RouteQuote> {
    prepare(exclude_ineligible(routes, ctx))
        .into_iter()
        .min_by(|a, b| a.price.cmp(&b.price).then(a.max_days.cmp(&b.max_days)))
}

// =============================================================================
// Stage 1: Eligibility
// =============================================================================

/// Drop routes that cannot carry this shipment.
#[must_use]
pub fn exclude_ineligible(routes: Vec<RouteQuote>, ctx: &FilterContext) -> Vec<RouteQuote> {
    let rule = COUNTRY_RULES
        .iter()
        .find(|rule| rule.country == ctx.country_code);

    routes
        .into_iter()
        .filter(|route| match exclusion_reason(route, ctx, rule) {
            Some(reason) => {
                tracing::trace!(route = %route.service_name, reason, "Route excluded");
                false
            }
            None => true,
        })
        .collect()
}

fn exclusion_reason(
    route: &RouteQuote,
    ctx: &FilterContext,
    rule: Option<&CountryRule>,
) -> Option<&'static str> {
    let name = route.service_name.to_lowercase();

    if !route.available {
        return Some("unavailable");
    }

    let allowed_by_country = rule.is_some_and(|rule| {
        rule.allow
            .iter()
            .any(|fragments| fragments.iter().all(|f| name.contains(f)))
    });

    if !allowed_by_country
        && EXCLUDED_KEYWORDS
            .iter()
            .any(|keyword| name.contains(keyword) && !keyword_lifted(keyword, ctx))
    {
        return Some("restricted cargo keyword");
    }

    if rule.is_some_and(|rule| rule.deny.iter().any(|f| name.contains(f))) {
        return Some("excluded for destination");
    }

    if !route.accepts_weight(ctx.weight_kg) {
        return Some("outside weight band");
    }

    if route.price <= Decimal::ZERO {
        return Some("non-positive price");
    }

    None
}

fn keyword_lifted(keyword: &str, ctx: &FilterContext) -> bool {
    (ctx.is_clothing && CLOTHING_KEYWORDS.contains(&keyword))
        || (ctx.is_battery && BATTERY_KEYWORDS.contains(&keyword))
}

// =============================================================================
// Preparation
// =============================================================================

/// Apply transit buffers, clean display names and assign unique codes.
///
/// Runs on raw aggregator names, so it must follow eligibility.
#[must_use]
pub fn prepare(routes: Vec<RouteQuote>) -> Vec<RouteQuote> {
    routes
        .into_iter()
        .enumerate()
        .map(|(index, mut route)| {
            if route
                .service_name
                .to_lowercase()
                .contains(SMALL_PACKAGE_MARKER)
            {
                route.min_days = buffered_days(route.min_days);
                route.max_days = buffered_days(route.max_days);
            }
            route.service_name = naming::display_name(&route.service_name);
            route.carrier = CarrierFamily::classify(&route.service_name);
            route.service_code = naming::service_code(&route.service_name, index, route.price);
            route
        })
        .collect()
}

/// `ceil(days * 1.3) + 2`, in integer arithmetic.
const fn buffered_days(days: u32) -> u32 {
    (days.saturating_mul(13)).div_ceil(10).saturating_add(2)
}

// =============================================================================
// Stage 2: Dominance
// =============================================================================

/// Drop any non-premium route for which another route is both strictly
/// faster (lower `max_days`) and strictly cheaper.
#[must_use]
pub fn remove_dominated(routes: Vec<RouteQuote>) -> Vec<RouteQuote> {
    let dominated: Vec<bool> = routes
        .iter()
        .map(|a| {
            !a.is_premium()
                && routes
                    .iter()
                    .any(|b| b.max_days < a.max_days && b.price < a.price)
        })
        .collect();

    routes
        .into_iter()
        .zip(dominated)
        .filter_map(|(route, dominated)| (!dominated).then_some(route))
        .collect()
}

// =============================================================================
// Stage 3: Price buckets
// =============================================================================

/// Bucket a price: nearest 0.50 for GBP/USD checkouts, nearest cent otherwise.
#[must_use]
pub fn price_bucket(price: Decimal, currency: CurrencyCode) -> Decimal {
    if currency.uses_half_unit_buckets() {
        (price * Decimal::TWO).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            / Decimal::TWO
    } else {
        price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Keep one non-premium route per price bucket, preferring the faster one.
#[must_use]
pub fn collapse_price_buckets(routes: Vec<RouteQuote>, currency: CurrencyCode) -> Vec<RouteQuote> {
    let mut kept: Vec<RouteQuote> = Vec::with_capacity(routes.len());
    let mut buckets: HashMap<Decimal, usize> = HashMap::new();

    for route in routes {
        if route.is_premium() {
            kept.push(route);
            continue;
        }

        let bucket = price_bucket(route.price, currency);
        match buckets.get(&bucket).and_then(|&index| kept.get_mut(index)) {
            Some(existing) => {
                if route.delivery_rank() < existing.delivery_rank() {
                    *existing = route;
                }
            }
            None => {
                buckets.insert(bucket, kept.len());
                kept.push(route);
            }
        }
    }

    kept
}

// =============================================================================
// Stage 4: Delivery windows
// =============================================================================

const WINDOW_MAX_DAYS_TOLERANCE: u32 = 2;
const WINDOW_MIN_DAYS_TOLERANCE: u32 = 3;

fn similar_window(a: &RouteQuote, b: &RouteQuote) -> bool {
    a.max_days.abs_diff(b.max_days) <= WINDOW_MAX_DAYS_TOLERANCE
        && a.min_days.abs_diff(b.min_days) <= WINDOW_MIN_DAYS_TOLERANCE
}

/// Keep the cheapest non-premium route among those with similar windows.
#[must_use]
pub fn collapse_similar_windows(routes: Vec<RouteQuote>) -> Vec<RouteQuote> {
    collapse_non_premium(routes, similar_window, |candidate, existing| {
        candidate.price < existing.price
    })
}

// =============================================================================
// Stage 5: Price proximity
// =============================================================================

/// Whether two prices differ by at most 10% of the lower one.
fn within_ten_percent(a: &RouteQuote, b: &RouteQuote) -> bool {
    let lower = a.price.min(b.price);
    (a.price - b.price).abs() * Decimal::TEN <= lower
}

/// Keep the fastest non-premium route among those within 10% on price.
#[must_use]
pub fn collapse_price_proximity(routes: Vec<RouteQuote>) -> Vec<RouteQuote> {
    collapse_non_premium(routes, within_ten_percent, |candidate, existing| {
        candidate.max_days < existing.max_days
    })
}

/// Greedy collapse: each non-premium route is compared with the first kept
/// non-premium route it `matches`; it replaces that route if `better`,
/// otherwise it is dropped.
fn collapse_non_premium(
    routes: Vec<RouteQuote>,
    matches: impl Fn(&RouteQuote, &RouteQuote) -> bool,
    better: impl Fn(&RouteQuote, &RouteQuote) -> bool,
) -> Vec<RouteQuote> {
    let mut kept: Vec<RouteQuote> = Vec::with_capacity(routes.len());

    for route in routes {
        if route.is_premium() {
            kept.push(route);
            continue;
        }

        match kept
            .iter_mut()
            .find(|existing| !existing.is_premium() && matches(&route, existing))
        {
            Some(existing) => {
                if better(&route, existing) {
                    *existing = route;
                }
            }
            None => kept.push(route),
        }
    }

    kept
}

// =============================================================================
// Stage 6: Carrier rule
// =============================================================================

/// One route each for Aramex and EMS, then unique display names, cheapest first.
#[must_use]
pub fn apply_carrier_rule(routes: Vec<RouteQuote>) -> Vec<RouteQuote> {
    let mut kept: Vec<RouteQuote> = Vec::with_capacity(routes.len());
    let mut family_slot: HashMap<CarrierFamily, usize> = HashMap::new();

    for route in routes {
        if !route.carrier.keeps_cheapest_only() {
            kept.push(route);
            continue;
        }

        match family_slot
            .get(&route.carrier)
            .and_then(|&index| kept.get_mut(index))
        {
            Some(existing) => {
                if route.price < existing.price {
                    *existing = route;
                }
            }
            None => {
                family_slot.insert(route.carrier, kept.len());
                kept.push(route);
            }
        }
    }

    kept.sort_by(|a, b| a.price.cmp(&b.price).then(a.max_days.cmp(&b.max_days)));

    let mut seen_names = std::collections::HashSet::new();
    kept.retain(|route| seen_names.insert(route.service_name.clone()));
    kept
}
