//! Customer-facing route names and unique service codes.
//!
//! Aggregator channel names carry warehouse codes, cargo classes and vendor
//! prefixes that mean nothing at checkout. Rules run in order; each one sees
//! the output of the previous.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

const MAX_CODE_BASE_LEN: usize = 30;
const MAX_CODE_LEN: usize = 50;
const PRICE_HASH_DIGITS: usize = 6;

/// (pattern, replacement) pairs applied in order.
const NAME_RULES: &[(&str, &str)] = &[
    (r"(?i)NL\s+Post\s+Preferential\s+(?:\(Standard\)\s+)?Air\s*Mail", "Standard Air Mail"),
    (r"(?i)Yun\s?Express", "Express"),
    (r"(?i)\s*\(General\)\s*$", ""),
    (r"(?i)^EUB(?:-H[BZ])?$", "ePacket"),
    (r"(?i)^EUB-", "ePacket "),
    (r"(?i)^ETK(?:-HB)?$", "ePacket"),
    (r"(?i)^ETK-", "ePacket "),
    (r"^HK\s+", ""),
    (r"\(HK\)", ""),
    (r"(?i)\s*Preferential\s+Line\s*$", ""),
    (r"\s*-\d+\s*$", ""),
    (r"(?i)\s*Preferential\s*$", ""),
    (r"(?i)\((?:General|Special)(?:\s+Cargo)?\)", " "),
    (r"(?i)^(?:UK|US)\s+Duty[-\s]Free\s+", ""),
    (r"(?i)^Duty[-\s]Free\s+", ""),
    (r"(?i)\s+Duty[-\s]Free\b", ""),
    (r"(?i)US\s+Ocean\s+Carriage", "Ocean Shipping"),
    (r"(?i)\s*\(Regular\s+Ship\)", ""),
    (r"(?i)\s+Regular\s+Ship\s*$", ""),
    (r"(?i)Express\s+Fast\s+Express", "Express Fast"),
    (r"(?i)Express\s+Express", "Express"),
];

static COMPILED_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    NAME_RULES
        .iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).expect("Invalid regex"), *replacement))
        .collect()
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Clean an aggregator channel name for display.
///
/// Falls back to the trimmed raw name if cleaning would leave nothing.
#[must_use]
pub fn display_name(raw: &str) -> String {
    let mut name = raw.trim().to_string();
    for (pattern, replacement) in COMPILED_RULES.iter() {
        name = pattern.replace_all(&name, *replacement).into_owned();
    }

    let name = WHITESPACE_RE.replace_all(&name, " ").trim().to_string();
    if name.is_empty() {
        raw.trim().to_string()
    } else {
        name
    }
}

/// Synthetic service code, unique within one response.
///
/// `{NAME}_{index}_{price digits}`, where NAME is the upper-cased display name
/// reduced to `[A-Z0-9_]`.
#[must_use]
pub fn service_code(display_name: &str, index: usize, price: Decimal) -> String {
    let mut base = String::with_capacity(display_name.len());
    for c in display_name.to_ascii_uppercase().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' };
        if !(c == '_' && base.ends_with('_')) {
            base.push(c);
        }
    }
    let base: String = base
        .trim_matches('_')
        .chars()
        .take(MAX_CODE_BASE_LEN)
        .collect();
    let base = if base.is_empty() { "ROUTE".to_string() } else { base };

    let price_hash: String = (price * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .unwrap_or_default()
        .unsigned_abs()
        .to_string()
        .chars()
        .take(PRICE_HASH_DIGITS)
        .collect();

    format!("{base}_{index}_{price_hash}")
        .chars()
        .take(MAX_CODE_LEN)
        .collect()
}
