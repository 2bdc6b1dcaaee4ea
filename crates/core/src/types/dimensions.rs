//! Parcel padding applied before quoting.
//!
//! Carriers charge on the packed parcel, not the bare product. Every quote
//! pads the weight by 15% (at least 200 g) and each side by 2 cm. Missing or
//! nonsensical inputs fall back to a small parcel so a quote is always
//! possible.

use serde::Serialize;

/// Weight used when a product has no usable weight.
pub const DEFAULT_WEIGHT_KG: f64 = 0.1;

/// Height and diameter used when a product has no usable dimensions.
pub const DEFAULT_SIDE_MM: f64 = 100.0;

const MIN_PACKING_KG: f64 = 0.2;
const PACKING_RATIO: f64 = 0.15;
const PADDING_CM: f64 = 2.0;

/// Packed parcel dimensions as sent to the freight aggregator.
///
/// The diameter stands in for both length and width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdjustedDimensions {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub diameter_cm: f64,
}

/// Pad raw product measurements into parcel measurements.
///
/// Deterministic: the same inputs always produce bit-identical outputs.
#[must_use]
pub fn adjust_dimensions(
    raw_weight_kg: Option<f64>,
    raw_height_mm: Option<f64>,
    raw_diameter_mm: Option<f64>,
) -> AdjustedDimensions {
    let weight = usable(raw_weight_kg).unwrap_or(DEFAULT_WEIGHT_KG);
    let height = usable(raw_height_mm).unwrap_or(DEFAULT_SIDE_MM);
    let diameter = usable(raw_diameter_mm).unwrap_or(DEFAULT_SIDE_MM);

    AdjustedDimensions {
        weight_kg: round_to(weight + (weight * PACKING_RATIO).max(MIN_PACKING_KG), 3),
        height_cm: pad_side(height),
        diameter_cm: pad_side(diameter),
    }
}

fn pad_side(mm: f64) -> f64 {
    round_to(mm / 10.0 + PADDING_CM, 1)
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_parcel_gets_minimum_packing() {
        let dims = adjust_dimensions(Some(0.48), None, None);
        assert!((dims.weight_kg - 0.68).abs() < f64::EPSILON);
        assert!((dims.height_cm - 12.0).abs() < f64::EPSILON);
        assert!((dims.diameter_cm - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_heavy_parcel_gets_proportional_packing() {
        // 15% of 2 kg is 300 g, more than the 200 g minimum
        let dims = adjust_dimensions(Some(2.0), Some(250.0), Some(83.0));
        assert!((dims.weight_kg - 2.3).abs() < f64::EPSILON);
        assert!((dims.height_cm - 27.0).abs() < f64::EPSILON);
        assert!((dims.diameter_cm - 10.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_and_invalid_inputs_use_defaults() {
        let expected = adjust_dimensions(Some(DEFAULT_WEIGHT_KG), Some(100.0), Some(100.0));
        for raw in [None, Some(0.0), Some(-3.0), Some(f64::NAN), Some(f64::INFINITY)] {
            assert_eq!(adjust_dimensions(raw, raw, raw), expected);
        }
        assert!((expected.weight_kg - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_padding_bounds_hold_for_positive_weights() {
        for grams in [1_u32, 50, 480, 1_333, 1_334, 1_335, 7_250, 30_000] {
            let weight = f64::from(grams) / 1000.0;
            let dims = adjust_dimensions(Some(weight), None, None);
            let upper = weight + (weight * 0.15).max(0.2) + 0.0005;
            assert!(dims.weight_kg >= weight + 0.2 - 0.0005, "{grams}g too light");
            assert!(dims.weight_kg <= upper, "{grams}g too heavy");
        }
    }

    #[test]
    fn test_adjustment_is_deterministic() {
        let first = adjust_dimensions(Some(1.234), Some(157.0), Some(61.0));
        let second = adjust_dimensions(Some(1.234), Some(157.0), Some(61.0));
        assert_eq!(first.weight_kg.to_bits(), second.weight_kg.to_bits());
        assert_eq!(first.height_cm.to_bits(), second.height_cm.to_bits());
        assert_eq!(first.diameter_cm.to_bits(), second.diameter_cm.to_bits());
    }
}
