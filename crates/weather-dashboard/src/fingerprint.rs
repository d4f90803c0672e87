//! Cache key derivation.
//!
//! Coordinates are rounded to four decimal places (~11 m at the equator) so
//! near-duplicate requests collide on the same cache entry.

use crate::model::Units;

pub fn fingerprint(lat: f64, lon: f64, units: Units) -> String {
    format!(
        "{:.4}_{:.4}_{}",
        round4(lat),
        round4(lon),
        units.as_str()
    )
}

fn round4(value: f64) -> f64 {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    // -0.00001 rounds to -0.0, which formats as "-0.0000".
    if rounded == 0.0 { 0.0 } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_formats_rounded_coordinates_and_units() {
        assert_eq!(
            fingerprint(40.7128, -74.0060, Units::Metric),
            "40.7128_-74.0060_metric"
        );
        assert_eq!(
            fingerprint(51.50738, -0.12776, Units::Imperial),
            "51.5074_-0.1278_imperial"
        );
    }

    #[test]
    fn fingerprint_merges_near_duplicate_coordinates() {
        let base = fingerprint(25.03301, 121.56541, Units::Standard);
        for (dlat, dlon) in [(0.00001, 0.0), (0.0, -0.00002), (0.00003, 0.00003)] {
            assert_eq!(
                fingerprint(25.03301 + dlat, 121.56541 + dlon, Units::Standard),
                base
            );
        }
    }

    #[test]
    fn fingerprint_separates_units() {
        assert_ne!(
            fingerprint(10.0, 10.0, Units::Metric),
            fingerprint(10.0, 10.0, Units::Imperial)
        );
    }

    #[test]
    fn fingerprint_normalizes_negative_zero() {
        assert_eq!(
            fingerprint(-0.00001, 0.00002, Units::Metric),
            "0.0000_0.0000_metric"
        );
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let first = fingerprint(-33.8688, 151.2093, Units::Metric);
        let second = fingerprint(-33.8688, 151.2093, Units::Metric);
        assert_eq!(first, second);
    }
}
