//! Severity Classifier
//!
//! Pure mapping from (kind, measure, profile) to a severity tier.

use crate::anomaly::{AnomalyKind, Measure, Severity};

use super::profile::{AreaBands, Bands, Profile};

/// Classify one anomaly.
///
/// Fixed-tier kinds ignore their measure. Proximity-like kinds compare the
/// measure as a fraction of the profile threshold (closer is worse); overlap
/// kinds compare the overlap ratio (larger is worse).
pub fn classify(kind: AnomalyKind, measure: &Measure, profile: &Profile) -> Severity {
    if let Some(fixed) = kind.fixed_severity() {
        return fixed;
    }

    match (kind, measure) {
        (AnomalyKind::PointProximity, Measure::Distance { value }) => {
            proximity_tier(fraction(*value, profile.point_threshold), &profile.proximity_bands)
        }
        (AnomalyKind::DanglingEndpoint, Measure::Gap { value }) => {
            proximity_tier(fraction(*value, profile.line_snap_distance), &profile.proximity_bands)
        }
        (AnomalyKind::PolygonOverlap | AnomalyKind::InterLayerOverlap, Measure::Overlap { area, ratio }) => {
            let by_ratio = overlap_tier(*ratio, &profile.overlap_bands);
            match &profile.area_bands {
                Some(bands) => by_ratio.max(area_tier(*area, bands)),
                None => by_ratio,
            }
        }
        (AnomalyKind::LineOverlap, Measure::SharedLength { ratio, .. }) => {
            overlap_tier(*ratio, &profile.overlap_bands)
        }
        // A measure that does not fit its kind carries no information.
        _ => Severity::Low,
    }
}

fn fraction(value: f64, threshold: f64) -> f64 {
    if threshold > 0.0 {
        value / threshold
    } else if value <= 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

fn proximity_tier(fraction: f64, bands: &Bands) -> Severity {
    if fraction < bands.critical {
        Severity::Critical
    } else if fraction < bands.high {
        Severity::High
    } else if fraction < bands.moderate {
        Severity::Moderate
    } else {
        Severity::Low
    }
}

fn overlap_tier(ratio: f64, bands: &Bands) -> Severity {
    if ratio > bands.critical {
        Severity::Critical
    } else if ratio > bands.high {
        Severity::High
    } else if ratio > bands.moderate {
        Severity::Moderate
    } else {
        Severity::Low
    }
}

fn area_tier(area: f64, bands: &AreaBands) -> Severity {
    if area <= bands.low_max {
        Severity::Low
    } else if area <= bands.moderate_max {
        Severity::Moderate
    } else if area <= bands.high_max {
        Severity::High
    } else {
        Severity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn unit_profile() -> Profile {
        Profile::custom("unit", 1.0, 1.0)
    }

    #[test_case(0.0, Severity::Critical ; "coincident")]
    #[test_case(0.05, Severity::Critical ; "five percent")]
    #[test_case(0.10, Severity::High ; "critical band edge")]
    #[test_case(0.29, Severity::High ; "below thirty percent")]
    #[test_case(0.45, Severity::Moderate ; "below sixty percent")]
    #[test_case(0.60, Severity::Low ; "moderate band edge")]
    #[test_case(1.0, Severity::Low ; "at threshold")]
    fn test_point_proximity(distance: f64, expected: Severity) {
        assert_eq!(
            classify(AnomalyKind::PointProximity, &Measure::distance(distance), &unit_profile()),
            expected
        );
    }

    #[test_case(0.75, Severity::Critical ; "three quarters")]
    #[test_case(0.50, Severity::High ; "half is not critical")]
    #[test_case(0.25, Severity::High ; "quarter")]
    #[test_case(0.10, Severity::Moderate ; "tenth")]
    #[test_case(0.05, Severity::Low ; "five percent")]
    fn test_overlap_ratio(ratio: f64, expected: Severity) {
        let measure = Measure::Overlap { area: 1.0, ratio };
        assert_eq!(classify(AnomalyKind::PolygonOverlap, &measure, &unit_profile()), expected);
        assert_eq!(classify(AnomalyKind::InterLayerOverlap, &measure, &unit_profile()), expected);
    }

    #[test]
    fn test_area_bands_raise_severity() {
        // 2% of a large parcel, but 800 m² is beyond the cadastre high band.
        let measure = Measure::Overlap {
            area: 800.0,
            ratio: 0.02,
        };
        assert_eq!(
            classify(AnomalyKind::PolygonOverlap, &measure, &Profile::cadastre()),
            Severity::Critical
        );
        assert_eq!(
            classify(AnomalyKind::PolygonOverlap, &measure, &unit_profile()),
            Severity::Low
        );
    }

    #[test]
    fn test_squares_quarter_overlap_is_high() {
        let measure = Measure::Overlap {
            area: 25.0,
            ratio: 0.25,
        };
        assert_eq!(
            classify(AnomalyKind::PolygonOverlap, &measure, &Profile::cadastre()),
            Severity::High
        );
    }

    #[test]
    fn test_dangling_uses_snap_distance() {
        let profile = Profile::cadastre();
        assert_eq!(
            classify(AnomalyKind::DanglingEndpoint, &Measure::gap(0.01), &profile),
            Severity::Critical
        );
        assert_eq!(
            classify(AnomalyKind::DanglingEndpoint, &Measure::gap(0.5), &profile),
            Severity::Low
        );
    }

    #[test_case(AnomalyKind::LineDuplicate, Severity::Critical)]
    #[test_case(AnomalyKind::CrossingWithoutNode, Severity::High)]
    #[test_case(AnomalyKind::LineSelfIntersection, Severity::High)]
    #[test_case(AnomalyKind::OrphanPoint, Severity::Critical)]
    #[test_case(AnomalyKind::OrphanPolygon, Severity::Critical)]
    #[test_case(AnomalyKind::VertexCountMismatch, Severity::High)]
    #[test_case(AnomalyKind::PointVertexMismatch, Severity::Critical)]
    #[test_case(AnomalyKind::SharedVertexMissing, Severity::High)]
    fn test_fixed_tiers(kind: AnomalyKind, expected: Severity) {
        assert_eq!(classify(kind, &Measure::count(1), &unit_profile()), expected);
        assert_eq!(classify(kind, &Measure::distance(1e6), &Profile::hydrology()), expected);
    }

    #[test]
    fn test_line_overlap_uses_ratio() {
        let measure = Measure::SharedLength {
            length: 3.0,
            ratio: 0.3,
        };
        assert_eq!(classify(AnomalyKind::LineOverlap, &measure, &unit_profile()), Severity::High);
    }
}
