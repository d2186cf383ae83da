// ABOUTME: Statistical extrapolation of difference counts from sampled comparisons
// ABOUTME: Wilson score interval with finite-population correction

use super::types::{ConfidenceInterval, SamplingEstimate};

/// Two-sided z-scores for common confidence levels.
const Z_TABLE: &[(f64, f64)] = &[
    (0.80, 1.2816),
    (0.85, 1.4395),
    (0.90, 1.6449),
    (0.95, 1.9600),
    (0.98, 2.3263),
    (0.99, 2.5758),
    (0.995, 2.8070),
    (0.999, 3.2905),
];

/// Accepts either a fraction (0.95) or a percentage (95).
pub fn normalize_confidence(level: f64) -> f64 {
    if level > 1.0 {
        level / 100.0
    } else {
        level
    }
}

/// z-score for a two-sided confidence level, interpolated linearly between
/// table entries and clamped at both ends.
pub fn z_score(confidence_level: f64) -> f64 {
    let level = normalize_confidence(confidence_level);
    let (first_level, first_z) = Z_TABLE[0];
    if level <= first_level {
        return first_z;
    }
    for window in Z_TABLE.windows(2) {
        let (lo_level, lo_z) = window[0];
        let (hi_level, hi_z) = window[1];
        if level <= hi_level {
            let t = (level - lo_level) / (hi_level - lo_level);
            return lo_z + t * (hi_z - lo_z);
        }
    }
    Z_TABLE[Z_TABLE.len() - 1].1
}

/// Inputs for building an estimate when the backend omits the interval.
#[derive(Debug, Clone, Default)]
pub struct SampleObservation {
    pub sample_size: u64,
    pub sampled_differences: u64,
    pub population_size: Option<u64>,
    pub method: String,
    pub confidence_level: f64,
    /// Estimate reported by the backend, if any.
    pub reported_estimate: Option<f64>,
    pub reported_margin: Option<f64>,
}

/// Builds a sampling estimate, deriving the confidence interval for the
/// extrapolated difference count.
pub fn estimate(observation: &SampleObservation) -> SamplingEstimate {
    let n = observation.sample_size.max(1) as f64;
    let d = observation.sampled_differences.min(observation.sample_size) as f64;
    let p = d / n;
    let confidence = normalize_confidence(observation.confidence_level);
    let z = z_score(confidence);

    // Without a known population the extrapolation scale comes from the
    // backend's own estimate when it has one.
    let (scale, known_scale) = match (observation.population_size, observation.reported_estimate) {
        (Some(population), _) => (population as f64, true),
        (None, Some(reported)) if p > 0.0 => (reported / p, true),
        _ => (n, false),
    };

    let z2 = z * z;
    let denominator = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denominator;
    let mut half_width = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denominator;
    if known_scale && scale > 1.0 {
        half_width *= ((scale - n).max(0.0) / (scale - 1.0)).sqrt();
    }

    let (lower, upper) = if known_scale && scale <= n {
        // The sample covered the whole population.
        (p, p)
    } else {
        let lower = if d == 0.0 { 0.0 } else { (center - half_width).max(0.0) };
        let upper = if d >= n { 1.0 } else { (center + half_width).min(1.0) };
        (lower, upper)
    };

    SamplingEstimate {
        sample_size: observation.sample_size,
        population_size: observation.population_size,
        method: observation.method.clone(),
        confidence_level: confidence,
        margin_of_error: observation.reported_margin.unwrap_or(half_width),
        sampled_differences: d as u64,
        estimated_differences: observation.reported_estimate.unwrap_or(p * scale),
        confidence_interval: ConfidenceInterval {
            lower: lower * scale,
            upper: upper * scale,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(sample: u64, diffs: u64, population: Option<u64>) -> SampleObservation {
        SampleObservation {
            sample_size: sample,
            sampled_differences: diffs,
            population_size: population,
            method: "deterministic".into(),
            confidence_level: 0.95,
            ..Default::default()
        }
    }

    #[test]
    fn test_z_scores() {
        assert!((z_score(0.95) - 1.96).abs() < 1e-9);
        assert!((z_score(95.0) - 1.96).abs() < 1e-9);
        assert!((z_score(0.99) - 2.5758).abs() < 1e-9);
        let mid = z_score(0.925);
        assert!(mid > 1.6449 && mid < 1.96);
        assert_eq!(z_score(0.5), 1.2816);
        assert_eq!(z_score(0.9999), 3.2905);
    }

    #[test]
    fn test_estimate_brackets_point_estimate() {
        let est = estimate(&observation(1_000, 20, Some(100_000)));
        assert!((est.estimated_differences - 2_000.0).abs() < 1e-6);
        assert!(est.confidence_interval.lower < est.estimated_differences);
        assert!(est.confidence_interval.upper > est.estimated_differences);
        assert!(est.confidence_interval.lower >= 0.0);
        assert!(est.confidence_interval.upper <= 100_000.0);
    }

    #[test]
    fn test_zero_differences_still_has_upper_bound() {
        let est = estimate(&observation(500, 0, Some(50_000)));
        assert_eq!(est.estimated_differences, 0.0);
        assert_eq!(est.confidence_interval.lower, 0.0);
        assert!(est.confidence_interval.upper > 0.0);
    }

    #[test]
    fn test_full_scan_collapses_interval() {
        let est = estimate(&observation(1_000, 10, Some(1_000)));
        assert!((est.confidence_interval.upper - est.confidence_interval.lower).abs() < 1e-9);
    }

    #[test]
    fn test_reported_estimate_sets_scale() {
        let mut obs = observation(1_000, 10, None);
        obs.reported_estimate = Some(500.0);
        let est = estimate(&obs);
        assert_eq!(est.estimated_differences, 500.0);
        assert!(est.confidence_interval.upper > 500.0);
    }
}
