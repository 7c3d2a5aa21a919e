//! Rolling vibration statistics computed over a window snapshot.
//!
//! For each axis the extractor produces RMS, population standard deviation, mean,
//! kurtosis and crest factor. Kurtosis follows the Pearson convention (fourth
//! standardized moment, a Gaussian scores about 3), not the excess convention; the
//! downstream analysis compares absolute kurtosis values.
//!
//! Degenerate input never fails. Axes with fewer than [`MIN_SAMPLES`] values get NaN
//! for every statistic, and ratios with a zero denominator (crest factor of a silent
//! axis, kurtosis of a constant axis) are NaN.

use crate::acquisition::types::{AxisFeatures, FeatureRecord};
use crate::acquisition::window::AxisSeries;
use chrono::{DateTime, Utc};

/// Fewest samples per axis for which statistics are reported.
pub const MIN_SAMPLES: usize = 10;

/// Relative resolution below which the variance is treated as zero.
const KURTOSIS_RESOLUTION: f64 = 1e-15;

/// Compute the feature record for three axis arrays.
///
/// Pure: the same arrays and timestamp always give the same record.
pub fn compute(xs: &[f64], ys: &[f64], zs: &[f64], at: DateTime<Utc>) -> FeatureRecord {
    FeatureRecord {
        timestamp: at,
        x: axis_features(xs),
        y: axis_features(ys),
        z: axis_features(zs),
    }
}

/// Compute the feature record for a window snapshot.
pub fn compute_series(series: &AxisSeries, at: DateTime<Utc>) -> FeatureRecord {
    compute(&series.x, &series.y, &series.z, at)
}

/// Statistics for a single axis.
pub fn axis_features(values: &[f64]) -> AxisFeatures {
    let n = values.len();
    if n < MIN_SAMPLES {
        return AxisFeatures::UNDEFINED;
    }
    let n_f = n as f64;

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut peak = 0.0_f64;
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in values {
        sum += v;
        sum_sq += v * v;
        peak = peak.max(v.abs());
        lo = lo.min(v);
        hi = hi.max(v);
    }
    let rms = (sum_sq / n_f).sqrt();
    let crest = if rms > 0.0 { peak / rms } else { f64::NAN };

    // A flat axis has no spread; summation error would otherwise leave a tiny m2
    if lo == hi {
        return AxisFeatures {
            rms,
            std: 0.0,
            mean: lo,
            kurtosis: f64::NAN,
            crest,
        };
    }
    let naive_mean = sum / n_f;
    // Corrected mean: removes most of the rounding left by the running sum
    let mean = naive_mean + values.iter().map(|&v| v - naive_mean).sum::<f64>() / n_f;

    // Central moments in a second pass to avoid cancellation on large offsets
    let (m2, m4) = values.iter().fold((0.0, 0.0), |(m2, m4), &v| {
        let d = v - mean;
        let d2 = d * d;
        (m2 + d2, m4 + d2 * d2)
    });
    let m2 = m2 / n_f;
    let m4 = m4 / n_f;

    // Spread at rounding level relative to the mean counts as constant
    let kurtosis = if m2 > (KURTOSIS_RESOLUTION * mean).powi(2) {
        m4 / (m2 * m2)
    } else {
        f64::NAN
    };

    AxisFeatures {
        rms,
        std: m2.sqrt(),
        mean,
        kurtosis,
        crest,
    }
}
