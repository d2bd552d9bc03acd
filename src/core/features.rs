//! Feature computation from accelerometer windows.
//!
//! [`extract`] turns one [`Window`] into a fixed-order vector of 21
//! statistics. The order and cardinality must match what the scaler and
//! model artifacts were fit on, so both are frozen here.
//!
//! Statistically ill-defined inputs (empty series, fewer than two points,
//! zero variance) never error: the affected statistic is reported as 0.

use crate::core::windowing::Window;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Number of features in a [`FeatureVector`].
pub const FEATURE_COUNT: usize = 21;

/// Feature names, in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "x_means",
    "y_means",
    "z_means",
    "x_range",
    "y_range",
    "z_range",
    "xy_corr",
    "yz_corr",
    "xz_corr",
    "mean_acceleration",
    "std_acceleration",
    "rms_acceleration",
    "peak_to_peak_amplitude",
    "magnitude_acceleration",
    "signal_magnitude_area",
    "zero_crossing_rate_x",
    "zero_crossing_rate_y",
    "zero_crossing_rate_z",
    "autocorrelation_x",
    "autocorrelation_y",
    "autocorrelation_z",
];

/// Statistics computed from a single window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    // Mean values
    pub x_means: f64,
    pub y_means: f64,
    pub z_means: f64,

    // Ranges
    pub x_range: f64,
    pub y_range: f64,
    pub z_range: f64,

    // Correlations
    pub xy_corr: f64,
    pub yz_corr: f64,
    pub xz_corr: f64,

    // Acceleration metrics
    /// Mean of the per-sample magnitude
    pub mean_acceleration: f64,
    /// Population standard deviation of the three per-axis means
    pub std_acceleration: f64,
    /// Root-mean-square of the magnitude series
    pub rms_acceleration: f64,
    /// Range across all six per-axis extrema
    pub peak_to_peak_amplitude: f64,

    // Magnitude-based features
    /// Same value as `mean_acceleration`; both slots are part of the model input.
    pub magnitude_acceleration: f64,
    /// Mean of |x| + |y| + |z|
    pub signal_magnitude_area: f64,

    // Zero-crossing counts
    pub zero_crossing_rate_x: f64,
    pub zero_crossing_rate_y: f64,
    pub zero_crossing_rate_z: f64,

    // Autocorrelation
    pub autocorrelation_x: f64,
    pub autocorrelation_y: f64,
    pub autocorrelation_z: f64,
}

impl FeatureVector {
    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.x_means,
            self.y_means,
            self.z_means,
            self.x_range,
            self.y_range,
            self.z_range,
            self.xy_corr,
            self.yz_corr,
            self.xz_corr,
            self.mean_acceleration,
            self.std_acceleration,
            self.rms_acceleration,
            self.peak_to_peak_amplitude,
            self.magnitude_acceleration,
            self.signal_magnitude_area,
            self.zero_crossing_rate_x,
            self.zero_crossing_rate_y,
            self.zero_crossing_rate_z,
            self.autocorrelation_x,
            self.autocorrelation_y,
            self.autocorrelation_z,
        ]
    }

    /// `(name, value)` pairs in vector order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.to_array())
    }

    /// Look a feature up by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Whether every value is finite.
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Compute all features from a window.
pub fn extract(window: &Window) -> FeatureVector {
    let (x, y, z) = (window.x(), window.y(), window.z());

    let x_means = mean(x);
    let y_means = mean(y);
    let z_means = mean(z);

    let magnitudes: Vec<f64> = window.samples().map(|s| s.magnitude()).collect();
    let mean_magnitude = mean(&magnitudes);

    FeatureVector {
        x_means,
        y_means,
        z_means,
        x_range: range(x),
        y_range: range(y),
        z_range: range(z),
        xy_corr: correlation(x, y),
        yz_corr: correlation(y, z),
        xz_corr: correlation(x, z),
        mean_acceleration: mean_magnitude,
        std_acceleration: population_std_dev(&[x_means, y_means, z_means]),
        rms_acceleration: root_mean_square(&magnitudes),
        peak_to_peak_amplitude: peak_to_peak(&[x, y, z]),
        magnitude_acceleration: mean_magnitude,
        signal_magnitude_area: signal_magnitude_area(window),
        zero_crossing_rate_x: zero_crossings(x) as f64,
        zero_crossing_rate_y: zero_crossings(y) as f64,
        zero_crossing_rate_z: zero_crossings(z) as f64,
        autocorrelation_x: autocorrelation(x),
        autocorrelation_y: autocorrelation(y),
        autocorrelation_z: autocorrelation(z),
    }
}

/// Arithmetic mean, 0 for an empty series.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

fn extrema(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// max - min, 0 for an empty series.
fn range(values: &[f64]) -> f64 {
    extrema(values).map_or(0.0, |(lo, hi)| hi - lo)
}

fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().population_variance().max(0.0).sqrt()
}

fn root_mean_square(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().quadratic_mean()
}

/// Every value equal, judged on the raw values rather than their variance.
fn is_constant(values: &[f64]) -> bool {
    extrema(values).map_or(true, |(lo, hi)| lo == hi)
}

/// Pearson correlation coefficient.
///
/// 0 when either series has fewer than two points or is constant.
fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);

    if is_constant(a) || is_constant(b) {
        return 0.0;
    }
    let var_a = a.iter().population_variance();
    let var_b = b.iter().population_variance();
    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }

    let cov = a.iter().population_covariance(b.iter());
    (cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
}

/// Range across the minimum and maximum of every series jointly.
fn peak_to_peak(series: &[&[f64]]) -> f64 {
    let bounds: Vec<(f64, f64)> = series.iter().filter_map(|s| extrema(s)).collect();
    if bounds.is_empty() {
        return 0.0;
    }

    let lo = bounds.iter().map(|b| b.0).fold(f64::INFINITY, f64::min);
    let hi = bounds.iter().map(|b| b.1).fold(f64::NEG_INFINITY, f64::max);
    hi - lo
}

fn signal_magnitude_area(window: &Window) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let total: f64 = window
        .samples()
        .map(|s| s.x.abs() + s.y.abs() + s.z.abs())
        .sum();
    total / window.len() as f64
}

/// Number of adjacent sample pairs whose product is negative.
fn zero_crossings(values: &[f64]) -> usize {
    values.windows(2).filter(|pair| pair[0] * pair[1] < 0.0).count()
}

/// Normalized autocorrelation estimate of a series.
///
/// The series is mean-centred and its autocorrelation taken at lags
/// `0..n`. The mean of those lag sums is divided by the mean of
/// `variance * [n, n-1, ..., 1]`, i.e. `variance * (n + 1) / 2`.
/// Returns 0 for fewer than two samples or a constant series.
fn autocorrelation(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 || is_constant(values) {
        return 0.0;
    }
    let centre = mean(values);
    let variance = values.iter().population_variance();
    if variance <= 0.0 {
        return 0.0;
    }

    let centred: Vec<f64> = values.iter().map(|v| v - centre).collect();
    let lag_total: f64 = (0..n)
        .map(|lag| {
            centred[lag..]
                .iter()
                .zip(&centred)
                .map(|(a, b)| a * b)
                .sum::<f64>()
        })
        .sum();

    let mean_lag = lag_total / n as f64;
    let weighted_variance = variance * (n as f64 + 1.0) / 2.0;
    mean_lag / weighted_variance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(x: &[f64], y: &[f64], z: &[f64]) -> Window {
        Window::from_series(x.to_vec(), y.to_vec(), z.to_vec()).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn wavy_window(n: usize) -> Window {
        let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin()).collect();
        let y: Vec<f64> = (0..n).map(|i| (i as f64 * 0.3).cos() * 2.0).collect();
        let z: Vec<f64> = (0..n).map(|i| 9.8 + (i as f64 * 1.1).sin()).collect();
        window(&x, &y, &z)
    }

    #[test]
    fn test_feature_names_match_vector_order() {
        let features = extract(&wavy_window(30));
        let names: Vec<&str> = features.iter().map(|(n, _)| n).collect();
        assert_eq!(names.len(), FEATURE_COUNT);
        assert_eq!(names[0], "x_means");
        assert_eq!(names[13], "magnitude_acceleration");
        assert_eq!(names[20], "autocorrelation_z");
        assert_eq!(features.get("x_range"), Some(features.x_range));
        assert_eq!(features.get("nope"), None);
    }

    #[test]
    fn test_constant_axis_window() {
        let f = extract(&window(&[1.0, 1.0, 1.0], &[0.0; 3], &[0.0; 3]));

        assert_close(f.x_means, 1.0);
        assert_close(f.y_means, 0.0);
        assert_close(f.z_means, 0.0);
        assert_close(f.x_range, 0.0);
        assert_close(f.xy_corr, 0.0);
        assert_close(f.mean_acceleration, 1.0);
        assert_close(f.magnitude_acceleration, 1.0);
        assert_close(f.rms_acceleration, 1.0);
        assert_close(f.zero_crossing_rate_x, 0.0);
        assert_close(f.autocorrelation_x, 0.0);
        assert_close(f.peak_to_peak_amplitude, 1.0);
        assert_close(f.signal_magnitude_area, 1.0);
        assert_close(f.std_acceleration, (2.0f64 / 9.0).sqrt());
    }

    #[test]
    fn test_alternating_window() {
        let f = extract(&window(&[1.0, -1.0, 1.0, -1.0], &[0.0; 4], &[0.0; 4]));

        assert_close(f.zero_crossing_rate_x, 3.0);
        assert_close(f.zero_crossing_rate_y, 0.0);
        assert_close(f.signal_magnitude_area, 1.0);
        assert_close(f.x_range, 2.0);
        // Lag sums 4, -3, 2, -1 averaged over 4, divided by 1 * (4 + 1) / 2.
        assert_close(f.autocorrelation_x, 0.2);
    }

    #[test]
    fn test_correlation_values() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        let c = [4.0, 3.0, 2.0, 1.0];

        assert_close(correlation(&a, &b), 1.0);
        assert_close(correlation(&a, &c), -1.0);
        assert_close(correlation(&a, &[1.0, 2.0]), 1.0);
    }

    #[test]
    fn test_degenerate_windows_do_not_panic() {
        for n in 0..2 {
            let w = window(&vec![3.0; n], &vec![-2.0; n], &vec![1.0; n]);
            let f = extract(&w);

            assert_eq!(f.xy_corr, 0.0);
            assert_eq!(f.yz_corr, 0.0);
            assert_eq!(f.xz_corr, 0.0);
            assert_eq!(f.autocorrelation_x, 0.0);
            assert_eq!(f.autocorrelation_y, 0.0);
            assert_eq!(f.autocorrelation_z, 0.0);
            assert!(f.is_finite());
        }
    }

    #[test]
    fn test_empty_window_is_all_zero() {
        let f = extract(&window(&[], &[], &[]));
        assert_eq!(f, FeatureVector::default());
    }

    #[test]
    fn test_well_formed_window_is_finite() {
        for n in 2..=60 {
            let f = extract(&wavy_window(n));
            assert!(f.is_finite(), "non-finite features for n={n}: {f:?}");
        }
    }

    #[test]
    fn test_near_constant_series_is_degenerate() {
        let f = extract(&window(&[0.1; 30], &[0.2; 30], &[0.3; 30]));
        assert_eq!(f.xy_corr, 0.0);
        assert_eq!(f.autocorrelation_x, 0.0);
    }

    #[test]
    fn test_large_offset_signal_keeps_correlation() {
        let wave: Vec<f64> = (0..30).map(|i| 2e6 + (i as f64 * 0.7).sin()).collect();
        let f = extract(&window(&wave, &wave, &[9.8; 30]));

        assert!((f.xy_corr - 1.0).abs() < 1e-6, "xy_corr = {}", f.xy_corr);
        assert_eq!(f.xz_corr, 0.0);
        assert!(f.autocorrelation_x != 0.0);
        assert_eq!(f.autocorrelation_x, f.autocorrelation_y);
        // Shifting a series leaves its autocorrelation unchanged.
        let centred: Vec<f64> = (0..30).map(|i| (i as f64 * 0.7).sin()).collect();
        assert!((f.autocorrelation_x - autocorrelation(&centred)).abs() < 1e-6);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let w = wavy_window(30);
        assert_eq!(extract(&w).to_array(), extract(&w).to_array());
    }

    #[test]
    fn test_peak_to_peak_spans_axes() {
        let f = extract(&window(&[0.0, 5.0], &[-3.0, 1.0], &[2.0, 2.0]));
        assert_close(f.peak_to_peak_amplitude, 8.0);
    }
}
