//! Streaming statistics and significance testing
//!
//! Metric values are folded into constant-size accumulators in a single
//! pass, so result computation never needs the raw observations in memory.
//! Accumulators merge associatively, which lets callers fan the fold out
//! over partitions and combine the pieces.

use std::f64::consts::SQRT_2;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::EngineError;
use crate::domain::experiment::Metric;

// ============================================================================
// Accumulation
// ============================================================================

/// Constant-size streaming accumulator for one variant's metric values
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SampleAccumulator {
    n: u64,
    sum: f64,
    sum_sq: f64,
}

impl SampleAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation in
    pub fn add(&mut self, value: f64) {
        self.n += 1;
        self.sum += value;
        self.sum_sq += value * value;
    }

    /// Combine with another accumulator
    ///
    /// Merging is associative and commutative, so partitioned folds combine
    /// in any order.
    pub fn merge(&mut self, other: &SampleAccumulator) {
        self.n += other.n;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
    }

    /// Fold an entire iterator of observations in
    pub fn accumulate(values: impl IntoIterator<Item = f64>) -> Self {
        let mut acc = Self::new();
        for value in values {
            acc.add(value);
        }
        acc
    }

    /// Fold observations until the iterator ends or `cancel` is set
    ///
    /// Returns the partial accumulator either way; a cancelled fold is still
    /// a valid accumulator over the values it saw.
    pub fn accumulate_cancellable(
        values: impl IntoIterator<Item = f64>,
        cancel: &AtomicBool,
    ) -> Self {
        let mut acc = Self::new();
        for value in values {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            acc.add(value);
        }
        acc
    }

    /// Number of observations folded in
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Sum of observations
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Finalize into a summary
    pub fn summarize(&self) -> SampleSummary {
        let n = self.n;
        if n == 0 {
            return SampleSummary {
                n: 0,
                mean: 0.0,
                variance: 0.0,
                std_dev: 0.0,
                std_error: 0.0,
            };
        }

        let n_f = n as f64;
        let mean = self.sum / n_f;
        // Sample variance; a single observation carries no spread information
        let variance = if n > 1 {
            ((self.sum_sq - self.sum * self.sum / n_f) / (n_f - 1.0)).max(0.0)
        } else {
            0.0
        };
        SampleSummary::from_moments(n, mean, variance)
    }
}

/// Summary statistics for one variant's metric values
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SampleSummary {
    /// Number of observations
    pub n: u64,
    /// Sample mean
    pub mean: f64,
    /// Sample variance
    pub variance: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    /// Standard error of the mean
    pub std_error: f64,
}

impl SampleSummary {
    /// Build a summary from precomputed moments
    pub fn from_moments(n: u64, mean: f64, variance: f64) -> Self {
        let std_dev = variance.sqrt();
        let std_error = if n > 0 { std_dev / (n as f64).sqrt() } else { 0.0 };
        Self {
            n,
            mean,
            variance,
            std_dev,
            std_error,
        }
    }
}

/// Fold an iterator of observations straight into a summary
pub fn compute_statistics(values: impl IntoIterator<Item = f64>) -> SampleSummary {
    SampleAccumulator::accumulate(values).summarize()
}

// ============================================================================
// Significance testing
// ============================================================================

/// Result of a two-tailed z-test between control and treatment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignificanceResult {
    /// Control sample size
    pub control_n: u64,
    /// Treatment sample size
    pub treatment_n: u64,
    /// Control mean
    pub control_mean: f64,
    /// Treatment mean
    pub treatment_mean: f64,
    /// Treatment lift relative to control, e.g. 0.2 for +20%
    pub relative_lift: f64,
    /// Treatment mean minus control mean
    pub absolute_difference: f64,
    /// Standard error of the difference
    pub standard_error: f64,
    /// Two-sample z statistic
    pub z_score: f64,
    /// Two-tailed p-value
    pub p_value: f64,
    /// Whether the difference clears the metric's confidence level and both
    /// arms clear its minimum sample size
    pub is_significant: bool,
    /// Confidence interval on the absolute difference at the metric's level
    pub confidence_interval: (f64, f64),
}

/// Run a two-tailed z-test comparing treatment against control
///
/// The minimum sample size guard only gates `is_significant`; the statistics
/// themselves are always reported so dashboards can show progress before the
/// experiment is decision-ready.
pub fn compute_significance(
    control: &SampleSummary,
    treatment: &SampleSummary,
    metric: &Metric,
) -> Result<SignificanceResult, EngineError> {
    let confidence = metric.confidence_level();
    if !(0.0..1.0).contains(&confidence) || confidence == 0.0 {
        return Err(EngineError::invalid_configuration(format!(
            "metric '{}' has confidence level outside (0, 1): {}",
            metric.key(),
            confidence
        )));
    }

    let absolute_difference = treatment.mean - control.mean;
    let relative_lift = if control.mean != 0.0 {
        absolute_difference / control.mean
    } else {
        0.0
    };

    let standard_error =
        (control.std_error * control.std_error + treatment.std_error * treatment.std_error).sqrt();

    // Identical constant samples: no evidence either way
    let (z_score, p_value) = if standard_error == 0.0 {
        (0.0, 1.0)
    } else {
        let z = absolute_difference / standard_error;
        (z, 2.0 * (1.0 - normal_cdf(z.abs())))
    };

    let alpha = 1.0 - confidence;
    let minimum = metric.minimum_sample_size();
    let sample_size_met = control.n >= minimum && treatment.n >= minimum;
    let is_significant = sample_size_met && p_value < alpha;

    let z_critical = normal_quantile(1.0 - alpha / 2.0);
    let margin = z_critical * standard_error;
    let confidence_interval = (absolute_difference - margin, absolute_difference + margin);

    debug!(
        metric = metric.key(),
        z_score,
        p_value,
        is_significant,
        "Computed significance"
    );

    Ok(SignificanceResult {
        control_n: control.n,
        treatment_n: treatment.n,
        control_mean: control.mean,
        treatment_mean: treatment.mean,
        relative_lift,
        absolute_difference,
        standard_error,
        z_score,
        p_value,
        is_significant,
        confidence_interval,
    })
}

// ============================================================================
// Normal distribution helpers
// ============================================================================

/// Standard normal CDF
fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Error function, Abramowitz & Stegun 7.1.26 (max error 1.5e-7)
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Inverse standard normal CDF, Acklam's rational approximation
fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}
