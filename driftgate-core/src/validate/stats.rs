//! Two-sample distribution-equality tests.
//!
//! Numeric columns use the two-sided Kolmogorov-Smirnov test. Small samples get
//! an exact p-value by lattice path counting; large samples use the Kolmogorov
//! limiting distribution. Categorical columns use Pearson's chi-square test of
//! homogeneity over category frequencies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Sample sizes whose product is at most this get an exact KS p-value.
pub const DEFAULT_EXACT_MAX_PRODUCT: u64 = 10_000;

/// Why a column could not be tested. Never fatal to a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("{0} sample has no non-missing values")]
    EmptySample(&'static str),

    #[error("{0} sample contains non-finite values")]
    NonFinite(&'static str),

    #[error("type mismatch: baseline is {baseline}, candidate is {candidate}")]
    TypeMismatch { baseline: String, candidate: String },

    #[error("{0}")]
    Unsupported(String),
}

/// Which test produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    KolmogorovSmirnov,
    ChiSquare,
}

/// Statistic and p-value of a two-sample test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub kind: TestKind,
    pub statistic: f64,
    pub p_value: f64,
}

/// Two-sided two-sample Kolmogorov-Smirnov test.
///
/// The statistic is the largest distance between the two empirical CDFs. Ties
/// are handled by stepping both samples past equal values together.
pub fn ks_two_sample(
    baseline: &[f64],
    candidate: &[f64],
    exact_max_product: u64,
) -> Result<TestOutcome, StatsError> {
    if baseline.is_empty() {
        return Err(StatsError::EmptySample("baseline"));
    }
    if candidate.is_empty() {
        return Err(StatsError::EmptySample("candidate"));
    }
    if baseline.iter().any(|v| !v.is_finite()) {
        return Err(StatsError::NonFinite("baseline"));
    }
    if candidate.iter().any(|v| !v.is_finite()) {
        return Err(StatsError::NonFinite("candidate"));
    }

    let mut a = baseline.to_vec();
    let mut b = candidate.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let m = a.len();
    let n = b.len();
    // D * m * n is always an integer; work with that to keep the lattice exact.
    let d_scaled = ks_scaled_statistic(&a, &b);
    let statistic = d_scaled as f64 / (m as f64 * n as f64);

    let p_value = if d_scaled == 0 {
        1.0
    } else if (m as u64).saturating_mul(n as u64) <= exact_max_product {
        ks_exact_p_value(m, n, d_scaled)
    } else {
        let en = (m as f64 * n as f64) / (m + n) as f64;
        kolmogorov_survival(en.sqrt() * statistic)
    };

    Ok(TestOutcome {
        kind: TestKind::KolmogorovSmirnov,
        statistic,
        p_value: p_value.clamp(0.0, 1.0),
    })
}

/// `max |i*n - j*m|` over the merged walk of two sorted samples.
fn ks_scaled_statistic(a: &[f64], b: &[f64]) -> u64 {
    let (m, n) = (a.len(), b.len());
    let (mut i, mut j) = (0usize, 0usize);
    let mut best: u64 = 0;
    while i < m && j < n {
        let v = if a[i] <= b[j] { a[i] } else { b[j] };
        while i < m && a[i] == v {
            i += 1;
        }
        while j < n && b[j] == v {
            j += 1;
        }
        let gap = (i as i128 * n as i128 - j as i128 * m as i128).unsigned_abs() as u64;
        best = best.max(gap);
    }
    best
}

/// Exact `P(D >= d)` under the null hypothesis.
///
/// Walks the `m x n` lattice of monotone paths and tracks, for every node, the
/// fraction of paths reaching it that have already touched the region
/// `|i*n - j*m| >= d_scaled`. Fractions stay in `[0, 1]`, so nothing overflows
/// and tiny p-values keep their relative precision.
fn ks_exact_p_value(m: usize, n: usize, d_scaled: u64) -> f64 {
    let outside = |i: usize, j: usize| {
        (i as i128 * n as i128 - j as i128 * m as i128).unsigned_abs() as u64 >= d_scaled
    };

    let mut row = vec![0.0f64; n + 1];
    for j in 1..=n {
        row[j] = if outside(0, j) { 1.0 } else { row[j - 1] };
    }
    for i in 1..=m {
        row[0] = if outside(i, 0) { 1.0 } else { row[0] };
        for j in 1..=n {
            row[j] = if outside(i, j) {
                1.0
            } else {
                let total = (i + j) as f64;
                row[j] * (i as f64 / total) + row[j - 1] * (j as f64 / total)
            };
        }
    }
    row[n]
}

/// Survival function of the Kolmogorov distribution, `P(K > x)`.
pub fn kolmogorov_survival(x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x < 1.18 {
        // Small-x form converges where the alternating series does not.
        let w = (2.0 * std::f64::consts::PI).sqrt() / x;
        let f = -std::f64::consts::PI.powi(2) / (8.0 * x * x);
        let cdf: f64 = (1..=7)
            .map(|k| {
                let odd = (2 * k - 1) as f64;
                (f * odd * odd).exp()
            })
            .sum::<f64>()
            * w;
        return (1.0 - cdf).clamp(0.0, 1.0);
    }
    let mut sum = 0.0;
    for k in 1..=100u32 {
        let kf = f64::from(k);
        let term = (-2.0 * kf * kf * x * x).exp();
        sum += if k % 2 == 1 { term } else { -term };
        if term < 1e-300 {
            break;
        }
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

/// Pearson chi-square test of homogeneity between two categorical samples.
pub fn chi_square_two_sample(
    baseline: &[&str],
    candidate: &[&str],
) -> Result<TestOutcome, StatsError> {
    if baseline.is_empty() {
        return Err(StatsError::EmptySample("baseline"));
    }
    if candidate.is_empty() {
        return Err(StatsError::EmptySample("candidate"));
    }

    let mut counts: BTreeMap<&str, [u64; 2]> = BTreeMap::new();
    for &v in baseline {
        counts.entry(v).or_default()[0] += 1;
    }
    for &v in candidate {
        counts.entry(v).or_default()[1] += 1;
    }

    let categories = counts.len();
    if categories < 2 {
        return Ok(TestOutcome {
            kind: TestKind::ChiSquare,
            statistic: 0.0,
            p_value: 1.0,
        });
    }

    let rows = [baseline.len() as f64, candidate.len() as f64];
    let total = rows[0] + rows[1];
    let mut statistic = 0.0;
    for observed in counts.values() {
        let col = (observed[0] + observed[1]) as f64;
        for (r, &row_total) in rows.iter().enumerate() {
            let expected = row_total * col / total;
            let diff = observed[r] as f64 - expected;
            statistic += diff * diff / expected;
        }
    }

    let dof = (categories - 1) as f64;
    Ok(TestOutcome {
        kind: TestKind::ChiSquare,
        statistic,
        p_value: chi_square_survival(statistic, dof),
    })
}

/// `P(X > x)` for a chi-square variable with `dof` degrees of freedom.
pub fn chi_square_survival(x: f64, dof: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    regularized_gamma_q(dof / 2.0, x / 2.0).clamp(0.0, 1.0)
}

fn ln_gamma(x: f64) -> f64 {
    // Lanczos approximation, g = 7.
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut acc = COEF[0];
    for (i, c) in COEF.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    let t = x + 7.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}

/// Regularized upper incomplete gamma function `Q(a, x)`.
fn regularized_gamma_q(a: f64, x: f64) -> f64 {
    const EPS: f64 = 1e-15;
    const MAX_ITER: usize = 500;
    let ln_prefix = a * x.ln() - x - ln_gamma(a);

    if x < a + 1.0 {
        // Series for P(a, x).
        let mut term = 1.0 / a;
        let mut sum = term;
        let mut ap = a;
        for _ in 0..MAX_ITER {
            ap += 1.0;
            term *= x / ap;
            sum += term;
            if term.abs() < sum.abs() * EPS {
                break;
            }
        }
        1.0 - sum * ln_prefix.exp()
    } else {
        // Continued fraction for Q(a, x), modified Lentz.
        const TINY: f64 = 1e-300;
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / TINY;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..=MAX_ITER {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < TINY {
                d = TINY;
            }
            c = b + an / c;
            if c.abs() < TINY {
                c = TINY;
            }
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < EPS {
                break;
            }
        }
        ln_prefix.exp() * h
    }
}
