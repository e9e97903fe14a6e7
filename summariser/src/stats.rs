use perf_tunnel_model::SampleStats;

/// z value for a two sided 95% interval
const Z_95: f64 = 1.959_963_984_540_054;

/// Summary statistics for a set of timing samples, `None` when there are no samples.
pub fn sample_stats(samples: &[f64]) -> Option<SampleStats> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let n = count as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let std_dev = if count > 1 {
        (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    let margin = Z_95 * std_dev / n.sqrt();

    Some(SampleStats {
        count,
        median: median_of_sorted(&sorted),
        mean,
        std_dev,
        min: sorted[0],
        max: sorted[count - 1],
        ci_lower: mean - margin,
        ci_upper: mean + margin,
    })
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Relative change of `current` against `baseline`, in percent.
pub fn delta_pct(current: f64, baseline: f64) -> Option<f64> {
    if baseline == 0.0 {
        return None;
    }
    Some((current - baseline) / baseline * 100.0)
}

/// Confidence that `current` is stochastically larger (slower) than `baseline`.
///
/// One sided Mann-Whitney U test using the normal approximation with tie and continuity
/// corrections. Returns `1 - p`. Groups with fewer than two samples, or input without any spread
/// at all, give a confidence of 0.
pub fn slower_confidence(current: &[f64], baseline: &[f64]) -> f64 {
    let n1 = current.len();
    let n2 = baseline.len();
    if n1 < 2 || n2 < 2 {
        return 0.0;
    }

    let mut combined = current
        .iter()
        .map(|v| (*v, true))
        .chain(baseline.iter().map(|v| (*v, false)))
        .collect::<Vec<_>>();
    combined.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Average ranks across ties and accumulate the tie correction term
    let mut rank_sum_current = 0.0;
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < combined.len() {
        let mut j = i;
        while j + 1 < combined.len() && combined[j + 1].0 == combined[i].0 {
            j += 1;
        }
        let tied = (j - i + 1) as f64;
        let rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum_current += rank * combined[i..=j].iter().filter(|(_, c)| *c).count() as f64;
        tie_term += tied.powi(3) - tied;
        i = j + 1;
    }

    let (n1f, n2f) = (n1 as f64, n2 as f64);
    let n = n1f + n2f;
    let u = rank_sum_current - n1f * (n1f + 1.0) / 2.0;
    let mean_u = n1f * n2f / 2.0;
    let variance = n1f * n2f / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if variance <= 0.0 {
        return 0.0;
    }

    let z = (u - mean_u - 0.5) / variance.sqrt();
    standard_normal_cdf(z)
}

fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz and Stegun 7.1.26, absolute error below 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(expected: f64, actual: f64) {
        assert!(
            (expected - actual).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn stats_for_odd_and_even_counts() {
        let odd = sample_stats(&[3.0, 1.0, 2.0]).unwrap();
        approx(2.0, odd.median);
        approx(2.0, odd.mean);
        approx(1.0, odd.std_dev);
        approx(1.0, odd.min);
        approx(3.0, odd.max);
        assert!(odd.ci_lower < odd.mean && odd.mean < odd.ci_upper);

        let even = sample_stats(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        approx(2.5, even.median);
    }

    #[test]
    fn single_sample_has_no_spread() {
        let stats = sample_stats(&[7.0]).unwrap();
        approx(0.0, stats.std_dev);
        approx(7.0, stats.ci_lower);
        approx(7.0, stats.ci_upper);
        assert!(sample_stats(&[]).is_none());
    }

    #[test]
    fn delta_is_relative_to_baseline() {
        approx(10.0, delta_pct(110.0, 100.0).unwrap());
        approx(-50.0, delta_pct(50.0, 100.0).unwrap());
        assert!(delta_pct(1.0, 0.0).is_none());
    }

    #[test]
    fn clearly_slower_is_confident() {
        let current = [100.0; 10];
        let baseline = [90.0; 10];
        assert!(slower_confidence(&current, &baseline) > 0.999);
    }

    #[test]
    fn clearly_faster_is_not_confident() {
        let current = [80.0, 81.0, 82.0, 83.0, 84.0];
        let baseline = [90.0, 91.0, 92.0, 93.0, 94.0];
        assert!(slower_confidence(&current, &baseline) < 0.01);
    }

    #[test]
    fn identical_samples_give_no_confidence() {
        assert_eq!(0.0, slower_confidence(&[5.0; 4], &[5.0; 4]));
        assert_eq!(0.0, slower_confidence(&[5.0], &[1.0, 2.0]));
    }

    #[test]
    fn interleaved_samples_are_inconclusive() {
        let current = [1.0, 3.0, 5.0, 7.0, 9.0];
        let baseline = [2.0, 4.0, 6.0, 8.0, 10.0];
        let confidence = slower_confidence(&current, &baseline);
        assert!(confidence < 0.9, "confidence was {confidence}");
    }

    #[test]
    fn erf_reference_values() {
        approx(0.0, erf(0.0));
        assert!((erf(1.0) - 0.842_700_79).abs() < 2e-7);
        assert!((erf(-1.0) + 0.842_700_79).abs() < 2e-7);
    }
}
