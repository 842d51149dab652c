// Copyright (c) The flaketrack Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Percentile estimation over an unsorted duration sample.
//!
//! Policy: linear interpolation between order statistics. For a sample of
//! size `n` and percentile `p`, the fractional rank is
//! `r = (p / 100) * (n - 1)`; an integral rank selects that element
//! directly, otherwise the result interpolates between the elements at
//! `floor(r)` and `ceil(r)`, weighted by the fractional part. This is part
//! of the public contract: `percentile(s, 0) == min(s)`,
//! `percentile(s, 100) == max(s)`, and the result is monotonic in `p` for a
//! fixed sample.

/// Estimates the `p`-th percentile of `samples`, `p` in `0..=100`.
///
/// Returns `None` for an empty sample. The input need not be sorted.
pub fn percentile(samples: &[u64], p: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    debug_assert!((0.0..=100.0).contains(&p), "percentile out of range: {p}");

    let mut sorted = samples.to_vec();
    sorted.sort_unstable();

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower] as f64);
    }

    let weight = rank - lower as f64;
    let (lo, hi) = (sorted[lower] as f64, sorted[upper] as f64);
    Some(lo + (hi - lo) * weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn empty_sample_has_no_percentile() {
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test_case(&[7], 0.0, 7.0; "singleton p0")]
    #[test_case(&[7], 50.0, 7.0; "singleton p50")]
    #[test_case(&[7], 100.0, 7.0; "singleton p100")]
    #[test_case(&[10, 20], 50.0, 15.0; "median of two interpolates")]
    #[test_case(&[10, 20, 30], 50.0, 20.0; "odd-length median is exact")]
    #[test_case(&[30, 10, 20, 40], 50.0, 25.0; "unsorted input")]
    #[test_case(&[100, 200, 300, 400], 25.0, 175.0; "quartile interpolates")]
    fn interpolation(samples: &[u64], p: f64, expected: f64) {
        assert_eq!(percentile(samples, p), Some(expected));
    }

    #[test]
    fn extremes_are_min_and_max() {
        let samples = [44, 2, 91, 17, 63, 5];
        let min = *samples.iter().min().unwrap() as f64;
        let max = *samples.iter().max().unwrap() as f64;
        assert_eq!(percentile(&samples, 0.0), Some(min));
        assert_eq!(percentile(&samples, 100.0), Some(max));
    }

    #[test]
    fn monotonic_in_p() {
        let samples = [12, 7, 90, 33, 51, 51, 2, 78];
        let mut previous = f64::NEG_INFINITY;
        for p in 0..=100 {
            let value = percentile(&samples, p as f64).unwrap();
            assert!(
                value >= previous,
                "p{p} = {value} regressed below {previous}"
            );
            previous = value;
        }
    }
}
