use crate::config::CoreConfig;
use crate::models::{Cycle, CycleSummary};

/// Regularity reported when exactly one completed cycle length exists.
pub const NEUTRAL_REGULARITY: f64 = 0.5;

/// Compute cycle statistics from the full history.
///
/// Cycle length and regularity only look at the most recent
/// `config.stats_window` cycles with an observed length; period length averages
/// every cycle that has one. Missing data falls back to the configured
/// defaults, never to an error.
pub fn summarize(cycles: &[Cycle], config: &CoreConfig) -> CycleSummary {
    let mut ordered: Vec<&Cycle> = cycles.iter().collect();
    ordered.sort_by(|a, b| b.start_date.cmp(&a.start_date));

    let all_lengths: Vec<i64> = ordered.iter().filter_map(|c| c.known_length()).collect();
    let recent_lengths: Vec<f64> = all_lengths
        .iter()
        .take(config.stats_window)
        .map(|len| *len as f64)
        .collect();

    let period_lengths: Vec<f64> = ordered
        .iter()
        .filter_map(|c| c.period_length.filter(|len| *len > 0))
        .map(|len| len as f64)
        .collect();

    let average_cycle_length = if recent_lengths.is_empty() {
        config.default_cycle_length as f64
    } else {
        mean(&recent_lengths)
    };
    let average_period_length = if period_lengths.is_empty() {
        config.default_period_length as f64
    } else {
        mean(&period_lengths)
    };

    let regularity_score = regularity_score(&recent_lengths);
    let regularity_known = recent_lengths.len() >= 2;

    let latest = ordered.first();

    CycleSummary {
        average_cycle_length,
        average_period_length,
        regularity_score,
        is_regular: regularity_known && regularity_score >= config.regularity_threshold,
        regularity_known,
        total_cycles: cycles.len(),
        completed_cycles: all_lengths.len(),
        shortest_cycle: all_lengths.iter().copied().min(),
        longest_cycle: all_lengths.iter().copied().max(),
        last_period_start: latest.map(|c| c.start_date),
        last_period_end: latest.and_then(|c| c.end_date),
    }
}

/// `1 - cv` of the given lengths, clamped to `[0, 1]`.
///
/// One length scores [`NEUTRAL_REGULARITY`]; no lengths score 0.
pub fn regularity_score(lengths: &[f64]) -> f64 {
    match lengths.len() {
        0 => 0.0,
        1 => NEUTRAL_REGULARITY,
        _ => {
            let avg = mean(lengths);
            if avg <= 0.0 {
                return 0.0;
            }
            let cv = std_deviation(lengths) / avg;
            (1.0 - cv).clamp(0.0, 1.0)
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    /// Consecutive cycles with the given lengths, oldest first, plus an open
    /// cycle at the end.
    fn history(lengths: &[i64]) -> Vec<Cycle> {
        let mut start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut cycles = Vec::new();
        for len in lengths {
            let mut cycle = Cycle::new(start);
            cycle.cycle_length = Some(*len);
            cycle.period_length = Some(5);
            cycles.push(cycle);
            start += Duration::days(*len);
        }
        cycles.push(Cycle::new(start));
        cycles
    }

    #[test]
    fn empty_history_uses_defaults() {
        let summary = summarize(&[], &CoreConfig::default());
        assert_eq!(summary.average_cycle_length, 28.0);
        assert_eq!(summary.average_period_length, 5.0);
        assert_eq!(summary.regularity_score, 0.0);
        assert!(!summary.regularity_known);
        assert!(!summary.is_regular);
        assert_eq!(summary.last_period_start, None);
    }

    #[test]
    fn single_open_cycle_has_no_length_yet() {
        let cycles = history(&[]);
        let summary = summarize(&cycles, &CoreConfig::default());
        assert_eq!(summary.average_cycle_length, 28.0);
        assert_eq!(summary.completed_cycles, 0);
        assert_eq!(summary.total_cycles, 1);
    }

    #[test]
    fn one_completed_length_is_neutral() {
        let summary = summarize(&history(&[30]), &CoreConfig::default());
        assert_eq!(summary.average_cycle_length, 30.0);
        assert_eq!(summary.regularity_score, NEUTRAL_REGULARITY);
        assert!(!summary.is_regular);
    }

    #[test]
    fn averages_known_lengths() {
        let summary = summarize(&history(&[28, 30, 26, 29]), &CoreConfig::default());
        assert!((summary.average_cycle_length - 28.25).abs() < 1e-9);
        assert_eq!(summary.average_period_length, 5.0);
        assert_eq!(summary.shortest_cycle, Some(26));
        assert_eq!(summary.longest_cycle, Some(30));
        assert!(summary.is_regular);
        assert!(summary.regularity_score > 0.9);
    }

    #[test]
    fn only_recent_window_is_averaged() {
        // Oldest two are outliers and fall outside the six-cycle window.
        let summary = summarize(
            &history(&[60, 60, 28, 28, 28, 28, 28, 28]),
            &CoreConfig::default(),
        );
        assert_eq!(summary.average_cycle_length, 28.0);
        assert_eq!(summary.regularity_score, 1.0);
        assert_eq!(summary.longest_cycle, Some(60));
    }

    #[test]
    fn wild_variation_is_irregular() {
        let summary = summarize(&history(&[21, 45, 24, 50]), &CoreConfig::default());
        assert!(summary.regularity_known);
        assert!(!summary.is_regular);
    }

    #[test]
    fn summary_is_order_independent() {
        let mut cycles = history(&[28, 31, 27]);
        let forward = summarize(&cycles, &CoreConfig::default());
        cycles.reverse();
        assert_eq!(forward, summarize(&cycles, &CoreConfig::default()));
    }

    #[test]
    fn sample_std_deviation() {
        let sd = std_deviation(&[28.0, 30.0, 26.0, 29.0]);
        assert!((sd - 1.707825127659933).abs() < 1e-9);
        assert_eq!(std_deviation(&[28.0]), 0.0);
    }

    proptest! {
        #[test]
        fn regularity_drops_as_spread_grows(
            deviations in proptest::collection::vec(-3i64..=3, 1..4)
                .prop_filter("needs some spread", |d| d.iter().any(|x| *x != 0))
        ) {
            // Mirror the deviations so the mean stays at exactly 30.
            let spread = |scale: i64| -> Vec<f64> {
                deviations
                    .iter()
                    .flat_map(|d| [30 + d * scale, 30 - d * scale])
                    .map(|len| len as f64)
                    .collect()
            };
            let narrow = spread(1);
            let wide = spread(2);
            prop_assert!((mean(&narrow) - mean(&wide)).abs() < 1e-9);
            prop_assert!(regularity_score(&wide) < regularity_score(&narrow));
        }
    }
}
