use chrono::NaiveDate;

use crate::config::CoreConfig;
use crate::date_math::add_days;
use crate::models::{Cycle, FertilityWindow};

/// Estimate ovulation and the fertile window for a cycle starting on `start`.
///
/// Assumes a fixed luteal phase: ovulation falls `luteal_phase_days` before the
/// next expected start. The fertile window runs `fertile_window_lead_days`
/// before ovulation through the day after it. A non-positive length is
/// replaced by the configured default.
pub fn compute(start: NaiveDate, cycle_length: i64, config: &CoreConfig) -> FertilityWindow {
    let cycle_length = if cycle_length > 0 {
        cycle_length
    } else {
        config.default_cycle_length
    };
    let ovulation_offset = cycle_length - config.luteal_phase_days;

    let ovulation_day = add_days(start, ovulation_offset - 1);
    let fertile_start = add_days(start, ovulation_offset - 1 - config.fertile_window_lead_days);
    let fertile_end = add_days(start, ovulation_offset);

    FertilityWindow::new(fertile_start, fertile_end, ovulation_day)
}

/// Write the derived fertility fields onto `cycle`. Uses the cycle's own
/// observed length when known, otherwise `fallback_length`.
pub fn apply(cycle: &mut Cycle, fallback_length: i64, config: &CoreConfig) {
    let length = cycle.known_length().unwrap_or(fallback_length);
    let window = compute(cycle.start_date, length, config);
    cycle.ovulation_date = Some(window.ovulation_day);
    cycle.fertile_window_start = Some(window.fertile_start);
    cycle.fertile_window_end = Some(window.fertile_end);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn standard_cycle() {
        let start = d(2024, 1, 1);
        let window = compute(start, 28, &CoreConfig::default());
        assert_eq!(window.ovulation_day, add_days(start, 13));
        assert_eq!(window.fertile_start, add_days(start, 8));
        assert_eq!(window.fertile_end, add_days(start, 14));
        assert_eq!(window.peak_start, add_days(start, 11));
        assert_eq!(window.peak_end, window.ovulation_day);
    }

    #[test]
    fn non_positive_length_uses_default() {
        let config = CoreConfig::default();
        let start = d(2024, 3, 10);
        assert_eq!(compute(start, 0, &config), compute(start, 28, &config));
        assert_eq!(compute(start, -4, &config), compute(start, 28, &config));
    }

    #[test]
    fn longer_cycle_shifts_ovulation_later() {
        let start = d(2024, 1, 1);
        let window = compute(start, 35, &CoreConfig::default());
        assert_eq!(window.ovulation_day, d(2024, 1, 21));
        assert_eq!(window.fertile_start, d(2024, 1, 16));
        assert_eq!(window.fertile_end, d(2024, 1, 22));
    }

    #[test]
    fn apply_prefers_observed_length() {
        let config = CoreConfig::default();
        let mut cycle = Cycle::new(d(2024, 1, 1));
        apply(&mut cycle, 28, &config);
        assert_eq!(cycle.ovulation_date, Some(d(2024, 1, 14)));

        cycle.cycle_length = Some(32);
        apply(&mut cycle, 28, &config);
        assert_eq!(cycle.ovulation_date, Some(d(2024, 1, 18)));
        assert_eq!(cycle.fertility().map(|w| w.fertile_end), Some(d(2024, 1, 19)));
    }
}
