use chrono::NaiveDate;

use crate::config::CoreConfig;
use crate::date_math::{add_days, days_between};
use crate::fertility;
use crate::models::{
    Alert, Cycle, CycleSummary, FertilityWindow, Insights, NotificationPayload, Prediction,
};
use crate::resolver::current_cycle;
use crate::stats;

/// Predict the next period from the current cycle and the rolling averages.
/// Falls back to the configured defaults while history is thin.
pub fn predict(cycles: &[Cycle], summary: &CycleSummary) -> Option<Prediction> {
    let current = current_cycle(cycles)?;

    let predicted_start = add_days(current.start_date, summary.rounded_cycle_length());
    let predicted_end = add_days(
        predicted_start,
        (summary.rounded_period_length() - 1).max(0),
    );

    let confidence = if summary.regularity_known {
        (summary.regularity_score as f32).clamp(0.1, 0.95)
    } else {
        0.5
    };

    Some(Prediction {
        predicted_start,
        predicted_end,
        confidence,
    })
}

/// The fertile window that matters as of `today`: the current cycle's, or the
/// one projected for the next cycle once the current one has passed.
pub fn fertility_window(
    cycles: &[Cycle],
    summary: &CycleSummary,
    today: NaiveDate,
    config: &CoreConfig,
) -> Option<FertilityWindow> {
    let current = current_cycle(cycles)?;
    let average = summary.rounded_cycle_length();

    let window = current
        .fertility()
        .unwrap_or_else(|| fertility::compute(current.start_date, average, config));
    if window.fertile_end >= today {
        return Some(window);
    }

    let next_start = add_days(current.start_date, current.known_length().unwrap_or(average));
    Some(fertility::compute(next_start, average, config))
}

pub fn alerts(
    cycles: &[Cycle],
    summary: &CycleSummary,
    prediction: Option<&Prediction>,
    today: NaiveDate,
    config: &CoreConfig,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if summary.regularity_known && !summary.is_regular {
        alerts.push(Alert::Irregular);
    }

    if let Some(prediction) = prediction {
        let overdue = days_between(prediction.predicted_start, today);
        if overdue > config.late_period_grace_days {
            alerts.push(Alert::PeriodLate { days: overdue });
        }
    }

    let last_completed = cycles
        .iter()
        .filter(|c| c.known_length().is_some())
        .max_by_key(|c| c.start_date)
        .and_then(|c| c.known_length());
    match last_completed {
        Some(length) if length < config.short_cycle_days => {
            alerts.push(Alert::ShortCycle { length })
        }
        Some(length) if length > config.long_cycle_days => {
            alerts.push(Alert::LongCycle { length })
        }
        _ => {}
    }

    alerts
}

pub fn notification(
    prediction: Option<&Prediction>,
    fertility: Option<&FertilityWindow>,
) -> Option<NotificationPayload> {
    let prediction = prediction?;
    Some(NotificationPayload {
        next_period_date: prediction.predicted_start,
        fertile_window_start: fertility.map(|w| w.fertile_start),
        ovulation_date: fertility.map(|w| w.ovulation_day),
    })
}

/// Everything the insights screen and the reminder scheduler read, computed
/// from one consistent snapshot.
pub fn insights(cycles: &[Cycle], today: NaiveDate, config: &CoreConfig) -> Insights {
    let summary = stats::summarize(cycles, config);
    let prediction = predict(cycles, &summary);
    let fertility = fertility_window(cycles, &summary, today, config);
    let alerts = alerts(cycles, &summary, prediction.as_ref(), today, config);
    let notification = notification(prediction.as_ref(), fertility.as_ref());

    Insights {
        summary,
        prediction,
        fertility,
        alerts,
        notification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn make_cycle(start: NaiveDate, length: Option<i64>, active: bool) -> Cycle {
        let mut cycle = Cycle::new(start);
        cycle.cycle_length = length;
        cycle.is_active = active;
        cycle.period_length = length.map(|_| 5);
        cycle
    }

    fn two_cycles() -> Vec<Cycle> {
        vec![
            make_cycle(d(2026, 1, 1), Some(28), false),
            make_cycle(d(2026, 1, 29), None, true),
        ]
    }

    #[test]
    fn no_prediction_without_cycles() {
        let config = CoreConfig::default();
        let insights = insights(&[], d(2026, 1, 1), &config);
        assert!(insights.prediction.is_none());
        assert!(insights.fertility.is_none());
        assert!(insights.notification.is_none());
        assert!(insights.alerts.is_empty());
    }

    #[test]
    fn predicts_from_latest_start() {
        let config = CoreConfig::default();
        let cycles = two_cycles();
        let summary = stats::summarize(&cycles, &config);
        let pred = predict(&cycles, &summary).unwrap();
        assert_eq!(pred.predicted_start, d(2026, 2, 26));
        assert_eq!(pred.predicted_end, d(2026, 3, 2));
        // One completed length: regularity unknown.
        assert_eq!(pred.confidence, 0.5);
    }

    #[test]
    fn single_open_cycle_uses_default_length() {
        let config = CoreConfig::default();
        let cycles = vec![make_cycle(d(2026, 1, 1), None, true)];
        let summary = stats::summarize(&cycles, &config);
        let pred = predict(&cycles, &summary).unwrap();
        assert_eq!(pred.predicted_start, d(2026, 1, 29));
    }

    #[test]
    fn fertility_window_rolls_forward_after_it_passes() {
        let config = CoreConfig::default();
        let cycles = two_cycles();
        let summary = stats::summarize(&cycles, &config);

        let current = fertility_window(&cycles, &summary, d(2026, 2, 1), &config).unwrap();
        assert_eq!(current.ovulation_day, d(2026, 2, 11));
        assert_eq!(current.fertile_start, d(2026, 2, 6));

        let next = fertility_window(&cycles, &summary, d(2026, 2, 20), &config).unwrap();
        assert_eq!(next.ovulation_day, d(2026, 3, 11));
    }

    #[test]
    fn late_period_is_flagged_after_grace() {
        let config = CoreConfig::default();
        let cycles = two_cycles();
        let on_time = insights(&cycles, d(2026, 2, 28), &config);
        assert!(on_time.alerts.is_empty());

        let late = insights(&cycles, d(2026, 3, 4), &config);
        assert_eq!(late.alerts, vec![Alert::PeriodLate { days: 6 }]);
    }

    #[test]
    fn irregular_and_long_cycles_are_flagged() {
        let config = CoreConfig::default();
        let cycles = vec![
            make_cycle(d(2026, 1, 1), Some(22), false),
            make_cycle(d(2026, 1, 23), Some(45), false),
            make_cycle(d(2026, 3, 9), None, true),
        ];
        let insights = insights(&cycles, d(2026, 3, 10), &config);
        assert!(insights.alerts.contains(&Alert::Irregular));
        assert!(insights.alerts.contains(&Alert::LongCycle { length: 45 }));
    }

    #[test]
    fn notification_carries_prediction_and_window() {
        let config = CoreConfig::default();
        let insights = insights(&two_cycles(), d(2026, 2, 1), &config);
        let payload = insights.notification.unwrap();
        assert_eq!(payload.next_period_date, d(2026, 2, 26));
        assert_eq!(payload.fertile_window_start, Some(d(2026, 2, 6)));
        assert_eq!(payload.ovulation_date, Some(d(2026, 2, 11)));
    }
}
