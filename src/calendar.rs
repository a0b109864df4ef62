use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::CoreConfig;
use crate::date_math::{add_days, each_day, is_within, leading_padding, month_bounds};
use crate::fertility;
use crate::models::{CalendarDay, Cycle, DailyLog, DayCategory, FertilityWindow};

/// Everything the classifier reads. Built once per displayed month.
pub struct CalendarContext<'a> {
    pub today: NaiveDate,
    /// Anchor for the predicted period and the fertile window.
    pub current_cycle: Option<&'a Cycle>,
    /// Used when the active cycle has no observed length of its own.
    pub average_cycle_length: i64,
    pub logs: &'a BTreeMap<NaiveDate, DailyLog>,
    pub config: &'a CoreConfig,
}

impl CalendarContext<'_> {
    /// First day of the bleeding expected after the current cycle.
    pub fn predicted_start(&self) -> Option<NaiveDate> {
        let cycle = self.current_cycle?;
        let length = cycle.known_length().unwrap_or(self.average_cycle_length);
        Some(add_days(cycle.start_date, length))
    }

    /// Stored window of the current cycle, computed on the fly if it was never
    /// derived.
    pub fn fertility(&self) -> Option<FertilityWindow> {
        let cycle = self.current_cycle?;
        cycle.fertility().or_else(|| {
            let length = cycle.known_length().unwrap_or(self.average_cycle_length);
            Some(fertility::compute(cycle.start_date, length, self.config))
        })
    }
}

/// Classify one day. The first matching rule wins, so logged bleeding always
/// beats any prediction and predictions beat plain logs.
pub fn classify(ctx: &CalendarContext<'_>, date: NaiveDate) -> DayCategory {
    let log = ctx.logs.get(&date);

    if let Some(log) = log.filter(|l| l.flow_level.is_bleeding()) {
        return DayCategory::Period(log.flow_level);
    }

    if date > ctx.today {
        if let Some(start) = ctx.predicted_start() {
            let end = add_days(start, ctx.config.predicted_period_days - 1);
            if is_within(date, start, end) {
                return DayCategory::PredictedPeriod;
            }
        }
    }

    if let Some(window) = ctx.fertility().filter(|w| w.contains(date)) {
        return if date == window.ovulation_day {
            DayCategory::Ovulation
        } else {
            DayCategory::Fertile
        };
    }

    if log.is_some() {
        return DayCategory::Logged;
    }

    DayCategory::Normal
}

/// Build the grid for a month: padding cells up to the first weekday, then
/// one classified cell per day. `None` for an invalid year/month.
pub fn month_grid(ctx: &CalendarContext<'_>, year: i32, month: u32) -> Option<Vec<CalendarDay>> {
    let (first_day, last_day) = month_bounds(year, month)?;
    let padding = leading_padding(first_day, ctx.config.week_starts_on) as usize;

    let mut days = Vec::with_capacity(padding + 31);
    days.extend((0..padding).map(|_| CalendarDay {
        date: None,
        category: DayCategory::Empty,
        is_today: false,
    }));
    days.extend(each_day(first_day, last_day).map(|date| CalendarDay {
        date: Some(date),
        category: classify(ctx, date),
        is_today: date == ctx.today,
    }));
    Some(days)
}

/// Index logs by their date.
pub fn logs_by_date(logs: impl IntoIterator<Item = DailyLog>) -> BTreeMap<NaiveDate, DailyLog> {
    logs.into_iter().map(|l| (l.date, l)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlowLevel, LogFields};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn log(date: NaiveDate, flow: FlowLevel) -> DailyLog {
        DailyLog::new(date, LogFields::flow(flow))
    }

    fn active_cycle(start: NaiveDate, config: &CoreConfig) -> Cycle {
        let mut cycle = Cycle::new(start);
        cycle.is_active = true;
        fertility::apply(&mut cycle, 28, config);
        cycle
    }

    #[test]
    fn logged_bleeding_dominates_fertile_window() {
        let config = CoreConfig::default();
        let cycle = active_cycle(d(2024, 1, 1), &config);
        // Jan 10 is inside the Jan 9..=Jan 15 fertile window.
        let logs = logs_by_date([log(d(2024, 1, 10), FlowLevel::Heavy)]);
        let ctx = CalendarContext {
            today: d(2024, 1, 5),
            current_cycle: Some(&cycle),
            average_cycle_length: 28,
            logs: &logs,
            config: &config,
        };
        assert_eq!(
            classify(&ctx, d(2024, 1, 10)),
            DayCategory::Period(FlowLevel::Heavy)
        );
        assert_eq!(classify(&ctx, d(2024, 1, 11)), DayCategory::Fertile);
        assert_eq!(classify(&ctx, d(2024, 1, 14)), DayCategory::Ovulation);
        assert_eq!(classify(&ctx, d(2024, 1, 15)), DayCategory::Fertile);
        assert_eq!(classify(&ctx, d(2024, 1, 16)), DayCategory::Normal);
    }

    #[test]
    fn predicted_period_only_in_the_future() {
        let config = CoreConfig::default();
        let cycle = active_cycle(d(2024, 1, 1), &config);
        let logs = BTreeMap::new();
        let mut ctx = CalendarContext {
            today: d(2024, 1, 20),
            current_cycle: Some(&cycle),
            average_cycle_length: 28,
            logs: &logs,
            config: &config,
        };
        assert_eq!(classify(&ctx, d(2024, 1, 28)), DayCategory::Normal);
        assert_eq!(classify(&ctx, d(2024, 1, 29)), DayCategory::PredictedPeriod);
        assert_eq!(classify(&ctx, d(2024, 2, 2)), DayCategory::PredictedPeriod);
        assert_eq!(classify(&ctx, d(2024, 2, 3)), DayCategory::Normal);

        ctx.today = d(2024, 1, 30);
        assert_eq!(classify(&ctx, d(2024, 1, 29)), DayCategory::Normal);
        assert_eq!(classify(&ctx, d(2024, 1, 31)), DayCategory::PredictedPeriod);
    }

    #[test]
    fn non_bleeding_log_is_logged() {
        let config = CoreConfig::default();
        let logs = logs_by_date([log(d(2024, 1, 3), FlowLevel::None)]);
        let ctx = CalendarContext {
            today: d(2024, 1, 5),
            current_cycle: None,
            average_cycle_length: 28,
            logs: &logs,
            config: &config,
        };
        assert_eq!(classify(&ctx, d(2024, 1, 3)), DayCategory::Logged);
        assert_eq!(classify(&ctx, d(2024, 1, 4)), DayCategory::Normal);
    }

    #[test]
    fn spotting_counts_as_period() {
        let config = CoreConfig::default();
        let logs = logs_by_date([log(d(2024, 1, 3), FlowLevel::Spotting)]);
        let ctx = CalendarContext {
            today: d(2024, 1, 5),
            current_cycle: None,
            average_cycle_length: 28,
            logs: &logs,
            config: &config,
        };
        assert_eq!(
            classify(&ctx, d(2024, 1, 3)),
            DayCategory::Period(FlowLevel::Spotting)
        );
    }

    #[test]
    fn grid_pads_before_first_weekday() {
        let config = CoreConfig::default();
        let logs = BTreeMap::new();
        let ctx = CalendarContext {
            today: d(2024, 2, 14),
            current_cycle: None,
            average_cycle_length: 28,
            logs: &logs,
            config: &config,
        };
        let grid = month_grid(&ctx, 2024, 2).unwrap();
        // Feb 2024 starts on a Thursday and has 29 days.
        assert_eq!(grid.len(), 4 + 29);
        assert!(grid[..4]
            .iter()
            .all(|c| c.date.is_none() && c.category == DayCategory::Empty));
        assert_eq!(grid[4].date, Some(d(2024, 2, 1)));
        assert!(grid[4 + 13].is_today);
        assert!(month_grid(&ctx, 2024, 0).is_none());
    }
}
