//! Attribution of logged days to cycles.
//!
//! # Responsibility
//! - Decide whether a bleeding day belongs to a known cycle, opens a new one,
//!   or backfills a cycle older than every known one.
//! - Keep derived cycle fields (lengths, active flag, fertility) consistent
//!   with the sequence of start dates.
//!
//! # Invariants
//! - At most one cycle is active after any write made here.
//! - `cycle_length` of a cycle is the gap to the next start, never set for the
//!   newest cycle by `recalculate`.
//! - Ambiguous days are never rejected; they fall back to the newest cycle and
//!   are reported with [`Confidence::Low`].

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::date_math::{days_between, within_days};
use crate::fertility;
use crate::models::{Cycle, DailyLog};
use crate::store::{CycleStore, LogStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("period end {end} is before its start {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which attribution rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    ExactStart,
    WithinPeriod,
    /// Inside a known cycle but past its bleeding days. Never creates anything.
    Contained,
    Historical,
    NewCycle,
    FirstCycle,
    Fallback,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::ExactStart => "exact_start",
            Rule::WithinPeriod => "within_period",
            Rule::Contained => "contained",
            Rule::Historical => "historical",
            Rule::NewCycle => "new_cycle",
            Rule::FirstCycle => "first_cycle",
            Rule::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    /// The day was attributed by heuristic and deserves a second look.
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub cycle: Cycle,
    pub rule: Rule,
    pub confidence: Confidence,
}

impl Resolution {
    fn high(cycle: Cycle, rule: Rule) -> Self {
        Self {
            cycle,
            rule,
            confidence: Confidence::High,
        }
    }
}

/// The active cycle, modelled as a query over the history: the newest cycle
/// carrying the flag.
pub fn active_cycle(cycles: &[Cycle]) -> Option<&Cycle> {
    cycles
        .iter()
        .filter(|c| c.is_active)
        .max_by_key(|c| c.start_date)
}

pub fn latest_cycle(cycles: &[Cycle]) -> Option<&Cycle> {
    cycles.iter().max_by_key(|c| c.start_date)
}

/// The cycle predictions and the calendar are anchored on: the active one, or
/// the newest cycle when every start so far was a backfill.
pub fn current_cycle(cycles: &[Cycle]) -> Option<&Cycle> {
    active_cycle(cycles).or_else(|| latest_cycle(cycles))
}

/// Resolves days against a snapshot of the cycle history.
///
/// Callers must hold the per-user write lock for the whole call: every method
/// reads the cycle list and then writes based on that snapshot.
pub struct CycleBoundaryResolver<'a> {
    config: &'a CoreConfig,
    today: NaiveDate,
    average_cycle_length: i64,
}

impl<'a> CycleBoundaryResolver<'a> {
    /// `average_cycle_length` stands in for the length of any cycle whose own
    /// length is still unknown when its fertility window is computed.
    pub fn new(config: &'a CoreConfig, today: NaiveDate, average_cycle_length: i64) -> Self {
        Self {
            config,
            today,
            average_cycle_length,
        }
    }

    /// Find or create the cycle a bleeding day belongs to.
    pub fn resolve<S: CycleStore>(
        &self,
        store: &mut S,
        date: NaiveDate,
    ) -> Result<Resolution, ResolveError> {
        let cycles = store.all_cycles()?;

        let Some(latest) = cycles.first() else {
            let cycle = self.open_cycle(store, date)?;
            return Ok(self.report(Resolution::high(cycle, Rule::FirstCycle)));
        };

        if let Some(cycle) = self.match_existing(&cycles, date) {
            return Ok(self.report(cycle));
        }

        if let Some(oldest) = cycles.last().filter(|c| date < c.start_date) {
            let gap = days_between(date, oldest.start_date);
            let mut cycle = Cycle::new(date);
            cycle.cycle_length = Some(gap);
            fertility::apply(&mut cycle, self.average_cycle_length, self.config);
            store.create_cycle(&cycle)?;

            let confidence = if gap >= self.config.minimum_inter_cycle_gap_days {
                Confidence::High
            } else {
                Confidence::Low
            };
            return Ok(self.report(Resolution {
                cycle,
                rule: Rule::Historical,
                confidence,
            }));
        }

        let gap = days_between(latest.start_date, date);
        if gap > self.config.minimum_inter_cycle_gap_days {
            let mut closed = latest.clone();
            closed.is_active = false;
            closed.cycle_length = Some(gap);
            fertility::apply(&mut closed, self.average_cycle_length, self.config);
            store.update_cycle(&closed)?;

            let cycle = self.open_cycle(store, date)?;
            return Ok(self.report(Resolution::high(cycle, Rule::NewCycle)));
        }

        Ok(self.report(Resolution {
            cycle: latest.clone(),
            rule: Rule::Fallback,
            confidence: Confidence::Low,
        }))
    }

    /// Attribute a non-bleeding day without ever creating or closing a cycle.
    ///
    /// Returns `None` when the day precedes every known cycle.
    pub fn attribute<S: CycleStore>(
        &self,
        store: &S,
        date: NaiveDate,
    ) -> Result<Option<Resolution>, ResolveError> {
        let cycles = store.all_cycles()?;
        if let Some(resolution) = self.match_existing(&cycles, date) {
            return Ok(Some(resolution));
        }
        Ok(cycles
            .iter()
            .find(|c| c.start_date <= date)
            .map(|c| Resolution::high(c.clone(), Rule::Contained)))
    }

    /// Rebuild every `cycle_length` from the ordered start dates and make sure
    /// exactly one cycle is active. Returns the history, newest first.
    pub fn recalculate<S: CycleStore>(&self, store: &mut S) -> Result<Vec<Cycle>, ResolveError> {
        let mut cycles = store.all_cycles()?;
        cycles.reverse();

        let count = cycles.len();
        let keep_active = cycles
            .iter()
            .rposition(|c| c.is_active)
            .or_else(|| count.checked_sub(1));

        let mut rebuilt = Vec::with_capacity(count);
        for (index, original) in cycles.iter().enumerate() {
            let mut cycle = original.clone();
            cycle.cycle_length = cycles
                .get(index + 1)
                .map(|next| days_between(cycle.start_date, next.start_date));
            cycle.is_active = Some(index) == keep_active;
            fertility::apply(&mut cycle, self.average_cycle_length, self.config);

            if cycle != *original {
                store.update_cycle(&cycle)?;
            }
            rebuilt.push(cycle);
        }

        debug!("event=cycles_recalculate module=resolver status=ok count={count}");
        rebuilt.reverse();
        Ok(rebuilt)
    }

    /// Re-derive fertility for every cycle, e.g. after the rolling average or
    /// the user's default length moved. Returns how many cycles changed.
    pub fn refresh_fertility<S: CycleStore>(&self, store: &mut S) -> Result<usize, ResolveError> {
        let mut changed = 0;
        for original in store.all_cycles()? {
            let mut cycle = original.clone();
            fertility::apply(&mut cycle, self.average_cycle_length, self.config);
            if cycle != original {
                store.update_cycle(&cycle)?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Point every log at the cycle its date falls in now. Logs before the
    /// first cycle are unlinked.
    pub fn relink_logs<S: CycleStore + LogStore>(&self, store: &mut S) -> Result<(), ResolveError> {
        for log in store.all_logs()? {
            let cycle_id = self.attribute(&*store, log.date)?.map(|r| r.cycle.id);
            if cycle_id != log.cycle_id {
                store.set_log_cycle(log.id, cycle_id)?;
            }
        }
        Ok(())
    }

    /// Close a cycle's bleeding period on `end`.
    pub fn close_period<S: CycleStore>(
        &self,
        store: &mut S,
        cycle_id: Uuid,
        end: NaiveDate,
    ) -> Result<Cycle, ResolveError> {
        let mut cycle = store
            .all_cycles()?
            .into_iter()
            .find(|c| c.id == cycle_id)
            .ok_or(StoreError::CycleNotFound(cycle_id))?;
        if end < cycle.start_date {
            return Err(ResolveError::EndBeforeStart {
                start: cycle.start_date,
                end,
            });
        }
        cycle.end_date = Some(end);
        cycle.period_length = Some(days_between(cycle.start_date, end) + 1);
        store.update_cycle(&cycle)?;
        Ok(cycle)
    }

    /// Derive each cycle's bleeding period from the logged flow days.
    ///
    /// A period is the run of bleeding days from the cycle start where
    /// consecutive days are at most `period_gap_tolerance_days` apart. It is
    /// closed once a later cycle exists or its last bleeding day is further
    /// than that tolerance from today. Cycles without any bleeding log in their
    /// span keep whatever was set explicitly.
    pub fn derive_periods<S: CycleStore>(
        &self,
        store: &mut S,
        logs: &[DailyLog],
    ) -> Result<(), ResolveError> {
        let mut flow_days: Vec<NaiveDate> = logs
            .iter()
            .filter(|l| l.flow_level.is_bleeding())
            .map(|l| l.date)
            .collect();
        flow_days.sort();
        flow_days.dedup();

        let cycles = store.all_cycles()?;
        for (index, original) in cycles.iter().enumerate() {
            // Newest first, so the next cycle sits one slot earlier.
            let next_start = index
                .checked_sub(1)
                .and_then(|i| cycles.get(i))
                .map(|c| c.start_date);

            let mut span = flow_days
                .iter()
                .copied()
                .filter(|day| *day >= original.start_date)
                .filter(|day| next_start.map_or(true, |next| *day < next))
                .peekable();
            if span.peek().is_none() {
                continue;
            }

            let mut period_end = original.start_date;
            for day in span {
                if days_between(period_end, day) > self.config.period_gap_tolerance_days {
                    break;
                }
                period_end = day;
            }

            let closed = next_start.is_some()
                || days_between(period_end, self.today) > self.config.period_gap_tolerance_days;

            let mut cycle = original.clone();
            if closed {
                cycle.end_date = Some(period_end);
                cycle.period_length = Some(days_between(cycle.start_date, period_end) + 1);
            } else {
                cycle.end_date = None;
                cycle.period_length = None;
            }
            if cycle != *original {
                store.update_cycle(&cycle)?;
            }
        }
        Ok(())
    }

    fn match_existing(&self, cycles: &[Cycle], date: NaiveDate) -> Option<Resolution> {
        if let Some(cycle) = cycles.iter().find(|c| c.start_date == date) {
            return Some(Resolution::high(cycle.clone(), Rule::ExactStart));
        }
        // Newest first: the first cycle starting on or before `date` is the
        // closest one.
        cycles
            .iter()
            .find(|c| c.start_date <= date)
            .filter(|c| {
                days_between(c.start_date, date) <= self.config.period_attribution_window_days
            })
            .map(|c| Resolution::high(c.clone(), Rule::WithinPeriod))
    }

    /// Create a cycle at `date`, active only if it looks like the current
    /// period rather than a backfill.
    fn open_cycle<S: CycleStore>(
        &self,
        store: &mut S,
        date: NaiveDate,
    ) -> Result<Cycle, ResolveError> {
        let mut cycle = Cycle::new(date);
        cycle.is_active = within_days(date, self.today, self.config.active_window_days);
        fertility::apply(&mut cycle, self.average_cycle_length, self.config);

        if cycle.is_active {
            for mut stale in store.all_cycles()?.into_iter().filter(|c| c.is_active) {
                stale.is_active = false;
                store.update_cycle(&stale)?;
            }
        }
        store.create_cycle(&cycle)?;
        Ok(cycle)
    }

    fn report(&self, resolution: Resolution) -> Resolution {
        match resolution.confidence {
            Confidence::High => info!(
                "event=cycle_resolve module=resolver status=ok rule={} active={}",
                resolution.rule.as_str(),
                resolution.cycle.is_active
            ),
            Confidence::Low => warn!(
                "event=cycle_resolve module=resolver status=low_confidence rule={}",
                resolution.rule.as_str()
            ),
        }
        resolution
    }
}
