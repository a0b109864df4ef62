//! Persistence boundary for cycles, daily logs and settings.
//!
//! The inference code only ever talks to these traits, so any storage engine
//! can sit behind them. [`MemoryStore`] keeps everything in an [`AppData`]
//! snapshot, which is also what the encrypted vault persists.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{AppData, Cycle, DailyLog, LogFields, UserSettings};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cycle not found: {0}")]
    CycleNotFound(Uuid),
    #[error("log not found: {0}")]
    LogNotFound(Uuid),
    #[error("cycle already exists: {0}")]
    DuplicateCycle(Uuid),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub trait LogStore {
    /// Create the log for `date`, or overwrite the fields of the existing one.
    fn upsert_log(&mut self, date: NaiveDate, fields: &LogFields) -> StoreResult<Uuid>;
    fn get_log(&self, date: NaiveDate) -> StoreResult<Option<DailyLog>>;
    /// Logs within the inclusive range, oldest first.
    fn logs_in_range(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<DailyLog>>;
    fn set_log_cycle(&mut self, id: Uuid, cycle_id: Option<Uuid>) -> StoreResult<()>;
    fn delete_log(&mut self, id: Uuid) -> StoreResult<()>;

    fn all_logs(&self) -> StoreResult<Vec<DailyLog>> {
        self.logs_in_range(NaiveDate::MIN, NaiveDate::MAX)
    }
}

pub trait CycleStore {
    /// Every cycle, newest `start_date` first.
    fn all_cycles(&self) -> StoreResult<Vec<Cycle>>;
    fn create_cycle(&mut self, cycle: &Cycle) -> StoreResult<Uuid>;
    fn update_cycle(&mut self, cycle: &Cycle) -> StoreResult<()>;
    fn delete_cycle(&mut self, id: Uuid) -> StoreResult<()>;
}

pub trait SettingsStore {
    fn settings(&self) -> StoreResult<UserSettings>;
    fn save_settings(&mut self, settings: &UserSettings) -> StoreResult<()>;
}

/// In-memory store over an [`AppData`] snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: AppData,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: AppData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &AppData {
        &self.data
    }

    pub fn into_data(self) -> AppData {
        self.data
    }
}

impl LogStore for MemoryStore {
    fn upsert_log(&mut self, date: NaiveDate, fields: &LogFields) -> StoreResult<Uuid> {
        if let Some(existing) = self.data.logs.iter_mut().find(|l| l.date == date) {
            existing.apply(fields.clone());
            return Ok(existing.id);
        }
        let log = DailyLog::new(date, fields.clone());
        let id = log.id;
        self.data.logs.push(log);
        Ok(id)
    }

    fn get_log(&self, date: NaiveDate) -> StoreResult<Option<DailyLog>> {
        Ok(self.data.logs.iter().find(|l| l.date == date).cloned())
    }

    fn logs_in_range(&self, start: NaiveDate, end: NaiveDate) -> StoreResult<Vec<DailyLog>> {
        let mut logs: Vec<DailyLog> = self
            .data
            .logs
            .iter()
            .filter(|l| l.date >= start && l.date <= end)
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.date);
        Ok(logs)
    }

    fn set_log_cycle(&mut self, id: Uuid, cycle_id: Option<Uuid>) -> StoreResult<()> {
        let log = self
            .data
            .logs
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(StoreError::LogNotFound(id))?;
        log.cycle_id = cycle_id;
        Ok(())
    }

    fn delete_log(&mut self, id: Uuid) -> StoreResult<()> {
        let before = self.data.logs.len();
        self.data.logs.retain(|l| l.id != id);
        if self.data.logs.len() == before {
            return Err(StoreError::LogNotFound(id));
        }
        Ok(())
    }
}

impl CycleStore for MemoryStore {
    fn all_cycles(&self) -> StoreResult<Vec<Cycle>> {
        let mut cycles = self.data.cycles.clone();
        cycles.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(cycles)
    }

    fn create_cycle(&mut self, cycle: &Cycle) -> StoreResult<Uuid> {
        if self.data.cycles.iter().any(|c| c.id == cycle.id) {
            return Err(StoreError::DuplicateCycle(cycle.id));
        }
        self.data.cycles.push(cycle.clone());
        Ok(cycle.id)
    }

    fn update_cycle(&mut self, cycle: &Cycle) -> StoreResult<()> {
        let existing = self
            .data
            .cycles
            .iter_mut()
            .find(|c| c.id == cycle.id)
            .ok_or(StoreError::CycleNotFound(cycle.id))?;
        *existing = cycle.clone();
        Ok(())
    }

    fn delete_cycle(&mut self, id: Uuid) -> StoreResult<()> {
        let before = self.data.cycles.len();
        self.data.cycles.retain(|c| c.id != id);
        if self.data.cycles.len() == before {
            return Err(StoreError::CycleNotFound(id));
        }
        Ok(())
    }
}

impl SettingsStore for MemoryStore {
    fn settings(&self) -> StoreResult<UserSettings> {
        Ok(self.data.settings.clone())
    }

    fn save_settings(&mut self, settings: &UserSettings) -> StoreResult<()> {
        self.data.settings = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlowLevel;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn upsert_keeps_one_log_per_day() {
        let mut store = MemoryStore::new();
        let first = store
            .upsert_log(d(2024, 1, 1), &LogFields::flow(FlowLevel::Light))
            .unwrap();
        let second = store
            .upsert_log(d(2024, 1, 1), &LogFields::flow(FlowLevel::Heavy))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.all_logs().unwrap().len(), 1);
        assert_eq!(
            store.get_log(d(2024, 1, 1)).unwrap().unwrap().flow_level,
            FlowLevel::Heavy
        );
    }

    #[test]
    fn range_query_is_inclusive_and_sorted() {
        let mut store = MemoryStore::new();
        for day in [5, 1, 3, 9] {
            store
                .upsert_log(d(2024, 1, day), &LogFields::default())
                .unwrap();
        }
        let dates: Vec<_> = store
            .logs_in_range(d(2024, 1, 1), d(2024, 1, 5))
            .unwrap()
            .into_iter()
            .map(|l| l.date)
            .collect();
        assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 1, 3), d(2024, 1, 5)]);
    }

    #[test]
    fn cycles_come_back_newest_first() {
        let mut store = MemoryStore::new();
        store.create_cycle(&Cycle::new(d(2024, 1, 1))).unwrap();
        store.create_cycle(&Cycle::new(d(2024, 2, 1))).unwrap();
        let cycles = store.all_cycles().unwrap();
        assert_eq!(cycles[0].start_date, d(2024, 2, 1));
    }

    #[test]
    fn missing_records_are_reported() {
        let mut store = MemoryStore::new();
        let cycle = Cycle::new(d(2024, 1, 1));
        assert!(matches!(
            store.update_cycle(&cycle),
            Err(StoreError::CycleNotFound(_))
        ));
        assert!(matches!(
            store.delete_log(Uuid::new_v4()),
            Err(StoreError::LogNotFound(_))
        ));
        store.create_cycle(&cycle).unwrap();
        assert!(matches!(
            store.create_cycle(&cycle),
            Err(StoreError::DuplicateCycle(_))
        ));
    }

    #[test]
    fn deleting_a_cycle_leaves_logs_dangling() {
        let mut store = MemoryStore::new();
        let cycle = Cycle::new(d(2024, 1, 1));
        store.create_cycle(&cycle).unwrap();
        let log_id = store
            .upsert_log(d(2024, 1, 1), &LogFields::flow(FlowLevel::Medium))
            .unwrap();
        store.set_log_cycle(log_id, Some(cycle.id)).unwrap();
        store.delete_cycle(cycle.id).unwrap();
        let log = store.get_log(d(2024, 1, 1)).unwrap().unwrap();
        assert_eq!(log.cycle_id, Some(cycle.id));
    }
}
