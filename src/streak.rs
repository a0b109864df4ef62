use chrono::NaiveDate;
use log::debug;

use crate::date_math::days_between;
use crate::store::{SettingsStore, StoreResult};

pub fn increment<S: SettingsStore>(store: &mut S) -> StoreResult<u32> {
    let mut settings = store.settings()?;
    settings.logging_streak = settings.logging_streak.saturating_add(1);
    store.save_settings(&settings)?;
    Ok(settings.logging_streak)
}

pub fn reset<S: SettingsStore>(store: &mut S) -> StoreResult<()> {
    let mut settings = store.settings()?;
    settings.logging_streak = 0;
    settings.last_logged_on = None;
    store.save_settings(&settings)
}

/// Count a logging session that happened on `today`.
///
/// Logging twice on one day counts once. If the previous counted day is
/// neither today nor yesterday the streak has lapsed and restarts at 1.
pub fn record_log<S: SettingsStore>(store: &mut S, today: NaiveDate) -> StoreResult<u32> {
    let mut settings = store.settings()?;
    let gap = settings
        .last_logged_on
        .map(|last| days_between(last, today));

    match gap {
        Some(0) => return Ok(settings.logging_streak),
        Some(1) => settings.logging_streak = settings.logging_streak.saturating_add(1),
        _ => {
            if settings.logging_streak > 0 {
                debug!("event=streak_lapse module=streak status=reset");
            }
            settings.logging_streak = 1;
        }
    }
    settings.last_logged_on = Some(today);
    store.save_settings(&settings)?;
    Ok(settings.logging_streak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn explicit_increment_and_reset() {
        let mut store = MemoryStore::new();
        assert_eq!(increment(&mut store).unwrap(), 1);
        assert_eq!(increment(&mut store).unwrap(), 2);
        reset(&mut store).unwrap();
        assert_eq!(store.settings().unwrap().logging_streak, 0);
    }

    #[test]
    fn consecutive_days_extend_the_streak() {
        let mut store = MemoryStore::new();
        assert_eq!(record_log(&mut store, d(2024, 1, 1)).unwrap(), 1);
        assert_eq!(record_log(&mut store, d(2024, 1, 1)).unwrap(), 1);
        assert_eq!(record_log(&mut store, d(2024, 1, 2)).unwrap(), 2);
        assert_eq!(record_log(&mut store, d(2024, 1, 3)).unwrap(), 3);
    }

    #[test]
    fn missed_day_restarts_the_streak() {
        let mut store = MemoryStore::new();
        record_log(&mut store, d(2024, 1, 1)).unwrap();
        record_log(&mut store, d(2024, 1, 2)).unwrap();
        assert_eq!(record_log(&mut store, d(2024, 1, 5)).unwrap(), 1);
        assert_eq!(store.settings().unwrap().last_logged_on, Some(d(2024, 1, 5)));
    }
}
