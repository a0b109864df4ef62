use std::path::PathBuf;
use std::sync::RwLock;

use chrono::NaiveDate;
use log::{debug, info};
use serde::Serialize;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::calendar::{self, CalendarContext};
use crate::config::CoreConfig;
use crate::crypto::{CryptoError, KdfParams};
use crate::date_math::{self, each_day, month_bounds};
use crate::models::*;
use crate::prediction;
use crate::resolver::{current_cycle, CycleBoundaryResolver, ResolveError, Resolution};
use crate::stats;
use crate::storage::{self, StorageError};
use crate::store::{CycleStore, LogStore, MemoryStore, SettingsStore, StoreError};
use crate::streak;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker is locked")]
    Locked,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("session state poisoned by an earlier panic")]
    Poisoned,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Debug, Clone, Serialize)]
pub struct LogOutcome {
    pub log_id: Uuid,
    /// `None` for a non-bleeding day before every known cycle.
    pub resolution: Option<Resolution>,
    pub streak: u32,
}

/// Decrypted data and passphrase while unlocked.
struct Session {
    passphrase: Zeroizing<String>,
    store: MemoryStore,
}

/// Single-user tracker over an encrypted vault.
///
/// Writes take the session lock exclusively for their whole read-resolve-write
/// sequence and are applied to a draft copy that only replaces the live data
/// once it has been persisted. A failed write therefore leaves both memory and
/// disk untouched, and a multi-day entry lands all at once or not at all.
/// Reads share the lock and see one consistent snapshot.
pub struct Tracker {
    data_dir: PathBuf,
    config: CoreConfig,
    kdf: KdfParams,
    clock: fn() -> NaiveDate,
    session: RwLock<Option<Session>>,
}

impl Tracker {
    pub fn new(data_dir: impl Into<PathBuf>, config: CoreConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            config,
            kdf: KdfParams::default(),
            clock: date_math::today,
            session: RwLock::new(None),
        }
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Replace the source of "today", for backfill-sensitive tests.
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn is_setup(&self) -> bool {
        storage::data_exists(&self.data_dir)
    }

    pub fn is_unlocked(&self) -> bool {
        self.session
            .read()
            .map(|session| session.is_some())
            .unwrap_or(false)
    }

    /// Create a fresh vault and unlock it.
    pub fn setup(&self, passphrase: String, settings: UserSettings) -> TrackerResult<()> {
        if self.is_setup() {
            return Err(TrackerError::InvalidInput(
                "a vault already exists; wipe it first".into(),
            ));
        }
        let data = AppData {
            settings,
            ..AppData::default()
        };
        storage::save(&self.data_dir, &passphrase, &data, &self.kdf)?;

        *self.session.write().map_err(|_| TrackerError::Poisoned)? = Some(Session {
            passphrase: Zeroizing::new(passphrase),
            store: MemoryStore::from_data(data),
        });
        info!("event=vault_setup module=tracker status=ok");
        Ok(())
    }

    /// Returns `false` for a wrong passphrase; any other failure is an error.
    pub fn unlock(&self, passphrase: String) -> TrackerResult<bool> {
        let data = match storage::load(&self.data_dir, &passphrase) {
            Ok(data) => data,
            Err(StorageError::Crypto(CryptoError::Decryption)) => {
                info!("event=vault_unlock module=tracker status=rejected");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        let mut store = MemoryStore::from_data(data);
        let today = (self.clock)();
        let config = self.effective_config(&store)?;
        refresh(&mut store, today, &config)?;
        storage::save(&self.data_dir, &passphrase, store.data(), &self.kdf)?;

        *self.session.write().map_err(|_| TrackerError::Poisoned)? = Some(Session {
            passphrase: Zeroizing::new(passphrase),
            store,
        });
        info!("event=vault_unlock module=tracker status=ok");
        Ok(true)
    }

    /// Drop the passphrase and the decrypted data from memory.
    pub fn lock(&self) {
        if let Ok(mut session) = self.session.write() {
            *session = None;
        }
    }

    /// Record one day and attribute it to a cycle.
    pub fn log_day(&self, date: NaiveDate, fields: LogFields) -> TrackerResult<LogOutcome> {
        self.write(|store, today, config| {
            let (log_id, resolution) = apply_log(store, date, fields, today, config)?;
            refresh(store, today, config)?;
            let streak = streak::record_log(store, today)?;
            Ok(LogOutcome {
                log_id,
                resolution,
                streak,
            })
        })
    }

    /// Record a bleeding period spanning `start..=end` as one batch.
    pub fn log_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        flow_level: FlowLevel,
    ) -> TrackerResult<Vec<LogOutcome>> {
        if end < start {
            return Err(ResolveError::EndBeforeStart { start, end }.into());
        }
        if !flow_level.is_bleeding() {
            return Err(TrackerError::InvalidInput(
                "a period entry needs a bleeding flow level".into(),
            ));
        }

        self.write(|store, today, config| {
            let mut outcomes = Vec::new();
            for date in each_day(start, end) {
                let fields = match store.get_log(date)? {
                    Some(existing) => LogFields {
                        flow_level,
                        mood: existing.mood,
                        energy: existing.energy,
                        symptoms: existing.symptoms,
                        notes: existing.notes,
                    },
                    None => LogFields::flow(flow_level),
                };
                let (log_id, resolution) = apply_log(store, date, fields, today, config)?;
                outcomes.push((log_id, resolution));
            }
            refresh(store, today, config)?;
            let streak = streak::record_log(store, today)?;
            debug!(
                "event=period_batch module=tracker status=ok days={}",
                outcomes.len()
            );
            Ok(outcomes
                .into_iter()
                .map(|(log_id, resolution)| LogOutcome {
                    log_id,
                    resolution,
                    streak,
                })
                .collect())
        })
    }

    /// Move a log to another day. The target day must be free.
    pub fn move_log(&self, from: NaiveDate, to: NaiveDate) -> TrackerResult<LogOutcome> {
        self.write(|store, today, config| {
            let log = store
                .get_log(from)?
                .ok_or_else(|| TrackerError::InvalidInput(format!("no log on {from}")))?;
            if from != to && store.get_log(to)?.is_some() {
                return Err(TrackerError::InvalidInput(format!("{to} already has a log")));
            }
            store.delete_log(log.id)?;
            let fields = LogFields {
                flow_level: log.flow_level,
                mood: log.mood,
                energy: log.energy,
                symptoms: log.symptoms,
                notes: log.notes,
            };
            let (log_id, resolution) = apply_log(store, to, fields, today, config)?;
            rebuild(store, today, config)?;
            let streak = store.settings()?.logging_streak;
            Ok(LogOutcome {
                log_id,
                resolution,
                streak,
            })
        })
    }

    /// Returns whether a log existed on `date`.
    pub fn delete_log(&self, date: NaiveDate) -> TrackerResult<bool> {
        self.write(|store, today, config| {
            let Some(log) = store.get_log(date)? else {
                return Ok(false);
            };
            store.delete_log(log.id)?;
            rebuild(store, today, config)?;
            Ok(true)
        })
    }

    /// Delete a cycle. Its logs stay and are re-linked to whatever cycle now
    /// covers their date.
    pub fn delete_cycle(&self, cycle_id: Uuid) -> TrackerResult<()> {
        self.write(|store, today, config| {
            store.delete_cycle(cycle_id)?;
            rebuild(store, today, config)
        })
    }

    pub fn close_period(&self, cycle_id: Uuid, end: NaiveDate) -> TrackerResult<Cycle> {
        self.write(|store, today, config| {
            let average = average_length(store, config)?;
            let cycle = CycleBoundaryResolver::new(config, today, average)
                .close_period(store, cycle_id, end)?;
            Ok(cycle)
        })
    }

    /// Rebuild cycle lengths, the active flag and log links from scratch.
    pub fn recalculate(&self) -> TrackerResult<Vec<Cycle>> {
        self.write(|store, today, config| {
            rebuild(store, today, config)?;
            Ok(store.all_cycles()?)
        })
    }

    pub fn get_log(&self, date: NaiveDate) -> TrackerResult<Option<DailyLog>> {
        self.read(|store, _, _| Ok(store.get_log(date)?))
    }

    pub fn get_month(&self, year: i32, month: u32) -> TrackerResult<MonthData> {
        self.read(|store, today, config| {
            let (first_day, last_day) = month_bounds(year, month)
                .ok_or_else(|| TrackerError::InvalidInput(format!("invalid month {year}-{month}")))?;

            let cycles = store.all_cycles()?;
            let settings = store.settings()?;
            let insights = prediction::insights(&cycles, today, config);
            let logs = store.logs_in_range(first_day, last_day)?;
            let logs_by_date = calendar::logs_by_date(logs.iter().cloned());

            let ctx = CalendarContext {
                today,
                current_cycle: current_cycle(&cycles),
                average_cycle_length: insights.summary.rounded_cycle_length(),
                logs: &logs_by_date,
                config,
            };
            let days = calendar::month_grid(&ctx, year, month)
                .ok_or_else(|| TrackerError::InvalidInput(format!("invalid month {year}-{month}")))?;

            Ok(MonthData {
                year,
                month,
                days,
                logs,
                prediction: insights.prediction,
                fertility: insights.fertility.filter(|_| settings.show_fertility),
                current_cycle: current_cycle(&cycles).cloned(),
                stats: insights.summary,
            })
        })
    }

    pub fn get_insights(&self) -> TrackerResult<Insights> {
        self.read(|store, today, config| {
            Ok(prediction::insights(&store.all_cycles()?, today, config))
        })
    }

    pub fn get_predictions(&self) -> TrackerResult<Vec<Prediction>> {
        Ok(self.get_insights()?.prediction.into_iter().collect())
    }

    pub fn get_stats(&self) -> TrackerResult<CycleSummary> {
        self.read(|store, _, config| Ok(stats::summarize(&store.all_cycles()?, config)))
    }

    pub fn get_settings(&self) -> TrackerResult<UserSettings> {
        self.read(|store, _, _| Ok(store.settings()?))
    }

    /// Update the fallback averages used while history is thin. Fertility
    /// windows are re-derived right away.
    pub fn update_averages(
        &self,
        average_cycle_length: i64,
        average_period_length: i64,
    ) -> TrackerResult<UserSettings> {
        if !(15..=90).contains(&average_cycle_length) {
            return Err(TrackerError::InvalidInput(format!(
                "average cycle length {average_cycle_length} outside 15..=90"
            )));
        }
        if !(1..=15).contains(&average_period_length) {
            return Err(TrackerError::InvalidInput(format!(
                "average period length {average_period_length} outside 1..=15"
            )));
        }
        self.write(|store, today, _| {
            let mut settings = store.settings()?;
            settings.average_cycle_length = average_cycle_length;
            settings.average_period_length = average_period_length;
            store.save_settings(&settings)?;

            let config = self.config.with_user_defaults(&settings);
            refresh(store, today, &config)?;
            Ok(settings)
        })
    }

    pub fn toggle_fertility(&self, enabled: bool) -> TrackerResult<()> {
        self.update_settings(|settings| settings.show_fertility = enabled)
    }

    pub fn complete_onboarding(&self) -> TrackerResult<()> {
        self.update_settings(|settings| settings.onboarding_completed = true)
    }

    pub fn reset_streak(&self) -> TrackerResult<()> {
        self.write(|store, _, _| Ok(streak::reset(store)?))
    }

    /// Snapshot of cycles, logs and settings for an exporter.
    pub fn export_snapshot(&self) -> TrackerResult<AppData> {
        self.read(|store, _, _| Ok(store.data().clone()))
    }

    pub fn export_data(&self) -> TrackerResult<String> {
        let snapshot = self.export_snapshot()?;
        serde_json::to_string_pretty(&snapshot).map_err(|e| StorageError::from(e).into())
    }

    pub fn wipe_all_data(&self) -> TrackerResult<()> {
        self.lock();
        Ok(storage::wipe(&self.data_dir)?)
    }

    fn update_settings(&self, change: impl FnOnce(&mut UserSettings)) -> TrackerResult<()> {
        self.write(|store, _, _| {
            let mut settings = store.settings()?;
            change(&mut settings);
            Ok(store.save_settings(&settings)?)
        })
    }

    fn effective_config(&self, store: &MemoryStore) -> TrackerResult<CoreConfig> {
        Ok(self.config.with_user_defaults(&store.settings()?))
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&MemoryStore, NaiveDate, &CoreConfig) -> TrackerResult<T>,
    ) -> TrackerResult<T> {
        let guard = self.session.read().map_err(|_| TrackerError::Poisoned)?;
        let session = guard.as_ref().ok_or(TrackerError::Locked)?;
        let config = self.effective_config(&session.store)?;
        f(&session.store, (self.clock)(), &config)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut MemoryStore, NaiveDate, &CoreConfig) -> TrackerResult<T>,
    ) -> TrackerResult<T> {
        let mut guard = self.session.write().map_err(|_| TrackerError::Poisoned)?;
        let session = guard.as_mut().ok_or(TrackerError::Locked)?;

        let mut draft = session.store.clone();
        let config = self.effective_config(&draft)?;
        let value = f(&mut draft, (self.clock)(), &config)?;

        storage::save(&self.data_dir, &session.passphrase, draft.data(), &self.kdf)?;
        session.store = draft;
        Ok(value)
    }
}

fn validate(fields: &mut LogFields) -> TrackerResult<()> {
    for (name, value) in [("mood", fields.mood), ("energy", fields.energy)] {
        if let Some(value) = value.filter(|v| !(1..=5).contains(v)) {
            return Err(TrackerError::InvalidInput(format!(
                "{name} must be 1-5, got {value}"
            )));
        }
    }
    for symptom in &mut fields.symptoms {
        symptom.severity = symptom.severity.clamp(1, 3);
    }
    // One entry per symptom type; the last one logged wins.
    let mut seen = std::collections::HashSet::new();
    let mut deduped: Vec<Symptom> = fields
        .symptoms
        .drain(..)
        .rev()
        .filter(|s| seen.insert(s.symptom_type))
        .collect();
    deduped.reverse();
    fields.symptoms = deduped;
    Ok(())
}

fn average_length(store: &MemoryStore, config: &CoreConfig) -> TrackerResult<i64> {
    Ok(stats::summarize(&store.all_cycles()?, config).rounded_cycle_length())
}

/// Upsert the log and attribute it. Only days with real flow may create or
/// close cycles.
fn apply_log(
    store: &mut MemoryStore,
    date: NaiveDate,
    mut fields: LogFields,
    today: NaiveDate,
    config: &CoreConfig,
) -> TrackerResult<(Uuid, Option<Resolution>)> {
    validate(&mut fields)?;
    let starts_cycle = fields.flow_level.starts_cycle();
    let log_id = store.upsert_log(date, &fields)?;

    let resolver = CycleBoundaryResolver::new(config, today, average_length(store, config)?);
    let resolution = if starts_cycle {
        Some(resolver.resolve(store, date)?)
    } else {
        None
    };
    // Logs link to the cycle covering their date, the same rule a rebuild uses.
    let link = resolver.attribute(&*store, date)?;
    store.set_log_cycle(log_id, link.as_ref().map(|r| r.cycle.id))?;
    Ok((log_id, resolution.or(link)))
}

/// Re-derive period lengths and fertility after a write.
fn refresh(store: &mut MemoryStore, today: NaiveDate, config: &CoreConfig) -> TrackerResult<()> {
    let logs = store.all_logs()?;
    let resolver = CycleBoundaryResolver::new(config, today, average_length(store, config)?);
    resolver.derive_periods(store, &logs)?;
    resolver.refresh_fertility(store)?;
    Ok(())
}

/// Full rebuild after the cycle sequence itself changed.
fn rebuild(store: &mut MemoryStore, today: NaiveDate, config: &CoreConfig) -> TrackerResult<()> {
    let resolver = CycleBoundaryResolver::new(config, today, average_length(store, config)?);
    resolver.recalculate(store)?;
    resolver.relink_logs(store)?;
    refresh(store, today, config)
}
