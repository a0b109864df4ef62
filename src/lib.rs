//! Cycle inference for a privacy-first, on-device tracker.
//!
//! Logged days are attributed to cycles by [`resolver`], aggregated by
//! [`stats`], and turned into predictions ([`prediction`]) and a day-by-day
//! calendar ([`calendar`]). [`tracker::Tracker`] ties them to an encrypted
//! vault and serializes every write.

pub mod calendar;
pub mod config;
pub mod crypto;
pub mod date_math;
pub mod fertility;
pub mod logging;
pub mod models;
pub mod prediction;
pub mod resolver;
pub mod stats;
pub mod storage;
pub mod store;
pub mod streak;
pub mod tracker;

pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status};
pub use models::*;
pub use resolver::{Confidence, CycleBoundaryResolver, ResolveError, Resolution, Rule};
pub use store::{CycleStore, LogStore, MemoryStore, SettingsStore, StoreError, StoreResult};
pub use tracker::{LogOutcome, Tracker, TrackerError, TrackerResult};
