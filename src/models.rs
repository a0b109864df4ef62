use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum FlowLevel {
    #[default]
    None,
    Spotting,
    Light,
    Medium,
    Heavy,
}

impl FlowLevel {
    /// Any non-zero flow, spotting included.
    pub fn is_bleeding(self) -> bool {
        self != FlowLevel::None
    }

    /// Flow strong enough to open a new cycle. Spotting alone never does.
    pub fn starts_cycle(self) -> bool {
        self >= FlowLevel::Light
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SymptomType {
    Cramps,
    Headache,
    MoodLow,
    MoodHigh,
    Fatigue,
    Bloating,
    BreastTenderness,
    Acne,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Symptom {
    pub symptom_type: SymptomType,
    pub severity: u8, // 1-3
}

/// One menstrual cycle. Lengths are in whole days.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cycle {
    pub id: Uuid,
    pub start_date: NaiveDate,
    /// Last bleeding day, once the period is closed.
    pub end_date: Option<NaiveDate>,
    pub period_length: Option<i64>,
    /// Only known once a later cycle has started.
    pub cycle_length: Option<i64>,
    pub is_active: bool,
    pub ovulation_date: Option<NaiveDate>,
    pub fertile_window_start: Option<NaiveDate>,
    pub fertile_window_end: Option<NaiveDate>,
}

impl Cycle {
    pub fn new(start_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_date,
            end_date: None,
            period_length: None,
            cycle_length: None,
            is_active: false,
            ovulation_date: None,
            fertile_window_start: None,
            fertile_window_end: None,
        }
    }

    /// Cycle length if it has been observed, ignoring non-positive leftovers.
    pub fn known_length(&self) -> Option<i64> {
        self.cycle_length.filter(|len| *len > 0)
    }

    pub fn fertility(&self) -> Option<FertilityWindow> {
        match (
            self.fertile_window_start,
            self.fertile_window_end,
            self.ovulation_date,
        ) {
            (Some(fertile_start), Some(fertile_end), Some(ovulation_day)) => {
                Some(FertilityWindow::new(fertile_start, fertile_end, ovulation_day))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyLog {
    pub id: Uuid,
    pub date: NaiveDate,
    pub flow_level: FlowLevel,
    pub mood: Option<u8>,
    pub energy: Option<u8>,
    pub symptoms: Vec<Symptom>,
    pub notes: String,
    /// Weak reference; the cycle may have been deleted since.
    pub cycle_id: Option<Uuid>,
}

impl DailyLog {
    pub fn new(date: NaiveDate, fields: LogFields) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            flow_level: fields.flow_level,
            mood: fields.mood,
            energy: fields.energy,
            symptoms: fields.symptoms,
            notes: fields.notes,
            cycle_id: None,
        }
    }

    pub fn apply(&mut self, fields: LogFields) {
        self.flow_level = fields.flow_level;
        self.mood = fields.mood;
        self.energy = fields.energy;
        self.symptoms = fields.symptoms;
        self.notes = fields.notes;
    }
}

/// User-editable part of a daily log.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogFields {
    pub flow_level: FlowLevel,
    pub mood: Option<u8>,
    pub energy: Option<u8>,
    #[serde(default)]
    pub symptoms: Vec<Symptom>,
    #[serde(default)]
    pub notes: String,
}

impl LogFields {
    pub fn flow(flow_level: FlowLevel) -> Self {
        Self {
            flow_level,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSettings {
    pub average_cycle_length: i64,
    pub average_period_length: i64,
    pub logging_streak: u32,
    /// Day the streak was last counted for.
    #[serde(default)]
    pub last_logged_on: Option<NaiveDate>,
    pub onboarding_completed: bool,
    #[serde(default)]
    pub show_fertility: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            average_cycle_length: 28,
            average_period_length: 5,
            logging_streak: 0,
            last_logged_on: None,
            onboarding_completed: false,
            show_fertility: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FertilityWindow {
    pub fertile_start: NaiveDate,
    pub fertile_end: NaiveDate,
    pub ovulation_day: NaiveDate,
    pub peak_start: NaiveDate,
    pub peak_end: NaiveDate,
}

impl FertilityWindow {
    /// Peak fertility is the two days leading into ovulation plus ovulation itself.
    pub fn new(fertile_start: NaiveDate, fertile_end: NaiveDate, ovulation_day: NaiveDate) -> Self {
        Self {
            fertile_start,
            fertile_end,
            ovulation_day,
            peak_start: ovulation_day - chrono::Duration::days(2),
            peak_end: ovulation_day,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.fertile_start && date <= self.fertile_end
    }
}

/// Aggregates over the cycle history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleSummary {
    pub average_cycle_length: f64,
    pub average_period_length: f64,
    pub regularity_score: f64,
    pub is_regular: bool,
    /// False while fewer than two completed cycle lengths exist.
    pub regularity_known: bool,
    pub total_cycles: usize,
    pub completed_cycles: usize,
    pub shortest_cycle: Option<i64>,
    pub longest_cycle: Option<i64>,
    pub last_period_start: Option<NaiveDate>,
    pub last_period_end: Option<NaiveDate>,
}

impl CycleSummary {
    pub fn rounded_cycle_length(&self) -> i64 {
        self.average_cycle_length.round() as i64
    }

    pub fn rounded_period_length(&self) -> i64 {
        self.average_period_length.round() as i64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub predicted_start: NaiveDate,
    pub predicted_end: NaiveDate,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    /// Recent cycle lengths vary too much to be called regular.
    Irregular,
    PeriodLate { days: i64 },
    ShortCycle { length: i64 },
    LongCycle { length: i64 },
}

/// What the reminder scheduler needs, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPayload {
    pub next_period_date: NaiveDate,
    pub fertile_window_start: Option<NaiveDate>,
    pub ovulation_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insights {
    pub summary: CycleSummary,
    pub prediction: Option<Prediction>,
    pub fertility: Option<FertilityWindow>,
    pub alerts: Vec<Alert>,
    pub notification: Option<NotificationPayload>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "flow", rename_all = "snake_case")]
pub enum DayCategory {
    Empty,
    Normal,
    Logged,
    Period(FlowLevel),
    PredictedPeriod,
    Fertile,
    Ovulation,
}

/// One cell of the month grid. Padding cells carry no date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: Option<NaiveDate>,
    pub category: DayCategory,
    pub is_today: bool,
}

/// Snapshot of everything the user owns; also the export format.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppData {
    pub cycles: Vec<Cycle>,
    pub logs: Vec<DailyLog>,
    pub settings: UserSettings,
}

/// Data returned to the presentation layer for a month view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthData {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
    pub logs: Vec<DailyLog>,
    pub prediction: Option<Prediction>,
    pub fertility: Option<FertilityWindow>,
    pub current_cycle: Option<Cycle>,
    pub stats: CycleSummary,
}
