use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Weekday};

/// Signed whole days from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date + Duration::days(days)
}

/// True when `a` and `b` are at most `days` apart, in either direction.
pub fn within_days(a: NaiveDate, b: NaiveDate, days: i64) -> bool {
    days_between(a, b).abs() <= days
}

/// Inclusive on both ends.
pub fn is_within(date: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    date >= start && date <= end
}

/// Calendar day an instant falls on in its own time zone.
pub fn start_of_day<Tz: TimeZone>(instant: &DateTime<Tz>) -> NaiveDate {
    instant.date_naive()
}

pub fn today() -> NaiveDate {
    start_of_day(&chrono::Local::now())
}

/// First and last day of a month, or `None` for an invalid year/month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }?;
    Some((first_day, next_month - Duration::days(1)))
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    month_bounds(year, month).map(|(_, last)| last.day())
}

/// Every (year, month) touched by the inclusive range, oldest first.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    if end < start {
        return months;
    }
    let (mut year, mut month) = (start.year(), start.month());
    while (year, month) <= (end.year(), end.month()) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

/// Blank cells needed before `first_day` in a week that starts on `week_start`.
pub fn leading_padding(first_day: NaiveDate, week_start: Weekday) -> u32 {
    let day = first_day.weekday().num_days_from_monday();
    let start = week_start.num_days_from_monday();
    (day + 7 - start) % 7
}

/// Every day of the inclusive range.
pub fn each_day(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}
