use chrono::{
    DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike,
};

use crate::alarm::gesture::RotationAccumulator;
use crate::error::ClockError;

const DEGREES_PER_HOUR: f64 = 30.0;
const DEGREES_PER_MINUTE: f64 = 6.0;

/// Wraps any angle into `[0, 360)`.
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Hour on a 12-hour dial, 0 meaning 12 o'clock.
pub fn hour12(hour_angle_deg: f64) -> u32 {
    let sector = (normalize_degrees(hour_angle_deg) / DEGREES_PER_HOUR).floor();
    (sector as u32).min(11)
}

pub fn minute_of_hour(minute_angle_deg: f64) -> u32 {
    let sector = (normalize_degrees(minute_angle_deg) / DEGREES_PER_MINUTE).floor();
    (sector as u32).min(59)
}

/// Resolves the hands of an arrow-setting session into an alarm time.
///
/// Returns `Ok(None)` when neither hand moved. A session that wrapped the hour
/// hand past 12 targets tomorrow; otherwise an afternoon `now` keeps the alarm
/// in the afternoon. `second` is the second captured when the session began.
pub fn resolve_by_arrows<Tz: TimeZone>(
    accumulator: &mut RotationAccumulator,
    now: &DateTime<Tz>,
    second: u32,
) -> Result<Option<DateTime<Tz>>, ClockError> {
    if accumulator.is_unchanged() {
        return Ok(None);
    }

    let today = now.date_naive();
    let mut date = today;
    if accumulator.crossed_twelve() {
        date = date.succ_opt().ok_or(ClockError::DateOutOfRange)?;
        accumulator.clear_crossed_twelve();
    }

    let mut hour = hour12(accumulator.hour_angle_deg());
    if now.hour() >= 13 && date == today {
        hour += 12;
    }
    let minute = minute_of_hour(accumulator.minute_angle_deg());

    let naive = date
        .and_hms_opt(hour, minute, second)
        .ok_or(ClockError::DateOutOfRange)?;
    resolve_local(&now.timezone(), naive).map(Some)
}

/// Raw day/hour/minute fields as typed by the user. Unparseable text is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigitInput {
    pub day: Option<i64>,
    pub hour: Option<i64>,
    pub minute: Option<i64>,
}

impl DigitInput {
    pub fn parse(day: &str, hour: &str, minute: &str) -> Self {
        Self {
            day: parse_field(day),
            hour: parse_field(hour),
            minute: parse_field(minute),
        }
    }
}

fn parse_field(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

/// Resolves typed digits into an alarm time in the current month.
///
/// Out-of-range or missing fields fall back independently: day to today, hour
/// to the next hour, minute to two minutes from now. Defaulted hours and
/// minutes past 23/59 carry into the next day/hour. A day beyond the end of the
/// month is clamped to its last day.
pub fn resolve_by_digits<Tz: TimeZone>(
    input: &DigitInput,
    now: &DateTime<Tz>,
    second: u32,
) -> Result<DateTime<Tz>, ClockError> {
    let day = input
        .day
        .filter(|day| (1..=31).contains(day))
        .unwrap_or_else(|| i64::from(now.day()));
    let hour = input
        .hour
        .filter(|hour| (1..=23).contains(hour))
        .unwrap_or_else(|| i64::from(now.hour()) + 1);
    let minute = input
        .minute
        .filter(|minute| (1..=59).contains(minute))
        .unwrap_or_else(|| i64::from(now.minute()) + 2);

    let date = clamp_day_to_month(now.year(), now.month(), day)?;
    let naive = date
        .and_hms_opt(0, 0, second)
        .and_then(|midnight| midnight.checked_add_signed(TimeDelta::try_hours(hour)?))
        .and_then(|at| at.checked_add_signed(TimeDelta::try_minutes(minute)?))
        .ok_or(ClockError::DateOutOfRange)?;
    resolve_local(&now.timezone(), naive)
}

fn clamp_day_to_month(year: i32, month: u32, day: i64) -> Result<NaiveDate, ClockError> {
    let day = u32::try_from(day).map_err(|_| ClockError::DateOutOfRange)?;
    (1..=day)
        .rev()
        .find_map(|candidate| NaiveDate::from_ymd_opt(year, month, candidate))
        .ok_or(ClockError::DateOutOfRange)
}

/// Picks the earlier instant for ambiguous local times; gaps are an error.
fn resolve_local<Tz: TimeZone>(zone: &Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>, ClockError> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(first, _second) => Ok(first),
        LocalResult::None => Err(ClockError::NonexistentLocalTime(naive)),
    }
}
