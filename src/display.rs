use chrono::{DateTime, Datelike, TimeZone, Timelike};

use crate::alarm::resolver::normalize_degrees;

pub const NO_ALARM_TEXT: &str = "no alarm";
pub const UNKNOWN_DATE_TEXT: &str = "--.--.--";
pub const UNKNOWN_TIME_TEXT: &str = "--:--:--";

/// Hand angles in clockwise degrees from 12 o'clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowAngles {
    pub hour: f64,
    pub minute: f64,
    pub second: f64,
}

impl ArrowAngles {
    /// Sweeping hands: the hour hand advances with minutes, the minute hand
    /// with seconds, the second hand with milliseconds.
    pub fn at<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        let hours = f64::from(dt.hour());
        let minutes = f64::from(dt.minute());
        let millis = (dt.nanosecond() / 1_000_000).min(999);
        let seconds = f64::from(dt.second()) + f64::from(millis) / 1_000.0;
        Self {
            hour: normalize_degrees(hours * 30.0 + minutes * 0.5),
            minute: normalize_degrees(minutes * 6.0 + seconds * 0.1),
            second: normalize_degrees(seconds * 6.0),
        }
    }
}

/// `DD.MM.YY`
pub fn format_date<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    format!(
        "{:02}.{:02}.{:02}",
        dt.day(),
        dt.month(),
        dt.year().rem_euclid(100)
    )
}

/// `HH:MM:SS`, 24-hour.
pub fn format_time<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    format!("{:02}:{:02}:{:02}", dt.hour(), dt.minute(), dt.second())
}

pub fn alarm_status_text<Tz: TimeZone>(alarm: Option<&DateTime<Tz>>) -> String {
    match alarm {
        Some(at) => format!("Alarm set\n{}\n{}", format_date(at), format_time(at)),
        None => NO_ALARM_TEXT.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ModeKind {
    Clock,
    SettingByArrows,
    SettingByDigits,
}

/// Everything Presentation needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySnapshot {
    pub date_text: String,
    pub time_text: String,
    pub time_known: bool,
    /// `None` only when the time is unknown and no setting session pins the hands.
    pub arrows: Option<ArrowAngles>,
    pub alarm_text: String,
    pub show_dismiss: bool,
    pub mode: ModeKind,
    pub time_source: Option<String>,
}
