use chrono::{DateTime, TimeZone};
use log::info;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AlarmStatus {
    Idle,
    Armed,
    Ringing,
}

enum MonitorState<Tz: TimeZone> {
    Idle,
    Armed(DateTime<Tz>),
    Ringing(DateTime<Tz>),
}

/// Watches the current time against the single resolved alarm.
///
/// ```text
///        arm()            now >= alarm
///  Idle ───────► Armed ───────────────► Ringing
///   ▲              │                       │
///   └──── stop() ──┴────────── stop() ─────┘
/// ```
pub struct AlarmMonitor<Tz: TimeZone> {
    state: MonitorState<Tz>,
}

impl<Tz: TimeZone> Default for AlarmMonitor<Tz> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tz: TimeZone> AlarmMonitor<Tz> {
    pub fn new() -> Self {
        Self {
            state: MonitorState::Idle,
        }
    }

    /// Replaces whatever alarm was set, including one that is ringing.
    pub fn arm(&mut self, at: DateTime<Tz>) {
        info!("alarm armed for {}", at.naive_local());
        self.state = MonitorState::Armed(at);
    }

    /// Evaluates one tick. Returns `true` only on the tick that starts ringing.
    /// Nothing happens while the time is unknown or a setting session is open.
    pub fn tick(&mut self, now: Option<&DateTime<Tz>>, in_clock_mode: bool) -> bool {
        if !in_clock_mode {
            return false;
        }
        let Some(now) = now else {
            return false;
        };
        let MonitorState::Armed(at) = &self.state else {
            return false;
        };
        if now < at {
            return false;
        }
        let at = at.clone();
        info!("alarm reached at {}", now.naive_local());
        self.state = MonitorState::Ringing(at);
        true
    }

    /// Clears the alarm. Returns `false` if there was nothing to clear.
    pub fn stop(&mut self) -> bool {
        if matches!(self.state, MonitorState::Idle) {
            return false;
        }
        info!("alarm stopped");
        self.state = MonitorState::Idle;
        true
    }

    pub fn status(&self) -> AlarmStatus {
        match self.state {
            MonitorState::Idle => AlarmStatus::Idle,
            MonitorState::Armed(_) => AlarmStatus::Armed,
            MonitorState::Ringing(_) => AlarmStatus::Ringing,
        }
    }

    pub fn alarm_time(&self) -> Option<&DateTime<Tz>> {
        match &self.state {
            MonitorState::Idle => None,
            MonitorState::Armed(at) | MonitorState::Ringing(at) => Some(at),
        }
    }

    pub fn is_ringing(&self) -> bool {
        matches!(self.state, MonitorState::Ringing(_))
    }
}
