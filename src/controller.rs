use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Timelike};
use log::{debug, info, warn};

use crate::alarm::gesture::{GestureSample, GestureTracker, RotationAccumulator};
use crate::alarm::monitor::{AlarmMonitor, AlarmStatus};
use crate::alarm::resolver::{DigitInput, resolve_by_arrows, resolve_by_digits};
use crate::clock::{ClockState, MonotonicClock, TimeAnchor};
use crate::config::ClockConfig;
use crate::display::{
    ArrowAngles, DisplaySnapshot, ModeKind, UNKNOWN_DATE_TEXT, UNKNOWN_TIME_TEXT,
    alarm_status_text, format_date, format_time,
};
use crate::error::ClockError;
use crate::sync::{SyncReport, TimeSync};

pub struct ArrowSession {
    accumulator: RotationAccumulator,
    tracker: GestureTracker,
    pending: VecDeque<GestureSample>,
    second: u32,
    second_hand: f64,
}

impl ArrowSession {
    fn drain(&mut self, max_speed: f64) -> usize {
        let applied = self.pending.len();
        for sample in self.pending.drain(..) {
            self.accumulator.apply(&sample, max_speed);
        }
        applied
    }

    fn arrows(&self) -> ArrowAngles {
        ArrowAngles {
            hour: self.accumulator.hour_angle_deg(),
            minute: self.accumulator.minute_angle_deg(),
            second: self.second_hand,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigitFields {
    pub day: String,
    pub hour: String,
    pub minute: String,
}

pub struct DigitSession {
    fields: DigitFields,
    second: u32,
    frozen: ArrowAngles,
}

/// Exactly one mode is active; setting modes carry their own transient state,
/// which is dropped whenever the controller returns to `Clock`.
pub enum Mode {
    Clock,
    SettingByArrows(ArrowSession),
    SettingByDigits(DigitSession),
}

impl Mode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Mode::Clock => ModeKind::Clock,
            Mode::SettingByArrows(_) => ModeKind::SettingByArrows,
            Mode::SettingByDigits(_) => ModeKind::SettingByDigits,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct TickOutcome {
    pub rebased: bool,
    pub gestures_applied: usize,
    pub ringing_started: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingOutcome<Tz: TimeZone> {
    Entered,
    Armed(DateTime<Tz>),
    Unchanged,
}

/// Owns the clock, the alarm and the interaction mode, and runs one tick per frame.
pub struct ClockController<Tz: TimeZone = Local> {
    zone: Tz,
    clock: ClockState,
    monitor: AlarmMonitor<Tz>,
    mode: Mode,
    max_arrow_speed: f64,
    sync: Option<TimeSync>,
    time_source: Option<String>,
}

impl<Tz: TimeZone> ClockController<Tz> {
    pub fn new(
        zone: Tz,
        config: &ClockConfig,
        monotonic: Arc<dyn MonotonicClock>,
    ) -> Result<Self, ClockError> {
        config.validate()?;
        Ok(Self {
            zone,
            clock: ClockState::new(monotonic),
            monitor: AlarmMonitor::new(),
            mode: Mode::Clock,
            max_arrow_speed: config.max_arrow_speed,
            sync: None,
            time_source: None,
        })
    }

    /// Hands the background sync worker to the tick loop, which collects its
    /// reports from then on.
    pub fn attach_time_sync(&mut self, sync: TimeSync) {
        self.sync = Some(sync);
    }

    pub fn time_sync(&self) -> Option<&TimeSync> {
        self.sync.as_ref()
    }

    pub fn rebase(&mut self, anchor: TimeAnchor) {
        self.clock.rebase(anchor);
    }

    pub fn now(&self) -> Option<DateTime<Tz>> {
        self.clock.now_in(&self.zone)
    }

    pub fn mode(&self) -> ModeKind {
        self.mode.kind()
    }

    pub fn alarm_status(&self) -> AlarmStatus {
        self.monitor.status()
    }

    pub fn alarm_time(&self) -> Option<&DateTime<Tz>> {
        self.monitor.alarm_time()
    }

    pub fn time_source(&self) -> Option<&str> {
        self.time_source.as_deref()
    }

    /// One frame: collect a finished sync, apply queued gestures, evaluate the alarm.
    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if let Some(report) = self.sync.as_ref().and_then(TimeSync::take_latest) {
            self.apply_sync_report(report);
            outcome.rebased = true;
        }
        let now = self.now();

        if let Mode::SettingByArrows(session) = &mut self.mode {
            outcome.gestures_applied = session.drain(self.max_arrow_speed);
        }

        let in_clock_mode = matches!(self.mode, Mode::Clock);
        outcome.ringing_started = self.monitor.tick(now.as_ref(), in_clock_mode);
        outcome
    }

    pub fn apply_sync_report(&mut self, report: SyncReport) {
        if !report.anchor.is_known() {
            warn!("time sync failed on every endpoint; clock is now unknown");
        }
        self.clock.rebase(report.anchor);
        self.time_source = report.source;
    }

    /// The set-alarm button: enters arrow setting from `Clock`, confirms otherwise.
    pub fn toggle_setting(&mut self) -> Result<SettingOutcome<Tz>, ClockError> {
        if matches!(self.mode, Mode::Clock) {
            self.begin_setting();
            Ok(SettingOutcome::Entered)
        } else {
            self.confirm_setting()
        }
    }

    /// Starts an arrow-setting session seeded with the hands' current angles.
    /// Does nothing if a session is already open.
    pub fn begin_setting(&mut self) {
        if !matches!(self.mode, Mode::Clock) {
            return;
        }
        let now = self.now();
        let hands = now
            .as_ref()
            .map(ArrowAngles::at)
            .unwrap_or(ArrowAngles {
                hour: 0.0,
                minute: 0.0,
                second: 0.0,
            });
        debug!("entering arrow setting mode");
        self.mode = Mode::SettingByArrows(ArrowSession {
            accumulator: RotationAccumulator::new(hands.hour, hands.minute),
            tracker: GestureTracker::default(),
            pending: VecDeque::new(),
            second: now.as_ref().map(Timelike::second).unwrap_or(0),
            second_hand: hands.second,
        });
    }

    /// Switches an open arrow session to digit entry. Returns `false` outside
    /// a setting session.
    pub fn open_digit_panel(&mut self) -> bool {
        let (second, frozen) = match &self.mode {
            Mode::Clock => return false,
            Mode::SettingByDigits(_) => return true,
            Mode::SettingByArrows(session) => (session.second, session.arrows()),
        };
        debug!("switching to digit setting mode");
        self.mode = Mode::SettingByDigits(DigitSession {
            fields: DigitFields::default(),
            second,
            frozen,
        });
        true
    }

    pub fn set_digit_fields(&mut self, day: &str, hour: &str, minute: &str) -> bool {
        let Mode::SettingByDigits(session) = &mut self.mode else {
            return false;
        };
        session.fields = DigitFields {
            day: day.to_string(),
            hour: hour.to_string(),
            minute: minute.to_string(),
        };
        true
    }

    pub fn digit_fields(&self) -> Option<&DigitFields> {
        match &self.mode {
            Mode::SettingByDigits(session) => Some(&session.fields),
            _ => None,
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        if let Mode::SettingByArrows(session) = &mut self.mode {
            session.tracker.press(x, y);
        }
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64, dt: f64) {
        if let Mode::SettingByArrows(session) = &mut self.mode
            && let Some(sample) = session.tracker.drag_to(x, y, dt)
        {
            session.pending.push_back(sample);
        }
    }

    pub fn pointer_up(&mut self) {
        if let Mode::SettingByArrows(session) = &mut self.mode {
            session.tracker.release();
        }
    }

    /// Queues a ready-made sample; ignored outside arrow setting.
    pub fn push_gesture(&mut self, sample: GestureSample) {
        if let Mode::SettingByArrows(session) = &mut self.mode {
            session.pending.push_back(sample);
        }
    }

    /// Resolves the open session and returns to `Clock` whatever the result.
    /// The previous alarm is kept when nothing changed or resolution failed.
    pub fn confirm_setting(&mut self) -> Result<SettingOutcome<Tz>, ClockError> {
        let mode = mem::replace(&mut self.mode, Mode::Clock);
        let resolved = match mode {
            Mode::Clock => return Ok(SettingOutcome::Unchanged),
            Mode::SettingByArrows(mut session) => {
                session.drain(self.max_arrow_speed);
                let now = self.now().ok_or(ClockError::TimeUnknown)?;
                resolve_by_arrows(&mut session.accumulator, &now, session.second)?
            }
            Mode::SettingByDigits(session) => {
                let now = self.now().ok_or(ClockError::TimeUnknown)?;
                let input = DigitInput::parse(
                    &session.fields.day,
                    &session.fields.hour,
                    &session.fields.minute,
                );
                Some(resolve_by_digits(&input, &now, session.second)?)
            }
        };
        debug!("returning to clock mode");

        match resolved {
            Some(at) => {
                self.monitor.arm(at.clone());
                Ok(SettingOutcome::Armed(at))
            }
            None => {
                info!("alarm hands unchanged; keeping previous alarm");
                Ok(SettingOutcome::Unchanged)
            }
        }
    }

    /// Leaves a setting session without touching the alarm.
    pub fn cancel_setting(&mut self) {
        if !matches!(self.mode, Mode::Clock) {
            debug!("setting cancelled");
            self.mode = Mode::Clock;
        }
    }

    pub fn stop_alarm(&mut self) -> bool {
        self.monitor.stop()
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        let now = self.now();
        let (date_text, time_text) = match &now {
            Some(dt) => (format_date(dt), format_time(dt)),
            None => (UNKNOWN_DATE_TEXT.to_string(), UNKNOWN_TIME_TEXT.to_string()),
        };
        let arrows = match &self.mode {
            Mode::Clock => now.as_ref().map(ArrowAngles::at),
            Mode::SettingByArrows(session) => Some(session.arrows()),
            Mode::SettingByDigits(session) => Some(session.frozen),
        };
        DisplaySnapshot {
            date_text,
            time_text,
            time_known: now.is_some(),
            arrows,
            alarm_text: alarm_status_text(self.monitor.alarm_time()),
            show_dismiss: self.monitor.is_ringing(),
            mode: self.mode.kind(),
            time_source: self.time_source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeDelta, Utc};

    use super::*;
    use crate::clock::ManualMonotonic;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("valid")
    }

    fn controller_at(now: DateTime<Utc>) -> (ClockController<Utc>, ManualMonotonic) {
        let monotonic = ManualMonotonic::new();
        let mut controller =
            ClockController::new(Utc, &ClockConfig::default(), Arc::new(monotonic.clone()))
                .expect("default config is valid");
        controller.rebase(TimeAnchor::known(now, monotonic.elapsed()));
        (controller, monotonic)
    }

    fn drag(delta_y: f64) -> GestureSample {
        GestureSample {
            delta_x: 0.0,
            delta_y,
            dt: 1.0,
        }
    }

    #[test]
    fn unknown_time_shows_placeholders() {
        let controller = ClockController::new(
            Utc,
            &ClockConfig::default(),
            Arc::new(ManualMonotonic::new()),
        )
        .expect("default config is valid");
        let snapshot = controller.snapshot();
        assert!(!snapshot.time_known);
        assert_eq!(snapshot.date_text, UNKNOWN_DATE_TEXT);
        assert_eq!(snapshot.time_text, UNKNOWN_TIME_TEXT);
        assert!(snapshot.arrows.is_none());
        assert_eq!(snapshot.alarm_text, "no alarm");
    }

    #[test]
    fn rejects_config_with_unusable_arrow_speed() {
        for speed in [-1.0, f64::NAN] {
            let config = ClockConfig {
                max_arrow_speed: speed,
                ..ClockConfig::default()
            };
            let result = ClockController::new(Utc, &config, Arc::new(ManualMonotonic::new()));
            assert!(matches!(result, Err(ClockError::InvalidConfig(_))));
        }
    }

    #[test]
    fn gmt_anchor_is_shown_in_controller_zone() {
        let monotonic = ManualMonotonic::new();
        let mut controller = ClockController::new(
            chrono_tz::Europe::Berlin,
            &ClockConfig::default(),
            Arc::new(monotonic.clone()),
        )
        .expect("default config is valid");
        controller.rebase(TimeAnchor::known(
            utc(2030, 1, 1, 12, 0, 0),
            monotonic.elapsed(),
        ));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.date_text, "01.01.30");
        assert_eq!(snapshot.time_text, "13:00:00");
        let arrows = snapshot.arrows.expect("time known");
        assert_eq!(arrows.hour, 30.0);
    }

    #[test]
    fn clock_snapshot_follows_elapsed_time() {
        let (mut controller, monotonic) = controller_at(utc(2030, 1, 1, 12, 0, 0));
        monotonic.advance(Duration::from_secs(65));
        controller.tick();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.date_text, "01.01.30");
        assert_eq!(snapshot.time_text, "12:01:05");
        assert_eq!(snapshot.mode, ModeKind::Clock);
    }

    #[test]
    fn set_button_toggles_into_and_out_of_arrow_setting() {
        let (mut controller, _monotonic) = controller_at(utc(2030, 1, 15, 14, 5, 0));
        assert!(matches!(
            controller.toggle_setting(),
            Ok(SettingOutcome::Entered)
        ));
        assert_eq!(controller.mode(), ModeKind::SettingByArrows);

        let outcome = controller.toggle_setting().expect("confirm");
        assert!(matches!(outcome, SettingOutcome::Unchanged));
        assert_eq!(controller.mode(), ModeKind::Clock);
        assert_eq!(controller.alarm_status(), AlarmStatus::Idle);
    }

    #[test]
    fn arrow_gesture_arms_alarm_after_midnight() {
        let (mut controller, _monotonic) = controller_at(utc(2030, 1, 15, 23, 50, 0));
        controller.begin_setting();
        controller.pointer_down(100.0, 100.0);
        controller.pointer_moved(100.0, 340.0, 1.0);
        controller.pointer_up();
        let outcome = controller.tick();
        assert_eq!(outcome.gestures_applied, 1);

        let arrows = controller.snapshot().arrows.expect("arrows while setting");
        assert_eq!(arrows.hour, 115.0);

        let outcome = controller.confirm_setting().expect("confirm");
        let expected = utc(2030, 1, 16, 3, 50, 0);
        assert!(matches!(outcome, SettingOutcome::Armed(at) if at == expected));
        assert_eq!(controller.alarm_status(), AlarmStatus::Armed);
        assert_eq!(
            controller.snapshot().alarm_text,
            "Alarm set\n16.01.30\n03:50:00"
        );
    }

    #[test]
    fn confirm_applies_gestures_not_yet_ticked() {
        let (mut controller, _monotonic) = controller_at(utc(2030, 1, 15, 9, 0, 0));
        controller.begin_setting();
        controller.push_gesture(drag(60.0));
        let outcome = controller.confirm_setting().expect("confirm");
        assert!(matches!(outcome, SettingOutcome::Armed(at) if at == utc(2030, 1, 15, 10, 0, 0)));
    }

    #[test]
    fn digit_panel_only_opens_while_setting() {
        let (mut controller, _monotonic) = controller_at(utc(2030, 1, 15, 14, 5, 0));
        assert!(!controller.open_digit_panel());
        assert!(!controller.set_digit_fields("1", "2", "3"));

        controller.begin_setting();
        assert!(controller.open_digit_panel());
        assert_eq!(controller.mode(), ModeKind::SettingByDigits);
        assert_eq!(controller.digit_fields(), Some(&DigitFields::default()));
        controller.push_gesture(drag(100.0));
        assert_eq!(controller.tick().gestures_applied, 0);
    }

    #[test]
    fn empty_digits_arm_next_hour_plus_two_minutes() {
        let (mut controller, _monotonic) = controller_at(utc(2030, 1, 15, 14, 5, 0));
        controller.begin_setting();
        controller.open_digit_panel();
        controller.set_digit_fields("", "", "");
        let outcome = controller.toggle_setting().expect("confirm");
        assert!(matches!(outcome, SettingOutcome::Armed(at) if at == utc(2030, 1, 15, 15, 7, 0)));
        assert_eq!(controller.mode(), ModeKind::Clock);
    }

    #[test]
    fn session_second_is_frozen_at_entry() {
        let (mut controller, monotonic) = controller_at(utc(2030, 1, 15, 14, 5, 12));
        controller.begin_setting();
        controller.open_digit_panel();
        controller.set_digit_fields("15", "18", "30");
        monotonic.advance(Duration::from_secs(20));
        let outcome = controller.confirm_setting().expect("confirm");
        assert!(matches!(outcome, SettingOutcome::Armed(at) if at == utc(2030, 1, 15, 18, 30, 12)));
    }

    #[test]
    fn alarm_rings_once_and_stop_clears_it() {
        let (mut controller, monotonic) = controller_at(utc(2030, 1, 15, 14, 5, 0));
        controller.begin_setting();
        controller.open_digit_panel();
        controller.confirm_setting().expect("confirm");

        monotonic.advance(Duration::from_secs(61 * 60));
        assert!(!controller.tick().ringing_started);
        monotonic.advance(Duration::from_secs(60));
        assert!(controller.tick().ringing_started);
        assert!(controller.snapshot().show_dismiss);
        assert!(!controller.tick().ringing_started);
        assert_eq!(controller.alarm_status(), AlarmStatus::Ringing);

        assert!(controller.stop_alarm());
        let snapshot = controller.snapshot();
        assert!(!snapshot.show_dismiss);
        assert_eq!(snapshot.alarm_text, "no alarm");
        assert!(controller.alarm_time().is_none());
    }

    #[test]
    fn no_ringing_while_a_setting_session_is_open() {
        let (mut controller, monotonic) = controller_at(utc(2030, 1, 15, 14, 5, 0));
        controller.begin_setting();
        controller.open_digit_panel();
        controller.confirm_setting().expect("confirm");

        controller.begin_setting();
        monotonic.advance(Duration::from_secs(3 * 3_600));
        assert!(!controller.tick().ringing_started);
        controller.cancel_setting();
        assert!(controller.tick().ringing_started);
    }

    #[test]
    fn confirming_without_known_time_fails_and_keeps_alarm() {
        let (mut controller, monotonic) = controller_at(utc(2030, 1, 15, 14, 5, 0));
        controller.begin_setting();
        controller.open_digit_panel();
        controller.confirm_setting().expect("confirm");
        let armed = controller.alarm_time().cloned();

        controller.begin_setting();
        controller.push_gesture(drag(30.0));
        controller.rebase(TimeAnchor::unknown(monotonic.elapsed()));
        let err = controller.confirm_setting().expect_err("time unknown");
        assert!(matches!(err, ClockError::TimeUnknown));
        assert_eq!(controller.mode(), ModeKind::Clock);
        assert_eq!(controller.alarm_time().cloned(), armed);
    }

    #[test]
    fn sync_report_rebases_clock_and_records_source() {
        let (mut controller, monotonic) = controller_at(utc(2030, 1, 15, 14, 5, 0));
        let corrected = utc(2030, 1, 15, 14, 6, 0) + TimeDelta::seconds(30);
        controller.apply_sync_report(SyncReport {
            anchor: TimeAnchor::known(corrected, monotonic.elapsed()),
            source: Some("https://one.example/".to_string()),
        });
        assert_eq!(controller.now(), Some(corrected));
        assert_eq!(controller.time_source(), Some("https://one.example/"));

        controller.apply_sync_report(SyncReport {
            anchor: TimeAnchor::unknown(monotonic.elapsed()),
            source: None,
        });
        assert!(controller.now().is_none());
        assert!(!controller.snapshot().time_known);
    }
}
