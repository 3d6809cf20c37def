use crate::alarm::resolver::normalize_degrees;

/// Hour hand travel per unit of vertical pointer movement at unit speed.
const HOUR_DEG_PER_UNIT: f64 = 0.5;
/// Minute hand travel; twelve times the hour hand, like a real movement.
const MINUTE_DEG_PER_UNIT: f64 = 6.0;

/// One pointer-drag step: screen delta since the previous sample and the
/// seconds that elapsed in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSample {
    pub delta_x: f64,
    pub delta_y: f64,
    pub dt: f64,
}

/// Turns absolute pointer positions into `GestureSample`s.
#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    last: Option<(f64, f64)>,
}

impl GestureTracker {
    pub fn press(&mut self, x: f64, y: f64) {
        self.last = Some((x, y));
    }

    /// `None` while no pointer is held down.
    pub fn drag_to(&mut self, x: f64, y: f64, dt: f64) -> Option<GestureSample> {
        let (last_x, last_y) = self.last?;
        self.last = Some((x, y));
        Some(GestureSample {
            delta_x: x - last_x,
            delta_y: y - last_y,
            dt,
        })
    }

    pub fn release(&mut self) {
        self.last = None;
    }
}

/// Hand angles in clockwise degrees from 12 o'clock, accumulated over one
/// arrow-setting session.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationAccumulator {
    hour_angle_deg: f64,
    minute_angle_deg: f64,
    crossed_twelve: bool,
    origin_hour_deg: f64,
    origin_minute_deg: f64,
}

impl RotationAccumulator {
    /// Seeds the session with the hands where they currently point.
    pub fn new(hour_angle_deg: f64, minute_angle_deg: f64) -> Self {
        let hour = normalize_degrees(hour_angle_deg);
        let minute = normalize_degrees(minute_angle_deg);
        Self {
            hour_angle_deg: hour,
            minute_angle_deg: minute,
            crossed_twelve: false,
            origin_hour_deg: hour,
            origin_minute_deg: minute,
        }
    }

    /// Rotates both hands clockwise by the sample's vertical travel, scaled by
    /// pointer speed clamped to `max_speed`.
    pub fn apply(&mut self, sample: &GestureSample, max_speed: f64) {
        if !(sample.delta_x.is_finite() && sample.delta_y.is_finite()) {
            return;
        }
        let magnitude = sample.delta_x.hypot(sample.delta_y);
        let speed = pointer_speed(magnitude, sample.dt, max_speed);
        let travel = sample.delta_y.abs();

        let unwrapped_hour = self.hour_angle_deg + travel * HOUR_DEG_PER_UNIT * speed;
        if unwrapped_hour >= 360.0 {
            self.crossed_twelve = true;
        }
        self.hour_angle_deg = normalize_degrees(unwrapped_hour);
        self.minute_angle_deg =
            normalize_degrees(self.minute_angle_deg + travel * MINUTE_DEG_PER_UNIT * speed);
    }

    #[cfg(test)]
    pub(crate) fn with_state(
        origin: (f64, f64),
        hour_angle_deg: f64,
        minute_angle_deg: f64,
        crossed_twelve: bool,
    ) -> Self {
        Self {
            hour_angle_deg,
            minute_angle_deg,
            crossed_twelve,
            origin_hour_deg: origin.0,
            origin_minute_deg: origin.1,
        }
    }

    pub fn hour_angle_deg(&self) -> f64 {
        self.hour_angle_deg
    }

    pub fn minute_angle_deg(&self) -> f64 {
        self.minute_angle_deg
    }

    pub fn crossed_twelve(&self) -> bool {
        self.crossed_twelve
    }

    pub fn clear_crossed_twelve(&mut self) {
        self.crossed_twelve = false;
    }

    /// True while both hands still sit exactly where the session started.
    pub fn is_unchanged(&self) -> bool {
        self.hour_angle_deg == self.origin_hour_deg
            && self.minute_angle_deg == self.origin_minute_deg
    }
}

fn pointer_speed(magnitude: f64, dt: f64, max_speed: f64) -> f64 {
    if magnitude <= 0.0 || max_speed.is_nan() || max_speed <= 0.0 {
        return 0.0;
    }
    if dt.is_nan() || dt <= 0.0 {
        return max_speed;
    }
    (magnitude / dt).clamp(0.0, max_speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(delta_y: f64, dt: f64) -> GestureSample {
        GestureSample {
            delta_x: 0.0,
            delta_y,
            dt,
        }
    }

    #[test]
    fn hands_move_twelve_to_one() {
        let mut acc = RotationAccumulator::new(0.0, 0.0);
        acc.apply(&drag(10.0, 1.0), 1.0);
        assert_eq!(acc.hour_angle_deg(), 5.0);
        assert_eq!(acc.minute_angle_deg(), 60.0);
        assert!(!acc.is_unchanged());
    }

    #[test]
    fn speed_is_clamped_to_maximum() {
        let mut fast = RotationAccumulator::new(0.0, 0.0);
        fast.apply(&drag(10.0, 0.001), 1.0);
        let mut slow = RotationAccumulator::new(0.0, 0.0);
        slow.apply(&drag(10.0, 1.0), 1.0);
        assert_eq!(fast, slow);
    }

    #[test]
    fn slow_drag_scales_rotation_down() {
        let mut acc = RotationAccumulator::new(0.0, 0.0);
        acc.apply(&drag(2.0, 4.0), 1.0);
        assert_eq!(acc.hour_angle_deg(), 0.5);
    }

    #[test]
    fn rotation_is_clockwise_regardless_of_drag_direction() {
        let mut up = RotationAccumulator::new(90.0, 0.0);
        up.apply(&drag(-10.0, 1.0), 1.0);
        let mut down = RotationAccumulator::new(90.0, 0.0);
        down.apply(&drag(10.0, 1.0), 1.0);
        assert_eq!(up, down);
        assert_eq!(up.hour_angle_deg(), 95.0);
    }

    #[test]
    fn wrapping_past_twelve_sets_crossed_flag() {
        let mut acc = RotationAccumulator::new(355.0, 300.0);
        acc.apply(&drag(8.0, 1.0), 1.0);
        assert!(!acc.crossed_twelve());
        acc.apply(&drag(8.0, 1.0), 1.0);
        assert!(acc.crossed_twelve());
        assert_eq!(acc.hour_angle_deg(), 3.0);
        acc.clear_crossed_twelve();
        assert!(!acc.crossed_twelve());
    }

    #[test]
    fn zero_and_sideways_samples_leave_hands_in_place() {
        let mut acc = RotationAccumulator::new(120.0, 30.0);
        acc.apply(&drag(0.0, 0.0), 1.0);
        acc.apply(
            &GestureSample {
                delta_x: 25.0,
                delta_y: 0.0,
                dt: 0.1,
            },
            1.0,
        );
        assert!(acc.is_unchanged());
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let mut acc = RotationAccumulator::new(120.0, 30.0);
        acc.apply(&drag(f64::NAN, 1.0), 1.0);
        acc.apply(&drag(f64::INFINITY, 1.0), 1.0);
        assert!(acc.is_unchanged());
    }

    #[test]
    fn unusable_speed_limit_leaves_hands_still() {
        let mut acc = RotationAccumulator::new(120.0, 30.0);
        acc.apply(&drag(10.0, 1.0), -1.0);
        acc.apply(&drag(10.0, 1.0), f64::NAN);
        acc.apply(&drag(10.0, 0.0), -1.0);
        assert!(acc.is_unchanged());
    }

    #[test]
    fn tracker_reports_deltas_only_while_pressed() {
        let mut tracker = GestureTracker::default();
        assert!(tracker.drag_to(5.0, 5.0, 0.016).is_none());
        tracker.press(10.0, 20.0);
        let sample = tracker.drag_to(13.0, 16.0, 0.016).expect("pressed");
        assert_eq!(sample.delta_x, 3.0);
        assert_eq!(sample.delta_y, -4.0);
        tracker.release();
        assert!(tracker.drag_to(0.0, 0.0, 0.016).is_none());
    }
}
