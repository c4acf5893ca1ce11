// TiltGuard — Anomaly Detector
//
// Consumes one calibrated accelerometer sample per sensing cycle, derives
// orientation and total acceleration, and latches the accident state when a
// threshold is exceeded. Single-sample thresholding with no hysteresis or
// debounce — one outlier sample latches the system. That is the shipped
// policy, not an oversight.

use std::f32::consts::PI;

use crate::config::*;
use crate::state::{MonitorState, Orientation};

/// Derive roll/pitch (degrees) and total acceleration (g) from one sample.
pub fn orientation_from_accel(ax: f32, ay: f32, az: f32) -> Orientation {
    Orientation {
        roll: (ay.atan2(az)) * 180.0 / PI,
        pitch: (-ax).atan2((ay * ay + az * az).sqrt()) * 180.0 / PI,
        accel_total: (ax * ax + ay * ay + az * az).sqrt(),
    }
}

/// Threshold policy: excessive tilt on either axis, or excessive total
/// acceleration.
pub fn exceeds_limits(orientation: &Orientation) -> bool {
    orientation.roll.abs() > TILT_LIMIT_DEG
        || orientation.pitch.abs() > TILT_LIMIT_DEG
        || orientation.accel_total > ACCEL_LIMIT_G
}

/// Run one detection cycle. Returns `true` if the accident state latched on
/// this sample.
///
/// A no-op unless detection is enabled (not latched, monitoring on) — the
/// gated cycle leaves both the orientation and the control flags untouched.
pub fn evaluate(state: &mut MonitorState, ax: f32, ay: f32, az: f32) -> bool {
    if !state.detection_enabled() {
        return false;
    }

    let orientation = orientation_from_accel(ax, ay, az);
    log::debug!(
        "Roll: {:.2} | Pitch: {:.2} | AccelTotal: {:.2}",
        orientation.roll,
        orientation.pitch,
        orientation.accel_total
    );

    if exceeds_limits(&orientation) {
        state.latch_accident(orientation);
        log::warn!(
            "Abnormality detected! roll={:.2} pitch={:.2} accelTotal={:.2}",
            orientation.roll,
            orientation.pitch,
            orientation.accel_total
        );
        return true;
    }

    state.orientation = orientation;
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed() -> MonitorState {
        let mut state = MonitorState::new();
        state.is_monitoring = 1;
        state
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn level_stationary_is_quiet() {
        // Scenario: device flat on the bench, 1 g straight down the Z axis.
        let mut state = armed();
        let latched = evaluate(&mut state, 0.0, 0.0, 1.0);

        assert!(!latched);
        assert_close(state.orientation.roll, 0.0);
        assert_close(state.orientation.pitch, 0.0);
        assert_close(state.orientation.accel_total, 1.0);
        assert_eq!(state.accident_flag, 0);
        assert_eq!(state.is_monitoring, 1);
    }

    #[test]
    fn ninety_degree_roll_latches() {
        // Device on its side: gravity along Y.
        let mut state = armed();
        let latched = evaluate(&mut state, 0.0, 1.0, 0.0);

        assert!(latched);
        assert_close(state.orientation.roll, 90.0);
        assert_close(state.orientation.pitch, 0.0);
        assert_close(state.orientation.accel_total, 1.0);
        assert_eq!(state.accident_flag, 1);
        assert_eq!(state.is_monitoring, 0);
    }

    #[test]
    fn impact_magnitude_latches_even_when_level() {
        let mut state = armed();
        let latched = evaluate(&mut state, 0.0, 0.0, 3.0);

        assert!(latched);
        assert_close(state.orientation.roll, 0.0);
        assert_close(state.orientation.pitch, 0.0);
        assert_close(state.orientation.accel_total, 3.0);
        assert_eq!(state.accident_flag, 1);
    }

    #[test]
    fn steep_pitch_latches() {
        // Nose down past 45°: gravity mostly along -X.
        let mut state = armed();
        assert!(evaluate(&mut state, -0.9, 0.0, 0.4));
        assert!(state.orientation.pitch > TILT_LIMIT_DEG);
    }

    #[test]
    fn angles_stay_within_half_turn() {
        let samples = [
            (0.3, -0.7, 0.6),
            (-1.0, -1.0, -1.0),
            (0.0, 0.0, -1.0),
            (2.0, -3.0, 0.5),
            (0.0, -0.2, 0.0),
        ];
        for (ax, ay, az) in samples {
            let o = orientation_from_accel(ax, ay, az);
            assert!((-180.0..=180.0).contains(&o.roll), "roll {}", o.roll);
            assert!((-180.0..=180.0).contains(&o.pitch), "pitch {}", o.pitch);
            assert!(o.accel_total >= 0.0);
            let norm = (ax * ax + ay * ay + az * az).sqrt();
            assert_close(o.accel_total, norm);
        }
    }

    #[test]
    fn latched_state_never_clears_from_sensing() {
        let mut state = armed();
        assert!(evaluate(&mut state, 0.0, 1.0, 0.0));
        let frozen = state.orientation;

        // Perfectly calm samples afterwards must not unlatch or overwrite.
        for _ in 0..10 {
            assert!(!evaluate(&mut state, 0.0, 0.0, 1.0));
            assert_eq!(state.accident_flag, 1);
            assert_eq!(state.is_monitoring, 0);
            assert_eq!(state.orientation, frozen);
        }
    }

    #[test]
    fn monitoring_off_is_a_no_op() {
        let mut state = MonitorState::new(); // is_monitoring = 0
        let before = state.orientation;

        assert!(!evaluate(&mut state, 0.0, 1.0, 0.0));
        assert_eq!(state.orientation, before);
        assert_eq!(state.accident_flag, 0);
    }

    #[test]
    fn boundary_tilt_does_not_latch() {
        // Exactly 45° is allowed; the policy is strictly-greater.
        let mut state = armed();
        assert!(!evaluate(&mut state, 0.0, 1.0, 1.0)); // roll = 45.0
        assert_eq!(state.accident_flag, 0);
        assert_close(state.orientation.roll, 45.0);
    }
}
