// TiltGuard — Shared Monitor State
//
// The single in-memory state block shared between the sensing loop and the
// HTTP control-surface handlers. The server runs handlers on its own
// threads, so the block lives behind one mutex guarding all reads/writes.

use std::sync::{Arc, Mutex};

/// Orientation derived from the latest calibrated accelerometer sample.
/// Stale (all zeros) until the first read after the sensor session activates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    /// Roll angle in degrees, [-180, 180].
    pub roll: f32,
    /// Pitch angle in degrees, [-180, 180].
    pub pitch: f32,
    /// Euclidean magnitude of the acceleration vector, in g.
    pub accel_total: f32,
}

/// Monitor state: latest orientation plus the two externally writable
/// control flags. Both flags are plain integers on the wire; out-of-range
/// values are accepted verbatim (control-surface contract).
#[derive(Debug, Clone, Copy)]
pub struct MonitorState {
    pub orientation: Orientation,
    /// 1 = accident latched, detection frozen until an external write clears it.
    pub accident_flag: i32,
    /// 1 = detection enabled. Cleared by the detector on latch.
    pub is_monitoring: i32,
}

pub type SharedState = Arc<Mutex<MonitorState>>;

impl MonitorState {
    /// Boot state: no orientation yet, not latched, monitoring disabled
    /// until the companion app turns it on.
    pub fn new() -> Self {
        Self {
            orientation: Orientation::default(),
            accident_flag: 0,
            is_monitoring: 0,
        }
    }

    pub fn new_shared() -> SharedState {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Detection runs only while not latched and monitoring is on.
    pub fn detection_enabled(&self) -> bool {
        self.accident_flag == 0 && self.is_monitoring == 1
    }

    /// Latch the accident state: store the triggering orientation, raise the
    /// flag and stop monitoring. One-way edge — only an external control
    /// write can clear the flag, and clearing it does not resume monitoring.
    pub fn latch_accident(&mut self, orientation: Orientation) {
        self.orientation = orientation;
        self.accident_flag = 1;
        self.is_monitoring = 0;
    }

    /// Apply an external control write. Present fields are stored verbatim;
    /// absent fields are left untouched. Last write wins.
    pub fn apply_update(&mut self, flag: Option<i32>, is_monitoring: Option<i32>) {
        if let Some(flag) = flag {
            self.accident_flag = flag;
            log::info!("accidentFlag updated: {}", flag);
        }
        if let Some(monitoring) = is_monitoring {
            self.is_monitoring = monitoring;
            log::info!("isMonitoring updated: {}", monitoring);
        }
    }

    /// Render the GET /data payload. Floats at two decimal places, flags as
    /// bare integers.
    pub fn data_json(&self) -> String {
        format!(
            "{{\"roll\":{:.2},\"pitch\":{:.2},\"accelTotal\":{:.2},\"flag\":{},\"isMonitoring\":{}}}",
            self.orientation.roll,
            self.orientation.pitch,
            self.orientation.accel_total,
            self.accident_flag,
            self.is_monitoring,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boots_idle_and_unlatched() {
        let state = MonitorState::new();
        assert_eq!(state.accident_flag, 0);
        assert_eq!(state.is_monitoring, 0);
        assert!(!state.detection_enabled());
    }

    #[test]
    fn update_round_trip_leaves_omitted_field_alone() {
        let mut state = MonitorState::new();
        state.is_monitoring = 1;

        state.apply_update(Some(1), None);
        assert_eq!(state.accident_flag, 1);
        assert_eq!(state.is_monitoring, 1);

        state.apply_update(None, Some(0));
        assert_eq!(state.accident_flag, 1);
        assert_eq!(state.is_monitoring, 0);
    }

    #[test]
    fn enabling_monitoring_while_latched_keeps_detection_gated() {
        let mut state = MonitorState::new();
        state.latch_accident(Orientation::default());

        // App re-arms monitoring without clearing the accident flag first.
        state.apply_update(None, Some(1));
        assert_eq!(state.is_monitoring, 1);
        assert!(!state.detection_enabled());

        // Clearing the flag separately re-enables detection.
        state.apply_update(Some(0), None);
        assert!(state.detection_enabled());
    }

    #[test]
    fn clearing_flag_does_not_resume_monitoring() {
        let mut state = MonitorState::new();
        state.is_monitoring = 1;
        state.latch_accident(Orientation::default());

        state.apply_update(Some(0), None);
        assert_eq!(state.is_monitoring, 0);
        assert!(!state.detection_enabled());
    }

    #[test]
    fn out_of_range_values_are_stored_verbatim() {
        let mut state = MonitorState::new();
        state.apply_update(Some(7), Some(-3));
        assert_eq!(state.accident_flag, 7);
        assert_eq!(state.is_monitoring, -3);
    }

    #[test]
    fn data_json_renders_two_decimal_places() {
        let mut state = MonitorState::new();
        state.orientation = Orientation {
            roll: 12.3456,
            pitch: -0.004,
            accel_total: 1.0,
        };
        state.is_monitoring = 1;
        assert_eq!(
            state.data_json(),
            "{\"roll\":12.35,\"pitch\":-0.00,\"accelTotal\":1.00,\"flag\":0,\"isMonitoring\":1}"
        );
    }
}
