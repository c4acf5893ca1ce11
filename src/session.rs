// TiltGuard — Sensor Session
//
// Lifecycle of the sensor subsystem: lazy bring-up after connectivity is
// confirmed, bias calibration, and an active flag gating all reads. A failed
// bring-up is terminal — a missing or miswired sensor is not a transient
// condition, so there is no restart path out of `Fatal`.

use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::config::*;
use crate::drivers::imu::{AccelSample, Mpu6050, SharedBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Active,
    /// Bring-up failed; requires physical intervention.
    Fatal,
}

pub struct SensorSession {
    imu: Mpu6050,
    state: SessionState,
}

impl SensorSession {
    pub fn new(bus: SharedBus) -> Self {
        Self {
            imu: Mpu6050::new(bus),
            state: SessionState::Inactive,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Drop back to `Inactive` (link loss). `Fatal` never transitions out.
    pub fn deactivate(&mut self) {
        if self.state == SessionState::Active {
            log::info!("Lost connectivity. Stopping sensor readings.");
            self.state = SessionState::Inactive;
        }
    }

    /// Bring the sensor up if it isn't already: init, settle, calibrate,
    /// mark active. Only called while the link is confirmed up.
    ///
    /// The calibration pass assumes the device is stationary and level — a
    /// caller-visible precondition, not enforced here.
    pub fn ensure_active(&mut self) -> anyhow::Result<()> {
        match self.state {
            SessionState::Active => Ok(()),
            SessionState::Fatal => bail!("sensor session is in fatal state"),
            SessionState::Inactive => {
                log::info!("Initialising MPU6050…");
                if let Err(e) = self.imu.init() {
                    self.state = SessionState::Fatal;
                    return Err(e).context("sensor bring-up failed");
                }

                thread::sleep(Duration::from_millis(SENSOR_SETTLE_MS));

                if let Err(e) = self.imu.calibrate() {
                    self.state = SessionState::Fatal;
                    return Err(e).context("sensor calibration failed");
                }

                self.state = SessionState::Active;
                log::info!("MPU6050 ready.");
                Ok(())
            }
        }
    }

    /// Passthrough read of one calibrated sample. Only meaningful while
    /// active; the control loop never calls it otherwise.
    pub fn read_accel(&self) -> anyhow::Result<AccelSample> {
        self.imu.read_accel()
    }
}
