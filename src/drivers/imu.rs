// TiltGuard — MPU6050 IMU Driver
//
// Custom register-level driver over shared I2C bus.
// Avoids external crate version conflicts with esp-idf-hal.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use anyhow::bail;
use esp_idf_hal::i2c::I2cDriver;

use crate::config::*;

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

/// One calibrated 3-axis acceleration sample, in g.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccelSample {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
}

// MPU6050 register addresses
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_CONFIG: u8 = 0x1A;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_ACCEL_XOUT_H: u8 = 0x3B; // Start of 6-byte accel burst
const REG_WHO_AM_I: u8 = 0x75;
const WHO_AM_I_EXPECTED: u8 = 0x68;

pub struct Mpu6050 {
    bus: SharedBus,
    // Bias offsets from the calibration pass, subtracted from every read.
    offset: AccelSample,
}

impl Mpu6050 {
    pub fn new(bus: SharedBus) -> Self {
        Self {
            bus,
            offset: AccelSample::default(),
        }
    }

    /// Verify the device is reachable on the I2C bus.
    pub fn is_connected(&self) -> bool {
        let mut bus = self.bus.lock().unwrap();
        let mut buf = [0u8; 1];
        match bus.write_read(I2C_ADDR_MPU6050, &[REG_WHO_AM_I], &mut buf, I2C_TIMEOUT_TICKS) {
            Ok(()) => buf[0] == WHO_AM_I_EXPECTED,
            Err(_) => false,
        }
    }

    /// Wake the sensor and configure the accelerometer (±2 g, DLPF 21 Hz).
    /// Any failure here means a wiring/hardware problem, not a transient.
    pub fn init(&self) -> anyhow::Result<()> {
        if !self.is_connected() {
            bail!("MPU6050 not responding at 0x{:02X}", I2C_ADDR_MPU6050);
        }

        let mut bus = self.bus.lock().unwrap();

        // Wake up (clear SLEEP bit)
        bus.write(I2C_ADDR_MPU6050, &[REG_PWR_MGMT_1, 0x00], I2C_TIMEOUT_TICKS)?;

        // DLPF bandwidth 21 Hz
        bus.write(I2C_ADDR_MPU6050, &[REG_CONFIG, 0x04], I2C_TIMEOUT_TICKS)?;

        // Accelerometer: ±2 g
        bus.write(I2C_ADDR_MPU6050, &[REG_ACCEL_CONFIG, 0x00], I2C_TIMEOUT_TICKS)?;

        log::info!("MPU6050 initialised (±2g, DLPF 21Hz)");
        Ok(())
    }

    /// Bias calibration pass: average a window of samples and store the mean
    /// as the per-axis offset, with Z expected to read +1 g.
    ///
    /// Precondition: the device is stationary and level for the whole pass.
    pub fn calibrate(&mut self) -> anyhow::Result<()> {
        let mut sum = [0.0f32; 3];
        for _ in 0..CALIBRATION_SAMPLES {
            let s = self.read_raw_accel()?;
            sum[0] += s.ax;
            sum[1] += s.ay;
            sum[2] += s.az;
            thread::sleep(Duration::from_millis(CALIBRATION_SAMPLE_DELAY_MS));
        }

        let n = CALIBRATION_SAMPLES as f32;
        self.offset = AccelSample {
            ax: sum[0] / n,
            ay: sum[1] / n,
            az: sum[2] / n - 1.0, // gravity stays in the signal
        };
        log::info!(
            "Accel offsets: x={:.3} y={:.3} z={:.3}",
            self.offset.ax,
            self.offset.ay,
            self.offset.az
        );
        Ok(())
    }

    /// Burst-read the three accelerometer axes and apply calibration offsets.
    pub fn read_accel(&self) -> anyhow::Result<AccelSample> {
        let raw = self.read_raw_accel()?;
        Ok(AccelSample {
            ax: raw.ax - self.offset.ax,
            ay: raw.ay - self.offset.ay,
            az: raw.az - self.offset.az,
        })
    }

    fn read_raw_accel(&self) -> anyhow::Result<AccelSample> {
        let mut bus = self.bus.lock().unwrap();
        let mut raw = [0u8; 6];
        bus.write_read(
            I2C_ADDR_MPU6050,
            &[REG_ACCEL_XOUT_H],
            &mut raw,
            I2C_TIMEOUT_TICKS,
        )?;

        Ok(AccelSample {
            ax: i16::from_be_bytes([raw[0], raw[1]]) as f32 / ACCEL_SCALE_2G,
            ay: i16::from_be_bytes([raw[2], raw[3]]) as f32 / ACCEL_SCALE_2G,
            az: i16::from_be_bytes([raw[4], raw[5]]) as f32 / ACCEL_SCALE_2G,
        })
    }
}
