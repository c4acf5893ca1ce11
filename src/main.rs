// TiltGuard — Firmware Entry Point
//
// Boot sequence:
//   1. Bring up logging and peripherals (LED, shared I2C bus, NVS, WiFi).
//   2. Acquire connectivity: join the saved network, or fall back to the
//      setup access point and wait for the provisioning portal.
//   3. Start the HTTP control surface (/data, /update, /reset_wifi).
//   4. Enter the control loop: connectivity check, sensor-session readiness,
//      gated anomaly detection, sleep.
//
// Recovery policy:
//   - Link loss → deactivate the sensor session, settle, full restart.
//   - Sensor bring-up failure → permanent halt (hardware fault, not transient).
//   - Accident trigger → latch flags + solid LED; cleared only over the
//     control surface.

mod config;
mod detector;
mod drivers;
mod net;
mod server;
mod session;
mod state;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::{OutputPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::prelude::*;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;

use crate::config::*;
use crate::drivers::led::StatusLed;
use crate::net::{ConnectivityManager, CredentialStore};
use crate::session::SensorSession;
use crate::state::MonitorState;

// ---------------------------------------------------------------------------
// Utility: full device restart (re-enters the boot path from scratch)
// ---------------------------------------------------------------------------
pub fn restart_device() -> ! {
    log::warn!("Restarting device…");
    unsafe { esp_idf_sys::esp_restart() }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------
fn main() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("TiltGuard firmware starting…");

    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;

    // Status LED (connecting blink / accident alarm).
    let led_pin = PinDriver::output(peripherals.pins.gpio2.downgrade_output())?;
    let mut led = StatusLed::new(led_pin);
    led.off();

    // ---- I2C bus (MPU6050) -------------------------------------------------
    let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21, // SDA
        peripherals.pins.gpio22, // SCL
        &i2c_config,
    )?;
    // SAFETY: The I2C peripheral is a singleton obtained from `Peripherals::take()`.
    // It will live for the entire programme duration (embedded firmware never exits).
    let i2c_bus: &'static Mutex<I2cDriver<'static>> =
        Box::leak(Box::new(Mutex::new(unsafe { core::mem::transmute(i2c) })));

    // ---- Connectivity ------------------------------------------------------
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let creds = Arc::new(Mutex::new(CredentialStore::new(nvs.clone())?));
    let wifi = EspWifi::new(peripherals.modem, sysloop, Some(nvs))?;
    let mut connectivity = ConnectivityManager::new(wifi);

    // Blocks until the link is up; restarts on provisioning timeout.
    connectivity.ensure_connectivity(&creds, &mut led)?;

    // ---- Control surface ---------------------------------------------------
    let monitor = MonitorState::new_shared();
    let _server = server::start(Arc::clone(&monitor), Arc::clone(&creds))?;

    // ---- Control loop ------------------------------------------------------
    // Control-surface requests are serviced on the server's handler threads;
    // the monitor-state mutex orders them against this loop, last write wins.
    let mut session = SensorSession::new(i2c_bus);
    log::info!("Boot complete — entering control loop");

    loop {
        // 1. Connectivity check. Loss recovery is a full restart — blunt,
        //    but it reinitialises all state and cannot corrupt anything.
        if !connectivity.is_connected() {
            session.deactivate();
            log::warn!("Link down — restarting in {} ms", RESTART_SETTLE_MS);
            thread::sleep(Duration::from_millis(RESTART_SETTLE_MS));
            restart_device();
        }

        // 2. Sensor-session readiness (deferred bring-up + calibration).
        if !session.is_active() {
            if let Err(e) = session.ensure_active() {
                log::error!("Fatal sensor fault: {:#}", e);
                halt_forever();
            }
            // A fresh session also clears a stale alarm indication.
            led.off();
        }

        // 3. Gated detection. The detector re-checks the flags under the
        //    lock, so a control write racing this check is still safe.
        if monitor.lock().unwrap().detection_enabled() {
            match session.read_accel() {
                Ok(sample) => {
                    let mut guard = monitor.lock().unwrap();
                    let latched =
                        detector::evaluate(&mut guard, sample.ax, sample.ay, sample.az);
                    drop(guard);
                    if latched {
                        led.on();
                    }
                }
                Err(e) => log::warn!("IMU read error: {}", e),
            }
        }

        thread::sleep(Duration::from_millis(SAMPLE_INTERVAL_MS));
    }
}

/// Terminal halt for unrecoverable sensor faults. The loop never progresses
/// past this point; recovery requires operator intervention.
fn halt_forever() -> ! {
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}
