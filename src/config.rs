// TiltGuard — Hardware & System Configuration
// Target: ESP32 DevKit (Xtensa)

// ---------------------------------------------------------------------------
// GPIO Pin Definitions
// ---------------------------------------------------------------------------
pub const PIN_LED: i32 = 2;      // On-board LED — connecting blink / alarm
pub const PIN_I2C_SDA: i32 = 21; // I2C data line
pub const PIN_I2C_SCL: i32 = 22; // I2C clock line

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_MPU6050: u8 = 0x68;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks

// ---------------------------------------------------------------------------
// MPU6050 Sensor
// ---------------------------------------------------------------------------
pub const ACCEL_SCALE_2G: f32 = 16384.0;           // LSB/g at ±2 g
pub const CALIBRATION_SAMPLES: u32 = 500;          // bias averaging window
pub const CALIBRATION_SAMPLE_DELAY_MS: u64 = 2;
pub const SENSOR_SETTLE_MS: u64 = 1000;            // post-init settle before calibration

// ---------------------------------------------------------------------------
// Anomaly Thresholds
// ---------------------------------------------------------------------------
pub const TILT_LIMIT_DEG: f32 = 45.0;   // |roll| or |pitch| beyond this latches
pub const ACCEL_LIMIT_G: f32 = 2.5;     // total acceleration beyond this latches

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const SAMPLE_INTERVAL_MS: u64 = 200;           // ~5 Hz sensing cycle
pub const CONNECT_POLL_MS: u64 = 1000;             // WiFi join status poll
pub const CONNECT_FLASH_MS: u64 = 50;              // LED flash while connecting
pub const RESTART_SETTLE_MS: u64 = 2000;           // pause before restart on link loss
pub const RESET_ACK_SETTLE_MS: u64 = 1000;         // let the /reset_wifi response flush
pub const PROVISIONING_POLL_MS: u64 = 1000;        // credential-store poll in setup mode
pub const PROVISIONING_TIMEOUT_MS: u64 = 300_000;  // 5 minutes, then restart

// ---------------------------------------------------------------------------
// Network Provisioning
// ---------------------------------------------------------------------------
pub const PROVISIONING_AP_SSID: &str = "TiltGuard-Setup";

// NVS namespace shared with the provisioning portal. The portal writes the
// captured credentials under these keys; this firmware only reads and clears.
pub const NVS_NAMESPACE: &str = "tiltguard";
pub const NVS_KEY_SSID: &str = "ssid";
pub const NVS_KEY_PASS: &str = "pass";

// ---------------------------------------------------------------------------
// Control Surface (HTTP)
// ---------------------------------------------------------------------------
pub const HTTP_UPDATE_BODY_MAX: usize = 256; // form bodies are two short fields
