pub mod imu;
pub mod led;
