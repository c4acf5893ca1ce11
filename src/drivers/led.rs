// TiltGuard — Status LED Driver
//
// Single GPIO indicator: ~1 Hz flash while the link is being acquired,
// solid on when the accident state latches.

use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::{AnyOutputPin, Output, PinDriver};

use crate::config::*;

pub struct StatusLed<'d> {
    pin: PinDriver<'d, AnyOutputPin, Output>,
}

impl<'d> StatusLed<'d> {
    pub fn new(pin: PinDriver<'d, AnyOutputPin, Output>) -> Self {
        Self { pin }
    }

    pub fn on(&mut self) {
        let _ = self.pin.set_high();
    }

    pub fn off(&mut self) {
        let _ = self.pin.set_low();
    }

    /// One connecting-blink cycle: dark for the poll interval, then a short
    /// flash (blocks the calling thread, like the rest of the boot path).
    pub fn flash_connecting(&mut self) {
        self.off();
        thread::sleep(Duration::from_millis(CONNECT_POLL_MS));
        self.on();
        thread::sleep(Duration::from_millis(CONNECT_FLASH_MS));
    }
}
