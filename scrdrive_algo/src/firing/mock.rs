// Host doubles of the timer and gate seams.

use super::gates::GatePin;
use super::timer::{Compare, FiringTimer};

#[derive(Debug, Default)]
pub struct MockTimer {
    pub running: bool,
    pub listening: bool,
    pub open: u32,
    pub close: u32,
    pub starts: u32,
    pub stops: u32,
}

impl FiringTimer for MockTimer {
    fn stop(&mut self) {
        self.running = false;
        self.listening = false;
        self.stops += 1;
    }

    fn reset(&mut self) {}

    fn set_compare(&mut self, compare: Compare, ticks: u32) {
        match compare {
            Compare::Open => self.open = ticks,
            Compare::Close => self.close = ticks,
        }
    }

    fn listen(&mut self) {
        self.listening = true;
    }

    fn start(&mut self) {
        self.running = true;
        self.starts += 1;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[derive(Debug, Default)]
pub struct MockPin {
    pub high: bool,
    pub rises: u32,
}

impl GatePin for MockPin {
    fn set_high(&mut self) {
        if !self.high {
            self.rises += 1;
        }
        self.high = true;
    }

    fn set_low(&mut self) {
        self.high = false;
    }
}

pub fn gate_pins() -> ([MockPin; 6], MockPin) {
    (Default::default(), MockPin::default())
}
