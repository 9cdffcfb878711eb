// GPIO gate line implementing the scheduler's gate seam.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use hal::gpio::Pin;
use scrdrive_algo::firing::{GateBank, GatePin};

use super::pinout::{self, PinDef};

/// Push-pull output driving one gate pulse transformer.
pub struct GateLine {
    pin: Pin,
}

impl GateLine {
    pub fn new(def: &PinDef) -> Self {
        Self { pin: def.init() }
    }
}

impl GatePin for GateLine {
    #[inline(always)]
    fn set_high(&mut self) {
        self.pin.set_high();
    }

    #[inline(always)]
    fn set_low(&mut self) {
        self.pin.set_low();
    }
}

/// Configures every gate output low and enables the gate supply.
pub fn init_gate_bank() -> GateBank<GateLine> {
    let bridge = pinout::gates::BRIDGE.map(|def| GateLine::new(&def));
    let bank = GateBank::new(bridge, GateLine::new(&pinout::gates::EXCITATION));

    let mut enable = pinout::gates::ENABLE.init();
    enable.set_high();
    bank
}
