// Read-only snapshot of the drive for UI and event logging.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::firing::sequence::ThyristorPair;
use crate::math_fixed::Fixed;
use crate::regulator::{ControlMode, RegulatorState};

/// Drive status bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const RUNNING: u8 = 1 << 0;
    pub const OVERLOADED: u8 = 1 << 1;
    pub const RPM_LIMITED: u8 = 1 << 2;
    pub const PAIRS_ENABLED: u8 = 1 << 3;
    pub const EXCITATION_ENABLED: u8 = 1 << 4;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Sets or clears `mask`.
    pub fn set(&mut self, mask: u8, value: bool) {
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    #[inline(always)]
    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    pub const fn running(self) -> bool {
        self.contains(Self::RUNNING)
    }

    pub const fn overloaded(self) -> bool {
        self.contains(Self::OVERLOADED)
    }

    pub const fn rpm_limited(self) -> bool {
        self.contains(Self::RPM_LIMITED)
    }

    pub const fn pairs_enabled(self) -> bool {
        self.contains(Self::PAIRS_ENABLED)
    }

    pub const fn excitation_enabled(self) -> bool {
        self.contains(Self::EXCITATION_ENABLED)
    }
}

/// Values reported by `DriveRegulation::telemetry`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Telemetry {
    pub state: RegulatorState,
    pub mode: ControlMode,
    pub flags: StatusFlags,
    /// Operator reference, percent.
    pub reference: Fixed,
    /// Ramp output, percent.
    pub ramp_reference: Fixed,
    pub rpm_reference: Fixed,
    pub current_reference: Fixed,
    pub pair_angle: Option<Fixed>,
    pub excitation_angle: Option<Fixed>,
    /// Current ceiling offered by the overload model, amperes.
    pub available_current: Fixed,
    pub heat_percent: u8,
    pub last_opened_pair: Option<ThyristorPair>,
}
