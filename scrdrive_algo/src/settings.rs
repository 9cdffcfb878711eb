// Start-up settings of the whole drive.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::error::{accept_clamped, Result};
use crate::firing::config::{ChannelConfig, FiringConfig, PulseTrain, TimerTiming};
use crate::firing::scheduler::ExcitationMode;
use crate::firing::sequence::Phase;
use crate::math_fixed::{fixed_int, Fixed};
use crate::regulator::overload::OverloadSettings;
use crate::regulator::ramp::RampSettings;
use crate::regulator::RegulatorSettings;

/// Firing timer clock and mains frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingSettings {
    pub tick_hz: u32,
    pub mains_hz: u32,
}

/// Firing settings of one subsystem in user units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSettings {
    pub enabled: bool,
    pub min_angle: Fixed,
    pub max_angle: Fixed,
    pub open_time_us: u32,
    pub delay_time_us: u32,
    pub pulse_train: PulseTrain,
}

impl ChannelSettings {
    /// Applies the settings through the validating setters; clamped values are kept.
    pub fn apply(&self, config: &mut ChannelConfig) -> Result<()> {
        config.enabled = self.enabled;
        accept_clamped(config.set_angle_limits(self.min_angle, self.max_angle))?;
        accept_clamped(config.set_open_time_us(self.open_time_us))?;
        accept_clamped(config.set_delay_time_us(self.delay_time_us))?;
        accept_clamped(config.set_pulse_train(self.pulse_train))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiringSettings {
    pub pairs: ChannelSettings,
    pub excitation: ChannelSettings,
    pub excitation_mode: ExcitationMode,
    /// Mains phase feeding the excitation thyristor.
    pub excitation_phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveSettings {
    pub timing: TimingSettings,
    pub firing: FiringSettings,
    pub ramp: RampSettings,
    pub regulator: RegulatorSettings,
    pub overload: OverloadSettings,
}

impl DriveSettings {
    /// Builds the firing configuration; `InvalidValue` when the timing or a channel is refused.
    pub fn firing_config(&self) -> Result<FiringConfig> {
        let timing = TimerTiming::new(self.timing.tick_hz, self.timing.mains_hz)?;
        let mut config = FiringConfig::new(timing);
        self.firing.pairs.apply(&mut config.pairs)?;
        self.firing.excitation.apply(&mut config.excitation)?;
        Ok(config)
    }
}

impl Default for DriveSettings {
    /// 50 Hz mains, 1 MHz firing timers, 100 ms regulation tick.
    fn default() -> Self {
        Self {
            timing: TimingSettings {
                tick_hz: 1_000_000,
                mains_hz: 50,
            },
            firing: FiringSettings {
                pairs: ChannelSettings {
                    enabled: true,
                    min_angle: fixed_int(5),
                    max_angle: fixed_int(115),
                    open_time_us: 200,
                    delay_time_us: 0,
                    pulse_train: PulseTrain::default(),
                },
                excitation: ChannelSettings {
                    enabled: true,
                    min_angle: fixed_int(5),
                    max_angle: fixed_int(175),
                    open_time_us: 200,
                    delay_time_us: 0,
                    pulse_train: PulseTrain::default(),
                },
                excitation_mode: ExcitationMode::Internal,
                excitation_phase: Phase::A,
            },
            ramp: RampSettings::default(),
            regulator: RegulatorSettings::default(),
            overload: OverloadSettings::default(),
        }
    }
}
