// Thermal overload model (I2t style heat accumulator).

// Key Features:
// - Accumulates heat while the armature current exceeds the allowed current (base current
//   plus dead zone) and cools otherwise.
// - Trips exactly when the heat reaches its maximum, clears only once it is back at 0.
// - While tripped the available current is derated from the maximum to the base current.

// Detailed Operation:
// The motor may carry the maximum current for `heat_time` within every `period`, the rest of
// the period (`cool_time = period - heat_time`) being needed to cool down. With
// `heat_max = heat_time * cool_time` the heating step is `cool_time` per ms and the cooling
// step is `heat_time` per ms, so both durations are hit exactly in integer arithmetic.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::error::{DriveError, Result};
use crate::math_fixed::{fixed_int, Fixed};

/// Overload parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverloadSettings {
    pub enabled: bool,
    /// Current the motor carries continuously, amperes.
    pub base_current: Fixed,
    /// Current allowed for `heat_time_ms`, amperes.
    pub max_current: Fixed,
    /// Margin above the base current that does not heat the model, amperes.
    pub dead_zone: Fixed,
    /// Time at maximum current that trips the model.
    pub heat_time_ms: u32,
    /// Full heat/cool period; must be longer than `heat_time_ms`.
    pub period_ms: u32,
}

impl Default for OverloadSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_current: fixed_int(10),
            max_current: fixed_int(15),
            dead_zone: Fixed::from_bits(1 << 15), // 0.5 A
            heat_time_ms: 60_000,
            period_ms: 600_000,
        }
    }
}

/// Direction the heat moved on the last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeatMode {
    /// Current above the allowed current, heat accumulates.
    Normal,
    /// Current at or below the allowed current, heat decreases.
    Cooling,
}

pub struct OverloadModel {
    enabled: bool,
    base_current: Fixed,
    max_current: Fixed,
    allowed_current: Fixed,
    heat_max: u64,
    heat_step_normal: u64,
    heat_step_cooling: u64,
    heat: u64,
    overloaded: bool,
    mode: HeatMode,
}

impl OverloadModel {
    pub fn new(settings: &OverloadSettings) -> Result<Self> {
        let mut model = Self {
            enabled: false,
            base_current: Fixed::ZERO,
            max_current: Fixed::ZERO,
            allowed_current: Fixed::ZERO,
            heat_max: 0,
            heat_step_normal: 0,
            heat_step_cooling: 0,
            heat: 0,
            overloaded: false,
            mode: HeatMode::Cooling,
        };
        model.configure(settings)?;
        Ok(model)
    }

    /// Applies new parameters and restarts from a cold motor.
    ///
    /// Refused with `InvalidValue` (nothing changed) when the period is not longer than the
    /// heat time, the heat time is 0 or the maximum current is below the base current.
    pub fn configure(&mut self, settings: &OverloadSettings) -> Result<()> {
        if settings.heat_time_ms == 0
            || settings.period_ms <= settings.heat_time_ms
            || settings.max_current < settings.base_current
            || settings.dead_zone < Fixed::ZERO
        {
            return Err(DriveError::InvalidValue);
        }
        let heat_time = settings.heat_time_ms as u64;
        let cool_time = (settings.period_ms - settings.heat_time_ms) as u64;

        self.enabled = settings.enabled;
        self.base_current = settings.base_current;
        self.max_current = settings.max_current;
        self.allowed_current = settings.base_current.saturating_add(settings.dead_zone);
        self.heat_max = heat_time * cool_time;
        self.heat_step_normal = cool_time;
        self.heat_step_cooling = heat_time;
        self.heat = 0;
        self.overloaded = false;
        self.mode = HeatMode::Cooling;
        Ok(())
    }

    /// Updates the heat with the current measured over the last `elapsed_ms`.
    ///
    /// # Returns
    /// The overloaded flag after the update
    pub fn tick(&mut self, current: Fixed, elapsed_ms: u32) -> bool {
        if !self.enabled {
            return false;
        }
        let elapsed = elapsed_ms as u64;
        if current > self.allowed_current {
            self.mode = HeatMode::Normal;
            self.heat = self
                .heat
                .saturating_add(self.heat_step_normal * elapsed)
                .min(self.heat_max);
            if self.heat == self.heat_max && !self.overloaded {
                self.overloaded = true;
                warn!("overload tripped, current derated");
            }
        } else {
            self.mode = HeatMode::Cooling;
            self.heat = self.heat.saturating_sub(self.heat_step_cooling * elapsed);
            if self.heat == 0 && self.overloaded {
                self.overloaded = false;
                info!("overload cleared");
            }
        }
        self.overloaded
    }

    /// Current ceiling offered to the regulator.
    pub fn available_current(&self) -> Fixed {
        if self.enabled && self.overloaded {
            self.base_current
        } else {
            self.max_current
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.heat = 0;
            self.overloaded = false;
            self.mode = HeatMode::Cooling;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_overloaded(&self) -> bool {
        self.overloaded
    }

    pub fn mode(&self) -> HeatMode {
        self.mode
    }

    pub fn heat(&self) -> u64 {
        self.heat
    }

    pub fn heat_max(&self) -> u64 {
        self.heat_max
    }

    pub fn allowed_current(&self) -> Fixed {
        self.allowed_current
    }

    /// Heat in percent of the trip level, 0..100.
    pub fn heat_percent(&self) -> u8 {
        if self.heat_max == 0 {
            return 0;
        }
        (self.heat * 100 / self.heat_max) as u8
    }
}
