// Reference ramp of the regulator.
//
// Moves the ramp output toward the target by a bounded step every regulation tick. Four rate
// profiles exist (reference change, start, stop, fast stop); a ramp time is the time needed to
// travel from the output at retarget to the new target, so the step is computed from that span.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::error::{clamped, DriveError, Result};
use crate::math_fixed::normalization::value_to_percent;
use crate::math_fixed::{clamp_report, mul_div, Fixed, PERCENT_100};

/// Longest accepted ramp time, 10 minutes.
pub const MAX_RAMP_TIME_MS: i32 = 600_000;

/// Rate profile used for a retarget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RampKind {
    Reference,
    Start,
    Stop,
    FastStop,
}

impl RampKind {
    const fn index(self) -> usize {
        match self {
            RampKind::Reference => 0,
            RampKind::Start => 1,
            RampKind::Stop => 2,
            RampKind::FastStop => 3,
        }
    }
}

/// Ramp times of the four profiles, milliseconds from the output at retarget to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RampSettings {
    pub reference_ms: i32,
    pub start_ms: i32,
    pub stop_ms: i32,
    pub fast_stop_ms: i32,
}

impl Default for RampSettings {
    fn default() -> Self {
        Self {
            reference_ms: 5_000,
            start_ms: 10_000,
            stop_ms: 10_000,
            fast_stop_ms: 2_000,
        }
    }
}

pub struct Ramp {
    current: Fixed,
    target: Fixed,
    step: Fixed,
    kind: RampKind,
    tick_ms: i32,
    times_ms: [i32; 4],
}

impl Ramp {
    /// Creates a ramp at 0 % with every profile set to `default_time_ms`.
    pub fn new(tick_ms: u32, default_time_ms: i32) -> Result<Self> {
        if tick_ms == 0 || tick_ms > MAX_RAMP_TIME_MS as u32 {
            return Err(DriveError::InvalidValue);
        }
        validate_time(default_time_ms)?;
        Ok(Self {
            current: Fixed::ZERO,
            target: Fixed::ZERO,
            step: Fixed::ZERO,
            kind: RampKind::Reference,
            tick_ms: tick_ms as i32,
            times_ms: [default_time_ms; 4],
        })
    }

    /// Creates a ramp at 0 % with the given profiles.
    pub fn with_settings(tick_ms: u32, settings: &RampSettings) -> Result<Self> {
        let mut ramp = Self::new(tick_ms, settings.reference_ms)?;
        ramp.set_rate(RampKind::Start, settings.start_ms)?;
        ramp.set_rate(RampKind::Stop, settings.stop_ms)?;
        ramp.set_rate(RampKind::FastStop, settings.fast_stop_ms)?;
        Ok(ramp)
    }

    /// Sets the ramp time of one profile. A change of the active profile applies at once.
    pub fn set_rate(&mut self, kind: RampKind, time_ms: i32) -> Result<()> {
        validate_time(time_ms)?;
        self.times_ms[kind.index()] = time_ms;
        if kind == self.kind {
            self.update_step();
        }
        Ok(())
    }

    pub fn rate(&self, kind: RampKind) -> i32 {
        self.times_ms[kind.index()]
    }

    /// Sets a new target with the active profile; clamps to 0..100 %.
    pub fn set_target(&mut self, percent: Fixed) -> Result<()> {
        let (target, was_clamped) = clamp_report(percent, Fixed::ZERO, PERCENT_100);
        self.target = target;
        self.update_step();
        clamped(was_clamped)
    }

    /// Switches to the `kind` profile and sets a new target.
    pub fn retarget(&mut self, percent: Fixed, kind: RampKind) -> Result<()> {
        self.kind = kind;
        self.set_target(percent)
    }

    /// Moves one step toward the target. Returns true once the target is reached.
    pub fn advance(&mut self) -> bool {
        let distance = self.target - self.current;
        if distance.abs() <= self.step {
            self.current = self.target;
        } else if distance > Fixed::ZERO {
            self.current += self.step;
        } else {
            self.current -= self.step;
        }
        self.current == self.target
    }

    /// Forces the output to `measured / max` in percent, used when the loop is re-entered.
    pub fn adjust_to(&mut self, measured: Fixed, max: Fixed) {
        let percent = value_to_percent(measured, max);
        self.current = percent.clamp(Fixed::ZERO, PERCENT_100);
        self.update_step();
    }

    /// Drops output and target to 0.
    pub fn reset(&mut self) {
        self.current = Fixed::ZERO;
        self.target = Fixed::ZERO;
        self.step = Fixed::ZERO;
    }

    #[inline(always)]
    pub fn current(&self) -> Fixed {
        self.current
    }

    #[inline(always)]
    pub fn target(&self) -> Fixed {
        self.target
    }

    #[inline(always)]
    pub fn step(&self) -> Fixed {
        self.step
    }

    pub fn kind(&self) -> RampKind {
        self.kind
    }

    pub fn is_done(&self) -> bool {
        self.current == self.target
    }

    fn update_step(&mut self) {
        let span = (self.target - self.current).abs();
        let time = self.times_ms[self.kind.index()];
        self.step = mul_div(span, self.tick_ms, time).max(Fixed::DELTA);
    }
}

fn validate_time(time_ms: i32) -> Result<()> {
    if time_ms <= 0 || time_ms > MAX_RAMP_TIME_MS {
        return Err(DriveError::InvalidValue);
    }
    Ok(())
}
