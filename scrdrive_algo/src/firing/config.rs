// Firing configuration of the bridge pairs and of the excitation thyristor.
//
// Every value is kept in its user unit (degrees, microseconds, duty ratio) next to the
// tick-converted form the scheduler works with. Setters clamp and report `OutOfRange`;
// inconsistent values are refused with `InvalidValue`.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::angle2ticks::{
    angle_to_ticks, clamp_duty, compare_window, pulse_gap_ticks, ticks_to_angle, us_to_ticks,
    PulseTrainTicks, Window, EXCITATION_SECTOR_DEG, PAIR_SECTOR_DEG,
};
use super::timer::COUNTER_MAX;
use crate::error::{clamped, DriveError, Result};
use crate::math_fixed::{clamp_report, fixed_int, Fixed};

/// Timer tick rate and mains frequency shared by all firing subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerTiming {
    /// Firing timer counting frequency.
    pub tick_hz: u32,
    /// Nominal mains frequency.
    pub mains_hz: u32,
}

impl TimerTiming {
    /// Refuses rates giving too few ticks per sector, or a mains cycle plus the second
    /// excitation half-cycle that no longer fits the 16 bit compare registers.
    pub fn new(tick_hz: u32, mains_hz: u32) -> Result<Self> {
        // at least a few ticks per sector are needed for any angle resolution
        if mains_hz == 0 || tick_hz / mains_hz < 60 {
            return Err(DriveError::InvalidValue);
        }
        let timing = Self { tick_hz, mains_hz };
        if timing.ticks_per_cycle() + timing.half_cycle_ticks() > COUNTER_MAX {
            return Err(DriveError::InvalidValue);
        }
        Ok(timing)
    }

    #[inline(always)]
    pub const fn ticks_per_cycle(&self) -> u32 {
        self.tick_hz / self.mains_hz
    }

    /// 120 degree sector of the bridge pairs.
    #[inline(always)]
    pub const fn pair_sector_ticks(&self) -> u32 {
        self.ticks_per_cycle() / 3
    }

    /// 180 degree half-cycle of the excitation thyristor.
    #[inline(always)]
    pub const fn half_cycle_ticks(&self) -> u32 {
        self.ticks_per_cycle() / 2
    }
}

/// Pulse-train (burst firing) settings in user units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseTrain {
    pub enabled: bool,
    /// Total gate-on time of one window.
    pub width_us: u32,
    /// Sub-pulse duty ratio, (0, 0.5].
    pub duty: Fixed,
    /// Guard band before the end of the window, degrees.
    pub angle_min: Fixed,
}

impl Default for PulseTrain {
    fn default() -> Self {
        Self {
            enabled: false,
            width_us: 1000,
            duty: Fixed::from_bits(1 << 15),
            angle_min: fixed_int(10),
        }
    }
}

/// Firing configuration of one subsystem (bridge pairs or excitation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelConfig {
    sector_deg: u32,
    sector_ticks: u32,
    tick_hz: u32,

    /// Requested output state. It seeds the link enable flag, firing checks only the link.
    pub enabled: bool,

    min_angle: Fixed,
    max_angle: Fixed,

    open_time_us: u32,
    open_ticks: u32,
    delay_time_us: u32,
    delay_ticks: u32,

    pulse_train: PulseTrain,
    train_ticks: PulseTrainTicks,
}

impl ChannelConfig {
    /// Configuration of the bridge pairs for the given timing.
    pub fn pairs(timing: &TimerTiming) -> Self {
        Self::new(PAIR_SECTOR_DEG, timing.pair_sector_ticks(), timing.tick_hz)
    }

    /// Configuration of the excitation thyristor for the given timing.
    pub fn excitation(timing: &TimerTiming) -> Self {
        Self::new(EXCITATION_SECTOR_DEG, timing.half_cycle_ticks(), timing.tick_hz)
    }

    fn new(sector_deg: u32, sector_ticks: u32, tick_hz: u32) -> Self {
        let mut config = Self {
            sector_deg,
            sector_ticks,
            tick_hz,
            enabled: true,
            min_angle: fixed_int(5),
            max_angle: fixed_int(sector_deg as i32 - 5),
            open_time_us: 200,
            open_ticks: 0,
            delay_time_us: 0,
            delay_ticks: 0,
            pulse_train: PulseTrain::default(),
            train_ticks: PulseTrainTicks::default(),
        };
        config.refresh_ticks();
        config
    }

    #[inline(always)]
    pub fn sector_deg(&self) -> u32 {
        self.sector_deg
    }

    #[inline(always)]
    pub fn sector_ticks(&self) -> u32 {
        self.sector_ticks
    }

    pub fn angle_limits(&self) -> (Fixed, Fixed) {
        (self.min_angle, self.max_angle)
    }

    pub fn open_ticks(&self) -> u32 {
        self.open_ticks
    }

    pub fn delay_ticks(&self) -> u32 {
        self.delay_ticks
    }

    pub fn pulse_train(&self) -> PulseTrain {
        self.pulse_train
    }

    pub fn pulse_train_ticks(&self) -> PulseTrainTicks {
        self.train_ticks
    }

    /// Sets the open angle range, both bounds clamped into `[0, sector]`.
    pub fn set_angle_limits(&mut self, min: Fixed, max: Fixed) -> Result<()> {
        if min > max {
            return Err(DriveError::InvalidValue);
        }
        let sector = fixed_int(self.sector_deg as i32);
        let (min, min_clamped) = clamp_report(min, Fixed::ZERO, sector);
        let (max, max_clamped) = clamp_report(max, Fixed::ZERO, sector);
        self.min_angle = min;
        self.max_angle = max;
        self.refresh_ticks();
        clamped(min_clamped || max_clamped)
    }

    /// Sets the gate pulse width, clamped to half a sector.
    pub fn set_open_time_us(&mut self, us: u32) -> Result<()> {
        let max = self.sector_us() / 2;
        let value = us.clamp(1, max.max(1));
        self.open_time_us = value;
        self.refresh_ticks();
        clamped(value != us)
    }

    /// Sets the gate driver latency compensation, clamped to a quarter of a sector.
    pub fn set_delay_time_us(&mut self, us: u32) -> Result<()> {
        let value = us.min(self.sector_us() / 4);
        self.delay_time_us = value;
        self.refresh_ticks();
        clamped(value != us)
    }

    /// Sets pulse-train parameters; duty is clamped into (0, 0.5] and the guard band into the sector.
    pub fn set_pulse_train(&mut self, train: PulseTrain) -> Result<()> {
        if train.enabled && train.width_us == 0 {
            return Err(DriveError::InvalidValue);
        }
        let duty = clamp_duty(train.duty);
        let (angle_min, angle_clamped) = clamp_report(
            train.angle_min,
            Fixed::ZERO,
            fixed_int(self.sector_deg as i32),
        );
        let width_us = train.width_us.min(self.sector_us());
        self.pulse_train = PulseTrain {
            enabled: train.enabled,
            width_us,
            duty,
            angle_min,
        };
        self.refresh_ticks();
        clamped(duty != train.duty || angle_clamped || width_us != train.width_us)
    }

    /// Clamps an open angle into the configured range.
    #[inline]
    pub fn clamp_angle(&self, angle: Fixed) -> Fixed {
        angle.clamp(self.min_angle, self.max_angle)
    }

    /// Open angle in ticks of this subsystem's sector.
    #[inline]
    pub fn angle_ticks(&self, angle: Fixed) -> u32 {
        angle_to_ticks(angle, self.sector_deg, self.sector_ticks)
    }

    /// Open angle realized by `ticks` of this subsystem's sector.
    #[inline]
    pub fn ticks_angle(&self, ticks: u32) -> Fixed {
        ticks_to_angle(ticks, self.sector_deg, self.sector_ticks)
    }

    /// First pulse of a window and the burst budget left after it.
    pub fn plan_window(&self, angle_ticks: u32, latency_offset: i32) -> Option<(Window, u32)> {
        let (width, remaining) = self.train_ticks.first_pulse(self.open_ticks);
        let window = compare_window(
            self.sector_ticks,
            angle_ticks,
            latency_offset,
            self.delay_ticks,
            width,
        )?;
        Some((window, remaining))
    }

    fn sector_us(&self) -> u32 {
        (self.sector_ticks as u64 * 1_000_000 / self.tick_hz.max(1) as u64) as u32
    }

    fn refresh_ticks(&mut self) {
        self.open_ticks = us_to_ticks(self.open_time_us, self.tick_hz).max(1);
        self.delay_ticks = us_to_ticks(self.delay_time_us, self.tick_hz);
        let train = self.pulse_train;
        self.train_ticks = PulseTrainTicks {
            enabled: train.enabled,
            width: us_to_ticks(train.width_us, self.tick_hz),
            pulse: self.open_ticks,
            gap: pulse_gap_ticks(self.open_ticks, train.duty),
            angle_min: angle_to_ticks(train.angle_min, self.sector_deg, self.sector_ticks),
        };
    }
}

/// Firing configuration of the whole converter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiringConfig {
    pub timing: TimerTiming,
    pub pairs: ChannelConfig,
    pub excitation: ChannelConfig,
}

impl FiringConfig {
    pub fn new(timing: TimerTiming) -> Self {
        Self {
            timing,
            pairs: ChannelConfig::pairs(&timing),
            excitation: ChannelConfig::excitation(&timing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> TimerTiming {
        TimerTiming::new(1_000_000, 50).unwrap()
    }

    #[test]
    fn timing_sectors() {
        let timing = timing();
        assert_eq!(timing.ticks_per_cycle(), 20_000);
        assert_eq!(timing.pair_sector_ticks(), 6666);
        assert_eq!(timing.half_cycle_ticks(), 10_000);
        assert_eq!(TimerTiming::new(1_000, 50), Err(DriveError::InvalidValue));
        assert_eq!(TimerTiming::new(1_000_000, 0), Err(DriveError::InvalidValue));
    }

    #[test]
    fn timing_must_fit_the_compare_registers() {
        // 40000 + 20000 ticks still fit
        assert!(TimerTiming::new(2_000_000, 50).is_ok());
        // 200000 ticks per cycle would be clamped by the counter
        assert_eq!(TimerTiming::new(10_000_000, 50), Err(DriveError::InvalidValue));
        assert_eq!(TimerTiming::new(3_000_000, 50), Err(DriveError::InvalidValue));
    }

    #[test]
    fn angle_limits_are_clamped_to_sector() {
        let mut pairs = ChannelConfig::pairs(&timing());
        assert_eq!(
            pairs.set_angle_limits(fixed_int(-10), fixed_int(150)),
            Err(DriveError::OutOfRange)
        );
        assert_eq!(pairs.angle_limits(), (Fixed::ZERO, fixed_int(120)));
        assert_eq!(
            pairs.set_angle_limits(fixed_int(90), fixed_int(30)),
            Err(DriveError::InvalidValue)
        );
        // refused value keeps the previous state
        assert_eq!(pairs.angle_limits(), (Fixed::ZERO, fixed_int(120)));
    }

    #[test]
    fn times_are_converted_to_ticks() {
        let mut pairs = ChannelConfig::pairs(&TimerTiming::new(2_000_000, 50).unwrap());
        assert_eq!(pairs.set_open_time_us(150), Ok(()));
        assert_eq!(pairs.open_ticks(), 300);
        assert_eq!(pairs.set_delay_time_us(25), Ok(()));
        assert_eq!(pairs.delay_ticks(), 50);
    }

    #[test]
    fn oversized_open_time_is_clamped() {
        let mut pairs = ChannelConfig::pairs(&timing());
        assert_eq!(pairs.set_open_time_us(10_000), Err(DriveError::OutOfRange));
        assert_eq!(pairs.open_ticks(), 3333);
    }

    #[test]
    fn pulse_train_ticks_follow_settings() {
        let mut exc = ChannelConfig::excitation(&timing());
        exc.set_open_time_us(100).unwrap();
        let result = exc.set_pulse_train(PulseTrain {
            enabled: true,
            width_us: 2000,
            duty: Fixed::from_num(0.75),
            angle_min: fixed_int(18),
        });
        assert_eq!(result, Err(DriveError::OutOfRange));
        let ticks = exc.pulse_train_ticks();
        assert!(ticks.enabled);
        assert_eq!(ticks.width, 2000);
        assert_eq!(ticks.pulse, 100);
        assert_eq!(ticks.gap, 100);
        assert_eq!(ticks.angle_min, 1000);
    }

    #[test]
    fn realized_angle_is_the_quantized_one() {
        let pairs = ChannelConfig::pairs(&timing());
        let ticks = pairs.angle_ticks(fixed_int(60));
        assert_eq!(ticks, 3333);
        let realized = pairs.ticks_angle(ticks);
        assert!((realized - fixed_int(60)).abs() < Fixed::from_num(0.02));
    }

    #[test]
    fn plan_window_uses_delay_and_width() {
        let mut pairs = ChannelConfig::pairs(&timing());
        pairs.set_open_time_us(200).unwrap();
        pairs.set_delay_time_us(30).unwrap();
        let (window, remaining) = pairs.plan_window(3333, 70).unwrap();
        assert_eq!(window.open, 6666 - 3333 - 70 - 30);
        assert_eq!(window.width(), 200);
        assert_eq!(remaining, 0);
    }
}
