// Implements the conversion between electrical firing angles and hardware timer ticks,
// and the geometry of one firing window inside a commutation sector.

// Key Features:
// - Converts open angles (degrees) to ticks of a sector and back.
// - Computes the open/close compare values of a window, compensated by detector latency
//   and gate driver delay.
// - Derives the pulse-train spacing from the duty ratio and plans every sub-pulse against
//   the remaining burst budget and the guard band at the end of the window.

// Detailed Operation:
// A sector spans `sector_deg` electrical degrees and `sector_ticks` timer ticks, counted from
// the zero-crossing that started it. The open angle is measured backward from the end of the
// sector, so a larger angle opens earlier and conducts longer. The detector reports the
// zero-crossing `latency_offset` ticks late, and the gate driver adds `delay_ticks`, both are
// subtracted so the physical gate edge lands where the angle asks for it.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::math_fixed::{div_round, Fixed, FRAC_BITS};

/// Sector width of the bridge pairs, three sectors per mains cycle.
pub const PAIR_SECTOR_DEG: u32 = 120;
/// Sector width of the excitation thyristor, one half-cycle.
pub const EXCITATION_SECTOR_DEG: u32 = 180;

/// Largest accepted pulse-train duty ratio.
pub const MAX_DUTY: Fixed = Fixed::from_bits(1 << (FRAC_BITS - 1));

/// Converts an open angle to ticks of the sector, clamped to `[1, sector_ticks - 1]`.
pub fn angle_to_ticks(angle: Fixed, sector_deg: u32, sector_ticks: u32) -> u32 {
    if sector_ticks < 2 || sector_deg == 0 {
        return 1;
    }
    let bits = (angle.to_bits() as i64).max(0);
    let ticks = div_round(bits * sector_ticks as i64, (sector_deg as i64) << FRAC_BITS);
    ticks.clamp(1, sector_ticks as i64 - 1) as u32
}

/// Converts ticks of a sector back to an open angle in degrees.
pub fn ticks_to_angle(ticks: u32, sector_deg: u32, sector_ticks: u32) -> Fixed {
    if sector_ticks == 0 {
        return Fixed::ZERO;
    }
    let bits = div_round(
        ((sector_deg as i64) << FRAC_BITS) * ticks as i64,
        sector_ticks as i64,
    );
    Fixed::from_bits(bits.min(i32::MAX as i64) as i32)
}

/// Converts a duration in microseconds to timer ticks.
pub fn us_to_ticks(us: u32, tick_hz: u32) -> u32 {
    div_round(us as i64 * tick_hz as i64, 1_000_000) as u32
}

/// Clamps a pulse-train duty ratio into `(0, 0.5]`.
pub fn clamp_duty(duty: Fixed) -> Fixed {
    duty.clamp(Fixed::DELTA, MAX_DUTY)
}

/// Gap between two sub-pulses of `width_ticks` for the given duty ratio:
/// `width * (1 - duty) / duty`.
pub fn pulse_gap_ticks(width_ticks: u32, duty: Fixed) -> u32 {
    let duty = clamp_duty(duty).to_bits() as i64;
    let off = (1i64 << FRAC_BITS) - duty;
    div_round(width_ticks as i64 * off, duty).min(u32::MAX as i64) as u32
}

/// One gate pulse inside a firing window, in ticks since the zero-crossing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Window {
    /// Compare value asserting the gate.
    pub open: u32,
    /// Compare value releasing the gate.
    pub close: u32,
    /// End of the conduction window; no sub-pulse may open within the guard band before it.
    pub end: u32,
}

impl Window {
    #[inline(always)]
    pub const fn width(&self) -> u32 {
        self.close - self.open
    }

    /// Same window moved later by `ticks`.
    #[inline(always)]
    pub const fn shifted(&self, ticks: u32) -> Window {
        Window {
            open: self.open + ticks,
            close: self.close + ticks,
            end: self.end + ticks,
        }
    }
}

/// Computes the first pulse of a window.
///
/// `compare_open = sector_ticks - angle_ticks - latency_offset - delay_ticks` and
/// `compare_close = compare_open + width_ticks`. Returns `None` when the compensation
/// pushes the opening edge before the start of the timer.
pub fn compare_window(
    sector_ticks: u32,
    angle_ticks: u32,
    latency_offset: i32,
    delay_ticks: u32,
    width_ticks: u32,
) -> Option<Window> {
    let end = sector_ticks as i64 - latency_offset as i64 - delay_ticks as i64;
    let open = end - angle_ticks as i64;
    if open < 1 || width_ticks == 0 {
        return None;
    }
    Some(Window {
        open: open as u32,
        close: (open + width_ticks as i64) as u32,
        end: end as u32,
    })
}

/// Pulse-train (burst) parameters of one firing subsystem in tick form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseTrainTicks {
    pub enabled: bool,
    /// Total gate-on budget of one window.
    pub width: u32,
    /// Width of every sub-pulse.
    pub pulse: u32,
    /// Gap between the close of a sub-pulse and the open of the next one.
    pub gap: u32,
    /// Guard band before the end of the window.
    pub angle_min: u32,
}

impl PulseTrainTicks {
    /// Width of the first pulse of a window and the budget left after it.
    pub fn first_pulse(&self, conduction_ticks: u32) -> (u32, u32) {
        if !self.enabled {
            return (conduction_ticks, 0);
        }
        let width = self.pulse.min(self.width).max(1);
        (width, self.width.saturating_sub(width))
    }

    /// Plans the sub-pulse following `previous`.
    ///
    /// Returns the next pulse and the budget left after it, or `None` when the budget is
    /// spent, the pulse would open within `angle_min` ticks of the window end, or it would
    /// still be open at the window end.
    pub fn next_pulse(&self, previous: &Window, remaining: u32) -> Option<(Window, u32)> {
        if !self.enabled || remaining == 0 {
            return None;
        }
        let open = previous.close.checked_add(self.gap)?;
        let width = self.pulse.min(remaining).max(1);
        let close = open.checked_add(width)?;
        if open.saturating_add(self.angle_min) > previous.end || close > previous.end {
            return None;
        }
        Some((
            Window {
                open,
                close,
                end: previous.end,
            },
            remaining - width,
        ))
    }
}
