// Implements a fixed-point PID controller used by every stage of the cascaded regulator
// (speed -> current, current -> firing angle, excitation current -> firing angle).

// Key Features:
// - Proportional, integral and derivative gains in I16F16.
// - Integrates error using Tustin's method, the integral is kept in output units.
// - Anti-windup by clamping the integral into the output range.
// - Asymmetric output clamp, suited for unipolar outputs such as firing angles.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::math_fixed::{average, Fixed};

/// Gains of a single PID stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    /// Proportional gain, output units per error unit.
    pub kp: Fixed,
    /// Integral gain, output units per error unit and tick.
    pub ki: Fixed,
    /// Derivative gain, output units per error change per tick.
    pub kd: Fixed,
}

impl PidGains {
    pub const fn new(kp: Fixed, ki: Fixed, kd: Fixed) -> Self {
        Self { kp, ki, kd }
    }
}

/// A Proportional-Integral-Derivative (PID) controller implementation
/// to calculate corrective action for controlling dynamic systems.
///
/// **Note**
/// - Works with constant dt only (one call per regulation tick)
/// - Has integral anti-windup
pub struct PID {
    gains: PidGains,

    /// Accumulator for the integral term, already multiplied by `ki`
    integral: Fixed,
    /// Stores the previous error value for derivative and integral calculation
    previous_error: Fixed,
    /// The PID controller output
    output: Fixed,

    out_min: Fixed,
    out_max: Fixed,
}

impl PID {
    /// Constructor for the PID controller
    ///
    /// # Arguments
    /// * `gains` - Proportional, integral and derivative gains
    /// * `out_min` - Lower output bound
    /// * `out_max` - Upper output bound
    pub fn new(gains: PidGains, out_min: Fixed, out_max: Fixed) -> Self {
        let (out_min, out_max) = Self::order(out_min, out_max);
        Self {
            gains,
            integral: out_min.max(Fixed::ZERO).min(out_max),
            previous_error: Fixed::ZERO,
            output: out_min.max(Fixed::ZERO).min(out_max),
            out_min,
            out_max,
        }
    }

    /// Update the PID controller calculations
    ///
    /// # Arguments
    /// * `error` - The difference between the desired and measured values
    ///
    /// # Returns
    /// The new output, clamped into `[out_min, out_max]`
    pub fn tick(&mut self, error: Fixed) -> Fixed {
        // ######################## PROPORTIONAL TERM #################################
        let p = self.gains.kp.saturating_mul(error);

        // ########################## INTEGRAL TERM ###################################
        // Tustin's method (trapezoidal rule) for integrating the error with smoothing
        let step = self.gains.ki.saturating_mul(average(error, self.previous_error));
        self.integral = self
            .integral
            .saturating_add(step)
            .clamp(self.out_min, self.out_max);

        // ######################### DERIVATIVE TERM ##################################
        let derivative = error.saturating_sub(self.previous_error);
        let d = self.gains.kd.saturating_mul(derivative);

        self.previous_error = error;

        // ############################## OUTPUT ######################################
        self.output = p
            .saturating_add(self.integral)
            .saturating_add(d)
            .clamp(self.out_min, self.out_max);
        self.output
    }

    /// Retrieve the output value of the PID controller
    pub fn output(&self) -> Fixed {
        self.output
    }

    /// Current integral accumulator
    pub fn integral(&self) -> Fixed {
        self.integral
    }

    /// Drops accumulated state, output falls back to the bound closest to zero
    pub fn reset(&mut self) {
        let rest = Fixed::ZERO.max(self.out_min).min(self.out_max);
        self.integral = rest;
        self.previous_error = Fixed::ZERO;
        self.output = rest;
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Changes the output range; the accumulator is pulled into the new range
    pub fn set_limits(&mut self, out_min: Fixed, out_max: Fixed) {
        let (out_min, out_max) = Self::order(out_min, out_max);
        self.out_min = out_min;
        self.out_max = out_max;
        self.integral = self.integral.clamp(out_min, out_max);
        self.output = self.output.clamp(out_min, out_max);
    }

    pub fn limits(&self) -> (Fixed, Fixed) {
        (self.out_min, self.out_max)
    }

    #[inline(always)]
    fn order(a: Fixed, b: Fixed) -> (Fixed, Fixed) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}
