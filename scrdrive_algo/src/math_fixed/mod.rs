// Fixed-point helpers shared by every control and timing computation.
//
// All percent, degree, current and speed values use the I16F16 format (16 fractional bits,
// range about +-32767). Products that may leave that range are evaluated on the raw bits in
// 64-bit integers and rounded half-up before being narrowed back.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

pub mod controllers;
pub mod filters;
pub mod normalization;

pub use fixed::types::I16F16 as Fixed;

/// Number of fractional bits of [`Fixed`].
pub const FRAC_BITS: u32 = 16;

/// One hundred percent.
pub const PERCENT_100: Fixed = fixed_int(100);

/// Builds a [`Fixed`] from an integer in const context.
#[inline(always)]
pub const fn fixed_int(value: i32) -> Fixed {
    Fixed::from_bits(value << FRAC_BITS)
}

/// Builds a [`Fixed`] from a ratio `num / den`, rounded half-up.
#[inline]
pub fn fixed_ratio(num: i32, den: i32) -> Fixed {
    mul_div(fixed_int(1), num, den)
}

/// Integer division rounding half-up (towards +inf on ties).
///
/// `den` must be positive, callers guarantee it.
#[inline]
pub const fn div_round(num: i64, den: i64) -> i64 {
    (2 * num + den).div_euclid(2 * den)
}

/// Computes `value * num / den` without intermediate overflow, rounded half-up and
/// saturated to the [`Fixed`] range. A non-positive `den` saturates towards the sign of the product.
pub fn mul_div(value: Fixed, num: i32, den: i32) -> Fixed {
    let product = value.to_bits() as i64 * num as i64;
    if den <= 0 {
        return if product >= 0 { Fixed::MAX } else { Fixed::MIN };
    }
    saturate_bits(div_round(product, den as i64))
}

/// Average of two values, computed on 64-bit bits so it never overflows.
#[inline]
pub fn average(a: Fixed, b: Fixed) -> Fixed {
    Fixed::from_bits(((a.to_bits() as i64 + b.to_bits() as i64) >> 1) as i32)
}

/// Narrows raw 64-bit bits into the [`Fixed`] range.
#[inline]
pub fn saturate_bits(bits: i64) -> Fixed {
    Fixed::from_bits(bits.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

/// Clamps `value` into `[min, max]` and reports whether clamping happened.
#[inline]
pub fn clamp_report(value: Fixed, min: Fixed, max: Fixed) -> (Fixed, bool) {
    if value < min {
        (min, true)
    } else if value > max {
        (max, true)
    } else {
        (value, false)
    }
}
