// Error taxonomy shared by the regulation chain and the firing scheduler.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

/// Errors reported by setters and by the commutation scheduler.
///
/// None of them is fatal: clamped values are still applied, refused values leave the
/// previous state untouched and invalid commutation inputs only skip one sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveError {
    /// Value was outside its range; the clamped value has been applied.
    OutOfRange,
    /// Value was refused, nothing changed.
    InvalidValue,
    /// Commutation event carried an unknown phase, sector skipped.
    InvalidPhase,
    /// Commutation event carried an unknown rotation direction, sector skipped.
    InvalidDirection,
}

pub type Result<T> = core::result::Result<T, DriveError>;

/// Maps a "was clamped" flag to the setter result.
#[inline(always)]
pub(crate) fn clamped(was_clamped: bool) -> Result<()> {
    if was_clamped {
        Err(DriveError::OutOfRange)
    } else {
        Ok(())
    }
}

/// Accepts a clamped setting (logged), passes a refusal on.
pub(crate) fn accept_clamped(result: Result<()>) -> Result<()> {
    match result {
        Err(DriveError::OutOfRange) => {
            warn!("setting out of range, clamped value kept");
            Ok(())
        }
        other => other,
    }
}
