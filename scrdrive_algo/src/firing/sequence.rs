// Commutation sequencing of the 6-pulse bridge.
//
// Selects which thyristor pair conducts in the sector started by a zero-crossing event.
// Every mains phase is reported twice in a row by the phase detector; the first report
// selects the first pair of that phase's sector, the repeated report selects the second one.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::error::{DriveError, Result};

/// Mains phase identity reported by the zero-crossing detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    A,
    B,
    C,
    Unknown,
}

impl Phase {
    /// Offset of the phase's first pair inside a commutation sequence.
    #[inline(always)]
    pub const fn sector_offset(self) -> Option<usize> {
        match self {
            Phase::A => Some(0),
            Phase::B => Some(2),
            Phase::C => Some(4),
            Phase::Unknown => None,
        }
    }

    /// Phase following this one in forward rotation (A -> B -> C -> A).
    #[inline(always)]
    pub const fn next(self) -> Phase {
        match self {
            Phase::A => Phase::B,
            Phase::B => Phase::C,
            Phase::C => Phase::A,
            Phase::Unknown => Phase::Unknown,
        }
    }
}

/// Rotation direction reported by the external phase tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Forward,
    Backward,
    Unknown,
}

/// Bridge thyristor pair, named after the two thyristors (1..6) fired together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThyristorPair {
    T3T6,
    T3T2,
    T5T2,
    T5T4,
    T1T4,
    T1T6,
}

impl ThyristorPair {
    /// Thyristor numbers (1..6) of the pair, anode-side first.
    #[inline(always)]
    pub const fn thyristors(self) -> (u8, u8) {
        match self {
            ThyristorPair::T3T6 => (3, 6),
            ThyristorPair::T3T2 => (3, 2),
            ThyristorPair::T5T2 => (5, 2),
            ThyristorPair::T5T4 => (5, 4),
            ThyristorPair::T1T4 => (1, 4),
            ThyristorPair::T1T6 => (1, 6),
        }
    }

    /// Zero-based gate indices of the pair.
    #[inline(always)]
    pub const fn gate_indices(self) -> (usize, usize) {
        let (first, second) = self.thyristors();
        (first as usize - 1, second as usize - 1)
    }
}

/// Pair order for forward rotation, indexed by sector offset (+1 for the second pair).
pub const FORWARD_SEQUENCE: [ThyristorPair; 6] = [
    ThyristorPair::T3T6,
    ThyristorPair::T3T2,
    ThyristorPair::T5T2,
    ThyristorPair::T5T4,
    ThyristorPair::T1T4,
    ThyristorPair::T1T6,
];

/// Pair order for backward rotation, indexed by sector offset (+1 for the second pair).
pub const BACKWARD_SEQUENCE: [ThyristorPair; 6] = [
    ThyristorPair::T3T2,
    ThyristorPair::T3T6,
    ThyristorPair::T5T4,
    ThyristorPair::T5T2,
    ThyristorPair::T1T6,
    ThyristorPair::T1T4,
];

/// Selects the pair to fire for a zero-crossing of `phase`.
///
/// # Arguments
/// * `direction` - Rotation direction from the phase tracker
/// * `phase` - Phase whose zero-crossing started the sector
/// * `last_fired_phase` - Phase of the previous event; equal to `phase` on the repeated report
pub fn select_pair(
    direction: Direction,
    phase: Phase,
    last_fired_phase: Phase,
) -> Result<ThyristorPair> {
    let offset = phase.sector_offset().ok_or(DriveError::InvalidPhase)?;
    let sequence = match direction {
        Direction::Forward => &FORWARD_SEQUENCE,
        Direction::Backward => &BACKWARD_SEQUENCE,
        Direction::Unknown => return Err(DriveError::InvalidDirection),
    };
    let second = (last_fired_phase == phase) as usize;
    Ok(sequence[offset + second])
}
