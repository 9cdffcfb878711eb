// Hand-over of the committed firing command from the regulation tick to the scheduler
// and the timer interrupts.
//
// The command is written only by the supervisory side and read at the next commutation.
// Both sides go through the same critical section, so a reader sees either the complete
// previous command or the complete new one. The generation counter tells readers whether
// a new command was committed since their last look. The enable flags are plain atomics,
// read by the compare handlers before a gate is asserted. The last confirmed conduction
// travels the other way, from the compare handlers to the supervisory side.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use critical_section::Mutex;

use super::sequence::{ThyristorPair, FORWARD_SEQUENCE};
use crate::math_fixed::Fixed;

/// Open angle in degrees with its tick-converted value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiringAngle {
    pub degrees: Fixed,
    pub ticks: u32,
}

/// Angles committed for the next commutation; `None` means "do not fire".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiringCommand {
    pub pairs: Option<FiringAngle>,
    pub excitation: Option<FiringAngle>,
}

impl FiringCommand {
    pub const IDLE: FiringCommand = FiringCommand {
        pairs: None,
        excitation: None,
    };
}

impl Default for FiringCommand {
    fn default() -> Self {
        Self::IDLE
    }
}

pub struct FiringLink {
    command: Mutex<Cell<FiringCommand>>,
    generation: AtomicU32,
    pairs_enabled: AtomicBool,
    excitation_enabled: AtomicBool,
    /// Position in `FORWARD_SEQUENCE` plus one, 0 before the first conduction.
    last_opened: AtomicU8,
}

impl FiringLink {
    /// Both outputs start disabled with an idle command.
    pub const fn new() -> Self {
        Self {
            command: Mutex::new(Cell::new(FiringCommand::IDLE)),
            generation: AtomicU32::new(0),
            pairs_enabled: AtomicBool::new(false),
            excitation_enabled: AtomicBool::new(false),
            last_opened: AtomicU8::new(0),
        }
    }

    /// Publishes a new command for the next commutation.
    pub fn commit(&self, command: FiringCommand) {
        critical_section::with(|cs| {
            self.command.borrow(cs).set(command);
            // load/store instead of fetch_add, thumbv6 has no atomic RMW
            let next = self.generation.load(Ordering::Relaxed).wrapping_add(1);
            self.generation.store(next, Ordering::Release);
        });
    }

    /// Latest committed command.
    pub fn load(&self) -> FiringCommand {
        critical_section::with(|cs| self.command.borrow(cs).get())
    }

    /// Number of commits so far, wrapping.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn set_pairs_enabled(&self, enabled: bool) {
        self.pairs_enabled.store(enabled, Ordering::Release);
    }

    #[inline(always)]
    pub fn pairs_enabled(&self) -> bool {
        self.pairs_enabled.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub fn set_excitation_enabled(&self, enabled: bool) {
        self.excitation_enabled.store(enabled, Ordering::Release);
    }

    #[inline(always)]
    pub fn excitation_enabled(&self) -> bool {
        self.excitation_enabled.load(Ordering::Acquire)
    }

    /// Records a confirmed conduction of `pair`.
    pub fn publish_opened(&self, pair: ThyristorPair) {
        let code = FORWARD_SEQUENCE
            .iter()
            .position(|entry| *entry == pair)
            .map_or(0, |index| index as u8 + 1);
        self.last_opened.store(code, Ordering::Release);
    }

    /// Pair of the last confirmed conduction.
    pub fn last_opened(&self) -> Option<ThyristorPair> {
        match self.last_opened.load(Ordering::Acquire) {
            0 => None,
            code => FORWARD_SEQUENCE.get(code as usize - 1).copied(),
        }
    }
}

impl Default for FiringLink {
    fn default() -> Self {
        Self::new()
    }
}
