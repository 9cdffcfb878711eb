// Turns phase comparator edges into commutation events.
//
// The detector reports every mains phase twice in a row (A, A, B, B, C, C for forward
// rotation). The tracker remembers the last reported phase and derives the rotation
// direction from the order in which phases change.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::scheduler::CommutationEvent;
use super::sequence::{Direction, Phase};

pub struct ZeroCrossTracker {
    last: Phase,
    direction: Direction,
    latency_offset: i32,
}

impl ZeroCrossTracker {
    /// # Arguments
    /// * `latency_offset` - Delay between the real zero-crossing and the edge, timer ticks
    pub const fn new(latency_offset: i32) -> Self {
        Self {
            last: Phase::Unknown,
            direction: Direction::Unknown,
            latency_offset,
        }
    }

    /// Builds the event of an edge reported for `phase`.
    pub fn on_edge(&mut self, phase: Phase) -> CommutationEvent {
        self.direction = match (self.last, phase) {
            (_, Phase::Unknown) => Direction::Unknown,
            (Phase::Unknown, _) => self.direction,
            (last, phase) if last == phase => self.direction,
            (last, phase) if last.next() == phase => Direction::Forward,
            (last, phase) if phase.next() == last => Direction::Backward,
            _ => Direction::Unknown,
        };

        let event = CommutationEvent {
            phase,
            last_fired_phase: self.last,
            direction: self.direction,
            latency_offset: self.latency_offset,
        };
        if self.direction == Direction::Unknown && self.last != Phase::Unknown {
            debug!("zero-cross: rotation lost at {}", phase);
        }
        self.last = phase;
        event
    }

    /// Forgets the phase history, e.g. after mains loss.
    pub fn reset(&mut self) {
        self.last = Phase::Unknown;
        self.direction = Direction::Unknown;
    }

    pub fn set_latency_offset(&mut self, ticks: i32) {
        self.latency_offset = ticks;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn last_phase(&self) -> Phase {
        self.last
    }
}
