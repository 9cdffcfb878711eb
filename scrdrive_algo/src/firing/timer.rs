// Hardware timer seam of the firing scheduler.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

/// Largest compare value a firing timer holds, a 16 bit counter.
pub const COUNTER_MAX: u32 = 0xFFFF;

/// Compare channel of a firing timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Compare {
    /// Asserts the gate.
    Open,
    /// Releases the gate.
    Close,
}

/// Timer counting ticks from the zero-crossing event, with two compare channels
/// raising an interrupt each.
///
/// Compare values may be rewritten while the timer runs; the scheduler only does so for a
/// channel whose previous value has already fired.
pub trait FiringTimer {
    /// Stops counting and masks both compare interrupts.
    fn stop(&mut self);
    /// Sets the counter back to zero.
    fn reset(&mut self);
    /// Programs one compare register.
    fn set_compare(&mut self, compare: Compare, ticks: u32);
    /// Unmasks both compare interrupts.
    fn listen(&mut self);
    /// Starts counting.
    fn start(&mut self);
    /// True while the counter runs.
    fn is_running(&self) -> bool;
}
