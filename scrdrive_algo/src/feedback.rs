// Double buffer of the measurements consumed by the regulation tick.
//
// The measurement side (ADC and speed interrupts) fills one buffer field by field while the
// regulation tick reads the other one. A buffer becomes readable only once every mandatory
// field has been written, so the tick always sees one consistent set of feedback values.

// Key Features:
// - Two `Feedback` buffers, one being filled and one ready for reading.
// - A bitmask tracks the pending fields of each buffer.
// - A lock bit keeps the ready buffer from being recycled while it is copied.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::math_fixed::Fixed;
use crate::regulator::Feedback;

/// Bit of each field group in the pending mask.
#[repr(u32)]
#[derive(Clone, Copy)]
pub enum FieldBit {
    ArmatureVoltage = 1 << 0,
    ArmatureCurrent = 1 << 1,
    ExcitationCurrent = 1 << 2,
    /// Measured and available speed.
    Speed = 1 << 3,
    Lock = 1 << 31,
}

/// Every measurement group.
pub const ALL_FIELDS: u32 = FieldBit::ArmatureVoltage as u32
    | FieldBit::ArmatureCurrent as u32
    | FieldBit::ExcitationCurrent as u32
    | FieldBit::Speed as u32;

/// Feedback buffer requiring every measurement group.
pub type DriveFeedback = FeedbackDump<ALL_FIELDS>;

pub struct FeedbackDump<const MANDATORY_FIELDS: u32> {
    buffers: [Feedback; 2],
    /// Buffer being filled.
    idx2update: usize,
    /// Pending fields and lock bit of each buffer.
    flags: [u32; 2],
    iter: usize,
    prev_iter: usize,
}

impl<const MANDATORY_FIELDS: u32> FeedbackDump<MANDATORY_FIELDS> {
    /// Buffer 0 starts pending, buffer 1 ready with zeroed feedback.
    pub fn new() -> Self {
        Self {
            buffers: [Feedback::default(); 2],
            idx2update: 0,
            flags: [MANDATORY_FIELDS, 0],
            iter: 0,
            prev_iter: 0,
        }
    }

    #[inline(always)]
    fn is_ready(&self, idx: usize) -> bool {
        self.flags[idx] == 0
    }

    #[inline(always)]
    fn opposite(idx: usize) -> usize {
        1 - idx
    }

    /// Marks a field filled and swaps buffers once both are ready.
    fn fill(&mut self, bit: FieldBit) {
        let idx = self.idx2update;
        self.flags[idx] &= !(bit as u32);
        if self.is_ready(0) && self.is_ready(1) {
            let next = Self::opposite(idx);
            self.flags[next] = MANDATORY_FIELDS;
            self.idx2update = next;
            self.iter = self.iter.wrapping_add(1);
        }
    }

    pub fn set_armature_voltage(&mut self, volts: Fixed) {
        self.buffers[self.idx2update].armature_voltage = volts;
        self.fill(FieldBit::ArmatureVoltage);
    }

    pub fn set_armature_current(&mut self, amperes: Fixed) {
        self.buffers[self.idx2update].armature_current = amperes;
        self.fill(FieldBit::ArmatureCurrent);
    }

    pub fn set_excitation_current(&mut self, amperes: Fixed) {
        self.buffers[self.idx2update].excitation_current = amperes;
        self.fill(FieldBit::ExcitationCurrent);
    }

    /// Measured speed and the highest speed currently available, rpm.
    pub fn set_speed(&mut self, rpm: Fixed, rpm_available: Fixed) {
        let buffer = &mut self.buffers[self.idx2update];
        buffer.rpm = rpm;
        buffer.rpm_available = rpm_available;
        self.fill(FieldBit::Speed);
    }

    /// True when a complete set arrived since the last read.
    #[inline(always)]
    pub fn is_updated(&self) -> bool {
        self.iter != self.prev_iter
    }

    /// Copies the last complete feedback set.
    pub fn get_data(&mut self) -> Feedback {
        let ready = Self::opposite(self.idx2update);
        self.flags[ready] |= FieldBit::Lock as u32;
        let data = self.buffers[ready];
        self.prev_iter = self.iter;
        self.flags[ready] &= !(FieldBit::Lock as u32);
        data
    }
}

impl<const MANDATORY_FIELDS: u32> Default for FeedbackDump<MANDATORY_FIELDS> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math_fixed::fixed_int;

    fn fill_all(dump: &mut DriveFeedback, scale: i32) {
        dump.set_armature_voltage(fixed_int(200 * scale));
        dump.set_armature_current(fixed_int(5 * scale));
        dump.set_excitation_current(fixed_int(scale));
        dump.set_speed(fixed_int(300 * scale), fixed_int(1500));
    }

    #[test]
    fn only_complete_sets_are_published() {
        let mut dump = DriveFeedback::new();
        assert!(!dump.is_updated());

        dump.set_armature_voltage(fixed_int(200));
        dump.set_armature_current(fixed_int(5));
        assert!(!dump.is_updated());
        assert_eq!(dump.get_data(), Feedback::default());

        dump.set_excitation_current(fixed_int(1));
        dump.set_speed(fixed_int(300), fixed_int(1500));
        assert!(dump.is_updated());
        let data = dump.get_data();
        assert_eq!(data.armature_current, fixed_int(5));
        assert_eq!(data.rpm, fixed_int(300));
        assert!(!dump.is_updated());
    }

    #[test]
    fn partial_update_keeps_previous_set() {
        let mut dump = DriveFeedback::new();
        fill_all(&mut dump, 1);
        dump.set_armature_current(fixed_int(9));
        assert_eq!(dump.get_data().armature_current, fixed_int(5));

        fill_all(&mut dump, 2);
        assert!(dump.is_updated());
        assert_eq!(dump.get_data().armature_current, fixed_int(10));
    }
}
