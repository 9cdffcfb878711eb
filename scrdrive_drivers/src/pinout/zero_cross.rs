//! Zero-cross comparator inputs, one EXTI line per mains phase.
use super::PinDef;
use super::{PinMode, Port};

/// Comparator of phase A, EXTI0
pub const PHASE_A: PinDef = PinDef::new(Port::C, 0, PinMode::Input);
/// Comparator of phase B, EXTI1
pub const PHASE_B: PinDef = PinDef::new(Port::C, 1, PinMode::Input);
/// Comparator of phase C, EXTI2
pub const PHASE_C: PinDef = PinDef::new(Port::C, 2, PinMode::Input);
