//! Analog feedback inputs sampled by ADC1.
use super::PinDef;
use super::{PinMode, Port};

/// Armature voltage divider, ADC1_IN1
pub const ARMATURE_VOLTAGE: PinDef = PinDef::new(Port::A, 0, PinMode::Analog);
/// Armature current shunt amplifier, ADC1_IN2
pub const ARMATURE_CURRENT: PinDef = PinDef::new(Port::A, 1, PinMode::Analog);
/// Excitation current shunt amplifier, ADC1_IN3
pub const EXCITATION_CURRENT: PinDef = PinDef::new(Port::A, 2, PinMode::Analog);
/// Tachogenerator, ADC1_IN4
pub const TACHO: PinDef = PinDef::new(Port::A, 3, PinMode::Analog);

/// ADC1 channel numbers of the inputs above
pub const CH_ARMATURE_VOLTAGE: u8 = 1;
pub const CH_ARMATURE_CURRENT: u8 = 2;
pub const CH_EXCITATION_CURRENT: u8 = 3;
pub const CH_TACHO: u8 = 4;

/// All analog inputs, in conversion order
pub const INPUTS: [PinDef; 4] = [ARMATURE_VOLTAGE, ARMATURE_CURRENT, EXCITATION_CURRENT, TACHO];
