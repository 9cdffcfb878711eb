//! Gate driver outputs of the six bridge thyristors and the excitation thyristor.
use super::PinDef;
use super::{PinMode, Port};

/// Gate of thyristor 1 (phase A, anode side)
pub const G1: PinDef = PinDef::new(Port::B, 10, PinMode::Output);
/// Gate of thyristor 2 (phase C, cathode side)
pub const G2: PinDef = PinDef::new(Port::B, 11, PinMode::Output);
/// Gate of thyristor 3 (phase B, anode side)
pub const G3: PinDef = PinDef::new(Port::B, 12, PinMode::Output);
/// Gate of thyristor 4 (phase A, cathode side)
pub const G4: PinDef = PinDef::new(Port::B, 13, PinMode::Output);
/// Gate of thyristor 5 (phase C, anode side)
pub const G5: PinDef = PinDef::new(Port::B, 14, PinMode::Output);
/// Gate of thyristor 6 (phase B, cathode side)
pub const G6: PinDef = PinDef::new(Port::B, 15, PinMode::Output);

/// Bridge gates in thyristor order 1..6
pub const BRIDGE: [PinDef; 6] = [G1, G2, G3, G4, G5, G6];

/// Gate of the excitation thyristor
pub const EXCITATION: PinDef = PinDef::new(Port::B, 4, PinMode::Output);

/// Enable of the gate pulse transformers' supply
pub const ENABLE: PinDef = PinDef::new(Port::A, 4, PinMode::Output);
