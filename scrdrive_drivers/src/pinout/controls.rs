//! Operator and protection inputs.
use super::PinDef;
use super::{PinMode, Port};

/// Start/stop push button (active low, pull-up), EXTI9_5
pub const START_STOP: PinDef = PinDef::new(Port::A, 9, PinMode::Input);
/// Fault line of the external protection module (active low, pull-up), EXTI15_10
pub const FAULT: PinDef = PinDef::new(Port::A, 10, PinMode::Input);
