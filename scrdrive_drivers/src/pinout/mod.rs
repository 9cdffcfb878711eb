use hal::gpio::{Pin, PinMode, Port};

pub mod analog;
pub mod controls;
pub mod gates;
pub mod zero_cross;

/// Represents the definition of a GPIO pin.
pub struct PinDef {
    /// The port to which the pin belongs (e.g., Port::A, Port::B).
    port: Port,
    /// The pin number within the port.
    pin: u8,
    /// The mode of the pin (e.g., Output, Input, Alternate function).
    mode: PinMode,
}

impl PinDef {
    pub const fn new(port: Port, pin: u8, mode: PinMode) -> PinDef {
        PinDef { port, pin, mode }
    }

    /// Pin number, which is also its EXTI line.
    pub const fn line(&self) -> u8 {
        self.pin
    }

    /// Converts the PinDef struct to a Pin struct. Useful for predefined pin configurations.
    /// # Example
    /// ```ignore
    /// let mut gate = pinout::gates::G1.init();
    /// gate.set_low();
    /// ```
    pub fn init(&self) -> Pin {
        Pin::new(self.port, self.pin, self.mode)
    }
}
