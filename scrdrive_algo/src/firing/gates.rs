// Gate outputs of the thyristors.
//
// A `Triac` drives one gate line; a `TriacPair` borrows the two bridge gates fired together.
// The gate bank owns the six bridge gates and the excitation gate.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::sequence::ThyristorPair;

/// Digital output driving one gate (through its pulse transformer or opto driver).
pub trait GatePin {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// Single thyristor gate.
pub struct Triac<P> {
    pin: P,
    open: bool,
}

impl<P: GatePin> Triac<P> {
    /// Takes the pin and forces the gate low.
    pub fn new(mut pin: P) -> Self {
        pin.set_low();
        Self { pin, open: false }
    }

    #[inline(always)]
    pub fn open(&mut self) {
        self.pin.set_high();
        self.open = true;
    }

    #[inline(always)]
    pub fn close(&mut self) {
        self.pin.set_low();
        self.open = false;
    }

    #[inline(always)]
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }
}

/// Two bridge gates fired together.
pub struct TriacPair<'a, P> {
    first: &'a mut Triac<P>,
    second: &'a mut Triac<P>,
}

impl<'a, P: GatePin> TriacPair<'a, P> {
    #[inline(always)]
    pub fn open(&mut self) {
        self.first.open();
        self.second.open();
    }

    #[inline(always)]
    pub fn close(&mut self) {
        self.first.close();
        self.second.close();
    }

    #[inline(always)]
    pub fn is_open(&self) -> bool {
        self.first.is_open() && self.second.is_open()
    }
}

/// All gates of the converter.
pub struct GateBank<P> {
    bridge: [Triac<P>; 6],
    excitation: Triac<P>,
}

impl<P: GatePin> GateBank<P> {
    /// Builds the bank from the gate pins of thyristors 1..6 and the excitation gate.
    pub fn new(bridge: [P; 6], excitation: P) -> Self {
        Self {
            bridge: bridge.map(Triac::new),
            excitation: Triac::new(excitation),
        }
    }

    /// Borrows the two gates of `pair`.
    pub fn pair(&mut self, pair: ThyristorPair) -> TriacPair<'_, P> {
        let (a, b) = pair.gate_indices();
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.bridge.split_at_mut(high);
        let (first, second) = (&mut head[low], &mut tail[0]);
        TriacPair { first, second }
    }

    pub fn thyristor(&self, number: u8) -> Option<&Triac<P>> {
        self.bridge.get((number as usize).wrapping_sub(1))
    }

    pub fn excitation(&mut self) -> &mut Triac<P> {
        &mut self.excitation
    }

    pub fn excitation_gate(&self) -> &Triac<P> {
        &self.excitation
    }

    pub fn is_excitation_open(&self) -> bool {
        self.excitation.is_open()
    }

    /// Forces every gate low.
    pub fn all_off(&mut self) {
        for triac in self.bridge.iter_mut() {
            triac.close();
        }
        self.excitation.close();
    }

    /// True if any bridge gate is asserted.
    pub fn any_bridge_open(&self) -> bool {
        self.bridge.iter().any(|triac| triac.is_open())
    }
}
