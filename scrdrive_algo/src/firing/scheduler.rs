// Phase-synchronized firing scheduler of the bridge pairs and the excitation thyristor.

// Key Features:
// - Two pair timers used round-robin: a commutation programs the slot that is not current,
//   the other keeps counting its programmed window undisturbed.
// - Open/close compare handlers assert and release the gates, re-arm pulse-train
//   sub-pulses and report every confirmed conduction to a `PairObserver`.
// - One excitation timer fires both half-cycles of the excitation phase.

// Detailed Operation:
// A commutation event starts a new sector. The scheduler reads the command committed by the
// regulation tick (only when the link reports a new generation), picks the pair from the direction and phase, plans the window from the
// cached angle ticks and the detector latency, and arms the next slot. A slot stays armed
// until its last sub-pulse closed, and an armed slot is never reprogrammed: the sector is
// skipped instead.
// The excitation thyristor is scheduled on the first event of the excitation phase (one
// phase step later for backward rotation). After the first half-cycle pulse closed, the
// same timer is re-armed half a mains cycle later for the second half.
// Firing is gated by the link enable flags alone. `drive_triacs_stop` clears them, so the
// gates stay released until the supervisory side enables them again.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::angle2ticks::Window;
use super::config::FiringConfig;
use super::gates::{GateBank, GatePin};
use super::link::{FiringAngle, FiringCommand, FiringLink};
use super::sequence::{select_pair, Direction, Phase, ThyristorPair};
use super::timer::{Compare, FiringTimer};
use crate::error::{DriveError, Result};

/// Zero-crossing event delivered by the phase detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommutationEvent {
    pub phase: Phase,
    /// Phase of the previous event; equal to `phase` when the detector repeats it.
    pub last_fired_phase: Phase,
    pub direction: Direction,
    /// Detector latency in timer ticks.
    pub latency_offset: i32,
}

/// Who drives the excitation thyristor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExcitationMode {
    /// Phase-controlled by this scheduler.
    Internal,
    /// Driven by external equipment; the gate is left alone.
    External,
    /// Gate held at a constant level.
    Fixed(bool),
}

/// Receives the pair whose conduction was confirmed by a closed gate pulse.
pub trait PairObserver {
    fn pair_opened(&mut self, pair: ThyristorPair);
}

/// Observer that ignores every report.
pub struct NoObserver;

impl PairObserver for NoObserver {
    fn pair_opened(&mut self, _pair: ThyristorPair) {}
}

impl<F: FnMut(ThyristorPair)> PairObserver for F {
    fn pair_opened(&mut self, pair: ThyristorPair) {
        self(pair)
    }
}

/// Pair timer with the window it was programmed for.
pub struct TimerSlot<T> {
    timer: T,
    pair: Option<ThyristorPair>,
    window: Window,
    remaining: u32,
    offset: i32,
    armed: bool,
    gate_open: bool,
    reported: bool,
}

impl<T: FiringTimer> TimerSlot<T> {
    fn new(mut timer: T) -> Self {
        timer.stop();
        Self {
            timer,
            pair: None,
            window: Window::default(),
            remaining: 0,
            offset: 0,
            armed: false,
            gate_open: false,
            reported: false,
        }
    }

    fn arm(&mut self, pair: ThyristorPair, window: Window, remaining: u32, offset: i32) {
        self.timer.stop();
        self.timer.reset();
        self.timer.set_compare(Compare::Open, window.open);
        self.timer.set_compare(Compare::Close, window.close);
        self.pair = Some(pair);
        self.window = window;
        self.remaining = remaining;
        self.offset = offset;
        self.armed = true;
        self.gate_open = false;
        self.reported = false;
        self.timer.listen();
        self.timer.start();
    }

    fn disarm(&mut self) {
        self.timer.stop();
        self.armed = false;
        self.gate_open = false;
    }

    /// Pair assigned by the last programming.
    pub fn pair(&self) -> Option<ThyristorPair> {
        self.pair
    }

    /// Pulse being fired or waited for.
    pub fn window(&self) -> Window {
        self.window
    }

    /// Pulse-train budget left after the current sub-pulse.
    pub fn pulse_train_remaining(&self) -> u32 {
        self.remaining
    }

    /// Latency offset the window was compensated with.
    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn is_gate_open(&self) -> bool {
        self.gate_open
    }

    /// True from programming until the last sub-pulse closed.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}

/// Excitation timer, fired twice per mains cycle.
pub struct ExcitationSlot<T> {
    timer: T,
    window: Window,
    remaining: u32,
    half_window: Window,
    half_budget: u32,
    second_half_pending: bool,
    armed: bool,
    gate_open: bool,
}

impl<T: FiringTimer> ExcitationSlot<T> {
    fn new(mut timer: T) -> Self {
        timer.stop();
        Self {
            timer,
            window: Window::default(),
            remaining: 0,
            half_window: Window::default(),
            half_budget: 0,
            second_half_pending: false,
            armed: false,
            gate_open: false,
        }
    }

    fn arm(&mut self, window: Window, remaining: u32) {
        self.timer.stop();
        self.timer.reset();
        self.half_window = window;
        self.half_budget = remaining;
        self.second_half_pending = true;
        self.program(window, remaining);
        self.armed = true;
        self.gate_open = false;
        self.timer.listen();
        self.timer.start();
    }

    fn program(&mut self, window: Window, remaining: u32) {
        self.timer.set_compare(Compare::Open, window.open);
        self.timer.set_compare(Compare::Close, window.close);
        self.window = window;
        self.remaining = remaining;
    }

    fn disarm(&mut self) {
        self.timer.stop();
        self.armed = false;
        self.gate_open = false;
        self.second_half_pending = false;
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_gate_open(&self) -> bool {
        self.gate_open
    }

    /// True until the second half-cycle has been programmed.
    pub fn second_half_pending(&self) -> bool {
        self.second_half_pending
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}

/// Firing scheduler owning the timers and the gates.
pub struct FiringScheduler<'a, T, P, O = NoObserver> {
    link: &'a FiringLink,
    config: FiringConfig,
    slots: [TimerSlot<T>; 2],
    current: usize,
    excitation: ExcitationSlot<T>,
    excitation_mode: ExcitationMode,
    excitation_phase: Phase,
    gates: GateBank<P>,
    observer: O,
    command: FiringCommand,
    /// Link generation `command` was loaded at, `None` before the first load.
    generation: Option<u32>,
}

impl<'a, T, P, O> FiringScheduler<'a, T, P, O>
where
    T: FiringTimer,
    P: GatePin,
    O: PairObserver,
{
    /// Builds the scheduler with every timer stopped and every gate low.
    ///
    /// # Arguments
    /// * `link` - Command and enable flags shared with the regulation side
    /// * `config` - Firing configuration of both subsystems
    /// * `pair_timers` - The two round-robin timers of the bridge pairs
    /// * `excitation_timer` - Timer of the excitation thyristor
    /// * `gates` - Gate outputs
    /// * `observer` - Receives every confirmed pair conduction
    pub fn new(
        link: &'a FiringLink,
        config: FiringConfig,
        pair_timers: [T; 2],
        excitation_timer: T,
        gates: GateBank<P>,
        observer: O,
    ) -> Self {
        let [first, second] = pair_timers;
        let mut scheduler = Self {
            link,
            config,
            slots: [TimerSlot::new(first), TimerSlot::new(second)],
            // first commutation programs slot 0
            current: 1,
            excitation: ExcitationSlot::new(excitation_timer),
            excitation_mode: ExcitationMode::Internal,
            excitation_phase: Phase::A,
            gates,
            observer,
            command: FiringCommand::IDLE,
            generation: None,
        };
        scheduler.gates.all_off();
        scheduler
    }

    /// Schedules the sector started by `event`.
    ///
    /// Returns the slot programmed for the bridge pair, or `None` when the sector is skipped.
    /// Unknown phase or direction skip the sector with `InvalidPhase`/`InvalidDirection`.
    pub fn on_commutation(&mut self, event: CommutationEvent) -> Result<Option<usize>> {
        let command = self.command();
        self.schedule_excitation(&event, command.excitation);

        let pair = select_pair(event.direction, event.phase, event.last_fired_phase)?;
        if !self.link.pairs_enabled() {
            return Ok(None);
        }
        let angle = match command.pairs {
            Some(angle) => angle,
            None => return Ok(None),
        };
        if (angle.ticks as i64) < event.latency_offset as i64 {
            trace!("angle below latency, sector skipped");
            return Ok(None);
        }

        let next = 1 - self.current;
        if self.slots[next].armed {
            warn!("slot {} still armed, sector skipped", next);
            return Ok(None);
        }
        let (window, remaining) =
            match self.config.pairs.plan_window(angle.ticks, event.latency_offset) {
                Some(plan) => plan,
                None => return Ok(None),
            };

        self.slots[next].arm(pair, window, remaining, event.latency_offset);
        self.current = next;
        Ok(Some(next))
    }

    /// Committed command, reloaded from the link only after a new commit.
    fn command(&mut self) -> FiringCommand {
        let generation = self.link.generation();
        if self.generation != Some(generation) {
            self.command = self.link.load();
            self.generation = Some(generation);
        }
        self.command
    }

    fn schedule_excitation(&mut self, event: &CommutationEvent, angle: Option<FiringAngle>) {
        if self.excitation_mode != ExcitationMode::Internal || !self.link.excitation_enabled() {
            return;
        }
        let phase = match event.direction {
            Direction::Forward => self.excitation_phase,
            Direction::Backward => self.excitation_phase.next(),
            Direction::Unknown => return,
        };
        // only the first report of the excitation phase starts a cycle
        if event.phase != phase || event.last_fired_phase == event.phase {
            return;
        }
        let angle = match angle {
            Some(angle) if (angle.ticks as i64) >= event.latency_offset as i64 => angle,
            _ => return,
        };
        if self.excitation.armed {
            warn!("excitation still armed, cycle skipped");
            return;
        }
        if let Some((window, remaining)) = self
            .config
            .excitation
            .plan_window(angle.ticks, event.latency_offset)
        {
            self.excitation.arm(window, remaining);
        }
    }

    /// Compare interrupt of pair slot `slot`.
    pub fn on_pair_compare(&mut self, slot: usize, compare: Compare) {
        let Some(entry) = self.slots.get_mut(slot) else {
            return;
        };
        let Some(pair) = entry.pair else {
            return;
        };
        match compare {
            Compare::Open => {
                if entry.armed && self.link.pairs_enabled() {
                    self.gates.pair(pair).open();
                    entry.gate_open = true;
                }
            }
            Compare::Close => {
                self.gates.pair(pair).close();
                if entry.gate_open {
                    entry.gate_open = false;
                    if !entry.reported {
                        entry.reported = true;
                        self.link.publish_opened(pair);
                        self.observer.pair_opened(pair);
                    }
                }
                if !entry.armed {
                    return;
                }
                let train = self.config.pairs.pulse_train_ticks();
                match train.next_pulse(&entry.window, entry.remaining) {
                    Some((window, remaining)) => {
                        entry.timer.set_compare(Compare::Open, window.open);
                        entry.timer.set_compare(Compare::Close, window.close);
                        entry.window = window;
                        entry.remaining = remaining;
                    }
                    None => entry.disarm(),
                }
            }
        }
    }

    /// Compare interrupt of the excitation timer.
    pub fn on_excitation_compare(&mut self, compare: Compare) {
        if self.excitation_mode != ExcitationMode::Internal {
            return;
        }
        let slot = &mut self.excitation;
        match compare {
            Compare::Open => {
                if slot.armed && self.link.excitation_enabled() {
                    self.gates.excitation().open();
                    slot.gate_open = true;
                }
            }
            Compare::Close => {
                self.gates.excitation().close();
                slot.gate_open = false;
                if !slot.armed {
                    return;
                }
                let train = self.config.excitation.pulse_train_ticks();
                if let Some((window, remaining)) = train.next_pulse(&slot.window, slot.remaining) {
                    slot.program(window, remaining);
                } else if slot.second_half_pending {
                    slot.second_half_pending = false;
                    let window = slot
                        .half_window
                        .shifted(self.config.timing.half_cycle_ticks());
                    let budget = slot.half_budget;
                    slot.program(window, budget);
                } else {
                    slot.disarm();
                }
            }
        }
    }

    /// Stops every timer, forces every gate low and clears both enable flags.
    ///
    /// Nothing fires again until the outputs are enabled through the link.
    pub fn drive_triacs_stop(&mut self) {
        self.link.set_pairs_enabled(false);
        self.link.set_excitation_enabled(false);
        for slot in self.slots.iter_mut() {
            slot.disarm();
        }
        self.excitation.disarm();
        self.gates.all_off();
        info!("firing stopped, outputs latched off");
    }

    pub fn set_excitation_mode(&mut self, mode: ExcitationMode) {
        if mode == self.excitation_mode {
            return;
        }
        self.excitation.disarm();
        match mode {
            ExcitationMode::Fixed(true) => self.gates.excitation().open(),
            ExcitationMode::Fixed(false) => self.gates.excitation().close(),
            ExcitationMode::Internal => self.gates.excitation().close(),
            ExcitationMode::External => {}
        }
        self.excitation_mode = mode;
        debug!("excitation mode {}", mode);
    }

    pub fn excitation_mode(&self) -> ExcitationMode {
        self.excitation_mode
    }

    /// Sets the mains phase the excitation thyristor is connected to.
    pub fn set_excitation_phase(&mut self, phase: Phase) -> Result<()> {
        if phase == Phase::Unknown {
            return Err(DriveError::InvalidPhase);
        }
        self.excitation_phase = phase;
        Ok(())
    }

    pub fn excitation_phase(&self) -> Phase {
        self.excitation_phase
    }

    /// Pair of the last confirmed conduction.
    pub fn last_opened_pair(&self) -> Option<ThyristorPair> {
        self.link.last_opened()
    }

    /// Link generation of the command the last sector was planned with.
    pub fn command_generation(&self) -> Option<u32> {
        self.generation
    }

    /// Index of the slot programmed last.
    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn slot(&self, index: usize) -> Option<&TimerSlot<T>> {
        self.slots.get(index)
    }

    pub fn excitation_slot(&self) -> &ExcitationSlot<T> {
        &self.excitation
    }

    /// Timer of pair slot `index`, for acknowledging its compare interrupts.
    pub fn pair_timer_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).map(|slot| &mut slot.timer)
    }

    pub fn excitation_timer_mut(&mut self) -> &mut T {
        &mut self.excitation.timer
    }

    pub fn config(&self) -> &FiringConfig {
        &self.config
    }

    /// Configuration access; changes apply from the next commutation.
    pub fn config_mut(&mut self) -> &mut FiringConfig {
        &mut self.config
    }

    pub fn gates(&self) -> &GateBank<P> {
        &self.gates
    }

    pub fn link(&self) -> &'a FiringLink {
        self.link
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }
}
