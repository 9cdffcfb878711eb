#![cfg_attr(not(any(test, feature = "std")), no_std)]

// Control core of a 6-pulse thyristor DC drive.
//
// `DriveController` owns the two halves of the drive. `DriveRegulation` runs the cascaded
// regulator and commits open angles through a `FiringLink`; the `FiringScheduler` picks them
// up at the next zero-crossing and the timer compare interrupts drive the gates. The halves
// share nothing but the link, so they can be split into separate interrupt contexts.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

#[macro_use]
mod fmt;

pub mod error;
pub mod feedback;
pub mod firing;
pub mod math_fixed;
pub mod regulator;
pub mod settings;
pub mod telemetry;

pub use error::{DriveError, Result};

use error::accept_clamped;
use firing::config::{ChannelConfig, FiringConfig, PulseTrain};
use firing::gates::{GateBank, GatePin};
use firing::link::{FiringAngle, FiringCommand, FiringLink};
use firing::scheduler::{CommutationEvent, ExcitationMode, FiringScheduler, PairObserver};
use firing::sequence::{Phase, ThyristorPair};
use firing::timer::{Compare, FiringTimer};
use math_fixed::Fixed;
use regulator::overload::OverloadSettings;
use regulator::ramp::RampKind;
use regulator::{ControlMode, Feedback, Regulator, RegulatorOutput};
use settings::DriveSettings;
use telemetry::{StatusFlags, Telemetry};

/// Firing subsystem addressed by a configuration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Pairs,
    Excitation,
}

/// Regulation half of the drive: the cascaded regulator and the angle conversion.
///
/// It owns no hardware. Every tick commits through the link, and the loops follow the link
/// enable flags, so the firing half can latch the outputs off on its own.
pub struct DriveRegulation<'a> {
    regulator: Regulator,
    config: FiringConfig,
    link: &'a FiringLink,
}

impl<'a> DriveRegulation<'a> {
    /// Builds an idle regulation half and commits the idle command.
    ///
    /// Outputs stay disabled until enabled, `config` keeps the requested state per channel.
    pub fn new(
        settings: &DriveSettings,
        config: FiringConfig,
        link: &'a FiringLink,
    ) -> Result<Self> {
        let regulator = Regulator::new(
            &settings.regulator,
            &settings.ramp,
            &settings.overload,
            config.pairs.angle_limits(),
            config.excitation.angle_limits(),
        )?;
        link.commit(FiringCommand::IDLE);
        Ok(Self {
            regulator,
            config,
            link,
        })
    }

    /// Runs one regulation period and commits the resulting angles for the next commutation.
    pub fn regulation_tick(&mut self, feedback: &Feedback) -> RegulatorOutput {
        self.follow_link();
        let output = self.regulator.tick(feedback);
        let command = FiringCommand {
            pairs: output.pair_angle.map(|angle| firing_angle(&self.config.pairs, angle)),
            excitation: output
                .excitation_angle
                .map(|angle| firing_angle(&self.config.excitation, angle)),
        };
        self.link.commit(command);
        output
    }

    /// Commits the idle command and drops the loops whose output the link disabled.
    pub fn release(&mut self) {
        self.link.commit(FiringCommand::IDLE);
        self.follow_link();
    }

    // Loops of outputs latched off by the firing half reset here.
    fn follow_link(&mut self) {
        self.regulator.set_pairs_loop_enabled(self.link.pairs_enabled());
        self.regulator.set_excitation_loop_enabled(self.link.excitation_enabled());
    }

    // ############################## CONTROL SURFACE #################################

    pub fn start(&mut self) {
        self.regulator.start();
    }

    pub fn stop(&mut self) {
        self.regulator.stop();
    }

    pub fn fast_stop(&mut self) {
        self.regulator.fast_stop();
    }

    /// Operator reference, percent.
    pub fn set_reference(&mut self, percent: Fixed) -> Result<()> {
        self.regulator.set_reference(percent)
    }

    pub fn increment_reference(&mut self) -> Result<()> {
        self.regulator.increment_reference()
    }

    pub fn decrement_reference(&mut self) -> Result<()> {
        self.regulator.decrement_reference()
    }

    pub fn set_mode(&mut self, mode: ControlMode) {
        self.regulator.set_mode(mode);
    }

    /// Enables or disables firing of the bridge pairs and the armature loop.
    pub fn set_pairs_enabled(&mut self, enabled: bool) {
        self.config.pairs.enabled = enabled;
        self.link.set_pairs_enabled(enabled);
        self.regulator.set_pairs_loop_enabled(enabled);
    }

    /// Enables or disables firing of the excitation thyristor and the excitation loop.
    pub fn set_excitation_enabled(&mut self, enabled: bool) {
        self.config.excitation.enabled = enabled;
        self.link.set_excitation_enabled(enabled);
        self.regulator.set_excitation_loop_enabled(enabled);
    }

    /// Enables again the outputs that were enabled before a triacs stop latched them off.
    pub fn restore_outputs(&mut self) {
        self.set_pairs_enabled(self.config.pairs.enabled);
        self.set_excitation_enabled(self.config.excitation.enabled);
    }

    /// Excitation current setpoint, amperes.
    pub fn set_excitation_reference(&mut self, amperes: Fixed) -> Result<()> {
        self.regulator.set_excitation_reference(amperes)
    }

    pub fn set_ramp_time(&mut self, kind: RampKind, time_ms: i32) -> Result<()> {
        self.regulator.ramp_mut().set_rate(kind, time_ms)
    }

    pub fn set_overload(&mut self, settings: &OverloadSettings) -> Result<()> {
        self.regulator.overload_mut().configure(settings)
    }

    pub fn set_overload_enabled(&mut self, enabled: bool) {
        self.regulator.overload_mut().set_enabled(enabled);
    }

    /// Open angle range of a subsystem, degrees; the matching PID output follows it.
    pub fn set_angle_limits(&mut self, channel: Channel, min: Fixed, max: Fixed) -> Result<()> {
        let result = self.channel_mut(channel).set_angle_limits(min, max);
        accept_clamped(result)?;
        let (min, max) = self.channel_mut(channel).angle_limits();
        match channel {
            Channel::Pairs => self.regulator.set_pair_angle_limits(min, max),
            Channel::Excitation => self.regulator.set_excitation_angle_limits(min, max),
        }
        result
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut ChannelConfig {
        match channel {
            Channel::Pairs => &mut self.config.pairs,
            Channel::Excitation => &mut self.config.excitation,
        }
    }

    // ################################## QUERIES #####################################

    pub fn telemetry(&self) -> Telemetry {
        let regulator = &self.regulator;
        let overload = regulator.overload();

        let mut flags = StatusFlags::empty();
        flags.set(StatusFlags::RUNNING, regulator.is_running());
        flags.set(StatusFlags::OVERLOADED, overload.is_overloaded());
        flags.set(StatusFlags::RPM_LIMITED, regulator.is_rpm_limited());
        flags.set(StatusFlags::PAIRS_ENABLED, self.link.pairs_enabled());
        flags.set(StatusFlags::EXCITATION_ENABLED, self.link.excitation_enabled());

        let output = regulator.output();
        Telemetry {
            state: regulator.state(),
            mode: regulator.mode(),
            flags,
            reference: regulator.reference(),
            ramp_reference: regulator.ramp_reference(),
            rpm_reference: regulator.rpm_reference(),
            current_reference: regulator.current_reference(),
            pair_angle: output.pair_angle,
            excitation_angle: output.excitation_angle,
            available_current: overload.available_current(),
            heat_percent: overload.heat_percent(),
            last_opened_pair: self.last_opened_pair(),
        }
    }

    /// Pair of the last conduction confirmed by the firing half.
    pub fn last_opened_pair(&self) -> Option<ThyristorPair> {
        self.link.last_opened()
    }

    pub fn regulator(&self) -> &Regulator {
        &self.regulator
    }

    /// Firing configuration the angles are converted with.
    pub fn config(&self) -> &FiringConfig {
        &self.config
    }
}

/// Top-level owner of the regulation half and the firing scheduler.
pub struct DriveController<'a, T, P, O> {
    regulation: DriveRegulation<'a>,
    scheduler: FiringScheduler<'a, T, P, O>,
}

impl<'a, T, P, O> DriveController<'a, T, P, O>
where
    T: FiringTimer,
    P: GatePin,
    O: PairObserver,
{
    /// Builds the drive from its settings, idle, with every gate low.
    ///
    /// Settings are applied through the validating setters: a refused value aborts with
    /// `InvalidValue`, a clamped one is logged and kept.
    ///
    /// # Arguments
    /// * `settings` - Start-up settings
    /// * `link` - Command hand-over shared with the interrupt handlers
    /// * `pair_timers` - Two round-robin timers of the bridge pairs
    /// * `excitation_timer` - Timer of the excitation thyristor
    /// * `gates` - Gate outputs
    /// * `observer` - Receives every confirmed pair conduction
    pub fn new(
        settings: &DriveSettings,
        link: &'a FiringLink,
        pair_timers: [T; 2],
        excitation_timer: T,
        gates: GateBank<P>,
        observer: O,
    ) -> Result<Self> {
        let config = settings.firing_config()?;
        let mut regulation = DriveRegulation::new(settings, config, link)?;

        let mut scheduler =
            FiringScheduler::new(link, config, pair_timers, excitation_timer, gates, observer);
        scheduler.set_excitation_mode(settings.firing.excitation_mode);
        scheduler.set_excitation_phase(settings.firing.excitation_phase)?;

        // channel settings only seed the link flags
        regulation.set_pairs_enabled(config.pairs.enabled);
        regulation.set_excitation_enabled(config.excitation.enabled);
        info!("drive ready");
        Ok(Self {
            regulation,
            scheduler,
        })
    }

    /// Splits the drive into its regulation half and its firing half.
    ///
    /// Firing setup calls are no longer available afterwards, the scheduler keeps the
    /// configuration it had.
    pub fn into_parts(self) -> (DriveRegulation<'a>, FiringScheduler<'a, T, P, O>) {
        (self.regulation, self.scheduler)
    }

    // ############################ PERIODIC ENTRY POINTS #############################

    /// Runs one regulation period and commits the resulting angles for the next commutation.
    pub fn regulation_tick(&mut self, feedback: &Feedback) -> RegulatorOutput {
        self.regulation.regulation_tick(feedback)
    }

    /// Zero-crossing event: schedules the window of the sector it starts.
    #[inline]
    pub fn on_commutation(&mut self, event: CommutationEvent) -> Result<Option<usize>> {
        self.scheduler.on_commutation(event)
    }

    /// Compare interrupt of pair timer `slot`.
    #[inline]
    pub fn on_pair_compare(&mut self, slot: usize, compare: Compare) {
        self.scheduler.on_pair_compare(slot, compare)
    }

    /// Compare interrupt of the excitation timer.
    #[inline]
    pub fn on_excitation_compare(&mut self, compare: Compare) {
        self.scheduler.on_excitation_compare(compare)
    }

    /// Cancels every programmed window, forces every gate low and latches both outputs off
    /// until they are enabled again.
    pub fn drive_triacs_stop(&mut self) {
        self.scheduler.drive_triacs_stop();
        self.regulation.release();
    }

    // ############################## CONTROL SURFACE #################################

    pub fn start(&mut self) {
        self.regulation.start();
    }

    pub fn stop(&mut self) {
        self.regulation.stop();
    }

    pub fn fast_stop(&mut self) {
        self.regulation.fast_stop();
    }

    /// Operator reference, percent.
    pub fn set_reference(&mut self, percent: Fixed) -> Result<()> {
        self.regulation.set_reference(percent)
    }

    pub fn increment_reference(&mut self) -> Result<()> {
        self.regulation.increment_reference()
    }

    pub fn decrement_reference(&mut self) -> Result<()> {
        self.regulation.decrement_reference()
    }

    pub fn set_mode(&mut self, mode: ControlMode) {
        self.regulation.set_mode(mode);
    }

    /// Enables or disables firing of the bridge pairs and the armature loop.
    pub fn set_pairs_enabled(&mut self, enabled: bool) {
        self.regulation.set_pairs_enabled(enabled);
        self.mirror_config();
    }

    /// Enables or disables firing of the excitation thyristor and the excitation loop.
    pub fn set_excitation_enabled(&mut self, enabled: bool) {
        self.regulation.set_excitation_enabled(enabled);
        self.mirror_config();
    }

    /// Enables again the outputs latched off by `drive_triacs_stop`.
    pub fn restore_outputs(&mut self) {
        self.regulation.restore_outputs();
        self.mirror_config();
    }

    pub fn set_excitation_mode(&mut self, mode: ExcitationMode) {
        self.scheduler.set_excitation_mode(mode);
    }

    pub fn set_excitation_phase(&mut self, phase: Phase) -> Result<()> {
        self.scheduler.set_excitation_phase(phase)
    }

    /// Excitation current setpoint, amperes.
    pub fn set_excitation_reference(&mut self, amperes: Fixed) -> Result<()> {
        self.regulation.set_excitation_reference(amperes)
    }

    pub fn set_ramp_time(&mut self, kind: RampKind, time_ms: i32) -> Result<()> {
        self.regulation.set_ramp_time(kind, time_ms)
    }

    pub fn set_overload(&mut self, settings: &OverloadSettings) -> Result<()> {
        self.regulation.set_overload(settings)
    }

    pub fn set_overload_enabled(&mut self, enabled: bool) {
        self.regulation.set_overload_enabled(enabled);
    }

    // ################################ FIRING SETUP ##################################

    /// Open angle range of a subsystem, degrees; the matching PID output follows it.
    pub fn set_angle_limits(&mut self, channel: Channel, min: Fixed, max: Fixed) -> Result<()> {
        let result = self.regulation.set_angle_limits(channel, min, max);
        self.mirror_config();
        result
    }

    pub fn set_open_time_us(&mut self, channel: Channel, us: u32) -> Result<()> {
        let result = self.regulation.channel_mut(channel).set_open_time_us(us);
        self.mirror_config();
        result
    }

    pub fn set_delay_time_us(&mut self, channel: Channel, us: u32) -> Result<()> {
        let result = self.regulation.channel_mut(channel).set_delay_time_us(us);
        self.mirror_config();
        result
    }

    pub fn set_pulse_train(&mut self, channel: Channel, train: PulseTrain) -> Result<()> {
        let result = self.regulation.channel_mut(channel).set_pulse_train(train);
        self.mirror_config();
        result
    }

    // the regulation half holds the master copy
    fn mirror_config(&mut self) {
        *self.scheduler.config_mut() = self.regulation.config;
    }

    // ################################## QUERIES #####################################

    pub fn telemetry(&self) -> Telemetry {
        self.regulation.telemetry()
    }

    pub fn regulation(&self) -> &DriveRegulation<'a> {
        &self.regulation
    }

    pub fn regulator(&self) -> &Regulator {
        self.regulation.regulator()
    }

    pub fn scheduler(&self) -> &FiringScheduler<'a, T, P, O> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut FiringScheduler<'a, T, P, O> {
        &mut self.scheduler
    }
}

/// Clamps an open angle into the subsystem range and caches its ticks, along with the
/// angle those ticks realize.
fn firing_angle(config: &ChannelConfig, degrees: Fixed) -> FiringAngle {
    let ticks = config.angle_ticks(config.clamp_angle(degrees));
    FiringAngle {
        degrees: config.ticks_angle(ticks),
        ticks,
    }
}
