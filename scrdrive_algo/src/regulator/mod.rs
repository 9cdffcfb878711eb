// Cascaded regulator: speed -> armature current -> bridge open angle, plus an independent
// excitation current -> excitation open angle loop.

// Key Features:
// - State machine Idle/Start/Run/Stop driven by explicit start, stop and fast stop requests.
// - Speed or torque control of the ramped operator reference.
// - Current ceiling derated by the thermal overload model.
// - Loops can be disabled one by one; re-enabling the armature loop while running restarts the
//   ramp from the measured speed.

// Detailed Operation:
// Every PID stage works in percent of a nominal value: the speed error in percent of
// `rpm_max` gives a current demand in percent of `current_max`, the current error in percent
// of `current_max` gives the open angle in degrees, the excitation current error in percent
// of its maximum gives the excitation open angle. A larger open angle conducts longer, so
// both angle PIDs rest at their minimum angle.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

pub mod overload;
pub mod ramp;

use crate::error::{accept_clamped, clamped, DriveError, Result};
use crate::math_fixed::controllers::pid::{PidGains, PID};
use crate::math_fixed::filters::lpf::FilterLPF;
use crate::math_fixed::normalization::{percent_to_value, value_to_percent};
use crate::math_fixed::{clamp_report, fixed_int, fixed_ratio, Fixed, PERCENT_100};

use overload::{OverloadModel, OverloadSettings};
use ramp::{Ramp, RampKind, RampSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegulatorState {
    Idle,
    Start,
    Run,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlMode {
    /// Reference is a speed, the outer loop produces the current demand.
    Speed,
    /// Reference is a share of the current ceiling.
    Torque,
}

/// Measurements read once per regulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Feedback {
    pub armature_voltage: Fixed,
    pub armature_current: Fixed,
    pub excitation_current: Fixed,
    pub rpm: Fixed,
    /// Highest speed the motor may run at now; non-positive when not reported.
    pub rpm_available: Fixed,
}

/// Open angles computed by the last tick, `None` when the subsystem must not fire.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegulatorOutput {
    pub pair_angle: Option<Fixed>,
    pub excitation_angle: Option<Fixed>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegulatorSettings {
    /// Regulation tick period.
    pub tick_ms: u32,
    pub mode: ControlMode,
    pub reference_min: Fixed,
    pub reference_max: Fixed,
    /// Step of `increment_reference`/`decrement_reference`, percent.
    pub reference_step: Fixed,
    /// Speed matching 100 % reference.
    pub rpm_max: Fixed,
    /// Configured armature current ceiling, amperes.
    pub current_max: Fixed,
    pub excitation_current_max: Fixed,
    pub excitation_current_reference: Fixed,
    pub speed_gains: PidGains,
    pub current_gains: PidGains,
    pub excitation_gains: PidGains,
    /// Speed feedback filter coefficient (0 passes the measurement through).
    pub rpm_filter_alpha: u8,
}

impl Default for RegulatorSettings {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            mode: ControlMode::Speed,
            reference_min: Fixed::ZERO,
            reference_max: PERCENT_100,
            reference_step: fixed_int(1),
            rpm_max: fixed_int(1500),
            current_max: fixed_int(15),
            excitation_current_max: fixed_int(2),
            excitation_current_reference: fixed_ratio(3, 2),
            speed_gains: PidGains::new(fixed_int(2), fixed_ratio(1, 2), Fixed::ZERO),
            current_gains: PidGains::new(fixed_ratio(1, 2), fixed_ratio(1, 5), Fixed::ZERO),
            excitation_gains: PidGains::new(fixed_int(1), fixed_ratio(1, 2), Fixed::ZERO),
            rpm_filter_alpha: 128,
        }
    }
}

pub struct Regulator {
    state: RegulatorState,
    mode: ControlMode,
    tick_ms: u32,

    reference: Fixed,
    reference_min: Fixed,
    reference_max: Fixed,
    reference_step: Fixed,

    rpm_max: Fixed,
    current_max: Fixed,
    excitation_current_max: Fixed,
    excitation_current_reference: Fixed,

    rpm_reference: Fixed,
    current_reference: Fixed,
    rpm_limited: bool,

    ramp: Ramp,
    stop_kind: RampKind,
    overload: OverloadModel,

    speed_pid: PID,
    current_pid: PID,
    excitation_pid: PID,
    rpm_filter: FilterLPF,

    pairs_loop_enabled: bool,
    excitation_loop_enabled: bool,
    resync: bool,

    output: RegulatorOutput,
}

impl Regulator {
    /// Builds an idle regulator.
    ///
    /// # Arguments
    /// * `settings` - Loop limits and gains
    /// * `ramp` - Ramp profiles
    /// * `overload` - Thermal model parameters
    /// * `pair_angles` - Open angle range of the bridge pairs, degrees
    /// * `excitation_angles` - Open angle range of the excitation thyristor, degrees
    pub fn new(
        settings: &RegulatorSettings,
        ramp: &RampSettings,
        overload: &OverloadSettings,
        pair_angles: (Fixed, Fixed),
        excitation_angles: (Fixed, Fixed),
    ) -> Result<Self> {
        if settings.rpm_max <= Fixed::ZERO
            || settings.current_max <= Fixed::ZERO
            || settings.excitation_current_max <= Fixed::ZERO
        {
            return Err(DriveError::InvalidValue);
        }
        let mut regulator = Self {
            state: RegulatorState::Idle,
            mode: settings.mode,
            tick_ms: settings.tick_ms,
            reference: Fixed::ZERO,
            reference_min: Fixed::ZERO,
            reference_max: PERCENT_100,
            reference_step: settings.reference_step,
            rpm_max: settings.rpm_max,
            current_max: settings.current_max,
            excitation_current_max: settings.excitation_current_max,
            excitation_current_reference: Fixed::ZERO,
            rpm_reference: Fixed::ZERO,
            current_reference: Fixed::ZERO,
            rpm_limited: false,
            ramp: Ramp::with_settings(settings.tick_ms, ramp)?,
            stop_kind: RampKind::Stop,
            overload: OverloadModel::new(overload)?,
            speed_pid: PID::new(settings.speed_gains, Fixed::ZERO, PERCENT_100),
            current_pid: PID::new(settings.current_gains, pair_angles.0, pair_angles.1),
            excitation_pid: PID::new(
                settings.excitation_gains,
                excitation_angles.0,
                excitation_angles.1,
            ),
            rpm_filter: FilterLPF::new(Fixed::ZERO, settings.rpm_filter_alpha),
            pairs_loop_enabled: true,
            excitation_loop_enabled: true,
            resync: false,
            output: RegulatorOutput::default(),
        };
        accept_clamped(
            regulator.set_reference_limits(settings.reference_min, settings.reference_max),
        )?;
        accept_clamped(
            regulator.set_excitation_reference(settings.excitation_current_reference),
        )?;
        accept_clamped(regulator.set_reference_step(settings.reference_step))?;
        Ok(regulator)
    }

    // ############################ REGULATION TICK ###################################

    /// Runs one regulation period and returns the open angles to commit.
    pub fn tick(&mut self, feedback: &Feedback) -> RegulatorOutput {
        let rpm = self.rpm_filter.tick(feedback.rpm.max(Fixed::ZERO));
        self.overload.tick(feedback.armature_current, self.tick_ms);

        // the field is held through Start/Run/Stop and released in Idle
        self.output.excitation_angle = if self.excitation_loop_enabled && self.is_running() {
            let error = value_to_percent(
                self.excitation_current_reference - feedback.excitation_current,
                self.excitation_current_max,
            );
            Some(self.excitation_pid.tick(error))
        } else {
            None
        };

        self.output.pair_angle = match self.state {
            RegulatorState::Idle => None,
            _ if !self.pairs_loop_enabled => {
                if self.state == RegulatorState::Stop {
                    self.enter_idle();
                }
                None
            }
            _ => self.run_armature(feedback, rpm),
        };
        self.output
    }

    fn run_armature(&mut self, feedback: &Feedback, rpm: Fixed) -> Option<Fixed> {
        if self.resync {
            self.resync = false;
            self.resync_ramp(feedback, rpm);
        }

        let done = self.ramp.advance();
        match self.state {
            RegulatorState::Start if self.ramp.current() >= self.reference => {
                self.state = RegulatorState::Run;
                info!("regulator: start -> run");
            }
            RegulatorState::Stop if done => {
                self.enter_idle();
                return None;
            }
            _ => {}
        }

        let ceiling = self.overload.available_current().min(self.current_max);
        let ceiling_percent = value_to_percent(ceiling, self.current_max);

        let demand = match self.mode {
            ControlMode::Speed => {
                self.rpm_reference = self.limited_rpm_reference(feedback.rpm_available);
                // the ramp cannot climb past the available rpm, so it has caught up
                if self.rpm_limited && self.state == RegulatorState::Start {
                    self.state = RegulatorState::Run;
                    info!("regulator: start -> run (rpm limited)");
                }
                self.speed_pid.set_limits(Fixed::ZERO, ceiling_percent);
                let error = value_to_percent(self.rpm_reference - rpm, self.rpm_max);
                self.speed_pid.tick(error)
            }
            ControlMode::Torque => percent_to_value(self.ramp.current(), ceiling_percent),
        };

        self.current_reference = percent_to_value(demand, self.current_max);
        let error = value_to_percent(
            self.current_reference - feedback.armature_current,
            self.current_max,
        );
        Some(self.current_pid.tick(error))
    }

    fn limited_rpm_reference(&mut self, rpm_available: Fixed) -> Fixed {
        let reference = percent_to_value(self.ramp.current(), self.rpm_max);
        let limit = if rpm_available > Fixed::ZERO {
            rpm_available.min(self.rpm_max)
        } else {
            self.rpm_max
        };
        if reference > limit {
            if !self.rpm_limited {
                debug!("speed reference limited by available rpm");
            }
            self.rpm_limited = true;
            // pull the ramp back so it does not wind up above the limit
            self.ramp.adjust_to(limit, self.rpm_max);
            limit
        } else {
            self.rpm_limited = false;
            reference
        }
    }

    fn resync_ramp(&mut self, feedback: &Feedback, rpm: Fixed) {
        match self.mode {
            ControlMode::Speed => self.ramp.adjust_to(rpm, self.rpm_max),
            ControlMode::Torque => self
                .ramp
                .adjust_to(feedback.armature_current, self.current_max),
        }
        match self.state {
            RegulatorState::Start => self.retarget_ramp(self.reference, RampKind::Start),
            RegulatorState::Run => self.retarget_ramp(self.reference, RampKind::Reference),
            _ => self.retarget_ramp(Fixed::ZERO, self.stop_kind),
        }
    }

    /// Targets held by the regulator are already inside 0..100 %, a clamp here is only logged.
    fn retarget_ramp(&mut self, percent: Fixed, kind: RampKind) {
        if self.ramp.retarget(percent, kind).is_err() {
            debug!("regulator: ramp target clamped ({})", kind);
        }
    }

    fn enter_idle(&mut self) {
        self.state = RegulatorState::Idle;
        self.ramp.reset();
        self.speed_pid.reset();
        self.current_pid.reset();
        self.excitation_pid.reset();
        self.rpm_reference = Fixed::ZERO;
        self.current_reference = Fixed::ZERO;
        self.rpm_limited = false;
        self.resync = false;
        self.output = RegulatorOutput::default();
        info!("regulator: stop -> idle");
    }

    // ############################ CONTROL SURFACE ###################################

    /// Idle (or stopping) -> Start, the ramp heads for the reference with the start rate.
    pub fn start(&mut self) {
        match self.state {
            RegulatorState::Idle | RegulatorState::Stop => {
                self.state = RegulatorState::Start;
                self.retarget_ramp(self.reference, RampKind::Start);
                info!("regulator: start");
            }
            RegulatorState::Start | RegulatorState::Run => {}
        }
    }

    /// Start/Run -> Stop with the stop rate.
    pub fn stop(&mut self) {
        match self.state {
            RegulatorState::Start | RegulatorState::Run => self.enter_stop(RampKind::Stop),
            RegulatorState::Idle | RegulatorState::Stop => {}
        }
    }

    /// Start/Run -> Stop with the fast stop rate; upgrades a running normal stop.
    pub fn fast_stop(&mut self) {
        match self.state {
            RegulatorState::Start | RegulatorState::Run => self.enter_stop(RampKind::FastStop),
            RegulatorState::Stop if self.stop_kind == RampKind::Stop => {
                self.enter_stop(RampKind::FastStop)
            }
            _ => {}
        }
    }

    fn enter_stop(&mut self, kind: RampKind) {
        self.state = RegulatorState::Stop;
        self.stop_kind = kind;
        self.retarget_ramp(Fixed::ZERO, kind);
        info!("regulator: stop ({})", kind);
    }

    /// Sets the operator reference in percent, clamped to the reference limits.
    pub fn set_reference(&mut self, percent: Fixed) -> Result<()> {
        let (reference, was_clamped) =
            clamp_report(percent, self.reference_min, self.reference_max);
        self.reference = reference;
        match self.state {
            RegulatorState::Start => self.retarget_ramp(reference, RampKind::Start),
            RegulatorState::Run => self.retarget_ramp(reference, RampKind::Reference),
            RegulatorState::Idle | RegulatorState::Stop => {}
        }
        clamped(was_clamped)
    }

    pub fn increment_reference(&mut self) -> Result<()> {
        self.set_reference(self.reference.saturating_add(self.reference_step))
    }

    pub fn decrement_reference(&mut self) -> Result<()> {
        self.set_reference(self.reference.saturating_sub(self.reference_step))
    }

    /// Sets the reference range, both bounds clamped into 0..100 %.
    pub fn set_reference_limits(&mut self, min: Fixed, max: Fixed) -> Result<()> {
        if min > max {
            return Err(DriveError::InvalidValue);
        }
        let (min, min_clamped) = clamp_report(min, Fixed::ZERO, PERCENT_100);
        let (max, max_clamped) = clamp_report(max, Fixed::ZERO, PERCENT_100);
        self.reference_min = min;
        self.reference_max = max;
        // keep the stored reference inside the new range
        if self.set_reference(self.reference).is_err() {
            debug!("regulator: reference moved into the new limits");
        }
        clamped(min_clamped || max_clamped)
    }

    pub fn set_reference_step(&mut self, step: Fixed) -> Result<()> {
        let (step, was_clamped) = clamp_report(step, Fixed::DELTA, PERCENT_100);
        self.reference_step = step;
        clamped(was_clamped)
    }

    /// Switches between speed and torque control; the speed loop restarts from rest.
    pub fn set_mode(&mut self, mode: ControlMode) {
        if mode != self.mode {
            self.mode = mode;
            self.speed_pid.reset();
            self.rpm_reference = Fixed::ZERO;
            self.rpm_limited = false;
            info!("regulator mode {}", mode);
        }
    }

    /// Enables or disables the armature loop (speed and current stages).
    pub fn set_pairs_loop_enabled(&mut self, enabled: bool) {
        if enabled == self.pairs_loop_enabled {
            return;
        }
        self.pairs_loop_enabled = enabled;
        if enabled {
            self.resync = self.state != RegulatorState::Idle;
        } else {
            self.speed_pid.reset();
            self.current_pid.reset();
            self.ramp.reset();
            self.rpm_reference = Fixed::ZERO;
            self.current_reference = Fixed::ZERO;
            self.output.pair_angle = None;
        }
    }

    pub fn set_excitation_loop_enabled(&mut self, enabled: bool) {
        if enabled == self.excitation_loop_enabled {
            return;
        }
        self.excitation_loop_enabled = enabled;
        if !enabled {
            self.excitation_pid.reset();
            self.output.excitation_angle = None;
        }
    }

    /// Sets the excitation current setpoint, clamped to `[0, excitation_current_max]`.
    pub fn set_excitation_reference(&mut self, amperes: Fixed) -> Result<()> {
        let (value, was_clamped) =
            clamp_report(amperes, Fixed::ZERO, self.excitation_current_max);
        self.excitation_current_reference = value;
        clamped(was_clamped)
    }

    pub fn set_speed_gains(&mut self, gains: PidGains) {
        self.speed_pid.set_gains(gains);
    }

    pub fn set_current_gains(&mut self, gains: PidGains) {
        self.current_pid.set_gains(gains);
    }

    pub fn set_excitation_gains(&mut self, gains: PidGains) {
        self.excitation_pid.set_gains(gains);
    }

    /// New open angle range of the bridge pairs.
    pub fn set_pair_angle_limits(&mut self, min: Fixed, max: Fixed) {
        self.current_pid.set_limits(min, max);
    }

    pub fn set_excitation_angle_limits(&mut self, min: Fixed, max: Fixed) {
        self.excitation_pid.set_limits(min, max);
    }

    pub fn set_rpm_filter_alpha(&mut self, alpha: u8) {
        self.rpm_filter.set_alpha(alpha);
    }

    // ################################ QUERIES #######################################

    pub fn state(&self) -> RegulatorState {
        self.state
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.state != RegulatorState::Idle
    }

    pub fn reference(&self) -> Fixed {
        self.reference
    }

    /// Ramp output, percent.
    pub fn ramp_reference(&self) -> Fixed {
        self.ramp.current()
    }

    pub fn rpm_reference(&self) -> Fixed {
        self.rpm_reference
    }

    pub fn current_reference(&self) -> Fixed {
        self.current_reference
    }

    pub fn filtered_rpm(&self) -> Fixed {
        self.rpm_filter.get_output()
    }

    pub fn is_rpm_limited(&self) -> bool {
        self.rpm_limited
    }

    pub fn output(&self) -> RegulatorOutput {
        self.output
    }

    pub fn pairs_loop_enabled(&self) -> bool {
        self.pairs_loop_enabled
    }

    pub fn excitation_loop_enabled(&self) -> bool {
        self.excitation_loop_enabled
    }

    pub fn ramp(&self) -> &Ramp {
        &self.ramp
    }

    /// Ramp access for rate changes.
    pub fn ramp_mut(&mut self) -> &mut Ramp {
        &mut self.ramp
    }

    pub fn overload(&self) -> &OverloadModel {
        &self.overload
    }

    pub fn overload_mut(&mut self) -> &mut OverloadModel {
        &mut self.overload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regulator(settings: RegulatorSettings) -> Regulator {
        let ramp = RampSettings {
            reference_ms: 10_000,
            start_ms: 10_000,
            stop_ms: 10_000,
            fast_stop_ms: 1_000,
        };
        Regulator::new(
            &settings,
            &ramp,
            &OverloadSettings::default(),
            (fixed_int(5), fixed_int(115)),
            (fixed_int(5), fixed_int(175)),
        )
        .unwrap()
    }

    fn feedback() -> Feedback {
        Feedback::default()
    }

    #[test]
    fn idle_produces_no_firing_angle() {
        let mut regulator = regulator(RegulatorSettings::default());
        regulator.set_reference(fixed_int(50)).unwrap();
        let output = regulator.tick(&feedback());
        assert_eq!(output.pair_angle, None);
        assert_eq!(output.excitation_angle, None);
        assert_eq!(regulator.state(), RegulatorState::Idle);
        assert_eq!(regulator.ramp_reference(), Fixed::ZERO);
    }

    #[test]
    fn speed_ramp_reaches_quarter_after_five_seconds() {
        let mut regulator = regulator(RegulatorSettings::default());
        regulator.set_reference(fixed_int(50)).unwrap();
        regulator.start();
        assert_eq!(regulator.state(), RegulatorState::Start);

        // 100 ms ticks for 5 s
        for _ in 0..50 {
            let output = regulator.tick(&feedback());
            assert!(output.pair_angle.is_some());
        }
        let step = regulator.ramp().step();
        let error = (regulator.ramp_reference() - fixed_int(25)).abs();
        assert!(error <= step);
        // 25 % of 1500 rpm
        assert_eq!(regulator.rpm_reference(), fixed_int(375));
        assert_eq!(regulator.state(), RegulatorState::Start);
    }

    #[test]
    fn start_run_stop_idle_cycle() {
        let mut regulator = regulator(RegulatorSettings::default());
        regulator.set_reference(fixed_int(10)).unwrap();
        regulator.start();
        let mut ticks = 0;
        while regulator.state() == RegulatorState::Start {
            regulator.tick(&feedback());
            ticks += 1;
            assert!(ticks <= 200);
        }
        assert_eq!(regulator.state(), RegulatorState::Run);
        assert_eq!(regulator.ramp_reference(), fixed_int(10));

        regulator.stop();
        assert_eq!(regulator.state(), RegulatorState::Stop);
        let mut output = regulator.tick(&feedback());
        while regulator.state() == RegulatorState::Stop {
            output = regulator.tick(&feedback());
            ticks += 1;
            assert!(ticks <= 400);
        }
        assert_eq!(regulator.state(), RegulatorState::Idle);
        assert_eq!(output.pair_angle, None);
        assert_eq!(regulator.rpm_reference(), Fixed::ZERO);
    }

    #[test]
    fn fast_stop_upgrades_normal_stop() {
        let mut regulator = regulator(RegulatorSettings::default());
        regulator.set_reference(fixed_int(100)).unwrap();
        regulator.start();
        for _ in 0..100 {
            regulator.tick(&feedback());
        }
        assert_eq!(regulator.state(), RegulatorState::Run);

        regulator.stop();
        regulator.stop();
        assert_eq!(regulator.ramp().kind(), RampKind::Stop);

        regulator.fast_stop();
        assert_eq!(regulator.ramp().kind(), RampKind::FastStop);
        regulator.fast_stop();
        // fast stop profile: 1 s for the whole span
        let mut ticks = 0;
        while regulator.state() != RegulatorState::Idle {
            regulator.tick(&feedback());
            ticks += 1;
        }
        assert_eq!(ticks, 10);
    }

    #[test]
    fn reference_is_clamped_and_stepped() {
        let mut settings = RegulatorSettings::default();
        settings.reference_min = fixed_int(10);
        settings.reference_max = fixed_int(90);
        let mut regulator = regulator(settings);

        assert_eq!(regulator.set_reference(fixed_int(95)), Err(DriveError::OutOfRange));
        assert_eq!(regulator.reference(), fixed_int(90));
        assert_eq!(regulator.increment_reference(), Err(DriveError::OutOfRange));
        regulator.decrement_reference().unwrap();
        assert_eq!(regulator.reference(), fixed_int(89));
        assert_eq!(regulator.set_reference(fixed_int(0)), Err(DriveError::OutOfRange));
        assert_eq!(regulator.reference(), fixed_int(10));
    }

    #[test]
    fn available_rpm_limits_the_ramp() {
        let mut regulator = regulator(RegulatorSettings::default());
        regulator.set_reference(fixed_int(100)).unwrap();
        regulator.start();
        let limited = Feedback {
            rpm_available: fixed_int(300),
            ..Feedback::default()
        };
        for _ in 0..60 {
            regulator.tick(&limited);
        }
        assert!(regulator.is_rpm_limited());
        assert_eq!(regulator.rpm_reference(), fixed_int(300));
        // 300 of 1500 rpm
        assert_eq!(regulator.ramp_reference(), fixed_int(20));
        // pinned by the limit counts as caught up
        assert_eq!(regulator.state(), RegulatorState::Run);

        regulator.set_reference(fixed_int(80)).unwrap();
        assert_eq!(regulator.ramp().kind(), RampKind::Reference);
    }

    #[test]
    fn negative_rpm_reads_as_stalled() {
        let mut settings = RegulatorSettings::default();
        settings.rpm_filter_alpha = 0;
        let mut regulator = regulator(settings);
        regulator.tick(&Feedback {
            rpm: fixed_int(-200),
            ..Feedback::default()
        });
        assert_eq!(regulator.filtered_rpm(), Fixed::ZERO);
    }

    #[test]
    fn torque_mode_scales_against_derated_ceiling() {
        let mut settings = RegulatorSettings::default();
        settings.mode = ControlMode::Torque;
        let mut regulator = regulator(settings);
        regulator.set_reference(fixed_int(50)).unwrap();
        regulator.start();
        for _ in 0..100 {
            regulator.tick(&feedback());
        }
        assert_eq!(regulator.ramp_reference(), fixed_int(50));
        // half of 15 A
        assert_eq!(regulator.current_reference(), Fixed::from_num(7.5));

        // trip the thermal model at 20 A for the full heat time
        let hot = Feedback {
            armature_current: fixed_int(20),
            ..Feedback::default()
        };
        for _ in 0..600 {
            regulator.tick(&hot);
        }
        assert!(regulator.overload().is_overloaded());
        // half of the 10 A base current
        assert_eq!(regulator.current_reference(), fixed_int(5));
    }

    #[test]
    fn more_current_demand_opens_the_bridge_wider() {
        let mut regulator = regulator(RegulatorSettings::default());
        regulator.set_reference(fixed_int(50)).unwrap();
        regulator.start();
        let first = regulator.tick(&feedback()).pair_angle.unwrap();
        let mut last = first;
        for _ in 0..20 {
            last = regulator.tick(&feedback()).pair_angle.unwrap();
        }
        assert!(first >= fixed_int(5));
        assert!(last > first);
        assert!(last <= fixed_int(115));
    }

    #[test]
    fn disabling_armature_loop_resets_ramp_and_reenabling_resyncs() {
        let mut regulator = regulator(RegulatorSettings::default());
        regulator.set_reference(fixed_int(50)).unwrap();
        regulator.start();
        for _ in 0..100 {
            regulator.tick(&feedback());
        }
        assert_eq!(regulator.state(), RegulatorState::Run);

        regulator.set_pairs_loop_enabled(false);
        assert_eq!(regulator.ramp_reference(), Fixed::ZERO);
        assert_eq!(regulator.tick(&feedback()).pair_angle, None);

        regulator.set_pairs_loop_enabled(true);
        let spinning = Feedback {
            rpm: fixed_int(600),
            ..Feedback::default()
        };
        regulator.set_rpm_filter_alpha(0);
        let output = regulator.tick(&spinning);
        assert!(output.pair_angle.is_some());
        // 600 of 1500 rpm is 40 %, plus one reference step toward 50 %
        assert!(regulator.ramp_reference() > fixed_int(40));
        assert!(regulator.ramp_reference() <= fixed_int(41));
        assert_eq!(regulator.ramp().target(), fixed_int(50));
    }

    #[test]
    fn excitation_loop_runs_while_started_and_can_be_disabled() {
        let mut regulator = regulator(RegulatorSettings::default());
        regulator.start();
        let angle = regulator.tick(&feedback()).excitation_angle.unwrap();
        assert!(angle > fixed_int(5));

        regulator.set_excitation_loop_enabled(false);
        assert_eq!(regulator.tick(&feedback()).excitation_angle, None);
        regulator.set_excitation_loop_enabled(true);
        let restarted = regulator.tick(&feedback()).excitation_angle.unwrap();
        assert_eq!(restarted, angle);
    }

    #[test]
    fn excitation_is_released_when_the_stop_completes() {
        let mut regulator = regulator(RegulatorSettings::default());
        regulator.set_reference(fixed_int(10)).unwrap();
        regulator.start();
        for _ in 0..20 {
            regulator.tick(&feedback());
        }
        regulator.stop();
        let mut output = regulator.tick(&feedback());
        assert_eq!(regulator.state(), RegulatorState::Stop);
        assert!(output.excitation_angle.is_some());
        while regulator.state() != RegulatorState::Idle {
            output = regulator.tick(&feedback());
        }
        assert_eq!(output, RegulatorOutput::default());
        assert_eq!(regulator.tick(&feedback()).excitation_angle, None);

        // the integrator starts over on the next start
        regulator.start();
        let first = regulator.tick(&feedback()).excitation_angle.unwrap();
        let mut fresh = self::regulator(RegulatorSettings::default());
        fresh.start();
        assert_eq!(first, fresh.tick(&feedback()).excitation_angle.unwrap());
    }

    #[test]
    fn limit_changes_pull_the_reference_inside() {
        let mut regulator = regulator(RegulatorSettings::default());
        regulator.set_reference(fixed_int(80)).unwrap();
        assert_eq!(regulator.set_reference_limits(fixed_int(10), fixed_int(60)), Ok(()));
        assert_eq!(regulator.reference(), fixed_int(60));
        regulator.start();
        assert_eq!(regulator.ramp().target(), fixed_int(60));
    }
}
