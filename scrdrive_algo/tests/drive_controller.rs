use scrdrive_algo::firing::gates::{GateBank, GatePin};
use scrdrive_algo::firing::link::FiringLink;
use scrdrive_algo::firing::scheduler::{CommutationEvent, NoObserver};
use scrdrive_algo::firing::sequence::{Direction, Phase, ThyristorPair};
use scrdrive_algo::firing::timer::{Compare, FiringTimer};
use scrdrive_algo::math_fixed::Fixed;
use scrdrive_algo::regulator::{Feedback, RegulatorState};
use scrdrive_algo::settings::DriveSettings;
use scrdrive_algo::{Channel, DriveController, DriveError};

#[derive(Default)]
struct Timer {
    running: bool,
    open: u32,
    close: u32,
}

impl FiringTimer for Timer {
    fn stop(&mut self) {
        self.running = false;
    }
    fn reset(&mut self) {}
    fn set_compare(&mut self, compare: Compare, ticks: u32) {
        match compare {
            Compare::Open => self.open = ticks,
            Compare::Close => self.close = ticks,
        }
    }
    fn listen(&mut self) {}
    fn start(&mut self) {
        self.running = true;
    }
    fn is_running(&self) -> bool {
        self.running
    }
}

#[derive(Default)]
struct Pin {
    high: bool,
}

impl GatePin for Pin {
    fn set_high(&mut self) {
        self.high = true;
    }
    fn set_low(&mut self) {
        self.high = false;
    }
}

fn gates() -> GateBank<Pin> {
    GateBank::new(Default::default(), Pin::default())
}

fn timers() -> ([Timer; 2], Timer) {
    (Default::default(), Timer::default())
}

fn percent(value: i32) -> Fixed {
    Fixed::from_num(value)
}

fn event(phase: Phase, last: Phase) -> CommutationEvent {
    CommutationEvent {
        phase,
        last_fired_phase: last,
        direction: Direction::Forward,
        latency_offset: 50,
    }
}

/// Forward rotation: A, A, B, B, C, C, ...
const SECTORS: [(Phase, Phase); 6] = [
    (Phase::A, Phase::C),
    (Phase::A, Phase::A),
    (Phase::B, Phase::A),
    (Phase::B, Phase::B),
    (Phase::C, Phase::B),
    (Phase::C, Phase::C),
];

#[test]
fn idle_drive_never_fires() {
    let link = FiringLink::new();
    let (pair_timers, excitation_timer) = timers();
    let mut drive = DriveController::new(
        &DriveSettings::default(),
        &link,
        pair_timers,
        excitation_timer,
        gates(),
        NoObserver,
    )
    .unwrap();

    drive.regulation_tick(&Feedback::default());
    assert_eq!(link.load().pairs, None);
    assert_eq!(drive.on_commutation(event(Phase::A, Phase::C)), Ok(None));
}

#[test]
fn running_drive_fires_pairs_in_sequence() {
    let link = FiringLink::new();
    let (pair_timers, excitation_timer) = timers();
    let mut opened = Vec::new();
    {
        let mut drive = DriveController::new(
            &DriveSettings::default(),
            &link,
            pair_timers,
            excitation_timer,
            gates(),
            |pair: ThyristorPair| opened.push(pair),
        )
        .unwrap();
        drive.set_reference(percent(50)).unwrap();
        drive.start();

        for _ in 0..10 {
            drive.regulation_tick(&Feedback::default());
        }
        let committed = link.load().pairs.unwrap();
        assert!(committed.degrees >= percent(5));
        assert!(committed.degrees <= percent(115));

        for (phase, last) in SECTORS {
            let slot = drive.on_commutation(event(phase, last)).unwrap().unwrap();
            drive.on_pair_compare(slot, Compare::Open);
            assert!(drive.scheduler().gates().any_bridge_open());
            drive.on_pair_compare(slot, Compare::Close);
            assert!(!drive.scheduler().gates().any_bridge_open());
        }

        let telemetry = drive.telemetry();
        assert_eq!(telemetry.state, RegulatorState::Start);
        assert!(telemetry.flags.running());
        assert!(telemetry.flags.pairs_enabled());
        assert_eq!(telemetry.last_opened_pair, Some(ThyristorPair::T1T6));
    }
    assert_eq!(
        opened,
        [
            ThyristorPair::T3T6,
            ThyristorPair::T3T2,
            ThyristorPair::T5T2,
            ThyristorPair::T5T4,
            ThyristorPair::T1T4,
            ThyristorPair::T1T6,
        ]
    );
}

#[test]
fn committed_angle_is_picked_up_at_the_next_commutation_only() {
    let link = FiringLink::new();
    let (pair_timers, excitation_timer) = timers();
    let mut drive = DriveController::new(
        &DriveSettings::default(),
        &link,
        pair_timers,
        excitation_timer,
        gates(),
        NoObserver,
    )
    .unwrap();
    drive.set_reference(percent(100)).unwrap();
    drive.start();
    drive.regulation_tick(&Feedback::default());

    let slot = drive.on_commutation(event(Phase::A, Phase::C)).unwrap().unwrap();
    let programmed = drive.scheduler().slot(slot).unwrap().window();

    for _ in 0..20 {
        drive.regulation_tick(&Feedback::default());
    }
    // the armed window keeps its compares
    assert_eq!(drive.scheduler().slot(slot).unwrap().window(), programmed);
    assert_eq!(drive.scheduler().slot(slot).unwrap().timer().open, programmed.open);

    let next = drive.on_commutation(event(Phase::A, Phase::A)).unwrap().unwrap();
    assert_ne!(next, slot);
    // more demand, wider angle, earlier opening edge
    assert!(drive.scheduler().slot(next).unwrap().window().open < programmed.open);
}

#[test]
fn disabling_pairs_stops_scheduling_and_resets_ramp() {
    let link = FiringLink::new();
    let (pair_timers, excitation_timer) = timers();
    let mut drive = DriveController::new(
        &DriveSettings::default(),
        &link,
        pair_timers,
        excitation_timer,
        gates(),
        NoObserver,
    )
    .unwrap();
    drive.set_reference(percent(50)).unwrap();
    drive.start();
    for _ in 0..5 {
        drive.regulation_tick(&Feedback::default());
    }

    drive.set_pairs_enabled(false);
    drive.regulation_tick(&Feedback::default());
    assert_eq!(link.load().pairs, None);
    assert_eq!(drive.on_commutation(event(Phase::A, Phase::C)), Ok(None));
    let telemetry = drive.telemetry();
    assert!(!telemetry.flags.pairs_enabled());
    assert_eq!(telemetry.ramp_reference, Fixed::ZERO);
}

#[test]
fn triacs_stop_forces_everything_low() {
    let link = FiringLink::new();
    let (pair_timers, excitation_timer) = timers();
    let mut drive = DriveController::new(
        &DriveSettings::default(),
        &link,
        pair_timers,
        excitation_timer,
        gates(),
        NoObserver,
    )
    .unwrap();
    drive.set_reference(percent(50)).unwrap();
    drive.start();
    drive.regulation_tick(&Feedback::default());

    let slot = drive.on_commutation(event(Phase::A, Phase::C)).unwrap().unwrap();
    drive.on_pair_compare(slot, Compare::Open);
    drive.on_excitation_compare(Compare::Open);
    assert!(drive.scheduler().gates().is_excitation_open());

    drive.drive_triacs_stop();
    assert!(!drive.scheduler().gates().any_bridge_open());
    assert!(!drive.scheduler().gates().is_excitation_open());
    assert!(!drive.scheduler().slot(slot).unwrap().timer().running);
    assert_eq!(link.load().pairs, None);
    assert!(!link.pairs_enabled());
    assert!(!link.excitation_enabled());
}

#[test]
fn fault_stop_stays_latched_across_regulation_ticks() {
    let link = FiringLink::new();
    let (pair_timers, excitation_timer) = timers();
    let mut drive = DriveController::new(
        &DriveSettings::default(),
        &link,
        pair_timers,
        excitation_timer,
        gates(),
        NoObserver,
    )
    .unwrap();
    drive.set_reference(percent(50)).unwrap();
    drive.start();
    for _ in 0..10 {
        drive.regulation_tick(&Feedback::default());
    }

    drive.fast_stop();
    drive.drive_triacs_stop();
    for _ in 0..3 {
        drive.regulation_tick(&Feedback::default());
        assert_eq!(link.load().pairs, None);
        assert_eq!(link.load().excitation, None);
        for (phase, last) in SECTORS {
            assert_eq!(drive.on_commutation(event(phase, last)), Ok(None));
        }
        drive.on_excitation_compare(Compare::Open);
        assert!(!drive.scheduler().gates().any_bridge_open());
        assert!(!drive.scheduler().gates().is_excitation_open());
    }
    assert_eq!(drive.regulator().state(), RegulatorState::Idle);
    let telemetry = drive.telemetry();
    assert!(!telemetry.flags.pairs_enabled());
    assert!(!telemetry.flags.excitation_enabled());

    // an explicit re-enable and start bring firing back
    drive.restore_outputs();
    drive.start();
    drive.regulation_tick(&Feedback::default());
    assert!(drive.on_commutation(event(Phase::A, Phase::C)).unwrap().is_some());
}

#[test]
fn pairs_disabled_in_settings_can_be_enabled_at_runtime() {
    let link = FiringLink::new();
    let (pair_timers, excitation_timer) = timers();
    let mut settings = DriveSettings::default();
    settings.firing.pairs.enabled = false;
    let mut drive = DriveController::new(
        &settings,
        &link,
        pair_timers,
        excitation_timer,
        gates(),
        NoObserver,
    )
    .unwrap();
    assert!(!link.pairs_enabled());

    drive.set_pairs_enabled(true);
    drive.set_reference(percent(50)).unwrap();
    drive.start();
    for _ in 0..10 {
        drive.regulation_tick(&Feedback::default());
    }
    let slot = drive.on_commutation(event(Phase::A, Phase::C)).unwrap().unwrap();
    drive.on_pair_compare(slot, Compare::Open);
    assert!(drive.scheduler().gates().any_bridge_open());
}

#[test]
fn excitation_is_not_fired_while_idle() {
    let link = FiringLink::new();
    let (pair_timers, excitation_timer) = timers();
    let mut drive = DriveController::new(
        &DriveSettings::default(),
        &link,
        pair_timers,
        excitation_timer,
        gates(),
        NoObserver,
    )
    .unwrap();
    drive.regulation_tick(&Feedback::default());
    assert_eq!(link.load().excitation, None);

    drive.on_commutation(event(Phase::A, Phase::C)).unwrap();
    assert!(!drive.scheduler().excitation_slot().is_armed());
    drive.on_excitation_compare(Compare::Open);
    assert!(!drive.scheduler().gates().is_excitation_open());
}

#[test]
fn angle_limits_follow_into_the_regulator() {
    let link = FiringLink::new();
    let (pair_timers, excitation_timer) = timers();
    let mut drive = DriveController::new(
        &DriveSettings::default(),
        &link,
        pair_timers,
        excitation_timer,
        gates(),
        NoObserver,
    )
    .unwrap();
    assert_eq!(
        drive.set_angle_limits(Channel::Pairs, percent(30), percent(130)),
        Err(DriveError::OutOfRange)
    );
    assert_eq!(
        drive.set_angle_limits(Channel::Pairs, percent(60), percent(30)),
        Err(DriveError::InvalidValue)
    );
    drive.start();
    let angle = drive.regulation_tick(&Feedback::default()).pair_angle.unwrap();
    assert!(angle >= percent(30));
    assert!(angle <= percent(120));
}

#[test]
fn refused_settings_abort_construction() {
    let link = FiringLink::new();
    let (pair_timers, excitation_timer) = timers();
    let mut settings = DriveSettings::default();
    settings.overload.period_ms = settings.overload.heat_time_ms;
    let drive = DriveController::new(
        &settings,
        &link,
        pair_timers,
        excitation_timer,
        gates(),
        NoObserver,
    );
    assert!(matches!(drive, Err(DriveError::InvalidValue)));
}
