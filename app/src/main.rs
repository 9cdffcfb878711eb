#![no_main]
#![no_std]

use defmt_rtt as _;
use panic_probe as _;

use hal::{
    self,
    adc::{Adc, AdcDevice, AdcInterrupt, Align, InputType, SampleTime},
    clocks::Clocks,
    dma,
    dma::{Dma, DmaChannel, DmaInput, DmaInterrupt, DmaPeriph},
    gpio::{self, Edge, Pull},
    pac,
    pac::{ADC1, DMA1},
};

use scrdrive_algo::{
    feedback::DriveFeedback,
    firing::{FiringLink, FiringScheduler, Phase, PairObserver, ThyristorPair, ZeroCrossTracker},
    math_fixed::{fixed_int, mul_div, Fixed},
    settings::DriveSettings,
    DriveController, DriveRegulation,
};
use scrdrive_drivers::{
    firing_timer::{CompareTim2, CompareTim3, CompareTim4, FiringTim},
    gate::{init_gate_bank, GateLine},
    pinout,
    tick::TickTimer,
};

use cortex_m;

/// Command hand-over between the regulation task and the firing interrupts.
static LINK: FiringLink = FiringLink::new();

/// Zero-cross comparator delay, firing timer ticks.
const ZERO_CROSS_LATENCY: i32 = 50;
/// Reference applied at power-up, percent.
const STARTUP_REFERENCE: i32 = 50;
/// Telemetry is logged every this many regulation ticks.
const TELEMETRY_EVERY: u32 = 10;

// Full scale of the analog inputs, 12 bit left-aligned samples.
const ARMATURE_VOLTAGE_FS: Fixed = fixed_int(500);
const ARMATURE_CURRENT_FS: Fixed = fixed_int(25);
const EXCITATION_CURRENT_FS: Fixed = fixed_int(4);
/// Tachogenerator is bipolar, mid-scale is standstill.
const TACHO_FS: Fixed = fixed_int(2000);
const SAMPLE_SPAN: i32 = 1 << 16;

const SAMPLING_COUNT: usize = 4;
const ADC1_SEQUENCE: [u8; SAMPLING_COUNT] = [
    pinout::analog::CH_ARMATURE_VOLTAGE,
    pinout::analog::CH_ARMATURE_CURRENT,
    pinout::analog::CH_EXCITATION_CURRENT,
    pinout::analog::CH_TACHO,
];

static mut ADC_READ_BUF: [u16; SAMPLING_COUNT] = [0; SAMPLING_COUNT];

/// Logs every confirmed conduction.
pub struct ConductionLog;

impl PairObserver for ConductionLog {
    fn pair_opened(&mut self, pair: ThyristorPair) {
        defmt::trace!("DRIVE: conducting {}", pair);
    }
}

type Firing = FiringScheduler<'static, FiringTim, GateLine, ConductionLog>;
type Regulation = DriveRegulation<'static>;

fn scale(raw: u16, full_scale: Fixed) -> Fixed {
    mul_div(full_scale, raw as i32, SAMPLE_SPAN)
}

#[rtic::app(device = pac, peripherals = true, dispatchers = [TIM7, SPI2])]
mod app {
    use super::*;

    // The two halves of the drive only meet through `LINK`, so the priority 3 firing
    // interrupts never wait on a regulation tick.
    #[shared]
    struct Shared {
        firing: Firing,
        regulation: Regulation,
        tracker: ZeroCrossTracker,
        feedback: DriveFeedback,
    }

    #[local]
    struct Local {
        tick: TickTimer,
        dma1: Dma<DMA1>,
        adc1: Adc<ADC1>,
        ticks: u32,
    }

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local) {
        let dp = ctx.device;
        let clock_cfg = Clocks::default();
        clock_cfg.setup().unwrap();

        let sysclk_freq = clock_cfg.sysclk(); // System clock frequency in Hz
        defmt::debug!("SYSTEM: Clock frequency is {} MHz", sysclk_freq / 1000000);

        let settings = DriveSettings::default();
        let tick_hz = settings.timing.tick_hz;

        let pair_timers = [
            FiringTim::Tim3(CompareTim3::new(dp.TIM3, &clock_cfg, tick_hz)),
            FiringTim::Tim4(CompareTim4::new(dp.TIM4, &clock_cfg, tick_hz)),
        ];
        let excitation_timer = FiringTim::Tim2(CompareTim2::new(dp.TIM2, &clock_cfg, tick_hz));

        let drive = match DriveController::new(
            &settings,
            &LINK,
            pair_timers,
            excitation_timer,
            init_gate_bank(),
            ConductionLog,
        ) {
            Ok(drive) => drive,
            Err(err) => defmt::panic!("DRIVE: settings refused: {}", err),
        };
        let (mut regulation, firing) = drive.into_parts();
        if let Err(err) = regulation.set_reference(fixed_int(STARTUP_REFERENCE)) {
            defmt::warn!("DRIVE: startup reference {}", err);
        }

        init_zero_cross_inputs();
        init_control_inputs();

        let dma1 = Dma::new(dp.DMA1);
        dma::enable_mux1();
        dma::mux(DmaPeriph::Dma1, DmaChannel::C1, DmaInput::Adc1);
        let adc1 = init_adc(dp.ADC1, &clock_cfg);

        let mut tick = TickTimer::new(dp.TIM6, &clock_cfg, settings.regulator.tick_ms);
        tick.begin();

        (
            Shared {
                firing,
                regulation,
                tracker: ZeroCrossTracker::new(ZERO_CROSS_LATENCY),
                feedback: DriveFeedback::new(),
            },
            Local {
                tick,
                dma1,
                adc1,
                ticks: 0,
            },
        )
    }

    // Initialization functions
    // -------------------------

    fn init_zero_cross_inputs() {
        for def in [
            pinout::zero_cross::PHASE_A,
            pinout::zero_cross::PHASE_B,
            pinout::zero_cross::PHASE_C,
        ] {
            let mut pin = def.init();
            pin.enable_interrupt(Edge::Rising);
        }
    }

    fn init_control_inputs() {
        for def in [pinout::controls::START_STOP, pinout::controls::FAULT] {
            let mut pin = def.init();
            pin.pull(Pull::Up);
            pin.enable_interrupt(Edge::Falling);
        }
    }

    fn init_adc(adc1: ADC1, clock_cfg: &Clocks) -> Adc<ADC1> {
        for def in pinout::analog::INPUTS {
            def.init();
        }

        let mut adc = Adc::new_adc1(adc1, AdcDevice::One, Default::default(), clock_cfg.systick());
        for (i, channel) in ADC1_SEQUENCE.iter().enumerate() {
            adc.set_sequence(*channel, i as u8 + 1);
            adc.set_input_type(*channel, InputType::SingleEnded);
            adc.set_sample_time(*channel, SampleTime::T2);
        }
        adc.set_sequence_len(SAMPLING_COUNT as u8);
        adc.set_align(Align::Left);
        adc.enable_interrupt(AdcInterrupt::EndOfSequence);
        adc
    }

    // Zero-crossing inputs
    // -------------------------

    fn on_zero_cross(
        phase: Phase,
        mut tracker: impl rtic::Mutex<T = ZeroCrossTracker>,
        mut firing: impl rtic::Mutex<T = Firing>,
    ) {
        let event = tracker.lock(|tracker| tracker.on_edge(phase));
        firing.lock(|firing| {
            if let Err(err) = firing.on_commutation(event) {
                defmt::trace!("FIRING: sector skipped, {}", err);
            }
        });
    }

    #[task(binds = EXTI0, shared = [tracker, firing], priority = 3)]
    fn zero_cross_a(cx: zero_cross_a::Context) {
        gpio::clear_exti_interrupt(pinout::zero_cross::PHASE_A.line());
        on_zero_cross(Phase::A, cx.shared.tracker, cx.shared.firing);
    }

    #[task(binds = EXTI1, shared = [tracker, firing], priority = 3)]
    fn zero_cross_b(cx: zero_cross_b::Context) {
        gpio::clear_exti_interrupt(pinout::zero_cross::PHASE_B.line());
        on_zero_cross(Phase::B, cx.shared.tracker, cx.shared.firing);
    }

    #[task(binds = EXTI2, shared = [tracker, firing], priority = 3)]
    fn zero_cross_c(cx: zero_cross_c::Context) {
        gpio::clear_exti_interrupt(pinout::zero_cross::PHASE_C.line());
        on_zero_cross(Phase::C, cx.shared.tracker, cx.shared.firing);
    }

    // Firing timers
    // -------------------------

    fn pair_compare(firing: &mut Firing, slot: usize) {
        let Some(timer) = firing.pair_timer_mut(slot) else {
            return;
        };
        let compare = timer.take_compare();
        firing.on_pair_compare(slot, compare);
    }

    #[task(binds = TIM3, shared = [firing], priority = 3)]
    fn pair_timer_0(mut cx: pair_timer_0::Context) {
        cx.shared.firing.lock(|firing| pair_compare(firing, 0));
    }

    #[task(binds = TIM4, shared = [firing], priority = 3)]
    fn pair_timer_1(mut cx: pair_timer_1::Context) {
        cx.shared.firing.lock(|firing| pair_compare(firing, 1));
    }

    #[task(binds = TIM2, shared = [firing], priority = 3)]
    fn excitation_timer(mut cx: excitation_timer::Context) {
        cx.shared.firing.lock(|firing| {
            let compare = firing.excitation_timer_mut().take_compare();
            firing.on_excitation_compare(compare);
        });
    }

    // Operator and protection inputs
    // -------------------------

    #[task(binds = EXTI9_5, shared = [regulation], priority = 2)]
    fn start_stop(mut cx: start_stop::Context) {
        gpio::clear_exti_interrupt(pinout::controls::START_STOP.line());
        cx.shared.regulation.lock(|regulation| {
            if regulation.regulator().is_running() {
                defmt::info!("DRIVE: stop requested");
                regulation.stop();
            } else {
                // a start also clears a latched fault stop
                defmt::info!("DRIVE: start requested");
                regulation.restore_outputs();
                regulation.start();
            }
        });
    }

    /// Releases the gates at once and latches both outputs off in the link; the regulator
    /// is brought down from a lower priority.
    #[task(binds = EXTI15_10, shared = [tracker, firing], priority = 3)]
    fn fault(mut cx: fault::Context) {
        gpio::clear_exti_interrupt(pinout::controls::FAULT.line());
        defmt::error!("DRIVE: protection fault, gates released");
        cx.shared.firing.lock(|firing| firing.drive_triacs_stop());
        cx.shared.tracker.lock(|tracker| tracker.reset());
        fault_stop::spawn().ok();
    }

    #[task(priority = 2, shared = [regulation])]
    async fn fault_stop(mut cx: fault_stop::Context) {
        cx.shared.regulation.lock(|regulation| {
            regulation.fast_stop();
            regulation.release();
        });
    }

    // Regulation
    // -------------------------

    #[task(binds = TIM6_DACUNDER, local = [tick, adc1], priority = 2)]
    fn regulation_period(cx: regulation_period::Context) {
        cx.local.tick.acknowledge();
        unsafe {
            cx.local.adc1.read_dma(
                &mut ADC_READ_BUF,
                &ADC1_SEQUENCE,
                DmaChannel::C1,
                Default::default(),
                DmaPeriph::Dma1,
            )
        };
    }

    #[task(binds = DMA1_CH1, shared = [feedback], local = [dma1], priority = 2)]
    fn adc_end_read(mut cx: adc_end_read::Context) {
        dma::clear_interrupt(
            DmaPeriph::Dma1,
            DmaChannel::C1,
            DmaInterrupt::TransferComplete,
        );
        cx.local.dma1.stop(DmaChannel::C1);

        let buf = unsafe { ADC_READ_BUF };
        let updated = cx.shared.feedback.lock(|feedback| {
            feedback.set_armature_voltage(scale(buf[0], ARMATURE_VOLTAGE_FS));
            feedback.set_armature_current(scale(buf[1], ARMATURE_CURRENT_FS));
            feedback.set_excitation_current(scale(buf[2], EXCITATION_CURRENT_FS));
            // no speed ceiling is reported by this board
            let rpm = scale(buf[3], TACHO_FS * 2) - TACHO_FS;
            feedback.set_speed(rpm, Fixed::ZERO);
            feedback.is_updated()
        });
        if updated {
            regulation_tick::spawn().ok();
        }
    }

    #[task(priority = 1, shared = [regulation, feedback], local = [ticks])]
    async fn regulation_tick(mut cx: regulation_tick::Context) {
        let data = cx.shared.feedback.lock(|feedback| feedback.get_data());
        let telemetry = cx.shared.regulation.lock(|regulation| {
            regulation.regulation_tick(&data);
            regulation.telemetry()
        });

        *cx.local.ticks = cx.local.ticks.wrapping_add(1);
        if *cx.local.ticks % TELEMETRY_EVERY == 0 {
            defmt::info!(
                "DRIVE: {} {} ramp {}% rpm ref {} current ref {} A heat {}% flags {=u8:b}",
                telemetry.state,
                telemetry.mode,
                telemetry.ramp_reference.to_num::<i32>(),
                telemetry.rpm_reference.to_num::<i32>(),
                telemetry.current_reference.to_num::<i32>(),
                telemetry.heat_percent,
                telemetry.flags.bits(),
            );
        }
    }
}

#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}
