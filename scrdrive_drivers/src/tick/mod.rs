use hal::{
    clocks::Clocks,
    pac::TIM6,
    timer::{
        Alignment, CaptureCompareDma, CountDir, Timer, TimerConfig, TimerInterrupt, UpdateReqSrc,
    },
};

/// Periodic update interrupt pacing the regulation tick.
pub struct TickTimer {
    tim: Timer<TIM6>,
}

impl TickTimer {
    pub fn new(tim6: TIM6, clock_cfg: &Clocks, period_ms: u32) -> Self {
        let freq = 1_000. / period_ms.max(1) as f32;
        let mut timer = Timer::new_tim6(
            tim6,
            freq,
            TimerConfig {
                one_pulse_mode: false,
                update_request_source: UpdateReqSrc::Any,
                auto_reload_preload: true,
                alignment: Alignment::Edge,
                capture_compare_dma: CaptureCompareDma::Update,
                direction: CountDir::Up,
            },
            clock_cfg,
        );
        timer.enable_interrupt(TimerInterrupt::Update);
        TickTimer { tim: timer }
    }

    pub fn begin(&mut self) {
        self.tim.enable();
    }

    /// Clears the update flag; call first in the interrupt handler.
    pub fn acknowledge(&mut self) {
        self.tim.clear_interrupt(TimerInterrupt::Update);
    }
}
