// General purpose timers used as firing timers.
//
// The counter runs at the firing tick rate from the zero-crossing event. Channel 1 compares
// on the opening edge and channel 2 on the closing edge of the gate window; both are in
// frozen mode since the gates are plain GPIO lines driven by the interrupt handlers.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use hal::{
    clocks::Clocks,
    pac::{TIM2, TIM3, TIM4},
    timer::{
        Alignment, CaptureCompareDma, CountDir, OutputCompare, TimChannel, Timer, TimerConfig,
        TimerInterrupt, UpdateReqSrc,
    },
};
use scrdrive_algo::firing::{Compare, FiringTimer, COUNTER_MAX};

// Counter top is one full 16 bit period (65 ms at 1 MHz). Timings whose compares would
// exceed it are refused when the firing configuration is built.

fn timer_config() -> TimerConfig {
    TimerConfig {
        one_pulse_mode: false,
        update_request_source: UpdateReqSrc::Any,
        // compares are rewritten while counting and must apply at once
        auto_reload_preload: false,
        alignment: Alignment::Edge,
        capture_compare_dma: CaptureCompareDma::Update,
        direction: CountDir::Up,
    }
}

#[inline(always)]
fn channel(compare: Compare) -> TimChannel {
    match compare {
        Compare::Open => TimChannel::C1,
        Compare::Close => TimChannel::C2,
    }
}

#[inline(always)]
fn interrupt(compare: Compare) -> TimerInterrupt {
    match compare {
        Compare::Open => TimerInterrupt::CaptureCompare1,
        Compare::Close => TimerInterrupt::CaptureCompare2,
    }
}

macro_rules! firing_tim {
    ($name:ident, $TIM:ident, $new:ident) => {
        pub struct $name {
            tim: Timer<$TIM>,
            close: u32,
        }

        impl $name {
            /// Configures the timer stopped, counting at `tick_hz`.
            pub fn new(regs: $TIM, clock_cfg: &Clocks, tick_hz: u32) -> Self {
                let mut tim = Timer::$new(regs, 1_000., timer_config(), clock_cfg);
                let psc = (clock_cfg.apb1_timer() / tick_hz).saturating_sub(1);
                tim.set_prescaler(psc as u16);
                tim.set_auto_reload(COUNTER_MAX);
                tim.set_output_compare(TimChannel::C1, OutputCompare::Frozen);
                tim.set_output_compare(TimChannel::C2, OutputCompare::Frozen);
                tim.disable();
                tim.reset_count();
                Self { tim, close: 0 }
            }

            /// Acknowledges the pending compare interrupt and reports which edge fired.
            ///
            /// The closing compare is the later one, so a counter at or past it means the
            /// closing edge, including when both flags are pending after a late service.
            pub fn take_compare(&mut self) -> Compare {
                self.tim.clear_interrupt(TimerInterrupt::CaptureCompare1);
                self.tim.clear_interrupt(TimerInterrupt::CaptureCompare2);
                if self.tim.read_count() as u32 >= self.close {
                    Compare::Close
                } else {
                    Compare::Open
                }
            }
        }

        impl FiringTimer for $name {
            fn stop(&mut self) {
                self.tim.disable();
                self.tim.disable_interrupt(TimerInterrupt::CaptureCompare1);
                self.tim.disable_interrupt(TimerInterrupt::CaptureCompare2);
            }

            fn reset(&mut self) {
                self.tim.reset_count();
            }

            fn set_compare(&mut self, compare: Compare, ticks: u32) {
                let ticks = ticks.min(COUNTER_MAX);
                if compare == Compare::Close {
                    self.close = ticks;
                }
                self.tim.set_duty(channel(compare), ticks as _);
            }

            fn listen(&mut self) {
                for compare in [Compare::Open, Compare::Close] {
                    self.tim.clear_interrupt(interrupt(compare));
                    self.tim.enable_interrupt(interrupt(compare));
                }
            }

            fn start(&mut self) {
                self.tim.enable();
            }

            fn is_running(&self) -> bool {
                self.tim.is_enabled()
            }
        }
    };
}

firing_tim!(CompareTim2, TIM2, new_tim2);
firing_tim!(CompareTim3, TIM3, new_tim3);
firing_tim!(CompareTim4, TIM4, new_tim4);

/// The scheduler takes all three firing timers as one type.
pub enum FiringTim {
    Tim2(CompareTim2),
    Tim3(CompareTim3),
    Tim4(CompareTim4),
}

macro_rules! delegate {
    ($self:ident, $tim:ident => $body:expr) => {
        match $self {
            FiringTim::Tim2($tim) => $body,
            FiringTim::Tim3($tim) => $body,
            FiringTim::Tim4($tim) => $body,
        }
    };
}

impl FiringTim {
    pub fn take_compare(&mut self) -> Compare {
        delegate!(self, tim => tim.take_compare())
    }
}

impl FiringTimer for FiringTim {
    fn stop(&mut self) {
        delegate!(self, tim => tim.stop())
    }

    fn reset(&mut self) {
        delegate!(self, tim => tim.reset())
    }

    fn set_compare(&mut self, compare: Compare, ticks: u32) {
        delegate!(self, tim => tim.set_compare(compare, ticks))
    }

    fn listen(&mut self) {
        delegate!(self, tim => tim.listen())
    }

    fn start(&mut self) {
        delegate!(self, tim => tim.start())
    }

    fn is_running(&self) -> bool {
        delegate!(self, tim => tim.is_running())
    }
}
