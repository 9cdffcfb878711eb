pub mod angle2ticks;
pub mod config;
pub mod gates;
pub mod link;
pub mod scheduler;
pub mod sequence;
pub mod timer;
pub mod zero_cross;

#[cfg(test)]
pub(crate) mod mock;

pub use config::{ChannelConfig, FiringConfig, PulseTrain, TimerTiming};
pub use gates::{GateBank, GatePin, Triac, TriacPair};
pub use link::{FiringAngle, FiringCommand, FiringLink};
pub use scheduler::{
    CommutationEvent, ExcitationMode, FiringScheduler, NoObserver, PairObserver, TimerSlot,
};
pub use sequence::{select_pair, Direction, Phase, ThyristorPair};
pub use timer::{Compare, FiringTimer, COUNTER_MAX};
pub use zero_cross::ZeroCrossTracker;
