#![no_std]

// STM32G431 drivers of the thyristor drive: compare timers behind the firing scheduler's
// timer seam, gate output lines, the regulation tick timer and the board pinout.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

pub mod firing_timer;
pub mod gate;
pub mod pinout;
pub mod tick;
