// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Interrupt and PWM driver for the 16-bit Timer1 on ATmega168/328
//!
//! The counter runs in phase and frequency correct PWM mode: it counts
//! up from zero to a programmable top value, back down to zero, and raises
//! the overflow interrupt at the bottom. On top of that the driver offers
//! - a periodic callback ([Timer1::attach_interrupt]),
//! - two PWM outputs sharing the period ([Timer1::pwm]),
//! - sub-tick elapsed time within the current period ([Timer1::read]).
//!
//! All hardware access goes through the [Registers] trait. On the real
//! chip that is [Atmega328p]; on a host, [sim::SimulatedTimer1].
//!
//! Basic usage:
//! ```
//! # use timerone::{sim::SimulatedTimer1, Timer1};
//! fn blink() {}
//! // regs: something that implements Registers
//! let regs = SimulatedTimer1::new();
//! let timer = Timer1::new(&regs, 16_000_000);
//! timer.initialize(100_000); // 100ms period
//! timer.attach_interrupt(blink, None);
//! timer.pwm(9, 512, None).ok(); // 50% duty on pin 9
//! let _elapsed_us = timer.read();
//! ```
//!
//! With the `atmega328p` feature, a ready made [TIMER1] instance bound to
//! the memory-mapped registers is provided, together with the overflow
//! interrupt vector that forwards into it.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "atmega328p", feature(abi_avr_interrupt))]

#[cfg(feature = "defmt")]
pub(crate) use defmt::{debug, trace, warn};
#[cfg(not(feature = "defmt"))]
pub(crate) use log::{debug, trace, warn};

pub mod errors;
pub mod guard;
mod period;
mod pwm;
pub mod registers;
pub mod sim;
mod timer;

#[cfg(feature = "atmega328p")]
mod atmega328p;

pub use errors::Error;
pub use period::{ClockSelect, Period, TimerConfig, RESOLUTION};
pub use pwm::Channel;
pub use registers::{Atmega328p, Registers};
pub use timer::Timer1;

#[cfg(feature = "atmega328p")]
pub use atmega328p::{CLOCK_HZ, TIMER1};
