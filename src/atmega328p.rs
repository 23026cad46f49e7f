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

use crate::registers::Atmega328p;
use crate::timer::Timer1;

/// I/O clock of the board
#[cfg(feature = "clock-8mhz")]
pub const CLOCK_HZ: u32 = 8_000_000;
#[cfg(not(feature = "clock-8mhz"))]
pub const CLOCK_HZ: u32 = 16_000_000;

/// The chip's Timer1.
///
/// Configuration doesn't survive a reset, call [Timer1::initialize] first.
// SAFETY: the only Atmega328p handle this crate creates
pub static TIMER1: Timer1<Atmega328p> = Timer1::new(unsafe { Atmega328p::steal() }, CLOCK_HZ);

#[avr_device::interrupt(atmega328p)]
fn TIMER1_OVF() {
    TIMER1.on_overflow();
}
