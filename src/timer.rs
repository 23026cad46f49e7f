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

use core::cell::Cell;

use critical_section::Mutex;

use crate::guard::atomic;
use crate::period::{Period, TimerConfig};
use crate::registers::{
    Reg16, Reg8, Registers, CS_MASK, PSRSYNC_BIT, TOIE1_BIT, TOV1_BIT, WGM13_BIT,
};
use crate::{debug, trace, warn};

/// Period the driver assumes until told otherwise
const DEFAULT_PERIOD_US: u32 = 1_000_000;

/// Timer1 driver.
///
/// Every method takes `&self`, so one instance can sit in a `static` and be
/// shared between the program and the overflow interrupt, which must call
/// [Timer1::on_overflow].
///
/// The run state is never cached: the counter is running exactly when a
/// clock select bit is set in TCCR1B.
///
/// Until a period is committed the hardware is left alone. Anything that
/// would start the clock first commits the default 1 s period through
/// [Timer1::initialize], so the counter never runs in the reset mode.
pub struct Timer1<R: Registers> {
    regs: R,
    clock_hz: u32,
    // None until the mode and a period were written to the hardware
    config: Mutex<Cell<Option<TimerConfig>>>,
    callback: Mutex<Cell<Option<fn()>>>,
}

impl<R: Registers> Timer1<R> {
    /// Creates the driver. Doesn't touch the hardware.
    ///
    /// # Arguments
    ///
    /// * `regs` - The Timer1 register block
    /// * `clock_hz` - The I/O clock feeding the prescaler, typically F_CPU
    pub const fn new(regs: R, clock_hz: u32) -> Self {
        Self {
            regs,
            clock_hz,
            config: Mutex::new(Cell::new(None)),
            callback: Mutex::new(Cell::new(None)),
        }
    }

    pub fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    /// The committed prescaler and top value, or the default period's if
    /// none was committed yet
    pub fn config(&self) -> TimerConfig {
        atomic(|cs| self.config.borrow(cs).get())
            .unwrap_or(TimerConfig::from_period(self.clock_hz, DEFAULT_PERIOD_US).config())
    }

    /// Whether the mode and a period have been written to the hardware
    pub fn is_initialized(&self) -> bool {
        atomic(|cs| self.config.borrow(cs).get()).is_some()
    }

    /// The committed configuration, committing the default period first if
    /// there is none
    pub(crate) fn committed_config(&self) -> TimerConfig {
        match atomic(|cs| self.config.borrow(cs).get()) {
            Some(config) => config,
            None => {
                debug!("Not initialized, using the default period");
                self.initialize(DEFAULT_PERIOD_US).config()
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.regs.read8(Reg8::Tccr1b) & CS_MASK != 0
    }

    pub(crate) fn regs(&self) -> &R {
        &self.regs
    }

    /// Put the counter in phase and frequency correct mode and set the period.
    pub fn initialize(&self, period_us: u32) -> Period {
        self.regs.write8(Reg8::Tccr1a, 0);
        // Mode 8, TOP = ICR1, clock stopped
        self.regs.write8(Reg8::Tccr1b, WGM13_BIT);
        self.commit_period(period_us)
    }

    /// Select the prescaler and top value for `period_us`, commit them, and
    /// (re)start the clock from wherever the counter is.
    ///
    /// Too long a period isn't an error, it gets the longest one the counter
    /// can do; the returned [Period] says which happened.
    ///
    /// Called before [Timer1::initialize], it initializes.
    pub fn set_period(&self, period_us: u32) -> Period {
        if !self.is_initialized() {
            return self.initialize(period_us);
        }
        self.commit_period(period_us)
    }

    fn commit_period(&self, period_us: u32) -> Period {
        let period = TimerConfig::from_period(self.clock_hz, period_us);
        let config = period.config();
        if period.is_saturated() {
            warn!(
                "Period of {} us out of range, using {} us",
                period_us,
                config.period_us(self.clock_hz)
            );
        }
        debug!(
            "Period {} us: prescaler {:?} top {}",
            period_us, config.clock_select, config.top
        );

        atomic(|cs| {
            self.config.borrow(cs).set(Some(config));
            // ICR1 is TOP in this mode
            self.regs.write16(Reg16::Icr1, config.top);
            self.regs
                .modify8(Reg8::Tccr1b, |v| (v & !CS_MASK) | config.clock_select.bits());
        });
        period
    }

    /// Stop the clock. The counter keeps its value.
    pub fn stop(&self) {
        trace!("stop");
        atomic(|_| self.regs.clear_bits8(Reg8::Tccr1b, CS_MASK));
    }

    /// Restart the clock without resetting the counter.
    pub fn resume(&self) {
        trace!("resume");
        let bits = self.committed_config().clock_select.bits();
        atomic(|_| self.regs.set_bits8(Reg8::Tccr1b, bits));
    }

    /// Restart the counter from zero.
    ///
    /// This resets the prescaler, which Timer0 shares.
    /// Returns once the counter has moved off zero: the overflow flag can
    /// latch while TCNT1 sits at zero, and would fire a phantom interrupt.
    /// That flag is cleared, then the overflow interrupt is re-enabled if it
    /// was enabled before.
    ///
    /// With a top of one or two counts at `Div1` the counter can reach BOTTOM
    /// again before the flag is cleared; that first real overflow is lost.
    pub fn start(&self) {
        trace!("start");
        self.committed_config();
        let overflow_enabled = atomic(|_| {
            let enabled = self.regs.read8(Reg8::Timsk1) & TOIE1_BIT != 0;
            self.regs.clear_bits8(Reg8::Timsk1, TOIE1_BIT);
            self.regs.set_bits8(Reg8::Gtccr, PSRSYNC_BIT);
            self.regs.write16(Reg16::Tcnt1, 0);
            enabled
        });
        self.resume();

        // Bounded by one prescaled tick
        while atomic(|_| self.regs.read16(Reg16::Tcnt1)) == 0 {}

        atomic(|_| {
            // Write one to clear
            self.regs.write8(Reg8::Tifr1, TOV1_BIT);
            if overflow_enabled {
                self.regs.set_bits8(Reg8::Timsk1, TOIE1_BIT);
            }
        });
    }

    /// Same as [Timer1::start]
    pub fn restart(&self) {
        self.start();
    }

    /// Call `callback` on every overflow, optionally setting a new period
    /// first. Doesn't touch the global interrupt enable.
    pub fn attach_interrupt(&self, callback: fn(), period_us: Option<u32>) {
        atomic(|cs| self.callback.borrow(cs).set(Some(callback)));
        if let Some(period_us) = period_us {
            self.set_period(period_us);
        }
        atomic(|_| self.regs.set_bits8(Reg8::Timsk1, TOIE1_BIT));
        self.resume();
    }

    /// Stop delivering overflows. The counter keeps running.
    pub fn detach_interrupt(&self) {
        atomic(|_| self.regs.clear_bits8(Reg8::Timsk1, TOIE1_BIT));
    }

    /// Overflow interrupt entry point.
    ///
    /// Only calls the attached callback. Interrupts are disabled while it
    /// runs, so the callback should be quick.
    pub fn on_overflow(&self) {
        if let Some(callback) = atomic(|cs| self.callback.borrow(cs).get()) {
            callback();
        }
    }

    /// Time into the current period, in microseconds.
    ///
    /// The counter sweeps up then down, so a single sample is ambiguous;
    /// this waits for the counter to move to learn which way it's going.
    ///
    /// Ticks are scaled by the prescaler before the division by the clock,
    /// so the result is exact to within a microsecond. Scaling after the
    /// division would be off by up to `divisor - 1` us.
    pub fn read(&self) -> u32 {
        let first = atomic(|_| self.regs.read16(Reg16::Tcnt1));
        let config = self.config();

        let ticks = if !self.is_running() {
            // Frozen, it isn't going to move
            first as u32
        } else {
            // At most one prescaled tick
            let second = loop {
                let tcnt = atomic(|_| self.regs.read16(Reg16::Tcnt1));
                if tcnt != first {
                    break tcnt;
                }
            };
            if second > first {
                first as u32
            } else {
                // Counting down: distance back from TOP
                config.top as u32 + (config.top as u32).saturating_sub(first as u32)
            }
        };

        // Undo the prescaler before dividing, to keep the low bits
        let us = ((ticks as u64) << config.clock_select.shift()) * 1_000_000 / self.clock_hz as u64;
        us.min(u32::MAX as u64) as u32
    }
}
