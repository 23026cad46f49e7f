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

//! Software model of the Timer1 block, for running the driver off-chip.
//!
//! Only phase and frequency correct counting is modelled: 0 up to ICR1,
//! back down to 0, overflow flag at the bottom. The prescaler isn't; one
//! step is one count whatever the clock select.
//!
//! The real counter keeps going between CPU instructions, so every read of
//! TCNT1 while the clock runs also advances it by one count.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::registers::{Reg16, Reg8, Registers, CS_MASK, PSRSYNC_BIT, TOIE1_BIT, TOV1_BIT};

/// Register file and counter state of [SimulatedTimer1]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimState {
    pub tifr1: u8,
    pub gtccr: u8,
    pub ddrb: u8,
    pub timsk1: u8,
    pub tccr1a: u8,
    pub tccr1b: u8,
    pub tcnt1: u16,
    pub icr1: u16,
    pub ocr1a: u16,
    pub ocr1b: u16,
    /// Counting from TOP back to BOTTOM
    pub descending: bool,
    /// Times the counter reached BOTTOM by counting
    pub wraps: u32,
    /// Times PSRSYNC was written
    pub prescaler_resets: u32,
}

impl SimState {
    const fn new() -> Self {
        Self {
            tifr1: 0,
            gtccr: 0,
            ddrb: 0,
            timsk1: 0,
            tccr1a: 0,
            tccr1b: 0,
            tcnt1: 0,
            icr1: 0,
            ocr1a: 0,
            ocr1b: 0,
            descending: false,
            wraps: 0,
            prescaler_resets: 0,
        }
    }

    fn running(&self) -> bool {
        self.tccr1b & CS_MASK != 0
    }

    fn step(&mut self) {
        if self.descending {
            self.tcnt1 = self.tcnt1.saturating_sub(1);
            if self.tcnt1 == 0 {
                self.descending = false;
                self.tifr1 |= TOV1_BIT;
                self.wraps = self.wraps.wrapping_add(1);
            }
        } else {
            self.tcnt1 = self.tcnt1.saturating_add(1);
            if self.tcnt1 >= self.icr1 {
                self.tcnt1 = self.icr1;
                self.descending = true;
            }
        }
    }

    fn reg8(&mut self, reg: Reg8) -> &mut u8 {
        match reg {
            Reg8::Tifr1 => &mut self.tifr1,
            Reg8::Gtccr => &mut self.gtccr,
            Reg8::Ddrb => &mut self.ddrb,
            Reg8::Timsk1 => &mut self.timsk1,
            Reg8::Tccr1a => &mut self.tccr1a,
            Reg8::Tccr1b => &mut self.tccr1b,
        }
    }

    fn reg16(&mut self, reg: Reg16) -> &mut u16 {
        match reg {
            Reg16::Tcnt1 => &mut self.tcnt1,
            Reg16::Icr1 => &mut self.icr1,
            Reg16::Ocr1a => &mut self.ocr1a,
            Reg16::Ocr1b => &mut self.ocr1b,
        }
    }
}

/// Simulated Timer1, usable anywhere a [Registers] is expected
pub struct SimulatedTimer1 {
    state: Mutex<RefCell<SimState>>,
}

impl Default for SimulatedTimer1 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTimer1 {
    /// Power-on state: everything zero, clock stopped
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(SimState::new())),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut SimState) -> T) -> T {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            f(&mut state)
        })
    }

    /// Advance the clock by `counts`, calling `isr` whenever the overflow
    /// interrupt would be taken. The flag is cleared before `isr` runs,
    /// as the hardware does when it vectors.
    pub fn run(&self, counts: u32, mut isr: impl FnMut()) {
        for _ in 0..counts {
            let fire = self.with(|s| {
                if !s.running() {
                    return false;
                }
                s.step();
                let fire = s.timsk1 & TOIE1_BIT != 0 && s.tifr1 & TOV1_BIT != 0;
                if fire {
                    s.tifr1 &= !TOV1_BIT;
                }
                fire
            });
            // isr may come back in through the registers
            if fire {
                isr();
            }
        }
    }

    pub fn snapshot(&self) -> SimState {
        self.with(|s| *s)
    }

    /// TCNT1, without advancing it
    pub fn counter(&self) -> u16 {
        self.with(|s| s.tcnt1)
    }

    pub fn top(&self) -> u16 {
        self.with(|s| s.icr1)
    }

    pub fn compare(&self, reg: Reg16) -> u16 {
        self.with(|s| *s.reg16(reg))
    }

    pub fn peek8(&self, reg: Reg8) -> u8 {
        self.with(|s| *s.reg8(reg))
    }

    pub fn is_running(&self) -> bool {
        self.with(|s| s.running())
    }

    pub fn wraps(&self) -> u32 {
        self.with(|s| s.wraps)
    }

    pub fn prescaler_resets(&self) -> u32 {
        self.with(|s| s.prescaler_resets)
    }
}

impl Registers for SimulatedTimer1 {
    fn read8(&self, reg: Reg8) -> u8 {
        self.peek8(reg)
    }

    fn write8(&self, reg: Reg8, val: u8) {
        self.with(|s| match reg {
            // Flags clear by writing a one
            Reg8::Tifr1 => s.tifr1 &= !val,
            // PSRSYNC clears itself once the prescaler is reset
            Reg8::Gtccr => {
                if val & PSRSYNC_BIT != 0 {
                    s.prescaler_resets += 1;
                }
                s.gtccr = val & !PSRSYNC_BIT;
            }
            _ => *s.reg8(reg) = val,
        })
    }

    fn read16(&self, reg: Reg16) -> u16 {
        self.with(|s| {
            let val = *s.reg16(reg);
            if reg == Reg16::Tcnt1 && s.running() {
                s.step();
            }
            val
        })
    }

    fn write16(&self, reg: Reg16, val: u16) {
        self.with(|s| {
            *s.reg16(reg) = val;
            if reg == Reg16::Tcnt1 {
                s.descending = false;
                if val == 0 {
                    // The flag latches while the counter sits at BOTTOM
                    s.tifr1 |= TOV1_BIT;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::CS10_BIT;

    fn running_sim(top: u16) -> SimulatedTimer1 {
        let sim = SimulatedTimer1::new();
        sim.write16(Reg16::Icr1, top);
        sim.write8(Reg8::Tifr1, TOV1_BIT);
        sim.write8(Reg8::Tccr1b, CS10_BIT);
        sim
    }

    #[test]
    fn test_up_down_sweep() {
        let sim = running_sim(4);
        let mut seen = [0u16; 9];
        for v in seen.iter_mut() {
            *v = sim.counter();
            sim.run(1, || {});
        }
        assert_eq!(seen, [0, 1, 2, 3, 4, 3, 2, 1, 0]);
        assert_eq!(sim.wraps(), 1);
    }

    #[test]
    fn test_stopped_doesnt_count() {
        let sim = SimulatedTimer1::new();
        sim.write16(Reg16::Icr1, 100);
        sim.run(50, || {});
        assert_eq!(sim.read16(Reg16::Tcnt1), 0);
        assert_eq!(sim.counter(), 0);
    }

    #[test]
    fn test_counter_read_advances() {
        let sim = running_sim(100);
        assert_eq!(sim.read16(Reg16::Tcnt1), 0);
        assert_eq!(sim.read16(Reg16::Tcnt1), 1);
        assert_eq!(sim.counter(), 2);
    }

    #[test]
    fn test_overflow_delivery() {
        let sim = running_sim(10);
        let mut taken = 0;
        sim.run(60, || taken += 1);
        // flag set, but interrupt not enabled
        assert_eq!(taken, 0);
        assert_ne!(sim.peek8(Reg8::Tifr1) & TOV1_BIT, 0);

        sim.write8(Reg8::Tifr1, TOV1_BIT);
        sim.write8(Reg8::Timsk1, TOIE1_BIT);
        sim.run(60, || taken += 1);
        assert_eq!(taken, 3);
        assert_eq!(sim.peek8(Reg8::Tifr1), 0);
    }

    #[test]
    fn test_zero_write_latches_flag() {
        let sim = running_sim(10);
        sim.run(5, || {});
        sim.write16(Reg16::Tcnt1, 0);
        assert_eq!(sim.peek8(Reg8::Tifr1), TOV1_BIT);
        sim.write8(Reg8::Gtccr, PSRSYNC_BIT);
        assert_eq!(sim.peek8(Reg8::Gtccr), 0);
        assert_eq!(sim.prescaler_resets(), 1);
    }
}
