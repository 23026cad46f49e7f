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

//! Timer1 register map and the trait used to reach it.

use core::ptr::{read_volatile, write_volatile};

/// TCCR1A: clear OC1A on up-count compare match.
pub const COM1A1_BIT: u8 = 1 << 7;
/// TCCR1A: clear OC1B on up-count compare match.
pub const COM1B1_BIT: u8 = 1 << 5;
/// TCCR1B: waveform generation mode 8, phase and frequency correct, TOP = ICR1.
pub const WGM13_BIT: u8 = 1 << 4;
/// TCCR1B: clock select bits.
pub const CS12_BIT: u8 = 1 << 2;
pub const CS11_BIT: u8 = 1 << 1;
pub const CS10_BIT: u8 = 1 << 0;
/// Mask for all clock select bits. None set means the counter is stopped.
pub const CS_MASK: u8 = CS12_BIT | CS11_BIT | CS10_BIT;
/// TIMSK1: overflow interrupt enable.
pub const TOIE1_BIT: u8 = 1 << 0;
/// TIFR1: overflow flag. Cleared by writing a 1.
pub const TOV1_BIT: u8 = 1 << 0;
/// GTCCR: reset the prescaler shared by Timer0 and Timer1.
pub const PSRSYNC_BIT: u8 = 1 << 0;
/// DDRB: OC1A output pin (Arduino pin 9).
pub const PB1_BIT: u8 = 1 << 1;
/// DDRB: OC1B output pin (Arduino pin 10).
pub const PB2_BIT: u8 = 1 << 2;

/// 8-bit registers, by data memory address
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum Reg8 {
    Tifr1 = 0x36,
    Gtccr = 0x43,
    Ddrb = 0x24,
    Timsk1 = 0x6f,
    Tccr1a = 0x80,
    Tccr1b = 0x81,
}

/// 16-bit registers, by data memory address of the low byte
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum Reg16 {
    Tcnt1 = 0x84,
    Icr1 = 0x86,
    Ocr1a = 0x88,
    Ocr1b = 0x8a,
}

impl From<Reg8> for usize {
    fn from(val: Reg8) -> Self {
        val as u8 as usize
    }
}

impl From<Reg16> for usize {
    fn from(val: Reg16) -> Self {
        val as u8 as usize
    }
}

/// Trait for accessing the Timer1 register block
///
/// A 16-bit access is two bus transfers on the real chip, so implementations
/// don't have to make them atomic. The driver only calls the 16-bit
/// accessors with interrupts disabled.
pub trait Registers {
    fn read8(&self, reg: Reg8) -> u8;
    fn write8(&self, reg: Reg8, val: u8);
    fn read16(&self, reg: Reg16) -> u16;
    fn write16(&self, reg: Reg16, val: u16);

    /// Read-modify-write of an 8-bit register
    fn modify8(&self, reg: Reg8, f: impl FnOnce(u8) -> u8) {
        let val = self.read8(reg);
        self.write8(reg, f(val));
    }
    fn set_bits8(&self, reg: Reg8, bits: u8) {
        self.modify8(reg, |v| v | bits);
    }
    fn clear_bits8(&self, reg: Reg8, bits: u8) {
        self.modify8(reg, |v| v & !bits);
    }
}

// Blanket implementation
impl<U> Registers for &U
where
    U: Registers + ?Sized,
{
    fn read8(&self, reg: Reg8) -> u8 {
        (**self).read8(reg)
    }
    fn write8(&self, reg: Reg8, val: u8) {
        (**self).write8(reg, val)
    }
    fn read16(&self, reg: Reg16) -> u16 {
        (**self).read16(reg)
    }
    fn write16(&self, reg: Reg16, val: u16) {
        (**self).write16(reg, val)
    }
}

/// Memory-mapped Timer1 of an ATmega168/328
pub struct Atmega328p {
    _private: (),
}

impl Atmega328p {
    /// # Safety
    ///
    /// The caller must make sure nothing else drives the Timer1 registers.
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl Registers for Atmega328p {
    fn read8(&self, reg: Reg8) -> u8 {
        // SAFETY: valid I/O address on this chip
        unsafe { read_volatile(usize::from(reg) as *const u8) }
    }

    fn write8(&self, reg: Reg8, val: u8) {
        // SAFETY: valid I/O address on this chip
        unsafe { write_volatile(usize::from(reg) as *mut u8, val) }
    }

    fn read16(&self, reg: Reg16) -> u16 {
        let low = usize::from(reg) as *const u8;
        // Reading the low byte latches the high byte into TEMP
        // SAFETY: valid I/O addresses on this chip
        let (lo, hi) = unsafe { (read_volatile(low), read_volatile(low.add(1))) };
        u16::from_le_bytes([lo, hi])
    }

    fn write16(&self, reg: Reg16, val: u16) {
        let low = usize::from(reg) as *mut u8;
        let [lo, hi] = val.to_le_bytes();
        // High byte goes to TEMP first, the low byte write commits both
        // SAFETY: valid I/O addresses on this chip
        unsafe {
            write_volatile(low.add(1), hi);
            write_volatile(low, lo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct Scratch {
        tccr1a: Cell<u8>,
    }
    impl Registers for Scratch {
        fn read8(&self, _reg: Reg8) -> u8 {
            self.tccr1a.get()
        }
        fn write8(&self, _reg: Reg8, val: u8) {
            self.tccr1a.set(val)
        }
        fn read16(&self, _reg: Reg16) -> u16 {
            0
        }
        fn write16(&self, _reg: Reg16, _val: u16) {}
    }

    #[test]
    fn test_bit_helpers() {
        let regs = Scratch {
            tccr1a: Cell::new(COM1B1_BIT),
        };
        regs.set_bits8(Reg8::Tccr1a, COM1A1_BIT);
        assert_eq!(regs.read8(Reg8::Tccr1a), COM1A1_BIT | COM1B1_BIT);
        regs.clear_bits8(Reg8::Tccr1a, COM1B1_BIT);
        assert_eq!(regs.read8(Reg8::Tccr1a), COM1A1_BIT);
        // through a reference
        let by_ref = &regs;
        by_ref.clear_bits8(Reg8::Tccr1a, COM1A1_BIT);
        assert_eq!(regs.read8(Reg8::Tccr1a), 0);
    }

    #[test]
    fn test_addresses() {
        assert_eq!(usize::from(Reg8::Tccr1b), 0x81);
        assert_eq!(usize::from(Reg16::Tcnt1), 0x84);
        assert_eq!(usize::from(Reg16::Ocr1b), 0x8a);
        assert_eq!(CS_MASK, 0b111);
    }
}
