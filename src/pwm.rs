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

use crate::errors::Error;
use crate::guard::atomic;
use crate::registers::{Reg16, Reg8, Registers, COM1A1_BIT, COM1B1_BIT, PB1_BIT, PB2_BIT};
use crate::timer::Timer1;
use crate::{trace, warn};

/// Output compare channel of Timer1
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Channel {
    /// OC1A, PB1, Arduino pin 9
    A,
    /// OC1B, PB2, Arduino pin 10
    B,
}

impl Channel {
    /// Channel driving a pin. Accepts the channel number (1, 2) or the
    /// Arduino pin number (9, 10).
    pub fn from_pin(pin: u8) -> Option<Self> {
        match pin {
            1 | 9 => Some(Self::A),
            2 | 10 => Some(Self::B),
            _ => None,
        }
    }

    /// COM1x1 in TCCR1A, connects the pin to the comparator
    fn output_bit(self) -> u8 {
        match self {
            Self::A => COM1A1_BIT,
            Self::B => COM1B1_BIT,
        }
    }

    fn ddr_bit(self) -> u8 {
        match self {
            Self::A => PB1_BIT,
            Self::B => PB2_BIT,
        }
    }

    fn compare_reg(self) -> Reg16 {
        match self {
            Self::A => Reg16::Ocr1a,
            Self::B => Reg16::Ocr1b,
        }
    }
}

fn lookup(pin: u8) -> Result<Channel, Error> {
    Channel::from_pin(pin).ok_or_else(|| {
        warn!("Pin {} has no output compare channel, ignored", pin);
        Error::UnknownPin(pin)
    })
}

impl<R: Registers> Timer1<R> {
    /// Generate PWM on `pin` with a 10-bit `duty` (512 is 50%), optionally
    /// setting a new period first.
    ///
    /// The counter isn't reset, so a second channel can be added while the
    /// first one is mid cycle.
    pub fn pwm(&self, pin: u8, duty: u16, period_us: Option<u32>) -> Result<Channel, Error> {
        let channel = lookup(pin)?;
        match period_us {
            Some(period_us) => {
                self.set_period(period_us);
            }
            // initialize clears TCCR1A, so commit before connecting the pin
            None => {
                self.committed_config();
            }
        }
        trace!("pwm {:?} duty {}", channel, duty);
        atomic(|_| {
            self.regs().set_bits8(Reg8::Ddrb, channel.ddr_bit());
            self.regs().set_bits8(Reg8::Tccr1a, channel.output_bit());
        });
        self.set_channel_duty(channel, duty);
        self.resume();
        Ok(channel)
    }

    /// Change the duty of `pin` without touching anything else.
    ///
    /// Before the timer is initialized this commits the default period.
    pub fn set_pwm_duty(&self, pin: u8, duty: u16) -> Result<Channel, Error> {
        let channel = lookup(pin)?;
        self.set_channel_duty(channel, duty);
        Ok(channel)
    }

    /// Disconnect `pin` from its comparator. The counter and the other
    /// channel keep going.
    pub fn disable_pwm(&self, pin: u8) -> Result<Channel, Error> {
        let channel = lookup(pin)?;
        atomic(|_| self.regs().clear_bits8(Reg8::Tccr1a, channel.output_bit()));
        Ok(channel)
    }

    fn set_channel_duty(&self, channel: Channel, duty: u16) {
        // The compare value is relative to the TOP the hardware actually has
        let compare = self.committed_config().duty_to_compare(duty);
        atomic(|_| self.regs().write16(channel.compare_reg(), compare));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedTimer1;

    const F_CPU: u32 = 16_000_000;

    #[test]
    fn test_pin_mapping() {
        assert_eq!(Channel::from_pin(9), Some(Channel::A));
        assert_eq!(Channel::from_pin(1), Some(Channel::A));
        assert_eq!(Channel::from_pin(10), Some(Channel::B));
        assert_eq!(Channel::from_pin(2), Some(Channel::B));
        assert_eq!(Channel::from_pin(3), None);
        assert_eq!(Channel::from_pin(0), None);
    }

    #[test]
    fn test_pwm_half_duty() {
        let sim = SimulatedTimer1::new();
        let timer = Timer1::new(&sim, F_CPU);
        timer.initialize(1000);
        timer.stop();
        assert_eq!(timer.pwm(9, 512, None), Ok(Channel::A));
        assert_eq!(sim.compare(Reg16::Ocr1a), 4000);
        assert_eq!(sim.peek8(Reg8::Tccr1a), COM1A1_BIT);
        assert_eq!(sim.peek8(Reg8::Ddrb), PB1_BIT);
        assert!(timer.is_running());
    }

    #[test]
    fn test_unknown_pin_is_noop() {
        let sim = SimulatedTimer1::new();
        let timer = Timer1::new(&sim, F_CPU);
        timer.initialize(1000);
        timer.stop();
        let before = sim.snapshot();

        assert_eq!(timer.pwm(3, 512, Some(20)), Err(Error::UnknownPin(3)));
        assert_eq!(timer.set_pwm_duty(11, 100), Err(Error::UnknownPin(11)));
        assert_eq!(timer.disable_pwm(0), Err(Error::UnknownPin(0)));

        assert_eq!(sim.snapshot(), before);
        assert!(!timer.is_running());
        assert_eq!(sim.top(), 8000);
    }

    #[test]
    fn test_set_duty_only_touches_compare() {
        let sim = SimulatedTimer1::new();
        let timer = Timer1::new(&sim, F_CPU);
        timer.pwm(10, 256, Some(1000)).unwrap();
        timer.disable_pwm(10).unwrap();
        assert_eq!(timer.set_pwm_duty(10, 768), Ok(Channel::B));
        assert_eq!(sim.compare(Reg16::Ocr1b), 6000);
        assert_eq!(sim.peek8(Reg8::Tccr1a), 0);
    }
}
