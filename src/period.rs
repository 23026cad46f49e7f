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

use crate::registers::{CS10_BIT, CS11_BIT, CS12_BIT};

/// Addressable range of the 16-bit counter.
pub const RESOLUTION: u32 = 1 << 16;

/// Full scale of a PWM duty value, 10 bits.
pub const DUTY_SCALE: u16 = 1024;

/// Prescaler stage feeding the counter
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ClockSelect {
    Div1,
    Div8,
    Div64,
    Div256,
    Div1024,
}

impl ClockSelect {
    /// Ascending, the order they're tried in
    const ALL: [ClockSelect; 5] = [
        Self::Div1,
        Self::Div8,
        Self::Div64,
        Self::Div256,
        Self::Div1024,
    ];

    /// Value of the CS1x bits in TCCR1B
    pub const fn bits(self) -> u8 {
        match self {
            Self::Div1 => CS10_BIT,
            Self::Div8 => CS11_BIT,
            Self::Div64 => CS11_BIT | CS10_BIT,
            Self::Div256 => CS12_BIT,
            Self::Div1024 => CS12_BIT | CS10_BIT,
        }
    }

    /// log2 of the divisor
    pub const fn shift(self) -> u32 {
        match self {
            Self::Div1 => 0,
            Self::Div8 => 3,
            Self::Div64 => 6,
            Self::Div256 => 8,
            Self::Div1024 => 10,
        }
    }

    pub const fn divisor(self) -> u32 {
        1 << self.shift()
    }
}

/// Prescaler and top value, which together set the period
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TimerConfig {
    pub clock_select: ClockSelect,
    /// ICR1, where the counter turns around
    pub top: u16,
}

/// Outcome of a period request
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Period {
    /// The request fits in the counter range
    Exact(TimerConfig),
    /// The request was too long and was clamped to the longest period
    Saturated(TimerConfig),
}

impl Period {
    pub const fn config(self) -> TimerConfig {
        match self {
            Self::Exact(c) | Self::Saturated(c) => c,
        }
    }

    pub const fn is_saturated(&self) -> bool {
        matches!(self, Self::Saturated(_))
    }
}

impl TimerConfig {
    /// Longest period the counter can express.
    pub const MAX: TimerConfig = TimerConfig {
        clock_select: ClockSelect::Div1024,
        top: (RESOLUTION - 1) as u16,
    };

    /// Pick the smallest prescaler whose top value fits in 16 bits.
    ///
    /// Requests beyond the counter range saturate to [TimerConfig::MAX].
    pub const fn from_period(clock_hz: u32, period_us: u32) -> Period {
        // The counter runs back down after TOP and overflows at BOTTOM,
        // so one period is two sweeps of TOP counts
        let cycles = clock_hz as u64 * period_us as u64 / 2_000_000;
        let cycles = if cycles == 0 { 1 } else { cycles };

        let mut i = 0;
        while i < ClockSelect::ALL.len() {
            let clock_select = ClockSelect::ALL[i];
            let top = cycles >> clock_select.shift();
            if top < RESOLUTION as u64 {
                return Period::Exact(TimerConfig {
                    clock_select,
                    top: top as u16,
                });
            }
            i += 1;
        }
        Period::Saturated(Self::MAX)
    }

    /// The period this configuration actually produces, in nanoseconds
    pub const fn period_ns(&self, clock_hz: u32) -> u64 {
        self.top as u64 * self.clock_select.divisor() as u64 * 2_000_000_000 / clock_hz as u64
    }

    /// The period this configuration actually produces, in microseconds
    pub const fn period_us(&self, clock_hz: u32) -> u32 {
        let us = self.period_ns(clock_hz) / 1000;
        if us > u32::MAX as u64 {
            u32::MAX
        } else {
            us as u32
        }
    }

    /// Compare value for a 10-bit duty fraction of the period.
    /// Anything above [DUTY_SCALE] is fully on.
    pub const fn duty_to_compare(&self, duty: u16) -> u16 {
        let duty = if duty > DUTY_SCALE { DUTY_SCALE } else { duty };
        ((duty as u32 * self.top as u32) >> 10) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const F_CPU: u32 = 16_000_000;

    // One count of top is two sweeps of `divisor` base clock cycles
    fn tick_ns(config: &TimerConfig, clock_hz: u32) -> u64 {
        config.clock_select.divisor() as u64 * 2_000_000_000 / clock_hz as u64
    }

    #[test]
    fn test_one_second() {
        // 8M cycles: /8 and /64 still don't fit, /256 gives 31250
        let period = TimerConfig::from_period(F_CPU, 1_000_000);
        assert_eq!(
            period,
            Period::Exact(TimerConfig {
                clock_select: ClockSelect::Div256,
                top: 31250,
            })
        );
        assert_eq!(period.config().period_us(F_CPU), 1_000_000);
    }

    #[test]
    fn test_divider_boundaries() {
        let c = TimerConfig::from_period(F_CPU, 1000).config();
        assert_eq!(c.clock_select, ClockSelect::Div1);
        assert_eq!(c.top, 8000);

        // 65535 cycles still fit unscaled, 65536 don't
        let c = TimerConfig::from_period(2_000_000, 65535).config();
        assert_eq!((c.clock_select, c.top), (ClockSelect::Div1, 65535));
        let c = TimerConfig::from_period(2_000_000, 65536).config();
        assert_eq!((c.clock_select, c.top), (ClockSelect::Div8, 8192));

        let c = TimerConfig::from_period(F_CPU, 100_000).config();
        assert_eq!((c.clock_select, c.top), (ClockSelect::Div64, 12500));
        let c = TimerConfig::from_period(F_CPU, 4_000_000).config();
        assert_eq!((c.clock_select, c.top), (ClockSelect::Div1024, 31250));
    }

    #[test]
    fn test_realized_period_within_one_tick() {
        let mut period_us = 1;
        while period_us < 8_000_000 {
            let period = TimerConfig::from_period(F_CPU, period_us);
            assert!(!period.is_saturated(), "{} us", period_us);
            let config = period.config();
            let realized = config.period_ns(F_CPU);
            let requested = period_us as u64 * 1000;
            assert!(realized <= requested, "{} us", period_us);
            assert!(
                requested - realized <= tick_ns(&config, F_CPU),
                "{} us: {:?} gives {} ns",
                period_us,
                config,
                realized
            );
            period_us = period_us * 3 + 7;
        }
    }

    #[test]
    fn test_other_clocks() {
        let c = TimerConfig::from_period(8_000_000, 1_000_000).config();
        assert_eq!((c.clock_select, c.top), (ClockSelect::Div64, 62500));
        assert_eq!(c.period_us(8_000_000), 1_000_000);
        // Below 2MHz the raw cycle count must not collapse to zero
        let c = TimerConfig::from_period(1_000_000, 1000).config();
        assert_eq!((c.clock_select, c.top), (ClockSelect::Div1, 500));
    }

    #[test]
    fn test_saturation() {
        let max_us = TimerConfig::MAX.period_us(F_CPU);
        assert_eq!(max_us, 8_388_480);
        assert!(!TimerConfig::from_period(F_CPU, max_us).is_saturated());

        for period_us in [max_us + 1024, 10_000_000, u32::MAX] {
            let period = TimerConfig::from_period(F_CPU, period_us);
            assert_eq!(period, Period::Saturated(TimerConfig::MAX));
        }
    }

    #[test]
    fn test_zero_period() {
        let c = TimerConfig::from_period(F_CPU, 0).config();
        assert_eq!((c.clock_select, c.top), (ClockSelect::Div1, 1));
    }

    #[test]
    fn test_clock_select_bits() {
        assert_eq!(ClockSelect::Div1.bits(), 1);
        assert_eq!(ClockSelect::Div1024.bits(), 5);
        assert_eq!(ClockSelect::Div256.bits(), 4);
        assert_eq!(ClockSelect::Div64.divisor(), 64);
    }

    #[test]
    fn test_duty() {
        let c = TimerConfig::from_period(F_CPU, 1000).config();
        assert_eq!(c.duty_to_compare(512), 4000);
        assert_eq!(c.duty_to_compare(0), 0);
        assert_eq!(c.duty_to_compare(1024), 8000);
        assert_eq!(c.duty_to_compare(u16::MAX), 8000);
        assert_eq!(TimerConfig::MAX.duty_to_compare(1023), 65471);
    }
}
