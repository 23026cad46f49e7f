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

//! Drives the Timer1 driver against the simulated register block.

use std::sync::atomic::{AtomicU32, Ordering};

use clap::Parser;
use log::Level;

use timerone::registers::Reg16;
use timerone::sim::SimulatedTimer1;
use timerone::{Channel, Error, Timer1};

static OVERFLOWS: AtomicU32 = AtomicU32::new(0);

fn on_overflow() {
    OVERFLOWS.fetch_add(1, Ordering::Relaxed);
}

#[derive(Clone, clap::Subcommand, Debug)]
enum Mode {
    /// Attach an overflow callback and count invocations
    Interrupt {
        /// Number of periods to run for
        #[arg(short, long, default_value_t = 5)]
        periods: u32,
    },
    /// Generate PWM on a pin and report the compare value
    Pwm {
        /// Channel (1, 2) or Arduino pin (9, 10)
        #[arg(long, default_value_t = 9)]
        pin: u8,
        /// 10-bit duty, 512 is 50%
        #[arg(long, default_value_t = 512)]
        duty: u16,
    },
    /// Sample read() across one period
    Read {
        #[arg(short, long, default_value_t = 8)]
        samples: u32,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    /// Requested period in microseconds
    #[arg(short = 't', long, default_value_t = 1000)]
    period_us: u32,

    /// Base clock in Hz
    #[arg(short, long, default_value_t = 16_000_000)]
    clock_hz: u32,

    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let log_level = match cli.debug {
        1 => Level::Info,
        2 => Level::Debug,
        3 => Level::Trace,
        _ => Level::Warn,
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.to_string()),
    )
    .init();

    let sim = SimulatedTimer1::new();
    let timer = Timer1::new(&sim, cli.clock_hz);
    let period = timer.initialize(cli.period_us);
    let config = period.config();
    println!(
        "period {} us -> {:?}, top {}, realized {} us{}",
        cli.period_us,
        config.clock_select,
        config.top,
        config.period_us(cli.clock_hz),
        if period.is_saturated() { " (saturated)" } else { "" }
    );
    // One period is two sweeps of TOP counts
    let counts_per_period = 2 * config.top as u32;

    match cli.mode {
        Mode::Interrupt { periods } => {
            timer.attach_interrupt(on_overflow, None);
            timer.restart();
            sim.run(periods * counts_per_period, || timer.on_overflow());
            timer.detach_interrupt();
            sim.run(counts_per_period, || timer.on_overflow());
            println!(
                "{} overflows in {} periods, counter wrapped {} times",
                OVERFLOWS.load(Ordering::Relaxed),
                periods,
                sim.wraps()
            );
        }
        Mode::Pwm { pin, duty } => {
            let channel = timer.pwm(pin, duty, None)?;
            let reg = match channel {
                Channel::A => Reg16::Ocr1a,
                Channel::B => Reg16::Ocr1b,
            };
            println!(
                "{:?}: compare {} of top {}",
                channel,
                sim.compare(reg),
                sim.top()
            );
        }
        Mode::Read { samples } => {
            timer.restart();
            let step = counts_per_period / samples.max(1);
            for _ in 0..samples {
                log::info!("counter at {}", sim.counter());
                println!("{} us", timer.read());
                sim.run(step, || {});
            }
        }
    }
    Ok(())
}
