use anyhow::Error;
use std::{
    fmt,
    time::{Duration, Instant},
};

use crate::backend::PinWriter;
use crate::gpio::Level;
use crate::gpio_pin_data::{pin_for_channel, Mode};

/// Physical header pin toggled when no pin is given.
pub const DEFAULT_BOARD_PIN: u32 = 23;

/// [`DEFAULT_BOARD_PIN`] expressed in numbering `mode`.
pub fn default_pin(mode: Mode) -> Result<u32, Error> {
    Ok(pin_for_channel(Mode::BOARD, DEFAULT_BOARD_PIN)?.channel(mode))
}

/// Which level each iteration writes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ToggleOrder {
    HighLow,
    LowHigh,
}

impl ToggleOrder {
    fn levels(self) -> (Level, Level) {
        match self {
            ToggleOrder::HighLow => (Level::HIGH, Level::LOW),
            ToggleOrder::LowHigh => (Level::LOW, Level::HIGH),
        }
    }
}

/// Outcome of one toggle run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToggleReport {
    pub iterations: u64,
    pub writes: u64,
    pub elapsed: Duration,
}

impl ToggleReport {
    pub fn writes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.writes as f64 / secs
    }

    /// Frequency of the square wave seen on the pin; one period per iteration.
    pub fn toggle_frequency_hz(&self) -> f64 {
        self.writes_per_second() / 2.0
    }
}

impl fmt::Display for ToggleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} writes in {:.3}ms ({:.0} writes/s, {:.1} kHz square wave)",
            self.writes,
            self.elapsed.as_secs_f64() * 1000.0,
            self.writes_per_second(),
            self.toggle_frequency_hz() / 1000.0,
        )
    }
}

/// Configures `pin` as an output, then writes it `2 * count` times,
/// alternating levels in `order`.
///
/// Only the write loop is timed; setup is excluded.
pub fn run_toggle<W: PinWriter + ?Sized>(
    writer: &mut W,
    pin: u32,
    count: u64,
    order: ToggleOrder,
) -> Result<ToggleReport, Error> {
    writer.setup_output(pin, None)?;

    let (first, second) = order.levels();
    log::debug!("Toggling pin {} {} times", pin, count);

    let start = Instant::now();
    for _ in 0..count {
        writer.write(pin, first)?;
        writer.write(pin, second)?;
    }
    let elapsed = start.elapsed();

    Ok(ToggleReport {
        iterations: count,
        writes: count.saturating_mul(2),
        elapsed,
    })
}
