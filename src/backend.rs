use anyhow::{Context, Error};
use std::collections::HashMap;

use crate::config::GpioConfig;
use crate::gpio::{Level, GPIO};
use crate::gpio_pin_data::{bcm_for_channel, Mode};

/// Anything that can drive digital output pins.
///
/// Channels are numbered in whatever [`Mode`] the writer was opened with.
pub trait PinWriter {
    /// Claims `channel` as an output, optionally driving it to `initial` first.
    fn setup_output(&mut self, channel: u32, initial: Option<Level>) -> Result<(), Error>;

    fn write(&mut self, channel: u32, level: Level) -> Result<(), Error>;

    /// Gives every claimed channel back to the system.
    fn release(&mut self) -> Result<(), Error>;
}

impl<T: PinWriter + ?Sized> PinWriter for Box<T> {
    fn setup_output(&mut self, channel: u32, initial: Option<Level>) -> Result<(), Error> {
        (**self).setup_output(channel, initial)
    }

    fn write(&mut self, channel: u32, level: Level) -> Result<(), Error> {
        (**self).write(channel, level)
    }

    fn release(&mut self) -> Result<(), Error> {
        (**self).release()
    }
}

/// The GPIO access libraries that can be benchmarked against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Kernel sysfs interface (`/sys/class/gpio`)
    Sysfs,
    /// Memory-mapped GPIO registers through `rppal`
    Rppal,
    /// No hardware access, writes are only recorded
    DryRun,
}

impl Backend {
    pub fn open(self, mode: Mode, config: &GpioConfig) -> Result<Box<dyn PinWriter>, Error> {
        log::info!("Opening {:?} backend in {} mode", self, mode.to_str());
        match self {
            Backend::Sysfs => {
                let mut gpio = GPIO::with_config(config)?;
                gpio.setmode(mode)?;
                Ok(Box::new(gpio))
            }
            Backend::Rppal => Ok(Box::new(RppalWriter::new(mode)?)),
            Backend::DryRun => Ok(Box::new(RecordingWriter::new(mode).without_history())),
        }
    }
}

/// Direct register access through `rppal`.
///
/// Pins are held for the lifetime of the writer; `rppal` restores each pin's
/// previous mode when its handle is dropped.
pub struct RppalWriter {
    mode: Mode,
    gpio: rppal::gpio::Gpio,
    pins: HashMap<u32, rppal::gpio::OutputPin>,
}

impl RppalWriter {
    pub fn new(mode: Mode) -> Result<Self, Error> {
        let gpio = rppal::gpio::Gpio::new().context("Failed to open GPIO registers")?;
        Ok(RppalWriter {
            mode,
            gpio,
            pins: HashMap::new(),
        })
    }
}

impl PinWriter for RppalWriter {
    fn setup_output(&mut self, channel: u32, initial: Option<Level>) -> Result<(), Error> {
        let bcm = bcm_for_channel(self.mode, channel)?;
        // re-claiming a pin drops the old handle first
        self.pins.remove(&channel);

        let pin = self
            .gpio
            .get(bcm as u8)
            .with_context(|| format!("Failed to claim BCM pin {}", bcm))?;
        let output = match initial {
            Some(Level::HIGH) => pin.into_output_high(),
            Some(Level::LOW) => pin.into_output_low(),
            None => pin.into_output(),
        };
        self.pins.insert(channel, output);
        Ok(())
    }

    fn write(&mut self, channel: u32, level: Level) -> Result<(), Error> {
        let pin = self
            .pins
            .get_mut(&channel)
            .ok_or_else(|| Error::msg("The GPIO channel has not been set up as an OUTPUT"))?;
        match level {
            Level::HIGH => pin.set_high(),
            Level::LOW => pin.set_low(),
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), Error> {
        self.pins.clear();
        Ok(())
    }
}

/// Stand-in for real hardware: remembers what would have been written.
///
/// Channels are still validated against the header layout, so a dry run
/// rejects the same pins a real backend would.
#[derive(Debug, Clone)]
pub struct RecordingWriter {
    mode: Mode,
    levels: HashMap<u32, Level>,
    writes: Vec<(u32, Level)>,
    record: bool,
}

impl RecordingWriter {
    pub fn new(mode: Mode) -> Self {
        RecordingWriter {
            mode,
            levels: HashMap::new(),
            writes: Vec::new(),
            record: true,
        }
    }

    /// Count writes without keeping the history, for long dry runs.
    pub fn without_history(mut self) -> Self {
        self.record = false;
        self
    }

    /// Every `(channel, level)` written since creation, in order.
    pub fn writes(&self) -> &[(u32, Level)] {
        &self.writes
    }

    /// Last level written to `channel`, if it is set up.
    pub fn level(&self, channel: u32) -> Option<Level> {
        self.levels.get(&channel).copied()
    }

    pub fn is_output(&self, channel: u32) -> bool {
        self.levels.contains_key(&channel)
    }
}

impl PinWriter for RecordingWriter {
    fn setup_output(&mut self, channel: u32, initial: Option<Level>) -> Result<(), Error> {
        bcm_for_channel(self.mode, channel)?;
        self.levels.insert(channel, initial.unwrap_or(Level::LOW));
        Ok(())
    }

    fn write(&mut self, channel: u32, level: Level) -> Result<(), Error> {
        match self.levels.get_mut(&channel) {
            Some(current) => *current = level,
            None => anyhow::bail!("The GPIO channel has not been set up as an OUTPUT"),
        }
        if self.record {
            self.writes.push((channel, level));
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), Error> {
        self.levels.clear();
        Ok(())
    }
}
