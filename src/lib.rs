//! GPIO toggle benchmarks and a KS0108 graphic LCD driver for the Raspberry Pi.
//!
//! Two ways of reaching the header pins are provided behind [`PinWriter`]:
//! the kernel sysfs interface ([`GPIO`]) and memory-mapped registers
//! ([`RppalWriter`]). [`bench::run_toggle`] measures how fast either can flip
//! a pin, and [`glcd::Glcd`] drives a display through either.

pub mod backend;
pub mod bench;
pub mod config;
pub mod glcd;
pub mod gpio;
pub mod gpio_pin_data;

pub use backend::{Backend, PinWriter, RecordingWriter, RppalWriter};
pub use config::{GpioConfig, LcdPins};
pub use gpio::{Direction, Level, GPIO};
pub use gpio_pin_data::{ChannelInfo, Mode, PiInfo};
