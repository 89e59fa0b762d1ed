//! Driver for KS0108-compatible 128x64 graphic LCD modules.
//!
//! The panel is split into two segment units of 64 columns each, selected by
//! CS1 and CS2. Each unit stores 8 pages of 8 pixel rows; one data byte fills
//! one column of one page, bit 0 at the top.
//!
//! Every signal is bit-banged through a [`PinWriter`], so the driver works
//! with any backend, including a dry run.

use anyhow::Error;
use std::{thread, time::Duration};

use crate::backend::PinWriter;
use crate::config::LcdPins;
use crate::gpio::Level;

pub const PAGES: u8 = 8;
pub const COLUMNS: u8 = 64;

/// Minimum time E is held high.
const PULSE_WIDTH: Duration = Duration::from_nanos(1);

/// Instruction encodings.
pub mod command {
    /// `0 0 1 1 1 1 1 d`
    pub fn display_enable(on: bool) -> u8 {
        0b0011_1110 | on as u8
    }

    /// `1 0 1 1 1 p p p`
    pub fn set_page(page: u8) -> u8 {
        0b1011_1000 | (page & 0x07)
    }

    /// `0 1 c c c c c c`
    pub fn set_column(column: u8) -> u8 {
        0b0100_0000 | (column & 0x3F)
    }

    /// `1 1 l l l l l l`
    pub fn set_start_line(line: u8) -> u8 {
        0b1100_0000 | (line & 0x3F)
    }
}

/// One of the two controller chips driving a half of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Left,
    Right,
}

impl Segment {
    pub const ALL: [Segment; 2] = [Segment::Left, Segment::Right];

    /// Maps a chip-select index to a segment, using only its lowest bit.
    pub fn from_index(cs: u8) -> Segment {
        if cs & 0x01 == 0 {
            Segment::Left
        } else {
            Segment::Right
        }
    }
}

pub struct Glcd<W: PinWriter> {
    writer: W,
    pins: LcdPins,
    pub pages: u8,
}

impl<W: PinWriter> Glcd<W> {
    pub fn new(writer: W, pins: LcdPins) -> Self {
        Glcd {
            writer,
            pins,
            pages: PAGES,
        }
    }

    pub fn pins(&self) -> &LcdPins {
        &self.pins
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Configures every pin of the module as an output.
    pub fn setup(&mut self) -> Result<(), Error> {
        for pin in self.pins.all() {
            self.writer.setup_output(pin, None)?;
        }
        Ok(())
    }

    /// Drives all pins low and hands the writer back, releasing the pins.
    pub fn release(mut self) -> Result<W, Error> {
        self.pin_all_low()?;
        self.writer.release()?;
        Ok(self.writer)
    }

    pub fn pin_set_val(&mut self, pin: u32, level: Level) -> Result<(), Error> {
        self.writer.write(pin, level)
    }

    pub fn pin_on(&mut self, pin: u32) -> Result<(), Error> {
        self.pin_set_val(pin, Level::HIGH)
    }

    pub fn pin_off(&mut self, pin: u32) -> Result<(), Error> {
        self.pin_set_val(pin, Level::LOW)
    }

    pub fn pin_all_low(&mut self) -> Result<(), Error> {
        for pin in self.pins.all() {
            self.pin_off(pin)?;
        }
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), Error> {
        self.pin_off(self.pins.rst)?;
        self.pin_on(self.pins.rst)
    }

    pub fn set_backlight(&mut self, on: bool) -> Result<(), Error> {
        self.pin_set_val(self.pins.led, Level::from(on))
    }

    /// Strobes E to latch the bus into the selected controller(s).
    pub fn pulse(&mut self) -> Result<(), Error> {
        self.pin_on(self.pins.e)?;
        thread::sleep(PULSE_WIDTH);
        self.pin_off(self.pins.e)
    }

    pub fn select_segment_unit(&mut self, segment: Segment) -> Result<(), Error> {
        match segment {
            Segment::Left => self.pin_on(self.pins.cs1),
            Segment::Right => self.pin_on(self.pins.cs2),
        }
    }

    pub fn unselect_segment_unit(&mut self) -> Result<(), Error> {
        self.pin_off(self.pins.cs1)?;
        self.pin_off(self.pins.cs2)
    }

    /// Puts `data` on D0..D7, bit `i` on Di.
    pub fn write_data_bit(&mut self, data: u8) -> Result<(), Error> {
        let data_pins = self.pins.data;
        for (i, pin) in data_pins.iter().enumerate() {
            self.pin_set_val(*pin, Level::from(data & (1 << i) != 0))?;
        }
        Ok(())
    }

    fn instruction(&mut self, segments: &[Segment], byte: u8) -> Result<(), Error> {
        for segment in segments {
            self.select_segment_unit(*segment)?;
        }
        self.write_data_bit(byte)?;
        self.pulse()?;
        self.unselect_segment_unit()
    }

    pub fn set_page(&mut self, segment: Segment, page: u8) -> Result<(), Error> {
        self.instruction(&[segment], command::set_page(page))
    }

    pub fn set_column(&mut self, segment: Segment, column: u8) -> Result<(), Error> {
        self.instruction(&[segment], command::set_column(column))
    }

    pub fn set_display_enable(&mut self, on: bool) -> Result<(), Error> {
        self.instruction(&Segment::ALL, command::display_enable(on))
    }

    pub fn set_start_line(&mut self, line: u8) -> Result<(), Error> {
        self.instruction(&Segment::ALL, command::set_start_line(line))
    }

    /// Writes one display byte at the segment's current address, which the
    /// controller then advances by one column.
    pub fn write_data(&mut self, segment: Segment, data: u8) -> Result<(), Error> {
        self.pin_on(self.pins.rs)?;
        self.select_segment_unit(segment)?;

        self.write_data_bit(data)?;
        self.pulse()?;

        self.unselect_segment_unit()?;
        self.pin_off(self.pins.rs)
    }

    /// Fills one page of a segment from column 0.
    ///
    /// At most 64 bytes are written.
    pub fn write_page(&mut self, segment: Segment, page: u8, data: &[u8]) -> Result<(), Error> {
        self.set_page(segment, page)?;
        self.set_column(segment, 0)?;
        for byte in data.iter().take(COLUMNS as usize) {
            self.write_data(segment, *byte)?;
        }
        Ok(())
    }

    pub fn clear_screen(&mut self) -> Result<(), Error> {
        let blank = [0u8; COLUMNS as usize];
        for page in 0..self.pages {
            for segment in Segment::ALL {
                self.write_page(segment, page, &blank)?;
            }
        }
        Ok(())
    }
}

/// Vertical stripes: even columns light the even pixel rows, odd columns the
/// odd ones.
pub fn checker_pattern() -> [u8; COLUMNS as usize] {
    let mut columns = [0u8; COLUMNS as usize];
    for (column, byte) in columns.iter_mut().enumerate() {
        *byte = if column % 2 == 0 { 0x55 } else { 0xAA };
    }
    columns
}
