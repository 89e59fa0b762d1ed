use anyhow::Result;
use clap::Parser;
use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use piglcd::glcd::{checker_pattern, Glcd, Segment};
use piglcd::{Backend, GpioConfig, LcdPins, Mode, PinWriter};

/// Fill a KS0108 128x64 LCD with a stripe pattern and clear it, repeatedly.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// TOML file with the LCD pin layout [default: built-in layout]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GPIO access library to drive the display with
    #[arg(short, long, value_enum, default_value_t = Backend::Sysfs)]
    backend: Backend,

    /// Pin numbering mode of the layout: BOARD, BCM or WPI
    #[arg(short, long, default_value = "BOARD", value_parser = parse_mode)]
    mode: Mode,

    /// Number of fill/clear cycles
    #[arg(short, long, default_value_t = 50)]
    frames: u32,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    Mode::from_str(s).map_err(|e| e.to_string())
}

fn run<W: PinWriter>(lcd: &mut Glcd<W>, frames: u32) -> Result<Duration> {
    lcd.setup()?;
    lcd.set_display_enable(true)?;
    lcd.set_start_line(0)?;

    let pattern = checker_pattern();
    let start = Instant::now();
    for frame in 0..frames {
        for page in 0..lcd.pages {
            for segment in Segment::ALL {
                lcd.write_page(segment, page, &pattern)?;
            }
        }
        lcd.clear_screen()?;
        log::debug!("Frame {} done", frame);
    }
    Ok(start.elapsed())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let pins = match &args.config {
        Some(path) => LcdPins::load(path)?,
        None => LcdPins::default(),
    };

    let writer = args.backend.open(args.mode, &GpioConfig::from_env())?;
    let mut lcd = Glcd::new(writer, pins);

    let result = run(&mut lcd, args.frames);
    // the pins are released even when drawing failed
    lcd.release()?;
    let elapsed = result?;

    println!("{} frames in {:.3}s", args.frames, elapsed.as_secs_f64());

    Ok(())
}
