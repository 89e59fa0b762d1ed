use anyhow::Result;
use clap::Parser;

use piglcd::bench::{default_pin, run_toggle, ToggleOrder};
use piglcd::{Backend, GpioConfig, Mode};

/// Toggle one GPIO pin COUNT times and report the write throughput.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Number of high/low iterations
    #[arg(value_parser = clap::value_parser!(u64).range(..=u64::MAX / 2))]
    count: u64,

    /// GPIO access library to measure
    #[arg(short, long, value_enum, default_value_t = Backend::Sysfs)]
    backend: Backend,

    /// Pin numbering mode: BOARD, BCM or WPI
    #[arg(short, long, default_value = "BOARD", value_parser = parse_mode)]
    mode: Mode,

    /// Pin to toggle, in the selected numbering mode [default: physical pin 23]
    #[arg(short, long)]
    pin: Option<u32>,

    /// Level written first in each iteration
    #[arg(short, long, value_enum, default_value_t = ToggleOrder::HighLow)]
    order: ToggleOrder,
}

impl Args {
    fn resolved_pin(&self) -> Result<u32> {
        match self.pin {
            Some(pin) => Ok(pin),
            None => default_pin(self.mode),
        }
    }
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    Mode::from_str(s).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let pin = args.resolved_pin()?;

    let mut writer = args.backend.open(args.mode, &GpioConfig::from_env())?;
    let result = run_toggle(&mut writer, pin, args.count, args.order);
    // release before reporting so a failed run still frees the pin
    writer.release()?;
    let report = result?;

    log::info!(
        "{:?} backend, {} pin {}: {} iterations",
        args.backend,
        args.mode.to_str(),
        pin,
        report.iterations
    );
    println!("{}", report);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_is_a_required_integer() {
        assert!(Args::try_parse_from(["gpio_bench"]).is_err());
        assert!(Args::try_parse_from(["gpio_bench", "many"]).is_err());
        assert!(Args::try_parse_from(["gpio_bench", "-5"]).is_err());

        let args = Args::try_parse_from(["gpio_bench", "1000"]).unwrap();
        assert_eq!(args.count, 1000);
        assert_eq!(args.backend, Backend::Sysfs);
        assert_eq!(args.mode, Mode::BOARD);
        assert_eq!(args.order, ToggleOrder::HighLow);
    }

    #[test]
    fn count_is_capped_so_write_total_fits() {
        let max = (u64::MAX / 2).to_string();
        assert!(Args::try_parse_from(["gpio_bench", max.as_str()]).is_ok());

        let over = (u64::MAX / 2 + 1).to_string();
        assert!(Args::try_parse_from(["gpio_bench", over.as_str()]).is_err());
    }

    #[test]
    fn default_pin_depends_on_mode() {
        let pin = |argv: &[&str]| Args::try_parse_from(argv).unwrap().resolved_pin().unwrap();
        assert_eq!(pin(&["gpio_bench", "1"]), 23);
        assert_eq!(pin(&["gpio_bench", "1", "--mode", "bcm"]), 11);
        assert_eq!(pin(&["gpio_bench", "1", "-m", "WPI"]), 14);
        assert_eq!(pin(&["gpio_bench", "1", "-m", "bcm", "-p", "4"]), 4);
    }

    #[test]
    fn options_parse() {
        let args = Args::try_parse_from([
            "gpio_bench", "10", "--backend", "dry-run", "--order", "low-high",
        ])
        .unwrap();
        assert_eq!(args.backend, Backend::DryRun);
        assert_eq!(args.order, ToggleOrder::LowHigh);
        assert!(Args::try_parse_from(["gpio_bench", "10", "--mode", "tegra"]).is_err());
    }

    #[test]
    fn dry_run_toggles_without_hardware() {
        let args = Args::try_parse_from(["gpio_bench", "25", "-b", "dry-run"]).unwrap();
        let mut writer = args.backend.open(args.mode, &GpioConfig::default()).unwrap();
        let report = run_toggle(&mut writer, args.resolved_pin().unwrap(), args.count, args.order).unwrap();
        assert_eq!(report.writes, 50);
    }
}
