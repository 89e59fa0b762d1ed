use std::{fs, path::Path, time::Duration};

use piglcd::bench::{run_toggle, ToggleOrder};
use piglcd::glcd::{Glcd, Segment};
use piglcd::gpio_pin_data::RPI_4B;
use piglcd::{Direction, GpioConfig, LcdPins, Level, Mode, PinWriter, GPIO};
use tempfile::TempDir;

const BASE: u32 = 512;

/// Builds a Pi 4 lookalike: device tree, cpuinfo and a sysfs GPIO class
/// directory in which the given BCM lines are already exported.
fn fake_board(exported_bcm: &[u32]) -> (TempDir, GpioConfig) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let dt = root.join("device-tree");
    fs::create_dir_all(&dt).unwrap();
    fs::write(dt.join("model"), "Raspberry Pi 4 Model B Rev 1.4\0").unwrap();
    fs::write(root.join("cpuinfo"), "processor\t: 0\nRevision\t: c03114\n").unwrap();

    let sysfs = root.join("gpio");
    fs::create_dir_all(&sysfs).unwrap();
    fs::write(sysfs.join("export"), "").unwrap();
    fs::write(sysfs.join("unexport"), "").unwrap();
    write_chip(&sysfs, 570, "raspberrypi-exp-gpio", 8);
    write_chip(&sysfs, BASE, "pinctrl-bcm2711", 58);

    for bcm in exported_bcm {
        let gpio_dir = sysfs.join(format!("gpio{}", BASE + bcm));
        fs::create_dir_all(&gpio_dir).unwrap();
        fs::write(gpio_dir.join("direction"), "in").unwrap();
        fs::write(gpio_dir.join("value"), "0").unwrap();
    }

    let config = GpioConfig {
        sysfs_root: sysfs,
        device_tree_root: dt,
        cpuinfo_path: root.join("cpuinfo"),
        model_name: None,
        export_timeout: Duration::from_millis(50),
    };
    (dir, config)
}

fn write_chip(sysfs: &Path, base: u32, label: &str, ngpio: u32) {
    let chip = sysfs.join(format!("gpiochip{}", base));
    fs::create_dir_all(&chip).unwrap();
    fs::write(chip.join("label"), format!("{}\n", label)).unwrap();
    fs::write(chip.join("base"), format!("{}\n", base)).unwrap();
    fs::write(chip.join("ngpio"), format!("{}\n", ngpio)).unwrap();
}

fn attribute(config: &GpioConfig, bcm: u32, name: &str) -> String {
    let path = config.sysfs_root.join(format!("gpio{}", BASE + bcm)).join(name);
    fs::read_to_string(path).unwrap().trim().to_string()
}

#[test]
fn test_detects_board() {
    let (_dir, config) = fake_board(&[]);
    let gpio = GPIO::with_config(&config).unwrap();

    assert_eq!(gpio.model, RPI_4B);
    assert_eq!(gpio.pi_info.processor, "BCM2711");
    assert_eq!(gpio.pi_info.revision, "c03114");
    assert_eq!(gpio.getmode(), None);
}

#[test]
fn test_model_override_without_device_tree() {
    let (dir, mut config) = fake_board(&[]);
    config.device_tree_root = dir.path().join("missing");
    assert!(GPIO::with_config(&config).is_err());

    config.model_name = Some(String::from("RPI_3B"));
    let gpio = GPIO::with_config(&config).unwrap();
    assert_eq!(gpio.pi_info.processor, "BCM2837");
}

#[test]
fn test_missing_soc_chip() {
    let (_dir, config) = fake_board(&[]);
    fs::remove_dir_all(config.sysfs_root.join(format!("gpiochip{}", BASE))).unwrap();
    assert!(GPIO::with_config(&config).is_err());
}

#[test]
fn test_mode_handling() {
    let (_dir, config) = fake_board(&[11]);
    let mut gpio = GPIO::with_config(&config).unwrap();

    assert!(gpio.setup(vec![23], Direction::OUT, None).is_err());

    gpio.setmode(Mode::BOARD).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();
    assert!(gpio.setmode(Mode::BCM).is_err());
    assert_eq!(gpio.getmode(), Some(Mode::BOARD));
}

#[test]
fn test_output_and_input() {
    let (_dir, config) = fake_board(&[11]);
    let mut gpio = GPIO::with_config(&config).unwrap();
    gpio.setwarnings(false);
    gpio.setmode(Mode::BOARD).unwrap();

    gpio.setup(vec![23], Direction::OUT, Some(Level::LOW)).unwrap();
    assert_eq!(attribute(&config, 11, "direction"), "out");
    assert_eq!(gpio.input(23).unwrap(), Level::LOW);

    gpio.output(vec![23], vec![Level::HIGH]).unwrap();
    assert_eq!(attribute(&config, 11, "value"), "1");
    assert_eq!(gpio.input(23).unwrap(), Level::HIGH);

    assert!(gpio.output(vec![23], vec![Level::HIGH, Level::LOW]).is_err());
    assert!(gpio.output(vec![24], vec![Level::HIGH]).is_err());
    assert!(gpio.input(24).is_err());
    assert!(gpio.output(vec![1], vec![Level::HIGH]).is_err());
}

#[test]
fn test_wiringpi_numbering_reaches_same_line() {
    let (_dir, config) = fake_board(&[11]);
    let mut gpio = GPIO::with_config(&config).unwrap();
    gpio.setmode(Mode::WPI).unwrap();

    gpio.setup(vec![14], Direction::OUT, Some(Level::HIGH)).unwrap();
    assert_eq!(attribute(&config, 11, "value"), "1");
}

#[test]
fn test_input_rejects_initial_level() {
    let (_dir, config) = fake_board(&[11]);
    let mut gpio = GPIO::with_config(&config).unwrap();
    gpio.setmode(Mode::BCM).unwrap();

    assert!(gpio.setup(vec![11], Direction::IN, Some(Level::HIGH)).is_err());
    gpio.setup(vec![11], Direction::IN, None).unwrap();
    assert_eq!(attribute(&config, 11, "direction"), "in");
    assert!(gpio.output(vec![11], vec![Level::HIGH]).is_err());
}

#[test]
fn test_cleanup_unexports() {
    let (_dir, config) = fake_board(&[11]);
    let mut gpio = GPIO::with_config(&config).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();
    gpio.setup(vec![23], Direction::OUT, None).unwrap();

    gpio.cleanup(None).unwrap();
    let unexported = fs::read_to_string(config.sysfs_root.join("unexport")).unwrap();
    assert_eq!(unexported, (BASE + 11).to_string());
    assert_eq!(gpio.getmode(), None);
    assert!(gpio.output_one(23, Level::HIGH).is_err());
}

#[test]
fn test_drop_unexports() {
    let (_dir, config) = fake_board(&[11]);
    {
        let mut gpio = GPIO::with_config(&config).unwrap();
        gpio.setmode(Mode::BOARD).unwrap();
        gpio.setup(vec![23], Direction::OUT, None).unwrap();
    }
    let unexported = fs::read_to_string(config.sysfs_root.join("unexport")).unwrap();
    assert_eq!(unexported, (BASE + 11).to_string());
}

#[test]
fn test_failed_toggle_still_unexports_on_drop() {
    let (_dir, config) = fake_board(&[11]);
    {
        let mut gpio = GPIO::with_config(&config).unwrap();
        gpio.setmode(Mode::BOARD).unwrap();
        gpio.setup(vec![23], Direction::OUT, None).unwrap();
        // the line behind BOARD 24 never appears, so the run fails with 23 still claimed
        assert!(run_toggle(&mut gpio, 24, 10, ToggleOrder::HighLow).is_err());
    }
    let unexported = fs::read_to_string(config.sysfs_root.join("unexport")).unwrap();
    assert_eq!(unexported, (BASE + 11).to_string());
}

#[test]
fn test_unwritable_export_is_refused() {
    let (_dir, config) = fake_board(&[11]);
    let export = config.sysfs_root.join("export");
    fs::remove_file(&export).unwrap();
    // a directory cannot be opened for writing, whatever the permission bits say
    fs::create_dir(&export).unwrap();

    let mut gpio = GPIO::with_config(&config).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();
    let err = gpio.setup(vec![23], Direction::OUT, None).unwrap_err();
    assert!(err.to_string().contains("write access"));
    assert_eq!(attribute(&config, 11, "direction"), "in");
}

#[test]
fn test_export_times_out() {
    let (_dir, config) = fake_board(&[]);
    let mut gpio = GPIO::with_config(&config).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();

    assert!(gpio.setup(vec![23], Direction::OUT, None).is_err());
    let exported = fs::read_to_string(config.sysfs_root.join("export")).unwrap();
    assert_eq!(exported, (BASE + 11).to_string());
}

#[test]
fn test_toggle_through_sysfs() {
    let (_dir, config) = fake_board(&[11]);
    let mut gpio = GPIO::with_config(&config).unwrap();
    gpio.setmode(Mode::BOARD).unwrap();

    let report = run_toggle(&mut gpio, 23, 100, ToggleOrder::LowHigh).unwrap();
    assert_eq!(report.writes, 200);
    assert_eq!(attribute(&config, 11, "value"), "1");

    gpio.release().unwrap();
}

#[test]
fn test_lcd_over_sysfs() {
    let pins = LcdPins::default();
    let bcm: Vec<u32> = pins
        .all()
        .iter()
        .map(|p| piglcd::gpio_pin_data::bcm_for_channel(Mode::BOARD, *p).unwrap())
        .collect();
    let (_dir, config) = fake_board(&bcm);

    let mut gpio = GPIO::with_config(&config).unwrap();
    gpio.setwarnings(false);
    gpio.setmode(Mode::BOARD).unwrap();

    let mut lcd = Glcd::new(gpio, pins);
    lcd.setup().unwrap();
    lcd.set_backlight(true).unwrap();
    // last byte written to the data bus stays on it
    lcd.write_data(Segment::Left, 0b1000_0001).unwrap();
    assert_eq!(attribute(&config, 2, "value"), "1"); // D0, physical 3
    assert_eq!(attribute(&config, 3, "value"), "0"); // D1, physical 5
    assert_eq!(attribute(&config, 9, "value"), "1"); // D7, physical 21
    assert_eq!(attribute(&config, 18, "value"), "1"); // LED, physical 12

    lcd.release().unwrap();
    for line in bcm {
        assert_eq!(attribute(&config, line, "value"), "0");
    }
}

#[test]
#[ignore = "needs a Raspberry Pi with LEDs on pins 7 and 11"]
fn test_flash_leds_pin_7() {
    let mut gpio = GPIO::new().unwrap();
    gpio.setmode(Mode::BOARD).unwrap();
    gpio.setup(vec![7, 11], Direction::OUT, Some(Level::LOW)).unwrap();

    for _ in 0..2 {
        std::thread::sleep(Duration::from_secs(1));
        gpio.output(vec![7, 11], vec![Level::HIGH, Level::HIGH]).unwrap();
        std::thread::sleep(Duration::from_secs(1));
        gpio.output(vec![7, 11], vec![Level::LOW, Level::LOW]).unwrap();
    }

    gpio.cleanup(None).unwrap();
}
