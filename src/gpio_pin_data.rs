use anyhow::anyhow;
use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::Path};

use crate::config::GpioConfig;

/// Specifies the pin numbering mode.
///
/// The pin numbering mode is used to determine the mapping between the pin numbers
/// and the GPIO channels. The pin numbering mode can be one of the following:
///
/// * `BOARD` - The pin numbers are the physical pin numbers on the 40-pin header.
/// * `BCM` - The pin numbers are the Broadcom SOC channel numbers.
/// * `WPI` - The pin numbers are the wiringPi pin numbers.
///
/// # Example
///
/// ```rust
/// use piglcd::Mode;
///
/// assert_eq!(Mode::from_str("BCM").unwrap(), Mode::BCM);
/// ```
#[derive(Debug, Eq, Hash, PartialEq, Clone, Copy)]
pub enum Mode {
    BOARD,
    BCM,
    WPI,
}

impl Mode {
    /// Converts a string to a `Mode` enum.
    ///
    /// Valid strings are `"BOARD"`, `"BCM"` and `"WPI"`, in any case.
    pub fn from_str(s: &str) -> Result<Mode> {
        match s.to_ascii_uppercase().as_str() {
            "BOARD" => Ok(Mode::BOARD),
            "BCM" => Ok(Mode::BCM),
            "WPI" => Ok(Mode::WPI),
            _ => Err(anyhow!("Invalid mode: {}", s)),
        }
    }

    /// Converts a `Mode` enum to a string.
    pub fn to_str(&self) -> &'static str {
        match self {
            Mode::BOARD => "BOARD",
            Mode::BCM => "BCM",
            Mode::WPI => "WPI",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Mode::BOARD | Mode::BCM | Mode::WPI)
    }
}

pub const RPI_1_PLUS: &str = "RPI_1_PLUS";
pub const RPI_ZERO: &str = "RPI_ZERO";
pub const RPI_ZERO_2W: &str = "RPI_ZERO_2W";
pub const RPI_2B: &str = "RPI_2B";
pub const RPI_3B: &str = "RPI_3B";
pub const RPI_3B_PLUS: &str = "RPI_3B_PLUS";
pub const RPI_3A_PLUS: &str = "RPI_3A_PLUS";
pub const RPI_4B: &str = "RPI_4B";
pub const RPI_400: &str = "RPI_400";
pub const RPI_5: &str = "RPI_5";

const RPI_MODELS: [&str; 10] = [
    RPI_1_PLUS,
    RPI_ZERO,
    RPI_ZERO_2W,
    RPI_2B,
    RPI_3B,
    RPI_3B_PLUS,
    RPI_3A_PLUS,
    RPI_4B,
    RPI_400,
    RPI_5,
];

// Longer prefixes come before the shorter ones they extend.
const MODEL_PREFIXES: [(&str, &str); 12] = [
    ("Raspberry Pi 5", RPI_5),
    ("Raspberry Pi 400", RPI_400),
    ("Raspberry Pi 4", RPI_4B),
    ("Raspberry Pi 3 Model B Plus", RPI_3B_PLUS),
    ("Raspberry Pi 3 Model A Plus", RPI_3A_PLUS),
    ("Raspberry Pi 3", RPI_3B),
    ("Raspberry Pi 2", RPI_2B),
    ("Raspberry Pi Zero 2", RPI_ZERO_2W),
    ("Raspberry Pi Zero", RPI_ZERO),
    ("Raspberry Pi Model B Plus", RPI_1_PLUS),
    ("Raspberry Pi Model A Plus", RPI_1_PLUS),
    ("Raspberry Pi Model B", ""),
];

/// Labels of the SoC GPIO controllers whose lines are routed to the header.
static SOC_GPIO_LABELS: [&str; 3] = ["pinctrl-bcm2835", "pinctrl-bcm2711", "pinctrl-rp1"];

/// One GPIO-capable pin of the 40-pin header.
///
/// The fields are:
/// - Pin number (BOARD mode)
/// - Pin number (BCM mode)
/// - Pin number (WPI mode)
/// - Default alternate function name of the pin
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinDefinition {
    pub board: u32,
    pub bcm: u32,
    pub wpi: u32,
    pub name: &'static str,
}

impl PinDefinition {
    pub fn channel(&self, mode: Mode) -> u32 {
        match mode {
            Mode::BOARD => self.board,
            Mode::BCM => self.bcm,
            Mode::WPI => self.wpi,
        }
    }
}

const fn pin(board: u32, bcm: u32, wpi: u32, name: &'static str) -> PinDefinition {
    PinDefinition {
        board,
        bcm,
        wpi,
        name,
    }
}

static PIN_DEFS: [PinDefinition; 28] = [
    pin(3, 2, 8, "SDA1"),
    pin(5, 3, 9, "SCL1"),
    pin(7, 4, 7, "GPCLK0"),
    pin(8, 14, 15, "TXD0"),
    pin(10, 15, 16, "RXD0"),
    pin(11, 17, 0, "GPIO17"),
    pin(12, 18, 1, "PCM_CLK"),
    pin(13, 27, 2, "GPIO27"),
    pin(15, 22, 3, "GPIO22"),
    pin(16, 23, 4, "GPIO23"),
    pin(18, 24, 5, "GPIO24"),
    pin(19, 10, 12, "SPI0_MOSI"),
    pin(21, 9, 13, "SPI0_MISO"),
    pin(22, 25, 6, "GPIO25"),
    pin(23, 11, 14, "SPI0_SCLK"),
    pin(24, 8, 10, "SPI0_CE0"),
    pin(26, 7, 11, "SPI0_CE1"),
    pin(27, 0, 30, "ID_SD"),
    pin(28, 1, 31, "ID_SC"),
    pin(29, 5, 21, "GPIO5"),
    pin(31, 6, 22, "GPIO6"),
    pin(32, 12, 26, "PWM0"),
    pin(33, 13, 23, "PWM1"),
    pin(35, 19, 24, "PCM_FS"),
    pin(36, 16, 27, "GPIO16"),
    pin(37, 26, 25, "GPIO26"),
    pin(38, 20, 28, "PCM_DIN"),
    pin(40, 21, 29, "PCM_DOUT"),
];

/// Contains information about a single GPIO channel.
///
/// This information is automatically gathered during the initialization of the library.
/// The fields are:
/// * `channel`: Channel number, in the numbering mode it was looked up with
/// * `bcm`: Broadcom SOC GPIO number
/// * `global_gpio`: Linux exported GPIO number (global)
/// * `global_gpio_name`: Linux exported GPIO name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel: u32,
    pub bcm: u32,
    pub global_gpio: u32,
    pub global_gpio_name: String,
}

/// Contains information about the Raspberry Pi board.
///
/// The fields are:
/// * `p1_revision`: Revision of the GPIO header (3 for every 40-pin board)
/// * `revision`: Board revision code from `/proc/cpuinfo`
/// * `ttype`: Board type
/// * `manufacturer`: Board manufacturer
/// * `processor`: SoC
#[derive(Debug, Clone)]
pub struct PiInfo {
    pub p1_revision: u32,
    pub revision: String,
    pub ttype: String,
    pub manufacturer: String,
    pub processor: String,
}

fn read_file_to_string(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(contents) => contents.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string(),
        Err(_) => String::new(),
    }
}

fn string_to_uint(s: String) -> Option<u32> {
    s.parse::<u32>().ok()
}

/// The GPIO-capable pins of the 40-pin header.
pub fn pin_defs() -> &'static [PinDefinition] {
    &PIN_DEFS
}

/// Looks up the header pin addressed by `channel` in numbering `mode`.
pub fn pin_for_channel(mode: Mode, channel: u32) -> Result<&'static PinDefinition> {
    PIN_DEFS
        .iter()
        .find(|p| p.channel(mode) == channel)
        .ok_or_else(|| anyhow!("The channel sent is invalid: {} ({} mode)", channel, mode.to_str()))
}

/// Translates `channel` in numbering `mode` into a Broadcom GPIO number.
pub fn bcm_for_channel(mode: Mode, channel: u32) -> Result<u32> {
    Ok(pin_for_channel(mode, channel)?.bcm)
}

fn model_from_device_tree(model: &str) -> Result<Option<&'static str>> {
    for (prefix, constant) in MODEL_PREFIXES.iter() {
        if model.starts_with(*prefix) {
            if constant.is_empty() {
                anyhow::bail!("{} has a 26-pin header, which is not supported", model);
            }
            return Ok(Some(*constant));
        }
    }
    Ok(None)
}

/// Determines the board model constant.
///
/// The device tree is consulted first; the configured model name (normally
/// from `RPI_MODEL_NAME`, for containers without a device tree) is the
/// fallback.
pub fn get_model(config: &GpioConfig) -> Result<String> {
    let model_path = config.device_tree_root.join("model");
    let model = read_file_to_string(&model_path);
    if !model.is_empty() {
        if let Some(constant) = model_from_device_tree(&model)? {
            return Ok(String::from(constant));
        }
        log::warn!("Unrecognised board '{}' in {}", model, model_path.display());
    }

    if let Some(model_name) = &config.model_name {
        if RPI_MODELS.contains(&model_name.as_str()) {
            return Ok(model_name.clone());
        }
        log::warn!("Model name override '{}' is invalid.", model_name);
    }

    anyhow::bail!("Could not determine Raspberry Pi model")
}

fn read_revision(config: &GpioConfig) -> String {
    let cpuinfo = read_file_to_string(&config.cpuinfo_path);
    for line in cpuinfo.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim() == "Revision" {
                return value.trim().to_string();
            }
        }
    }
    String::from("Unknown")
}

pub fn get_pi_info(model: &str, config: &GpioConfig) -> Result<PiInfo> {
    let (ttype, processor) = match model {
        m if m == RPI_1_PLUS => ("Pi Model B+/A+", "BCM2835"),
        m if m == RPI_ZERO => ("Pi Zero", "BCM2835"),
        m if m == RPI_ZERO_2W => ("Pi Zero 2 W", "BCM2710A1"),
        m if m == RPI_2B => ("Pi 2 Model B", "BCM2836"),
        m if m == RPI_3B => ("Pi 3 Model B", "BCM2837"),
        m if m == RPI_3B_PLUS => ("Pi 3 Model B+", "BCM2837B0"),
        m if m == RPI_3A_PLUS => ("Pi 3 Model A+", "BCM2837B0"),
        m if m == RPI_4B => ("Pi 4 Model B", "BCM2711"),
        m if m == RPI_400 => ("Pi 400", "BCM2711"),
        m if m == RPI_5 => ("Pi 5", "BCM2712"),
        _ => anyhow::bail!("No info found for model {}", model),
    };

    Ok(PiInfo {
        p1_revision: 3,
        revision: read_revision(config),
        ttype: String::from(ttype),
        manufacturer: String::from("Raspberry Pi Ltd"),
        processor: String::from(processor),
    })
}

/// Finds the sysfs base number of the SoC GPIO controller.
fn find_soc_chip_base(config: &GpioConfig) -> Result<u32> {
    let entries = fs::read_dir(&config.sysfs_root)
        .with_context(|| format!("Cannot read {}", config.sysfs_root.display()))?;

    let mut chip_names: Vec<String> = Vec::new();
    for entry in entries {
        let file_name = entry?.file_name().to_string_lossy().into_owned();
        if file_name.starts_with("gpiochip") {
            chip_names.push(file_name);
        }
    }
    chip_names.sort();

    for chip_name in chip_names.iter() {
        let chip_dir = config.sysfs_root.join(chip_name);
        let label = read_file_to_string(&chip_dir.join("label"));
        if !SOC_GPIO_LABELS.contains(&label.as_str()) {
            continue;
        }

        // the header pins must fit inside the controller
        let ngpio = string_to_uint(read_file_to_string(&chip_dir.join("ngpio"))).unwrap_or(0);
        if ngpio < 28 {
            continue;
        }

        if let Some(base) = string_to_uint(read_file_to_string(&chip_dir.join("base"))) {
            log::debug!("Using {} ({}) with base {}", chip_name, label, base);
            return Ok(base);
        }
    }

    anyhow::bail!(
        "Cannot find the SoC GPIO chip under {}",
        config.sysfs_root.display()
    )
}

pub(crate) fn get_data(
    config: &GpioConfig,
) -> Result<(String, PiInfo, HashMap<Mode, HashMap<u32, ChannelInfo>>)> {
    let model = get_model(config)?;
    let pi_info = get_pi_info(model.as_str(), config)?;
    let base = find_soc_chip_base(config)?;

    let mut channel_data: HashMap<Mode, HashMap<u32, ChannelInfo>> = HashMap::new();
    for mode in [Mode::BOARD, Mode::BCM, Mode::WPI] {
        let mut data: HashMap<u32, ChannelInfo> = HashMap::new();
        for pin_def in PIN_DEFS.iter() {
            let gpio = base + pin_def.bcm;
            let ch_info = ChannelInfo {
                channel: pin_def.channel(mode),
                bcm: pin_def.bcm,
                global_gpio: gpio,
                global_gpio_name: format!("gpio{}", gpio),
            };
            data.insert(ch_info.channel, ch_info);
        }
        channel_data.insert(mode, data);
    }

    Ok((model, pi_info, channel_data))
}
