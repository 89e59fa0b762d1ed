use anyhow::{Context, Result};
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

static SYSFS_ROOT: &str = "/sys/class/gpio";
static DEVICE_TREE_ROOT: &str = "/proc/device-tree";
static CPUINFO_PATH: &str = "/proc/cpuinfo";

/// Where the library looks for the board and its GPIO interface.
///
/// The defaults point at the real system locations. Tests and containers can
/// redirect them, either directly or through the environment (see
/// [`GpioConfig::from_env`]).
#[derive(Debug, Clone)]
pub struct GpioConfig {
    pub sysfs_root: PathBuf,
    pub device_tree_root: PathBuf,
    pub cpuinfo_path: PathBuf,
    /// Model constant used when the device tree does not identify the board.
    pub model_name: Option<String>,
    /// How long `setup()` waits for the kernel to create an exported GPIO's
    /// `value` attribute.
    pub export_timeout: Duration,
}

impl Default for GpioConfig {
    fn default() -> Self {
        GpioConfig {
            sysfs_root: PathBuf::from(SYSFS_ROOT),
            device_tree_root: PathBuf::from(DEVICE_TREE_ROOT),
            cpuinfo_path: PathBuf::from(CPUINFO_PATH),
            model_name: None,
            export_timeout: Duration::from_secs(1),
        }
    }
}

impl GpioConfig {
    /// Builds the default configuration, then applies overrides from
    /// `PIGLCD_SYSFS_ROOT`, `PIGLCD_DEVICE_TREE` and `RPI_MODEL_NAME`.
    pub fn from_env() -> Self {
        let mut config = GpioConfig::default();
        if let Ok(root) = env::var("PIGLCD_SYSFS_ROOT") {
            config.sysfs_root = PathBuf::from(root);
        }
        if let Ok(root) = env::var("PIGLCD_DEVICE_TREE") {
            config.device_tree_root = PathBuf::from(root);
        }
        if let Ok(model) = env::var("RPI_MODEL_NAME") {
            config.model_name = Some(model.trim().to_string());
        }
        config
    }
}

/// Physical wiring of a KS0108 graphic LCD module.
///
/// Pin numbers are interpreted in whatever numbering mode the backend was
/// opened with. The default is the layout used by the `lcd_demo` binary, in
/// `BOARD` numbering.
///
/// A layout can be loaded from TOML:
///
/// ```toml
/// rs = 24
/// e = 26
/// data = [3, 5, 7, 11, 13, 15, 19, 21]
/// cs1 = 16
/// cs2 = 18
/// rst = 8
/// led = 12
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LcdPins {
    pub rs: u32,
    pub e: u32,
    pub data: [u32; 8],
    pub cs1: u32,
    pub cs2: u32,
    pub rst: u32,
    pub led: u32,
}

impl Default for LcdPins {
    fn default() -> Self {
        LcdPins {
            rs: 24,
            e: 26,
            data: [3, 5, 7, 11, 13, 15, 19, 21],
            cs1: 16,
            cs2: 18,
            rst: 8,
            led: 12,
        }
    }
}

impl LcdPins {
    pub fn from_toml(s: &str) -> Result<LcdPins> {
        toml::from_str(s).context("Invalid LCD pin layout")
    }

    pub fn load(path: &Path) -> Result<LcdPins> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read LCD pin layout {}", path.display()))?;
        LcdPins::from_toml(&contents)
    }

    /// Every pin of the layout, control pins first.
    pub fn all(&self) -> Vec<u32> {
        let mut pins = vec![self.rs, self.e];
        pins.extend_from_slice(&self.data);
        pins.extend_from_slice(&[self.cs1, self.cs2, self.rst, self.led]);
        pins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_layout_keeps_defaults() {
        let pins = LcdPins::from_toml("rs = 7\nled = 40\n").unwrap();
        assert_eq!(pins.rs, 7);
        assert_eq!(pins.led, 40);
        assert_eq!(pins.e, 26);
        assert_eq!(pins.data, [3, 5, 7, 11, 13, 15, 19, 21]);
    }

    #[test]
    fn short_data_bus_is_rejected() {
        assert!(LcdPins::from_toml("data = [1, 2, 3]").is_err());
    }

    #[test]
    fn all_lists_fourteen_pins() {
        let pins = LcdPins::default().all();
        assert_eq!(pins.len(), 14);
        assert_eq!(&pins[..2], &[24, 26]);
        assert_eq!(&pins[10..], &[16, 18, 8, 12]);
    }
}
