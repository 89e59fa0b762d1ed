use anyhow::{Context, Error};
use std::{
    collections::HashMap,
    fs::{self, File},
    io::{Seek, Write},
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use crate::backend::PinWriter;
use crate::config::GpioConfig;
use crate::gpio_pin_data::{get_data, ChannelInfo, Mode, PiInfo};

/// Specifies the GPIO pin value in output mode.
///
/// * `LOW` - 0
/// * `HIGH` - 1
///
/// # Example
///
/// When writing to a GPIO pin, you must specify the value. For example, to set
/// GPIO pin 7 to HIGH and GPIO pin 11 to LOW:
///
/// ```no_run
/// use piglcd::{GPIO, Level, Direction, Mode};
///
/// let mut gpio = GPIO::new().unwrap();
/// gpio.setmode(Mode::BOARD).unwrap();
///
/// gpio.setup(vec![7, 11], Direction::OUT, None).unwrap();
/// gpio.output(vec![7, 11], vec![Level::HIGH, Level::LOW]).unwrap();
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Level {
    LOW = 0,
    HIGH = 1,
}

impl Level {
    fn as_sysfs(self) -> &'static [u8] {
        match self {
            Level::HIGH => b"1",
            Level::LOW => b"0",
        }
    }
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value {
            Level::HIGH
        } else {
            Level::LOW
        }
    }
}

/// Specifies the GPIO pin direction.
///
/// * `IN` - Input
/// * `OUT` - Output
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Direction {
    OUT = 0,
    IN = 1,
}

impl Direction {
    fn as_sysfs(self) -> &'static str {
        match self {
            Direction::OUT => "out",
            Direction::IN => "in",
        }
    }
}

/// Thin wrapper around the sysfs GPIO class directory.
struct Sysfs {
    root: PathBuf,
    export_timeout: Duration,
}

impl Sysfs {
    fn gpio_dir(&self, ch_info: &ChannelInfo) -> PathBuf {
        self.root.join(&ch_info.global_gpio_name)
    }

    fn check_write_access(&self) -> Result<(), Error> {
        for name in ["export", "unexport"] {
            let path = self.root.join(name);
            // opening for write without writing has no effect on sysfs
            fs::OpenOptions::new()
                .write(true)
                .open(&path)
                .with_context(|| {
                    format!(
                        "You do not have write access to the GPIO sysfs interface ({})",
                        path.display()
                    )
                })?;
        }
        Ok(())
    }

    /// Current configuration of a channel as reported by sysfs.
    fn channel_configuration(&self, ch_info: &ChannelInfo) -> Option<Direction> {
        let gpio_dir = self.gpio_dir(ch_info);
        if !gpio_dir.exists() {
            return None;
        }

        match fs::read_to_string(gpio_dir.join("direction")).ok()?.trim() {
            "in" => Some(Direction::IN),
            "out" => Some(Direction::OUT),
            _ => None,
        }
    }

    fn export(&self, ch_info: &ChannelInfo) -> Result<(), Error> {
        let gpio_dir = self.gpio_dir(ch_info);
        if !gpio_dir.exists() {
            log::debug!("Exporting {}", ch_info.global_gpio_name);
            write_attribute(&self.root.join("export"), ch_info.global_gpio.to_string().as_bytes())?;
        }

        let value_path = gpio_dir.join("value");
        let start = Instant::now();
        while !value_path.exists() {
            if start.elapsed() > self.export_timeout {
                anyhow::bail!("Timed out waiting for {} to appear", value_path.display());
            }
            thread::sleep(Duration::from_millis(10));
        }

        Ok(())
    }

    fn unexport(&self, ch_info: &ChannelInfo) -> Result<(), Error> {
        if self.gpio_dir(ch_info).exists() {
            log::debug!("Unexporting {}", ch_info.global_gpio_name);
            write_attribute(&self.root.join("unexport"), ch_info.global_gpio.to_string().as_bytes())?;
        }
        Ok(())
    }

    fn write_direction(&self, ch_info: &ChannelInfo, direction: Direction) -> Result<(), Error> {
        let path = self.gpio_dir(ch_info).join("direction");
        fs::write(&path, direction.as_sysfs())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn open_value(&self, ch_info: &ChannelInfo) -> Result<File, Error> {
        let path = self.gpio_dir(ch_info).join("value");
        fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))
    }

    fn read_value(&self, ch_info: &ChannelInfo) -> Result<String, Error> {
        let path = self.gpio_dir(ch_info).join("value");
        let value = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(value.trim().to_string())
    }
}

fn write_attribute(path: &Path, value: &[u8]) -> Result<(), Error> {
    let mut f = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    f.write_all(value)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn output_one(value_file: &File, value: Level) -> Result<(), Error> {
    let mut f = value_file;
    f.rewind()?;
    f.write_all(value.as_sysfs())?;
    Ok(())
}

/// A public struct that holds state information about the GPIO pins.
///
/// GPIO access goes through the kernel's sysfs interface, one `write(2)` per
/// level change.
///
/// Public fields:
/// * `model` - The model of the Raspberry Pi board
/// * `pi_info` - A `PiInfo` struct that holds information about the board
///
/// # Example
///
/// ```no_run
/// use piglcd::GPIO;
///
/// let gpio = GPIO::new().unwrap();
/// println!("{}", gpio.pi_info.ttype);
/// ```
pub struct GPIO {
    pub model: String,
    pub pi_info: PiInfo,
    sysfs: Sysfs,
    channel_data_by_mode: HashMap<Mode, HashMap<u32, ChannelInfo>>,

    // lookup table for the active numbering mode
    channel_data: HashMap<u32, ChannelInfo>,

    gpio_warnings: bool,
    gpio_mode: Option<Mode>,
    channel_configuration: HashMap<u32, Direction>,
    value_files: HashMap<u32, File>,
}

impl GPIO {
    /// Creates a new `GPIO` object for the board described by the environment.
    ///
    /// Calling this function will automatically populate the `model` and `pi_info` fields.
    pub fn new() -> Result<Self, Error> {
        GPIO::with_config(&GpioConfig::from_env())
    }

    pub fn with_config(config: &GpioConfig) -> Result<Self, Error> {
        let (model, pi_info, channel_data_by_mode) = get_data(config)?;

        Ok(GPIO {
            model,
            pi_info,
            sysfs: Sysfs {
                root: config.sysfs_root.clone(),
                export_timeout: config.export_timeout,
            },
            channel_data_by_mode,

            channel_data: HashMap::new(),

            gpio_warnings: true,
            gpio_mode: None,
            channel_configuration: HashMap::new(),
            value_files: HashMap::new(),
        })
    }

    /// Enable or disable warnings during setup and cleanup.
    ///
    /// # Arguments
    ///
    /// * `warnings` - `true` to enable warnings, `false` to disable warnings
    pub fn setwarnings(&mut self, warnings: bool) {
        self.gpio_warnings = warnings;
    }

    /// Sets the pin numbering mode.
    ///
    /// Possible mode values are
    /// * `Mode::BOARD`
    /// * `Mode::BCM`
    /// * `Mode::WPI`
    ///
    /// # Arguments
    ///
    /// * `mode` - The pin numbering mode to use
    pub fn setmode(&mut self, mode: Mode) -> Result<(), Error> {
        // check if a different mode has been set already
        if let Some(current_mode) = self.gpio_mode {
            if current_mode != mode {
                anyhow::bail!("A different mode has already been set!");
            }
        }

        if !mode.is_valid() {
            anyhow::bail!("An invalid mode was passed to setmode!");
        }

        self.channel_data = self
            .channel_data_by_mode
            .get(&mode)
            .cloned()
            .unwrap_or_default();
        self.gpio_mode = Some(mode);

        Ok(())
    }

    /// Returns the currently set pin numbering mode.
    pub fn getmode(&self) -> Option<Mode> {
        self.gpio_mode
    }

    fn validate_mode_set(&self) -> Result<(), Error> {
        match self.gpio_mode {
            Some(_) => Ok(()),
            None => Err(Error::msg("Please set pin numbering mode using setmode(Mode::BOARD), setmode(Mode::BCM) or setmode(Mode::WPI)")),
        }
    }

    fn channel_to_info(&self, channel: u32) -> Result<ChannelInfo, Error> {
        self.validate_mode_set()?;
        self.channel_data
            .get(&channel)
            .cloned()
            .ok_or_else(|| Error::msg(format!("The channel sent is invalid: {}", channel)))
    }

    fn channels_to_infos(&self, channels: &[u32]) -> Result<Vec<ChannelInfo>, Error> {
        self.validate_mode_set()?;
        channels.iter().map(|c| self.channel_to_info(*c)).collect()
    }

    /// Current configuration of a channel as requested by this process.
    fn app_channel_configuration(&self, ch_info: &ChannelInfo) -> Option<Direction> {
        self.channel_configuration.get(&ch_info.channel).copied()
    }

    fn cleanup_one(&mut self, ch_info: &ChannelInfo) -> Result<(), Error> {
        self.value_files.remove(&ch_info.channel);
        if self.channel_configuration.remove(&ch_info.channel).is_some() {
            self.sysfs.unexport(ch_info)?;
        }
        Ok(())
    }

    fn cleanup_all(&mut self) -> Result<(), Error> {
        let channels: Vec<u32> = self.channel_configuration.keys().copied().collect();
        for channel in channels {
            let ch_info = self.channel_to_info(channel)?;
            self.cleanup_one(&ch_info)?;
        }

        self.gpio_mode = None;

        Ok(())
    }

    fn setup_single_out(&mut self, ch_info: &ChannelInfo, initial: Option<Level>) -> Result<(), Error> {
        self.sysfs.export(ch_info)?;
        self.sysfs.write_direction(ch_info, Direction::OUT)?;

        let value_file = self.sysfs.open_value(ch_info)?;
        if let Some(level) = initial {
            output_one(&value_file, level)?;
        }

        self.value_files.insert(ch_info.channel, value_file);
        self.channel_configuration
            .insert(ch_info.channel, Direction::OUT);
        Ok(())
    }

    fn setup_single_in(&mut self, ch_info: &ChannelInfo) -> Result<(), Error> {
        self.sysfs.export(ch_info)?;
        self.sysfs.write_direction(ch_info, Direction::IN)?;

        self.channel_configuration
            .insert(ch_info.channel, Direction::IN);
        Ok(())
    }

    /// Setup a channel or list of channels with a direction and (optional) initial value.
    ///
    /// # Arguments
    ///
    /// * `channels` - A list of channels to setup.
    /// * `direction` - `Direction::IN` or `Direction::OUT`
    /// * `initial` - An optional initial level for an output channel.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use piglcd::{GPIO, Direction, Mode};
    ///
    /// let mut gpio = GPIO::new().unwrap();
    /// gpio.setmode(Mode::BOARD).unwrap();
    /// gpio.setup(vec![7], Direction::OUT, None).unwrap();
    /// ```
    pub fn setup(&mut self, channels: Vec<u32>, direction: Direction, initial: Option<Level>) -> Result<(), Error> {
        self.sysfs.check_write_access()?;

        let ch_infos = self.channels_to_infos(&channels)?;

        if direction == Direction::IN && initial.is_some() {
            anyhow::bail!("initial parameter is not valid for inputs");
        }

        if self.gpio_warnings {
            for ch_info in ch_infos.iter() {
                let sysfs_cfg = self.sysfs.channel_configuration(ch_info);
                let app_cfg = self.app_channel_configuration(ch_info);

                // warn if channel has been setup external to current program
                if app_cfg.is_none() && sysfs_cfg.is_some() {
                    log::warn!("Channel {} is already in use, continuing anyway. Use setwarnings(false) to disable warnings", ch_info.channel);
                }
            }
        }

        // cleanup if the channel is already setup
        for ch_info in ch_infos.iter() {
            if self.channel_configuration.contains_key(&ch_info.channel) {
                self.cleanup_one(ch_info)?;
            }
        }

        for ch_info in ch_infos.iter() {
            match direction {
                Direction::OUT => self.setup_single_out(ch_info, initial)?,
                Direction::IN => self.setup_single_in(ch_info)?,
            }
        }

        Ok(())
    }

    /// Cleans up channels at the end of the program.
    ///
    /// # Arguments
    ///
    /// * `channels` - An optional list of channels to cleanup. If no channel is provided, all channels are cleaned.
    pub fn cleanup(&mut self, channels: Option<Vec<u32>>) -> Result<(), Error> {
        // warn if no channel is setup
        if self.gpio_mode.is_none() {
            if self.gpio_warnings {
                log::warn!("No channels have been set up yet - nothing to clean up! Try cleaning up at the end of your program instead!");
            }
            return Ok(());
        }

        let channels = match channels {
            Some(channels) => channels,
            None => return self.cleanup_all(),
        };

        for ch_info in self.channels_to_infos(&channels)? {
            if self.channel_configuration.contains_key(&ch_info.channel) {
                self.cleanup_one(&ch_info)?;
            }
        }

        Ok(())
    }

    /// Returns the current value of the specified channel.
    ///
    /// Return either `Level::HIGH` or `Level::LOW`.
    ///
    /// # Arguments
    ///
    /// * `channel` - The channel to read from.
    pub fn input(&self, channel: u32) -> Result<Level, Error> {
        let ch_info = self.channel_to_info(channel)?;

        if self.app_channel_configuration(&ch_info).is_none() {
            anyhow::bail!("You must setup() the GPIO channel first");
        }

        match self.sysfs.read_value(&ch_info)?.as_str() {
            "0" => Ok(Level::LOW),
            _ => Ok(Level::HIGH),
        }
    }

    /// Writes a value to channels.
    ///
    /// # Arguments
    ///
    /// * `channels` - A list of channels to write to.
    /// * `values` - A list of values to write to the channels. Must be either HIGH or LOW.
    ///
    /// # Example
    /// ```no_run
    /// use piglcd::{GPIO, Direction, Level, Mode};
    ///
    /// let mut gpio = GPIO::new().unwrap();
    /// gpio.setmode(Mode::BOARD).unwrap();
    /// gpio.setup(vec![7], Direction::OUT, None).unwrap();
    /// gpio.output(vec![7], vec![Level::HIGH]).unwrap();
    /// ```
    pub fn output(&self, channels: Vec<u32>, values: Vec<Level>) -> Result<(), Error> {
        if values.len() != channels.len() {
            anyhow::bail!("Number of values != number of channels");
        }

        let ch_infos = self.channels_to_infos(&channels)?;

        // check that channels have been set as output
        for ch_info in ch_infos.iter() {
            if self.app_channel_configuration(ch_info) != Some(Direction::OUT) {
                anyhow::bail!("The GPIO channel has not been set up as an OUTPUT");
            }
        }

        for (channel, value) in channels.iter().zip(values) {
            self.output_one(*channel, value)?;
        }

        Ok(())
    }

    /// Writes a single level to a channel set up as output.
    ///
    /// Skips the list handling of [`GPIO::output`]; this is what the toggle
    /// benchmark drives.
    pub fn output_one(&self, channel: u32, value: Level) -> Result<(), Error> {
        match self.value_files.get(&channel) {
            Some(value_file) => output_one(value_file, value),
            None => {
                self.validate_mode_set()?;
                anyhow::bail!("The GPIO channel has not been set up as an OUTPUT")
            }
        }
    }
}

impl PinWriter for GPIO {
    fn setup_output(&mut self, channel: u32, initial: Option<Level>) -> Result<(), Error> {
        self.setup(vec![channel], Direction::OUT, initial)
    }

    fn write(&mut self, channel: u32, level: Level) -> Result<(), Error> {
        self.output_one(channel, level)
    }

    fn release(&mut self) -> Result<(), Error> {
        self.cleanup(None)
    }
}

impl Drop for GPIO {
    fn drop(&mut self) {
        if self.channel_configuration.is_empty() {
            return;
        }
        if let Err(e) = self.cleanup_all() {
            log::warn!("Failed to clean up GPIO channels: {:#}", e);
        }
    }
}
