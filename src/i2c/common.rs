// Licensed under the Apache-2.0 license

//! Configuration and shared vocabulary of the I2C engine.

use crate::i2c::error::Error;
use fugit::MillisDurationU32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

impl I2cSpeed {
    pub fn hz(self) -> u32 {
        self as u32
    }
}

/// Data-movement strategy, fixed when the controller is initialized.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cXferMode {
    DmaMode,
    BuffMode,
    ByteMode,
}

/// Events delivered to a registered slave target.
///
/// A complete exchange is observed as `SlaveWrReq, SlaveWrRecvd*,
/// [SlaveRdReq, SlaveRdProc*], SlaveStop`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cSEvent {
    SlaveRdReq,
    SlaveWrReq,
    SlaveRdProc,
    SlaveWrRecvd,
    SlaveStop,
}

/// Status information for I2C slave operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlaveStatus {
    /// Whether slave mode is currently enabled
    pub enabled: bool,
    /// Current slave address (if enabled)
    pub address: Option<u8>,
    /// Whether a remote master is mid-exchange with this target
    pub operating: bool,
    /// Last slave event that occurred
    pub last_event: Option<I2cSEvent>,
    /// Error recorded when an exchange was cut short locally
    pub error: Option<Error>,
}

/// Manual timing overrides. Zero fields keep the computed value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TimingConfig {
    pub manual_scl_high: u8,
    pub manual_scl_low: u8,
    pub manual_sda_hold: u8,
    /// Overrides the APB clock reported by the hardware, in Hz.
    pub clk_src: u32,
}

pub const DEFAULT_XFER_TIMEOUT_MS: u32 = 1000;

#[derive(Copy, Clone, Debug)]
pub struct I2cConfig {
    pub xfer_mode: I2cXferMode,
    pub multi_master: bool,
    pub smbus_timeout: bool,
    pub smbus_alert: bool,
    pub timing_config: TimingConfig,
    pub speed: I2cSpeed,
    /// Bound on how long a blocking master transfer waits for completion.
    pub xfer_timeout: MillisDurationU32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        I2cConfigBuilder::new().build()
    }
}

pub struct I2cConfigBuilder {
    xfer_mode: I2cXferMode,
    multi_master: bool,
    smbus_timeout: bool,
    smbus_alert: bool,
    timing_config: Option<TimingConfig>,
    speed: I2cSpeed,
    xfer_timeout: MillisDurationU32,
}

impl Default for I2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            xfer_mode: I2cXferMode::ByteMode,
            multi_master: false,
            smbus_alert: false,
            smbus_timeout: false,
            timing_config: None,
            speed: I2cSpeed::Standard,
            xfer_timeout: MillisDurationU32::millis(DEFAULT_XFER_TIMEOUT_MS),
        }
    }
    #[must_use]
    pub fn xfer_mode(mut self, mode: I2cXferMode) -> Self {
        self.xfer_mode = mode;
        self
    }
    #[must_use]
    pub fn multi_master(mut self, enabled: bool) -> Self {
        self.multi_master = enabled;
        self
    }
    #[must_use]
    pub fn smbus_alert(mut self, enabled: bool) -> Self {
        self.smbus_alert = enabled;
        self
    }
    #[must_use]
    pub fn smbus_timeout(mut self, enabled: bool) -> Self {
        self.smbus_timeout = enabled;
        self
    }
    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn timing_config(mut self, config: TimingConfig) -> Self {
        self.timing_config = Some(config);
        self
    }
    #[must_use]
    pub fn xfer_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.xfer_timeout = timeout;
        self
    }
    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            xfer_mode: self.xfer_mode,
            multi_master: self.multi_master,
            smbus_timeout: self.smbus_timeout,
            smbus_alert: self.smbus_alert,
            timing_config: self.timing_config.unwrap_or_default(),
            speed: self.speed,
            xfer_timeout: self.xfer_timeout,
        }
    }
}
