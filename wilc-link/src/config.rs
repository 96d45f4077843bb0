//! Configuration for wilc-link.
//!
//! Defaults match the SAM evaluation-board wiring; operational knobs can be
//! overridden through WILC_LINK_* environment variables.

use serde::{Deserialize, Serialize};

use crate::transport::i2c::I2cConfig;
use crate::transport::spi::SpiConfig;
use crate::transport::BusKind;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Bus carrying the WILC link.
    pub bus: BusKind,

    /// SPI parameters, used when `bus` is `spi`.
    pub spi: SpiConfig,

    /// I2C parameters, used when `bus` is `i2c` and for the touch device.
    pub i2c: I2cConfig,

    /// Touch-sensor poll parameters.
    pub touch: TouchConfig,
}

/// Touch-sensor poll parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TouchConfig {
    /// Window suppressing key re-fires, in milliseconds.
    pub debounce_ms: u32,

    /// Frequency of the cycle counter feeding the debounce timer, Hz.
    pub clock_hz: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusKind::Spi,
            spi: SpiConfig::default(),
            i2c: I2cConfig::default(),
            touch: TouchConfig {
                debounce_ms: 200,
                clock_hz: 48_000_000,
            },
        }
    }
}

impl Config {
    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(limit) = env_u32("WILC_LINK_SPI_POLL_LIMIT") {
            config.spi.poll_limit = limit;
        }
        if let Some(clock_hz) = env_u32("WILC_LINK_SPI_CLOCK_HZ") {
            config.spi.clock_hz = clock_hz;
        }
        if let Some(debounce_ms) = env_u32("WILC_LINK_TOUCH_DEBOUNCE_MS") {
            config.touch.debounce_ms = debounce_ms;
        }
        config
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
