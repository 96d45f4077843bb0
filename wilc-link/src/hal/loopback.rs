//! In-memory HAL implementations.
//!
//! A loopback SPI peripheral that echoes every transmitted byte, and an
//! I2C peripheral exposing a byte FIFO. The demo daemon runs the full
//! transport stack against these; tests use them where fault injection is
//! not needed.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::hal::{CsLevel, I2cHal, I2cSetup, SpiHal, SpiSetup};

/// SPI peripheral fake whose MISO mirrors MOSI.
#[derive(Debug, Default)]
pub struct LoopbackSpi {
    enabled: bool,
    cs: CsLevel,
    rdr: Option<u8>,
}

impl LoopbackSpi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chip_select(&self) -> CsLevel {
        self.cs
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl SpiHal for LoopbackSpi {
    fn configure(&mut self, _setup: &SpiSetup) -> Result<()> {
        Ok(())
    }

    fn enable(&mut self) -> Result<()> {
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn set_chip_select(&mut self, level: CsLevel) {
        self.cs = level;
    }

    fn write_data(&mut self, byte: u8) -> Result<()> {
        if !self.enabled {
            return Err(Error::Bus("SPI peripheral is disabled".into()));
        }
        self.rdr = Some(byte);
        Ok(())
    }

    fn rx_ready(&mut self) -> Result<bool> {
        Ok(self.rdr.is_some())
    }

    fn read_data(&mut self) -> Result<u8> {
        self.rdr
            .take()
            .ok_or_else(|| Error::Bus("SPI receive register is empty".into()))
    }

    fn reset_device(&mut self) {}
}

/// I2C peripheral fake: writes push bytes into a FIFO, reads pop them
/// (zero-filled once empty).
#[derive(Debug, Default)]
pub struct LoopbackI2c {
    enabled: bool,
    fifo: VecDeque<u8>,
}

impl LoopbackI2c {
    pub fn new() -> Self {
        Self::default()
    }
}

impl I2cHal for LoopbackI2c {
    fn configure(&mut self, _setup: &I2cSetup) -> Result<()> {
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn write(&mut self, _addr: u8, buf: &[u8]) -> Result<()> {
        if !self.enabled {
            return Err(Error::Bus("I2C peripheral is disabled".into()));
        }
        self.fifo.extend(buf);
        Ok(())
    }

    fn read(&mut self, _addr: u8, buf: &mut [u8]) -> Result<()> {
        if !self.enabled {
            return Err(Error::Bus("I2C peripheral is disabled".into()));
        }
        for byte in buf.iter_mut() {
            *byte = self.fifo.pop_front().unwrap_or(0);
        }
        Ok(())
    }
}
