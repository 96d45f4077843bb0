//! I2C (TWI) backend: address-based reads and writes.
//!
//! Besides plain reads and writes, the WILC driver issues a combined
//! "write-with-prefix" transaction: two caller buffers sent back to back as
//! one transfer. The vendor code concatenated them into a static scratch
//! buffer without checking the combined length; here the scratch is owned
//! by the transport and the bounds check happens before any copy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_size, unsupported, BusCapabilities, BusKind, IoctlRequest, Transport};
use crate::error::Result;
use crate::hal::{I2cHal, I2cSetup};
use crate::tracing::prelude::*;

/// Seven-bit address of the WILC on the I2C bus.
pub const DEFAULT_DEVICE_ADDRESS: u8 = 0x60;

/// I2C bus parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct I2cConfig {
    /// Seven-bit device address.
    pub address: u8,

    /// Bit clock in Hz.
    pub speed_hz: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_DEVICE_ADDRESS,
            speed_hz: 400_000,
        }
    }
}

/// I2C transport for the WILC link.
pub struct I2c<H> {
    hal: H,
    config: I2cConfig,
    caps: BusCapabilities,
    /// Concatenation area for write-prefixed transactions only.
    scratch: Box<[u8]>,
}

impl<H: I2cHal> I2c<H> {
    pub fn new(hal: H, config: I2cConfig) -> Self {
        let caps = BusCapabilities::default();
        Self {
            hal,
            config,
            caps,
            scratch: vec![0; caps.max_trx_size].into_boxed_slice(),
        }
    }

    fn write_prefixed(&mut self, prefix: &[u8], data: &[u8]) -> Result<()> {
        let combined = prefix.len() + data.len();
        // Checked before any copy; the vendor code overflowed here.
        check_size(&self.caps, combined)?;

        self.scratch[..prefix.len()].copy_from_slice(prefix);
        self.scratch[prefix.len()..combined].copy_from_slice(data);
        self.hal.write(self.config.address, &self.scratch[..combined])
    }
}

#[async_trait]
impl<H: I2cHal> Transport for I2c<H> {
    fn capabilities(&self) -> BusCapabilities {
        self.caps
    }

    async fn init(&mut self) -> Result<()> {
        debug!(
            address = format_args!("0x{:02X}", self.config.address),
            speed_hz = self.config.speed_hz,
            "Configuring I2C peripheral"
        );
        self.hal.configure(&I2cSetup {
            speed_hz: self.config.speed_hz,
        })
    }

    async fn ioctl(&mut self, request: IoctlRequest<'_>) -> Result<()> {
        match request {
            IoctlRequest::Read { buf } => {
                check_size(&self.caps, buf.len())?;
                self.hal.read(self.config.address, buf)
            }
            IoctlRequest::Write { buf } => {
                check_size(&self.caps, buf.len())?;
                self.hal.write(self.config.address, buf)
            }
            IoctlRequest::WritePrefixed { prefix, data } => self.write_prefixed(prefix, data),
            other => Err(unsupported(BusKind::I2c, &other)),
        }
    }

    async fn deinit(&mut self) -> Result<()> {
        self.hal.disable();
        Ok(())
    }
}
