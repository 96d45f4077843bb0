//! SDIO backend: CMD52/CMD53 passthrough.
//!
//! The shim carries these command records to the board's SDIO routines
//! without interpreting them; their fields mirror the IO_RW_DIRECT and
//! IO_RW_EXTENDED arguments of the SDIO specification.

use async_trait::async_trait;

use super::{check_size, unsupported, BusCapabilities, BusKind, IoctlRequest, Transport};
use crate::error::Result;
use crate::hal::SdioHal;
use crate::tracing::prelude::*;

/// Direction of an SDIO data command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdioDirection {
    Read,
    Write,
}

/// CMD52 (IO_RW_DIRECT): single-byte register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdioCmd52 {
    pub direction: SdioDirection,
    /// Card function number.
    pub function: u8,
    /// Read-after-write flag.
    pub raw: bool,
    /// 17-bit register address.
    pub address: u32,
    /// Byte to write; receives the card's byte on reads.
    pub data: u8,
}

/// CMD53 (IO_RW_EXTENDED): multi-byte transfer. The data buffer travels
/// alongside in [`IoctlRequest::Cmd53`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdioCmd53 {
    pub direction: SdioDirection,
    /// Card function number.
    pub function: u8,
    /// Block mode rather than byte mode.
    pub block_mode: bool,
    /// Increment the card address per byte.
    pub increment_addr: bool,
    /// 17-bit start address.
    pub address: u32,
    /// Byte count, or block count in block mode.
    pub count: u32,
    /// Block size when `block_mode` is set.
    pub block_size: u32,
}

/// SDIO transport for the WILC link.
pub struct Sdio<H> {
    hal: H,
    caps: BusCapabilities,
}

impl<H: SdioHal> Sdio<H> {
    pub fn new(hal: H) -> Self {
        Self {
            hal,
            caps: BusCapabilities::default(),
        }
    }
}

#[async_trait]
impl<H: SdioHal> Transport for Sdio<H> {
    fn capabilities(&self) -> BusCapabilities {
        self.caps
    }

    async fn init(&mut self) -> Result<()> {
        debug!("Running board SDIO bring-up");
        self.hal.init()
    }

    async fn ioctl(&mut self, request: IoctlRequest<'_>) -> Result<()> {
        match request {
            IoctlRequest::Cmd52(cmd) => self.hal.cmd52(cmd),
            IoctlRequest::Cmd53 { cmd, buf } => {
                check_size(&self.caps, buf.len())?;
                self.hal.cmd53(&cmd, buf)
            }
            other => Err(unsupported(BusKind::Sdio, &other)),
        }
    }

    async fn deinit(&mut self) -> Result<()> {
        self.hal.deinit();
        Ok(())
    }
}
