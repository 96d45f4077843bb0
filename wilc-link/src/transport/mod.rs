//! Physical transport layer for the WILC link.
//!
//! The WILC driver stack reaches the co-processor over one of three serial
//! buses. This module presents them behind a single transaction interface:
//! bring the bus up, run one ioctl-style transaction, tear the bus down.
//! The active bus is chosen at construction time from configuration rather
//! than compiled in, so the same driver stack can run against any backend,
//! including fakes under test.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tracing::prelude::*;

pub mod i2c;
pub mod sdio;
pub mod spi;

pub use i2c::I2c;
pub use sdio::{Sdio, SdioCmd52, SdioCmd53, SdioDirection};
pub use spi::Spi;

/// Largest transaction any backend will carry, in bytes.
pub const MAX_TRX_SIZE: usize = 4096;

/// Static capabilities advertised by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusCapabilities {
    /// Maximum transaction size in bytes.
    pub max_trx_size: usize,
}

impl Default for BusCapabilities {
    fn default() -> Self {
        Self {
            max_trx_size: MAX_TRX_SIZE,
        }
    }
}

/// Physical bus carrying the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    Spi,
    I2c,
    Sdio,
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BusKind::Spi => "SPI",
            BusKind::I2c => "I2C",
            BusKind::Sdio => "SDIO",
        })
    }
}

/// One bus transaction. The caller owns every buffer; the transport never
/// keeps a reference past the call.
#[derive(Debug)]
pub enum IoctlRequest<'a> {
    /// Read `buf.len()` bytes from the device.
    Read { buf: &'a mut [u8] },

    /// Write `buf` to the device.
    Write { buf: &'a [u8] },

    /// Write `prefix` immediately followed by `data` as one uninterrupted
    /// transfer.
    WritePrefixed { prefix: &'a [u8], data: &'a [u8] },

    /// Full-duplex exchange. A missing `tx` clocks out zeros; a missing
    /// `rx` discards the bytes read back. When both are present their
    /// lengths must match.
    Transfer {
        tx: Option<&'a [u8]>,
        rx: Option<&'a mut [u8]>,
    },

    /// SDIO single-byte command, passed through untouched. On reads the
    /// card's byte lands in `cmd.data`.
    Cmd52(&'a mut SdioCmd52),

    /// SDIO multi-byte command, passed through untouched. `buf` is the
    /// source for writes and the destination for reads.
    Cmd53 { cmd: SdioCmd53, buf: &'a mut [u8] },
}

impl IoctlRequest<'_> {
    pub fn kind(&self) -> IoctlKind {
        match self {
            IoctlRequest::Read { .. } => IoctlKind::Read,
            IoctlRequest::Write { .. } => IoctlKind::Write,
            IoctlRequest::WritePrefixed { .. } => IoctlKind::WritePrefixed,
            IoctlRequest::Transfer { .. } => IoctlKind::Transfer,
            IoctlRequest::Cmd52(_) => IoctlKind::Cmd52,
            IoctlRequest::Cmd53 { .. } => IoctlKind::Cmd53,
        }
    }
}

/// Discriminant of [`IoctlRequest`], for dispatch errors and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlKind {
    Read,
    Write,
    WritePrefixed,
    Transfer,
    Cmd52,
    Cmd53,
}

impl fmt::Display for IoctlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IoctlKind::Read => "read",
            IoctlKind::Write => "write",
            IoctlKind::WritePrefixed => "write-prefixed",
            IoctlKind::Transfer => "transfer",
            IoctlKind::Cmd52 => "cmd52",
            IoctlKind::Cmd53 => "cmd53",
        })
    }
}

/// Uniform transaction interface over the physical bus.
///
/// A transport is synchronous in the original sense: each call completes
/// one whole transaction before returning. Failures are local and
/// non-fatal; there is no retry policy inside the transport.
#[async_trait]
pub trait Transport: Send {
    /// Static limits of this transport.
    fn capabilities(&self) -> BusCapabilities;

    /// Bring the bus up. A failed init leaves the peripheral disabled; the
    /// caller retries from the top rather than resuming partway.
    async fn init(&mut self) -> Result<()>;

    /// Run one transaction.
    async fn ioctl(&mut self, request: IoctlRequest<'_>) -> Result<()>;

    /// Tear the bus down, releasing what `init` acquired.
    async fn deinit(&mut self) -> Result<()>;
}

/// Reject a command the active bus does not serve, with a diagnostic.
/// Nothing may have been written to the device or the caller's buffers by
/// the time this is reached.
pub(crate) fn unsupported(bus: BusKind, request: &IoctlRequest<'_>) -> Error {
    let cmd = request.kind();
    error!(%bus, %cmd, "Invalid ioctl command for active bus");
    Error::UnsupportedCommand { bus, cmd }
}

/// Bounds check against the capability descriptor.
pub(crate) fn check_size(caps: &BusCapabilities, requested: usize) -> Result<()> {
    if requested > caps.max_trx_size {
        return Err(Error::SizeExceeded {
            requested,
            max: caps.max_trx_size,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0 => true)]
    #[test_case(4096 => true)]
    #[test_case(4097 => false)]
    fn size_check_honors_capability_limit(requested: usize) -> bool {
        check_size(&BusCapabilities::default(), requested).is_ok()
    }

    #[test]
    fn oversize_error_reports_both_sizes() {
        let err = check_size(&BusCapabilities { max_trx_size: 8 }, 9).unwrap_err();
        match err {
            Error::SizeExceeded { requested, max } => {
                assert_eq!(requested, 9);
                assert_eq!(max, 8);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn request_kind_matches_variant() {
        let mut buf = [0u8; 1];
        assert_eq!(IoctlRequest::Read { buf: &mut buf }.kind(), IoctlKind::Read);
        assert_eq!(IoctlRequest::Write { buf: &buf }.kind(), IoctlKind::Write);
        assert_eq!(
            IoctlRequest::WritePrefixed {
                prefix: &buf,
                data: &buf
            }
            .kind(),
            IoctlKind::WritePrefixed
        );
    }
}
