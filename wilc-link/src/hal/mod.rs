//! Hardware abstraction layer traits.
//!
//! The transport backends drive the board through these narrow traits,
//! which model the vendor peripheral primitives (data-register access,
//! RX-ready flag, chip-select and reset lines, address-based I2C transfers,
//! SDIO command submission). On a target they map to register access; under
//! test they are implemented by fakes, and [`loopback`] provides in-memory
//! implementations for running the stack without hardware.

pub mod loopback;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transport::sdio::{SdioCmd52, SdioCmd53};

/// Chip-select line level. The WILC is addressed while the line is driven
/// low, so `Asserted` means pin low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CsLevel {
    Asserted,
    #[default]
    Deasserted,
}

/// SPI clock polarity (CPOL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockPolarity {
    IdleLow,
    IdleHigh,
}

/// SPI clock phase (CPHA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockPhase {
    SampleLeading,
    SampleTrailing,
}

/// Values the SPI backend programs into the peripheral at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiSetup {
    /// Core-clock divider yielding the bit clock.
    pub baud_divider: u32,
    pub polarity: ClockPolarity,
    pub phase: ClockPhase,
    /// Delay from chip select to the first clock edge, peripheral units.
    pub delay_before_clock: u8,
    /// Delay between consecutive bytes, peripheral units.
    pub delay_between_bytes: u8,
}

/// Register-level primitives of the SPI peripheral, plus the two board
/// lines the transport owns: chip select and the WILC reset line.
pub trait SpiHal: Send {
    /// Program pins, mode, and clocking. Implementations must leave the
    /// peripheral disabled when any step fails.
    fn configure(&mut self, setup: &SpiSetup) -> Result<()>;

    /// Gate the peripheral on.
    fn enable(&mut self) -> Result<()>;

    /// Gate the peripheral off and release its pins.
    fn disable(&mut self);

    /// Drive the chip-select line.
    fn set_chip_select(&mut self, level: CsLevel);

    /// Load one byte into the transmit data register.
    fn write_data(&mut self, byte: u8) -> Result<()>;

    /// Whether the receive data register holds a byte.
    fn rx_ready(&mut self) -> Result<bool>;

    /// Take the byte from the receive data register.
    fn read_data(&mut self) -> Result<u8>;

    /// Pulse the WILC reset line.
    fn reset_device(&mut self);
}

/// Values the I2C backend programs into the peripheral at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cSetup {
    /// Bit clock in Hz.
    pub speed_hz: u32,
}

/// Address-based master transfers of the I2C (TWI) peripheral.
pub trait I2cHal: Send {
    /// Assign pins and initialize the peripheral as a master.
    fn configure(&mut self, setup: &I2cSetup) -> Result<()>;

    /// Shut the peripheral down and release its pins.
    fn disable(&mut self);

    /// Write `buf` to the device at `addr` as one transfer.
    fn write(&mut self, addr: u8, buf: &[u8]) -> Result<()>;

    /// Fill `buf` from the device at `addr` as one transfer.
    fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<()>;
}

/// Board-specific SDIO command routines. CMD52/CMD53 records pass through
/// the transport untouched.
pub trait SdioHal: Send {
    /// Board-level SDIO bring-up.
    fn init(&mut self) -> Result<()>;

    /// Board-level SDIO teardown.
    fn deinit(&mut self);

    /// Submit an IO_RW_DIRECT command. On reads, `cmd.data` receives the
    /// byte returned by the card.
    fn cmd52(&mut self, cmd: &mut SdioCmd52) -> Result<()>;

    /// Submit an IO_RW_EXTENDED command against `buf` (source for writes,
    /// destination for reads).
    fn cmd53(&mut self, cmd: &SdioCmd53, buf: &mut [u8]) -> Result<()>;
}

/// Monotonic cycle counter, as used by the debounce timer.
pub trait Clock: Send {
    /// Current cycle count.
    fn cycles(&self) -> u64;

    /// Counter frequency in Hz.
    fn frequency_hz(&self) -> u32;
}

/// Clock backed by process uptime, scaled to a nominal cycle rate. Stands
/// in for the CPU cycle counter when running off-target.
#[derive(Debug, Clone)]
pub struct UptimeClock {
    epoch: std::time::Instant,
    hz: u32,
}

impl UptimeClock {
    pub fn new(hz: u32) -> Self {
        Self {
            epoch: std::time::Instant::now(),
            hz,
        }
    }
}

impl Clock for UptimeClock {
    fn cycles(&self) -> u64 {
        (self.epoch.elapsed().as_nanos() * u128::from(self.hz) / 1_000_000_000) as u64
    }

    fn frequency_hz(&self) -> u32 {
        self.hz
    }
}
