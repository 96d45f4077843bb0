//! SPI backend: full-duplex byte exchange gated by the chip-select line.
//!
//! The transfer loop mirrors the vendor sequence byte for byte: load the
//! transmit register (zero-filled when the caller supplies no TX buffer),
//! wait for the RX-ready flag, take the received byte. Two deliberate
//! departures from the vendor code: the RX-ready wait is bounded, and chip
//! select is deasserted on every exit path, including mid-transfer faults.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_size, unsupported, BusCapabilities, BusKind, IoctlRequest, Transport};
use crate::error::{Error, Result};
use crate::hal::{ClockPhase, ClockPolarity, CsLevel, SpiHal, SpiSetup};
use crate::tracing::prelude::*;

/// How many RX-ready polls to spend on one byte before declaring the
/// transfer stuck.
pub const DEFAULT_POLL_LIMIT: u32 = 10_000;

fn default_poll_limit() -> u32 {
    DEFAULT_POLL_LIMIT
}

/// SPI clocking and timing parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpiConfig {
    /// Core clock feeding the SPI divider, Hz.
    pub cpu_hz: u32,

    /// Upper bound for the SPI bit clock, Hz. The divider is chosen so the
    /// real clock never exceeds this.
    pub clock_hz: u32,

    pub polarity: ClockPolarity,
    pub phase: ClockPhase,

    /// Delay from chip select to the first clock edge, peripheral units.
    pub delay_before_clock: u8,

    /// Delay between consecutive bytes, peripheral units.
    pub delay_between_bytes: u8,

    /// RX-ready poll bound per byte.
    #[serde(default = "default_poll_limit")]
    pub poll_limit: u32,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            cpu_hz: 48_000_000,
            clock_hz: 8_000_000,
            polarity: ClockPolarity::IdleLow,
            phase: ClockPhase::SampleLeading,
            delay_before_clock: 0,
            delay_between_bytes: 0,
            poll_limit: DEFAULT_POLL_LIMIT,
        }
    }
}

/// Smallest integer divider D such that `cpu_hz / D` does not exceed
/// `clock_hz`. The exact bit clock depends on the core clock and lands at
/// or below the configured target.
fn baud_divider(cpu_hz: u32, clock_hz: u32) -> u32 {
    let mut divider = cpu_hz / clock_hz;
    if divider.saturating_mul(clock_hz) < cpu_hz {
        divider += 1;
    }
    divider.max(1)
}

/// SPI transport for the WILC link.
pub struct Spi<H> {
    hal: H,
    config: SpiConfig,
    caps: BusCapabilities,
}

impl<H: SpiHal> Spi<H> {
    pub fn new(hal: H, config: SpiConfig) -> Self {
        Self {
            hal,
            config,
            caps: BusCapabilities::default(),
        }
    }

    fn transfer(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>) -> Result<()> {
        let len = transfer_len(&tx, &rx)?;
        check_size(&self.caps, len)?;

        self.hal.set_chip_select(CsLevel::Asserted);
        let result = self.exchange(tx, rx, len);
        // Chip select is released exactly once per transaction, whatever
        // happened mid-transfer.
        self.hal.set_chip_select(CsLevel::Deasserted);
        result
    }

    fn exchange(&mut self, tx: Option<&[u8]>, mut rx: Option<&mut [u8]>, len: usize) -> Result<()> {
        for i in 0..len {
            let byte = tx.map_or(0, |t| t[i]);
            self.hal.write_data(byte)?;
            self.wait_rx_ready()?;
            let read = self.hal.read_data()?;
            if let Some(rx) = rx.as_mut() {
                rx[i] = read;
            }
        }
        Ok(())
    }

    fn wait_rx_ready(&mut self) -> Result<()> {
        for _ in 0..self.config.poll_limit {
            if self.hal.rx_ready()? {
                return Ok(());
            }
        }
        Err(Error::Timeout("SPI RX-ready flag"))
    }
}

/// Resolve the byte count of a full-duplex exchange from whichever buffers
/// the caller supplied.
fn transfer_len(tx: &Option<&[u8]>, rx: &Option<&mut [u8]>) -> Result<usize> {
    match (tx, rx) {
        (Some(tx), Some(rx)) if tx.len() != rx.len() => Err(Error::InvalidRequest(format!(
            "transfer buffers disagree on length: tx {} bytes, rx {} bytes",
            tx.len(),
            rx.len()
        ))),
        (Some(tx), _) => Ok(tx.len()),
        (None, Some(rx)) => Ok(rx.len()),
        (None, None) => Err(Error::InvalidRequest(
            "transfer with neither buffer supplied".into(),
        )),
    }
}

#[async_trait]
impl<H: SpiHal> Transport for Spi<H> {
    fn capabilities(&self) -> BusCapabilities {
        self.caps
    }

    async fn init(&mut self) -> Result<()> {
        if self.config.cpu_hz == 0 || self.config.clock_hz == 0 {
            return Err(Error::Config(
                "SPI core and target clocks must be non-zero".into(),
            ));
        }

        let setup = SpiSetup {
            baud_divider: baud_divider(self.config.cpu_hz, self.config.clock_hz),
            polarity: self.config.polarity,
            phase: self.config.phase,
            delay_before_clock: self.config.delay_before_clock,
            delay_between_bytes: self.config.delay_between_bytes,
        };
        debug!(
            divider = setup.baud_divider,
            bit_clock = self.config.cpu_hz / setup.baud_divider,
            "Configuring SPI peripheral"
        );

        self.hal.set_chip_select(CsLevel::Deasserted);
        self.hal.configure(&setup)?;
        if let Err(e) = self.hal.enable() {
            // Never leave a half-initialized bus behind.
            self.hal.disable();
            return Err(e);
        }

        self.hal.reset_device();
        self.hal.set_chip_select(CsLevel::Deasserted);
        Ok(())
    }

    async fn ioctl(&mut self, request: IoctlRequest<'_>) -> Result<()> {
        match request {
            IoctlRequest::Transfer { tx, rx } => self.transfer(tx, rx),
            other => Err(unsupported(BusKind::Spi, &other)),
        }
    }

    async fn deinit(&mut self) -> Result<()> {
        self.hal.set_chip_select(CsLevel::Deasserted);
        self.hal.disable();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    /// Scriptable SPI peripheral recording everything the transport does.
    #[derive(Default)]
    struct FakeSpi {
        enabled: bool,
        configured: bool,
        assert_count: u32,
        deassert_count: u32,
        written: Vec<u8>,
        /// Bytes the "device" places on the bus, in order.
        miso: Vec<u8>,
        rdr: Option<u8>,
        /// Fail `write_data` on the nth byte (0-based).
        fail_write_at: Option<usize>,
        /// RX-ready never fires.
        rx_stuck: bool,
        /// `configure` reports a fault.
        fail_configure: bool,
        /// `enable` reports a fault.
        fail_enable: bool,
        setup: Option<SpiSetup>,
    }

    impl FakeSpi {
        fn with_miso(miso: &[u8]) -> Self {
            Self {
                enabled: true,
                miso: miso.to_vec(),
                ..Self::default()
            }
        }

        fn echoing() -> Self {
            Self {
                enabled: true,
                ..Self::default()
            }
        }
    }

    impl SpiHal for FakeSpi {
        fn configure(&mut self, setup: &SpiSetup) -> Result<()> {
            if self.fail_configure {
                return Err(Error::Bus("configure fault".into()));
            }
            self.configured = true;
            self.setup = Some(*setup);
            Ok(())
        }

        fn enable(&mut self) -> Result<()> {
            if self.fail_enable {
                return Err(Error::Bus("enable fault".into()));
            }
            self.enabled = true;
            Ok(())
        }

        fn disable(&mut self) {
            self.enabled = false;
            self.configured = false;
        }

        fn set_chip_select(&mut self, level: CsLevel) {
            match level {
                CsLevel::Asserted => self.assert_count += 1,
                CsLevel::Deasserted => self.deassert_count += 1,
            }
        }

        fn write_data(&mut self, byte: u8) -> Result<()> {
            if self.fail_write_at == Some(self.written.len()) {
                return Err(Error::Bus("write fault".into()));
            }
            self.written.push(byte);
            // Device answer: scripted byte if any remain, else echo.
            self.rdr = Some(if self.miso.is_empty() {
                byte
            } else {
                self.miso.remove(0)
            });
            Ok(())
        }

        fn rx_ready(&mut self) -> Result<bool> {
            if self.rx_stuck {
                return Ok(false);
            }
            Ok(self.rdr.is_some())
        }

        fn read_data(&mut self) -> Result<u8> {
            self.rdr
                .take()
                .ok_or_else(|| Error::Bus("receive register empty".into()))
        }

        fn reset_device(&mut self) {}
    }

    fn spi(hal: FakeSpi) -> Spi<FakeSpi> {
        Spi::new(hal, SpiConfig::default())
    }

    #[test_case(48_000_000, 8_000_000 => 6; "exact multiple")]
    #[test_case(48_000_000, 7_000_000 => 7; "rounds up so clock stays under target")]
    #[test_case(10_000_000, 10_000_000 => 1; "equal clocks")]
    #[test_case(8_000_000, 48_000_000 => 1; "target above core clock clamps to one")]
    fn divider_is_smallest_not_exceeding_target(cpu_hz: u32, clock_hz: u32) -> u32 {
        baud_divider(cpu_hz, clock_hz)
    }

    #[test]
    fn divider_result_never_overshoots_target() {
        for clock_hz in [1_000_000u32, 3_000_000, 7_500_000, 13_000_000] {
            let d = baud_divider(48_000_000, clock_hz);
            assert!(48_000_000 / d <= clock_hz, "divider {d} overshoots {clock_hz}");
            if d > 1 {
                assert!(48_000_000 / (d - 1) > clock_hz, "divider {d} not smallest");
            }
        }
    }

    #[tokio::test]
    async fn transfer_captures_device_bytes_in_order() {
        let mut spi = spi(FakeSpi::with_miso(&[0x10, 0x20, 0x30]));
        let tx = [1, 2, 3];
        let mut rx = [0u8; 3];
        spi.ioctl(IoctlRequest::Transfer {
            tx: Some(&tx),
            rx: Some(&mut rx),
        })
        .await
        .unwrap();
        assert_eq!(rx, [0x10, 0x20, 0x30]);
        assert_eq!(spi.hal.written, [1, 2, 3]);
    }

    #[tokio::test]
    async fn transfer_zero_fills_when_tx_missing() {
        let mut spi = spi(FakeSpi::echoing());
        let mut rx = [0xFFu8; 4];
        spi.ioctl(IoctlRequest::Transfer {
            tx: None,
            rx: Some(&mut rx),
        })
        .await
        .unwrap();
        assert_eq!(spi.hal.written, [0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn chip_select_pairs_on_success() {
        let mut spi = spi(FakeSpi::echoing());
        let tx = [0u8; 8];
        spi.ioctl(IoctlRequest::Transfer {
            tx: Some(&tx),
            rx: None,
        })
        .await
        .unwrap();
        assert_eq!(spi.hal.assert_count, 1);
        assert_eq!(spi.hal.deassert_count, 1);
    }

    #[tokio::test]
    async fn chip_select_pairs_on_mid_transfer_fault() {
        let mut hal = FakeSpi::echoing();
        hal.fail_write_at = Some(2);
        let mut spi = spi(hal);
        let tx = [0u8; 8];
        let err = spi
            .ioctl(IoctlRequest::Transfer {
                tx: Some(&tx),
                rx: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Bus(_)));
        assert_eq!(spi.hal.assert_count, 1);
        assert_eq!(spi.hal.deassert_count, 1);
    }

    #[tokio::test]
    async fn stuck_rx_flag_times_out_and_releases_chip_select() {
        let mut hal = FakeSpi::echoing();
        hal.rx_stuck = true;
        let mut spi = spi(hal);
        let tx = [0xAA];
        let err = spi
            .ioctl(IoctlRequest::Transfer {
                tx: Some(&tx),
                rx: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(spi.hal.assert_count, 1);
        assert_eq!(spi.hal.deassert_count, 1);
    }

    #[tokio::test]
    async fn mismatched_buffers_rejected_before_chip_select() {
        let mut spi = spi(FakeSpi::echoing());
        let tx = [0u8; 3];
        let mut rx = [0u8; 4];
        let err = spi
            .ioctl(IoctlRequest::Transfer {
                tx: Some(&tx),
                rx: Some(&mut rx),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(spi.hal.assert_count, 0);
        assert_eq!(spi.hal.deassert_count, 0);
    }

    #[tokio::test]
    async fn oversize_transfer_rejected() {
        let mut spi = spi(FakeSpi::echoing());
        let tx = vec![0u8; crate::transport::MAX_TRX_SIZE + 1];
        let err = spi
            .ioctl(IoctlRequest::Transfer {
                tx: Some(&tx),
                rx: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SizeExceeded { .. }));
        assert!(spi.hal.written.is_empty());
    }

    #[tokio::test]
    async fn foreign_command_fails_without_touching_buffers() {
        let mut spi = spi(FakeSpi::echoing());
        let mut buf = [0xEE; 4];
        let err = spi
            .ioctl(IoctlRequest::Read { buf: &mut buf })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedCommand { .. }));
        assert_eq!(buf, [0xEE; 4]);
        assert!(spi.hal.written.is_empty());
        assert_eq!(spi.hal.assert_count, 0);
    }

    #[tokio::test]
    async fn init_programs_computed_divider() {
        let mut spi = spi(FakeSpi::echoing());
        spi.init().await.unwrap();
        assert_eq!(spi.hal.setup.unwrap().baud_divider, 6);
        assert!(spi.hal.enabled);
    }

    #[tokio::test]
    async fn failed_configure_leaves_peripheral_disabled() {
        let mut hal = FakeSpi::default();
        hal.fail_configure = true;
        let mut spi = spi(hal);
        assert!(spi.init().await.is_err());
        assert!(!spi.hal.enabled);
        assert!(!spi.hal.configured);
    }

    #[tokio::test]
    async fn failed_enable_rolls_back_configuration() {
        let mut hal = FakeSpi::default();
        hal.fail_enable = true;
        let mut spi = spi(hal);
        assert!(spi.init().await.is_err());
        assert!(!spi.hal.enabled);
        assert!(!spi.hal.configured);
    }

    #[tokio::test]
    async fn zero_clock_config_rejected() {
        let mut spi = Spi::new(
            FakeSpi::default(),
            SpiConfig {
                clock_hz: 0,
                ..SpiConfig::default()
            },
        );
        assert!(matches!(spi.init().await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn deinit_disables_peripheral() {
        let mut spi = spi(FakeSpi::echoing());
        spi.init().await.unwrap();
        spi.deinit().await.unwrap();
        assert!(!spi.hal.enabled);
    }
}
