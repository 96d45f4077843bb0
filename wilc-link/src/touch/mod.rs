//! Touch-sensor poll path.
//!
//! The AT42QT1060 raises its change line when a key state changes. The
//! interrupt handler must do nothing but latch the event; all device I/O
//! happens in the foreground task, which polls the latch and, when set,
//! reads the detection-status register followed by the input-port register
//! (the second read is what releases the change line). The latch is a
//! single word with one writer (interrupt) and one reader-clearer
//! (foreground), so an atomic swap is the whole concurrency story.

pub mod debounce;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bitflags::bitflags;

use crate::error::Result;
use crate::hal::Clock;
use crate::touch::debounce::CycleTimer;
use crate::tracing::prelude::*;
use crate::transport::{IoctlRequest, Transport};

/// Detection-status register of the AT42QT1060.
const REG_DETECTION_STATUS: u8 = 4;

/// Input-port status register; reading it releases the change line.
const REG_INPUT_PORT_STATUS: u8 = 5;

/// Register read access to the touch device, over whatever bus carries it.
#[async_trait]
pub trait TouchRegisters: Send {
    async fn read_reg(&mut self, reg: u8) -> Result<u8>;
}

/// Reads device registers through a generic transport: a one-byte register
/// address write, then a one-byte read.
pub struct BusRegisters<T>(pub T);

#[async_trait]
impl<T: Transport> TouchRegisters for BusRegisters<T> {
    async fn read_reg(&mut self, reg: u8) -> Result<u8> {
        self.0.ioctl(IoctlRequest::Write { buf: &[reg] }).await?;
        let mut byte = [0u8];
        self.0.ioctl(IoctlRequest::Read { buf: &mut byte }).await?;
        Ok(byte[0])
    }
}

/// Single-word handoff from interrupt context to the foreground poll.
#[derive(Debug, Default)]
pub struct DetectLatch(AtomicBool);

impl DetectLatch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(false)))
    }

    /// Interrupt side: record that the change line fired. Set only, never
    /// blocks.
    pub fn notify(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Foreground side: consume the pending event, if any.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

bitflags! {
    /// Key bits of the detection-status byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DetectStatus: u8 {
        /// FCT3, up.
        const UP = 1 << 0;
        /// FCT1, right, select.
        const SELECT = 1 << 2;
        /// FCT2, left, connect.
        const CONNECT = 1 << 3;
        /// FCT5, middle, send.
        const SEND = 1 << 4;
    }
}

/// Latest register pair captured by the poll task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub detect: DetectStatus,
    pub input_port: u8,
}

impl StatusSnapshot {
    pub fn up(&self) -> bool {
        self.detect.contains(DetectStatus::UP)
    }

    pub fn select(&self) -> bool {
        self.detect.contains(DetectStatus::SELECT)
    }

    pub fn connect(&self) -> bool {
        self.detect.contains(DetectStatus::CONNECT)
    }

    pub fn send(&self) -> bool {
        self.detect.contains(DetectStatus::SEND)
    }
}

/// Foreground half of the deferred-interrupt handoff.
pub struct TouchController<R, C> {
    regs: R,
    clock: C,
    latch: Arc<DetectLatch>,
    debounce: CycleTimer,
    status: StatusSnapshot,
}

impl<R: TouchRegisters, C: Clock> TouchController<R, C> {
    pub fn new(regs: R, clock: C, latch: Arc<DetectLatch>, debounce_ms: u32) -> Self {
        let debounce = CycleTimer::new(debounce_ms, clock.frequency_hz(), clock.cycles());
        Self {
            regs,
            clock,
            latch,
            debounce,
            status: StatusSnapshot::default(),
        }
    }

    /// One foreground poll. When an event is latched and outside the
    /// debounce window, performs exactly one pair of register reads and
    /// returns the fresh snapshot; otherwise touches no device state.
    pub async fn poll(&mut self) -> Result<Option<StatusSnapshot>> {
        if !self.latch.take() {
            return Ok(None);
        }

        let now = self.clock.cycles();
        if !self.debounce.expired(now) {
            trace!("Touch event inside debounce window, dropped");
            return Ok(None);
        }

        let detect = self.regs.read_reg(REG_DETECTION_STATUS).await?;
        // The input-port read resets the device's change line.
        let input_port = self.regs.read_reg(REG_INPUT_PORT_STATUS).await?;

        self.status = StatusSnapshot {
            detect: DetectStatus::from_bits_retain(detect),
            input_port,
        };
        self.debounce.restart(self.clock.cycles());
        Ok(Some(self.status))
    }

    /// Snapshot taken by the most recent successful poll.
    pub fn status(&self) -> StatusSnapshot {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    struct FakeRegs {
        reads: Vec<u8>,
        detect: u8,
        input_port: u8,
    }

    #[async_trait]
    impl TouchRegisters for FakeRegs {
        async fn read_reg(&mut self, reg: u8) -> Result<u8> {
            self.reads.push(reg);
            Ok(match reg {
                REG_DETECTION_STATUS => self.detect,
                REG_INPUT_PORT_STATUS => self.input_port,
                _ => 0,
            })
        }
    }

    /// Manually advanced cycle counter.
    #[derive(Clone)]
    struct TestClock(Arc<AtomicU64>);

    impl TestClock {
        fn new() -> Self {
            Self(Arc::new(AtomicU64::new(0)))
        }

        fn advance(&self, cycles: u64) {
            self.0.fetch_add(cycles, Ordering::Relaxed);
        }
    }

    impl Clock for TestClock {
        fn cycles(&self) -> u64 {
            self.0.load(Ordering::Relaxed)
        }

        fn frequency_hz(&self) -> u32 {
            48_000_000
        }
    }

    fn controller(
        detect: u8,
        debounce_ms: u32,
    ) -> (TouchController<FakeRegs, TestClock>, Arc<DetectLatch>, TestClock) {
        let regs = FakeRegs {
            reads: Vec::new(),
            detect,
            input_port: 0x3F,
        };
        let clock = TestClock::new();
        let latch = DetectLatch::new();
        let ctl = TouchController::new(regs, clock.clone(), latch.clone(), debounce_ms);
        (ctl, latch, clock)
    }

    #[tokio::test]
    async fn latched_event_reads_exactly_one_register_pair() {
        let (mut ctl, latch, _clock) = controller(0b0000_0001, 200);

        latch.notify();
        let snapshot = ctl.poll().await.unwrap().expect("snapshot expected");
        assert_eq!(
            ctl.regs.reads,
            [REG_DETECTION_STATUS, REG_INPUT_PORT_STATUS]
        );
        assert!(snapshot.up());
        assert_eq!(snapshot.input_port, 0x3F);

        // No intervening notify: the second poll must not touch the device.
        assert_eq!(ctl.poll().await.unwrap(), None);
        assert_eq!(ctl.regs.reads.len(), 2);
    }

    #[tokio::test]
    async fn idle_poll_reads_nothing() {
        let (mut ctl, _latch, _clock) = controller(0, 200);
        assert_eq!(ctl.poll().await.unwrap(), None);
        assert!(ctl.regs.reads.is_empty());
    }

    #[tokio::test]
    async fn rapid_refire_inside_window_is_dropped() {
        let (mut ctl, latch, clock) = controller(0b0001_0000, 200);

        latch.notify();
        assert!(ctl.poll().await.unwrap().is_some());

        // Re-fires 1 ms later: inside the 200 ms window.
        clock.advance(48_000);
        latch.notify();
        assert_eq!(ctl.poll().await.unwrap(), None);
        assert_eq!(ctl.regs.reads.len(), 2);

        // Past the window the next event is honored again.
        clock.advance(48_000_000);
        latch.notify();
        assert!(ctl.poll().await.unwrap().is_some());
        assert_eq!(ctl.regs.reads.len(), 4);
    }

    #[tokio::test]
    async fn snapshot_decodes_key_bits() {
        let (mut ctl, latch, _clock) = controller(0b0001_1101, 0);
        latch.notify();
        let snapshot = ctl.poll().await.unwrap().unwrap();
        assert!(snapshot.up());
        assert!(snapshot.select());
        assert!(snapshot.connect());
        assert!(snapshot.send());
    }

    #[test]
    fn latch_take_clears_pending_event() {
        let latch = DetectLatch::new();
        assert!(!latch.take());
        latch.notify();
        latch.notify(); // double set collapses to one event
        assert!(latch.take());
        assert!(!latch.take());
    }
}
