//! Periodic self-exercise of the transport stack.
//!
//! Stands in for the WILC driver during bring-up: each tick runs one
//! loopback SPI transfer and one touch poll, so the whole shim can be
//! watched end to end without hardware attached.

use std::sync::Arc;

use anyhow::Context;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::hal::loopback::{LoopbackI2c, LoopbackSpi};
use crate::hal::UptimeClock;
use crate::touch::{BusRegisters, DetectLatch, TouchController};
use crate::tracing::prelude::*;
use crate::transport::{I2c, IoctlRequest, Spi, Transport};

type LoopbackTouch = TouchController<BusRegisters<I2c<LoopbackI2c>>, UptimeClock>;

async fn bring_up(config: &Config) -> anyhow::Result<(Spi<LoopbackSpi>, LoopbackTouch, Arc<DetectLatch>)> {
    let mut spi = Spi::new(LoopbackSpi::new(), config.spi.clone());
    spi.init().await.context("loopback SPI bring-up")?;

    let mut i2c = I2c::new(LoopbackI2c::new(), config.i2c.clone());
    i2c.init().await.context("loopback I2C bring-up")?;

    let latch = DetectLatch::new();
    let touch = TouchController::new(
        BusRegisters(i2c),
        UptimeClock::new(config.touch.clock_hz),
        latch.clone(),
        config.touch.debounce_ms,
    );
    Ok((spi, touch, latch))
}

/// Task ticking the loopback transports once a second.
pub async fn task(config: Config, running: CancellationToken) {
    trace!("Task started.");

    let (mut spi, mut touch, latch) = match bring_up(&config).await {
        Ok(stack) => stack,
        Err(e) => {
            error!("Failed to bring up loopback stack: {e:#}");
            return;
        }
    };

    let mut seq: u8 = 0;
    while !running.is_cancelled() {
        let tx = [0xC4, seq, 0x00, 0x00];
        let mut rx = [0u8; 4];
        match spi
            .ioctl(IoctlRequest::Transfer {
                tx: Some(&tx),
                rx: Some(&mut rx),
            })
            .await
        {
            Ok(()) => trace!(?rx, "SPI loopback transfer"),
            Err(e) => error!("SPI transfer failed: {e}"),
        }

        // Stand-in for the change-line interrupt.
        latch.notify();
        match touch.poll().await {
            Ok(Some(snapshot)) => trace!(detect = ?snapshot.detect, "Touch status updated"),
            Ok(None) => {}
            Err(e) => error!("Touch poll failed: {e}"),
        }

        seq = seq.wrapping_add(1);
        time::sleep(Duration::from_secs(1)).await;
    }

    if let Err(e) = spi.deinit().await {
        error!("SPI teardown failed: {e}");
    }
    trace!("Task stopped.");
}
