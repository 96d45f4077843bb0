//! Host-side bus shim for the WILC WiFi co-processor.
//!
//! The WILC driver stack needs exactly three things from the host: bring a
//! bus up, run one transaction, tear the bus down. This crate provides that
//! surface over SPI, I2C, or SDIO, selected at runtime from configuration,
//! with the hardware behind narrow HAL traits so the whole stack can run
//! against fakes on a workstation.

pub mod config;
pub mod error;
pub mod hal;
pub mod probe;
pub mod touch;
pub mod tracing;
pub mod transport;

pub use error::{Error, Result};
