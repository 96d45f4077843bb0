//! Provide tracing, tailored to this program.
//!
//! The program should call [`init`] once at startup to install a tracing
//! subscriber. The rest of the crate can include
//! `use crate::tracing::prelude::*` for convenient access to the
//! `trace!()`, `debug!()`, `info!()`, `warn!()`, and `error!()` macros.

use time::OffsetDateTime;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{trace, debug, info, warn, error};
}

/// Initialize logging to stdout, filtering according to environment
/// variable RUST_LOG, overriding the default level (ERROR) to INFO.
pub fn init() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(ClockStamp),
        )
        .init();
}

// Timestamps in local time to the nearest second; the stock timer prints a
// long UTC string.
struct ClockStamp;

impl FormatTime for ClockStamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now =
            OffsetDateTime::now_local().unwrap_or(OffsetDateTime::now_utc());
        write!(
            w,
            "{}",
            now.format(time::macros::format_description!(
                "[hour]:[minute]:[second]"
            ))
            .unwrap(),
        )
    }
}
