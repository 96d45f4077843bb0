use tokio::signal::unix::{self, SignalKind};
use tokio_util::{
    sync::CancellationToken,
    task::TaskTracker,
};

use wilc_link::config::Config;
use wilc_link::probe;
use wilc_link::tracing::{self, prelude::*};

#[tokio::main]
async fn main() {
    tracing::init();

    let config = Config::from_env();
    let running = CancellationToken::new();
    let tracker = TaskTracker::new();
    tracker.spawn(probe::task(config, running.clone()));
    tracker.close();
    info!("Started.");

    let mut sigint = unix::signal(SignalKind::interrupt()).unwrap();
    let mut sigterm = unix::signal(SignalKind::terminate()).unwrap();
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }

    trace!("Shutting down.");
    running.cancel();

    tracker.wait().await;
    info!("Exiting.");
}
