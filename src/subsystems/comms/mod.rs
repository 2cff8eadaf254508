//! Comms subsystem: the channels the bot is reachable on.
//!
//! Today that is the single HTTP channel. [`start`] spawns it through
//! [`spawn_components`] and returns immediately; the caller awaits the
//! returned handle.

pub mod http;

pub use http::{HttpChannel, HttpState, build_router};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};

pub fn start(config: &Config, state: HttpState, shutdown: CancellationToken) -> SubsystemHandle {
    info!(bind_addr = %config.http.bind_addr(), "loading http channel");
    let components: Vec<Box<dyn Component>> = vec![Box::new(HttpChannel::new(
        "http0",
        config.http.bind_addr(),
        config.http.static_views_dir.clone(),
        state,
    ))];
    spawn_components(components, shutdown)
}
