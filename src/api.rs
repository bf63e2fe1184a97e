//! HTTP API
//!
//! Observation and control surface for the turn runtime, plus a WebSocket
//! bridge that lets external recognizer and synthesizer processes reach
//! the in-process bus.

mod handlers;
mod sse;
mod types;
mod ws;

pub use handlers::create_router;

use crate::bus::Bus;
use crate::runtime::RuntimeHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub bus: Bus,
    pub runtime: RuntimeHandle,
}

impl AppState {
    pub fn new(bus: Bus, runtime: RuntimeHandle) -> Self {
        Self { bus, runtime }
    }
}
