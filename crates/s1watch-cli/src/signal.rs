//! Cooperative shutdown for the daemons.
//!
//! SIGINT and SIGTERM flip an atomic flag; the main loops watch it and do
//! their own flush-and-exit. Handlers stay async-signal-trivial.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

/// Install SIGINT/SIGTERM handlers and return the running flag they clear.
pub fn install_signal_handlers() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
        warn!("signal handler not installed: {e}");
    }
    running
}
