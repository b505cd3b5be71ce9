//! User-exit latch shared by every pipeline loop.
//!
//! Wraps a watch channel into a single-writer, many-readers boolean latch:
//! the signal handler (or an operator call) flips it once, and every loop
//! polls it at iteration boundaries. There are no hard cancellations; a loop
//! that observes the latch finishes its current iteration plus one drain
//! pass before exiting.

use tokio::sync::watch;

const SHUTDOWN_DEFAULT: bool = false;

/// Transmitter side of the shutdown latch.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Flips the latch. Once set it never resets.
    pub fn shutdown(&self) {
        // Send only fails when every receiver is gone, at which point there
        // is nothing left to stop.
        let _ = self.0.send(true);
    }

    /// Creates a new receiver observing this latch.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the shutdown latch.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// True once a shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }
}

/// Creates the shutdown latch in the unset state.
pub fn shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(SHUTDOWN_DEFAULT);
    (ShutdownTx(tx), ShutdownRx(rx))
}
