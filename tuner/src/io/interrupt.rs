//! Out-of-band cancellation for the scheduler loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Granularity at which sleeping waits re-check the flag.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Shared, cloneable interrupt flag. Once triggered it stays triggered.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless interrupted first.
    ///
    /// Returns `true` if the interrupt fired before or during the wait.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_triggered() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }
}

/// Trigger `interrupt` on Ctrl-C / SIGINT.
///
/// The signal is awaited on a dedicated thread running a single-threaded
/// tokio runtime, so the scheduler itself stays synchronous.
pub fn install_ctrl_c(interrupt: Interrupt) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build signal runtime")?;
    thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        debug!("interrupt received");
                        interrupt.trigger();
                    }
                    Err(err) => warn!(err = %err, "could not listen for ctrl-c"),
                }
            });
        })
        .context("spawn signal thread")?;
    Ok(())
}
