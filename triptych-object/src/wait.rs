//! Async wait for a write ticket's turn.
//!
//! Writers park on the control region's `Notify` and are woken when the
//! serving ticket advances or the object is poisoned. Platforms and runtimes
//! give no hard guarantee that every wake is delivered promptly, so the wait
//! re-checks state after a fallback poll interval; this bounds how long a
//! missed wake or a late poison can go unobserved, and does not affect
//! admission order.

use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;

use crate::control::ControlBlock;
use crate::error::WriteError;

/// Default fallback poll interval for ticket waits.
pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Tunables for the write-side ticket wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitOptions {
    /// How long a parked writer waits for a wake before re-checking the
    /// serving ticket and the poison flag. Defaults to 10 ms.
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Suspend until `ticket` is being served, or fail fast on poison.
pub(crate) async fn await_turn(
    block: &ControlBlock,
    waiters: &Notify,
    ticket: u32,
    poll_interval: Duration,
) -> Result<(), WriteError> {
    loop {
        if block.is_poisoned() {
            return Err(WriteError::Poisoned);
        }
        if block.serving_ticket() == ticket {
            return Ok(());
        }

        let notified = waiters.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        // State may have changed between the checks above and wait
        // registration; re-check before parking.
        if block.is_poisoned() || block.serving_ticket() == ticket {
            continue;
        }

        let _ = time::timeout(poll_interval, notified.as_mut()).await;
    }
}
