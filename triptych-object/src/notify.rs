//! Change-notification fan-out.
//!
//! Every shared object owns a process-visible broadcast channel named
//! `shared-object:<id>`. One message is sent per successful publish, after
//! the write lock is released. Subscribers attach by channel name alone; no
//! descriptor is needed. The channel is bounded, so a subscriber that falls
//! behind observes a single coalesced wakeup for a burst of publishes rather
//! than one per publish.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Per-channel buffer: publishes beyond this coalesce for slow subscribers.
const CHANNEL_CAPACITY: usize = 16;

static HUB: Lazy<Mutex<HashMap<String, broadcast::Sender<()>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// The notification channel name for an object id.
pub fn channel_name(id: &str) -> String {
    format!("shared-object:{id}")
}

fn sender(channel: &str) -> broadcast::Sender<()> {
    let mut hub = HUB.lock().expect("notification hub lock");
    hub.entry(channel.to_string())
        .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
        .clone()
}

/// Broadcast one publish notification on `channel`.
pub(crate) fn publish(channel: &str) {
    // No subscribers is fine; the send result only reports that.
    let _ = sender(channel).send(());
}

/// A pull-style stream of publish notifications for one channel.
pub struct Updates {
    rx: broadcast::Receiver<()>,
}

impl Updates {
    /// Wait for the next publish.
    ///
    /// Returns `true` when at least one publish happened since the last call
    /// (a lagged subscriber sees one `true` for the whole burst).
    pub async fn changed(&mut self) -> bool {
        match self.rx.recv().await {
            // Lagging collapses a burst of publishes into one wakeup.
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => true,
            Err(broadcast::error::RecvError::Closed) => false,
        }
    }
}

/// Attach to `channel` by name, receiving future publish notifications.
pub fn updates_for_channel(channel: &str) -> Updates {
    Updates {
        rx: sender(channel).subscribe(),
    }
}

/// Registered change-notification callback. Dropping it unsubscribes.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Explicitly unsubscribe. Equivalent to dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Invoke `callback` once per publish notification on `channel`.
///
/// Registration is synchronous; delivery happens on a spawned task, so this
/// must be called within a tokio runtime. Under load, deliveries may
/// coalesce.
pub fn subscribe_channel(channel: &str, callback: impl Fn() + Send + 'static) -> Subscription {
    let mut updates = updates_for_channel(channel);
    let task = tokio::spawn(async move {
        while updates.changed().await {
            callback();
        }
    });
    Subscription { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn channel_names_are_prefixed() {
        assert_eq!(channel_name("telemetry"), "shared-object:telemetry");
    }

    #[tokio::test]
    async fn updates_see_publishes() {
        let channel = channel_name("notify-updates-test");
        let mut updates = updates_for_channel(&channel);

        publish(&channel);
        assert!(updates.changed().await);
    }

    #[tokio::test]
    async fn bursts_coalesce_for_lagged_subscribers() {
        let channel = channel_name("notify-coalesce-test");
        let mut updates = updates_for_channel(&channel);

        for _ in 0..CHANNEL_CAPACITY * 4 {
            publish(&channel);
        }

        // The subscriber lagged, but still observes the burst.
        assert!(updates.changed().await);
    }

    #[tokio::test]
    async fn callbacks_fire_and_stop_on_drop() {
        let channel = channel_name("notify-callback-test");
        let hits = Arc::new(AtomicUsize::new(0));
        let sub = subscribe_channel(&channel, {
            let hits = hits.clone();
            move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });

        publish(&channel);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(hits.load(Ordering::SeqCst) >= 1);

        sub.unsubscribe();
        let before = hits.load(Ordering::SeqCst);
        publish(&channel);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), before);
    }
}
