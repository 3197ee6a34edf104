// ── Local actuator seam ──
//
// The on/off device that smart-home controllers read and write. The engine
// is its only programmatic writer; controller writes arrive as external
// events. Engine writes are never echoed back as external events, which is
// what keeps a poll-driven write from turning into a door command.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::warn;

use crate::error::ActuatorError;

const EXTERNAL_CHANNEL_SIZE: usize = 16;

/// Proxy to an externally-owned binary device.
pub trait Actuator: Send + Sync + 'static {
    /// Current value.
    fn get(&self) -> bool;

    /// Engine-side write. Setting the held value is a no-op, and no write
    /// made through here is reported by [`subscribe`](Self::subscribe).
    fn set(&self, value: bool) -> impl Future<Output = Result<(), ActuatorError>> + Send;

    /// Subscribe to controller-initiated writes.
    fn subscribe(&self) -> ExternalWrites;
}

/// Subscription to controller-initiated writes. Dropping it unsubscribes.
pub struct ExternalWrites {
    receiver: broadcast::Receiver<bool>,
}

impl ExternalWrites {
    pub fn new(receiver: broadcast::Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Wait for the next external write.
    ///
    /// Returns `None` once the device is gone. A subscriber that fell
    /// behind jumps to the newest retained write; older intent is dropped.
    pub async fn recv(&mut self) -> Option<bool> {
        loop {
            match self.receiver.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "external write subscriber lagged");
                    if let Some(value) = self.latest() {
                        return Some(value);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drain every retained write and keep the last one.
    fn latest(&mut self) -> Option<bool> {
        let mut last = None;
        loop {
            match self.receiver.try_recv() {
                Ok(value) => last = Some(value),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "external write subscriber lagged");
                }
                Err(
                    broadcast::error::TryRecvError::Empty
                    | broadcast::error::TryRecvError::Closed,
                ) => return last,
            }
        }
    }
}

/// In-process on/off device.
///
/// Cheaply cloneable; all clones share one value. The host protocol stack
/// calls [`external_write`](Self::external_write) when a controller flips
/// the switch and mirrors engine writes through [`watch`](Self::watch).
#[derive(Clone)]
pub struct LocalSwitch {
    inner: Arc<SwitchInner>,
}

struct SwitchInner {
    label: String,
    value: watch::Sender<bool>,
    external: broadcast::Sender<bool>,
}

impl LocalSwitch {
    pub fn new(label: impl Into<String>, initial: bool) -> Self {
        let (value, _) = watch::channel(initial);
        let (external, _) = broadcast::channel(EXTERNAL_CHANNEL_SIZE);
        Self {
            inner: Arc::new(SwitchInner {
                label: label.into(),
                value,
                external,
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Controller-side write. Stores the value and notifies subscribers
    /// when it actually changed. Returns whether it changed.
    pub fn external_write(&self, value: bool) -> bool {
        let changed = self.store(value);
        if changed {
            // No subscribers is fine: nobody is listening yet.
            let _ = self.inner.external.send(value);
        }
        changed
    }

    /// Observe every value change, whichever side made it.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.value.subscribe()
    }

    fn store(&self, value: bool) -> bool {
        self.inner.value.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

impl std::fmt::Debug for LocalSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSwitch")
            .field("label", &self.inner.label)
            .field("value", &*self.inner.value.borrow())
            .finish_non_exhaustive()
    }
}

impl Actuator for LocalSwitch {
    fn get(&self) -> bool {
        *self.inner.value.borrow()
    }

    async fn set(&self, value: bool) -> Result<(), ActuatorError> {
        self.store(value);
        Ok(())
    }

    fn subscribe(&self) -> ExternalWrites {
        ExternalWrites::new(self.inner.external.subscribe())
    }
}
