//! Edge-triggered connectivity signal.
//!
//! The platform layer owns a [`ConnectivitySignal`] and flips it when the
//! network comes and goes; the state container holds a receiver for as long
//! as it is mounted.

use tokio::sync::watch;

pub struct ConnectivitySignal {
    tx: watch::Sender<bool>,
}

impl ConnectivitySignal {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// Publish the current state. Repeating the current value is not an edge
    /// and wakes nobody.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    #[cfg(test)]
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
