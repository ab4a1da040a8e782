//! Connectivity state
//!
//! The platform binding reports the set of active network mediums. The
//! monitor reduces that to online/offline and broadcasts a change only on an
//! actual transition, so flapping between Wi-Fi and mobile stays silent.

use chrono::{DateTime, Utc};
use flume::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityMedium {
    Wifi,
    Mobile,
    Ethernet,
    Vpn,
    Bluetooth,
    Other,
    None,
}

/// Broadcast on every offline/online transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityChange {
    pub online: bool,
    pub at: DateTime<Utc>,
}

pub struct ConnectivityMonitor {
    online: AtomicBool,
    subscribers: Mutex<Vec<Sender<ConnectivityChange>>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        Self {
            online: AtomicBool::new(initially_online),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Report the currently active mediums. Returns true on a transition.
    pub fn report(&self, mediums: &[ConnectivityMedium]) -> bool {
        let online = mediums.iter().any(|m| *m != ConnectivityMedium::None);
        debug!("Connectivity report: {:?}", mediums);
        self.set_online(online)
    }

    pub fn set_online(&self, online: bool) -> bool {
        if self.online.swap(online, Ordering::SeqCst) == online {
            return false;
        }

        info!("Connectivity {}", if online { "restored" } else { "lost" });
        let change = ConnectivityChange {
            online,
            at: Utc::now(),
        };

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(change).is_ok());
        true
    }

    /// Receive every future transition.
    pub fn subscribe(&self) -> Receiver<ConnectivityChange> {
        let (tx, rx) = flume::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }
}
