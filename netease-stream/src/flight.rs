//! Single-flight bookkeeping for upstream fetches.
//!
//! At most one fetch runs per cache key. The first request for a key becomes
//! the leader and receives a [`Flight`]; later requests get a receiver for the
//! same outcome. The key is removed from the map before the outcome is
//! published, so a request arriving afterwards sees the committed file.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::error::FetchFailure;

pub type Outcome = Result<(), FetchFailure>;

type Slot = watch::Receiver<Option<Outcome>>;

#[derive(Debug, Default)]
pub struct FlightMap {
    inner: Mutex<HashMap<String, Slot>>,
}

/// Result of [`FlightMap::join`].
pub enum Joined {
    /// No fetch was running; the caller must run one and complete the flight.
    Leader(Flight, Slot),
    /// A fetch is already running; wait on the receiver.
    Follower(Slot),
}

impl FlightMap {
    /// Atomically attach to the running fetch for `key` or register a new one.
    pub fn join(self: &Arc<Self>, key: &str) -> Joined {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rx) = map.get(key) {
            debug!(%key, "joining in-flight fetch");
            return Joined::Follower(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        map.insert(key.to_owned(), rx.clone());
        let flight = Flight {
            map: Arc::clone(self),
            key: key.to_owned(),
            tx: Some(tx),
        };
        Joined::Leader(flight, rx)
    }

    /// Number of fetches currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn remove(&self, key: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Leader's handle on a registered fetch.
///
/// Dropping it without [`complete`](Self::complete) releases every waiter with
/// [`FetchFailure::abandoned`].
pub struct Flight {
    map: Arc<FlightMap>,
    key: String,
    tx: Option<watch::Sender<Option<Outcome>>>,
}

impl Flight {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn complete(mut self, outcome: Outcome) {
        self.publish(outcome);
    }

    fn publish(&mut self, outcome: Outcome) {
        if let Some(tx) = self.tx.take() {
            self.map.remove(&self.key);
            tx.send_replace(Some(outcome));
        }
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        self.publish(Err(FetchFailure::abandoned()));
    }
}

/// Wait until the flight behind `rx` publishes its outcome.
pub async fn wait(mut rx: Slot) -> Outcome {
    match rx.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone().unwrap_or_else(|| Err(FetchFailure::abandoned())),
        Err(_) => Err(FetchFailure::abandoned()),
    }
}
