//! Fan-out of change notifications to any number of subscribers.

use std::sync::mpsc::{self, Receiver, Sender};

/// Subscribers receiving clones of every published event.
///
/// Receivers that were dropped are pruned on the next publish.
#[derive(Debug)]
pub struct Subscribers<T> {
    senders: Vec<Sender<T>>,
}

impl<T: Clone> Subscribers<T> {
    pub fn new() -> Self {
        Self { senders: Vec::new() }
    }

    /// Register a new subscriber.
    pub fn subscribe(&mut self) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        self.senders.push(tx);
        rx
    }

    /// Register a new subscriber whose receiver starts with `initial` queued.
    pub fn subscribe_with(&mut self, initial: impl IntoIterator<Item = T>) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        for event in initial {
            // The receiver is alive in this scope, so the send cannot fail.
            let _ = tx.send(event);
        }
        self.senders.push(tx);
        rx
    }

    /// Send `event` to every live subscriber.
    pub fn publish(&mut self, event: T) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl<T: Clone> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}
