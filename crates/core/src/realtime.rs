//! In-process publish/subscribe scoped to the subscriber's lifetime.
//!
//! A [`Subscription`] is the only handle to a registration: dropping it
//! removes the registration from the hub, so a view that goes away cannot
//! leak a listener.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;

struct Inner<E> {
    next_id: u64,
    topics: HashMap<String, Vec<(u64, Sender<E>)>>,
}

pub struct Hub<E> {
    inner: Arc<Mutex<Inner<E>>>,
}

impl<E> Clone for Hub<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E> Default for Hub<E> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                topics: HashMap::new(),
            })),
        }
    }
}

fn lock<E>(m: &Mutex<Inner<E>>) -> MutexGuard<'_, Inner<E>> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<E: Clone> Hub<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str) -> Subscription<E> {
        let (tx, rx) = mpsc::channel();
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .topics
            .entry(topic.to_string())
            .or_default()
            .push((id, tx));
        debug!(target: "core::realtime", "subscribe topic={} id={}", topic, id);
        Subscription {
            hub: Arc::downgrade(&self.inner),
            topic: topic.to_string(),
            id,
            rx,
        }
    }

    /// Delivers `event` to every live subscriber of `topic`; returns how many received it.
    pub fn publish(&self, topic: &str, event: E) -> usize {
        let mut inner = lock(&self.inner);
        let Some(subs) = inner.topics.get_mut(topic) else {
            return 0;
        };
        subs.retain(|(_, tx)| tx.send(event.clone()).is_ok());
        subs.len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        lock(&self.inner)
            .topics
            .get(topic)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

pub struct Subscription<E> {
    hub: Weak<Mutex<Inner<E>>>,
    topic: String,
    id: u64,
    rx: Receiver<E>,
}

impl<E> Subscription<E> {
    pub fn try_next(&self) -> Option<E> {
        match self.rx.try_recv() {
            Ok(e) => Some(e),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn drain(&self) -> Vec<E> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        let Some(inner) = self.hub.upgrade() else {
            return;
        };
        let mut inner = lock(&inner);
        if let Some(subs) = inner.topics.get_mut(&self.topic) {
            subs.retain(|(id, _)| *id != self.id);
            if subs.is_empty() {
                inner.topics.remove(&self.topic);
            }
        }
        debug!(target: "core::realtime", "unsubscribe topic={} id={}", self.topic, self.id);
    }
}
