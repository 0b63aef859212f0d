//! Notification of accepted signals.
//!
//! Each subscriber owns an unbounded queue, so a slow consumer never causes
//! another to miss an event. Dropping or cancelling a [`Subscription`]
//! detaches it; the bus prunes closed queues on the next publish.

use crate::signal::Signal;
use log::debug;
use pasta_curves::pallas;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

/// An accepted signal. Carries nothing that identifies the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEvent {
    pub signal: Signal,
    pub scope: String,
    pub nullifier_hash: pallas::Base,
    pub root: pallas::Base,
}

#[derive(Debug, Default)]
pub struct SignalBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SignalEvent>>>,
}

impl SignalBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber that receives every event published from now on.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Subscription { rx }
    }

    /// Delivers `event` to every live subscriber and returns how many got it.
    pub fn publish(&self, event: &SignalEvent) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        debug!("Signal event delivered to {} subscribers", subscribers.len());
        subscribers.len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

/// Receiving end of a [`SignalBus`] subscription.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SignalEvent>,
}

impl Subscription {
    /// Waits for the next event. Returns `None` once the bus is gone and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<SignalEvent> {
        self.rx.recv().await
    }

    /// Next queued event, if any.
    pub fn try_recv(&mut self) -> Option<SignalEvent> {
        self.rx.try_recv().ok()
    }

    /// Stops delivery. Already queued events are discarded.
    pub fn cancel(mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(n: u64) -> SignalEvent {
        SignalEvent {
            signal: Signal::from("hi"),
            scope: "unit".into(),
            nullifier_hash: pallas::Base::from(n),
            root: pallas::Base::from(1),
        }
    }

    #[test]
    fn every_subscriber_receives_each_event() {
        let bus = SignalBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(&event(1)), 2);
        assert_eq!(a.try_recv(), Some(event(1)));
        assert_eq!(b.try_recv(), Some(event(1)));
        assert_eq!(a.try_recv(), None);
    }

    #[test]
    fn cancelled_subscription_is_pruned() {
        let bus = SignalBus::new();
        let a = bus.subscribe();
        let mut b = bus.subscribe();

        a.cancel();
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.publish(&event(2)), 1);
        assert_eq!(b.try_recv(), Some(event(2)));
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let bus = SignalBus::new();
        drop(bus.subscribe());
        assert_eq!(bus.publish(&event(3)), 0);
    }

    #[tokio::test]
    async fn recv_waits_for_publish() {
        let bus = std::sync::Arc::new(SignalBus::new());
        let mut sub = bus.subscribe();

        let publisher = std::sync::Arc::clone(&bus);
        tokio::spawn(async move {
            publisher.publish(&event(4));
        });

        assert_eq!(sub.recv().await, Some(event(4)));
    }
}
