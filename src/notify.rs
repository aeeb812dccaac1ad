use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{CarId, Event};

const CHANNEL_CAPACITY: usize = 256;

/// Per-car change feed. Every committed record touching a car is published
/// after it is durable, so calendar views can refresh their schedule.
pub struct NotifyHub {
    channels: DashMap<CarId, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    pub fn subscribe(&self, car_id: CarId) -> broadcast::Receiver<Event> {
        self.channels
            .entry(car_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// No-op when nobody listens on `car_id`.
    pub fn send(&self, car_id: CarId, event: &Event) {
        if let Some(sender) = self.channels.get(&car_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop the channel once the last receiver is gone.
    pub fn prune(&self, car_id: &CarId) {
        self.channels
            .remove_if(car_id, |_, sender| sender.receiver_count() == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let car = Ulid::new();
        let mut rx = hub.subscribe(car);

        let event = Event::CarActiveSet { id: car, active: false };
        hub.send(car, &event);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn other_cars_not_delivered() {
        let hub = NotifyHub::new();
        let watched = Ulid::new();
        let other = Ulid::new();
        let mut rx = hub.subscribe(watched);

        hub.send(other, &Event::CarDeleted { id: other });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let car = Ulid::new();
        hub.send(car, &Event::CarDeleted { id: car });
    }

    #[test]
    fn prune_keeps_live_channels() {
        let hub = NotifyHub::new();
        let car = Ulid::new();
        let rx = hub.subscribe(car);
        hub.prune(&car);
        assert!(hub.channels.contains_key(&car));
        drop(rx);
        hub.prune(&car);
        assert!(!hub.channels.contains_key(&car));
    }
}
