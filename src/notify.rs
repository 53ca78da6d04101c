use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Change;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for status changes, per room and across all rooms.
/// Delivery is best effort: slow receivers lag and lose old changes.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Change>>,
    all: broadcast::Sender<Change>,
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
            all: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to changes on one room. Creates the channel if needed.
    pub fn subscribe(&self, room_id: Ulid) -> broadcast::Receiver<Change> {
        self.channels
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<Change> {
        self.all.subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, change: Change) {
        if let Some(sender) = self.channels.get(&change.room_id()) {
            let _ = sender.send(change.clone());
        }
        let _ = self.all.send(change);
    }

    pub fn remove(&self, room_id: &Ulid) {
        self.channels.remove(room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoomStatus;

    #[tokio::test]
    async fn room_and_global_subscribers_receive() {
        let hub = NotifyHub::new();
        let rid = Ulid::new();
        let mut room_rx = hub.subscribe(rid);
        let mut all_rx = hub.subscribe_all();

        let change = Change::RoomStatusChanged {
            room_id: rid,
            from: RoomStatus::AVAILABLE,
            to: RoomStatus::RESERVED,
        };
        hub.send(change.clone());

        assert_eq!(room_rx.recv().await.unwrap(), change);
        assert_eq!(all_rx.recv().await.unwrap(), change);
    }

    #[tokio::test]
    async fn other_rooms_are_not_notified() {
        let hub = NotifyHub::new();
        let mut rx = hub.subscribe(Ulid::new());
        hub.send(Change::RoomStatusChanged {
            room_id: Ulid::new(),
            from: RoomStatus::AVAILABLE,
            to: RoomStatus::OCCUPIED,
        });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let rid = Ulid::new();
        hub.send(Change::RoomStatusChanged {
            room_id: rid,
            from: RoomStatus::AVAILABLE,
            to: RoomStatus::MAINTENANCE,
        });
        hub.remove(&rid);
    }
}
