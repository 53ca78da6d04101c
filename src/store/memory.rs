use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::{Room, RoomBooking, WalRecord};

use super::{RecordStore, StoreError};

/// Volatile store with a room → bookings index.
pub struct InMemoryStore {
    rooms: DashMap<Ulid, Room>,
    bookings: DashMap<Ulid, RoomBooking>,
    room_bookings: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            bookings: DashMap::new(),
            room_bookings: DashMap::new(),
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub(crate) fn insert_room(&self, room: Room) {
        self.rooms.insert(room.id, room);
    }

    pub(crate) fn remove_room(&self, id: &Ulid) -> bool {
        self.rooms.remove(id).is_some()
    }

    pub(crate) fn insert_booking(&self, booking: RoomBooking) {
        let id = booking.id;
        let room_id = booking.room_id;
        if let Some(previous) = self.bookings.insert(id, booking)
            && previous.room_id != room_id
        {
            self.unindex(&previous.room_id, &id);
        }
        let mut ids = self.room_bookings.entry(room_id).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    pub(crate) fn remove_booking(&self, id: &Ulid) -> bool {
        match self.bookings.remove(id) {
            Some((_, booking)) => {
                self.unindex(&booking.room_id, id);
                true
            }
            None => false,
        }
    }

    fn unindex(&self, room_id: &Ulid, booking_id: &Ulid) {
        if let Some(mut ids) = self.room_bookings.get_mut(room_id) {
            ids.retain(|b| b != booking_id);
        }
    }

    pub(crate) fn apply(&self, record: WalRecord) {
        match record {
            WalRecord::RoomPut(room) => self.insert_room(room),
            WalRecord::RoomDeleted { id } => {
                self.remove_room(&id);
            }
            WalRecord::BookingPut(booking) => self.insert_booking(booking),
            WalRecord::BookingDeleted { id } => {
                self.remove_booking(&id);
            }
        }
    }

    /// One `Put` per live record, rooms first.
    pub(crate) fn snapshot(&self) -> Vec<WalRecord> {
        let mut records: Vec<WalRecord> = self
            .rooms
            .iter()
            .map(|e| WalRecord::RoomPut(e.value().clone()))
            .collect();
        records.extend(
            self.bookings
                .iter()
                .map(|e| WalRecord::BookingPut(e.value().clone())),
        );
        records
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn rooms(&self) -> Result<Vec<Room>, StoreError> {
        Ok(self.rooms.iter().map(|e| e.value().clone()).collect())
    }

    async fn room(&self, id: Ulid) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms.get(&id).map(|e| e.value().clone()))
    }

    async fn put_room(&self, room: Room) -> Result<(), StoreError> {
        self.insert_room(room);
        Ok(())
    }

    async fn delete_room(&self, id: Ulid) -> Result<bool, StoreError> {
        Ok(self.remove_room(&id))
    }

    async fn bookings(&self) -> Result<Vec<RoomBooking>, StoreError> {
        Ok(self.bookings.iter().map(|e| e.value().clone()).collect())
    }

    async fn booking(&self, id: Ulid) -> Result<Option<RoomBooking>, StoreError> {
        Ok(self.bookings.get(&id).map(|e| e.value().clone()))
    }

    async fn put_booking(&self, booking: RoomBooking) -> Result<(), StoreError> {
        self.insert_booking(booking);
        Ok(())
    }

    async fn delete_booking(&self, id: Ulid) -> Result<bool, StoreError> {
        Ok(self.remove_booking(&id))
    }

    async fn bookings_for_room(&self, room_id: Ulid) -> Result<Vec<RoomBooking>, StoreError> {
        let ids = self
            .room_bookings
            .get(&room_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| self.bookings.get(id).map(|e| e.value().clone()))
            .collect())
    }
}
