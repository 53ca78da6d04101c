mod durable;
mod memory;

pub use durable::DurableStore;
pub use memory::InMemoryStore;

use std::fmt;
use std::io;

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::{Room, RoomBooking};

#[derive(Debug)]
pub struct StoreError(pub String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError(e.to_string())
    }
}

/// Keyed collection of rooms and bookings. The engine talks to storage only
/// through this trait.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn rooms(&self) -> Result<Vec<Room>, StoreError>;

    async fn room(&self, id: Ulid) -> Result<Option<Room>, StoreError>;

    async fn put_room(&self, room: Room) -> Result<(), StoreError>;

    /// Returns whether a room was removed.
    async fn delete_room(&self, id: Ulid) -> Result<bool, StoreError>;

    async fn bookings(&self) -> Result<Vec<RoomBooking>, StoreError>;

    async fn booking(&self, id: Ulid) -> Result<Option<RoomBooking>, StoreError>;

    async fn put_booking(&self, booking: RoomBooking) -> Result<(), StoreError>;

    async fn delete_booking(&self, id: Ulid) -> Result<bool, StoreError>;

    /// Every booking against `room_id`, any status.
    async fn bookings_for_room(&self, room_id: Ulid) -> Result<Vec<RoomBooking>, StoreError> {
        let mut all = self.bookings().await?;
        all.retain(|b| b.room_id == room_id);
        Ok(all)
    }
}
