use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub async fn get_room(&self, room_id: Ulid) -> Result<Room, EngineError> {
        self.load_room(room_id).await
    }

    /// All rooms, ordered by room number.
    pub async fn list_rooms(&self) -> Result<Vec<Room>, EngineError> {
        let mut rooms = self.store.rooms().await?;
        rooms.sort_by(|a, b| a.room_number.cmp(&b.room_number));
        Ok(rooms)
    }

    pub async fn get_booking(&self, booking_id: Ulid) -> Result<RoomBooking, EngineError> {
        self.load_booking(booking_id).await
    }

    /// Codes are case-insensitive on input.
    pub async fn find_booking_by_code(&self, code: &str) -> Result<RoomBooking, EngineError> {
        let code = code.trim().to_ascii_uppercase();
        let indexed = self.codes.get(&code).map(|e| *e.value());
        if let Some(id) = indexed
            && let Some(booking) = self.store.booking(id).await?
        {
            return Ok(booking);
        }
        // Bookings written around the engine are not in the code index.
        self.store
            .bookings()
            .await?
            .into_iter()
            .find(|b| b.booking_code == code)
            .ok_or(EngineError::CodeNotFound(code))
    }

    /// The active booking holding the room tonight; checked-in wins over confirmed.
    pub async fn get_current_booking_for_room(
        &self,
        room_id: Ulid,
    ) -> Result<Option<RoomBooking>, EngineError> {
        self.load_room(room_id).await?;
        let today = self.clock.today();
        let mut current: Option<RoomBooking> = None;
        for booking in self.store.bookings_for_room(room_id).await? {
            if !booking.is_active() || !booking.dates().covers(today) {
                continue;
            }
            let replaces = match &current {
                None => true,
                Some(c) => {
                    c.booking_status != BookingStatus::CheckedIn
                        && booking.booking_status == BookingStatus::CheckedIn
                }
            };
            if replaces {
                current = Some(booking);
            }
        }
        Ok(current)
    }

    /// Full history for a room, any status, ordered by check-in.
    pub async fn get_bookings_for_room(
        &self,
        room_id: Ulid,
    ) -> Result<Vec<RoomBooking>, EngineError> {
        self.load_room(room_id).await?;
        let mut bookings = self.store.bookings_for_room(room_id).await?;
        bookings.sort_by_key(|b| (b.check_in, b.created_at));
        Ok(bookings)
    }
}
