use tokio::sync::OwnedRwLockWriteGuard;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError, RoomLedger, ValidationError, derive_occupancy};

fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::MissingField("room name"));
    }
    if name.len() > MAX_ROOM_NAME_LEN {
        return Err(ValidationError::TooLong("room name"));
    }
    Ok(())
}

fn check_price(price: Amount) -> Result<(), ValidationError> {
    if price > MAX_PRICE_PER_NIGHT {
        return Err(ValidationError::PriceTooHigh { max: MAX_PRICE_PER_NIGHT });
    }
    Ok(())
}

fn check_amenities(amenities: &[String]) -> Result<(), ValidationError> {
    if amenities.len() > MAX_AMENITIES {
        return Err(ValidationError::TooLong("amenities"));
    }
    Ok(())
}

impl Engine {
    /// Register a room. Room numbers are unique.
    pub async fn add_room(&self, new: NewRoom) -> Result<Room, EngineError> {
        let number = new.room_number.trim().to_string();
        if number.is_empty() {
            return Err(ValidationError::MissingField("room number").into());
        }
        if number.len() > MAX_ROOM_NUMBER_LEN {
            return Err(ValidationError::TooLong("room number").into());
        }
        check_name(&new.name)?;
        check_amenities(&new.amenities)?;
        check_price(new.price_per_night)?;
        if new.capacity == 0 {
            return Err(ValidationError::InvalidCapacity.into());
        }

        let _admin = self.room_admin.lock().await;
        if self
            .store
            .rooms()
            .await?
            .iter()
            .any(|r| r.room_number == number)
        {
            return Err(ValidationError::DuplicateRoomNumber(number).into());
        }

        let room = Room {
            id: Ulid::new(),
            room_number: number,
            name: new.name.trim().to_string(),
            room_type: new.room_type,
            floor: new.floor,
            capacity: new.capacity,
            price_per_night: new.price_per_night,
            amenities: new.amenities,
            is_active: true,
            status: RoomStatus::AVAILABLE,
            updated_at: self.clock.now(),
        };
        self.store.put_room(room.clone()).await?;
        info!(room_id = %room.id, number = %room.room_number, "room added");
        Ok(room)
    }

    /// Edit room metadata. Bookings keep the snapshot taken when they were made.
    pub async fn update_room(
        &self,
        room_id: Ulid,
        changes: RoomChanges,
    ) -> Result<Room, EngineError> {
        let _ledger = self.lock_room_checked(room_id).await?;
        let mut room = self.load_room(room_id).await?;

        if let Some(name) = changes.name {
            check_name(&name)?;
            room.name = name.trim().to_string();
        }
        if let Some(room_type) = changes.room_type {
            room.room_type = room_type;
        }
        if let Some(floor) = changes.floor {
            room.floor = floor;
        }
        if let Some(capacity) = changes.capacity {
            if capacity == 0 {
                return Err(ValidationError::InvalidCapacity.into());
            }
            room.capacity = capacity;
        }
        if let Some(price) = changes.price_per_night {
            check_price(price)?;
            room.price_per_night = price;
        }
        if let Some(amenities) = changes.amenities {
            check_amenities(&amenities)?;
            room.amenities = amenities;
        }
        room.updated_at = self.clock.now();
        self.store.put_room(room.clone()).await?;
        info!(%room_id, "room updated");
        Ok(room)
    }

    /// Soft-delete or restore a room. Inactive rooms take no new bookings.
    pub async fn set_room_active(&self, room_id: Ulid, active: bool) -> Result<Room, EngineError> {
        let _ledger = self.lock_room_checked(room_id).await?;
        let mut room = self.load_room(room_id).await?;
        if room.is_active != active {
            room.is_active = active;
            room.updated_at = self.clock.now();
            self.store.put_room(room.clone()).await?;
            info!(%room_id, active, "room activation changed");
        }
        Ok(room)
    }

    /// Put a room under maintenance, or release it back to derived status.
    pub async fn set_maintenance(
        &self,
        room_id: Ulid,
        on: bool,
    ) -> Result<RoomStatus, EngineError> {
        let mut ledger = self.lock_room_checked(room_id).await?;
        let mut room = self.load_room(room_id).await?;

        if on {
            if room.status == RoomStatus::MAINTENANCE {
                return Ok(room.status);
            }
            let from = room.status;
            room.status = RoomStatus::MAINTENANCE;
            room.updated_at = self.clock.now();
            self.store.put_room(room).await?;
            info!(%room_id, "room under maintenance");
            self.notify.send(Change::RoomStatusChanged {
                room_id,
                from,
                to: RoomStatus::MAINTENANCE,
            });
            return Ok(RoomStatus::MAINTENANCE);
        }

        if !room.status.is_override() {
            return Ok(room.status);
        }
        self.reload_ledger(&mut ledger).await?;
        let derived = RoomStatus::Derived(derive_occupancy(
            ledger.stays().iter().map(|s| (s.status, s.dates)),
            self.clock.today(),
        ));
        let from = room.status;
        room.status = derived;
        room.updated_at = self.clock.now();
        self.store.put_room(room).await?;
        info!(%room_id, "room released from maintenance as {derived}");
        self.notify.send(Change::RoomStatusChanged {
            room_id,
            from,
            to: derived,
        });
        Ok(derived)
    }

    /// Hard-delete a room that no booking has ever referenced.
    pub async fn delete_room(&self, room_id: Ulid) -> Result<(), EngineError> {
        let _ledger = self.lock_room_checked(room_id).await?;
        if !self.store.bookings_for_room(room_id).await?.is_empty() {
            return Err(EngineError::RoomInUse(room_id));
        }
        if !self.store.delete_room(room_id).await? {
            return Err(EngineError::NotFound(room_id));
        }
        self.forget_room(&room_id);
        info!(%room_id, "room deleted");
        Ok(())
    }

    /// Exclusive hold on a room that exists. The ledger is not loaded, so
    /// rooms with inconsistent bookings can still be administered.
    async fn lock_room_checked(
        &self,
        room_id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<RoomLedger>, EngineError> {
        self.load_room(room_id).await?;
        Ok(self.hold_room(room_id).await)
    }
}
