use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::{BookingRequest, Room, StayDates};

use super::ledger::RoomLedger;
use super::{Engine, EngineError, ValidationError};

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = s.trim();
    // chrono accepts unpadded fields; the wire format does not.
    if trimmed.len() != 10 {
        return Err(ValidationError::MalformedDate(s.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| ValidationError::MalformedDate(s.to_string()))
}

pub fn parse_stay(check_in: &str, check_out: &str) -> Result<StayDates, ValidationError> {
    let check_in = parse_date(check_in)?;
    let check_out = parse_date(check_out)?;
    let stay = StayDates::try_new(check_in, check_out)
        .ok_or(ValidationError::EmptyStay { check_in, check_out })?;
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(ValidationError::StayTooLong {
            nights: stay.nights(),
            max: MAX_STAY_NIGHTS,
        });
    }
    Ok(stay)
}

fn require(value: &str, field: &'static str, max_len: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if value.len() > max_len {
        return Err(ValidationError::TooLong(field));
    }
    Ok(())
}

/// Field checks that need no store access.
pub(super) fn validate_request(request: &BookingRequest) -> Result<StayDates, ValidationError> {
    require(&request.guest_name, "guest name", MAX_GUEST_NAME_LEN)?;
    require(&request.guest_email, "guest email", MAX_EMAIL_LEN)?;
    let email = request.guest_email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return Err(ValidationError::InvalidEmail),
    }
    if let Some(phone) = &request.guest_phone
        && phone.len() > MAX_PHONE_LEN
    {
        return Err(ValidationError::TooLong("guest phone"));
    }
    if let Some(notes) = &request.special_requests
        && notes.len() > MAX_SPECIAL_REQUESTS_LEN
    {
        return Err(ValidationError::TooLong("special requests"));
    }
    require(&request.created_by, "created by", MAX_ACTOR_LEN)?;
    parse_stay(&request.check_in, &request.check_out)
}

/// The room must be active and big enough.
pub(super) fn check_room(room: &Room, guests: u32) -> Result<(), ValidationError> {
    if !room.is_active {
        return Err(ValidationError::RoomInactive(room.id));
    }
    if guests == 0 {
        return Err(ValidationError::NoGuests);
    }
    if guests > room.capacity {
        return Err(ValidationError::GuestsExceedCapacity {
            requested: guests,
            capacity: room.capacity,
        });
    }
    Ok(())
}

/// First active stay overlapping `stay` wins.
pub(super) fn check_no_conflict(ledger: &RoomLedger, stay: &StayDates) -> Result<(), EngineError> {
    match ledger.overlapping(stay).next() {
        Some(existing) => Err(EngineError::Conflict(existing.booking_id)),
        None => Ok(()),
    }
}

impl Engine {
    /// Whether `room_id` can take `guests` for `[check_in, check_out)`. No side effects.
    pub async fn check_availability(
        &self,
        room_id: Ulid,
        check_in: &str,
        check_out: &str,
        guests: u32,
    ) -> Result<(), EngineError> {
        let stay = parse_stay(check_in, check_out)?;
        let room = self
            .store
            .room(room_id)
            .await?
            .ok_or(ValidationError::UnknownRoom(room_id))?;
        check_room(&room, guests)?;
        let ledger = self.lock_room(room_id).await?;
        check_no_conflict(&ledger, &stay)
    }
}
