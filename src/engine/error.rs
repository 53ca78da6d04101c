use std::fmt;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{BookingStatus, Transition};
use crate::store::StoreError;

/// Malformed or unacceptable caller input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MalformedDate(String),
    EmptyStay { check_in: NaiveDate, check_out: NaiveDate },
    StayTooLong { nights: u32, max: u32 },
    UnknownRoom(Ulid),
    RoomInactive(Ulid),
    NoGuests,
    GuestsExceedCapacity { requested: u32, capacity: u32 },
    MissingField(&'static str),
    TooLong(&'static str),
    InvalidEmail,
    InvalidCapacity,
    DuplicateRoomNumber(String),
    InvalidPayment(&'static str),
    PriceTooHigh { max: u64 },
    /// The stay's total does not fit in an amount.
    AmountOverflow,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MalformedDate(s) => write!(f, "not a YYYY-MM-DD date: {s:?}"),
            ValidationError::EmptyStay { check_in, check_out } => {
                write!(f, "check-in {check_in} must be before check-out {check_out}")
            }
            ValidationError::StayTooLong { nights, max } => {
                write!(f, "stay of {nights} nights exceeds the maximum of {max}")
            }
            ValidationError::UnknownRoom(id) => write!(f, "unknown room: {id}"),
            ValidationError::RoomInactive(id) => write!(f, "room {id} is not bookable"),
            ValidationError::NoGuests => write!(f, "number of guests must be at least 1"),
            ValidationError::GuestsExceedCapacity { requested, capacity } => {
                write!(f, "{requested} guests exceed room capacity {capacity}")
            }
            ValidationError::MissingField(field) => write!(f, "{field} is required"),
            ValidationError::TooLong(field) => write!(f, "{field} is too long"),
            ValidationError::InvalidEmail => write!(f, "guest email is not valid"),
            ValidationError::InvalidCapacity => write!(f, "room capacity must be at least 1"),
            ValidationError::DuplicateRoomNumber(n) => write!(f, "room number {n} already exists"),
            ValidationError::InvalidPayment(msg) => write!(f, "invalid payment: {msg}"),
            ValidationError::PriceTooHigh { max } => {
                write!(f, "price per night exceeds the maximum of {max}")
            }
            ValidationError::AmountOverflow => write!(f, "stay total is too large"),
        }
    }
}

/// An operation that is illegal from the booking's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    IllegalTransition {
        booking_id: Ulid,
        from: BookingStatus,
        transition: Transition,
    },
    OutsideStayWindow {
        booking_id: Ulid,
        today: NaiveDate,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    BeforeArrival {
        booking_id: Ulid,
        today: NaiveDate,
        check_in: NaiveDate,
    },
    PaymentClosed {
        booking_id: Ulid,
    },
    NothingToRefund {
        booking_id: Ulid,
    },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::IllegalTransition { booking_id, from, transition } => {
                write!(f, "cannot {transition} booking {booking_id} in state {from}")
            }
            StateError::OutsideStayWindow { booking_id, today, check_in, check_out } => write!(
                f,
                "booking {booking_id} covers [{check_in}, {check_out}); today is {today}"
            ),
            StateError::BeforeArrival { booking_id, today, check_in } => {
                write!(f, "booking {booking_id} arrives {check_in}; today is {today}")
            }
            StateError::PaymentClosed { booking_id } => {
                write!(f, "booking {booking_id} no longer accepts payments")
            }
            StateError::NothingToRefund { booking_id } => {
                write!(f, "booking {booking_id} has nothing to refund")
            }
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    Validation(ValidationError),
    /// The requested stay overlaps this active booking.
    Conflict(Ulid),
    State(StateError),
    NotFound(Ulid),
    CodeNotFound(String),
    /// Bookings still reference the room.
    RoomInUse(Ulid),
    /// Two active bookings on one room overlap; only possible through writes
    /// that bypass the engine.
    Inconsistent { room_id: Ulid, first: Ulid, second: Ulid },
    Store(String),
}

impl EngineError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Conflict(_) => "conflict",
            EngineError::State(_) => "state",
            EngineError::NotFound(_) | EngineError::CodeNotFound(_) => "not_found",
            EngineError::RoomInUse(_) => "room_in_use",
            EngineError::Inconsistent { .. } => "inconsistent",
            EngineError::Store(_) => "store",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(e) => write!(f, "validation failed: {e}"),
            EngineError::Conflict(id) => write!(f, "conflict with booking: {id}"),
            EngineError::State(e) => write!(f, "illegal state: {e}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::CodeNotFound(code) => write!(f, "no booking with code {code}"),
            EngineError::RoomInUse(id) => write!(f, "room {id} is referenced by bookings"),
            EngineError::Inconsistent { room_id, first, second } => write!(
                f,
                "room {room_id} has overlapping active bookings {first} and {second}"
            ),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::Validation(e)
    }
}

impl From<StateError> for EngineError {
    fn from(e: StateError) -> Self {
        EngineError::State(e)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e.0)
    }
}
