use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, check_room, validate_request};
use super::ledger::{ActiveStay, RoomLedger};
use super::{Engine, EngineError, StateError, ValidationError};

/// Eight Crockford base-32 characters from the random half of a fresh ULID.
fn draw_code() -> String {
    let s = Ulid::new().to_string();
    s[s.len() - BOOKING_CODE_LEN..].to_string()
}

/// Extra requirement a transition places on the booking beyond its status.
fn precondition(
    transition: Transition,
    booking: &RoomBooking,
    today: NaiveDate,
) -> Result<(), StateError> {
    match transition {
        Transition::CheckIn if !booking.dates().covers(today) => {
            Err(StateError::OutsideStayWindow {
                booking_id: booking.id,
                today,
                check_in: booking.check_in,
                check_out: booking.check_out,
            })
        }
        Transition::MarkNoShow if today < booking.check_in => Err(StateError::BeforeArrival {
            booking_id: booking.id,
            today,
            check_in: booking.check_in,
        }),
        _ => Ok(()),
    }
}

impl Engine {
    /// Validate, conflict-check and persist a new confirmed booking.
    pub async fn create_booking(
        &self,
        request: BookingRequest,
    ) -> Result<RoomBooking, EngineError> {
        let room_id = request.room_id;
        match self.try_create_booking(request).await {
            Ok(booking) => {
                metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
                info!(
                    booking_id = %booking.id,
                    code = %booking.booking_code,
                    room_id = %booking.room_id,
                    stay = %booking.dates(),
                    total = booking.total_amount,
                    "booking created"
                );
                Ok(booking)
            }
            Err(e) => {
                metrics::counter!(observability::BOOKINGS_REJECTED_TOTAL, "reason" => e.kind())
                    .increment(1);
                warn!(%room_id, "booking rejected: {e}");
                Err(e)
            }
        }
    }

    async fn try_create_booking(
        &self,
        request: BookingRequest,
    ) -> Result<RoomBooking, EngineError> {
        let stay = validate_request(&request)?;
        if self.store.room(request.room_id).await?.is_none() {
            return Err(ValidationError::UnknownRoom(request.room_id).into());
        }

        let mut ledger = self.lock_room(request.room_id).await?;
        // Re-read under the lock so the price snapshot matches what was checked.
        let room = self
            .store
            .room(request.room_id)
            .await?
            .ok_or(ValidationError::UnknownRoom(request.room_id))?;
        check_room(&room, request.number_of_guests)?;
        check_no_conflict(&ledger, &stay)?;
        let total_amount = room
            .price_per_night
            .checked_mul(u64::from(stay.nights()))
            .ok_or(ValidationError::AmountOverflow)?;

        let id = Ulid::new();
        let booking_code = self.issue_code(id)?;
        let booking = RoomBooking {
            id,
            booking_code: booking_code.clone(),
            room_id: room.id,
            room_number: room.room_number.clone(),
            room_name: room.name.clone(),
            price_per_night: room.price_per_night,
            guest_name: request.guest_name.trim().to_string(),
            guest_email: request.guest_email.trim().to_string(),
            guest_phone: request.guest_phone,
            check_in: stay.check_in,
            check_out: stay.check_out,
            number_of_guests: request.number_of_guests,
            special_requests: request.special_requests,
            total_amount,
            amount_paid: 0,
            payment_status: PaymentStatus::Pending,
            booking_status: BookingStatus::Confirmed,
            created_by: request.created_by,
            created_at: self.clock.now(),
            checked_in_at: None,
            checked_out_at: None,
            cancellation: None,
        };

        if let Err(e) = self.store.put_booking(booking.clone()).await {
            self.codes.remove(&booking_code);
            return Err(e.into());
        }
        ledger.insert(ActiveStay::from(&booking));
        self.notify.send(Change::BookingStatusChanged {
            booking_id: id,
            room_id: room.id,
            from: None,
            to: BookingStatus::Confirmed,
        });
        self.refresh_status(&ledger).await;
        Ok(booking)
    }

    /// Reserve an unused booking code for `booking_id`.
    fn issue_code(&self, booking_id: Ulid) -> Result<String, EngineError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = draw_code();
            if let Entry::Vacant(slot) = self.codes.entry(code.clone()) {
                slot.insert(booking_id);
                return Ok(code);
            }
        }
        Err(EngineError::Store("could not allocate a unique booking code".into()))
    }

    /// Confirmed → checked-in, only on a night the booking covers.
    pub async fn check_in(&self, booking_id: Ulid) -> Result<RoomBooking, EngineError> {
        self.transition(booking_id, Transition::CheckIn, |b, now| {
            b.checked_in_at = Some(now);
        })
        .await
    }

    /// Checked-in → checked-out. Frees the room immediately, whatever the booked check-out date.
    pub async fn check_out(&self, booking_id: Ulid) -> Result<RoomBooking, EngineError> {
        self.transition(booking_id, Transition::CheckOut, |b, now| {
            b.checked_out_at = Some(now);
        })
        .await
    }

    /// Confirmed → cancelled.
    pub async fn cancel(
        &self,
        booking_id: Ulid,
        cancelled_by: &str,
        reason: &str,
    ) -> Result<RoomBooking, EngineError> {
        if cancelled_by.trim().is_empty() {
            return Err(ValidationError::MissingField("cancelled by").into());
        }
        if cancelled_by.len() > MAX_ACTOR_LEN {
            return Err(ValidationError::TooLong("cancelled by").into());
        }
        if reason.len() > MAX_SPECIAL_REQUESTS_LEN {
            return Err(ValidationError::TooLong("cancellation reason").into());
        }
        self.transition(booking_id, Transition::Cancel, |b, now| {
            b.cancellation = Some(Cancellation {
                reason: reason.to_string(),
                cancelled_by: cancelled_by.to_string(),
                cancelled_at: now,
            });
        })
        .await
    }

    /// Confirmed → no-show, from the arrival day on.
    pub async fn mark_no_show(&self, booking_id: Ulid) -> Result<RoomBooking, EngineError> {
        self.transition(booking_id, Transition::MarkNoShow, |_, _| {}).await
    }

    async fn transition(
        &self,
        booking_id: Ulid,
        transition: Transition,
        stamp: impl FnOnce(&mut RoomBooking, DateTime<Utc>),
    ) -> Result<RoomBooking, EngineError> {
        let result = self.try_transition(booking_id, transition, stamp).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(
            observability::TRANSITIONS_TOTAL,
            "action" => transition.label(),
            "status" => status
        )
        .increment(1);
        match &result {
            Ok(b) => info!(
                %booking_id,
                room_id = %b.room_id,
                "booking {transition}: now {}",
                b.booking_status
            ),
            Err(e) => warn!(%booking_id, "{transition} refused: {e}"),
        }
        result
    }

    async fn try_transition(
        &self,
        booking_id: Ulid,
        transition: Transition,
        stamp: impl FnOnce(&mut RoomBooking, DateTime<Utc>),
    ) -> Result<RoomBooking, EngineError> {
        let room_id = self.load_booking(booking_id).await?.room_id;
        // Only check-in can add an occupied night, so only it needs a sound ledger.
        let mut ledger = match transition {
            Transition::CheckIn => self.lock_room(room_id).await?,
            Transition::CheckOut | Transition::Cancel | Transition::MarkNoShow => {
                self.lock_room_for_repair(room_id).await?
            }
        };
        let mut booking = self.load_booking(booking_id).await?;
        if booking.room_id != room_id {
            // Reservation facts are immutable; only an outside writer can move a booking.
            return Err(EngineError::Store(format!(
                "booking {booking_id} moved rooms during update"
            )));
        }

        let from = booking.booking_status;
        let to = from.next(transition).ok_or(StateError::IllegalTransition {
            booking_id,
            from,
            transition,
        })?;
        precondition(transition, &booking, self.clock.today())?;

        booking.booking_status = to;
        stamp(&mut booking, self.clock.now());
        self.store.put_booking(booking.clone()).await?;

        if !ledger.is_loaded() {
            if let Err(e) = self.reload_ledger(&mut ledger).await {
                warn!(%room_id, "ledger still unsound after {transition}: {e}");
            }
        } else if to.is_active() {
            if !ledger.set_status(booking_id, to) {
                ledger.insert(ActiveStay::from(&booking));
            }
        } else {
            ledger.remove(booking_id);
        }
        self.notify.send(Change::BookingStatusChanged {
            booking_id,
            room_id,
            from: Some(from),
            to,
        });
        if ledger.is_loaded() {
            self.refresh_status(&ledger).await;
        }
        Ok(booking)
    }

    /// Bring the room's status in line with the ledger after a committed write.
    /// The write stands even if this fails; the next reconciliation repairs it.
    async fn refresh_status(&self, ledger: &RoomLedger) {
        if let Err(e) = self.apply_derived_status(ledger).await {
            warn!(room_id = %ledger.room_id, "status refresh failed: {e}");
        }
    }

    /// Add `amount` to what the guest has paid.
    pub async fn record_payment(
        &self,
        booking_id: Ulid,
        amount: Amount,
    ) -> Result<RoomBooking, EngineError> {
        if amount == 0 {
            return Err(ValidationError::InvalidPayment("amount must be positive").into());
        }
        let room_id = self.load_booking(booking_id).await?.room_id;
        let _room = self.hold_room(room_id).await;
        let mut booking = self.load_booking(booking_id).await?;

        if booking.booking_status == BookingStatus::Cancelled
            || booking.payment_status == PaymentStatus::Refunded
        {
            return Err(StateError::PaymentClosed { booking_id }.into());
        }
        let paid = booking
            .amount_paid
            .checked_add(amount)
            .filter(|paid| *paid <= booking.total_amount)
            .ok_or(ValidationError::InvalidPayment("exceeds the outstanding balance"))?;

        booking.amount_paid = paid;
        booking.payment_status = if paid == booking.total_amount {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        };
        self.store.put_booking(booking.clone()).await?;
        info!(%booking_id, amount, paid, "payment recorded");
        Ok(booking)
    }

    /// Return everything paid on a cancelled or no-show booking.
    pub async fn refund(&self, booking_id: Ulid) -> Result<RoomBooking, EngineError> {
        let room_id = self.load_booking(booking_id).await?.room_id;
        let _room = self.hold_room(room_id).await;
        let mut booking = self.load_booking(booking_id).await?;

        if !matches!(
            booking.booking_status,
            BookingStatus::Cancelled | BookingStatus::NoShow
        ) {
            return Err(StateError::PaymentClosed { booking_id }.into());
        }
        if booking.amount_paid == 0 || booking.payment_status == PaymentStatus::Refunded {
            return Err(StateError::NothingToRefund { booking_id }.into());
        }

        let refunded = booking.amount_paid;
        booking.amount_paid = 0;
        booking.payment_status = PaymentStatus::Refunded;
        self.store.put_booking(booking.clone()).await?;
        info!(%booking_id, refunded, "payment refunded");
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_crockford_and_fixed_length() {
        for _ in 0..100 {
            let code = draw_code();
            assert_eq!(code.len(), BOOKING_CODE_LEN);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_digit() || (c.is_ascii_uppercase() && !"ILOU".contains(c))));
        }
    }
}
