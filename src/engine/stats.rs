use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::*;
use crate::observability;

use super::{Engine, EngineError};

/// Fleet-wide counters over active rooms and all bookings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStats {
    /// Active rooms; the four status counts sum to this.
    pub total_rooms: usize,
    pub available: usize,
    pub occupied: usize,
    pub reserved: usize,
    pub maintenance: usize,
    /// Percent of active rooms occupied, rounded half up.
    pub occupancy_rate: u32,
    pub today_check_ins: usize,
    pub today_check_outs: usize,
    pub total_bookings: usize,
    /// Paid amounts over every booking that is not cancelled.
    pub total_revenue: Amount,
}

/// Pure reducer over a snapshot of rooms and bookings.
pub fn room_stats(rooms: &[Room], bookings: &[RoomBooking], today: NaiveDate) -> RoomStats {
    let mut stats = RoomStats::default();

    for room in rooms.iter().filter(|r| r.is_active) {
        stats.total_rooms += 1;
        match room.status {
            RoomStatus::Derived(Occupancy::Available) => stats.available += 1,
            RoomStatus::Derived(Occupancy::Reserved) => stats.reserved += 1,
            RoomStatus::Derived(Occupancy::Occupied) => stats.occupied += 1,
            RoomStatus::Override(ManualOverride::Maintenance) => stats.maintenance += 1,
        }
    }

    if stats.total_rooms > 0 {
        let (occupied, total) = (stats.occupied as u64, stats.total_rooms as u64);
        stats.occupancy_rate = ((occupied * 200 + total) / (total * 2)) as u32;
    }

    stats.total_bookings = bookings.len();
    for booking in bookings {
        if booking.check_in == today {
            stats.today_check_ins += 1;
        }
        if booking.check_out == today {
            stats.today_check_outs += 1;
        }
        if booking.booking_status != BookingStatus::Cancelled {
            stats.total_revenue = stats.total_revenue.saturating_add(booking.amount_paid);
        }
    }

    stats
}

impl Engine {
    /// Reconcile every room, then aggregate. Rooms that fail to reconcile are
    /// counted with their stored status.
    pub async fn get_room_stats(&self) -> Result<RoomStats, EngineError> {
        let report = self.reconcile_all().await?;
        if !report.is_clean() {
            warn!(
                failures = report.failures.len(),
                "stats computed with rooms that did not reconcile"
            );
        }

        let rooms = self.store.rooms().await?;
        let bookings = self.store.bookings().await?;
        let stats = room_stats(&rooms, &bookings, self.clock.today());

        for (label, count) in [
            ("available", stats.available),
            ("reserved", stats.reserved),
            ("occupied", stats.occupied),
            ("maintenance", stats.maintenance),
        ] {
            metrics::gauge!(observability::ROOMS_BY_STATUS, "status" => label).set(count as f64);
        }
        metrics::gauge!(observability::OCCUPANCY_RATE).set(f64::from(stats.occupancy_rate));
        Ok(stats)
    }
}
