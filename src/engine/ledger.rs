use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{BookingStatus, RoomBooking, StayDates};

use super::EngineError;

/// An active (confirmed or checked-in) booking as the ledger sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveStay {
    pub booking_id: Ulid,
    pub dates: StayDates,
    pub status: BookingStatus,
}

impl From<&RoomBooking> for ActiveStay {
    fn from(b: &RoomBooking) -> Self {
        Self {
            booking_id: b.id,
            dates: b.dates(),
            status: b.booking_status,
        }
    }
}

/// Per-room index of active stays, sorted by check-in and pairwise disjoint.
/// Disjointness makes check-out dates sorted too, so both ends of an overlap
/// window are found by binary search.
#[derive(Debug, Clone)]
pub struct RoomLedger {
    pub room_id: Ulid,
    loaded: bool,
    stays: Vec<ActiveStay>,
}

impl RoomLedger {
    /// Placeholder until the first load from the store.
    pub fn unloaded(room_id: Ulid) -> Self {
        Self {
            room_id,
            loaded: false,
            stays: Vec::new(),
        }
    }

    /// Build from a room's full booking history. Fails if two active
    /// bookings overlap.
    pub fn rebuild(room_id: Ulid, bookings: &[RoomBooking]) -> Result<Self, EngineError> {
        let mut stays: Vec<ActiveStay> = bookings
            .iter()
            .filter(|b| b.room_id == room_id && b.is_active() && b.check_in < b.check_out)
            .map(ActiveStay::from)
            .collect();
        stays.sort_by_key(|s| (s.dates.check_in, s.booking_id));

        // Sorted by start, so disjoint neighbours mean all pairs are disjoint.
        for pair in stays.windows(2) {
            if pair[0].dates.overlaps(&pair[1].dates) {
                return Err(EngineError::Inconsistent {
                    room_id,
                    first: pair[0].booking_id,
                    second: pair[1].booking_id,
                });
            }
        }

        Ok(Self {
            room_id,
            loaded: true,
            stays,
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn invalidate(&mut self) {
        self.loaded = false;
        self.stays.clear();
    }

    pub fn stays(&self) -> &[ActiveStay] {
        &self.stays
    }

    /// Caller must have checked that `stay` overlaps nothing.
    pub fn insert(&mut self, stay: ActiveStay) {
        debug_assert!(self.overlapping(&stay.dates).next().is_none());
        let pos = self
            .stays
            .partition_point(|s| s.dates.check_in < stay.dates.check_in);
        self.stays.insert(pos, stay);
    }

    pub fn remove(&mut self, booking_id: Ulid) -> Option<ActiveStay> {
        let pos = self.stays.iter().position(|s| s.booking_id == booking_id)?;
        Some(self.stays.remove(pos))
    }

    pub fn set_status(&mut self, booking_id: Ulid, status: BookingStatus) -> bool {
        match self.stays.iter_mut().find(|s| s.booking_id == booking_id) {
            Some(stay) => {
                stay.status = status;
                true
            }
            None => false,
        }
    }

    /// Stays whose dates overlap `query` under the half-open rule.
    pub fn overlapping(&self, query: &StayDates) -> impl Iterator<Item = &ActiveStay> {
        let lo = self
            .stays
            .partition_point(|s| s.dates.check_out <= query.check_in);
        let hi = self
            .stays
            .partition_point(|s| s.dates.check_in < query.check_out);
        self.stays[lo..hi.max(lo)].iter()
    }

    /// The stay occupying the night of `day`, if any.
    pub fn covering(&self, day: NaiveDate) -> Option<&ActiveStay> {
        let idx = self.stays.partition_point(|s| s.dates.check_out <= day);
        self.stays.get(idx).filter(|s| s.dates.covers(day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn stay(check_in: &str, check_out: &str) -> ActiveStay {
        ActiveStay {
            booking_id: Ulid::new(),
            dates: StayDates::new(d(check_in), d(check_out)),
            status: BookingStatus::Confirmed,
        }
    }

    fn ledger(stays: &[ActiveStay]) -> RoomLedger {
        let mut l = RoomLedger::unloaded(Ulid::new());
        for s in stays {
            l.insert(*s);
        }
        l
    }

    #[test]
    fn insert_keeps_check_in_order() {
        let c = stay("2024-06-10", "2024-06-12");
        let a = stay("2024-06-01", "2024-06-03");
        let b = stay("2024-06-03", "2024-06-05");
        let l = ledger(&[c, a, b]);
        let order: Vec<Ulid> = l.stays().iter().map(|s| s.booking_id).collect();
        assert_eq!(order, vec![a.booking_id, b.booking_id, c.booking_id]);
    }

    #[test]
    fn overlapping_finds_only_intersecting_stays() {
        let a = stay("2024-06-01", "2024-06-04");
        let b = stay("2024-06-06", "2024-06-08");
        let c = stay("2024-06-20", "2024-06-22");
        let l = ledger(&[a, b, c]);

        let q = StayDates::new(d("2024-06-03"), d("2024-06-07"));
        let hits: Vec<Ulid> = l.overlapping(&q).map(|s| s.booking_id).collect();
        assert_eq!(hits, vec![a.booking_id, b.booking_id]);

        // Back-to-back on both sides.
        let gap = StayDates::new(d("2024-06-04"), d("2024-06-06"));
        assert_eq!(l.overlapping(&gap).count(), 0);

        let before = StayDates::new(d("2024-05-01"), d("2024-05-05"));
        let after = StayDates::new(d("2024-07-01"), d("2024-07-05"));
        assert_eq!(l.overlapping(&before).count(), 0);
        assert_eq!(l.overlapping(&after).count(), 0);

        let everything = StayDates::new(d("2024-01-01"), d("2024-12-31"));
        assert_eq!(l.overlapping(&everything).count(), 3);
    }

    #[test]
    fn covering_respects_half_open_days() {
        let a = stay("2024-06-01", "2024-06-04");
        let b = stay("2024-06-04", "2024-06-05");
        let l = ledger(&[a, b]);
        assert_eq!(l.covering(d("2024-06-01")).unwrap().booking_id, a.booking_id);
        assert_eq!(l.covering(d("2024-06-03")).unwrap().booking_id, a.booking_id);
        assert_eq!(l.covering(d("2024-06-04")).unwrap().booking_id, b.booking_id);
        assert!(l.covering(d("2024-06-05")).is_none());
        assert!(l.covering(d("2024-05-31")).is_none());
    }

    #[test]
    fn remove_and_set_status() {
        let a = stay("2024-06-01", "2024-06-04");
        let mut l = ledger(&[a]);
        assert!(l.set_status(a.booking_id, BookingStatus::CheckedIn));
        assert_eq!(l.stays()[0].status, BookingStatus::CheckedIn);
        assert!(!l.set_status(Ulid::new(), BookingStatus::CheckedIn));
        assert_eq!(l.remove(a.booking_id).map(|s| s.booking_id), Some(a.booking_id));
        assert!(l.remove(a.booking_id).is_none());
        assert!(l.stays().is_empty());
    }

    #[test]
    fn invalidate_clears_and_unloads() {
        let mut l = RoomLedger::rebuild(Ulid::new(), &[]).unwrap();
        assert!(l.is_loaded());
        l.invalidate();
        assert!(!l.is_loaded());
        assert!(l.stays().is_empty());
    }
}
