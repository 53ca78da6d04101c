use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Whole currency amount in minor units.
pub type Amount = u64;

/// Half-open stay `[check_in, check_out)` over calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StayDates {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayDates {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "check-in must be before check-out");
        Self { check_in, check_out }
    }

    /// `None` unless `check_in < check_out`.
    pub fn try_new(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_in < check_out).then_some(Self { check_in, check_out })
    }

    pub fn nights(&self) -> u32 {
        (self.check_out - self.check_in).num_days() as u32
    }

    pub fn overlaps(&self, other: &StayDates) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// True if the guest is in the room on the night starting `day`.
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.check_in <= day && day < self.check_out
    }
}

impl fmt::Display for StayDates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomType {
    Standard,
    Superior,
    Deluxe,
    Suite,
    Villa,
}

/// Status computed from the booking set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Occupancy {
    Available,
    Reserved,
    Occupied,
}

/// Operator-set status that reconciliation never overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManualOverride {
    Maintenance,
}

/// Serialized flat, as its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomStatus {
    Derived(Occupancy),
    Override(ManualOverride),
}

impl RoomStatus {
    pub const AVAILABLE: RoomStatus = RoomStatus::Derived(Occupancy::Available);
    pub const RESERVED: RoomStatus = RoomStatus::Derived(Occupancy::Reserved);
    pub const OCCUPIED: RoomStatus = RoomStatus::Derived(Occupancy::Occupied);
    pub const MAINTENANCE: RoomStatus = RoomStatus::Override(ManualOverride::Maintenance);

    pub fn is_override(&self) -> bool {
        matches!(self, RoomStatus::Override(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoomStatus::Derived(Occupancy::Available) => "available",
            RoomStatus::Derived(Occupancy::Reserved) => "reserved",
            RoomStatus::Derived(Occupancy::Occupied) => "occupied",
            RoomStatus::Override(ManualOverride::Maintenance) => "maintenance",
        }
    }

    pub const ALL: [RoomStatus; 4] = [
        RoomStatus::AVAILABLE,
        RoomStatus::RESERVED,
        RoomStatus::OCCUPIED,
        RoomStatus::MAINTENANCE,
    ];

    pub fn from_label(label: &str) -> Option<RoomStatus> {
        RoomStatus::ALL.into_iter().find(|s| s.label() == label)
    }
}

impl Serialize for RoomStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for RoomStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        const LABELS: &[&str] = &["available", "reserved", "occupied", "maintenance"];
        let label = String::deserialize(deserializer)?;
        RoomStatus::from_label(&label)
            .ok_or_else(|| serde::de::Error::unknown_variant(&label, LABELS))
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub room_number: String,
    pub name: String,
    pub room_type: RoomType,
    pub floor: i32,
    pub capacity: u32,
    pub price_per_night: Amount,
    pub amenities: Vec<String>,
    pub is_active: bool,
    pub status: RoomStatus,
    pub updated_at: DateTime<Utc>,
}

/// Operator input for a new room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    pub room_number: String,
    pub name: String,
    pub room_type: RoomType,
    pub floor: i32,
    pub capacity: u32,
    pub price_per_night: Amount,
    #[serde(default)]
    pub amenities: Vec<String>,
}

/// Partial room update; `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomChanges {
    pub name: Option<String>,
    pub room_type: Option<RoomType>,
    pub floor: Option<i32>,
    pub capacity: Option<u32>,
    pub price_per_night: Option<Amount>,
    pub amenities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Active bookings hold the room and take part in the overlap check.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::CheckedIn)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CheckedIn => "checked-in",
            BookingStatus::CheckedOut => "checked-out",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no-show",
        }
    }

    /// Target status of `transition`, or `None` if it is illegal from here.
    pub fn next(self, transition: Transition) -> Option<BookingStatus> {
        use BookingStatus::*;
        match (self, transition) {
            (Confirmed, Transition::CheckIn) => Some(CheckedIn),
            (Confirmed, Transition::Cancel) => Some(Cancelled),
            (Confirmed, Transition::MarkNoShow) => Some(NoShow),
            (CheckedIn, Transition::CheckOut) => Some(CheckedOut),
            _ => None,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transition {
    CheckIn,
    CheckOut,
    Cancel,
    MarkNoShow,
}

impl Transition {
    pub fn label(&self) -> &'static str {
        match self {
            Transition::CheckIn => "check_in",
            Transition::CheckOut => "check_out",
            Transition::Cancel => "cancel",
            Transition::MarkNoShow => "mark_no_show",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_by: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomBooking {
    pub id: Ulid,
    pub booking_code: String,
    pub room_id: Ulid,
    // Snapshot of the room at booking time.
    pub room_number: String,
    pub room_name: String,
    pub price_per_night: Amount,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub number_of_guests: u32,
    pub special_requests: Option<String>,
    pub total_amount: Amount,
    pub amount_paid: Amount,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub cancellation: Option<Cancellation>,
}

impl RoomBooking {
    pub fn dates(&self) -> StayDates {
        StayDates {
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }

    pub fn nights(&self) -> u32 {
        self.dates().nights()
    }

    pub fn is_active(&self) -> bool {
        self.booking_status.is_active()
    }
}

/// Caller input for a reservation. Dates arrive as `YYYY-MM-DD` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub room_id: Ulid,
    pub guest_name: String,
    pub guest_email: String,
    #[serde(default)]
    pub guest_phone: Option<String>,
    pub check_in: String,
    pub check_out: String,
    pub number_of_guests: u32,
    #[serde(default)]
    pub special_requests: Option<String>,
    pub created_by: String,
}

/// WAL record format. Whole records are written, so replay is last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalRecord {
    RoomPut(Room),
    RoomDeleted { id: Ulid },
    BookingPut(RoomBooking),
    BookingDeleted { id: Ulid },
}

/// A state change published on the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    RoomStatusChanged {
        room_id: Ulid,
        from: RoomStatus,
        to: RoomStatus,
    },
    BookingStatusChanged {
        booking_id: Ulid,
        room_id: Ulid,
        from: Option<BookingStatus>,
        to: BookingStatus,
    },
}

impl Change {
    pub fn room_id(&self) -> Ulid {
        match self {
            Change::RoomStatusChanged { room_id, .. }
            | Change::BookingStatusChanged { room_id, .. } => *room_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn stay_basics() {
        let s = StayDates::new(d("2024-06-01"), d("2024-06-04"));
        assert_eq!(s.nights(), 3);
        assert!(s.covers(d("2024-06-01")));
        assert!(s.covers(d("2024-06-03")));
        assert!(!s.covers(d("2024-06-04"))); // half-open
        assert!(!s.covers(d("2024-05-31")));
    }

    #[test]
    fn stay_overlap() {
        let a = StayDates::new(d("2024-06-01"), d("2024-06-04"));
        let b = StayDates::new(d("2024-06-03"), d("2024-06-05"));
        let c = StayDates::new(d("2024-06-04"), d("2024-06-06"));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // back-to-back
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn stay_try_new_rejects_empty_and_reversed() {
        assert!(StayDates::try_new(d("2024-06-01"), d("2024-06-01")).is_none());
        assert!(StayDates::try_new(d("2024-06-02"), d("2024-06-01")).is_none());
        assert!(StayDates::try_new(d("2024-06-01"), d("2024-06-02")).is_some());
    }

    #[test]
    fn nights_across_month_and_leap_day() {
        let s = StayDates::new(d("2024-02-27"), d("2024-03-02"));
        assert_eq!(s.nights(), 4);
    }

    #[test]
    fn transitions_follow_state_machine() {
        use BookingStatus::*;
        assert_eq!(Confirmed.next(Transition::CheckIn), Some(CheckedIn));
        assert_eq!(Confirmed.next(Transition::Cancel), Some(Cancelled));
        assert_eq!(Confirmed.next(Transition::MarkNoShow), Some(NoShow));
        assert_eq!(Confirmed.next(Transition::CheckOut), None);
        assert_eq!(CheckedIn.next(Transition::CheckOut), Some(CheckedOut));
        assert_eq!(CheckedIn.next(Transition::Cancel), None);
        assert_eq!(CheckedIn.next(Transition::MarkNoShow), None);
        for terminal in [CheckedOut, Cancelled, NoShow] {
            assert!(terminal.is_terminal());
            for t in [
                Transition::CheckIn,
                Transition::CheckOut,
                Transition::Cancel,
                Transition::MarkNoShow,
            ] {
                assert_eq!(terminal.next(t), None);
            }
        }
    }

    #[test]
    fn room_status_labels() {
        assert_eq!(RoomStatus::AVAILABLE.to_string(), "available");
        assert_eq!(RoomStatus::RESERVED.to_string(), "reserved");
        assert_eq!(RoomStatus::OCCUPIED.to_string(), "occupied");
        assert_eq!(RoomStatus::MAINTENANCE.to_string(), "maintenance");
        assert!(RoomStatus::MAINTENANCE.is_override());
        assert!(!RoomStatus::OCCUPIED.is_override());
        for status in RoomStatus::ALL {
            assert_eq!(RoomStatus::from_label(status.label()), Some(status));
        }
        assert_eq!(RoomStatus::from_label("derived"), None);
    }

    #[test]
    fn room_status_is_flat_on_the_wire() {
        assert_eq!(serde_json::to_string(&RoomStatus::RESERVED).unwrap(), "\"reserved\"");
        assert_eq!(serde_json::to_string(&RoomStatus::MAINTENANCE).unwrap(), "\"maintenance\"");
        let parsed: RoomStatus = serde_json::from_str("\"occupied\"").unwrap();
        assert_eq!(parsed, RoomStatus::OCCUPIED);
        assert!(serde_json::from_str::<RoomStatus>(r#"{"derived":"available"}"#).is_err());
        assert!(serde_json::from_str::<RoomStatus>("\"closed\"").is_err());
    }

    #[test]
    fn wire_forms_are_kebab_case_and_iso_dates() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::CheckedIn).unwrap(),
            "\"checked-in\""
        );
        assert_eq!(
            serde_json::to_string(&BookingStatus::NoShow).unwrap(),
            "\"no-show\""
        );
        let stay = StayDates::new(d("2024-06-01"), d("2024-06-04"));
        assert_eq!(
            serde_json::to_string(&stay).unwrap(),
            r#"{"check_in":"2024-06-01","check_out":"2024-06-04"}"#
        );
    }

    #[test]
    fn wal_record_bincode_roundtrip() {
        let room = Room {
            id: Ulid::new(),
            room_number: "101".into(),
            name: "Garden View".into(),
            room_type: RoomType::Deluxe,
            floor: 1,
            capacity: 2,
            price_per_night: 100_000,
            amenities: vec!["wifi".into(), "balcony".into()],
            is_active: true,
            status: RoomStatus::MAINTENANCE,
            updated_at: Utc::now(),
        };
        let record = WalRecord::RoomPut(room);
        let bytes = bincode::serialize(&record).unwrap();
        let decoded: WalRecord = bincode::deserialize(&bytes).unwrap();
        assert_eq!(record, decoded);
    }
}
