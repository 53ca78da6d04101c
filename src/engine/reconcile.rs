use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::model::{BookingStatus, Change, Occupancy, RoomStatus, StayDates};
use crate::observability;

use super::ledger::RoomLedger;
use super::{Engine, EngineError};

/// Occupied if a checked-in stay covers `today`, else reserved if a confirmed
/// one does, else available. Terminal bookings are ignored.
pub fn derive_occupancy<I>(stays: I, today: NaiveDate) -> Occupancy
where
    I: IntoIterator<Item = (BookingStatus, StayDates)>,
{
    let mut occupancy = Occupancy::Available;
    for (status, dates) in stays {
        if !dates.covers(today) {
            continue;
        }
        match status {
            BookingStatus::CheckedIn => return Occupancy::Occupied,
            BookingStatus::Confirmed => occupancy = Occupancy::Reserved,
            _ => {}
        }
    }
    occupancy
}

/// Outcome of a bulk reconciliation.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Status of every room that reconciled.
    pub statuses: Vec<(Ulid, RoomStatus)>,
    /// Rooms whose status was rewritten.
    pub changed: usize,
    pub failures: Vec<(Ulid, EngineError)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn status_of(&self, room_id: Ulid) -> Option<RoomStatus> {
        self.statuses
            .iter()
            .find(|(id, _)| *id == room_id)
            .map(|(_, s)| *s)
    }
}

impl Engine {
    /// Write the status derived from `ledger` unless the room is under a
    /// manual override. Returns the room's status afterwards.
    pub(super) async fn apply_derived_status(
        &self,
        ledger: &RoomLedger,
    ) -> Result<RoomStatus, EngineError> {
        self.sync_status(ledger).await.map(|(status, _)| status)
    }

    async fn sync_status(&self, ledger: &RoomLedger) -> Result<(RoomStatus, bool), EngineError> {
        let mut room = self.load_room(ledger.room_id).await?;
        if room.status.is_override() {
            debug!(room_id = %room.id, "status {} is an override, left as is", room.status);
            return Ok((room.status, false));
        }

        let today = self.clock.today();
        let derived = RoomStatus::Derived(derive_occupancy(
            ledger.stays().iter().map(|s| (s.status, s.dates)),
            today,
        ));
        if derived == room.status {
            return Ok((derived, false));
        }

        let from = room.status;
        room.status = derived;
        room.updated_at = self.clock.now();
        self.store.put_room(room).await?;

        metrics::counter!(observability::ROOM_STATUS_CHANGES_TOTAL, "to" => derived.label())
            .increment(1);
        info!(room_id = %ledger.room_id, "room status {from} -> {derived}");
        self.notify.send(Change::RoomStatusChanged {
            room_id: ledger.room_id,
            from,
            to: derived,
        });
        Ok((derived, true))
    }

    /// Recompute one room's status from the store's current bookings.
    pub async fn reconcile(&self, room_id: Ulid) -> Result<RoomStatus, EngineError> {
        self.reconcile_room(room_id).await.map(|(status, _)| status)
    }

    async fn reconcile_room(&self, room_id: Ulid) -> Result<(RoomStatus, bool), EngineError> {
        self.load_room(room_id).await?;
        let ledger = self.lock_room(room_id).await?;
        self.sync_status(&ledger).await
    }

    /// Reconcile every room. A failing room is recorded and skipped.
    pub async fn reconcile_all(&self) -> Result<ReconcileReport, EngineError> {
        let start = std::time::Instant::now();
        let rooms = self.store.rooms().await?;
        let outcomes = join_all(rooms.iter().map(|room| async move {
            (room.id, self.reconcile_room(room.id).await)
        }))
        .await;

        let mut report = ReconcileReport::default();
        for (room_id, outcome) in outcomes {
            match outcome {
                Ok((status, changed)) => {
                    report.statuses.push((room_id, status));
                    report.changed += usize::from(changed);
                }
                Err(e) => {
                    metrics::counter!(observability::RECONCILE_FAILURES_TOTAL).increment(1);
                    warn!(%room_id, "reconcile failed: {e}");
                    report.failures.push((room_id, e));
                }
            }
        }

        metrics::histogram!(observability::RECONCILE_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());
        debug!(
            rooms = rooms.len(),
            changed = report.changed,
            failures = report.failures.len(),
            "reconcile pass done"
        );
        Ok(report)
    }
}
