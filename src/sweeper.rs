use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::engine::Engine;
use crate::observability;
use crate::store::DurableStore;

/// What one sweep did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    pub rooms: usize,
    pub changed: usize,
    pub failures: usize,
    pub compacted: bool,
}

/// Reconcile every room, then compact the WAL once enough appends have piled up.
pub async fn sweep(
    engine: &Engine,
    durable: Option<&DurableStore>,
    compact_threshold: u64,
) -> SweepOutcome {
    let mut outcome = SweepOutcome::default();
    match engine.reconcile_all().await {
        Ok(report) => {
            outcome.rooms = report.statuses.len() + report.failures.len();
            outcome.changed = report.changed;
            outcome.failures = report.failures.len();
        }
        Err(e) => error!("reconcile pass failed: {e}"),
    }

    if let Some(store) = durable {
        let appends = store.appends_since_compact().await;
        if compact_threshold > 0 && appends >= compact_threshold {
            match store.compact().await {
                Ok(()) => {
                    metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
                    info!(appends, "WAL compacted");
                    outcome.compacted = true;
                }
                Err(e) => warn!("WAL compaction failed: {e}"),
            }
        }
    }
    outcome
}

/// Background task: sweep every `every` until the task is aborted.
pub async fn run_sweeper(
    engine: Arc<Engine>,
    durable: Option<Arc<DurableStore>>,
    every: Duration,
    compact_threshold: u64,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let outcome = sweep(&engine, durable.as_deref(), compact_threshold).await;
        debug!(?outcome, "sweep done");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::*;
    use crate::notify::NotifyHub;
    use crate::store::RecordStore;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("roomkeep_test_sweeper");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn new_room(number: &str) -> NewRoom {
        NewRoom {
            room_number: number.into(),
            name: format!("Villa {number}"),
            room_type: RoomType::Villa,
            floor: 0,
            capacity: 4,
            price_per_night: 2_500_000,
            amenities: vec!["pool".into()],
        }
    }

    #[tokio::test]
    async fn sweep_reconciles_and_compacts() {
        let path = test_wal_path("sweep_compact.wal");
        let store = Arc::new(DurableStore::open(&path).unwrap());
        let clock = Arc::new(FixedClock::at_date("2024-06-01".parse().unwrap()));
        let engine = Engine::new(store.clone(), clock.clone(), Arc::new(NotifyHub::new()))
            .await
            .unwrap();

        let room = engine.add_room(new_room("V1")).await.unwrap();
        engine
            .create_booking(BookingRequest {
                room_id: room.id,
                guest_name: "Made".into(),
                guest_email: "made@example.com".into(),
                guest_phone: None,
                check_in: "2024-06-02".into(),
                check_out: "2024-06-05".into(),
                number_of_guests: 2,
                special_requests: None,
                created_by: "desk".into(),
            })
            .await
            .unwrap();
        assert!(store.appends_since_compact().await >= 2);

        clock.advance_days(1);
        let outcome = sweep(&engine, Some(&*store), 2).await;
        assert_eq!(outcome.rooms, 1);
        assert_eq!(outcome.changed, 1);
        assert_eq!(outcome.failures, 0);
        assert!(outcome.compacted);
        assert_eq!(store.appends_since_compact().await, 0);
        assert_eq!(
            store.room(room.id).await.unwrap().unwrap().status,
            RoomStatus::RESERVED
        );

        // Below threshold: nothing to compact, nothing to change.
        let outcome = sweep(&engine, Some(&*store), 100).await;
        assert_eq!(outcome.changed, 0);
        assert!(!outcome.compacted);
    }

    #[tokio::test]
    async fn sweep_without_durable_store_only_reconciles() {
        let store = Arc::new(crate::store::InMemoryStore::new());
        let clock = Arc::new(FixedClock::at_date("2024-06-01".parse().unwrap()));
        let engine = Engine::new(store, clock, Arc::new(NotifyHub::new()))
            .await
            .unwrap();
        engine.add_room(new_room("V2")).await.unwrap();
        let outcome = sweep(&engine, None, 1).await;
        assert_eq!(outcome.rooms, 1);
        assert!(!outcome.compacted);
    }
}
