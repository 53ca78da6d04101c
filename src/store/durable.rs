use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use ulid::Ulid;

use crate::model::{Room, RoomBooking, WalRecord};
use crate::observability;
use crate::wal::Wal;

use super::{InMemoryStore, RecordStore, StoreError};

type Ack = oneshot::Sender<io::Result<()>>;

enum WalCommand {
    Append { record: WalRecord, response: Ack },
    Compact { response: Ack },
    AppendsSinceCompact { response: oneshot::Sender<u64> },
}

/// Background task that owns the WAL and the in-memory state behind it.
///
/// Appends are group-committed: take the first, drain whatever else is
/// already queued, write and sync once, apply the batch to memory, then
/// answer every sender. Nothing reaches memory without being on disk, and
/// compaction snapshots memory from this same task, so a snapshot always
/// holds exactly the records written so far.
async fn wal_writer_loop(
    mut wal: Wal,
    mem: Arc<InMemoryStore>,
    mut rx: mpsc::Receiver<WalCommand>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { record, response } => {
                let mut batch = vec![(record, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { record, response }) => {
                            batch.push((record, response))
                        }
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                commit_batch(&mut wal, &mem, batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, &mem, other);
                }
            }
            other => handle_non_append(&mut wal, &mem, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, mem: &InMemoryStore, batch: Vec<(WalRecord, Ack)>) {
    let (records, acks): (Vec<WalRecord>, Vec<Ack>) = batch.into_iter().unzip();
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(records.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = wal.append_batch(&records);
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());

    if result.is_ok() {
        for record in records {
            mem.apply(record);
        }
    }
    for ack in acks {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = ack.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, mem: &InMemoryStore, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { response } => {
            let _ = response.send(wal.rewrite(&mem.snapshot()));
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// In-memory store whose writes are made durable in a WAL before they apply.
pub struct DurableStore {
    mem: Arc<InMemoryStore>,
    wal_tx: mpsc::Sender<WalCommand>,
}

impl DurableStore {
    /// Replay the WAL at `path` (creating it if missing) and start the writer task.
    /// Must be called inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let (wal, records) = Wal::open(path)?;
        let mem = Arc::new(InMemoryStore::new());
        let replayed = records.len();
        for record in records {
            mem.apply(record);
        }
        tracing::info!(
            path = %path.display(),
            replayed,
            rooms = mem.room_count(),
            bookings = mem.booking_count(),
            "store opened"
        );

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, mem.clone(), wal_rx));
        Ok(Self { mem, wal_tx })
    }

    async fn request(&self, cmd: WalCommand) -> Result<(), StoreError> {
        self.wal_tx
            .send(cmd)
            .await
            .map_err(|_| StoreError("WAL writer shut down".into()))
    }

    /// Returns once the record is on disk and visible to reads.
    async fn persist(&self, record: WalRecord) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.request(WalCommand::Append { record, response: tx }).await?;
        rx.await
            .map_err(|_| StoreError("WAL writer dropped response".into()))??;
        Ok(())
    }

    /// Rewrite the WAL as one `Put` per live room and booking.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.request(WalCommand::Compact { response: tx }).await?;
        rx.await
            .map_err(|_| StoreError("WAL writer dropped response".into()))??;
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl RecordStore for DurableStore {
    async fn rooms(&self) -> Result<Vec<Room>, StoreError> {
        self.mem.rooms().await
    }

    async fn room(&self, id: Ulid) -> Result<Option<Room>, StoreError> {
        self.mem.room(id).await
    }

    async fn put_room(&self, room: Room) -> Result<(), StoreError> {
        self.persist(WalRecord::RoomPut(room)).await
    }

    async fn delete_room(&self, id: Ulid) -> Result<bool, StoreError> {
        if self.mem.room(id).await?.is_none() {
            return Ok(false);
        }
        self.persist(WalRecord::RoomDeleted { id }).await?;
        Ok(true)
    }

    async fn bookings(&self) -> Result<Vec<RoomBooking>, StoreError> {
        self.mem.bookings().await
    }

    async fn booking(&self, id: Ulid) -> Result<Option<RoomBooking>, StoreError> {
        self.mem.booking(id).await
    }

    async fn put_booking(&self, booking: RoomBooking) -> Result<(), StoreError> {
        self.persist(WalRecord::BookingPut(booking)).await
    }

    async fn delete_booking(&self, id: Ulid) -> Result<bool, StoreError> {
        if self.mem.booking(id).await?.is_none() {
            return Ok(false);
        }
        self.persist(WalRecord::BookingDeleted { id }).await?;
        Ok(true)
    }

    async fn bookings_for_room(&self, room_id: Ulid) -> Result<Vec<RoomBooking>, StoreError> {
        self.mem.bookings_for_room(room_id).await
    }
}
