use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use ulid::Ulid;

use roomkeep::clock::SystemClock;
use roomkeep::engine::{Engine, EngineError};
use roomkeep::model::*;
use roomkeep::notify::NotifyHub;
use roomkeep::store::{DurableStore, InMemoryStore, RecordStore};

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().map_or(0.0, |d| d.as_secs_f64() * 1000.0),
    );
}

async fn engine_over(store: Arc<dyn RecordStore>) -> Arc<Engine> {
    let engine = Engine::new(store, Arc::new(SystemClock::utc()), Arc::new(NotifyHub::new()))
        .await
        .expect("engine");
    Arc::new(engine)
}

async fn add_rooms(engine: &Engine, n: usize) -> Vec<Room> {
    let mut rooms = Vec::with_capacity(n);
    for i in 0..n {
        let room = engine
            .add_room(NewRoom {
                room_number: format!("{}", 100 + i),
                name: format!("Bench {i}"),
                room_type: RoomType::Standard,
                floor: (i / 10) as i32,
                capacity: 2,
                price_per_night: 500_000,
                amenities: vec![],
            })
            .await
            .expect("add room");
        rooms.push(room);
    }
    println!("  created {} rooms", rooms.len());
    rooms
}

fn night(base: NaiveDate, offset: u64) -> String {
    (base + Days::new(offset)).to_string()
}

fn request(room_id: Ulid, check_in: String, check_out: String) -> BookingRequest {
    BookingRequest {
        room_id,
        guest_name: "Bench Guest".into(),
        guest_email: "bench@example.com".into(),
        guest_phone: None,
        check_in,
        check_out,
        number_of_guests: 1,
        special_requests: None,
        created_by: "bench".into(),
    }
}

async fn phase1_sequential(engine: &Engine, room: &Room, base: NaiveDate) {
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for i in 0..n as u64 {
        let t = Instant::now();
        engine
            .create_booking(request(room.id, night(base, i), night(base, i + 1)))
            .await
            .expect("sequential booking");
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("create latency", &mut latencies);
}

async fn phase2_concurrent(engine: Arc<Engine>, rooms: &[Room], base: NaiveDate) {
    let n_per_room = 200;
    let start = Instant::now();
    let mut handles = Vec::new();
    for room in rooms {
        let engine = engine.clone();
        let room_id = room.id;
        handles.push(tokio::spawn(async move {
            for j in 0..n_per_room {
                engine
                    .create_booking(request(room_id, night(base, j), night(base, j + 1)))
                    .await
                    .expect("concurrent booking");
            }
        }));
    }
    for h in handles {
        h.await.expect("task");
    }
    let elapsed = start.elapsed();
    let total = rooms.len() as u64 * n_per_room;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {} rooms x {n_per_room} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        rooms.len(),
        elapsed.as_secs_f64()
    );
}

async fn phase3_contention(engine: Arc<Engine>, room: &Room, base: NaiveDate) {
    let n_tasks = 64;
    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..n_tasks {
        let engine = engine.clone();
        let room_id = room.id;
        handles.push(tokio::spawn(async move {
            engine
                .create_booking(request(room_id, night(base, 5000), night(base, 5003)))
                .await
        }));
    }
    let (mut ok, mut conflicts) = (0, 0);
    for h in handles {
        match h.await.expect("task") {
            Ok(_) => ok += 1,
            Err(EngineError::Conflict(_)) => conflicts += 1,
            Err(e) => println!("  unexpected error: {e}"),
        }
    }
    println!(
        "  {n_tasks} racing creates: {ok} won, {conflicts} conflicts in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
}

async fn phase4_reconcile(engine: &Engine) {
    let mut latencies = Vec::with_capacity(20);
    for _ in 0..20 {
        let t = Instant::now();
        let report = engine.reconcile_all().await.expect("reconcile");
        latencies.push(t.elapsed());
        assert!(report.is_clean());
    }
    print_latency("reconcile_all latency", &mut latencies);
}

#[tokio::main]
async fn main() {
    let base = NaiveDate::from_ymd_opt(2030, 1, 1).expect("date");

    println!("=== roomkeep stress benchmark ===\n");

    println!("[setup] in-memory store");
    let engine = engine_over(Arc::new(InMemoryStore::new())).await;
    let rooms = add_rooms(&engine, 50).await;

    println!("\n[phase 1] sequential create throughput");
    phase1_sequential(&engine, &rooms[0], base).await;

    println!("\n[phase 2] concurrent create throughput");
    phase2_concurrent(engine.clone(), &rooms[1..], base).await;

    println!("\n[phase 3] contention on one stay");
    phase3_contention(engine.clone(), &rooms[0], base).await;

    println!("\n[phase 4] reconciliation");
    phase4_reconcile(&engine).await;

    let dir = std::env::temp_dir().join(format!("roomkeep_bench_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).expect("bench dir");
    println!("\n[setup] durable store at {}", dir.display());
    let store = Arc::new(DurableStore::open(&dir.join("roomkeep.wal")).expect("open wal"));
    let engine = engine_over(store.clone()).await;
    let rooms = add_rooms(&engine, 20).await;

    println!("\n[phase 5] durable concurrent create throughput");
    phase2_concurrent(engine.clone(), &rooms, base).await;

    println!("\n[phase 6] compaction");
    let t = Instant::now();
    store.compact().await.expect("compact");
    println!("  compacted in {:.2}ms", t.elapsed().as_secs_f64() * 1000.0);

    let _ = std::fs::remove_dir_all(&dir);
    println!("\n=== benchmark complete ===");
}
