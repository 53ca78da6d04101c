use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

/// Process configuration, read from `ROOMKEEP_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// WAL appends after which the sweeper compacts.
    pub compact_threshold: u64,
    pub reconcile_interval: Duration,
    /// Offset of the resort's local day from UTC.
    pub utc_offset: FixedOffset,
    /// JSON array of rooms to add at startup if their numbers are unknown.
    pub seed_rooms: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| get(key).and_then(|s| s.trim().parse::<i64>().ok());

        let offset_minutes = parsed("ROOMKEEP_UTC_OFFSET_MINUTES").unwrap_or(0);
        let utc_offset = i32::try_from(offset_minutes * 60)
            .ok()
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "ignoring out-of-range ROOMKEEP_UTC_OFFSET_MINUTES={offset_minutes}"
                );
                Utc.fix()
            });

        Self {
            data_dir: PathBuf::from(get("ROOMKEEP_DATA_DIR").unwrap_or_else(|| "./data".into())),
            metrics_port: get("ROOMKEEP_METRICS_PORT").and_then(|s| s.parse().ok()),
            compact_threshold: parsed("ROOMKEEP_COMPACT_THRESHOLD")
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or(1000),
            reconcile_interval: Duration::from_secs(
                parsed("ROOMKEEP_RECONCILE_INTERVAL_SECS")
                    .and_then(|n| u64::try_from(n).ok())
                    .filter(|n| *n > 0)
                    .unwrap_or(60),
            ),
            utc_offset,
            seed_rooms: get("ROOMKEEP_SEED_ROOMS").map(PathBuf::from),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("roomkeep.wal")
    }
}
