use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::model::WalRecord;

const FRAME_OVERHEAD: usize = 8;

/// Append `[len][bincode][crc32]` for `record` to `buf`.
fn encode_into(buf: &mut Vec<u8>, record: &WalRecord) -> io::Result<()> {
    let payload =
        bincode::serialize(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "record too large"))?;
    buf.reserve(payload.len() + FRAME_OVERHEAD);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&payload);
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(())
}

/// Decode the intact prefix of `bytes`, returning its records and its length.
/// Decoding stops at the first short, corrupt or undecodable frame.
fn decode_prefix(bytes: &[u8]) -> (Vec<WalRecord>, usize) {
    let mut records = Vec::new();
    let mut pos = 0;
    while let Some(header) = bytes.get(pos..pos + 4) {
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let body = pos + 4;
        let Some(payload) = bytes.get(body..body + len) else { break };
        let Some(crc) = bytes.get(body + len..body + len + 4) else { break };
        if u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]) != crc32fast::hash(payload) {
            break;
        }
        let Ok(record) = bincode::deserialize::<WalRecord>(payload) else { break };
        records.push(record);
        pos = body + len + 4;
    }
    (records, pos)
}

fn read_bytes(path: &Path) -> io::Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Record log behind the durable store.
///
/// Entries are `[u32 len][bincode WalRecord][u32 crc32]`, little endian.
/// The file only ever holds an intact prefix: opening cuts off a torn tail,
/// and a failed append is truncated away before the error is returned.
pub struct Wal {
    file: File,
    path: PathBuf,
    len: u64,
    scratch: Vec<u8>,
    appends_since_compact: u64,
}

impl Wal {
    /// Open (or create) the log at `path` and return it with its records.
    pub fn open(path: &Path) -> io::Result<(Self, Vec<WalRecord>)> {
        let bytes = read_bytes(path)?;
        let (records, intact) = decode_prefix(&bytes);
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if intact < bytes.len() {
            tracing::warn!(
                path = %path.display(),
                kept = intact,
                dropped = bytes.len() - intact,
                "WAL tail is torn or corrupt, truncating"
            );
            file.set_len(intact as u64)?;
            file.sync_all()?;
        }
        let wal = Self {
            file,
            path: path.to_path_buf(),
            len: intact as u64,
            scratch: Vec::new(),
            appends_since_compact: 0,
        };
        Ok((wal, records))
    }

    /// Write `records` with one write and one sync. All or none of them land.
    pub fn append_batch(&mut self, records: &[WalRecord]) -> io::Result<()> {
        self.scratch.clear();
        for record in records {
            encode_into(&mut self.scratch, record)?;
        }
        let written = self.file.write_all(&self.scratch).and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            if let Err(cut) = self.file.set_len(self.len) {
                tracing::error!(
                    path = %self.path.display(),
                    "WAL truncate after failed append: {cut}"
                );
            }
            return Err(e);
        }
        self.len += self.scratch.len() as u64;
        self.appends_since_compact += records.len() as u64;
        Ok(())
    }

    /// Replace the whole log with `records`: write a synced temp file, then
    /// rename it over the log.
    pub fn rewrite(&mut self, records: &[WalRecord]) -> io::Result<()> {
        let mut bytes = Vec::new();
        for record in records {
            encode_into(&mut bytes, record)?;
        }
        let tmp_path = self.path.with_extension("wal.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&bytes)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.len = bytes.len() as u64;
        self.appends_since_compact = 0;
        Ok(())
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Intact records of the log at `path`, without opening it for writes.
    pub fn read_all(path: &Path) -> io::Result<Vec<WalRecord>> {
        Ok(decode_prefix(&read_bytes(path)?).0)
    }
}
