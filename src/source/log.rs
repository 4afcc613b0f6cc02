//! Append-only, checksummed row log.
//!
//! Every insert and delete is appended to `rows.log` as a frame:
//!
//! ```text
//! magic(4) | version(1) | kind(1) | row id(8) | payload len(4) | payload | crc32(4)
//! ```
//!
//! The checksum covers every byte before it, header included. Row payloads
//! are MessagePack. Deletes are tombstone frames with an empty payload. The log is replayed into memory on open, so scans never touch the
//! disk.

use super::{DataSource, ScanRequest, WriteSource};
use crate::error::{FeedError, Result};
use crate::filter::{Filter, Row};
use crate::types::RowId;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Magic bytes for a log frame.
const FRAME_MAGIC: &[u8; 4] = b"ROW\0";

/// Current log format version. Version 1 checksummed only the payload.
const LOG_VERSION: u8 = 2;

/// Frame header size: magic + version + kind + id + payload length.
const FRAME_HEADER_SIZE: usize = 4 + 1 + 1 + 8 + 4;

/// Frame trailer size (checksum).
const FRAME_TRAILER_SIZE: usize = 4;

const LOG_FILE: &str = "rows.log";
const LOCK_FILE: &str = "LOCK";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameKind {
    Row = 0,
    Tombstone = 1,
}

impl FrameKind {
    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(FrameKind::Row),
            1 => Ok(FrameKind::Tombstone),
            other => Err(FeedError::InvalidFormat(format!(
                "Unknown frame kind: {}",
                other
            ))),
        }
    }
}

/// Writer half, serialized behind a mutex.
struct LogWriter {
    file: File,
    /// Length of the log up to the last complete frame.
    size: u64,
    /// `None` once `u64::MAX` has been handed out.
    next_id: Option<u64>,
    writes_since_sync: u64,
}

impl LogWriter {
    /// Cut the file back to the last complete frame.
    fn rewind(&mut self) -> Result<()> {
        self.file.set_len(self.size)?;
        self.file.seek(SeekFrom::Start(self.size))?;
        Ok(())
    }
}

/// Durable table backed by an append-only log.
pub struct LogTable<R> {
    /// Directory holding the log and lock file.
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    writer: Mutex<LogWriter>,

    /// Live rows, rebuilt from the log on open.
    rows: RwLock<BTreeMap<RowId, R>>,

    closed: AtomicBool,

    /// Sync every N writes (0 and 1 both mean every write).
    sync_interval: u64,
}

impl<R> LogTable<R>
where
    R: Row + Serialize + DeserializeOwned,
{
    /// Default sync interval.
    pub const DEFAULT_SYNC_INTERVAL: u64 = 100;

    /// Open or create a table in `path` with the default sync interval.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, Self::DEFAULT_SYNC_INTERVAL)
    }

    /// Open or create a table in `path`, syncing every `sync_interval` writes.
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let lock_file = Self::acquire_lock(&path)?;

        let log_path = path.join(LOG_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&log_path)?;

        let bytes = fs::read(&log_path)?;
        let replay = replay(&bytes)?;

        if replay.valid_len < bytes.len() as u64 {
            tracing::warn!(
                path = %log_path.display(),
                valid_len = replay.valid_len,
                file_len = bytes.len(),
                "truncating torn frame at end of row log"
            );
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(replay.valid_len))?;

        let rows: BTreeMap<RowId, R> = replay
            .rows
            .into_iter()
            .map(|(id, payload)| -> Result<(RowId, R)> {
                let row: R = rmp_serde::from_slice(&payload)?;
                if row.id() != id {
                    return Err(FeedError::InvalidFormat(format!(
                        "frame for row {} holds row {}",
                        id,
                        row.id()
                    )));
                }
                Ok((id, row))
            })
            .collect::<Result<_>>()?;

        let next_id = replay.max_id.checked_add(1);
        tracing::info!(
            path = %path.display(),
            rows = rows.len(),
            next_id = ?next_id,
            "opened row log"
        );

        Ok(Self {
            path,
            _lock_file: lock_file,
            writer: Mutex::new(LogWriter {
                file,
                size: replay.valid_len,
                next_id,
                writes_since_sync: 0,
            }),
            rows: RwLock::new(rows),
            closed: AtomicBool::new(false),
            sync_interval: sync_interval.max(1),
        })
    }

    /// Directory of this table.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Size of the log file in bytes.
    pub fn log_size(&self) -> u64 {
        self.writer.lock().size
    }

    /// Force sync all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.file.sync_all()?;
        writer.writes_since_sync = 0;
        Ok(())
    }

    /// Sync and stop serving. Later reads and writes fail with
    /// `SourceUnavailable`.
    pub fn close(&self) -> Result<()> {
        self.sync()?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FeedError::SourceUnavailable(format!(
                "row log {} is closed",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn append_frame(&self, writer: &mut LogWriter, kind: FrameKind, id: RowId, payload: &[u8]) -> Result<()> {
        let frame = encode_frame(kind, id, payload);
        if let Err(err) = writer.file.write_all(&frame) {
            // A short write leaves part of the frame on disk.
            if let Err(rewind_err) = writer.rewind() {
                tracing::error!(
                    path = %self.path.display(),
                    error = %rewind_err,
                    "could not drop partial frame; closing row log"
                );
                self.closed.store(true, Ordering::SeqCst);
            }
            return Err(err.into());
        }
        writer.size += frame.len() as u64;

        writer.writes_since_sync += 1;
        if writer.writes_since_sync >= self.sync_interval {
            writer.file.sync_data()?;
            writer.writes_since_sync = 0;
        }
        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join(LOCK_FILE))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| FeedError::Locked)?;

        Ok(lock_file)
    }
}

impl<R> DataSource<R> for LogTable<R>
where
    R: Row + Serialize + DeserializeOwned,
{
    fn count(&self, filter: &Filter) -> Result<u64> {
        self.ensure_open()?;
        let rows = self.rows.read();
        Ok(rows.values().filter(|r| filter.matches(*r)).count() as u64)
    }

    fn scan(&self, request: &ScanRequest<'_>) -> Result<Vec<R>> {
        self.ensure_open()?;
        let rows = self.rows.read();
        let range = match request.start_after {
            Some(after) => rows.range((Bound::Excluded(after), Bound::Unbounded)),
            None => rows.range::<RowId, _>(..),
        };
        Ok(request.collect(range.map(|(_, r)| r)))
    }

    fn get(&self, id: RowId) -> Result<Option<R>> {
        self.ensure_open()?;
        Ok(self.rows.read().get(&id).cloned())
    }
}

impl<R> WriteSource<R> for LogTable<R>
where
    R: Row + Serialize + DeserializeOwned,
{
    fn insert_with<F>(&self, build: F) -> Result<R>
    where
        F: FnOnce(RowId) -> R,
    {
        self.ensure_open()?;
        let mut writer = self.writer.lock();

        let id = writer
            .next_id
            .map(RowId)
            .ok_or_else(|| FeedError::InvalidArgument("row id space exhausted".into()))?;
        let row = build(id);
        if row.id() != id {
            return Err(FeedError::InvalidArgument(format!(
                "row built for id {} reports id {}",
                id,
                row.id()
            )));
        }

        let payload = rmp_serde::to_vec_named(&row)?;
        self.append_frame(&mut writer, FrameKind::Row, id, &payload)?;
        writer.next_id = id.0.checked_add(1);

        self.rows.write().insert(id, row.clone());
        Ok(row)
    }

    fn delete(&self, id: RowId) -> Result<bool> {
        self.ensure_open()?;
        let mut writer = self.writer.lock();

        if !self.rows.read().contains_key(&id) {
            return Ok(false);
        }

        self.append_frame(&mut writer, FrameKind::Tombstone, id, &[])?;
        self.rows.write().remove(&id);
        Ok(true)
    }
}

impl<R> Drop for LogTable<R> {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.writer.get_mut().file.sync_all();
    }
}

fn encode_frame(kind: FrameKind, id: RowId, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + FRAME_TRAILER_SIZE);
    frame.extend_from_slice(FRAME_MAGIC);
    frame.push(LOG_VERSION);
    frame.push(kind as u8);
    frame.extend_from_slice(&id.0.to_le_bytes());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    let checksum = crc32fast::hash(&frame);
    frame.extend_from_slice(&checksum.to_le_bytes());
    frame
}

/// Outcome of replaying a log file.
struct Replay {
    /// Live row payloads by id.
    rows: BTreeMap<RowId, Vec<u8>>,
    /// Highest id ever written, deleted rows included.
    max_id: u64,
    /// Length of the prefix made of complete frames.
    valid_len: u64,
}

fn replay(bytes: &[u8]) -> Result<Replay> {
    let mut rows = BTreeMap::new();
    let mut max_id = 0u64;
    let mut offset = 0usize;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < FRAME_HEADER_SIZE {
            break;
        }

        if &rest[0..4] != FRAME_MAGIC {
            return Err(FeedError::InvalidFormat(format!(
                "Invalid frame magic at offset {}",
                offset
            )));
        }
        if rest[4] != LOG_VERSION {
            return Err(FeedError::InvalidFormat(format!(
                "Unsupported log version: {}",
                rest[4]
            )));
        }
        let id = RowId(u64::from_le_bytes(read_array(&rest[6..14])));
        let payload_len = u32::from_le_bytes(read_array(&rest[14..18])) as usize;

        let frame_len = FRAME_HEADER_SIZE + payload_len + FRAME_TRAILER_SIZE;
        if rest.len() < frame_len {
            break;
        }

        let body_end = FRAME_HEADER_SIZE + payload_len;
        let stored = u32::from_le_bytes(read_array(&rest[body_end..frame_len]));
        let computed = crc32fast::hash(&rest[..body_end]);
        if stored != computed {
            return Err(FeedError::ChecksumMismatch {
                row: id,
                expected: stored,
                got: computed,
            });
        }

        let kind = FrameKind::from_byte(rest[5])?;
        let payload = &rest[FRAME_HEADER_SIZE..body_end];

        match kind {
            FrameKind::Row => {
                rows.insert(id, payload.to_vec());
            }
            FrameKind::Tombstone => {
                rows.remove(&id);
            }
        }
        max_id = max_id.max(id.0);
        offset += frame_len;
    }

    Ok(Replay {
        rows,
        max_id,
        valid_len: offset as u64,
    })
}

fn read_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
