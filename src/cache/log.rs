//! Append-only durable result log.
//!
//! Records are framed as described in [`super::record`]. On open the file is
//! memory-mapped and scanned once to build the fingerprint index; the last
//! record for a fingerprint wins. Reads are positioned reads of a single
//! frame, so lookups for different fingerprints never serialize on each other.
//!
//! The file may be cleared, removed or replaced from outside this handle (a
//! second process running `clear-cache`, an operator deleting it). `get` and
//! `set` check the path first and rebuild the index when the file length is
//! not the length this handle last committed or the path no longer names the
//! file this handle opened; each rebuild bumps [`ResultLog::generation`].
//!
//! Lock order: `writer` then `reader` then `index`.

use std::collections::HashMap;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::Mmap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::error::{CacheError, CacheResult};
use super::record::{CacheRecord, HEADER_BYTES, parse_header};
use crate::hashing::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    offset: u64,
    frame_len: usize,
}

struct LogWriter {
    file: File,
    end: u64,
}

/// Identity of the file behind a handle (device and inode on unix).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

struct LogReader {
    file: File,
    id: Option<FileId>,
}

/// Freshly opened handles plus the index scanned from them.
struct Loaded {
    writer: LogWriter,
    reader: LogReader,
    index: HashMap<Fingerprint, Slot>,
}

/// Summary of a completed compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub live_records: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

pub struct ResultLog {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    reader: RwLock<LogReader>,
    index: RwLock<HashMap<Fingerprint, Slot>>,
    /// Mirrors `writer.end` for lock-free staleness checks.
    committed: AtomicU64,
    generation: AtomicU64,
}

impl std::fmt::Debug for ResultLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultLog")
            .field("path", &self.path)
            .field("entries", &self.len())
            .finish()
    }
}

impl ResultLog {
    /// Opens (or creates) the log at `path` and rebuilds the index from disk.
    pub fn open(path: impl Into<PathBuf>) -> CacheResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }

        let loaded = load(&path)?;
        info!(path = %path.display(), entries = loaded.index.len(), "Result log opened");

        Ok(Self {
            committed: AtomicU64::new(loaded.writer.end),
            generation: AtomicU64::new(0),
            writer: Mutex::new(loaded.writer),
            reader: RwLock::new(loaded.reader),
            index: RwLock::new(loaded.index),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of live fingerprints.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.index.read().contains_key(fingerprint)
    }

    /// Bytes currently committed to the log file.
    pub fn size_bytes(&self) -> u64 {
        self.committed.load(Ordering::Acquire)
    }

    /// Bumped whenever the index is rebuilt or emptied; anything derived from
    /// earlier reads is stale once it moves.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Rebuilds the index if the file on disk is no longer the one this
    /// handle wrote. Returns `true` when a rebuild happened.
    pub fn reload_if_changed(&self) -> CacheResult<bool> {
        let known = self.reader.read().id;
        if !self.disk_changed(known)? {
            return Ok(false);
        }

        let mut writer = self.writer.lock();
        let mut reader = self.reader.write();
        let mut index = self.index.write();

        // Another caller may have rebuilt while we waited for the locks.
        if !self.disk_changed(reader.id)? {
            return Ok(false);
        }

        warn!(path = %self.path.display(), "Result log changed on disk, rebuilding index");
        self.install(load(&self.path)?, &mut writer, &mut reader, &mut index);
        Ok(true)
    }

    fn disk_changed(&self, known: Option<FileId>) -> CacheResult<bool> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(CacheError::io(&self.path, e)),
        };
        Ok(file_id(&meta) != known || meta.len() != self.committed.load(Ordering::Acquire))
    }

    fn install(
        &self,
        loaded: Loaded,
        writer: &mut LogWriter,
        reader: &mut LogReader,
        index: &mut HashMap<Fingerprint, Slot>,
    ) {
        *writer = loaded.writer;
        *reader = loaded.reader;
        *index = loaded.index;
        self.committed.store(writer.end, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Reads and verifies the record for `fingerprint`.
    ///
    /// Returns the stored value bytes, `None` if absent, or
    /// [`CacheError::Corrupted`] if the frame fails verification.
    pub fn get(&self, fingerprint: &Fingerprint) -> CacheResult<Option<Vec<u8>>> {
        self.reload_if_changed()?;

        let reader = self.reader.read();
        let Some(slot) = self.index.read().get(fingerprint).copied() else {
            return Ok(None);
        };

        let mut frame = vec![0u8; slot.frame_len];
        read_exact_at(&reader.file, &mut frame, slot.offset).map_err(|e| {
            CacheError::Corrupted {
                fingerprint: fingerprint.to_hex(),
                reason: format!("short read at offset {}: {e}", slot.offset),
            }
        })?;
        drop(reader);

        let record = CacheRecord::decode(&frame).map_err(|reason| CacheError::Corrupted {
            fingerprint: fingerprint.to_hex(),
            reason,
        })?;

        if record.fingerprint != fingerprint.0 {
            return Err(CacheError::Corrupted {
                fingerprint: fingerprint.to_hex(),
                reason: format!("record holds {}", record.fingerprint()),
            });
        }

        Ok(Some(record.value))
    }

    /// Appends a record and makes it visible once it is durable.
    pub fn set(&self, fingerprint: Fingerprint, value: Vec<u8>) -> CacheResult<()> {
        let frame = CacheRecord::new(fingerprint, value)
            .encode()
            .map_err(|reason| CacheError::Serialization { reason })?;

        self.reload_if_changed()?;
        let mut writer = self.writer.lock();

        // Appends land at the real end of file, so that is the record offset.
        let mut offset = writer
            .file
            .metadata()
            .map_err(|e| CacheError::io(&self.path, e))?
            .len();
        if offset != writer.end {
            warn!(
                path = %self.path.display(),
                expected = writer.end,
                actual = offset,
                "Result log length moved underneath the writer, rebuilding index"
            );
            let mut reader = self.reader.write();
            let mut index = self.index.write();
            self.install(load(&self.path)?, &mut writer, &mut reader, &mut index);
            offset = writer.end;
        }

        if let Err(e) = writer
            .file
            .write_all(&frame)
            .and_then(|_| writer.file.sync_data())
        {
            // Drop whatever part of the frame made it out so the next append
            // starts on a record boundary.
            let _ = writer.file.set_len(offset);
            return Err(CacheError::WriteFailed {
                reason: format!("{}: {e}", self.path.display()),
            });
        }

        writer.end = offset + frame.len() as u64;
        self.committed.store(writer.end, Ordering::Release);
        self.index.write().insert(
            fingerprint,
            Slot {
                offset,
                frame_len: frame.len(),
            },
        );

        debug!(fingerprint = %fingerprint, offset, bytes = frame.len(), "Result persisted");
        Ok(())
    }

    /// Drops every record.
    pub fn clear(&self) -> CacheResult<()> {
        let mut writer = self.writer.lock();
        let mut reader = self.reader.write();
        let mut index = self.index.write();

        if self.disk_changed(reader.id)? {
            self.install(load(&self.path)?, &mut writer, &mut reader, &mut index);
        }

        writer
            .file
            .set_len(0)
            .and_then(|_| writer.file.sync_all())
            .map_err(|e| CacheError::io(&self.path, e))?;
        writer.end = 0;
        index.clear();
        self.committed.store(0, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);

        info!(path = %self.path.display(), "Result log cleared");
        Ok(())
    }

    /// Rewrites the log with only the live record per fingerprint.
    ///
    /// The new file is written next to the log, synced, then renamed over it.
    pub fn compact(&self) -> CacheResult<CompactionReport> {
        let mut writer = self.writer.lock();
        let mut reader = self.reader.write();
        let mut index = self.index.write();

        if self.disk_changed(reader.id)? {
            self.install(load(&self.path)?, &mut writer, &mut reader, &mut index);
        }

        let bytes_before = writer.end;
        let tmp_path = self.path.with_extension("compact.tmp");

        let mut slots: Vec<(Fingerprint, Slot)> = index.iter().map(|(k, v)| (*k, *v)).collect();
        slots.sort_by_key(|(_, slot)| slot.offset);

        let mut new_index = HashMap::with_capacity(slots.len());
        let mut out = File::create(&tmp_path).map_err(|e| CacheError::io(&tmp_path, e))?;
        let mut end = 0u64;

        for (fingerprint, slot) in slots {
            let mut frame = vec![0u8; slot.frame_len];
            read_exact_at(&reader.file, &mut frame, slot.offset)
                .map_err(|e| CacheError::io(&self.path, e))?;

            if CacheRecord::decode(&frame).is_err() {
                warn!(fingerprint = %fingerprint, "Dropping unreadable record during compaction");
                continue;
            }

            out.write_all(&frame)
                .map_err(|e| CacheError::io(&tmp_path, e))?;
            new_index.insert(
                fingerprint,
                Slot {
                    offset: end,
                    frame_len: frame.len(),
                },
            );
            end += frame.len() as u64;
        }

        out.sync_all().map_err(|e| CacheError::io(&tmp_path, e))?;
        drop(out);
        fs::rename(&tmp_path, &self.path).map_err(|e| CacheError::io(&self.path, e))?;

        writer.file = open_append(&self.path)?;
        writer.end = end;
        let id = file_id(
            &writer
                .file
                .metadata()
                .map_err(|e| CacheError::io(&self.path, e))?,
        );
        *reader = LogReader {
            file: File::open(&self.path).map_err(|e| CacheError::io(&self.path, e))?,
            id,
        };
        self.committed.store(end, Ordering::Release);
        let live_records = new_index.len();
        *index = new_index;

        let report = CompactionReport {
            live_records,
            bytes_before,
            bytes_after: end,
        };
        info!(
            path = %self.path.display(),
            live_records,
            bytes_before,
            bytes_after = end,
            "Result log compacted"
        );
        Ok(report)
    }
}

/// Opens the handles for `path`, scans it, and cuts any invalid tail.
fn load(path: &Path) -> CacheResult<Loaded> {
    let writer_file = open_append(path)?;
    let (index, valid_len, file_len) = scan(path, &writer_file)?;

    if valid_len < file_len {
        warn!(
            path = %path.display(),
            valid_len,
            file_len,
            "Truncating invalid tail of result log"
        );
        writer_file
            .set_len(valid_len)
            .map_err(|e| CacheError::io(path, e))?;
        writer_file.sync_all().map_err(|e| CacheError::io(path, e))?;
    }

    let id = file_id(&writer_file.metadata().map_err(|e| CacheError::io(path, e))?);
    let reader = File::open(path).map_err(|e| CacheError::io(path, e))?;

    Ok(Loaded {
        writer: LogWriter {
            file: writer_file,
            end: valid_len,
        },
        reader: LogReader { file: reader, id },
        index,
    })
}

#[cfg(unix)]
fn file_id(meta: &Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some(FileId {
        dev: meta.dev(),
        ino: meta.ino(),
    })
}

// Without a stable file id, replacement is only caught when the length moves.
#[cfg(not(unix))]
fn file_id(_meta: &Metadata) -> Option<FileId> {
    None
}

fn open_append(path: &Path) -> CacheResult<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| CacheError::io(path, e))
}

/// Walks every frame in the file. Returns the index, the length of the valid
/// prefix, and the full file length.
fn scan(path: &Path, file: &File) -> CacheResult<(HashMap<Fingerprint, Slot>, u64, u64)> {
    let file_len = file.metadata().map_err(|e| CacheError::io(path, e))?.len();
    let mut index = HashMap::new();
    if file_len == 0 {
        return Ok((index, 0, 0));
    }

    // SAFETY: the map lives only for this scan, over a handle not yet shared
    // with other threads. Shrinking the file mid-scan is an operator error.
    let mmap = unsafe { Mmap::map(file) }.map_err(|e| CacheError::io(path, e))?;

    let mut pos = 0usize;
    while pos < mmap.len() {
        let Some((body_len, sum)) = parse_header(&mmap[pos..]) else {
            break;
        };
        let body_start = pos + HEADER_BYTES;
        let Some(body) = mmap.get(body_start..body_start + body_len) else {
            break;
        };
        let record = match CacheRecord::decode_body(body, &sum) {
            Ok(record) => record,
            Err(reason) => {
                warn!(offset = pos, %reason, "Invalid record in result log");
                break;
            }
        };

        let frame_len = HEADER_BYTES + body_len;
        index.insert(
            record.fingerprint(),
            Slot {
                offset: pos as u64,
                frame_len,
            },
        );
        pos += frame_len;
    }

    Ok((index, pos as u64, file_len))
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(std::io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
