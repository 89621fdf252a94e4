use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::limits::MAX_WAL_ENTRY_BYTES;
use crate::model::Event;

/// Bytes around each payload: the length prefix and the trailing crc32.
const FRAME_OVERHEAD: u64 = 8;

/// Durable log of resources and reservations, one framed entry per event:
/// `[u32 le: payload len][bincode Event][u32 le: crc32 of payload]`.
///
/// Reservations are immutable, so the log only grows. Opening it yields the valid prefix
/// and cuts off whatever follows, so new entries always land directly after the last good one.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl Wal {
    /// Open (or create) the log at `path` and return the events it already holds.
    ///
    /// A torn or corrupt tail is truncated before the handle is returned.
    pub fn open(path: &Path) -> io::Result<(Self, Vec<Event>)> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let file_len = file.metadata()?.len();

        let mut events = Vec::new();
        let mut valid_len = 0u64;
        {
            let mut reader = BufReader::new(&file);
            while let Some((event, frame_len)) = read_entry(&mut reader)? {
                events.push(event);
                valid_len += frame_len;
            }
        }

        if valid_len < file_len {
            tracing::warn!(
                path = %path.display(),
                valid_len,
                discarded = file_len - valid_len,
                "truncating torn WAL tail"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(valid_len))?;

        let wal = Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        };
        Ok((wal, events))
    }

    /// Append one event and fsync.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer one event. Nothing is durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        let payload =
            bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if payload.len() > MAX_WAL_ENTRY_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("WAL entry of {} bytes exceeds limit", payload.len()),
            ));
        }
        self.writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.writer.write_all(&payload)?;
        self.writer.write_all(&crc32fast::hash(&payload).to_le_bytes())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Decode the next entry and its framed size. `None` ends the valid prefix: clean end of
/// file, a short read, an oversized length, a crc mismatch, or an undecodable payload.
fn read_entry(reader: &mut impl Read) -> io::Result<Option<(Event, u64)>> {
    let mut len_buf = [0u8; 4];
    if !read_full(reader, &mut len_buf)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_WAL_ENTRY_BYTES {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    let mut crc_buf = [0u8; 4];
    if !read_full(reader, &mut payload)? || !read_full(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }

    Ok(bincode::deserialize::<Event>(&payload)
        .ok()
        .map(|event| (event, len as u64 + FRAME_OVERHEAD)))
}

/// `Ok(false)` if the reader ran dry before `buf` was filled.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}
