use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Magic + format version written at the head of every journal file.
const HEADER: [u8; 8] = *b"TLJRNL01";

/// Largest payload a record may carry. A length word above this is treated
/// as corruption, not as a size to allocate.
const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// Frame one record as `[u32 len][bincode][u32 crc32]`.
fn write_record(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_RECORD_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "journal record too large"));
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

/// Read the next framed record. `Ok(None)` on clean EOF, a torn tail, an
/// oversized length word or a checksum mismatch: everything after the last
/// intact record is dropped.
fn read_record(reader: &mut impl Read) -> io::Result<Option<Event>> {
    let mut len_buf = [0u8; 4];
    if !read_full(reader, &mut len_buf)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_RECORD_LEN {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    if !read_full(reader, &mut payload)? {
        return Ok(None);
    }
    let mut crc_buf = [0u8; 4];
    if !read_full(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize::<Event>(&payload).ok())
}

/// `read_exact` that reports a short read as `false` instead of an error.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

fn create_with_header(path: &Path) -> io::Result<BufWriter<File>> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&HEADER)?;
    Ok(writer)
}

/// Append-only journal of store events.
///
/// Writers hand a whole batch to [`Journal::commit_batch`], which makes it
/// durable with one fsync or leaves the file exactly as it was. On open, a
/// torn final record left by a crash is tolerated and ignored by
/// [`Journal::replay`].
pub struct Journal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Journal {
    /// Open the journal at `path`, creating it with a header if missing.
    pub fn open(path: &Path) -> io::Result<Self> {
        if !path.exists() || fs::metadata(path)?.len() == 0 {
            let mut writer = create_with_header(path)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.commit_batch([event])
    }

    /// Append `events` and fsync once. On failure the file is cut back to
    /// its length before the batch, so a partial frame never sits in front
    /// of later records.
    pub fn commit_batch<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) -> io::Result<()> {
        let committed_len = self.writer.get_ref().metadata()?.len();
        let mut written = 0u64;
        let result = events
            .into_iter()
            .try_for_each(|event| {
                write_record(&mut self.writer, event)?;
                written += 1;
                Ok::<(), io::Error>(())
            })
            .and_then(|()| {
                self.writer.flush()?;
                self.writer.get_ref().sync_all()
            });
        match result {
            Ok(()) => {
                self.appends_since_compact += written;
                Ok(())
            }
            Err(e) => {
                if let Err(undo) = self.truncate_to(committed_len) {
                    tracing::error!("journal rollback to {committed_len} bytes failed: {undo}");
                }
                Err(e)
            }
        }
    }

    /// Drop any buffered bytes and cut the file back to `len`.
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        file.set_len(len)?;
        file.sync_all()?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // `into_parts` hands back the unflushed buffer instead of writing it.
        let _ = stale.into_parts();
        Ok(())
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replace the journal with `events`: write a sibling temp file, fsync,
    /// then rename over the live file and reopen for appends.
    pub fn rewrite(&mut self, events: &[Event]) -> io::Result<()> {
        let tmp_path = self.path.with_extension("journal.tmp");
        {
            let mut writer = create_with_header(&tmp_path)?;
            for event in events {
                write_record(&mut writer, event)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Read every intact record. A missing file is an empty journal; a file
    /// with a foreign header is rejected.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);

        let mut header = [0u8; HEADER.len()];
        if !read_full(&mut reader, &mut header)? {
            return Ok(Vec::new());
        }
        if header != HEADER {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not a trip journal", path.display()),
            ));
        }

        let mut events = Vec::new();
        while let Some(event) = read_record(&mut reader)? {
            events.push(event);
        }
        Ok(events)
    }
}
