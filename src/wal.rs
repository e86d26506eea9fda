use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::LedgerEvent;

/// Frame header and trailer: `u32` length before the payload, `u32` crc32 after.
const FRAME_OVERHEAD: u64 = 8;

fn encode_event(writer: &mut impl Write, event: &LedgerEvent) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())
}

/// Fill `buf` completely, or return `false` if the input ends first.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Next intact payload, or `None` at a clean end, a torn frame, or a bad checksum.
/// `remaining` bounds the frame so a garbage length never drives the allocation.
fn read_frame(reader: &mut impl Read, remaining: u64) -> io::Result<Option<Vec<u8>>> {
    let mut word = [0u8; 4];
    if !read_full(reader, &mut word)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(word) as u64;
    if len + FRAME_OVERHEAD > remaining {
        return Ok(None);
    }
    let mut payload = vec![0u8; len as usize];
    if !read_full(reader, &mut payload)? || !read_full(reader, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(Some(payload))
}

/// What a replay recovered.
#[derive(Debug, Default)]
pub struct Replay {
    pub events: Vec<LedgerEvent>,
    /// Byte length of the intact prefix.
    pub valid_len: u64,
    pub file_len: u64,
}

impl Replay {
    pub fn has_torn_tail(&self) -> bool {
        self.valid_len < self.file_len
    }
}

/// Append-only booking log.
///
/// Format per entry: `[u32: len][bincode: LedgerEvent][u32: crc32]`.
/// Replay stops at the first entry that is cut short or fails its checksum;
/// `recover` cuts such a tail off before appending again.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appended: u64,
}

impl Wal {
    /// Open (or create) the log file at `path` for appending.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appended: 0,
        })
    }

    /// Replay `path`, drop any torn tail, and open it for appending.
    pub fn recover(path: &Path) -> io::Result<(Self, Vec<LedgerEvent>)> {
        let replay = Self::replay(path)?;
        if replay.has_torn_tail() {
            tracing::warn!(
                path = %path.display(),
                discarded_bytes = replay.file_len - replay.valid_len,
                "discarding torn ledger tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }
        Ok((Self::open(path)?, replay.events))
    }

    /// Append one event and fsync. The ledger goes through
    /// `append_buffered` + `flush_sync` for group commit instead.
    #[cfg(test)]
    pub fn append(&mut self, event: &LedgerEvent) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer one event; nothing is durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &LedgerEvent) -> io::Result<()> {
        encode_event(&mut self.writer, event)?;
        self.appended += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events appended through this handle since it was opened.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Read every intact event from `path`. A missing file replays as empty.
    pub fn replay(path: &Path) -> io::Result<Replay> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut replay = Replay {
            file_len,
            ..Replay::default()
        };

        while let Some(payload) = read_frame(&mut reader, file_len - replay.valid_len)? {
            let Ok(event) = bincode::deserialize::<LedgerEvent>(&payload) else {
                break;
            };
            replay.valid_len += payload.len() as u64 + FRAME_OVERHEAD;
            replay.events.push(event);
        }
        Ok(replay)
    }
}
