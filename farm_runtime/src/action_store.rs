//! Append-only action store — binary protobuf log.
//!
//! Storage format: length-prefixed protobuf frames.
//!   [4-byte LE length][protobuf bytes][4-byte LE length][protobuf bytes]...
//!
//! Rules:
//!   - Strict append only: records are never rewritten or reordered
//!   - fsync after every write
//!   - Sequence strictly increasing from 1 (validated on append)
//!   - A truncated or oversized frame fails the whole load

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use prost::Message;
use tracing::debug;

use crate::proto_types::ProtoActionRecord;

/// Upper bound on one frame. A full save inside LOAD_GAME fits well below.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Append-only action log backed by a binary file.
pub struct ActionStore {
    path: PathBuf,
    last_sequence: u64,
}

impl ActionStore {
    /// Open or create an action log at the given path.
    /// Reads existing records to determine the last sequence number.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let last_sequence = if path.exists() {
            let records = Self::read_all_from_file(path)?;
            records.last().map(|r| r.sequence).unwrap_or(0)
        } else {
            0
        };

        Ok(Self {
            path: path.to_path_buf(),
            last_sequence,
        })
    }

    /// Append a single record to the log.
    ///
    /// Validates strict sequence ordering.
    /// Writes length-prefixed protobuf and fsyncs.
    pub fn append(&mut self, record: &ProtoActionRecord) -> io::Result<()> {
        let expected = self.last_sequence + 1;
        if record.sequence != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "sequence violation in action store: expected {}, got {}",
                    expected, record.sequence
                ),
            ));
        }

        let buf = record.encode_to_vec();
        if buf.len() > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("record of {} bytes exceeds the frame limit", buf.len()),
            ));
        }
        let len = buf.len() as u32;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        {
            let mut writer = BufWriter::new(&mut file);
            writer.write_all(&len.to_le_bytes())?;
            writer.write_all(&buf)?;
            writer.flush()?;
        }
        file.sync_all()?;

        debug!(sequence = record.sequence, action = %record.action_type, bytes = len, "appended");
        self.last_sequence = record.sequence;
        Ok(())
    }

    /// Load all records from the log in sequence order.
    pub fn load_all(&self) -> io::Result<Vec<ProtoActionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Self::read_all_from_file(&self.path)
    }

    /// Records strictly after `sequence`.
    pub fn load_after(&self, sequence: u64) -> io::Result<Vec<ProtoActionRecord>> {
        let mut records = self.load_all()?;
        records.retain(|r| r.sequence > sequence);
        Ok(records)
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all records from a file, validating frame integrity and order.
    fn read_all_from_file(path: &Path) -> io::Result<Vec<ProtoActionRecord>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut records: Vec<ProtoActionRecord> = Vec::new();
        let mut len_buf = [0u8; 4];

        loop {
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len == 0 || len > MAX_FRAME_LEN {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid frame length: {}", len),
                ));
            }

            let mut frame = vec![0u8; len];
            reader.read_exact(&mut frame).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("truncated frame after record {}: {}", records.len(), e),
                )
            })?;

            let record = ProtoActionRecord::decode(frame.as_slice()).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("protobuf decode error: {}", e),
                )
            })?;

            let expected = records.last().map_or(1, |r| r.sequence + 1);
            if record.sequence != expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "out-of-order record: expected {}, got {}",
                        expected, record.sequence
                    ),
                ));
            }
            records.push(record);
        }

        Ok(records)
    }
}
