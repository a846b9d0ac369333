// meridian_core/src/persistence/mod.rs
//
// The Sentinel — memory-mapped write-ahead log (§4.7, §5). Grounded on
// the teacher's mmap-backed journal: `append()` is a memory copy into
// the mapped region rather than a `write()` syscall, and recovery is a
// full deterministic replay of every journaled command rather than a
// snapshot-plus-delta scheme. Two differences from the teacher's
// version: the payload here is a self-describing `JournalRecord`
// (engine commands, not raw wire messages) encoded with the same
// `toml`/`serde` stack this crate already uses for configuration
// rather than a hand-rolled byte layout, and the header drops the
// teacher's `msg_type` byte since the payload's own tag carries that.
//
// HOW RECOVERY AVOIDS DOUBLE-MATCHING:
// The WAL records inbound commands, not outbound fills. Replaying the
// same ordered sequence of commands through the same deterministic
// `MarketEngine` methods reproduces byte-identical fills, positions,
// and balances, because the engine never consults wall-clock time or
// randomness — only the journaled command and market state so far.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use serde::{Deserialize, Serialize};

use crate::error::EngineFault;
use crate::types::ids::{MarketId, OrderId, UserId};
use crate::types::market::Resolution;
use crate::types::order::OrderType;
use crate::types::side::{Contract, Side};

/// Every WAL entry begins with this fixed-size header, immediately
/// followed by `payload_size` bytes of TOML-encoded `JournalRecord`.
///
/// Size: 24 bytes.
/// `[8: sequence_number][8: timestamp][4: payload_size][4: crc32]`
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct JournalHeader {
    pub sequence_number: u64,
    pub timestamp: u64,
    pub payload_size: u32,
    pub crc32: u32,
}

pub const JOURNAL_HEADER_SIZE: usize = std::mem::size_of::<JournalHeader>();
const _: () = assert!(JOURNAL_HEADER_SIZE == 24);

/// One journaled engine command (§3.1 `JournalRecord`), a tagged union
/// over every operation that mutates a market's book or ledger. Ids are
/// carried as raw newtypes (already `Serialize`); price/quantity as raw
/// primitives so this record never depends on `Price`/`Shares`
/// construction succeeding at decode time — replay re-validates them
/// exactly as intake originally did.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum JournalRecord {
    PlaceOrder {
        user: UserId,
        side: Side,
        contract: Contract,
        order_type: OrderType,
        limit_price: Option<u8>,
        quantity: u64,
    },
    CancelOrder {
        user: UserId,
        order_id: OrderId,
    },
    Mint {
        user: UserId,
        quantity: u64,
    },
    Redeem {
        user: UserId,
        quantity: u64,
    },
    Settle {
        resolution: Resolution,
    },
    CancelMarket,
}

/// A single decoded entry from the WAL, for recovery iteration.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub sequence_number: u64,
    pub timestamp: u64,
    pub record: JournalRecord,
}

/// Default WAL segment size: 64 MB per market.
pub const DEFAULT_WAL_SIZE: usize = 64 * 1024 * 1024;

/// Mmap-backed sequential WAL writer, one per market (§4.7 — each
/// matcher thread owns exactly one `Sentinel`, matching its exclusive
/// ownership of that market's book and ledger rows).
pub struct Sentinel {
    mmap: MmapMut,
    write_pos: usize,
    next_seq: u64,
    capacity: usize,
    path: PathBuf,
}

impl Sentinel {
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&path)?;

        let file_len = file.metadata()?.len() as usize;
        if file_len < capacity {
            file.set_len(capacity as u64)?;
        }

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let (write_pos, next_seq) = Self::scan(&mmap, capacity);

        Ok(Self { mmap, write_pos, next_seq, capacity, path })
    }

    /// Append one record, returning its assigned sequence number. The
    /// caller must journal before applying the command to in-memory
    /// state (§5): a hard fault here aborts the command outright rather
    /// than risk an unjournaled mutation.
    pub fn append(&mut self, record: &JournalRecord, timestamp: u64) -> io::Result<u64> {
        let payload = toml::to_string(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let payload = payload.into_bytes();
        let entry_size = JOURNAL_HEADER_SIZE + payload.len();

        if self.write_pos + entry_size > self.capacity {
            return Err(io::Error::new(io::ErrorKind::OutOfMemory, "WAL segment exhausted"));
        }

        let seq = self.next_seq;
        let header = JournalHeader {
            sequence_number: seq,
            timestamp,
            payload_size: payload.len() as u32,
            crc32: crc32fast::hash(&payload),
        };

        let header_bytes: &[u8] =
            unsafe { std::slice::from_raw_parts(&header as *const JournalHeader as *const u8, JOURNAL_HEADER_SIZE) };
        self.mmap[self.write_pos..self.write_pos + JOURNAL_HEADER_SIZE].copy_from_slice(header_bytes);
        let payload_start = self.write_pos + JOURNAL_HEADER_SIZE;
        self.mmap[payload_start..payload_start + payload.len()].copy_from_slice(&payload);

        self.write_pos += entry_size;
        self.next_seq += 1;
        Ok(seq)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }

    pub fn entry_count(&self) -> u64 {
        self.next_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every valid, checksum-verified entry written so far, oldest
    /// first — the full replay sequence for crash recovery (§4.7/§5).
    /// A corrupt entry (checksum mismatch) stops replay at that point
    /// rather than silently skip it, since anything after a corrupt
    /// entry cannot be trusted to be length-framed correctly either.
    pub fn read_all_entries(&self) -> Vec<JournalEntry> {
        let mut entries = Vec::new();
        let mut pos = 0usize;

        while pos + JOURNAL_HEADER_SIZE <= self.write_pos {
            let header: JournalHeader = unsafe { std::ptr::read_unaligned(self.mmap[pos..].as_ptr() as *const JournalHeader) };
            if header.payload_size == 0 {
                break;
            }
            let payload_start = pos + JOURNAL_HEADER_SIZE;
            let payload_end = payload_start + header.payload_size as usize;
            if payload_end > self.write_pos {
                break;
            }
            let payload = &self.mmap[payload_start..payload_end];
            if crc32fast::hash(payload) != header.crc32 {
                let fault = EngineFault::JournalCorrupt { sequence: header.sequence_number };
                tracing::error!(%fault, path = %self.path.display(), "stopping replay at corrupt journal entry");
                break;
            }
            let record: JournalRecord = match std::str::from_utf8(payload).ok().and_then(|s| toml::from_str(s).ok()) {
                Some(record) => record,
                None => break,
            };
            entries.push(JournalEntry { sequence_number: header.sequence_number, timestamp: header.timestamp, record });
            pos = payload_end;
        }
        entries
    }

    fn scan(mmap: &MmapMut, capacity: usize) -> (usize, u64) {
        let mut pos = 0usize;
        let mut next_seq = 0u64;
        while pos + JOURNAL_HEADER_SIZE <= capacity {
            let header: JournalHeader = unsafe { std::ptr::read_unaligned(mmap[pos..].as_ptr() as *const JournalHeader) };
            if header.payload_size == 0 {
                break;
            }
            let payload_start = pos + JOURNAL_HEADER_SIZE;
            let payload_end = payload_start + header.payload_size as usize;
            if payload_end > capacity {
                break;
            }
            let payload = &mmap[payload_start..payload_end];
            if crc32fast::hash(payload) != header.crc32 {
                break;
            }
            next_seq = header.sequence_number + 1;
            pos = payload_end;
        }
        (pos, next_seq)
    }
}
