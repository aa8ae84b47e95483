//! Durable circular log of control events.
//!
//! The log lives in the same store as the config record: a small header
//! `{count, newest, oldest}` under `loghdr` and one slot per entry under
//! `log<N>`.  Every append writes the entry slot first and the header
//! second, so a reset between the two leaves the previous header pointing
//! at intact entries.
//!
//! An in-memory mirror of every slot is kept so status queries never touch
//! flash.  After a reset the mirror is rehydrated from storage with
//! [`EventLog::open`].

use core::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::persist::{LOG_HEADER_KEY, NAMESPACE};

/// Maximum bytes of free text carried by one entry.
pub const LOG_TEXT_BYTES: usize = 20;

// ───────────────────────────────────────────────────────────────
// Event vocabulary
// ───────────────────────────────────────────────────────────────

/// Every kind of event the controller records.  The discriminants are
/// stored on flash, so new kinds are only ever appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    Startup = 0,
    UtilFail = 1,
    PowerBack = 2,
    GenOn = 3,
    GenOnFail = 4,
    GenOff = 5,
    GenOffFail = 6,
    GenCooldown = 7,
    GenConnect = 8,
    GenConnectFail = 9,
    GenConnectBadState = 10,
    UtilConnect = 11,
    UtilConnectFail = 12,
    UtilConnectBadState = 13,
    Assertion = 14,
    WatchdogReset = 15,
    BatteryRead = 16,
    BatteryWeak = 17,
    ConfigUpdated = 18,
    ExerciseStart = 19,
    ExerciseEnd = 20,
    NotifyQueued = 21,
    RestSkipped = 22,
    CycleAborted = 23,
    AmbiguousStart = 24,
    AtHomeOn = 25,
    AtHomeOff = 26,
    ManualOverride = 27,
    Misc = 28,
}

impl EventKind {
    /// Short stable name shown on the status page.
    pub fn name(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::UtilFail => "util fail",
            Self::PowerBack => "power back",
            Self::GenOn => "gen on",
            Self::GenOnFail => "gen on fail",
            Self::GenOff => "gen off",
            Self::GenOffFail => "gen off fail",
            Self::GenCooldown => "gen cooldown",
            Self::GenConnect => "gen connect",
            Self::GenConnectFail => "gen connect fail",
            Self::GenConnectBadState => "gen connect bad",
            Self::UtilConnect => "util connect",
            Self::UtilConnectFail => "util connect fail",
            Self::UtilConnectBadState => "util connect bad",
            Self::Assertion => "assertion",
            Self::WatchdogReset => "watchdog reset",
            Self::BatteryRead => "battery",
            Self::BatteryWeak => "battery weak",
            Self::ConfigUpdated => "config updated",
            Self::ExerciseStart => "exercise start",
            Self::ExerciseEnd => "exercise end",
            Self::NotifyQueued => "notify queued",
            Self::RestSkipped => "rest skipped",
            Self::CycleAborted => "cycle aborted",
            Self::AmbiguousStart => "ambiguous start",
            Self::AtHomeOn => "at home on",
            Self::AtHomeOff => "at home off",
            Self::ManualOverride => "manual override",
            Self::Misc => "misc",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ───────────────────────────────────────────────────────────────
// Entries and header
// ───────────────────────────────────────────────────────────────

/// One immutable log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall-clock seconds, or seconds since boot if the clock is unset.
    pub timestamp: u32,
    pub kind: EventKind,
    pub payload: Option<i16>,
    pub text: heapless::String<LOG_TEXT_BYTES>,
}

impl LogEntry {
    pub fn new(timestamp: u32, kind: EventKind, payload: Option<i16>, text: Option<&str>) -> Self {
        let mut t = heapless::String::new();
        if let Some(text) = text {
            let mut end = text.len().min(LOG_TEXT_BYTES);
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            let _ = t.push_str(&text[..end]);
        }
        Self {
            timestamp,
            kind,
            payload,
            text: t,
        }
    }
}

/// Persisted bookkeeping.  `newest` and `oldest` are slot indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogHeader {
    pub count: u16,
    pub newest: u16,
    pub oldest: u16,
}

impl LogHeader {
    /// Check the ring invariants against `capacity`.
    pub fn check(&self, capacity: usize) -> Result<(), &'static str> {
        let (count, newest, oldest) = (
            self.count as usize,
            self.newest as usize,
            self.oldest as usize,
        );
        if count > capacity {
            return Err("log count exceeds capacity");
        }
        if newest >= capacity || oldest >= capacity {
            return Err("log index out of range");
        }
        let span = if count == 0 {
            0
        } else {
            (newest + capacity - oldest) % capacity + 1
        };
        if count != span {
            return Err("log count disagrees with indices");
        }
        Ok(())
    }

    /// The header after one more append.
    fn advanced(self, capacity: usize) -> Self {
        if self.count == 0 {
            return Self {
                count: 1,
                newest: 0,
                oldest: 0,
            };
        }
        let wrap = |i: u16| ((i as usize + 1) % capacity) as u16;
        if self.count as usize == capacity {
            Self {
                count: self.count,
                newest: wrap(self.newest),
                oldest: wrap(self.oldest),
            }
        } else {
            Self {
                count: self.count + 1,
                newest: wrap(self.newest),
                oldest: self.oldest,
            }
        }
    }
}

/// What [`EventLog::open`] found in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOpen {
    /// Header and every live entry read back.
    Rehydrated,
    /// No header present; an empty log was written.
    Fresh,
    /// Header or an entry was unreadable; the log was reset to empty.
    Reinitialised,
}

// ───────────────────────────────────────────────────────────────
// The log
// ───────────────────────────────────────────────────────────────

/// Fixed-capacity ring of [`LogEntry`] backed by a [`StoragePort`].
pub struct EventLog {
    header: LogHeader,
    slots: Vec<Option<LogEntry>>,
}

impl EventLog {
    /// Rehydrate the log from storage, or start an empty one.
    pub fn open(storage: &mut dyn StoragePort, capacity: usize) -> (Self, LogOpen) {
        let capacity = capacity.clamp(1, u16::MAX as usize);
        let mut log = Self {
            header: LogHeader::default(),
            slots: vec![None; capacity],
        };

        let mut buf = [0u8; 16];
        let header = match storage.read(NAMESPACE, LOG_HEADER_KEY, &mut buf) {
            Ok(len) => postcard::from_bytes::<LogHeader>(&buf[..len]).ok(),
            Err(StorageError::NotFound) => {
                info!("EventLog: no header, starting empty ({} slots)", capacity);
                let _ = log.clear(storage);
                return (log, LogOpen::Fresh);
            }
            Err(_) => None,
        };

        let Some(header) = header.filter(|h| h.check(capacity).is_ok()) else {
            warn!("EventLog: header corrupt, reinitialising");
            let _ = log.clear(storage);
            return (log, LogOpen::Reinitialised);
        };

        log.header = header;
        for slot in log.live_slots() {
            match Self::read_slot(storage, slot) {
                Some(entry) => log.slots[slot] = Some(entry),
                None => {
                    warn!("EventLog: slot {} unreadable, reinitialising", slot);
                    let _ = log.clear(storage);
                    return (log, LogOpen::Reinitialised);
                }
            }
        }
        info!(
            "EventLog: rehydrated {} of {} entries",
            log.header.count, capacity
        );
        (log, LogOpen::Rehydrated)
    }

    /// Append one entry and persist it before returning.
    ///
    /// The in-memory view advances even if the write fails, so the
    /// console and status page stay truthful; the error tells the caller
    /// the durable copy is behind.
    pub fn append(
        &mut self,
        storage: &mut dyn StoragePort,
        entry: LogEntry,
    ) -> Result<(), StorageError> {
        let next = self.header.advanced(self.capacity());
        let slot = next.newest as usize;

        info!(
            "LOG | {} | {}{}{}",
            entry.timestamp,
            entry.kind,
            entry.payload.map_or_else(String::new, |p| format!(" [{}]", p)),
            if entry.text.is_empty() {
                String::new()
            } else {
                format!(" \"{}\"", entry.text)
            },
        );

        let entry_bytes = postcard::to_allocvec(&entry).map_err(|_| StorageError::Codec)?;
        let header_bytes = postcard::to_allocvec(&next).map_err(|_| StorageError::Codec)?;

        self.slots[slot] = Some(entry);
        self.header = next;

        storage.write(NAMESPACE, &Self::slot_key(slot), &entry_bytes)?;
        storage.write(NAMESPACE, LOG_HEADER_KEY, &header_bytes)
    }

    /// Drop every entry and persist an empty header.
    pub fn clear(&mut self, storage: &mut dyn StoragePort) -> Result<(), StorageError> {
        self.header = LogHeader::default();
        self.slots.iter_mut().for_each(|s| *s = None);
        let bytes = postcard::to_allocvec(&self.header).map_err(|_| StorageError::Codec)?;
        storage.write(NAMESPACE, LOG_HEADER_KEY, &bytes)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.header.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    pub fn header(&self) -> LogHeader {
        self.header
    }

    /// Entries oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.live_slots().filter_map(|i| self.slots[i].as_ref())
    }

    /// Up to `n` entries, newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &LogEntry> + '_ {
        let cap = self.capacity();
        let newest = self.header.newest as usize;
        (0..self.len().min(n))
            .map(move |back| (newest + cap - back) % cap)
            .filter_map(|i| self.slots[i].as_ref())
    }

    /// Verify the ring invariants and that every live slot is populated.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        self.header.check(self.capacity())?;
        if self.live_slots().any(|i| self.slots[i].is_none()) {
            return Err("log slot missing");
        }
        Ok(())
    }

    // ── Internal ──────────────────────────────────────────────

    fn live_slots(&self) -> impl Iterator<Item = usize> + use<> {
        let cap = self.capacity();
        let oldest = self.header.oldest as usize;
        (0..self.len()).map(move |k| (oldest + k) % cap)
    }

    fn read_slot(storage: &dyn StoragePort, slot: usize) -> Option<LogEntry> {
        let mut buf = [0u8; 64];
        let len = storage.read(NAMESPACE, &Self::slot_key(slot), &mut buf).ok()?;
        postcard::from_bytes::<LogEntry>(&buf[..len]).ok()
    }

    fn slot_key(index: usize) -> heapless::String<16> {
        let mut s = heapless::String::new();
        let _ = core::fmt::Write::write_fmt(&mut s, format_args!("log{}", index));
        s
    }
}
