//! Fixed-depth ring of categorized error events.
//!
//! Runtime anomalies never halt the state machines; they land here instead. The newest entry sits
//! at index 0 and older entries shift towards the tail, the oldest falling off. Reading an entry
//! clears its `fresh` flag so an application can poll for events it has not seen yet.

use crate::{error::Error, fmt, time::Timestamp};

/// Depth of the error log.
pub const ERROR_LOG_LEN: usize = 32;

/// One recorded error event.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorLogEntry {
    /// What went wrong.
    pub kind: Option<Error>,
    /// Port the event is attributed to, when applicable.
    pub port: Option<u8>,
    /// Domain index the event is attributed to, when applicable.
    pub domain: Option<u8>,
    /// Sequence id of the message that caused the event, when applicable.
    pub sequence_id: Option<u16>,
    /// Capture time (free-running timebase).
    pub time: Timestamp,
    /// True until the entry is read through [`ErrorLog::read`].
    pub fresh: bool,
}

/// The error event ring.
#[derive(Debug)]
pub struct ErrorLog {
    entries: [ErrorLogEntry; ERROR_LOG_LEN],
    /// Capture timestamp applied to new entries; refreshed by the engine on every entry point.
    now: Timestamp,
    /// Registrations since the engine last drained notifications.
    pending_notifications: u16,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self {
            entries: [ErrorLogEntry {
                kind: None,
                port: None,
                domain: None,
                sequence_id: None,
                time: Timestamp::ZERO,
                fresh: false,
            }; ERROR_LOG_LEN],
            now: Timestamp::ZERO,
            pending_notifications: 0,
        }
    }

    /// Clear all entries.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn set_time(&mut self, now: Timestamp) {
        self.now = now;
    }

    /// Push an event. Index 0 becomes the new entry; entry 31 drops.
    pub(crate) fn register(
        &mut self,
        kind: Error,
        port: Option<u8>,
        domain: Option<u8>,
        sequence_id: Option<u16>,
    ) {
        fmt::warn!(
            "gptp error {:?} (port {:?}, domain {:?}, seq {:?})",
            kind,
            port,
            domain,
            sequence_id
        );

        self.entries.copy_within(0..ERROR_LOG_LEN - 1, 1);

        self.entries[0] = ErrorLogEntry {
            kind: Some(kind),
            port,
            domain,
            sequence_id,
            time: self.now,
            fresh: true,
        };

        self.pending_notifications = self.pending_notifications.saturating_add(1);
    }

    /// Read the entry at `index` (0 is newest), clearing its fresh flag.
    pub fn read(&mut self, index: usize) -> Result<ErrorLogEntry, Error> {
        if index >= ERROR_LOG_LEN {
            return Err(Error::ErrorLogIndex);
        }

        let entry = self.entries[index];

        self.entries[index].fresh = false;

        Ok(entry)
    }

    /// Number of registrations since the last drain. The engine converts these into
    /// [`Hardware::error_logged`](crate::Hardware::error_logged) notifications at the end of each
    /// entry point.
    pub(crate) fn take_pending_notifications(&mut self) -> u16 {
        core::mem::take(&mut self.pending_notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LimitError, SyncError};

    #[test]
    fn newest_first() {
        let mut log = ErrorLog::new();

        log.set_time(Timestamp::new(1, 0));
        log.register(Error::Sync(SyncError::LossOfSync), Some(0), Some(0), None);

        log.set_time(Timestamp::new(2, 0));
        log.register(
            Error::Limit(LimitError::ResidenceTooLong),
            Some(1),
            Some(0),
            Some(7),
        );

        let newest = log.read(0).unwrap();

        assert_eq!(newest.kind, Some(Error::Limit(LimitError::ResidenceTooLong)));
        assert_eq!(newest.port, Some(1));
        assert_eq!(newest.sequence_id, Some(7));
        assert_eq!(newest.time, Timestamp::new(2, 0));

        let older = log.read(1).unwrap();

        assert_eq!(older.kind, Some(Error::Sync(SyncError::LossOfSync)));
    }

    #[test]
    fn read_clears_fresh() {
        let mut log = ErrorLog::new();

        log.register(Error::Sync(SyncError::LossOfSync), None, None, None);

        assert!(log.read(0).unwrap().fresh);
        assert!(!log.read(0).unwrap().fresh);
    }

    #[test]
    fn oldest_drops() {
        let mut log = ErrorLog::new();

        for seq in 0..(ERROR_LOG_LEN as u16 + 4) {
            log.register(Error::Sync(SyncError::LossOfSync), None, None, Some(seq));
        }

        // Entry 31 is the oldest still present: the first four registrations fell off
        assert_eq!(log.read(ERROR_LOG_LEN - 1).unwrap().sequence_id, Some(4));
        assert_eq!(log.read(0).unwrap().sequence_id, Some(35));
    }

    #[test]
    fn out_of_range_read() {
        let mut log = ErrorLog::new();

        assert_eq!(log.read(ERROR_LOG_LEN), Err(Error::ErrorLogIndex));
    }

    #[test]
    fn pending_notifications_drain() {
        let mut log = ErrorLog::new();

        log.register(Error::Sync(SyncError::LossOfSync), None, None, None);
        log.register(Error::Sync(SyncError::LossOfSync), None, None, None);

        assert_eq!(log.take_pending_notifications(), 2);
        assert_eq!(log.take_pending_notifications(), 0);
    }
}
