//! Bounded byte-record queue for frames delivered while no DTE command is
//! waiting for them (`spec.md` §3, §4.2, §5).
//!
//! Each record is a 1-byte AT response code prefix plus the frame's raw
//! bytes (when any). `spec.md` §5 calls out "atomic read/write semantics"
//! because the delivery path can run ahead of a waiting DTE command; the
//! session's reentrancy-disjoint-entry-point contract (§5) means a single
//! `RefCell`-free `VecDeque` is sufficient here — there is never a second
//! concurrent writer, only a possible race in *logical* ordering between
//! "deliver now" and "enqueue for later," which `hdlc.rs` resolves, not this
//! module.

use crate::callbacks::AtResultCode;
use crate::consts::RX_QUEUE_CAPACITY;
#[cfg(not(feature = "std"))]
use crate::consts::RX_QUEUE_MAX_RECORDS;
use crate::error::{Result, T31Error};

/// One queued frame: the response code it should be delivered with, plus
/// its raw payload (empty for a bare OK/ERROR/NO_CARRIER with no frame).
#[derive(Debug, Clone)]
pub struct QueuedRecord {
    pub code: AtResultCode,
    pub frame: Vec<u8>,
}

/// Bounded FIFO of [`QueuedRecord`]s. Under `std` it is capacity-limited by
/// total buffered bytes; without `std` there is no allocator to grow a byte
/// budget against, so the bound is instead a fixed record count
/// (`RX_QUEUE_MAX_RECORDS`), matching the fixed-capacity collections the
/// rest of this crate falls back to without `std`.
#[derive(Debug, Default)]
pub struct FrameQueue {
    #[cfg(feature = "std")]
    records: std::collections::VecDeque<QueuedRecord>,
    #[cfg(not(feature = "std"))]
    records: heapless::Deque<QueuedRecord, RX_QUEUE_MAX_RECORDS>,
    #[cfg(feature = "std")]
    bytes_buffered: usize,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "std")]
            records: std::collections::VecDeque::new(),
            #[cfg(not(feature = "std"))]
            records: heapless::Deque::new(),
            #[cfg(feature = "std")]
            bytes_buffered: 0,
        }
    }

    /// Enqueues a record. Under `std`, each record costs 1 byte (the code
    /// prefix) plus its frame length and the push is rejected once
    /// `RX_QUEUE_CAPACITY` would be exceeded; without `std` the push is
    /// rejected once `RX_QUEUE_MAX_RECORDS` records are already queued.
    pub fn push(&mut self, code: AtResultCode, frame: Vec<u8>) -> Result<()> {
        #[cfg(feature = "std")]
        {
            let cost = 1 + frame.len();
            if self.bytes_buffered + cost > RX_QUEUE_CAPACITY {
                return Err(T31Error::BufferExhausted);
            }
            self.bytes_buffered += cost;
            self.records.push_back(QueuedRecord { code, frame });
            Ok(())
        }
        #[cfg(not(feature = "std"))]
        {
            self.records
                .push_back(QueuedRecord { code, frame })
                .map_err(|_| T31Error::BufferExhausted)
        }
    }

    /// Dequeues the oldest record, if any.
    pub fn pop(&mut self) -> Option<QueuedRecord> {
        let rec = self.records.pop_front()?;
        #[cfg(feature = "std")]
        {
            self.bytes_buffered -= 1 + rec.frame.len();
        }
        Some(rec)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every queued record. Used by `restart_modem` (`spec.md` §4.1),
    /// which flushes the queued frame buffer on any real mode change.
    pub fn flush(&mut self) {
        self.records.clear();
        #[cfg(feature = "std")]
        {
            self.bytes_buffered = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_ordering_preserved() {
        let mut q = FrameQueue::new();
        q.push(AtResultCode::Ok, vec![1, 2, 3]).unwrap();
        q.push(AtResultCode::Error, vec![4]).unwrap();
        let first = q.pop().unwrap();
        assert_eq!(first.code, AtResultCode::Ok);
        assert_eq!(first.frame, vec![1, 2, 3]);
        let second = q.pop().unwrap();
        assert_eq!(second.code, AtResultCode::Error);
        assert!(q.pop().is_none());
    }

    #[test]
    fn rejects_push_past_capacity() {
        let mut q = FrameQueue::new();
        let big = vec![0u8; RX_QUEUE_CAPACITY];
        assert!(matches!(
            q.push(AtResultCode::Ok, big),
            Err(T31Error::BufferExhausted)
        ));
    }

    #[test]
    fn flush_clears_everything() {
        let mut q = FrameQueue::new();
        q.push(AtResultCode::Ok, vec![1, 2, 3]).unwrap();
        q.flush();
        assert!(q.is_empty());
    }
}
