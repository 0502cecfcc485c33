//! Double-buffered chunk exchange between the capture and view contexts.
//!
//! The producer publishes each captured chunk into one of two slots selected
//! by stamp parity, taking only a non-blocking lock: if the other context is
//! mid-access on that slot, the chunk is dropped rather than delaying
//! capture. The consumer polls for a stamp newer than the last one it saw
//! and reads with the same non-blocking discipline, so neither side ever
//! waits on the other. Bounded loss under contention is the intended
//! trade-off.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, TryLockError};
use thiserror::Error;

/// Protocol violations observed at the exchange point.
///
/// Contention and staleness are normal outcomes, not errors; these variants
/// are fatal to whichever context observes them.
#[derive(Debug, Error)]
pub enum SlotError {
    /// A chunk or read buffer does not match the configured chunk length.
    #[error("chunk length {got} does not match configured length {want}")]
    ChunkLength { got: usize, want: usize },
    /// The counterpart context crashed while holding a slot lock.
    #[error("slot lock poisoned by a crashed context")]
    Poisoned,
}

/// Result of a single publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The chunk is now the globally visible latest.
    Published,
    /// The consumer held the target slot; the chunk was dropped.
    Contended,
}

/// One slot of the double buffer: the chunk plus the stamp it was published
/// under, so readers always see a coherent (stamp, data) pair.
struct Slot {
    stamp: u64,
    chunk: Vec<i16>,
}

/// Lock-guarded double buffer carrying the latest captured chunk across the
/// capture/view boundary.
///
/// The published stamp never decreases; stamp parity selects the slot, so a
/// publish never overwrites the chunk a reader could currently be holding
/// under the previous stamp.
pub struct SlotStore {
    slots: [Mutex<Slot>; 2],
    published: AtomicU64,
    chunk_len: usize,
}

impl SlotStore {
    /// Creates a store for chunks of exactly `chunk_len` samples.
    pub fn new(chunk_len: usize) -> Self {
        let empty = || Slot {
            stamp: 0,
            chunk: vec![0; chunk_len],
        };
        SlotStore {
            slots: [Mutex::new(empty()), Mutex::new(empty())],
            published: AtomicU64::new(0),
            chunk_len,
        }
    }

    /// Number of samples per chunk.
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Stamp of the most recently published chunk (0 before the first one).
    #[allow(dead_code)]
    pub fn published_stamp(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    /// Publishes `chunk` under `stamp` without ever blocking.
    ///
    /// The target slot is `stamp % 2`. On contention the chunk is dropped
    /// and the previously published stamp stays visible.
    ///
    /// # Errors
    /// - If `chunk` is not exactly the configured chunk length
    /// - If the slot lock was poisoned by a crashed counterpart
    pub fn publish(&self, stamp: u64, chunk: &[i16]) -> Result<PublishOutcome, SlotError> {
        if chunk.len() != self.chunk_len {
            return Err(SlotError::ChunkLength {
                got: chunk.len(),
                want: self.chunk_len,
            });
        }

        let slot = &self.slots[(stamp % 2) as usize];
        let mut guard = match slot.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Ok(PublishOutcome::Contended),
            Err(TryLockError::Poisoned(_)) => return Err(SlotError::Poisoned),
        };

        guard.stamp = stamp;
        guard.chunk.copy_from_slice(chunk);
        self.published.store(stamp, Ordering::Release);
        Ok(PublishOutcome::Published)
    }

    /// Copies the newest published chunk into `buf` if its stamp is strictly
    /// greater than `last_seen`.
    ///
    /// Returns `Ok(None)` both when nothing newer has been published and
    /// when the producer currently holds the slot mid-publish; the caller
    /// simply polls again on its next tick.
    ///
    /// # Errors
    /// - If `buf` or the stored chunk is not the configured chunk length
    /// - If the slot lock was poisoned by a crashed counterpart
    pub fn read_latest(&self, last_seen: u64, buf: &mut [i16]) -> Result<Option<u64>, SlotError> {
        let stamp = self.published.load(Ordering::Acquire);
        if stamp <= last_seen {
            return Ok(None);
        }
        if buf.len() != self.chunk_len {
            return Err(SlotError::ChunkLength {
                got: buf.len(),
                want: self.chunk_len,
            });
        }

        let slot = &self.slots[(stamp % 2) as usize];
        let guard = match slot.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Ok(None),
            Err(TryLockError::Poisoned(_)) => return Err(SlotError::Poisoned),
        };

        // The slot's own stamp is authoritative: the producer may have
        // re-published into this parity between our stamp load and the lock.
        if guard.stamp <= last_seen {
            return Ok(None);
        }
        if guard.chunk.len() != self.chunk_len {
            return Err(SlotError::ChunkLength {
                got: guard.chunk.len(),
                want: self.chunk_len,
            });
        }

        buf.copy_from_slice(&guard.chunk);
        Ok(Some(guard.stamp))
    }
}

/// Consumer-side cursor over a [`SlotStore`].
///
/// Tracks the last consumed stamp and owns the scratch buffer chunks are
/// copied into, so the view context allocates nothing per tick.
pub struct BufferConsumer {
    last_seen: u64,
    chunk: Vec<i16>,
}

impl BufferConsumer {
    /// Creates a consumer for chunks of `chunk_len` samples.
    pub fn new(chunk_len: usize) -> Self {
        BufferConsumer {
            last_seen: 0,
            chunk: vec![0; chunk_len],
        }
    }

    /// Polls the store for a chunk newer than the last one consumed.
    ///
    /// Consuming is idempotent per stamp: once a stamp has been returned,
    /// polling again yields nothing until a newer publish lands.
    ///
    /// # Errors
    /// - If the exchange protocol was violated (see [`SlotError`])
    pub fn poll<'a>(&'a mut self, store: &SlotStore) -> Result<Option<&'a [i16]>, SlotError> {
        match store.read_latest(self.last_seen, &mut self.chunk)? {
            Some(stamp) => {
                self.last_seen = stamp;
                Ok(Some(&self.chunk))
            }
            None => Ok(None),
        }
    }

    /// Stamp of the most recently consumed chunk (0 before the first one).
    #[allow(dead_code)]
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_then_read() {
        let store = SlotStore::new(4);
        let mut consumer = BufferConsumer::new(4);

        assert!(consumer.poll(&store).unwrap().is_none());

        store.publish(1, &[1, 2, 3, 4]).unwrap();
        let chunk = consumer.poll(&store).unwrap().expect("chunk expected");
        assert_eq!(chunk, &[1, 2, 3, 4]);
        assert_eq!(consumer.last_seen(), 1);
    }

    #[test]
    fn test_idempotent_consumption() {
        let store = SlotStore::new(2);
        let mut consumer = BufferConsumer::new(2);

        store.publish(3, &[7, 7]).unwrap();
        assert!(consumer.poll(&store).unwrap().is_some());
        // Same published stamp, same last-seen: nothing new.
        assert!(consumer.poll(&store).unwrap().is_none());
        assert!(consumer.poll(&store).unwrap().is_none());
    }

    #[test]
    fn test_stamp_sequence_consumes_twice() {
        // Published stamps observed as [5, 5, 6, 6, 7] by a consumer that
        // has already seen 5 must yield exactly two consumptions.
        let store = SlotStore::new(1);
        let mut consumer = BufferConsumer::new(1);

        store.publish(5, &[50]).unwrap();
        consumer.poll(&store).unwrap();
        assert_eq!(consumer.last_seen(), 5);

        let mut consumed = 0;
        assert!(consumer.poll(&store).unwrap().is_none()); // sees 5

        store.publish(6, &[60]).unwrap();
        if consumer.poll(&store).unwrap().is_some() {
            consumed += 1; // sees 6
        }
        assert!(consumer.poll(&store).unwrap().is_none()); // sees 6 again

        store.publish(7, &[70]).unwrap();
        if consumer.poll(&store).unwrap().is_some() {
            consumed += 1; // sees 7
        }

        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_parity_selects_slot() {
        let store = SlotStore::new(1);
        let mut consumer = BufferConsumer::new(1);

        store.publish(1, &[10]).unwrap();
        assert_eq!(consumer.poll(&store).unwrap().unwrap(), &[10]);
        store.publish(2, &[20]).unwrap();
        assert_eq!(consumer.poll(&store).unwrap().unwrap(), &[20]);
        store.publish(3, &[30]).unwrap();
        assert_eq!(consumer.poll(&store).unwrap().unwrap(), &[30]);
    }

    #[test]
    fn test_contended_publish_drops_chunk() {
        let store = SlotStore::new(1);

        // A reader parked on slot 1 blocks a publish with odd parity.
        let _held = store.slots[1].lock().unwrap();
        assert_eq!(
            store.publish(1, &[99]).unwrap(),
            PublishOutcome::Contended
        );
        assert_eq!(store.published_stamp(), 0);

        // Even parity targets the other slot and goes through.
        assert_eq!(store.publish(2, &[42]).unwrap(), PublishOutcome::Published);
        assert_eq!(store.published_stamp(), 2);
    }

    #[test]
    fn test_reader_never_blocks_on_writer() {
        let store = SlotStore::new(1);
        store.publish(1, &[10]).unwrap();

        // Writer mid-publish on the published slot: reader reports no data
        // instead of waiting.
        let _held = store.slots[1].lock().unwrap();
        let mut buf = [0i16; 1];
        assert!(store.read_latest(0, &mut buf).unwrap().is_none());
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let store = SlotStore::new(4);
        assert!(matches!(
            store.publish(1, &[1, 2]),
            Err(SlotError::ChunkLength { got: 2, want: 4 })
        ));

        store.publish(1, &[1, 2, 3, 4]).unwrap();
        let mut short = [0i16; 3];
        assert!(matches!(
            store.read_latest(0, &mut short),
            Err(SlotError::ChunkLength { got: 3, want: 4 })
        ));
    }

    #[test]
    fn test_published_stamp_never_decreases() {
        let store = SlotStore::new(1);
        let mut prev = 0;
        for stamp in 1..20 {
            store.publish(stamp, &[stamp as i16]).unwrap();
            let published = store.published_stamp();
            assert!(published >= prev);
            prev = published;
        }
    }
}
