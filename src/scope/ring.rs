//! Chunk-granular sample ring backing the render window.
//!
//! The ring holds the most recent `chunk_count` chunks of `chunk_len`
//! samples each. Chunks arrive whole and age out whole, so the window
//! always starts on a chunk boundary. A reset only invalidates the
//! chunk count used for render gating; the sample memory stays
//! readable, so a forced render right after a reset still analyzes a
//! full-length window, part fresh, part stale.

/// Fixed-capacity ring of sample chunks.
pub struct SampleRing {
    samples: Vec<i16>,
    chunk_len: usize,
    chunk_count: usize,
    /// Slot index of the oldest valid chunk.
    first: usize,
    /// Number of valid chunks, at most `chunk_count`.
    valid: usize,
}

impl SampleRing {
    /// Creates a ring of `chunk_count` chunks of `chunk_len` samples.
    ///
    /// # Panics
    /// Panics if either dimension is zero.
    pub fn new(chunk_count: usize, chunk_len: usize) -> Self {
        assert!(chunk_count > 0 && chunk_len > 0);
        SampleRing {
            samples: vec![0; chunk_count * chunk_len],
            chunk_len,
            chunk_count,
            first: 0,
            valid: 0,
        }
    }

    /// Total capacity in samples.
    #[allow(dead_code)]
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Number of valid samples accepted since the last reset.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.valid * self.chunk_len
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.valid == 0
    }

    /// True once every slot holds a valid chunk. Frequency-mode renders
    /// wait for this unless forced.
    pub fn is_full(&self) -> bool {
        self.valid == self.chunk_count
    }

    /// Appends a chunk, dropping the oldest one if the ring is full.
    ///
    /// # Panics
    /// Panics in debug builds if the chunk length does not match.
    pub fn accept(&mut self, chunk: &[i16]) {
        debug_assert_eq!(chunk.len(), self.chunk_len);
        let slot = (self.first + self.valid) % self.chunk_count;
        let at = slot * self.chunk_len;
        self.samples[at..at + self.chunk_len].copy_from_slice(chunk);
        if self.valid == self.chunk_count {
            self.first = (self.first + 1) % self.chunk_count;
        } else {
            self.valid += 1;
        }
    }

    /// Invalidates the chunk count without touching the sample memory.
    /// Called after each completed render.
    pub fn reset(&mut self) {
        self.valid = 0;
    }

    /// The full capacity window as a flat wrap-aware sequence, starting
    /// at the oldest valid chunk. Always `capacity()` samples long;
    /// slots not yet overwritten since the last reset contribute their
    /// previous contents.
    pub fn snapshot(&self) -> RingWindow<'_> {
        RingWindow {
            samples: &self.samples,
            start: self.first * self.chunk_len,
        }
    }
}

/// Borrowed wrap-aware view of the ring's sample memory.
#[derive(Clone, Copy)]
pub struct RingWindow<'a> {
    samples: &'a [i16],
    start: usize,
}

impl RingWindow<'_> {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The `i`-th sample of the window; `i` wraps modulo the capacity.
    pub fn get(&self, i: usize) -> i16 {
        self.samples[(self.start + i) % self.samples.len()]
    }

    #[cfg_attr(not(feature = "fft"), allow(dead_code))]
    pub fn iter(&self) -> impl Iterator<Item = i16> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(value: i16, len: usize) -> Vec<i16> {
        vec![value; len]
    }

    #[test]
    fn test_new_ring_is_empty_but_snapshot_is_full_length() {
        let ring = SampleRing::new(4, 8);
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.snapshot().len(), 32);
        assert!(!ring.snapshot().is_empty());
        assert!(ring.snapshot().iter().all(|s| s == 0));
    }

    #[test]
    fn test_fills_to_capacity_in_order() {
        let mut ring = SampleRing::new(3, 4);
        for v in 1..=3 {
            ring.accept(&chunk(v, 4));
        }
        assert!(ring.is_full());
        let got: Vec<i16> = ring.snapshot().iter().collect();
        assert_eq!(got, [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);
    }

    #[test]
    fn test_overflow_drops_oldest_chunk() {
        let mut ring = SampleRing::new(3, 2);
        for v in 1..=5 {
            ring.accept(&chunk(v, 2));
        }
        let got: Vec<i16> = ring.snapshot().iter().collect();
        assert_eq!(got, [3, 3, 4, 4, 5, 5]);
        assert!(ring.is_full());
    }

    #[test]
    fn test_snapshot_wraps_around_storage() {
        let mut ring = SampleRing::new(2, 2);
        ring.accept(&[1, 2]);
        ring.accept(&[3, 4]);
        ring.accept(&[5, 6]);
        // Storage is [5, 6, 3, 4] but the snapshot reads oldest first.
        let got: Vec<i16> = ring.snapshot().iter().collect();
        assert_eq!(got, [3, 4, 5, 6]);
        assert_eq!(ring.snapshot().get(0), 3);
        assert_eq!(ring.snapshot().get(3), 6);
    }

    #[test]
    fn test_wrapping_get_past_the_end() {
        let mut ring = SampleRing::new(2, 2);
        ring.accept(&[1, 2]);
        ring.accept(&[3, 4]);
        let snap = ring.snapshot();
        assert_eq!(snap.get(4), snap.get(0));
        assert_eq!(snap.get(7), snap.get(3));
    }

    #[test]
    fn test_reset_keeps_data_readable() {
        let mut ring = SampleRing::new(2, 2);
        ring.accept(&[7, 7]);
        ring.accept(&[8, 8]);
        ring.reset();
        assert!(ring.is_empty());
        assert!(!ring.is_full());

        // The next chunk lands on the oldest slot; the other slot still
        // shows its pre-reset contents.
        ring.accept(&[9, 9]);
        let got: Vec<i16> = ring.snapshot().iter().collect();
        assert_eq!(got, [9, 9, 8, 8]);
        assert!(!ring.is_full());
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_valid_count_never_exceeds_capacity() {
        let mut ring = SampleRing::new(4, 2);
        for v in 0..40 {
            ring.accept(&chunk(v, 2));
            assert!(ring.len() <= ring.capacity());
        }
        assert!(ring.is_full());
        let got: Vec<i16> = ring.snapshot().iter().collect();
        assert_eq!(got, [36, 36, 37, 37, 38, 38, 39, 39]);
    }
}
