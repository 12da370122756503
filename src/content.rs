//! Content-defined chunking with a buzhash rolling window.
//!
//! Cut points are chosen where the masked rolling hash over a sliding window
//! reaches zero, so boundaries follow the content: inserting bytes near the
//! start of a stream disturbs only nearby chunks while later boundaries
//! realign, which is what makes deduplication survive shifts.
//!
//! The chunker owns a single buffer of `max_size` bytes and scans it in
//! place. Emitted payloads borrow that buffer and stay valid until the next
//! pull; the `Iterator` adapter copies on emit for callers that prefer owned
//! chunks.

use std::io::Read;
use std::ops::Range;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::buzhash::BuzhashTable;
use crate::chunk::{Chunk, ChunkData, ChunkerError, MAX_BLOCK_SIZE};

/// Buzhash content-defined chunker.
///
/// Chunk sizes fall in `[1 << min_exp, 1 << max_exp]`, except that the final
/// chunk of a stream may be shorter than the minimum. With random content the
/// average chunk size approaches `2^mask_bits` bytes.
pub struct BuzhashChunker {
    table: BuzhashTable,
    min_size: usize,
    max_size: usize,
    window_size: usize,
    chunk_mask: u32,
    buf: Vec<u8>,
    elapsed: Duration,
}

impl BuzhashChunker {
    /// Validate the parameters and allocate the chunking buffer.
    ///
    /// The buffer and the seeded hash table are reused across `chunkify`
    /// calls; nothing is allocated per chunk.
    pub fn new(
        seed: u32,
        min_exp: u32,
        max_exp: u32,
        mask_bits: u32,
        window_size: usize,
    ) -> Result<Self, ChunkerError> {
        let max_exp_limit = MAX_BLOCK_SIZE.trailing_zeros();
        if max_exp > max_exp_limit {
            return Err(ChunkerError::Config(format!(
                "max_exp {max_exp} exceeds supported limit {max_exp_limit}"
            )));
        }
        if min_exp == 0 || min_exp >= max_exp {
            return Err(ChunkerError::Config(format!(
                "min_exp {min_exp} must be in 1..max_exp ({max_exp})"
            )));
        }
        if !(1..=31).contains(&mask_bits) {
            return Err(ChunkerError::Config(format!(
                "mask_bits {mask_bits} must be in 1..=31"
            )));
        }
        let min_size = 1usize << min_exp;
        let max_size = 1usize << max_exp;
        if window_size == 0 || window_size + min_size + 1 > max_size {
            return Err(ChunkerError::Config(format!(
                "window_size {window_size} + min_size {min_size} + 1 must not exceed max_size {max_size}"
            )));
        }
        debug!(seed, min_size, max_size, mask_bits, window_size, "buzhash_chunker_configured");
        Ok(Self {
            table: BuzhashTable::new(seed),
            min_size,
            max_size,
            window_size,
            chunk_mask: (1u32 << mask_bits) - 1,
            buf: vec![0u8; max_size],
            elapsed: Duration::ZERO,
        })
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Cumulative wall-clock time this chunker has spent producing chunks,
    /// in seconds, summed over all sources it has chunked.
    pub fn chunking_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Bind the chunker to a byte source and return the chunk stream.
    pub fn chunkify<R: Read>(&mut self, source: R) -> BuzhashStream<'_, R> {
        BuzhashStream {
            chunker: self,
            source,
            position: 0,
            remaining: 0,
            last: 0,
            bytes_read: 0,
            bytes_yielded: 0,
            eof: false,
            done: false,
        }
    }
}

/// One pass of a [`BuzhashChunker`] over a source.
///
/// State invariant: `last <= position <= position + remaining <= buf.len()`,
/// where `[last, position)` is the scanned prefix of the chunk in progress
/// and `[position, position + remaining)` holds buffered, unexamined bytes.
pub struct BuzhashStream<'c, R> {
    chunker: &'c mut BuzhashChunker,
    source: R,
    position: usize,
    remaining: usize,
    last: usize,
    bytes_read: u64,
    bytes_yielded: u64,
    eof: bool,
    done: bool,
}

impl<R: Read> BuzhashStream<'_, R> {
    /// Pull the next chunk. `Ok(None)` is clean end of stream; the payload
    /// borrow ends at the next pull.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk<'_>>, ChunkerError> {
        let started = Instant::now();
        let produced = self.produce();
        self.chunker.elapsed += started.elapsed();
        match produced? {
            Some(range) => Ok(Some(Chunk::classify(&self.chunker.buf[range]))),
            None => Ok(None),
        }
    }

    /// Cumulative wall-clock time spent inside chunk production, in seconds.
    pub fn chunking_seconds(&self) -> f64 {
        self.chunker.elapsed.as_secs_f64()
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_yielded(&self) -> u64 {
        self.bytes_yielded
    }

    /// Compact the buffer (drop everything before `last`) and read until at
    /// least `target` unexamined bytes are buffered, EOF, or the buffer is
    /// full. Looping over short reads here is what keeps cut points
    /// independent of the source's read granularity.
    fn refill(&mut self, target: usize) -> Result<(), ChunkerError> {
        if self.last > 0 {
            let end = self.position + self.remaining;
            self.chunker.buf.copy_within(self.last..end, 0);
            self.position -= self.last;
            self.last = 0;
        }
        while self.remaining < target && !self.eof {
            let tail = self.position + self.remaining;
            if tail == self.chunker.buf.len() {
                break;
            }
            let n = self.source.read(&mut self.chunker.buf[tail..])?;
            if n == 0 {
                self.eof = true;
            } else {
                self.remaining += n;
                self.bytes_read += n as u64;
            }
        }
        Ok(())
    }

    fn produce(&mut self) -> Result<Option<Range<usize>>, ChunkerError> {
        if self.done {
            return self.finish();
        }
        let w = self.chunker.window_size;
        let min_size = self.chunker.min_size;
        let mask = self.chunker.chunk_mask;

        // A cut-point search needs the minimum-size skip, a full window and
        // one byte to roll over.
        let search_needs = min_size + w + 1;
        if self.remaining < search_needs {
            self.refill(search_needs)?;
        }
        if self.remaining < search_needs {
            // EOF with too little data left to search: whatever is buffered
            // becomes the final (possibly sub-minimum) chunk.
            debug_assert!(self.eof);
            self.done = true;
            if self.remaining == 0 {
                return self.finish();
            }
            let start = self.last;
            let end = self.position + self.remaining;
            self.position = end;
            self.remaining = 0;
            self.last = end;
            self.bytes_yielded += (end - start) as u64;
            return Ok(Some(start..end));
        }

        // No cut can land before min_size, so skip it without hashing; the
        // window then starts at the first byte that may become a cut point.
        self.position += min_size;
        self.remaining -= min_size;

        let mut sum = self
            .chunker
            .table
            .hash(&self.chunker.buf[self.position..self.position + w]);
        while self.remaining > w && (sum & mask) != 0 {
            let scanned = {
                let table = &self.chunker.table;
                let buf = &self.chunker.buf[..];
                let stop = self.position + self.remaining - w;
                let mut p = self.position;
                while p < stop && (sum & mask) != 0 {
                    sum = table.roll(sum, buf[p], buf[p + w], w);
                    p += 1;
                }
                p - self.position
            };
            self.position += scanned;
            self.remaining -= scanned;
            if self.remaining <= w && !self.eof {
                self.refill(w + 1)?;
            }
        }
        // Too little left for the window to slide further (EOF, or the chunk
        // grew to the buffer bound): absorb the tail into this chunk.
        if self.remaining <= w {
            self.position += self.remaining;
            self.remaining = 0;
        }

        let start = self.last;
        let end = self.position;
        self.last = end;
        self.bytes_yielded += (end - start) as u64;
        Ok(Some(start..end))
    }

    fn finish(&self) -> Result<Option<Range<usize>>, ChunkerError> {
        if self.bytes_read == self.bytes_yielded {
            Ok(None)
        } else {
            Err(ChunkerError::Consistency {
                read: self.bytes_read,
                yielded: self.bytes_yielded,
            })
        }
    }
}

impl<R: Read> Iterator for BuzhashStream<'_, R> {
    type Item = Result<ChunkData, ChunkerError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk.to_owned())),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
