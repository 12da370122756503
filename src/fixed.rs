//! Block-aligned chunking with optional header block and sparse-file
//! support.
//!
//! With sparse handling enabled the source's hole extents are enumerated up
//! front and never read: hole blocks are emitted as size-only records and
//! skipped with a seek. Data blocks that turn out to be entirely zero are
//! likewise emitted without payload.

use std::io::SeekFrom;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::chunk::{Chunk, ChunkData, ChunkerError, MAX_BLOCK_SIZE};
use crate::sparse::{sparse_map, SparseRange, SparseSource};

// Length stand-in for the synthesized map when the source length is unknown;
// iteration ends at EOF long before this bound.
const UNBOUNDED: u64 = u64::MAX;

/// Fixed-size chunker.
pub struct FixedChunker {
    block_size: usize,
    header_size: u64,
    sparse: bool,
    buf: Vec<u8>,
    elapsed: Duration,
}

impl FixedChunker {
    pub fn new(block_size: usize, header_size: u64, sparse: bool) -> Result<Self, ChunkerError> {
        if block_size == 0 || block_size > MAX_BLOCK_SIZE {
            return Err(ChunkerError::Config(format!(
                "block_size {block_size} must be in 1..={MAX_BLOCK_SIZE}"
            )));
        }
        Ok(Self {
            block_size,
            header_size,
            sparse,
            buf: vec![0u8; block_size],
            elapsed: Duration::ZERO,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Cumulative wall-clock time this chunker has spent producing chunks,
    /// in seconds, summed over all sources it has chunked.
    pub fn chunking_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Bind the chunker to a source and return the chunk stream.
    ///
    /// `fmap` overrides extent discovery; without it, and with sparse
    /// handling enabled, the map is built from the source's data/hole
    /// extents. Sources that cannot report extents transparently degrade to
    /// one unbounded data range.
    pub fn chunkify<S: SparseSource>(
        &mut self,
        mut source: S,
        fmap: Option<Vec<SparseRange>>,
    ) -> FixedStream<'_, S> {
        let map = match fmap {
            Some(map) => map,
            None if self.sparse => match self.discover_map(&mut source) {
                Ok(map) => map,
                Err(err) => {
                    debug!(error = %err, "sparse_map_unavailable_reading_everything");
                    self.synthesized_map()
                }
            },
            None => self.synthesized_map(),
        };
        FixedStream {
            chunker: self,
            source,
            map,
            index: 0,
            range_consumed: 0,
            offset: 0,
            done: false,
        }
    }

    /// Enumerate real extents. A non-zero header is always treated as data
    /// and forced to the front; the body map is built from `header_size` on.
    /// The source is left positioned at the start.
    fn discover_map<S: SparseSource>(&self, source: &mut S) -> std::io::Result<Vec<SparseRange>> {
        let mut map = Vec::new();
        if self.header_size > 0 {
            source.seek(SeekFrom::Start(self.header_size))?;
            map.push(SparseRange::data(0, self.header_size));
        }
        map.extend(sparse_map(source)?);
        source.seek(SeekFrom::Start(0))?;
        Ok(map)
    }

    /// Map used when extents are unknown: everything is data, the length is
    /// an upper bound only.
    fn synthesized_map(&self) -> Vec<SparseRange> {
        if self.header_size > 0 {
            vec![
                SparseRange::data(0, self.header_size),
                SparseRange::data(self.header_size, UNBOUNDED - self.header_size),
            ]
        } else {
            vec![SparseRange::data(0, UNBOUNDED)]
        }
    }
}

/// One pass of a [`FixedChunker`] over a source, walking its range map in
/// file order.
pub struct FixedStream<'c, S> {
    chunker: &'c mut FixedChunker,
    source: S,
    map: Vec<SparseRange>,
    index: usize,
    range_consumed: u64,
    offset: u64,
    done: bool,
}

// What one pull produced, before the payload view is attached.
enum Produced {
    Finished,
    Hole(u64),
    Payload(usize),
}

impl<S: SparseSource> FixedStream<'_, S> {
    /// Pull the next chunk. `Ok(None)` is clean end of stream; the payload
    /// borrow ends at the next pull.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk<'_>>, ChunkerError> {
        let started = Instant::now();
        let produced = self.produce();
        self.chunker.elapsed += started.elapsed();
        Ok(match produced? {
            Produced::Finished => None,
            Produced::Hole(size) => Some(Chunk::hole(size)),
            Produced::Payload(filled) => Some(Chunk::classify(&self.chunker.buf[..filled])),
        })
    }

    /// Cumulative wall-clock time spent inside chunk production, in seconds.
    pub fn chunking_seconds(&self) -> f64 {
        self.chunker.elapsed.as_secs_f64()
    }

    fn produce(&mut self) -> Result<Produced, ChunkerError> {
        if self.done {
            return Ok(Produced::Finished);
        }
        // Find the range holding unconsumed bytes, skipping any empty ones.
        let range = loop {
            match self.map.get(self.index) {
                Some(range) if self.range_consumed == range.len => {
                    self.index += 1;
                    self.range_consumed = 0;
                }
                Some(range) => break *range,
                None => {
                    self.done = true;
                    return Ok(Produced::Finished);
                }
            }
        };
        if self.range_consumed == 0 && range.start != self.offset {
            // The map skips a region; jump to the range start.
            self.source.seek(SeekFrom::Start(range.start))?;
            self.offset = range.start;
        }

        let block = self.chunker.block_size as u64;
        let take = block.min(range.len - self.range_consumed);
        if !range.is_data {
            self.source.seek(SeekFrom::Current(take as i64))?;
            self.range_consumed += take;
            self.offset += take;
            return Ok(Produced::Hole(take));
        }

        let want = take as usize;
        let mut filled = 0;
        while filled < want {
            let n = self.source.read(&mut self.chunker.buf[filled..want])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < want {
            // Source ended before the map did; emit what was obtained, then
            // finish.
            self.done = true;
            if filled == 0 {
                return Ok(Produced::Finished);
            }
        }
        self.range_consumed += filled as u64;
        self.offset += filled as u64;
        Ok(Produced::Payload(filled))
    }
}

impl<S: SparseSource> Iterator for FixedStream<'_, S> {
    type Item = Result<ChunkData, ChunkerError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk.to_owned())),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
