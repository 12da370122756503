//! Deterministic fault injection for exercising callers' recovery paths.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use crate::chunk::{Chunk, ChunkData, ChunkerError, MAX_BLOCK_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailAction {
    Read,
    Error,
}

/// Fixed-size chunker that fails on schedule.
///
/// The schedule is a string over `{R, E}` (case-insensitive): `R` lets a read
/// through, `E` fails the pull with an I/O error carrying errno `EIO` without
/// consuming input. Once the schedule is exhausted its last entry repeats.
///
/// The attempt counter lives on the chunker, not the stream: a later
/// `chunkify` call continues the schedule where the previous stream stopped
/// while the input state starts fresh. Multi-file recovery tests rely on
/// this.
pub struct FailingChunker {
    block_size: usize,
    schedule: Vec<FailAction>,
    count: usize,
    buf: Vec<u8>,
    elapsed: Duration,
}

impl FailingChunker {
    pub fn new(block_size: usize, schedule: &str) -> Result<Self, ChunkerError> {
        if block_size == 0 || block_size > MAX_BLOCK_SIZE {
            return Err(ChunkerError::Config(format!(
                "block_size {block_size} must be in 1..={MAX_BLOCK_SIZE}"
            )));
        }
        if schedule.is_empty() {
            return Err(ChunkerError::Config("empty fail schedule".into()));
        }
        let schedule = schedule
            .chars()
            .map(|c| match c.to_ascii_uppercase() {
                'R' => Ok(FailAction::Read),
                'E' => Ok(FailAction::Error),
                other => Err(ChunkerError::Config(format!(
                    "invalid fail schedule entry {other:?}, expected R or E"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            block_size,
            schedule,
            count: 0,
            buf: vec![0u8; block_size],
            elapsed: Duration::ZERO,
        })
    }

    /// Cumulative wall-clock time this chunker has spent producing chunks,
    /// in seconds, summed over all sources it has chunked.
    pub fn chunking_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Bind the chunker to a byte source and return the chunk stream.
    pub fn chunkify<R: Read>(&mut self, source: R) -> FailingStream<'_, R> {
        FailingStream {
            chunker: self,
            source,
            done: false,
        }
    }
}

/// One pass of a [`FailingChunker`] over a source.
pub struct FailingStream<'c, R> {
    chunker: &'c mut FailingChunker,
    source: R,
    done: bool,
}

impl<R: Read> FailingStream<'_, R> {
    /// Pull the next chunk, or the scheduled failure. `Ok(None)` is clean end
    /// of stream.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk<'_>>, ChunkerError> {
        let started = Instant::now();
        let produced = self.produce();
        self.chunker.elapsed += started.elapsed();
        match produced? {
            Some(filled) => Ok(Some(Chunk::data(&self.chunker.buf[..filled]))),
            None => Ok(None),
        }
    }

    /// Cumulative wall-clock time spent inside chunk production, in seconds.
    pub fn chunking_seconds(&self) -> f64 {
        self.chunker.elapsed.as_secs_f64()
    }

    fn produce(&mut self) -> Result<Option<usize>, ChunkerError> {
        if self.done {
            return Ok(None);
        }
        let last = self.chunker.schedule.len() - 1;
        let action = self.chunker.schedule[self.chunker.count.min(last)];
        if action == FailAction::Error {
            self.chunker.count += 1;
            return Err(ChunkerError::Io(io::Error::from_raw_os_error(libc::EIO)));
        }

        let want = self.chunker.block_size;
        let mut filled = 0;
        while filled < want {
            let n = self.source.read(&mut self.chunker.buf[filled..want])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            self.done = true;
            return Ok(None);
        }
        if filled < want {
            self.done = true;
        }
        self.chunker.count += 1;
        Ok(Some(filled))
    }
}

impl<R: Read> Iterator for FailingStream<'_, R> {
    type Item = Result<ChunkData, ChunkerError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk.to_owned())),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;
    use std::io::Cursor;

    fn eio(err: ChunkerError) -> bool {
        matches!(err, ChunkerError::Io(ref io_err) if io_err.raw_os_error() == Some(libc::EIO))
    }

    #[test]
    fn rejects_bad_schedules() {
        assert!(FailingChunker::new(4, "").is_err());
        assert!(FailingChunker::new(4, "RXE").is_err());
        assert!(FailingChunker::new(0, "R").is_err());
        assert!(FailingChunker::new(4, "rEr").is_ok());
    }

    #[test]
    fn schedule_interleaves_chunks_and_errors() {
        let mut chunker = FailingChunker::new(4, "RERR").unwrap();
        let mut stream = chunker.chunkify(Cursor::new(*b"abcdefgh"));

        let first = stream.next_chunk().unwrap().expect("first data chunk");
        assert_eq!(first.kind, ChunkKind::Data);
        assert_eq!(first.payload, Some(&b"abcd"[..]));

        let err = stream.next_chunk().unwrap_err();
        assert!(eio(err), "scheduled failure must carry EIO");

        // The failed pull consumed nothing; the stream resumes where the
        // first chunk ended.
        let third = stream.next_chunk().unwrap().expect("second data chunk");
        assert_eq!(third.payload, Some(&b"efgh"[..]));

        assert!(stream.next_chunk().unwrap().is_none());
    }

    #[test]
    fn schedule_last_entry_repeats() {
        let mut chunker = FailingChunker::new(2, "E").unwrap();
        let mut stream = chunker.chunkify(Cursor::new(*b"abcd"));
        assert!(eio(stream.next_chunk().unwrap_err()));
        assert!(eio(stream.next_chunk().unwrap_err()));
    }

    #[test]
    fn counter_survives_rechunkify() {
        let mut chunker = FailingChunker::new(4, "RE").unwrap();
        {
            let mut stream = chunker.chunkify(Cursor::new(*b"aaaabbbb"));
            assert!(stream.next_chunk().unwrap().is_some());
        }
        // The schedule continues on a fresh source: next pull hits the E.
        let mut stream = chunker.chunkify(Cursor::new(*b"cccc"));
        assert!(eio(stream.next_chunk().unwrap_err()));
    }

    #[test]
    fn short_final_read_terminates() {
        let mut chunker = FailingChunker::new(4, "R").unwrap();
        let mut stream = chunker.chunkify(Cursor::new(*b"abcdef"));
        assert_eq!(stream.next_chunk().unwrap().unwrap().size, 4);
        assert_eq!(stream.next_chunk().unwrap().unwrap().size, 2);
        assert!(stream.next_chunk().unwrap().is_none());
    }
}
