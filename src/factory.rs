//! Chunker selection: typed parameters, spec-string parsing and the tagged
//! variant dispatching the shared stream interface.

use std::str::FromStr;

use crate::chunk::{Chunk, ChunkData, ChunkerError};
use crate::content::{BuzhashChunker, BuzhashStream};
use crate::failing::{FailingChunker, FailingStream};
use crate::fixed::{FixedChunker, FixedStream};
use crate::sparse::SparseSource;

/// Parameters selecting a chunker variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkerParams {
    Buzhash {
        seed: u32,
        min_exp: u32,
        max_exp: u32,
        mask_bits: u32,
        window_size: usize,
    },
    Fixed {
        block_size: usize,
        header_size: u64,
        sparse: bool,
    },
    Failing {
        block_size: usize,
        schedule: String,
    },
}

impl ChunkerParams {
    /// Set sparse-file handling; meaningful for the fixed variant only.
    pub fn with_sparse(mut self, enabled: bool) -> Self {
        if let ChunkerParams::Fixed { sparse, .. } = &mut self {
            *sparse = enabled;
        }
        self
    }

    /// Set the boundary seed; meaningful for the buzhash variant only.
    pub fn with_seed(mut self, value: u32) -> Self {
        if let ChunkerParams::Buzhash { seed, .. } = &mut self {
            *seed = value;
        }
        self
    }
}

impl Default for ChunkerParams {
    /// `buzhash,19,23,21,4095`: 512 KiB..8 MiB chunks averaging 2 MiB, with
    /// a window deliberately not a multiple of 64 so the seed never cancels
    /// out of the rotated sum.
    fn default() -> Self {
        ChunkerParams::Buzhash {
            seed: 0,
            min_exp: 19,
            max_exp: 23,
            mask_bits: 21,
            window_size: 4095,
        }
    }
}

fn parse_field<T: FromStr>(
    parts: &mut std::str::Split<'_, char>,
    algo: &str,
    name: &str,
) -> Result<T, ChunkerError> {
    let raw = parts
        .next()
        .ok_or_else(|| ChunkerError::Config(format!("{algo} spec is missing {name}")))?;
    raw.trim()
        .parse()
        .map_err(|_| ChunkerError::Config(format!("{algo} spec has invalid {name}: {raw:?}")))
}

impl FromStr for ChunkerParams {
    type Err = ChunkerError;

    /// Parse the comma-separated spec form: `buzhash,19,23,21,4095`
    /// (optionally with a trailing seed), `fixed,4194304` or
    /// `fixed,4194304,512`, and `fail,4096,RRER`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',');
        let algo = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        let params = match algo.as_str() {
            "buzhash" => {
                let min_exp = parse_field(&mut parts, &algo, "min_exp")?;
                let max_exp = parse_field(&mut parts, &algo, "max_exp")?;
                let mask_bits = parse_field(&mut parts, &algo, "mask_bits")?;
                let window_size = parse_field(&mut parts, &algo, "window_size")?;
                let seed = match parts.next() {
                    Some(raw) => raw.trim().parse().map_err(|_| {
                        ChunkerError::Config(format!("buzhash spec has invalid seed: {raw:?}"))
                    })?,
                    None => 0,
                };
                ChunkerParams::Buzhash {
                    seed,
                    min_exp,
                    max_exp,
                    mask_bits,
                    window_size,
                }
            }
            "fixed" => {
                let block_size = parse_field(&mut parts, &algo, "block_size")?;
                let header_size = match parts.next() {
                    Some(raw) => raw.trim().parse().map_err(|_| {
                        ChunkerError::Config(format!("fixed spec has invalid header_size: {raw:?}"))
                    })?,
                    None => 0,
                };
                ChunkerParams::Fixed {
                    block_size,
                    header_size,
                    sparse: false,
                }
            }
            "fail" => {
                let block_size = parse_field(&mut parts, &algo, "block_size")?;
                let schedule = parts
                    .next()
                    .ok_or_else(|| ChunkerError::Config("fail spec is missing schedule".into()))?
                    .trim()
                    .to_string();
                ChunkerParams::Failing {
                    block_size,
                    schedule,
                }
            }
            other => {
                return Err(ChunkerError::Config(format!("unknown algorithm: {other:?}")))
            }
        };
        if let Some(extra) = parts.next() {
            return Err(ChunkerError::Config(format!(
                "{algo} spec has trailing field: {extra:?}"
            )));
        }
        Ok(params)
    }
}

/// Build the chunker selected by `params`, validating them.
pub fn get_chunker(params: ChunkerParams) -> Result<Chunker, ChunkerError> {
    Ok(match params {
        ChunkerParams::Buzhash {
            seed,
            min_exp,
            max_exp,
            mask_bits,
            window_size,
        } => Chunker::Buzhash(BuzhashChunker::new(
            seed,
            min_exp,
            max_exp,
            mask_bits,
            window_size,
        )?),
        ChunkerParams::Fixed {
            block_size,
            header_size,
            sparse,
        } => Chunker::Fixed(FixedChunker::new(block_size, header_size, sparse)?),
        ChunkerParams::Failing {
            block_size,
            schedule,
        } => Chunker::Failing(FailingChunker::new(block_size, &schedule)?),
    })
}

/// A chunker of any variant behind one interface.
pub enum Chunker {
    Buzhash(BuzhashChunker),
    Fixed(FixedChunker),
    Failing(FailingChunker),
}

impl Chunker {
    /// Bind the chunker to a byte source and return the chunk stream.
    ///
    /// The source must be seekable so the fixed variant can walk sparse maps;
    /// files and in-memory cursors both qualify.
    pub fn chunkify<S: SparseSource>(&mut self, source: S) -> ChunkStream<'_, S> {
        match self {
            Chunker::Buzhash(chunker) => ChunkStream::Buzhash(chunker.chunkify(source)),
            Chunker::Fixed(chunker) => ChunkStream::Fixed(chunker.chunkify(source, None)),
            Chunker::Failing(chunker) => ChunkStream::Failing(chunker.chunkify(source)),
        }
    }

    /// Cumulative wall-clock time this chunker has spent producing chunks,
    /// in seconds, summed over all sources it has chunked.
    pub fn chunking_seconds(&self) -> f64 {
        match self {
            Chunker::Buzhash(chunker) => chunker.chunking_seconds(),
            Chunker::Fixed(chunker) => chunker.chunking_seconds(),
            Chunker::Failing(chunker) => chunker.chunking_seconds(),
        }
    }
}

/// Stream of any chunker variant.
pub enum ChunkStream<'c, S> {
    Buzhash(BuzhashStream<'c, S>),
    Fixed(FixedStream<'c, S>),
    Failing(FailingStream<'c, S>),
}

impl<S: SparseSource> ChunkStream<'_, S> {
    /// Pull the next chunk. `Ok(None)` is clean end of stream; the payload
    /// borrow ends at the next pull.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk<'_>>, ChunkerError> {
        match self {
            ChunkStream::Buzhash(stream) => stream.next_chunk(),
            ChunkStream::Fixed(stream) => stream.next_chunk(),
            ChunkStream::Failing(stream) => stream.next_chunk(),
        }
    }

    /// Cumulative wall-clock time spent inside chunk production, in seconds.
    pub fn chunking_seconds(&self) -> f64 {
        match self {
            ChunkStream::Buzhash(stream) => stream.chunking_seconds(),
            ChunkStream::Fixed(stream) => stream.chunking_seconds(),
            ChunkStream::Failing(stream) => stream.chunking_seconds(),
        }
    }
}

impl<S: SparseSource> Iterator for ChunkStream<'_, S> {
    type Item = Result<ChunkData, ChunkerError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ChunkStream::Buzhash(stream) => stream.next(),
            ChunkStream::Fixed(stream) => stream.next(),
            ChunkStream::Failing(stream) => stream.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_buzhash_spec() {
        let params: ChunkerParams = "buzhash,19,23,21,4095".parse().unwrap();
        assert_eq!(params, ChunkerParams::default());
        let seeded: ChunkerParams = "buzhash,10,16,12,4095,7".parse().unwrap();
        assert_eq!(
            seeded,
            ChunkerParams::Buzhash {
                seed: 7,
                min_exp: 10,
                max_exp: 16,
                mask_bits: 12,
                window_size: 4095,
            }
        );
    }

    #[test]
    fn parses_fixed_and_fail_specs() {
        assert_eq!(
            "fixed,4194304".parse::<ChunkerParams>().unwrap(),
            ChunkerParams::Fixed {
                block_size: 4194304,
                header_size: 0,
                sparse: false,
            }
        );
        assert_eq!(
            "Fixed,4096,512".parse::<ChunkerParams>().unwrap().with_sparse(true),
            ChunkerParams::Fixed {
                block_size: 4096,
                header_size: 512,
                sparse: true,
            }
        );
        assert_eq!(
            "fail,4,RERR".parse::<ChunkerParams>().unwrap(),
            ChunkerParams::Failing {
                block_size: 4,
                schedule: "RERR".into(),
            }
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_specs() {
        assert!("gearcdc,1,2".parse::<ChunkerParams>().is_err());
        assert!("".parse::<ChunkerParams>().is_err());
        assert!("buzhash,19,23,21".parse::<ChunkerParams>().is_err());
        assert!("buzhash,19,23,21,4095,1,9".parse::<ChunkerParams>().is_err());
        assert!("fixed,notanumber".parse::<ChunkerParams>().is_err());
        assert!("fail,4".parse::<ChunkerParams>().is_err());
    }

    #[test]
    fn factory_validates_parameters() {
        assert!(get_chunker("buzhash,10,16,12,4095".parse().unwrap()).is_ok());
        // window + min + 1 exceeds max
        assert!(get_chunker(ChunkerParams::Buzhash {
            seed: 0,
            min_exp: 12,
            max_exp: 13,
            mask_bits: 12,
            window_size: 4096,
        })
        .is_err());
        assert!(get_chunker(ChunkerParams::Failing {
            block_size: 4,
            schedule: "RQ".into(),
        })
        .is_err());
    }
}
