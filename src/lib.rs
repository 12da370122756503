//! # Carver
//!
//! Streaming chunking core for content-addressed backup.
//!
//! This crate splits a byte stream into a finite sequence of chunks suitable
//! for deduplication, encryption and storage as independent objects:
//! - **Buzhash** content-defined chunking with configurable size bounds and a
//!   per-repository boundary seed
//! - **Fixed-size** chunking with an optional header block and sparse-file
//!   support (holes are skipped, not read)
//! - **Fault-injection** chunking for testing recovery paths in callers
//!
//! Every chunk carries a kind (`data`, `alloc` for all-zero regions, `hole`
//! for sparse holes) and a size; a payload is attached only to `data` chunks,
//! so zero runs are never stored.
//!
//! ## Observability & Telemetry
//!
//! This crate uses the [`tracing`](https://docs.rs/tracing) ecosystem for
//! diagnostics and never installs a subscriber itself; install one in your
//! binary to see construction parameters and sparse-handling fallbacks.
//! Each chunk stream additionally accumulates the wall-clock time spent
//! producing chunks (`chunking_seconds`), which callers sum into their own
//! backup statistics.
//!
//! ## Example
//!
//! ```rust
//! use std::io::Cursor;
//! use carver::{get_chunker, ChunkerParams};
//!
//! let params: ChunkerParams = "buzhash,10,16,12,4095".parse().unwrap();
//! let mut chunker = get_chunker(params).unwrap();
//! let data = vec![0u8; 1024 * 1024];
//! let mut stream = chunker.chunkify(Cursor::new(data));
//! while let Some(chunk) = stream.next_chunk().unwrap() {
//!     println!("{} {}", chunk.kind.as_str(), chunk.size);
//! }
//! ```

pub mod buzhash;
pub mod chunk;
pub mod content;
pub mod factory;
pub mod failing;
pub mod fixed;
pub mod sparse;

pub use buzhash::{buzhash, buzhash_update, BuzhashTable};
pub use chunk::{is_all_zero, Chunk, ChunkData, ChunkKind, ChunkerError, MAX_BLOCK_SIZE};
pub use content::{BuzhashChunker, BuzhashStream};
pub use factory::{get_chunker, ChunkStream, Chunker, ChunkerParams};
pub use failing::{FailingChunker, FailingStream};
pub use fixed::{FixedChunker, FixedStream};
pub use sparse::{sparse_map, SparseRange, SparseSource};
