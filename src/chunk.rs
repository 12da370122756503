use std::io;

/// Upper bound for `block_size` (fixed chunker) and `max_size`
/// (content-defined chunker), tied to the length of the zero buffer the
/// all-zero classifier compares against.
pub const MAX_BLOCK_SIZE: usize = 1 << 24; // 16 MiB

// Process-wide read-only zero run; lives in .bss, never written.
static ZEROS: [u8; MAX_BLOCK_SIZE] = [0u8; MAX_BLOCK_SIZE];

/// True iff every byte of `buf` is zero.
///
/// Compares in `MAX_BLOCK_SIZE` strides against the static zero buffer, so
/// inputs longer than one stride are still classified correctly.
pub fn is_all_zero(buf: &[u8]) -> bool {
    buf.chunks(MAX_BLOCK_SIZE).all(|part| part == &ZEROS[..part.len()])
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkerError {
    /// Failure from the underlying source, OS errno preserved.
    #[error("io_failed: {0}")]
    Io(#[from] io::Error),
    /// EOF accounting mismatch in the content-defined chunker. Indicates a
    /// bug, not a recoverable condition.
    #[error("eof_accounting_mismatch: read {read} bytes but yielded {yielded}")]
    Consistency { read: u64, yielded: u64 },
    /// Invalid construction parameters or spec string.
    #[error("invalid_chunker_config: {0}")]
    Config(String),
}

/// What a chunk represents in the reconstructed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// Non-zero content; a payload is attached.
    Data,
    /// A region inside a data range that turned out to be entirely zero.
    /// Stored without payload, reconstructed as `size` zero bytes.
    Alloc,
    /// A region inside a filesystem-level sparse hole. Never read, stored
    /// without payload.
    Hole,
}

impl ChunkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkKind::Data => "data",
            ChunkKind::Alloc => "alloc",
            ChunkKind::Hole => "hole",
        }
    }
}

/// One emitted chunk. The payload borrows the producing stream's internal
/// buffer and is valid until the next pull; callers that keep it longer copy
/// via [`Chunk::to_owned`].
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub kind: ChunkKind,
    pub size: u64,
    pub payload: Option<&'a [u8]>,
}

impl<'a> Chunk<'a> {
    /// Wrap a payload without classification. Used where the payload must be
    /// carried verbatim regardless of content.
    pub fn data(payload: &'a [u8]) -> Self {
        Chunk {
            kind: ChunkKind::Data,
            size: payload.len() as u64,
            payload: Some(payload),
        }
    }

    /// Classify a payload from a data range: all-zero regions become `Alloc`
    /// with the payload dropped, anything else is `Data`.
    pub fn classify(payload: &'a [u8]) -> Self {
        if is_all_zero(payload) {
            Chunk {
                kind: ChunkKind::Alloc,
                size: payload.len() as u64,
                payload: None,
            }
        } else {
            Chunk::data(payload)
        }
    }

    /// A chunk covering `size` bytes of a sparse hole.
    pub fn hole(size: u64) -> Self {
        Chunk {
            kind: ChunkKind::Hole,
            size,
            payload: None,
        }
    }

    pub fn to_owned(&self) -> ChunkData {
        ChunkData {
            kind: self.kind,
            size: self.size,
            payload: self.payload.map(<[u8]>::to_vec),
        }
    }
}

/// Owned counterpart of [`Chunk`], yielded by the `Iterator` adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    pub kind: ChunkKind,
    pub size: u64,
    pub payload: Option<Vec<u8>>,
}
