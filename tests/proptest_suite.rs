use std::io::{Cursor, Read};

use proptest::prelude::*;

use carver::{buzhash, buzhash_update, BuzhashChunker, ChunkKind, FixedChunker};

/// Caps every read at `limit` bytes.
struct ShortReads<R> {
    inner: R,
    limit: usize,
}

impl<R: Read> Read for ShortReads<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.limit);
        self.inner.read(&mut buf[..n])
    }
}

// min 64, max 1024, avg ~128, window 16: small enough that arbitrary inputs
// exercise every path, including the max-size bound.
fn small_chunker(seed: u32) -> BuzhashChunker {
    BuzhashChunker::new(seed, 6, 10, 7, 16).unwrap()
}

proptest! {
    #[test]
    fn rolling_update_matches_full_hash(
        data in proptest::collection::vec(any::<u8>(), 65..256),
        window in 4usize..=64,
        seed in any::<u32>(),
    ) {
        let mut sum = buzhash(&data[..window], seed);
        for offset in 0..data.len() - window {
            sum = buzhash_update(sum, data[offset], data[offset + window], window, seed);
            prop_assert_eq!(sum, buzhash(&data[offset + 1..offset + 1 + window], seed));
        }
    }

    #[test]
    fn chunks_reconstruct_and_respect_bounds(
        data in proptest::collection::vec(any::<u8>(), 0..32_768),
        seed in any::<u32>(),
    ) {
        let mut chunker = small_chunker(seed);
        let chunks: Vec<_> = chunker
            .chunkify(Cursor::new(data.clone()))
            .collect::<Result<_, _>>()
            .unwrap();

        let mut rebuilt = Vec::with_capacity(data.len());
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert!(chunk.size <= 1024);
            if i + 1 < chunks.len() {
                prop_assert!(chunk.size >= 64, "non-final chunk below minimum");
            }
            match &chunk.payload {
                Some(payload) => {
                    prop_assert_eq!(chunk.kind, ChunkKind::Data);
                    prop_assert_eq!(payload.len() as u64, chunk.size);
                    prop_assert!(payload.iter().any(|&b| b != 0));
                    rebuilt.extend_from_slice(payload);
                }
                None => {
                    prop_assert_eq!(chunk.kind, ChunkKind::Alloc);
                    rebuilt.extend(std::iter::repeat(0u8).take(chunk.size as usize));
                }
            }
        }
        prop_assert_eq!(rebuilt, data);
    }

    #[test]
    fn boundaries_ignore_read_granularity(
        data in proptest::collection::vec(any::<u8>(), 1..16_384),
        limit in 1usize..=64,
    ) {
        let mut chunker = small_chunker(0);
        let whole: Vec<u64> = chunker
            .chunkify(Cursor::new(data.clone()))
            .map(|c| c.unwrap().size)
            .collect();
        let dribbled: Vec<u64> = chunker
            .chunkify(ShortReads { inner: Cursor::new(data), limit })
            .map(|c| c.unwrap().size)
            .collect();
        prop_assert_eq!(whole, dribbled);
    }

    #[test]
    fn fixed_chunks_cover_input_and_classify_zeros(
        data in proptest::collection::vec(any::<u8>(), 0..16_384),
        block in 1usize..=4096,
    ) {
        let mut chunker = FixedChunker::new(block, 0, false).unwrap();
        let chunks: Vec<_> = chunker
            .chunkify(Cursor::new(data.clone()), None)
            .collect::<Result<_, _>>()
            .unwrap();

        let mut offset = 0usize;
        for chunk in &chunks {
            let size = chunk.size as usize;
            let source = &data[offset..offset + size];
            match chunk.kind {
                ChunkKind::Alloc => prop_assert!(source.iter().all(|&b| b == 0)),
                ChunkKind::Data => {
                    prop_assert_eq!(chunk.payload.as_deref(), Some(source));
                    prop_assert!(source.iter().any(|&b| b != 0));
                }
                ChunkKind::Hole => prop_assert!(false, "no holes without a sparse map"),
            }
            offset += size;
        }
        prop_assert_eq!(offset, data.len());
    }
}
