#![no_main]
use std::io::Cursor;

use carver::BuzhashChunker;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut chunker = BuzhashChunker::new(0, 6, 10, 7, 16).unwrap();
    let mut reconstructed = Vec::with_capacity(data.len());
    for chunk in chunker.chunkify(Cursor::new(data)) {
        let chunk = chunk.unwrap();
        match chunk.payload {
            Some(payload) => reconstructed.extend_from_slice(&payload),
            None => reconstructed.extend(std::iter::repeat(0u8).take(chunk.size as usize)),
        }
    }
    assert_eq!(data, reconstructed.as_slice());
});
