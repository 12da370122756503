//! Enumeration of data and hole regions of a seekable source.
//!
//! The enumerator drives `SEEK_DATA`/`SEEK_HOLE` where the platform offers
//! them, so holes are skipped rather than read. Sources that cannot report
//! holes either model an all-data file (in-memory cursors) or fail with
//! [`std::io::ErrorKind::Unsupported`], which callers treat as "disable
//! sparse handling and read everything".

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// One region of a sparse map: `[start, start + len)`, either backed by data
/// or inside a hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseRange {
    pub start: u64,
    pub len: u64,
    pub is_data: bool,
}

impl SparseRange {
    pub fn data(start: u64, len: u64) -> Self {
        SparseRange { start, len, is_data: true }
    }

    pub fn hole(start: u64, len: u64) -> Self {
        SparseRange { start, len, is_data: false }
    }
}

/// A byte source whose data and hole extents can be located.
///
/// `seek_data` and `seek_hole` mirror `lseek(2)` with `SEEK_DATA` /
/// `SEEK_HOLE`: they may move the stream position, return the located offset,
/// and report the "no such region at or past offset" outcome (`ENXIO`) as
/// `Ok(None)`. Every other failure surfaces as the underlying I/O error.
pub trait SparseSource: Read + Seek {
    /// Offset of the next data region at or after `offset`.
    fn seek_data(&mut self, offset: u64) -> io::Result<Option<u64>>;

    /// Offset of the next hole at or after `offset`. Regular files report an
    /// implicit hole at end of file.
    fn seek_hole(&mut self, offset: u64) -> io::Result<Option<u64>>;
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "macos"
))]
fn lseek_extent(file: &File, offset: u64, whence: libc::c_int) -> io::Result<Option<u64>> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe { libc::lseek(file.as_raw_fd(), offset as libc::off_t, whence) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ENXIO) {
            Ok(None)
        } else {
            Err(err)
        }
    } else {
        Ok(Some(rc as u64))
    }
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "macos"
))]
impl SparseSource for File {
    fn seek_data(&mut self, offset: u64) -> io::Result<Option<u64>> {
        lseek_extent(self, offset, libc::SEEK_DATA)
    }

    fn seek_hole(&mut self, offset: u64) -> io::Result<Option<u64>> {
        lseek_extent(self, offset, libc::SEEK_HOLE)
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "macos"
)))]
impl SparseSource for File {
    fn seek_data(&mut self, _offset: u64) -> io::Result<Option<u64>> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    fn seek_hole(&mut self, _offset: u64) -> io::Result<Option<u64>> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }
}

/// In-memory sources have no holes: everything up to the end is data, with
/// the implicit hole at end of buffer.
impl<T: AsRef<[u8]>> SparseSource for Cursor<T> {
    fn seek_data(&mut self, offset: u64) -> io::Result<Option<u64>> {
        let len = self.get_ref().as_ref().len() as u64;
        if offset >= len {
            return Ok(None);
        }
        self.set_position(offset);
        Ok(Some(offset))
    }

    fn seek_hole(&mut self, offset: u64) -> io::Result<Option<u64>> {
        let len = self.get_ref().as_ref().len() as u64;
        if offset >= len {
            return Ok(None);
        }
        self.set_position(len);
        Ok(Some(len))
    }
}

/// Enumerate the alternating data/hole ranges covering the source from its
/// current position to end of file.
///
/// The stream position is restored to where it was on every return path,
/// success or error. Zero-length ranges never appear in the result.
pub fn sparse_map<S: SparseSource + ?Sized>(src: &mut S) -> io::Result<Vec<SparseRange>> {
    let curr = src.stream_position()?;
    let result = enumerate(src, curr);
    let restore = src.seek(SeekFrom::Start(curr));
    match (result, restore) {
        (Ok(ranges), Ok(_)) => Ok(ranges),
        (Err(err), _) => Err(err),
        (Ok(_), Err(err)) => Err(err),
    }
}

fn enumerate<S: SparseSource + ?Sized>(src: &mut S, curr: u64) -> io::Result<Vec<SparseRange>> {
    let len = src.seek(SeekFrom::End(0))?;
    let mut ranges = Vec::new();
    let mut start = curr;
    while start < len {
        // End of the data region beginning at `start`; equals `start` when
        // `start` already sits inside a hole.
        let hole = match src.seek_hole(start)? {
            Some(offset) => offset,
            None => break,
        };
        if hole > start {
            ranges.push(SparseRange::data(start, hole - start));
        }
        match src.seek_data(hole)? {
            Some(data) => {
                if data > hole {
                    ranges.push(SparseRange::hole(hole, data - hole));
                }
                start = data;
            }
            None => {
                // No data past `hole`: the file ends inside a hole.
                if hole < len {
                    ranges.push(SparseRange::hole(hole, len - hole));
                }
                break;
            }
        }
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn assert_valid_map(map: &[SparseRange], from: u64, file_len: u64) {
        let mut expected_start = from;
        let mut last_is_data = None;
        for range in map {
            assert_eq!(range.start, expected_start, "ranges must be contiguous");
            assert!(range.len > 0, "zero-length ranges must be skipped");
            assert_ne!(last_is_data, Some(range.is_data), "ranges must alternate");
            last_is_data = Some(range.is_data);
            expected_start += range.len;
        }
        assert_eq!(expected_start, file_len, "ranges must cover up to EOF");
    }

    #[test]
    fn cursor_is_one_data_range() {
        let mut src = Cursor::new(vec![7u8; 1000]);
        let map = sparse_map(&mut src).unwrap();
        assert_eq!(map, vec![SparseRange::data(0, 1000)]);
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn cursor_map_starts_at_current_position() {
        let mut src = Cursor::new(vec![7u8; 1000]);
        src.set_position(100);
        let map = sparse_map(&mut src).unwrap();
        assert_eq!(map, vec![SparseRange::data(100, 900)]);
        assert_eq!(src.position(), 100, "position must be restored");
    }

    #[test]
    fn empty_cursor_has_empty_map() {
        let mut src = Cursor::new(Vec::<u8>::new());
        assert!(sparse_map(&mut src).unwrap().is_empty());
    }

    #[test]
    fn plain_file_map_covers_file() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0xabu8; 8192]).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        match sparse_map(&mut file) {
            Ok(map) => {
                assert_valid_map(&map, 0, 8192);
                assert_eq!(file.stream_position().unwrap(), 0);
            }
            // Filesystems without SEEK_HOLE support report EINVAL; the fixed
            // chunker falls back to non-sparse there, nothing to assert.
            Err(_) => {}
        }
    }

    #[test]
    fn punched_file_map_alternates_and_covers() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0x11u8; 4096]).unwrap();
        file.seek(SeekFrom::Start(64 * 1024)).unwrap();
        file.write_all(&[0x22u8; 4096]).unwrap();
        let len = file.seek(SeekFrom::End(0)).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        match sparse_map(&mut file) {
            Ok(map) => {
                // Whether the gap is reported as a hole depends on the
                // filesystem; coverage and alternation hold either way.
                assert_valid_map(&map, 0, len);
                assert_eq!(file.stream_position().unwrap(), 0);
            }
            Err(_) => {}
        }
    }
}
