use std::io::{self, Read};

use crate::errors::{Error, Result};
use crate::packet::MAX_PARTIAL_LEN;

/// Size of the buffering unit used for streaming copies and partial packet chunks.
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Reads from `source` until `buffer` is full or the source is exhausted.
///
/// Returns the number of bytes read, which is smaller than the buffer only at the end
/// of the stream.
pub(crate) fn fill_buffer<R: Read>(mut source: R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut offset = 0;
    while offset < buffer.len() {
        match source.read(&mut buffer[offset..]) {
            Ok(0) => break,
            Ok(read) => offset += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(offset)
}

/// Checks that a chunk size can be used as a partial body length.
pub(crate) fn validate_chunk_size(size: u32) -> Result<()> {
    let message = if size < 512 {
        "chunk size must be at least 512"
    } else if size > MAX_PARTIAL_LEN {
        "chunk size must be at most 2^30"
    } else if !size.is_power_of_two() {
        "chunk size must be a power of two"
    } else {
        return Ok(());
    };
    Err(Error::InvalidConfiguration {
        message: format!("{message}, got {size}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    #[test]
    fn test_fill_buffer_from_short_reads() {
        let mut buffer = [0u8; 4];
        let read = fill_buffer(Trickle(b"hello"), &mut buffer).unwrap();
        assert_eq!(read, 4);
        assert_eq!(&buffer, b"hell");

        let mut buffer = [0u8; 8];
        let read = fill_buffer(Trickle(b"hi"), &mut buffer).unwrap();
        assert_eq!(read, 2);
    }

    #[test]
    fn test_buffer_size_is_power_of_two() {
        assert!(BUFFER_SIZE.is_power_of_two());
        assert!(validate_chunk_size(BUFFER_SIZE as u32).is_ok());
        assert!(validate_chunk_size(256).is_err());
        assert!(validate_chunk_size(1000).is_err());
    }

    #[test]
    fn test_chunk_size_upper_bound() {
        assert!(validate_chunk_size(1 << 30).is_ok());
        let err = validate_chunk_size(1 << 31).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(
            validate_chunk_size(256).unwrap_err().kind(),
            ErrorKind::InvalidConfiguration
        );
    }
}
