use std::io::{BufRead, Result};

use bytes::BytesMut;

pub trait BufReadParsing: BufRead + Sized {
    fn read_u8(&mut self) -> Result<u8> {
        let arr = self.read_array::<1>()?;
        Ok(arr[0])
    }

    fn read_be_u16(&mut self) -> Result<u16> {
        let arr = self.read_array::<2>()?;

        Ok(u16::from_be_bytes(arr))
    }

    fn read_be_u32(&mut self) -> Result<u32> {
        let arr = self.read_array::<4>()?;

        Ok(u32::from_be_bytes(arr))
    }

    fn has_remaining(&mut self) -> Result<bool> {
        let has_remaining = !self.fill_buf()?.is_empty();
        Ok(has_remaining)
    }

    fn read_array<const C: usize>(&mut self) -> Result<[u8; C]> {
        let mut arr = [0u8; C];
        let mut read = 0;

        while read < arr.len() {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                break;
            }

            let available = (arr.len() - read).min(buf.len());
            arr[read..read + available].copy_from_slice(&buf[..available]);
            read += available;
            self.consume(available);
        }
        if read != arr.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "no more data available",
            ));
        }

        Ok(arr)
    }

    fn take_bytes(&mut self, size: usize) -> Result<BytesMut> {
        // Sizes come from untrusted headers, grow only as data arrives.
        let mut arr = BytesMut::with_capacity(size.min(1024));

        while arr.len() < size {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                break;
            }

            let available = (size - arr.len()).min(buf.len());
            arr.extend_from_slice(&buf[..available]);
            self.consume(available);
        }

        if arr.len() != size {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "no more data available",
            ));
        }

        Ok(arr)
    }

    /// Drain the data in this reader, to make sure all is consumed.
    /// Returns how many bytes have been drained
    fn drain(&mut self) -> Result<u64> {
        let mut out = std::io::sink();
        let copied = std::io::copy(self, &mut out)?;
        Ok(copied)
    }
}

impl<B: BufRead> BufReadParsing for B {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_bytes_short() {
        let mut input = &[1u8, 2, 3][..];
        let err = input.take_bytes(4).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_across_chunks() {
        let data = [0u8, 0, 1, 2, 9, 9];
        let mut input = std::io::BufReader::with_capacity(1, &data[..]);
        assert_eq!(input.read_be_u32().unwrap(), 0x0102);
        assert!(input.has_remaining().unwrap());
        assert_eq!(input.drain().unwrap(), 2);
        assert!(!input.has_remaining().unwrap());
    }
}
