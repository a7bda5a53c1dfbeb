use std::io::{self, Write};

use byteorder::WriteBytesExt;
use log::debug;

use crate::errors::Result;
use crate::types::{PacketLength, Tag};
use crate::util::validate_chunk_size;

/// Writes a packet whose length is not known up front.
///
/// The body is buffered one chunk at a time. Whenever more data follows a full chunk, the
/// chunk is emitted with a partial body length. [`PartialBodyWriter::finish`] writes the
/// remainder with a fixed length, so a body that fits one chunk becomes a plain fixed
/// length packet.
pub struct PartialBodyWriter<W: Write> {
    tag: Tag,
    chunk_size: usize,
    buffer: Vec<u8>,
    header_written: bool,
    inner: W,
}

impl<W: Write> PartialBodyWriter<W> {
    /// `chunk_size` must be a power of two and at least 512.
    pub fn new(tag: Tag, chunk_size: u32, inner: W) -> Result<Self> {
        validate_chunk_size(chunk_size)?;
        debug_assert!(tag.allows_partial_length());
        let chunk_size = chunk_size as usize;
        Ok(PartialBodyWriter {
            tag,
            chunk_size,
            buffer: Vec::with_capacity(chunk_size),
            header_written: false,
            inner,
        })
    }

    fn write_tag(&mut self) -> io::Result<()> {
        if !self.header_written {
            self.inner.write_u8(0b1100_0000 | u8::from(self.tag))?;
            self.header_written = true;
        }
        Ok(())
    }

    fn emit_chunk(&mut self) -> io::Result<()> {
        self.write_tag()?;
        PacketLength::Partial(self.chunk_size as u32)
            .to_writer_new(&mut self.inner)
            .map_err(|err| err.into_io())?;
        self.inner.write_all(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }

    /// Writes the final chunk and returns the inner writer.
    pub fn finish(mut self) -> Result<W> {
        self.write_tag()?;
        debug!("{:?}: final chunk of {} bytes", self.tag, self.buffer.len());
        PacketLength::Fixed(self.buffer.len().try_into()?).to_writer_new(&mut self.inner)?;
        self.inner.write_all(&self.buffer)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for PartialBodyWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.buffer.len() == self.chunk_size {
            self.emit_chunk()?;
        }
        let n = buf.len().min(self.chunk_size - self.buffer.len());
        self.buffer.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        // partial chunks must be full, nothing can be pushed early
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PacketBodyReader, PacketHeader};

    fn write_body(data: &[u8], chunk_size: u32) -> Vec<u8> {
        let mut writer = PartialBodyWriter::new(Tag::LiteralData, chunk_size, Vec::new()).unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap()
    }

    fn read_body(packet: &[u8]) -> Vec<u8> {
        let mut source = packet;
        let header = PacketHeader::try_from_reader(&mut source).unwrap().unwrap();
        let out = PacketBodyReader::new(header, &mut source)
            .read_to_vec()
            .unwrap();
        assert!(source.is_empty());
        out
    }

    #[test]
    fn test_small_body_is_fixed() {
        let packet = write_body(b"hello", 512);
        assert_eq!(packet, vec![0xCB, 0x05, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn test_empty_body() {
        let packet = write_body(b"", 512);
        assert_eq!(packet, vec![0xCB, 0x00]);
        assert!(read_body(&packet).is_empty());
    }

    #[test]
    fn test_exact_chunk_is_fixed() {
        let data = vec![7u8; 512];
        let packet = write_body(&data, 512);
        // fixed two octet length
        assert_eq!(&packet[..3], &[0xCB, 0xC1, 0x40]);
        assert_eq!(read_body(&packet), data);
    }

    #[test]
    fn test_partial_chunks() {
        let data: Vec<u8> = (0..1500u32).map(|i| i as u8).collect();
        let packet = write_body(&data, 512);
        assert_eq!(&packet[..2], &[0xCB, 0xE9]);
        assert_eq!(packet[2 + 512], 0xE9);
        assert_eq!(read_body(&packet), data);
    }

    #[test]
    fn test_invalid_chunk_size() {
        assert!(PartialBodyWriter::new(Tag::LiteralData, 256, Vec::new()).is_err());
        assert!(PartialBodyWriter::new(Tag::LiteralData, 1000, Vec::new()).is_err());
    }
}
