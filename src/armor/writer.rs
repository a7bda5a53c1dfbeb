use std::hash::Hasher;
use std::io::{self, Write};

use base64::engine::{general_purpose::STANDARD, Engine as _};
use crc24::Crc24Hasher;

use crate::armor::BlockType;
use crate::errors::Result;
use crate::ser::Serialize;

/// Raw octets per armored line, giving 64 base64 characters.
const LINE_OCTETS: usize = 48;

/// Streaming armor encoder.
///
/// The header is written on construction, the checksum and footer by
/// [`ArmorWriter::finish`].
pub struct ArmorWriter<W: Write> {
    typ: BlockType,
    inner: W,
    crc: Crc24Hasher,
    buffer: Vec<u8>,
    line: [u8; 64],
}

impl<W: Write> ArmorWriter<W> {
    pub fn new(typ: BlockType, mut inner: W) -> Result<Self> {
        // write armor header
        inner.write_all(&b"-----BEGIN "[..])?;
        typ.to_writer(&mut inner)?;
        inner.write_all(&b"-----\n\n"[..])?;

        Ok(ArmorWriter {
            typ,
            inner,
            crc: Crc24Hasher::new(),
            buffer: Vec::with_capacity(LINE_OCTETS),
            line: [0u8; 64],
        })
    }

    fn write_line(&mut self) -> io::Result<()> {
        let n = STANDARD
            .encode_slice(&self.buffer, &mut self.line)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        self.inner.write_all(&self.line[..n])?;
        self.inner.write_all(b"\n")?;
        self.buffer.clear();
        Ok(())
    }

    /// Writes the remaining body, the checksum line and the footer.
    pub fn finish(mut self) -> Result<W> {
        if !self.buffer.is_empty() {
            self.write_line()?;
        }

        // write crc
        let crc = self.crc.finish() as u32;
        let crc_buf = [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8];
        self.inner.write_all(b"=")?;
        self.inner.write_all(STANDARD.encode(crc_buf).as_bytes())?;
        self.inner.write_all(b"\n")?;

        // write footer
        self.inner.write_all(&b"-----END "[..])?;
        self.typ.to_writer(&mut self.inner)?;
        self.inner.write_all(&b"-----\n"[..])?;
        self.inner.flush()?;

        Ok(self.inner)
    }
}

impl<W: Write> Write for ArmorWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.buffer.len() == LINE_OCTETS {
            self.write_line()?;
        }
        let n = buf.len().min(LINE_OCTETS - self.buffer.len());
        self.buffer.extend_from_slice(&buf[..n]);
        self.crc.write(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::armor::Dearmor;

    fn armor(data: &[u8]) -> String {
        let mut writer = ArmorWriter::new(BlockType::Message, Vec::new()).unwrap();
        writer.write_all(data).unwrap();
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_known_output() {
        assert_eq!(
            armor(b"hello world"),
            "-----BEGIN PGP MESSAGE-----\n\naGVsbG8gd29ybGQ=\n=sDy3\n-----END PGP MESSAGE-----\n"
        );
    }

    #[test]
    fn writes_no_doubleline() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        for i in (2..1024).step_by(7) {
            let buf: Vec<u8> = (0..i).map(|_| rng.gen()).collect();
            let armored = armor(&buf);
            let lines = armored.lines().collect::<Vec<_>>();

            assert_eq!(lines[0], "-----BEGIN PGP MESSAGE-----");
            assert!(
                !lines[lines.len() - 3].is_empty(),
                "last line must not be empty"
            );
            assert!(lines[2..lines.len() - 2].iter().all(|l| l.len() <= 64));
            assert_eq!(lines[lines.len() - 2].len(), 5);
            assert_eq!(lines[lines.len() - 1], "-----END PGP MESSAGE-----");

            let mut back = Vec::new();
            Dearmor::new(armored.as_bytes())
                .read_to_end(&mut back)
                .unwrap();
            assert_eq!(back, buf);
        }
    }
}
