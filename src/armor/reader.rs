use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hasher;
use std::io::{self, BufRead, Read};

use base64::engine::{general_purpose::STANDARD, Engine as _};
use crc24::Crc24Hasher;
use log::debug;

use crate::errors::{Error, Result};
use crate::ser::Serialize;

/// Armor block types used by OpenPGP.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BlockType {
    PublicKey,
    PrivateKey,
    Message,
    Signature,
    // gnupgp extension
    File,
}

impl BlockType {
    fn from_label(label: &str) -> Option<Self> {
        let typ = match label {
            "PGP PUBLIC KEY BLOCK" => BlockType::PublicKey,
            "PGP PRIVATE KEY BLOCK" | "PGP SECRET KEY BLOCK" => BlockType::PrivateKey,
            "PGP MESSAGE" => BlockType::Message,
            "PGP SIGNATURE" => BlockType::Signature,
            "PGP ARMORED FILE" => BlockType::File,
            _ => return None,
        };
        Some(typ)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::PublicKey => f.write_str("PGP PUBLIC KEY BLOCK"),
            BlockType::PrivateKey => f.write_str("PGP PRIVATE KEY BLOCK"),
            BlockType::Message => f.write_str("PGP MESSAGE"),
            BlockType::Signature => f.write_str("PGP SIGNATURE"),
            BlockType::File => f.write_str("PGP ARMORED FILE"),
        }
    }
}

impl Serialize for BlockType {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        write!(w, "{self}")?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        // allocates, but this is tiny, should be fine
        self.to_string().len()
    }
}

/// Returns true if the input starts, after optional whitespace, with an armor header line.
///
/// Binary OpenPGP data always starts with an octet that has the high bit set, so looking at
/// the first non whitespace octet is enough.
pub fn is_armored<R: BufRead>(r: &mut R) -> io::Result<bool> {
    loop {
        let buf = r.fill_buf()?;
        if buf.is_empty() {
            return Ok(false);
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(pos) => {
                let first = buf[pos];
                r.consume(pos);
                return Ok(first == b'-');
            }
            None => {
                let len = buf.len();
                r.consume(len);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Header,
    Body,
    Done,
}

/// Streaming decoder for a single armored block.
///
/// Lines before the `BEGIN` line are skipped. The CRC24 checksum is verified when present.
/// After the `END` line the reader reports end of input, [`Dearmor::into_inner`] gives access
/// to whatever follows, for example another armored block.
pub struct Dearmor<R: BufRead> {
    inner: R,
    part: Part,
    typ: Option<BlockType>,
    headers: BTreeMap<String, Vec<String>>,
    /// base64 characters not yet decoded, always less than four
    pending: String,
    /// decoded octets not yet handed out
    decoded: Vec<u8>,
    decoded_pos: usize,
    crc: Crc24Hasher,
    checksum: Option<u32>,
    line: String,
}

impl<R: BufRead> Dearmor<R> {
    pub fn new(inner: R) -> Self {
        Dearmor {
            inner,
            part: Part::Header,
            typ: None,
            headers: BTreeMap::new(),
            pending: String::new(),
            decoded: Vec::new(),
            decoded_pos: 0,
            crc: Crc24Hasher::new(),
            checksum: None,
            line: String::new(),
        }
    }

    /// The block type, available once the header was read.
    pub fn typ(&self) -> Option<BlockType> {
        self.typ
    }

    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads the header line and the armor headers, if not done yet.
    pub fn read_header(&mut self) -> Result<BlockType> {
        if let Some(typ) = self.typ {
            return Ok(typ);
        }
        let typ = loop {
            if !self.next_line()? {
                return Err(Error::InvalidArmorWrappers);
            }
            let line = self.line.trim_end();
            if let Some(label) = line
                .strip_prefix("-----BEGIN ")
                .and_then(|l| l.strip_suffix("-----"))
            {
                break BlockType::from_label(label).ok_or_else(|| Error::UnexpectedFormat {
                    message: format!("unknown armor block type {label:?}"),
                })?;
            }
        };
        debug!("armor block {typ}");
        self.typ = Some(typ);
        self.part = Part::Body;

        // armor headers, terminated by an empty line
        loop {
            if !self.next_line()? {
                return Err(Error::InvalidArmorWrappers);
            }
            let line = self.line.trim_end().to_string();
            if line.is_empty() {
                break;
            }
            match line.split_once(": ") {
                Some((key, value)) => {
                    self.headers
                        .entry(key.to_string())
                        .or_default()
                        .push(value.to_string());
                }
                None => {
                    // no header section, this is already body
                    self.body_line(&line)?;
                    break;
                }
            }
        }

        Ok(typ)
    }

    fn next_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self
            .inner
            .read_line(&mut self.line)
            .map_err(Error::from_read)?;
        Ok(n > 0)
    }

    /// Handles one line of the body. Returns false once the footer was reached.
    fn body_line(&mut self, line: &str) -> Result<bool> {
        if let Some(label) = line
            .strip_prefix("-----END ")
            .and_then(|l| l.strip_suffix("-----"))
        {
            self.finish_body(label)?;
            return Ok(false);
        }
        if let Some(sum) = line.strip_prefix('=') {
            let raw = STANDARD.decode(sum)?;
            if let [a, b, c] = raw[..] {
                self.checksum = Some((u32::from(a) << 16) | (u32::from(b) << 8) | u32::from(c));
                return Ok(true);
            }
            return Err(Error::InvalidChecksum);
        }

        self.pending.extend(line.chars().filter(|c| !c.is_ascii_whitespace()));
        let usable = self.pending.len() - self.pending.len() % 4;
        if usable > 0 {
            let out = STANDARD.decode(&self.pending[..usable])?;
            self.crc.write(&out);
            self.decoded.extend_from_slice(&out);
            self.pending.drain(..usable);
        }
        Ok(true)
    }

    fn finish_body(&mut self, label: &str) -> Result<()> {
        if !self.pending.is_empty() {
            return Err(Error::UnexpectedFormat {
                message: "armor body is not a multiple of four base64 characters".into(),
            });
        }
        if BlockType::from_label(label) != self.typ {
            return Err(Error::InvalidArmorWrappers);
        }
        if let Some(expected) = self.checksum {
            let actual = self.crc.finish() as u32;
            if expected != actual {
                debug!("armor checksum {expected:06x} != {actual:06x}");
                return Err(Error::InvalidChecksum);
            }
        }
        self.part = Part::Done;
        Ok(())
    }

    /// Decodes more body lines until there is output or the block ends.
    fn fill(&mut self) -> Result<()> {
        if self.part == Part::Header {
            self.read_header()?;
        }
        while self.decoded_pos == self.decoded.len() && self.part == Part::Body {
            self.decoded.clear();
            self.decoded_pos = 0;
            if !self.next_line()? {
                return Err(Error::InvalidArmorWrappers);
            }
            let line = std::mem::take(&mut self.line);
            let more = self.body_line(line.trim_end());
            self.line = line;
            if !more? {
                break;
            }
        }
        Ok(())
    }
}

impl<R: BufRead> Read for Dearmor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill().map_err(Error::into_io)?;
        let available = &self.decoded[self.decoded_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.decoded_pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    const SMALL: &str = "-----BEGIN PGP MESSAGE-----\nVersion: test\nComment: one\nComment: two\n\naGVsbG8gd29y\nbGQ=\n=sDy3\n-----END PGP MESSAGE-----\n";

    fn dearmor(input: &str) -> Result<Vec<u8>> {
        let mut reader = Dearmor::new(input.as_bytes());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).map_err(Error::from_read)?;
        Ok(out)
    }

    #[test]
    fn test_small_with_headers() {
        let mut reader = Dearmor::new(SMALL.as_bytes());
        assert_eq!(reader.read_header().unwrap(), BlockType::Message);
        assert_eq!(reader.headers()["Comment"], vec!["one", "two"]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn test_bad_checksum() {
        let input = SMALL.replace("=sDy3", "=sDy4");
        assert_eq!(dearmor(&input).unwrap_err().kind(), ErrorKind::UnexpectedFormat);
    }

    #[test]
    fn test_mismatched_footer() {
        let input = SMALL.replace("END PGP MESSAGE", "END PGP SIGNATURE");
        assert!(matches!(
            dearmor(&input).unwrap_err(),
            Error::InvalidArmorWrappers
        ));
    }

    #[test]
    fn test_truncated() {
        let input = &SMALL[..SMALL.len() - 30];
        assert!(dearmor(input).is_err());
    }

    #[test]
    fn test_leading_text_and_crlf() {
        let input = format!("some text\r\n\r\n{}", SMALL.replace('\n', "\r\n"));
        assert_eq!(dearmor(&input).unwrap(), b"hello world");
    }

    #[test]
    fn test_consecutive_blocks() {
        let input = format!("{SMALL}\n{SMALL}");
        let mut source = input.as_bytes();
        for _ in 0..2 {
            assert!(is_armored(&mut source).unwrap());
            let mut reader = Dearmor::new(&mut source);
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            assert_eq!(out, b"hello world");
        }
        assert!(!is_armored(&mut source).unwrap());
    }

    #[test]
    fn test_binary_is_not_armored() {
        let mut source = &[0x99u8, 0x01, 0x0d][..];
        assert!(!is_armored(&mut source).unwrap());
        // nothing consumed
        assert_eq!(source.len(), 3);
    }
}
