use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::{Error, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;

/// Format of the literal payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
    Utf8 = b'u',
    /// Local mode, as some old implementations write.
    Local = b'l',
    #[num_enum(catch_all)]
    Other(u8),
}

/// The part of a literal data packet that precedes the payload.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.9>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct LiteralDataHeader {
    mode: DataMode,
    #[debug("{}", String::from_utf8_lossy(file_name))]
    file_name: Bytes,
    created: DateTime<Utc>,
}

impl LiteralDataHeader {
    /// Creates a binary header.
    ///
    /// File names longer than 255 bytes are truncated, times outside the 32 bit
    /// timestamp range are clamped to it.
    pub fn new_binary(file_name: &str, created: DateTime<Utc>) -> Self {
        let mut name = file_name.as_bytes();
        if name.len() > 255 {
            name = &name[..255];
        }
        LiteralDataHeader {
            mode: DataMode::Binary,
            file_name: Bytes::copy_from_slice(name),
            created: clamp_timestamp(created),
        }
    }

    /// Reads the header, leaving `r` positioned at the start of the payload.
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Self> {
        let mode = r.read_u8().map_err(Error::from_read)?.into();
        let name_len = r.read_u8().map_err(Error::from_read)?;
        let file_name = r
            .take_bytes(name_len.into())
            .map_err(Error::from_read)?
            .freeze();
        let created = r.read_be_u32().map_err(Error::from_read)?;
        let created = Utc
            .timestamp_opt(created.into(), 0)
            .single()
            .ok_or_else(|| Error::UnexpectedFormat {
                message: "invalid literal data timestamp".into(),
            })?;

        Ok(LiteralDataHeader {
            mode,
            file_name,
            created,
        })
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    /// The raw file name. Not necessarily valid UTF-8.
    pub fn file_name(&self) -> &[u8] {
        &self.file_name
    }

    pub fn created(&self) -> &DateTime<Utc> {
        &self.created
    }
}

/// Limits a time to what fits into a packet timestamp, dropping subseconds.
pub(crate) fn clamp_timestamp(time: DateTime<Utc>) -> DateTime<Utc> {
    let secs = time.timestamp().clamp(0, u32::MAX.into());
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

impl Serialize for LiteralDataHeader {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.mode.into())?;
        writer.write_u8(self.file_name.len().try_into()?)?;
        writer.write_all(&self.file_name)?;
        writer.write_u32::<BigEndian>(self.created.timestamp().try_into()?)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + self.file_name.len() + 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_out_of_range() {
        let before_epoch = Utc.timestamp_opt(-315_360_000, 0).unwrap();
        let header = LiteralDataHeader::new_binary("old.txt", before_epoch);
        assert_eq!(header.created().timestamp(), 0);
        assert!(header.to_bytes().is_ok());

        let far_future = Utc.timestamp_opt(5_000_000_000, 0).unwrap();
        let header = LiteralDataHeader::new_binary("new.txt", far_future);
        assert_eq!(header.created().timestamp(), i64::from(u32::MAX));
        let bytes = header.to_bytes().unwrap();
        assert_eq!(&bytes[bytes.len() - 4..], &[0xff; 4]);
    }

    #[test]
    fn test_header_roundtrip() {
        let created = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let header = LiteralDataHeader::new_binary("plain.txt", created);
        let mut bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), header.write_len());
        assert_eq!(&bytes[..11], b"b\x09plain.txt");
        bytes.extend_from_slice(b"payload");

        let mut r = &bytes[..];
        let back = LiteralDataHeader::try_from_reader(&mut r).unwrap();
        assert_eq!(back, header);
        assert_eq!(back.mode(), DataMode::Binary);
        assert_eq!(r, b"payload");
    }

    #[test]
    fn test_long_name_truncated() {
        let name = "x".repeat(300);
        let header = LiteralDataHeader::new_binary(&name, Utc::now());
        assert_eq!(header.file_name().len(), 255);
        assert!(header.to_bytes().is_ok());
    }

    #[test]
    fn test_truncated_header() {
        let err = LiteralDataHeader::try_from_reader(&b"b\x05ab"[..]).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::UnexpectedFormat);
    }
}
