use std::io::{self, BufRead};

use byteorder::WriteBytesExt;
use log::debug;

use crate::errors::{ensure, Error, Result};
use crate::parsing_reader::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, PacketLength, Tag};

/// Maximum size of partial packet length.
pub(crate) const MAX_PARTIAL_LEN: u32 = 2u32.pow(30);

/// Represents a packet header.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-4.2>
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    version: PacketHeaderVersion,
    tag: Tag,
    length: PacketLength,
}

impl PacketHeader {
    /// Reads a single packet header.
    ///
    /// Returns `None` if the reader is exhausted before the first octet.
    pub fn try_from_reader<R: BufRead>(mut r: R) -> Result<Option<Self>> {
        if !r.has_remaining().map_err(Error::from_read)? {
            return Ok(None);
        }
        let header = r.read_u8().map_err(Error::from_read)?;

        let parsed = match header & 0b1100_0000 {
            0b1100_0000 => {
                // new starts with 0b11
                let tag = Tag::from(header & 0b0011_1111);
                let length = PacketLength::try_from_reader(&mut r).map_err(Error::from_read)?;
                PacketHeader {
                    version: PacketHeaderVersion::New,
                    tag,
                    length,
                }
            }
            0b1000_0000 => {
                // old starts with 0b10
                let tag = Tag::from((header >> 2) & 0b0000_1111);
                let length = match header & 0b0000_0011 {
                    // One-Octet Lengths
                    0 => PacketLength::Fixed(r.read_u8().map_err(Error::from_read)?.into()),
                    // Two-Octet Lengths
                    1 => PacketLength::Fixed(r.read_be_u16().map_err(Error::from_read)?.into()),
                    // Four-Octet Lengths
                    2 => PacketLength::Fixed(r.read_be_u32().map_err(Error::from_read)?),
                    _ => PacketLength::Indeterminate,
                };
                PacketHeader {
                    version: PacketHeaderVersion::Old,
                    tag,
                    length,
                }
            }
            _ => {
                return Err(Error::UnexpectedFormat {
                    message: format!("not an OpenPGP packet header: {header:#010b}"),
                });
            }
        };

        debug!("read packet header {:?}", parsed);
        Ok(Some(parsed))
    }

    pub fn from_parts(version: PacketHeaderVersion, tag: Tag, length: PacketLength) -> Result<Self> {
        match version {
            PacketHeaderVersion::Old => {
                ensure!(
                    u8::from(tag) < 16,
                    "tag is not compatible with old packet headers: {:?}",
                    tag
                );
                ensure!(
                    !matches!(length, PacketLength::Partial(_)),
                    "partial lengths are only supported in new style headers"
                );
            }
            PacketHeaderVersion::New => {
                ensure!(
                    !matches!(length, PacketLength::Indeterminate),
                    "indeterminate packet length is only supported in old style headers"
                );
                if let PacketLength::Partial(l) = length {
                    ensure!(l.is_power_of_two(), "partial length must be a power of two");
                    ensure!(
                        l <= MAX_PARTIAL_LEN,
                        "partial length must be less or equal than {}",
                        MAX_PARTIAL_LEN
                    );
                }
            }
        }

        Ok(PacketHeader {
            version,
            tag,
            length,
        })
    }

    /// Creates a `New` style packet header.
    pub fn new_fixed(tag: Tag, length: u32) -> Self {
        PacketHeader {
            version: PacketHeaderVersion::New,
            tag,
            length: PacketLength::Fixed(length),
        }
    }

    pub fn version(&self) -> PacketHeaderVersion {
        self.version
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn packet_length(&self) -> PacketLength {
        self.length
    }
}

impl Serialize for PacketHeader {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let tag = u8::from(self.tag);
        match (self.version, self.length) {
            (PacketHeaderVersion::New, length) => {
                writer.write_u8(0b1100_0000 | tag)?;
                length.to_writer_new(writer)?;
            }
            (PacketHeaderVersion::Old, PacketLength::Fixed(len)) => {
                PacketHeaderVersion::Old.write_header(writer, self.tag, len.try_into()?)?;
            }
            (PacketHeaderVersion::Old, PacketLength::Indeterminate) => {
                writer.write_u8(0b1000_0011 | (tag << 2))?;
            }
            (PacketHeaderVersion::Old, PacketLength::Partial(_)) => {
                return Err(Error::Message {
                    message: "partial lengths are only supported in new style headers".into(),
                });
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match (self.version, self.length) {
            (PacketHeaderVersion::New, PacketLength::Fixed(len)) => {
                1 + PacketLength::fixed_encoding_len(len)
            }
            (PacketHeaderVersion::Old, PacketLength::Fixed(len)) => {
                PacketHeaderVersion::Old.header_len(len as usize)
            }
            _ => 2,
        }
    }
}

/// Writes `body` as a complete packet with a new style fixed length header.
pub fn write_packet<W: io::Write>(writer: &mut W, tag: Tag, body: &impl Serialize) -> Result<()> {
    let len = body.write_len();
    PacketHeader::new_fixed(tag, len.try_into()?).to_writer(writer)?;
    body.to_writer(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_old_indeterminate() {
        // compressed data as written by GnuPG
        let header = PacketHeader::try_from_reader(&[0xA3, 0x02][..])
            .unwrap()
            .unwrap();
        assert_eq!(header.tag(), Tag::CompressedData);
        assert_eq!(header.version(), PacketHeaderVersion::Old);
        assert_eq!(header.packet_length(), PacketLength::Indeterminate);
        assert_eq!(header.to_bytes().unwrap(), vec![0xA3]);
    }

    #[test]
    fn test_old_two_octets() {
        let header = PacketHeader::try_from_reader(&[0x99, 0x01, 0x0D][..])
            .unwrap()
            .unwrap();
        assert_eq!(header.tag(), Tag::PublicKey);
        assert_eq!(header.packet_length(), PacketLength::Fixed(269));
        assert_eq!(header.to_bytes().unwrap(), vec![0x99, 0x01, 0x0D]);
    }

    #[test]
    fn test_new_partial() {
        let header = PacketHeader::try_from_reader(&[0xCB, 0xE9][..])
            .unwrap()
            .unwrap();
        assert_eq!(header.tag(), Tag::LiteralData);
        assert_eq!(header.packet_length(), PacketLength::Partial(512));
    }

    #[test]
    fn test_eof_and_garbage() {
        assert!(PacketHeader::try_from_reader(&[][..]).unwrap().is_none());
        let err = PacketHeader::try_from_reader(&[0x12, 0x00][..]).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::UnexpectedFormat);
        // truncated length
        assert!(PacketHeader::try_from_reader(&[0xC2][..]).is_err());
    }

    #[test]
    fn test_from_parts_validation() {
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::Old,
            Tag::LiteralData,
            PacketLength::Partial(512)
        )
        .is_err());
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::New,
            Tag::LiteralData,
            PacketLength::Partial(513)
        )
        .is_err());
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::Old,
            Tag::UserAttribute,
            PacketLength::Fixed(1)
        )
        .is_err());
    }

    proptest! {
        #[test]
        fn header_roundtrip(version: PacketHeaderVersion, tag: Tag, len in 0u32..100_000) {
            prop_assume!(version == PacketHeaderVersion::New || u8::from(tag) < 16);
            let header = PacketHeader::from_parts(version, tag, PacketLength::Fixed(len)).unwrap();
            let bytes = header.to_bytes().unwrap();
            prop_assert_eq!(bytes.len(), header.write_len());
            let back = PacketHeader::try_from_reader(&bytes[..]).unwrap().unwrap();
            prop_assert_eq!(back, header);
        }
    }
}
