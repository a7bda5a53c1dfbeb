use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, TimeZone, Utc};

use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyFlags, KeyId};

const CREATION_TIME: u8 = 2;
const ISSUER: u8 = 16;
const KEY_FLAGS: u8 = 27;
const SIGNERS_USER_ID: u8 = 28;
const ISSUER_FINGERPRINT: u8 = 33;

/// Length encoding of a subpacket, kept as found so hashed areas re-serialize exactly.
///
/// Ref <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.1>
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum SubpacketLength {
    /// 1 byte encoding, must be less than `192`.
    One(#[cfg_attr(test, proptest(strategy = "0u8..=191"))] u8),
    /// 2 byte encoding
    Two(#[cfg_attr(test, proptest(strategy = "192u16..=16319"))] u16),
    /// 5 byte encoding
    Five(#[cfg_attr(test, proptest(strategy = "0u32..100_000"))] u32),
}

impl SubpacketLength {
    /// Parses a subpacket length from the given buffer.
    pub(crate) fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let olen = i.read_u8()?;
        let len = match olen {
            // One-Octet Lengths
            0..=191 => Self::One(olen),
            // Two-Octet Lengths
            192..=254 => {
                let a = i.read_u8()?;
                let l = ((u16::from(olen) - 192) << 8) + 192 + u16::from(a);
                Self::Two(l)
            }
            255 => Self::Five(i.read_be_u32()?),
        };
        Ok(len)
    }

    /// Encodes the given length into a minimal version
    pub(crate) fn encode(len: u32) -> Self {
        match len {
            0..=191 => Self::One(len as u8),
            192..=16319 => Self::Two(len as u16),
            _ => Self::Five(len),
        }
    }

    /// The encoded length value: type octet plus body.
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::One(l) => usize::from(*l),
            Self::Two(l) => usize::from(*l),
            Self::Five(l) => *l as usize,
        }
    }
}

impl Serialize for SubpacketLength {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::One(l) => writer.write_u8(*l)?,
            Self::Two(l) => {
                let l = l - 192;
                writer.write_u8(((l >> 8) + 192) as u8)?;
                writer.write_u8((l & 0xFF) as u8)?;
            }
            Self::Five(l) => {
                writer.write_u8(255)?;
                writer.write_u32::<BigEndian>(*l)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Two(_) => 2,
            Self::Five(_) => 5,
        }
    }
}

/// Content of a signature subpacket.
///
/// Only the subpackets this crate reads or writes are typed, everything else is carried
/// through untouched.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum SubpacketData {
    /// The time the signature was made.
    SignatureCreationTime(DateTime<Utc>),
    /// The OpenPGP Key ID of the key issuing the signature.
    Issuer(KeyId),
    KeyFlags(#[debug("{}", hex::encode(_0))] Bytes),
    SignersUserID(#[debug("{:?}", String::from_utf8_lossy(_0))] Bytes),
    IssuerFingerprint(u8, #[debug("{}", hex::encode(_1))] Bytes),
    Other(u8, #[debug("{}", hex::encode(_1))] Bytes),
}

impl SubpacketData {
    fn typ(&self) -> u8 {
        match self {
            Self::SignatureCreationTime(_) => CREATION_TIME,
            Self::Issuer(_) => ISSUER,
            Self::KeyFlags(_) => KEY_FLAGS,
            Self::SignersUserID(_) => SIGNERS_USER_ID,
            Self::IssuerFingerprint(..) => ISSUER_FINGERPRINT,
            Self::Other(typ, _) => *typ,
        }
    }

    fn from_parts(typ: u8, mut body: Bytes) -> Self {
        match (typ, body.len()) {
            (CREATION_TIME, 4) => {
                let ts = body.get_u32();
                match Utc.timestamp_opt(ts.into(), 0).single() {
                    Some(created) => Self::SignatureCreationTime(created),
                    None => Self::Other(typ, Bytes::copy_from_slice(&ts.to_be_bytes())),
                }
            }
            (ISSUER, 8) => {
                let mut id = [0u8; 8];
                body.copy_to_slice(&mut id);
                Self::Issuer(KeyId::from(id))
            }
            (KEY_FLAGS, _) => Self::KeyFlags(body),
            (SIGNERS_USER_ID, _) => Self::SignersUserID(body),
            (ISSUER_FINGERPRINT, 1..) => {
                let version = body.get_u8();
                Self::IssuerFingerprint(version, body)
            }
            _ => Self::Other(typ, body),
        }
    }
}

impl Serialize for SubpacketData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::SignatureCreationTime(created) => {
                writer.write_u32::<BigEndian>(created.timestamp().try_into()?)?;
            }
            Self::Issuer(id) => writer.write_all(id.as_ref())?,
            Self::KeyFlags(data) | Self::SignersUserID(data) | Self::Other(_, data) => {
                writer.write_all(data)?;
            }
            Self::IssuerFingerprint(version, data) => {
                writer.write_u8(*version)?;
                writer.write_all(data)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::SignatureCreationTime(_) => 4,
            Self::Issuer(_) => 8,
            Self::KeyFlags(data) | Self::SignersUserID(data) | Self::Other(_, data) => data.len(),
            Self::IssuerFingerprint(_, data) => 1 + data.len(),
        }
    }
}

/// Signature subpacket.
///
/// Ref <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.3.1>
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Subpacket {
    pub is_critical: bool,
    pub data: SubpacketData,
    pub len: SubpacketLength,
}

impl Subpacket {
    /// Construct a new regular subpacket.
    pub fn regular(data: SubpacketData) -> Result<Self> {
        let raw_len = (data.write_len() + 1).try_into()?;
        Ok(Subpacket {
            is_critical: false,
            data,
            len: SubpacketLength::encode(raw_len),
        })
    }

    /// Parses a complete subpacket area.
    pub fn parse_area(mut area: Bytes) -> Result<Vec<Self>> {
        let mut packets = Vec::new();
        while area.has_remaining() {
            let len = SubpacketLength::from_buf(&mut area)?;
            let mut body = area.read_take(len.len())?;
            let typ = body.read_u8()?;
            packets.push(Subpacket {
                is_critical: typ & 0x80 != 0,
                data: SubpacketData::from_parts(typ & 0x7F, body),
                len,
            });
        }
        Ok(packets)
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        match &self.data {
            SubpacketData::SignatureCreationTime(created) => Some(created),
            _ => None,
        }
    }

    /// The issuer, either given directly or as the low bits of a V4 fingerprint.
    pub fn issuer(&self) -> Option<KeyId> {
        match &self.data {
            SubpacketData::Issuer(id) => Some(*id),
            SubpacketData::IssuerFingerprint(4, fp) if fp.len() == 20 => {
                let mut raw = [0u8; 20];
                raw.copy_from_slice(fp);
                Some(Fingerprint::new(raw).key_id())
            }
            _ => None,
        }
    }

    pub fn key_flags(&self) -> Option<KeyFlags> {
        match &self.data {
            SubpacketData::KeyFlags(flags) => Some(KeyFlags::from_bytes(flags)),
            _ => None,
        }
    }
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.len.to_writer(writer)?;
        let mut typ = self.data.typ();
        if self.is_critical {
            typ |= 0x80;
        }
        writer.write_u8(typ)?;
        self.data.to_writer(writer)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.len.write_len() + 1 + self.data.write_len()
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_parse_gpg_area() {
        // issuer fingerprint, creation time and signer's user id
        let area = hex!(
            "1621 04 a850725492607d88b313cede45c3bece11cd383c"
            "0502 65535b80"
            "1a1c 416c696365203c616c696365406578616d706c652e6f72673e"
        );
        let packets = Subpacket::parse_area(Bytes::copy_from_slice(&area)).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(
            packets[0].issuer().unwrap().to_string(),
            "45C3BECE11CD383C"
        );
        assert_eq!(packets[1].created().unwrap().timestamp(), 0x6553_5b80);
        assert_eq!(
            packets[2].data,
            SubpacketData::SignersUserID(Bytes::from_static(b"Alice <alice@example.org>"))
        );

        // re-serialization is exact
        assert_eq!(packets.to_bytes().unwrap(), area.to_vec());
    }

    #[test]
    fn test_critical_bit() {
        let area = hex!("029b 03");
        let packets = Subpacket::parse_area(Bytes::copy_from_slice(&area)).unwrap();
        assert!(packets[0].is_critical);
        assert_eq!(packets[0].key_flags().unwrap(), KeyFlags::from(0x03));
        assert_eq!(packets.to_bytes().unwrap(), area.to_vec());
    }

    #[test]
    fn test_truncated_area() {
        assert!(Subpacket::parse_area(Bytes::from_static(&[0x05, 0x02, 0x00])).is_err());
    }

    proptest! {
        #[test]
        fn length_roundtrip(len: SubpacketLength) {
            let bytes = len.to_bytes().unwrap();
            prop_assert_eq!(bytes.len(), len.write_len());
            let back = SubpacketLength::from_buf(&bytes[..]).unwrap();
            prop_assert_eq!(back.len(), len.len());
        }
    }
}
