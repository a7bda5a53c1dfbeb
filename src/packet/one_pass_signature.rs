use std::io;

use byteorder::WriteBytesExt;
use bytes::Bytes;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{unsupported_err, Result};
use crate::packet::signature::SignatureType;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::KeyId;

/// One-Pass Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.4>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnePassSignature {
    pub typ: SignatureType,
    pub hash_algorithm: HashAlgorithm,
    pub pub_algorithm: PublicKeyAlgorithm,
    pub key_id: KeyId,
    /// Zero if another one-pass signature over the same data follows.
    pub last: u8,
}

impl OnePassSignature {
    pub fn new(
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pub_algorithm: PublicKeyAlgorithm,
        key_id: KeyId,
    ) -> Self {
        OnePassSignature {
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last: 1,
        }
    }

    /// Parses a `OnePassSignature` packet body.
    pub fn from_buf(mut i: Bytes) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 3 {
            unsupported_err!("one pass signature version {}", version);
        }
        Ok(OnePassSignature {
            typ: i.read_u8()?.into(),
            hash_algorithm: i.read_u8()?.into(),
            pub_algorithm: i.read_u8()?.into(),
            key_id: KeyId::from(i.read_array::<8>()?),
            last: i.read_u8()?,
        })
    }
}

impl Serialize for OnePassSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[
            3,
            self.typ.into(),
            self.hash_algorithm.into(),
            self.pub_algorithm.into(),
        ])?;
        writer.write_all(self.key_id.as_ref())?;
        writer.write_u8(self.last)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        13
    }
}
