use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Utc};
use digest::DynDigest;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::signature::{SignatureType, Subpacket, SubpacketData};
use crate::ser::Serialize;
use crate::types::{KeyFlags, KeyId};

/// Everything about a signature apart from the signature values themselves.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignatureConfig {
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,
    pub hash_alg: HashAlgorithm,
    pub hashed_subpackets: Vec<Subpacket>,
    pub unhashed_subpackets: Vec<Subpacket>,
    pub version_specific: SignatureVersionSpecific,
}

/// Fields that only exist for some signature versions.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SignatureVersionSpecific {
    /// Also used for V2, which has the identical layout.
    V3 {
        created: DateTime<Utc>,
        issuer: KeyId,
    },
    V4,
}

impl SignatureConfig {
    pub fn new_v4(
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
        hashed_subpackets: Vec<Subpacket>,
        unhashed_subpackets: Vec<Subpacket>,
    ) -> Self {
        SignatureConfig {
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets,
            unhashed_subpackets,
            version_specific: SignatureVersionSpecific::V4,
        }
    }

    /// Hashes the signature fields that follow the signed data.
    /// Returns the number of bytes hashed, as needed for the trailer.
    pub fn hash_signature_data(&self, hasher: &mut dyn DynDigest) -> Result<usize> {
        match &self.version_specific {
            SignatureVersionSpecific::V3 { created, .. } => {
                let mut buf = [0u8; 5];
                buf[0] = self.typ.into();
                BigEndian::write_u32(&mut buf[1..], created.timestamp().try_into()?);
                hasher.update(&buf);

                // no trailer
                Ok(0)
            }
            SignatureVersionSpecific::V4 => {
                let mut res = vec![
                    // version
                    4,
                    self.typ.into(),
                    self.pub_alg.into(),
                    self.hash_alg.into(),
                    // will be filled with the length
                    0u8,
                    0u8,
                ];

                let hashed_subpackets = self.hashed_subpackets.to_bytes()?;
                BigEndian::write_u16(&mut res[4..6], hashed_subpackets.len().try_into()?);
                res.extend(hashed_subpackets);

                hasher.update(&res);

                Ok(res.len())
            }
        }
    }

    /// The final bytes fed into the hash, `len` being what
    /// [`SignatureConfig::hash_signature_data`] returned.
    pub fn trailer(&self, len: usize) -> Result<Vec<u8>> {
        match self.version_specific {
            SignatureVersionSpecific::V3 { .. } => Ok(Vec::new()),
            SignatureVersionSpecific::V4 => {
                let mut trailer = vec![0x04, 0xFF, 0, 0, 0, 0];
                BigEndian::write_u32(&mut trailer[2..], len.try_into()?);
                Ok(trailer)
            }
        }
    }

    /// Hashed subpackets first, then unhashed ones.
    pub fn subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.hashed_subpackets
            .iter()
            .chain(self.unhashed_subpackets.iter())
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        match &self.version_specific {
            SignatureVersionSpecific::V3 { created, .. } => Some(created),
            SignatureVersionSpecific::V4 => self.hashed_subpackets.iter().find_map(Subpacket::created),
        }
    }

    pub fn issuer(&self) -> Option<KeyId> {
        match &self.version_specific {
            SignatureVersionSpecific::V3 { issuer, .. } => Some(*issuer),
            SignatureVersionSpecific::V4 => self.subpackets().find_map(Subpacket::issuer),
        }
    }

    /// Raw bytes of the signer's user id subpacket, if present.
    pub fn signers_user_id(&self) -> Option<&[u8]> {
        self.subpackets().find_map(|p| match &p.data {
            SubpacketData::SignersUserID(id) => Some(&id[..]),
            _ => None,
        })
    }

    /// Key flags are only trusted from the hashed area.
    pub fn key_flags(&self) -> Option<KeyFlags> {
        self.hashed_subpackets.iter().find_map(Subpacket::key_flags)
    }
}
