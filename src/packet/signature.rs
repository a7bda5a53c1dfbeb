use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::{unsupported_err, Error, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{KeyFlags, KeyId, Mpi};

mod config;
mod subpacket;

pub use self::config::{SignatureConfig, SignatureVersionSpecific};
pub use self::subpacket::{Subpacket, SubpacketData, SubpacketLength};

/// Signature type octet.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2.1>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SignatureType {
    /// Signature of a binary document.
    Binary = 0x00,
    /// Signature of a canonical text document, line endings normalized to CRLF.
    Text = 0x01,
    Standalone = 0x02,
    CertGeneric = 0x10,
    CertPersona = 0x11,
    CertCasual = 0x12,
    CertPositive = 0x13,
    SubkeyBinding = 0x18,
    KeyBinding = 0x19,
    /// Signature directly on a key.
    Key = 0x1F,
    KeyRevocation = 0x20,
    SubkeyRevocation = 0x28,
    CertRevocation = 0x30,
    Timestamp = 0x40,
    ThirdParty = 0x50,

    #[num_enum(catch_all)]
    Other(u8),
}

impl SignatureType {
    /// Self-signatures over a user id.
    pub fn is_certification(self) -> bool {
        matches!(
            self,
            SignatureType::CertGeneric
                | SignatureType::CertPersona
                | SignatureType::CertCasual
                | SignatureType::CertPositive
        )
    }
}

/// Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.2>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Signature {
    pub config: SignatureConfig,
    #[debug("{}", hex::encode(signed_hash_value))]
    pub signed_hash_value: [u8; 2],
    /// Algorithm specific signature values, as stored.
    #[debug("{}", hex::encode(signature))]
    pub signature: Bytes,
}

impl Signature {
    /// Assembles a signature from its config and a single MPI value.
    pub fn from_config(
        config: SignatureConfig,
        signed_hash_value: [u8; 2],
        signature: &Mpi,
    ) -> Result<Self> {
        Ok(Signature {
            config,
            signed_hash_value,
            signature: signature.to_bytes()?.into(),
        })
    }

    /// Parses a signature packet body.
    pub fn from_buf(mut i: Bytes) -> Result<Self> {
        let version = i.read_u8()?;
        let signature = match version {
            2 | 3 => {
                let hashed_len = i.read_u8()?;
                if hashed_len != 5 {
                    return Err(Error::Message {
                        message: format!("invalid v3 signature hashed length {hashed_len}"),
                    });
                }
                let typ = i.read_u8()?.into();
                let created = i.read_be_u32()?;
                let created = Utc
                    .timestamp_opt(created.into(), 0)
                    .single()
                    .ok_or_else(|| Error::Message {
                        message: "invalid signature creation time".into(),
                    })?;
                let issuer = KeyId::from(i.read_array::<8>()?);
                let pub_alg = i.read_u8()?.into();
                let hash_alg = i.read_u8()?.into();
                let signed_hash_value = i.read_array::<2>()?;
                Signature {
                    config: SignatureConfig {
                        typ,
                        pub_alg,
                        hash_alg,
                        hashed_subpackets: Vec::new(),
                        unhashed_subpackets: Vec::new(),
                        version_specific: SignatureVersionSpecific::V3 { created, issuer },
                    },
                    signed_hash_value,
                    signature: i.rest(),
                }
            }
            4 => {
                let typ = i.read_u8()?.into();
                let pub_alg = i.read_u8()?.into();
                let hash_alg = i.read_u8()?.into();
                let hashed_len = i.read_be_u16()?;
                let hashed_subpackets = Subpacket::parse_area(i.read_take(hashed_len.into())?)?;
                let unhashed_len = i.read_be_u16()?;
                let unhashed_subpackets =
                    Subpacket::parse_area(i.read_take(unhashed_len.into())?)?;
                let signed_hash_value = i.read_array::<2>()?;
                Signature {
                    config: SignatureConfig {
                        typ,
                        pub_alg,
                        hash_alg,
                        hashed_subpackets,
                        unhashed_subpackets,
                        version_specific: SignatureVersionSpecific::V4,
                    },
                    signed_hash_value,
                    signature: i.rest(),
                }
            }
            _ => unsupported_err!("signature version {}", version),
        };
        debug!("parsed signature {:?}", signature.config.typ);
        Ok(signature)
    }

    pub fn typ(&self) -> SignatureType {
        self.config.typ
    }

    pub fn issuer(&self) -> Option<KeyId> {
        self.config.issuer()
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.config.created()
    }

    pub fn key_flags(&self) -> Option<KeyFlags> {
        self.config.key_flags()
    }

    /// The single MPI of an RSA signature.
    pub fn rsa_value(&self) -> Result<Mpi> {
        let mut raw = self.signature.clone();
        let mpi = Mpi::from_buf(&mut raw)?;
        if raw.has_remaining() {
            return Err(Error::Message {
                message: "trailing data after RSA signature".into(),
            });
        }
        Ok(mpi)
    }
}

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let config = &self.config;
        match &config.version_specific {
            SignatureVersionSpecific::V3 { created, issuer } => {
                writer.write_all(&[3, 5, config.typ.into()])?;
                writer.write_u32::<BigEndian>(created.timestamp().try_into()?)?;
                writer.write_all(issuer.as_ref())?;
                writer.write_all(&[config.pub_alg.into(), config.hash_alg.into()])?;
            }
            SignatureVersionSpecific::V4 => {
                writer.write_all(&[
                    4,
                    config.typ.into(),
                    config.pub_alg.into(),
                    config.hash_alg.into(),
                ])?;
                writer.write_u16::<BigEndian>(config.hashed_subpackets.write_len().try_into()?)?;
                config.hashed_subpackets.to_writer(writer)?;
                writer
                    .write_u16::<BigEndian>(config.unhashed_subpackets.write_len().try_into()?)?;
                config.unhashed_subpackets.to_writer(writer)?;
            }
        }
        writer.write_all(&self.signed_hash_value)?;
        writer.write_all(&self.signature)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        let config = &self.config;
        let head = match &config.version_specific {
            SignatureVersionSpecific::V3 { .. } => 3 + 4 + 8 + 2,
            SignatureVersionSpecific::V4 => {
                4 + 2
                    + config.hashed_subpackets.write_len()
                    + 2
                    + config.unhashed_subpackets.write_len()
            }
        };
        head + 2 + self.signature.len()
    }
}
