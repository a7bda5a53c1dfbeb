use std::io;

use ::rsa::RsaPublicKey;
use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, TimeZone, Utc};
use sha1::{Digest, Sha1};

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::rsa;
use crate::errors::{unsupported_err, Error, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{
    EncryptedSecretParams, Fingerprint, KeyId, KeyVersion, PlainSecretParams, PublicParams,
    S2kUsage, SecretParams,
};

/// Public-Key and Public-Subkey packet body.
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.2>
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PublicKeyPacket {
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    /// Validity in days, only stored by V2 and V3 keys.
    expiration: Option<u16>,
    params: PublicParams,
    key_id: KeyId,
    fingerprint: Option<Fingerprint>,
}

impl PublicKeyPacket {
    /// Parses a public key packet body. The whole body must be consumed.
    pub fn from_buf(mut i: Bytes) -> Result<Self> {
        let key = Self::parse_public(&mut i)?;
        if i.has_remaining() {
            return Err(Error::Message {
                message: format!("{} trailing bytes after public key", i.remaining()),
            });
        }
        Ok(key)
    }

    /// Parses the public part of a key packet, leaving anything after it in `i`.
    fn parse_public(i: &mut Bytes) -> Result<Self> {
        let start = i.clone();
        let version: KeyVersion = i.read_u8()?.into();
        match version {
            KeyVersion::V2 | KeyVersion::V3 => {
                let created_at = timestamp(i.read_be_u32()?)?;
                let expiration = i.read_be_u16()?;
                let algorithm: PublicKeyAlgorithm = i.read_u8()?.into();
                let params = PublicParams::from_buf(algorithm, i)?;
                // V3 key ids are the low 64 bits of the RSA modulus
                let key_id = match &params {
                    PublicParams::RSA { n, .. } if n.len() >= 8 => {
                        KeyId::from_slice(&n.as_ref()[n.len() - 8..])?
                    }
                    _ => unsupported_err!("{:?} key with algorithm {}", version, algorithm),
                };
                Ok(PublicKeyPacket {
                    version,
                    algorithm,
                    created_at,
                    expiration: Some(expiration),
                    params,
                    key_id,
                    fingerprint: None,
                })
            }
            KeyVersion::V4 => {
                let created_at = timestamp(i.read_be_u32()?)?;
                let algorithm: PublicKeyAlgorithm = i.read_u8()?.into();
                let params = PublicParams::from_buf(algorithm, i)?;

                let body = start.slice(..start.len() - i.remaining());
                let fingerprint = v4_fingerprint(&body)?;
                Ok(PublicKeyPacket {
                    version,
                    algorithm,
                    created_at,
                    expiration: None,
                    params,
                    key_id: fingerprint.key_id(),
                    fingerprint: Some(fingerprint),
                })
            }
            KeyVersion::Other(v) => unsupported_err!("key version {}", v),
        }
    }

    pub fn version(&self) -> KeyVersion {
        self.version
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub fn expiration(&self) -> Option<u16> {
        self.expiration
    }

    pub fn public_params(&self) -> &PublicParams {
        &self.params
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Only V4 keys have a fingerprint this crate computes.
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    /// The key as usable by the RSA primitives.
    pub fn rsa_public_key(&self) -> Result<RsaPublicKey> {
        match &self.params {
            PublicParams::RSA { n, e } if self.algorithm.is_rsa() => rsa::public_key(n, e),
            _ => Err(Error::KeyUnusable {
                message: format!("{} keys are not supported", self.algorithm),
            }),
        }
    }
}

fn timestamp(secs: u32) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs.into(), 0)
        .single()
        .ok_or_else(|| Error::Message {
            message: format!("invalid key creation time {secs}"),
        })
}

/// SHA-1 over the public key packet as if it were framed with an old style two octet header.
fn v4_fingerprint(body: &[u8]) -> Result<Fingerprint> {
    let len: u16 = body.len().try_into()?;
    let mut hasher = Sha1::new();
    hasher.update([0x99]);
    hasher.update(len.to_be_bytes());
    hasher.update(body);
    let mut fp = [0u8; 20];
    fp.copy_from_slice(&hasher.finalize());
    Ok(Fingerprint::new(fp))
}

impl Serialize for PublicKeyPacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version.into())?;
        writer.write_u32::<BigEndian>(self.created_at.timestamp().try_into()?)?;
        if let Some(expiration) = self.expiration {
            writer.write_u16::<BigEndian>(expiration)?;
        }
        writer.write_u8(self.algorithm.into())?;
        self.params.to_writer(writer)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        let expiration = if self.expiration.is_some() { 2 } else { 0 };
        1 + 4 + expiration + 1 + self.params.write_len()
    }
}

/// Secret-Key and Secret-Subkey packet body.
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.3>
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SecretKeyPacket {
    public: PublicKeyPacket,
    secret: SecretParams,
}

impl SecretKeyPacket {
    /// Parses a secret key packet body.
    pub fn from_buf(mut i: Bytes) -> Result<Self> {
        let public = PublicKeyPacket::parse_public(&mut i)?;
        let usage = S2kUsage::from(i.read_u8()?);
        let secret = match usage {
            S2kUsage::Unprotected => SecretParams::Plain(PlainSecretParams::try_from_slice(
                public.algorithm,
                &i,
                usage,
            )?),
            _ => SecretParams::Encrypted(EncryptedSecretParams::from_buf(usage, i)?),
        };
        Ok(SecretKeyPacket { public, secret })
    }

    pub fn public_key(&self) -> &PublicKeyPacket {
        &self.public
    }

    pub fn secret_params(&self) -> &SecretParams {
        &self.secret
    }

    pub fn key_id(&self) -> KeyId {
        self.public.key_id
    }

    /// Decrypts the secret parameters. Unprotected keys ignore the passphrase.
    pub fn unlock(&self, passphrase: &[u8]) -> Result<PlainSecretParams> {
        match &self.secret {
            SecretParams::Plain(params) => Ok(params.clone()),
            SecretParams::Encrypted(params) => {
                params.unlock(passphrase, self.public.algorithm, self.public.key_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::types::Mpi;

    fn v4_rsa_body() -> Vec<u8> {
        let mut body = hex!("04 65535b80 01").to_vec();
        Mpi::from_slice(&[0xC3; 16]).to_writer(&mut body).unwrap();
        Mpi::from_slice(&[0x01, 0x00, 0x01]).to_writer(&mut body).unwrap();
        body
    }

    #[test]
    fn test_v4_fingerprint() {
        let body = v4_rsa_body();
        let key = PublicKeyPacket::from_buf(Bytes::from(body.clone())).unwrap();

        let mut framed = vec![0x99, 0x00, body.len() as u8];
        framed.extend_from_slice(&body);
        let expected = Sha1::digest(&framed);
        assert_eq!(key.fingerprint().unwrap().as_bytes(), &expected[..]);
        assert_eq!(key.key_id().as_ref(), &expected[12..]);
        assert_eq!(key.version(), KeyVersion::V4);
        assert_eq!(key.to_bytes().unwrap(), body);
    }

    #[test]
    fn test_v3_key_id_from_modulus() {
        let mut body = hex!("03 65535b80 0000 01").to_vec();
        let n: Vec<u8> = (1..=16).collect();
        Mpi::from_slice(&n).to_writer(&mut body).unwrap();
        Mpi::from_slice(&[0x11]).to_writer(&mut body).unwrap();

        let key = PublicKeyPacket::from_buf(Bytes::from(body.clone())).unwrap();
        assert_eq!(key.key_id().as_ref(), &n[8..]);
        assert!(key.fingerprint().is_none());
        assert_eq!(key.expiration(), Some(0));
        assert_eq!(key.to_bytes().unwrap(), body);
    }

    #[test]
    fn test_unknown_version() {
        let err = PublicKeyPacket::from_buf(Bytes::from_static(&[5, 0, 0, 0, 0])).unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[test]
    fn test_unprotected_secret_key() {
        let mut body = v4_rsa_body();
        body.push(0);
        let mut params = Vec::new();
        for v in [&[0x07u8][..], &[0x03], &[0x05], &[0x02]] {
            Mpi::from_slice(v).to_writer(&mut params).unwrap();
        }
        let sum = crate::crypto::checksum::calculate_simple(&params);
        body.extend_from_slice(&params);
        body.extend_from_slice(&sum.to_be_bytes());

        let key = SecretKeyPacket::from_buf(Bytes::from(body)).unwrap();
        assert!(!key.secret_params().is_encrypted());
        assert!(matches!(
            key.unlock(b"ignored").unwrap(),
            PlainSecretParams::RSA { .. }
        ));
    }
}
