use std::io;

use bytes::{Buf, Bytes};
use log::debug;
use rand::{CryptoRng, Rng};
use ::rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::crypto::checksum;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::rsa;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{unsupported_err, Error, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Mpi};

/// Algorithm specific session key values.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum PkeskValues {
    Rsa { mpi: Mpi },
    /// Values for algorithms this crate can not decrypt, kept as stored.
    Other {
        #[debug("{}", hex::encode(raw))]
        raw: Bytes,
    },
}

/// Public Key Encrypted Session Key Packet, version 3.
/// <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.1>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEncryptedSessionKey {
    id: KeyId,
    algorithm: PublicKeyAlgorithm,
    values: PkeskValues,
}

impl PublicKeyEncryptedSessionKey {
    /// Parses a `PublicKeyEncryptedSessionKey` packet body.
    pub fn from_buf(mut i: Bytes) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 3 {
            unsupported_err!("PKESK version {}", version);
        }
        let id = KeyId::from(i.read_array::<8>()?);
        let algorithm: PublicKeyAlgorithm = i.read_u8()?.into();
        let values = if algorithm.is_rsa() {
            let mpi = Mpi::from_buf(&mut i)?;
            if i.has_remaining() {
                return Err(Error::Message {
                    message: format!("{} trailing bytes in PKESK", i.remaining()),
                });
            }
            PkeskValues::Rsa { mpi }
        } else {
            PkeskValues::Other { raw: i.rest() }
        };

        Ok(PublicKeyEncryptedSessionKey {
            id,
            algorithm,
            values,
        })
    }

    /// Encrypts `session_key` for the RSA key `key`.
    ///
    /// The encrypted payload is the cipher id, the key, and a two byte checksum over the key.
    pub fn encrypt_rsa<R: CryptoRng + Rng>(
        rng: R,
        id: KeyId,
        key: &RsaPublicKey,
        alg: SymmetricKeyAlgorithm,
        session_key: &[u8],
    ) -> Result<Self> {
        let mut payload = Zeroizing::new(Vec::with_capacity(session_key.len() + 3));
        payload.push(alg.into());
        payload.extend_from_slice(session_key);
        payload.extend_from_slice(&checksum::calculate_simple(session_key).to_be_bytes());

        let mpi = rsa::encrypt(rng, key, &payload)?;
        debug!("session key for {} wrapped with {}", id, alg);
        Ok(PublicKeyEncryptedSessionKey {
            id,
            algorithm: PublicKeyAlgorithm::RSA,
            values: PkeskValues::Rsa { mpi },
        })
    }

    /// Recovers the cipher and session key.
    pub fn decrypt(
        &self,
        key: &RsaPrivateKey,
    ) -> Result<(SymmetricKeyAlgorithm, Zeroizing<Vec<u8>>)> {
        let PkeskValues::Rsa { mpi } = &self.values else {
            unsupported_err!("session key encrypted with {}", self.algorithm);
        };
        let payload = rsa::decrypt(key, mpi)?;
        if payload.len() < 3 {
            return Err(Error::TooShort {
                needed: 3,
                remaining: payload.len(),
            });
        }

        let alg = SymmetricKeyAlgorithm::from(payload[0]);
        let (session_key, expected) = payload[1..].split_at(payload.len() - 3);
        checksum::simple(expected, session_key)?;
        if session_key.len() != alg.key_size() {
            return Err(Error::Message {
                message: format!(
                    "session key of {} bytes does not fit {}",
                    session_key.len(),
                    alg
                ),
            });
        }
        Ok((alg, Zeroizing::new(session_key.to_vec())))
    }

    /// The recipient key id, possibly the wildcard.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    pub fn values(&self) -> &PkeskValues {
        &self.values
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[3])?;
        writer.write_all(self.id.as_ref())?;
        writer.write_all(&[self.algorithm.into()])?;
        match &self.values {
            PkeskValues::Rsa { mpi } => mpi.to_writer(writer)?,
            PkeskValues::Other { raw } => writer.write_all(raw)?,
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        let values = match &self.values {
            PkeskValues::Rsa { mpi } => mpi.write_len(),
            PkeskValues::Other { raw } => raw.len(),
        };
        1 + 8 + 1 + values
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn key() -> RsaPrivateKey {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        RsaPrivateKey::new(&mut rng, 1024).unwrap()
    }

    #[test]
    fn test_rsa_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let key = key();
        let alg = SymmetricKeyAlgorithm::AES128;
        let session_key = alg.new_session_key(&mut rng);
        let id = KeyId::from([0x11; 8]);

        let pkesk = PublicKeyEncryptedSessionKey::encrypt_rsa(
            &mut rng,
            id,
            &key.to_public_key(),
            alg,
            &session_key,
        )
        .unwrap();
        let bytes = pkesk.to_bytes().unwrap();
        assert_eq!(bytes.len(), pkesk.write_len());
        assert_eq!(&bytes[..10], &[3, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 1]);

        let parsed = PublicKeyEncryptedSessionKey::from_buf(bytes.into()).unwrap();
        assert_eq!(parsed, pkesk);
        let (got_alg, got_key) = parsed.decrypt(&key).unwrap();
        assert_eq!(got_alg, alg);
        assert_eq!(&got_key[..], &session_key[..]);
    }

    #[test]
    fn test_wrong_key_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let alg = SymmetricKeyAlgorithm::AES256;
        let session_key = alg.new_session_key(&mut rng);
        let pkesk = PublicKeyEncryptedSessionKey::encrypt_rsa(
            &mut rng,
            KeyId::WILDCARD,
            &key().to_public_key(),
            alg,
            &session_key,
        )
        .unwrap();
        assert!(pkesk.id().is_wildcard());

        let other = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        assert!(pkesk.decrypt(&other).is_err());
    }

    #[test]
    fn test_other_algorithm_kept_raw() {
        let body = Bytes::from_static(&[3, 0, 0, 0, 0, 0, 0, 0, 1, 18, 0xAA, 0xBB]);
        let pkesk = PublicKeyEncryptedSessionKey::from_buf(body.clone()).unwrap();
        assert_eq!(pkesk.algorithm(), PublicKeyAlgorithm::ECDH);
        assert_eq!(pkesk.to_bytes().unwrap(), body.to_vec());
        assert!(pkesk.decrypt(&key()).is_err());
    }
}
