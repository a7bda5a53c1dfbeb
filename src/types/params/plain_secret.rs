use std::fmt;

use rsa::BigUint;
use zeroize::Zeroize;

use crate::crypto::checksum;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{bail, Error, Result};
use crate::types::{Mpi, S2kUsage};

/// Decrypted secret key material.
#[derive(Clone, PartialEq, Eq)]
pub enum PlainSecretParams {
    RSA {
        d: BigUint,
        p: BigUint,
        q: BigUint,
        u: BigUint,
    },
    /// Material for algorithms this crate cannot operate. Not retained.
    Opaque,
}

impl PlainSecretParams {
    /// Parses the cleartext secret parameters followed by their checksum, as selected by
    /// `usage`, and verifies the checksum.
    pub fn try_from_slice(alg: PublicKeyAlgorithm, data: &[u8], usage: S2kUsage) -> Result<Self> {
        let checksum_len = match usage {
            S2kUsage::Cfb => 20,
            _ => 2,
        };
        if data.len() < checksum_len {
            return Err(Error::TooShort {
                needed: checksum_len,
                remaining: data.len(),
            });
        }
        let (params, expected) = data.split_at(data.len() - checksum_len);
        match usage {
            S2kUsage::Cfb => checksum::sha1(expected, params)?,
            _ => checksum::simple(expected, params)?,
        }

        match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
                let mut i = params;
                let d = read_secret_mpi(&mut i)?;
                let p = read_secret_mpi(&mut i)?;
                let q = read_secret_mpi(&mut i)?;
                let u = read_secret_mpi(&mut i)?;
                if !i.is_empty() {
                    bail!("{} trailing bytes after secret parameters", i.len());
                }
                Ok(PlainSecretParams::RSA { d, p, q, u })
            }
            _ => Ok(PlainSecretParams::Opaque),
        }
    }
}

fn read_secret_mpi(i: &mut &[u8]) -> Result<BigUint> {
    let mpi = Mpi::from_buf(&mut *i)?;
    Ok(BigUint::from(&mpi))
}

impl Drop for PlainSecretParams {
    fn drop(&mut self) {
        if let PlainSecretParams::RSA { d, p, q, u } = self {
            d.zeroize();
            p.zeroize();
            q.zeroize();
            u.zeroize();
        }
    }
}

impl fmt::Debug for PlainSecretParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlainSecretParams::RSA { .. } => write!(f, "PlainSecretParams::RSA([..])"),
            PlainSecretParams::Opaque => write!(f, "PlainSecretParams::Opaque"),
        }
    }
}

#[cfg(test)]
mod tests {
    use sha1::{Digest, Sha1};

    use super::*;
    use crate::ser::Serialize;

    fn rsa_params_bytes() -> Vec<u8> {
        let mut out = Vec::new();
        for v in [&[0x07u8][..], &[0x03], &[0x05], &[0x02]] {
            Mpi::from_slice(v).to_writer(&mut out).unwrap();
        }
        out
    }

    #[test]
    fn test_simple_checksum() {
        let mut data = rsa_params_bytes();
        let sum = data.iter().map(|v| u32::from(*v)).sum::<u32>() as u16;
        data.extend_from_slice(&sum.to_be_bytes());

        let params =
            PlainSecretParams::try_from_slice(PublicKeyAlgorithm::RSA, &data, S2kUsage::Unprotected)
                .unwrap();
        let PlainSecretParams::RSA { d, q, .. } = &params else {
            panic!("expected rsa params");
        };
        assert_eq!(d, &BigUint::from(7u32));
        assert_eq!(q, &BigUint::from(5u32));

        let last = data.len() - 1;
        data[last] ^= 1;
        assert!(PlainSecretParams::try_from_slice(
            PublicKeyAlgorithm::RSA,
            &data,
            S2kUsage::Unprotected
        )
        .is_err());
    }

    #[test]
    fn test_sha1_checksum() {
        let mut data = rsa_params_bytes();
        let hash = Sha1::digest(&data);
        data.extend_from_slice(&hash);

        assert!(
            PlainSecretParams::try_from_slice(PublicKeyAlgorithm::RSA, &data, S2kUsage::Cfb)
                .is_ok()
        );
        data[0] ^= 0x80;
        assert!(
            PlainSecretParams::try_from_slice(PublicKeyAlgorithm::RSA, &data, S2kUsage::Cfb)
                .is_err()
        );
    }
}
