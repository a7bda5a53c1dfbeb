use std::io;

use bytes::{Buf, Bytes};

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::Mpi;

/// Public key material.
///
/// Only RSA keys are usable for cryptographic operations. For the other algorithms the
/// parameters are delimited and kept verbatim, so key rings mixing algorithms still parse
/// and fingerprints stay correct.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum PublicParams {
    RSA {
        n: Mpi,
        e: Mpi,
    },
    Opaque {
        #[debug("{}", hex::encode(raw))]
        raw: Bytes,
    },
}

impl PublicParams {
    /// Parses the parameters for `alg`, consuming exactly their bytes from `i`.
    pub fn from_buf(alg: PublicKeyAlgorithm, i: &mut Bytes) -> Result<Self> {
        let start = i.clone();
        let mpi_count = match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
                let n = Mpi::from_buf(&mut *i)?;
                let e = Mpi::from_buf(&mut *i)?;
                return Ok(PublicParams::RSA { n, e });
            }
            // p, q, g, y
            PublicKeyAlgorithm::DSA => 4,
            // p, g, y
            PublicKeyAlgorithm::ElgamalEncrypt | PublicKeyAlgorithm::Elgamal => 3,
            PublicKeyAlgorithm::ECDSA | PublicKeyAlgorithm::EdDSALegacy => {
                skip_oid(i)?;
                1
            }
            PublicKeyAlgorithm::ECDH => {
                skip_oid(i)?;
                Mpi::from_buf(&mut *i)?;
                // KDF parameters
                let len = i.read_u8()?;
                i.read_take(usize::from(len))?;
                0
            }
            PublicKeyAlgorithm::X25519 | PublicKeyAlgorithm::Ed25519 => {
                i.read_take(32)?;
                0
            }
            PublicKeyAlgorithm::X448 => {
                i.read_take(56)?;
                0
            }
            PublicKeyAlgorithm::Ed448 => {
                i.read_take(57)?;
                0
            }
            // Unknown layout, everything left belongs to the key.
            _ => {
                let raw = i.rest();
                return Ok(PublicParams::Opaque { raw });
            }
        };
        for _ in 0..mpi_count {
            Mpi::from_buf(&mut *i)?;
        }
        let consumed = start.len() - i.remaining();
        Ok(PublicParams::Opaque {
            raw: start.slice(..consumed),
        })
    }
}

fn skip_oid(i: &mut Bytes) -> Result<()> {
    let len = i.read_u8()?;
    i.read_take(usize::from(len))?;
    Ok(())
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicParams::RSA { n, e } => {
                n.to_writer(writer)?;
                e.to_writer(writer)?;
            }
            PublicParams::Opaque { raw } => writer.write_all(raw)?,
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PublicParams::RSA { n, e } => n.write_len() + e.write_len(),
            PublicParams::Opaque { raw } => raw.len(),
        }
    }
}
