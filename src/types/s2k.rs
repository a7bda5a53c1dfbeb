use std::io;

use bytes::{Buf, Bytes};
use zeroize::Zeroizing;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{unsupported_err, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;

const EXPBIAS: u32 = 6;
const DEFAULT_ITER_SALTED_COUNT: u8 = 224;

/// How the secret parts of a key are protected.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-5.5.3>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S2kUsage {
    /// Stored in the clear, followed by a two-octet checksum.
    Unprotected,
    /// Any other value is the id of a cipher, with the key derived via simple MD5.
    LegacyCfb(SymmetricKeyAlgorithm),
    /// 253: AEAD protection.
    Aead,
    /// 254: CFB with a SHA-1 checksum over the plaintext.
    Cfb,
    /// 255: CFB with a two-octet checksum over the plaintext.
    MalleableCfb,
}

impl From<u8> for S2kUsage {
    fn from(value: u8) -> Self {
        match value {
            0 => S2kUsage::Unprotected,
            253 => S2kUsage::Aead,
            254 => S2kUsage::Cfb,
            255 => S2kUsage::MalleableCfb,
            v => S2kUsage::LegacyCfb(v.into()),
        }
    }
}

impl From<S2kUsage> for u8 {
    fn from(value: S2kUsage) -> Self {
        match value {
            S2kUsage::Unprotected => 0,
            S2kUsage::Aead => 253,
            S2kUsage::Cfb => 254,
            S2kUsage::MalleableCfb => 255,
            S2kUsage::LegacyCfb(alg) => alg.into(),
        }
    }
}

/// String-to-key specifier.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-3.7>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum StringToKey {
    Simple {
        hash_alg: HashAlgorithm,
    },
    Salted {
        hash_alg: HashAlgorithm,
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 8],
    },
    IteratedAndSalted {
        hash_alg: HashAlgorithm,
        #[debug("{}", hex::encode(salt))]
        salt: [u8; 8],
        /// Coded count, see [`StringToKey::count`].
        count: u8,
    },
    /// GnuPG extension 101: the secret key material is not present.
    GnuDummy {
        hash_alg: HashAlgorithm,
        #[debug("{}", hex::encode(data))]
        data: Bytes,
    },
    Other {
        typ: u8,
        #[debug("{}", hex::encode(data))]
        data: Bytes,
    },
}

impl StringToKey {
    /// Iterated and salted S2K with a fresh salt and the default count.
    pub fn new_default<R: rand::CryptoRng + rand::Rng>(mut rng: R) -> Self {
        let mut salt = [0u8; 8];
        rng.fill(&mut salt);
        StringToKey::IteratedAndSalted {
            hash_alg: HashAlgorithm::Sha256,
            salt,
            count: DEFAULT_ITER_SALTED_COUNT,
        }
    }

    /// Parses a specifier. For unknown types the remainder of the buffer is kept,
    /// as their length is not known.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let typ = i.read_u8()?;
        let s2k = match typ {
            0 => StringToKey::Simple {
                hash_alg: i.read_u8()?.into(),
            },
            1 => StringToKey::Salted {
                hash_alg: i.read_u8()?.into(),
                salt: i.read_array::<8>()?,
            },
            3 => StringToKey::IteratedAndSalted {
                hash_alg: i.read_u8()?.into(),
                salt: i.read_array::<8>()?,
                count: i.read_u8()?,
            },
            101 => StringToKey::GnuDummy {
                hash_alg: i.read_u8()?.into(),
                data: i.rest(),
            },
            _ => StringToKey::Other {
                typ,
                data: i.rest(),
            },
        };
        Ok(s2k)
    }

    /// Converts a coded count into the number of octets to hash.
    pub fn count(&self) -> Option<usize> {
        match self {
            StringToKey::IteratedAndSalted { count, .. } => {
                let c = u32::from(*count);
                Some(((16u32 + (c & 15)) << ((c >> 4) + EXPBIAS)) as usize)
            }
            _ => None,
        }
    }

    /// Whether a block cipher IV follows this specifier in a secret key packet.
    pub fn has_iv(&self) -> bool {
        !matches!(self, StringToKey::GnuDummy { .. } | StringToKey::Other { .. })
    }

    /// Derives a symmetric key of `key_size` bytes from the passphrase.
    pub fn derive_key(&self, passphrase: &[u8], key_size: usize) -> Result<Zeroizing<Vec<u8>>> {
        let (hash_alg, salt) = match self {
            StringToKey::Simple { hash_alg } => (*hash_alg, &[][..]),
            StringToKey::Salted { hash_alg, salt } => (*hash_alg, &salt[..]),
            StringToKey::IteratedAndSalted { hash_alg, salt, .. } => (*hash_alg, &salt[..]),
            StringToKey::GnuDummy { .. } => {
                unsupported_err!("secret key material is not present (gnu-dummy)")
            }
            StringToKey::Other { typ, .. } => unsupported_err!("string to key type {}", typ),
        };

        let digest_size = hash_alg.digest_size()?;
        let rounds = key_size.div_ceil(digest_size);
        let mut key = Zeroizing::new(Vec::with_capacity(rounds * digest_size));

        // One repetition of salt || passphrase, repeated until the block is reasonably large.
        let mut unit = Zeroizing::new(Vec::with_capacity(salt.len() + passphrase.len()));
        unit.extend_from_slice(salt);
        unit.extend_from_slice(passphrase);

        for round in 0..rounds {
            let mut hasher = hash_alg.new_hasher()?;
            // each additional context is preloaded with one more zero octet
            hasher.update(&vec![0u8; round]);

            match self.count() {
                Some(count) if !unit.is_empty() => {
                    let mut remaining = count.max(unit.len());
                    let repeat = (4096 / unit.len()).max(1);
                    let block = Zeroizing::new(unit.repeat(repeat));
                    while remaining >= block.len() {
                        hasher.update(&block);
                        remaining -= block.len();
                    }
                    // block starts on a repetition boundary, so any prefix is valid
                    hasher.update(&block[..remaining]);
                }
                _ => hasher.update(&unit),
            }

            key.extend_from_slice(&hasher.finalize());
        }
        key.truncate(key_size);

        Ok(key)
    }
}

impl Serialize for StringToKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            StringToKey::Simple { hash_alg } => writer.write_all(&[0, (*hash_alg).into()])?,
            StringToKey::Salted { hash_alg, salt } => {
                writer.write_all(&[1, (*hash_alg).into()])?;
                writer.write_all(salt)?;
            }
            StringToKey::IteratedAndSalted {
                hash_alg,
                salt,
                count,
            } => {
                writer.write_all(&[3, (*hash_alg).into()])?;
                writer.write_all(salt)?;
                writer.write_all(&[*count])?;
            }
            StringToKey::GnuDummy { hash_alg, data } => {
                writer.write_all(&[101, (*hash_alg).into()])?;
                writer.write_all(data)?;
            }
            StringToKey::Other { typ, data } => {
                writer.write_all(&[*typ])?;
                writer.write_all(data)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            StringToKey::Simple { .. } => 2,
            StringToKey::Salted { .. } => 10,
            StringToKey::IteratedAndSalted { .. } => 11,
            StringToKey::GnuDummy { data, .. } => 2 + data.len(),
            StringToKey::Other { data, .. } => 1 + data.len(),
        }
    }
}
