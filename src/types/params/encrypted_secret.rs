use bytes::{Buf, Bytes};
use log::debug;
use zeroize::Zeroizing;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::parsing::BufParsing;
use crate::types::{KeyId, PlainSecretParams, S2kUsage, StringToKey};

/// Secret key material encrypted under a passphrase.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct EncryptedSecretParams {
    usage: S2kUsage,
    sym_alg: SymmetricKeyAlgorithm,
    s2k: Option<StringToKey>,
    #[debug("{}", hex::encode(iv))]
    iv: Bytes,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

impl EncryptedSecretParams {
    /// Parses everything after the usage octet.
    pub fn from_buf(usage: S2kUsage, mut i: Bytes) -> Result<Self> {
        let (sym_alg, s2k) = match usage {
            S2kUsage::Unprotected => {
                return Err(Error::Message {
                    message: "unprotected keys carry no encrypted parameters".into(),
                })
            }
            S2kUsage::LegacyCfb(alg) => (alg, None),
            S2kUsage::Cfb | S2kUsage::MalleableCfb | S2kUsage::Aead => {
                let alg: SymmetricKeyAlgorithm = i.read_u8()?.into();
                if usage == S2kUsage::Aead {
                    // AEAD mode octet precedes the specifier
                    i.read_u8()?;
                }
                (alg, Some(StringToKey::from_buf(&mut i)?))
            }
        };

        let has_iv = s2k.as_ref().map_or(true, |s2k| s2k.has_iv());
        let iv = if has_iv {
            i.read_take(sym_alg.block_size())?
        } else {
            Bytes::new()
        };
        let data = i.copy_to_bytes(i.remaining());

        Ok(EncryptedSecretParams {
            usage,
            sym_alg,
            s2k,
            iv,
            data,
        })
    }

    pub fn usage(&self) -> S2kUsage {
        self.usage
    }

    pub fn encryption_algorithm(&self) -> SymmetricKeyAlgorithm {
        self.sym_alg
    }

    pub fn string_to_key(&self) -> Option<&StringToKey> {
        self.s2k.as_ref()
    }

    /// Decrypts and checks the secret parameters.
    ///
    /// A checksum mismatch after decryption means the derived key was wrong and is
    /// reported as [`Error::BadPassphrase`].
    pub fn unlock(
        &self,
        passphrase: &[u8],
        alg: PublicKeyAlgorithm,
        key_id: KeyId,
    ) -> Result<PlainSecretParams> {
        let s2k = match (&self.usage, &self.s2k) {
            (S2kUsage::Cfb | S2kUsage::MalleableCfb, Some(s2k)) => s2k,
            (S2kUsage::LegacyCfb(_), _) => {
                return Err(Error::KeyUnusable {
                    message: "legacy MD5 based secret key protection".into(),
                })
            }
            (S2kUsage::Aead, _) => {
                return Err(Error::KeyUnusable {
                    message: "AEAD secret key protection".into(),
                })
            }
            _ => {
                return Err(Error::KeyUnusable {
                    message: format!("unexpected protection {:?}", self.usage),
                })
            }
        };
        if !self.sym_alg.is_supported() {
            return Err(Error::KeyUnusable {
                message: format!("secret key cipher {:?}", self.sym_alg),
            });
        }
        if passphrase.is_empty() {
            return Err(Error::BadPassphrase { key_id });
        }

        let key = s2k
            .derive_key(passphrase, self.sym_alg.key_size())
            .map_err(|err| Error::KeyUnusable {
                message: err.to_string(),
            })?;

        let mut plaintext = Zeroizing::new(self.data.to_vec());
        self.sym_alg
            .decrypt_with_iv_regular(&key, &self.iv, &mut plaintext)?;

        PlainSecretParams::try_from_slice(alg, &plaintext, self.usage).map_err(|err| {
            debug!("secret key {key_id} did not unlock: {err}");
            Error::BadPassphrase { key_id }
        })
    }
}
