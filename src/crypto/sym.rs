use aes::{Aes128, Aes192, Aes256};
use cast5::Cast5;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{BufDecryptor, BufEncryptor, Decryptor, Encryptor};
use des::TdesEde3;
use num_enum::{FromPrimitive, IntoPrimitive};
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::errors::{bail, unsupported_err, Result};

mod decryptor;
mod encryptor;

pub use self::{decryptor::SymDecryptReader, encryptor::SymEncryptWriter};

/// Available symmetric key algorithms.
/// Ref: <https://www.rfc-editor.org/rfc/rfc4880.html#section-9.2>
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[repr(u8)]
#[non_exhaustive]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    #[cfg_attr(test, proptest(skip))]
    #[display("Plaintext")]
    Plaintext = 0,
    #[display("IDEA")]
    IDEA = 1,
    #[display("TripleDES")]
    TripleDES = 2,
    #[display("CAST5")]
    CAST5 = 3,
    #[display("Blowfish")]
    Blowfish = 4,
    // 5 & 6 are reserved for DES/SK
    #[display("AES128")]
    AES128 = 7,
    #[display("AES192")]
    AES192 = 8,
    #[display("AES256")]
    AES256 = 9,
    #[display("Twofish")]
    Twofish = 10,

    #[num_enum(catch_all)]
    #[display("Other({_0})")]
    Other(#[cfg_attr(test, proptest(strategy = "11u8.."))] u8),
}

impl Default for SymmetricKeyAlgorithm {
    fn default() -> Self {
        Self::AES256
    }
}

impl zeroize::DefaultIsZeroes for SymmetricKeyAlgorithm {}

impl SymmetricKeyAlgorithm {
    /// The size of a single block in bytes.
    pub fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::IDEA
            | SymmetricKeyAlgorithm::TripleDES
            | SymmetricKeyAlgorithm::CAST5
            | SymmetricKeyAlgorithm::Blowfish => 8,
            SymmetricKeyAlgorithm::AES128
            | SymmetricKeyAlgorithm::AES192
            | SymmetricKeyAlgorithm::AES256
            | SymmetricKeyAlgorithm::Twofish => 16,
            SymmetricKeyAlgorithm::Plaintext | SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// The size of a key in bytes.
    pub const fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::IDEA => 16,
            SymmetricKeyAlgorithm::TripleDES => 24,
            SymmetricKeyAlgorithm::CAST5 => 16,
            SymmetricKeyAlgorithm::Blowfish => 16,
            SymmetricKeyAlgorithm::AES128 => 16,
            SymmetricKeyAlgorithm::AES192 => 24,
            SymmetricKeyAlgorithm::AES256 => 32,
            SymmetricKeyAlgorithm::Twofish => 32,
            SymmetricKeyAlgorithm::Other(_) => 0,
        }
    }

    /// Whether this crate has an implementation of the cipher.
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            SymmetricKeyAlgorithm::TripleDES
                | SymmetricKeyAlgorithm::CAST5
                | SymmetricKeyAlgorithm::AES128
                | SymmetricKeyAlgorithm::AES192
                | SymmetricKeyAlgorithm::AES256
        )
    }

    /// Decrypt the data using CFB mode, without padding. Overwrites the input.
    /// This is regular CFB, not OpenPGP CFB.
    pub fn decrypt_with_iv_regular(
        self,
        key: &[u8],
        iv_vec: &[u8],
        ciphertext: &mut [u8],
    ) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::TripleDES => {
                Decryptor::<TdesEde3>::new_from_slices(key, iv_vec)?.decrypt(ciphertext);
            }
            SymmetricKeyAlgorithm::CAST5 => {
                Decryptor::<Cast5>::new_from_slices(key, iv_vec)?.decrypt(ciphertext);
            }
            SymmetricKeyAlgorithm::AES128 => {
                Decryptor::<Aes128>::new_from_slices(key, iv_vec)?.decrypt(ciphertext);
            }
            SymmetricKeyAlgorithm::AES192 => {
                Decryptor::<Aes192>::new_from_slices(key, iv_vec)?.decrypt(ciphertext);
            }
            SymmetricKeyAlgorithm::AES256 => {
                Decryptor::<Aes256>::new_from_slices(key, iv_vec)?.decrypt(ciphertext);
            }
            _ => unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", self),
        }

        Ok(())
    }

    /// Encrypt the data using CFB mode, without padding. Overwrites the input.
    pub fn encrypt_with_iv_regular(
        self,
        key: &[u8],
        iv_vec: &[u8],
        plaintext: &mut [u8],
    ) -> Result<()> {
        match self {
            SymmetricKeyAlgorithm::Plaintext => {
                bail!("'Plaintext' is not a legal cipher for encrypted data")
            }
            SymmetricKeyAlgorithm::TripleDES => {
                Encryptor::<TdesEde3>::new_from_slices(key, iv_vec)?.encrypt(plaintext);
            }
            SymmetricKeyAlgorithm::CAST5 => {
                Encryptor::<Cast5>::new_from_slices(key, iv_vec)?.encrypt(plaintext);
            }
            SymmetricKeyAlgorithm::AES128 => {
                Encryptor::<Aes128>::new_from_slices(key, iv_vec)?.encrypt(plaintext);
            }
            SymmetricKeyAlgorithm::AES192 => {
                Encryptor::<Aes192>::new_from_slices(key, iv_vec)?.encrypt(plaintext);
            }
            SymmetricKeyAlgorithm::AES256 => {
                Encryptor::<Aes256>::new_from_slices(key, iv_vec)?.encrypt(plaintext);
            }
            _ => unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", self),
        }
        Ok(())
    }

    /// Generate a new session key.
    pub fn new_session_key<R: Rng + CryptoRng>(self, mut rng: R) -> Zeroizing<Vec<u8>> {
        let mut session_key = Zeroizing::new(vec![0u8; self.key_size()]);
        rng.fill_bytes(&mut session_key);
        session_key
    }
}

/// Stateful CFB encryption for the supported ciphers.
pub(crate) enum CfbEncryptor {
    TripleDes(BufEncryptor<TdesEde3>),
    Cast5(BufEncryptor<Cast5>),
    Aes128(BufEncryptor<Aes128>),
    Aes192(BufEncryptor<Aes192>),
    Aes256(BufEncryptor<Aes256>),
}

impl CfbEncryptor {
    pub(crate) fn new(alg: SymmetricKeyAlgorithm, key: &[u8], iv: &[u8]) -> Result<Self> {
        let mode = match alg {
            SymmetricKeyAlgorithm::TripleDES => {
                Self::TripleDes(BufEncryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::CAST5 => Self::Cast5(BufEncryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::AES128 => Self::Aes128(BufEncryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::AES192 => Self::Aes192(BufEncryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::AES256 => Self::Aes256(BufEncryptor::new_from_slices(key, iv)?),
            _ => unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", alg),
        };
        Ok(mode)
    }

    pub(crate) fn encrypt(&mut self, data: &mut [u8]) {
        match self {
            Self::TripleDes(m) => m.encrypt(data),
            Self::Cast5(m) => m.encrypt(data),
            Self::Aes128(m) => m.encrypt(data),
            Self::Aes192(m) => m.encrypt(data),
            Self::Aes256(m) => m.encrypt(data),
        }
    }
}

/// Stateful CFB decryption for the supported ciphers.
pub(crate) enum CfbDecryptor {
    TripleDes(BufDecryptor<TdesEde3>),
    Cast5(BufDecryptor<Cast5>),
    Aes128(BufDecryptor<Aes128>),
    Aes192(BufDecryptor<Aes192>),
    Aes256(BufDecryptor<Aes256>),
}

impl CfbDecryptor {
    pub(crate) fn new(alg: SymmetricKeyAlgorithm, key: &[u8], iv: &[u8]) -> Result<Self> {
        let mode = match alg {
            SymmetricKeyAlgorithm::TripleDES => {
                Self::TripleDes(BufDecryptor::new_from_slices(key, iv)?)
            }
            SymmetricKeyAlgorithm::CAST5 => Self::Cast5(BufDecryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::AES128 => Self::Aes128(BufDecryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::AES192 => Self::Aes192(BufDecryptor::new_from_slices(key, iv)?),
            SymmetricKeyAlgorithm::AES256 => Self::Aes256(BufDecryptor::new_from_slices(key, iv)?),
            _ => unsupported_err!("SymmetricKeyAlgorithm {} is unsupported", alg),
        };
        Ok(mode)
    }

    pub(crate) fn decrypt(&mut self, data: &mut [u8]) {
        match self {
            Self::TripleDes(m) => m.decrypt(data),
            Self::Cast5(m) => m.decrypt(data),
            Self::Aes128(m) => m.decrypt(data),
            Self::Aes192(m) => m.decrypt(data),
            Self::Aes256(m) => m.decrypt(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_regular_cfb_roundtrip() {
        for alg in [
            SymmetricKeyAlgorithm::TripleDES,
            SymmetricKeyAlgorithm::CAST5,
            SymmetricKeyAlgorithm::AES128,
            SymmetricKeyAlgorithm::AES192,
            SymmetricKeyAlgorithm::AES256,
        ] {
            let key = vec![0x42u8; alg.key_size()];
            let iv = vec![0x07u8; alg.block_size()];
            let mut data = b"not a multiple of the block size".to_vec();
            alg.encrypt_with_iv_regular(&key, &iv, &mut data).unwrap();
            assert_ne!(&data[..], b"not a multiple of the block size");
            alg.decrypt_with_iv_regular(&key, &iv, &mut data).unwrap();
            assert_eq!(&data[..], b"not a multiple of the block size", "{alg}");
        }
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let alg = SymmetricKeyAlgorithm::AES128;
        let key = [1u8; 16];
        let iv = [2u8; 16];
        let mut one_shot = vec![0xA5u8; 100];
        alg.encrypt_with_iv_regular(&key, &iv, &mut one_shot).unwrap();

        let mut streamed = vec![0xA5u8; 100];
        let mut enc = CfbEncryptor::new(alg, &key, &iv).unwrap();
        let (a, b) = streamed.split_at_mut(37);
        enc.encrypt(a);
        enc.encrypt(b);
        assert_eq!(one_shot, streamed);

        let mut dec = CfbDecryptor::new(alg, &key, &iv).unwrap();
        let (a, b) = streamed.split_at_mut(3);
        dec.decrypt(a);
        dec.decrypt(b);
        assert_eq!(streamed, vec![0xA5u8; 100]);
    }

    #[test]
    fn test_bad_key_length() {
        assert!(CfbEncryptor::new(SymmetricKeyAlgorithm::AES256, &[0u8; 16], &[0u8; 16]).is_err());
    }

    proptest! {
        #[test]
        fn supported_ciphers_have_sizes(alg: SymmetricKeyAlgorithm) {
            if alg.is_supported() {
                prop_assert!(alg.block_size() > 0);
                prop_assert!(alg.key_size() > 0);
            }
        }
    }
}
