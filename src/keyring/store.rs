use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::info;
use zeroize::Zeroizing;

use crate::errors::{Error, Result};
use crate::keyring::{
    KeyLookup, PrivateKey, PublicKey, PublicKeyRingBundle, SecretKey, SecretKeyRingBundle,
};
use crate::types::KeyId;

/// Where the key material for one operation comes from.
#[derive(Clone, derive_more::Debug)]
pub struct KeyRingConfig {
    /// Key ring holding the recipient's encryption key and the signers' verification keys.
    pub public_key_ring: PathBuf,
    /// Key ring holding our own key.
    pub secret_key_ring: PathBuf,
    #[debug(skip)]
    pub passphrase: Zeroizing<String>,
}

impl KeyRingConfig {
    pub fn new(
        public_key_ring: impl Into<PathBuf>,
        secret_key_ring: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        KeyRingConfig {
            public_key_ring: public_key_ring.into(),
            secret_key_ring: secret_key_ring.into(),
            passphrase: Zeroizing::new(passphrase.into()),
        }
    }
}

/// Loads key rings and selects keys from them.
///
/// Selection is a fixed policy: the first encryption key of the public rings, and the first
/// key of the secret rings that is not a pure signing key. Rings are searched in source
/// order, keys in storage order, and nothing is cached between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyRingStore;

impl KeyRingStore {
    pub fn load_public_bundle(path: impl AsRef<Path>) -> Result<PublicKeyRingBundle> {
        PublicKeyRingBundle::from_reader(open(path.as_ref())?)
    }

    pub fn load_secret_bundle(path: impl AsRef<Path>) -> Result<SecretKeyRingBundle> {
        SecretKeyRingBundle::from_reader(open(path.as_ref())?)
    }

    pub fn load_public_key(path: impl AsRef<Path>) -> Result<PublicKey> {
        let bundle = Self::load_public_bundle(path)?;
        Ok(bundle.first_encryption_key()?.clone())
    }

    pub fn load_secret_key(path: impl AsRef<Path>) -> Result<SecretKey> {
        let bundle = Self::load_secret_bundle(path)?;
        Ok(bundle.first_non_signing_key()?.clone())
    }

    pub fn derive_private_key(secret_key: &SecretKey, passphrase: &[u8]) -> Result<PrivateKey> {
        secret_key.unlock(passphrase)
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| {
        info!("cannot open key ring {}: {source}", path.display());
        Error::SourceUnreadable { source }
    })
}

/// The keys one encode or decode operation needs.
///
/// The private key is derived from the selected secret key, which comes from the secret key
/// ring this was built from.
#[derive(Debug)]
pub struct KeyMaterial {
    public_key: PublicKey,
    secret_key: SecretKey,
    private_key: PrivateKey,
    public_keys: PublicKeyRingBundle,
}

impl KeyMaterial {
    pub fn load(config: &KeyRingConfig) -> Result<Self> {
        info!(
            "loading keys from {} and {}",
            config.public_key_ring.display(),
            config.secret_key_ring.display()
        );
        Self::from_readers(
            open(&config.public_key_ring)?,
            open(&config.secret_key_ring)?,
            config.passphrase.as_bytes(),
        )
    }

    /// Builds the key material from in-memory or otherwise opened key rings.
    pub fn from_readers(
        public_key_ring: impl Read,
        secret_key_ring: impl Read,
        passphrase: &[u8],
    ) -> Result<Self> {
        let public_keys = PublicKeyRingBundle::from_reader(public_key_ring)?;
        let public_key = public_keys.first_encryption_key()?.clone();
        let secret_key = SecretKeyRingBundle::from_reader(secret_key_ring)?
            .first_non_signing_key()?
            .clone();
        let private_key = KeyRingStore::derive_private_key(&secret_key, passphrase)?;

        Ok(KeyMaterial {
            public_key,
            secret_key,
            private_key,
            public_keys,
        })
    }

    /// The recipient's encryption key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Every key of the public key ring, used to find signers.
    pub fn public_keys(&self) -> &PublicKeyRingBundle {
        &self.public_keys
    }
}

impl KeyLookup for KeyMaterial {
    fn find_key(&self, key_id: &KeyId) -> Option<&PublicKey> {
        self.public_keys.find(key_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    const FIXTURES: &str = "./tests/fixtures";

    fn config(public: &str, secret: &str, passphrase: &str) -> KeyRingConfig {
        KeyRingConfig::new(
            format!("{FIXTURES}/{public}"),
            format!("{FIXTURES}/{secret}"),
            passphrase,
        )
    }

    #[test]
    fn test_load() {
        let _ = pretty_env_logger::try_init();
        let keys = KeyMaterial::load(&config("alice.pub.gpg", "alice.sec.gpg", "test")).unwrap();
        assert_eq!(keys.public_key().key_id(), keys.private_key().key_id());
        assert_eq!(keys.secret_key().key_id(), keys.private_key().key_id());
        assert!(keys.find_key(&keys.public_key().primary_key_id()).is_some());
    }

    #[test]
    fn test_passphrase_not_in_debug() {
        let config = config("a", "b", "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_missing_file() {
        let err = KeyMaterial::load(&config("missing.gpg", "alice.sec.gpg", "test")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnreadable);
        let err = KeyRingStore::load_secret_key(format!("{FIXTURES}/missing.gpg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnreadable);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let first =
            KeyRingStore::load_public_key(format!("{FIXTURES}/carol-alice.pub.gpg")).unwrap();
        for _ in 0..3 {
            let again =
                KeyRingStore::load_public_key(format!("{FIXTURES}/carol-alice.pub.gpg")).unwrap();
            assert_eq!(again, first);
        }
    }
}
