use ::rsa::RsaPublicKey;
use log::info;

use crate::errors::{Error, KeyRole, Result};
use crate::keyring::{Classified, KeyPacket, KeyRingBundle, RingKey};
use crate::packet::{Packet, PublicKeyPacket};
use crate::types::{KeyId, Tag};

/// A public key selected from a public key ring.
pub type PublicKey = RingKey<PublicKeyPacket>;

/// All rings of a public key ring source.
pub type PublicKeyRingBundle = KeyRingBundle<PublicKeyPacket>;

impl KeyPacket for PublicKeyPacket {
    fn classify(packet: Packet) -> Classified<Self> {
        match packet {
            Packet::PublicKey(key) => Classified::Primary(key),
            Packet::PublicSubkey(key) => Classified::Subkey(key),
            Packet::SecretKey(_) => Classified::Foreign(Tag::SecretKey),
            Packet::SecretSubkey(_) => Classified::Foreign(Tag::SecretSubkey),
            other => Classified::Other(other),
        }
    }

    fn public_packet(&self) -> &PublicKeyPacket {
        self
    }
}

impl PublicKey {
    /// The key as usable by the RSA primitives.
    pub fn rsa_public_key(&self) -> Result<RsaPublicKey> {
        self.public_packet().rsa_public_key()
    }
}

impl PublicKeyRingBundle {
    /// The first key, across all rings, that can encrypt.
    pub fn first_encryption_key(&self) -> Result<&PublicKey> {
        let key = self
            .keys()
            .find(|key| key.is_encryption_key())
            .ok_or(Error::KeyNotFound {
                role: KeyRole::Encryption,
            })?;
        info!(
            "selected encryption key {} of ring {}",
            key.key_id(),
            key.primary_key_id()
        );
        Ok(key)
    }
}

/// Resolves the key that made a signature.
pub trait KeyLookup {
    fn find_key(&self, key_id: &KeyId) -> Option<&PublicKey>;
}

impl KeyLookup for PublicKey {
    fn find_key(&self, key_id: &KeyId) -> Option<&PublicKey> {
        (&self.key_id() == key_id).then_some(self)
    }
}

impl KeyLookup for PublicKeyRingBundle {
    fn find_key(&self, key_id: &KeyId) -> Option<&PublicKey> {
        self.find(key_id)
    }
}

impl<T: KeyLookup> KeyLookup for &T {
    fn find_key(&self, key_id: &KeyId) -> Option<&PublicKey> {
        (*self).find_key(key_id)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;
    use crate::errors::ErrorKind;

    fn load(name: &str) -> PublicKeyRingBundle {
        let _ = pretty_env_logger::try_init();
        let file = File::open(format!("./tests/fixtures/{name}")).unwrap();
        PublicKeyRingBundle::from_reader(file).unwrap()
    }

    #[test]
    fn test_alice_binary() {
        let bundle = load("alice.pub.gpg");
        assert_eq!(bundle.rings().len(), 1);

        let primary = bundle.rings()[0].primary();
        assert_eq!(primary.key_id().to_string(), "45C3BECE11CD383C");
        assert_eq!(
            primary.fingerprint().unwrap().to_string(),
            "A850725492607D88B313CEDE45C3BECE11CD383C"
        );
        assert!(primary.is_signing_key());
        assert!(!primary.is_encryption_key());
        assert_eq!(
            primary.primary_user_id().unwrap().to_string(),
            "Alice <alice@example.org>"
        );

        let key = bundle.first_encryption_key().unwrap();
        assert_eq!(key.key_id().to_string(), "F8FD23B73113B241");
        assert!(!key.is_primary());
        assert!(key.rsa_public_key().is_ok());
    }

    #[test]
    fn test_armored_bundle() {
        let bundle = load("bob.pub.asc");
        assert!(!bundle.is_empty());
        assert!(bundle.first_encryption_key().is_ok());
    }

    #[test]
    fn test_several_rings_select_in_order() {
        let bundle = load("carol-alice.pub.gpg");
        assert_eq!(bundle.rings().len(), 2);
        // alice's primary key only signs, her subkey is the first encryption key
        assert_eq!(
            bundle.first_encryption_key().unwrap().key_id().to_string(),
            "F8FD23B73113B241"
        );
        assert!(bundle
            .find(&bundle.rings()[0].primary().key_id())
            .is_some());
    }

    #[test]
    fn test_sign_only_ring_has_no_encryption_key() {
        let bundle = load("carol.pub.gpg");
        let err = bundle.first_encryption_key().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_secret_ring_is_not_a_public_ring() {
        let file = File::open("./tests/fixtures/alice.sec.gpg").unwrap();
        let err = PublicKeyRingBundle::from_reader(file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyRingCorrupt);
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let err = PublicKeyRingBundle::from_reader(&b"hello world"[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyRingCorrupt);
    }

    #[test]
    fn test_empty_source_has_no_keys() {
        let bundle = PublicKeyRingBundle::from_reader(&b""[..]).unwrap();
        assert!(bundle.is_empty());
        assert_eq!(
            bundle.first_encryption_key().unwrap_err().kind(),
            ErrorKind::KeyNotFound
        );
    }

    #[test]
    fn test_lookup() {
        let bundle = load("alice.pub.gpg");
        let id = KeyId::from([0x45, 0xC3, 0xBE, 0xCE, 0x11, 0xCD, 0x38, 0x3C]);
        assert!(bundle.find_key(&id).is_some());
        let key = bundle.first_encryption_key().unwrap();
        assert!(key.find_key(&id).is_none());
        assert!(key.find_key(&key.key_id()).is_some());
    }
}
