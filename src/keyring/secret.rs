use std::fmt;

use ::rsa::RsaPrivateKey;
use log::{debug, info};

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::rsa;
use crate::errors::{Error, KeyRole, Result};
use crate::keyring::{Classified, KeyPacket, KeyRingBundle, PublicKey, RingKey};
use crate::packet::{Packet, PublicKeyPacket, SecretKeyPacket, UserId};
use crate::types::{KeyId, PlainSecretParams, PublicParams, Tag};

/// A secret key selected from a secret key ring, still protected.
pub type SecretKey = RingKey<SecretKeyPacket>;

/// All rings of a secret key ring source.
pub type SecretKeyRingBundle = KeyRingBundle<SecretKeyPacket>;

impl KeyPacket for SecretKeyPacket {
    fn classify(packet: Packet) -> Classified<Self> {
        match packet {
            Packet::SecretKey(key) => Classified::Primary(key),
            Packet::SecretSubkey(key) => Classified::Subkey(key),
            Packet::PublicKey(_) => Classified::Foreign(Tag::PublicKey),
            Packet::PublicSubkey(_) => Classified::Foreign(Tag::PublicSubkey),
            other => Classified::Other(other),
        }
    }

    fn public_packet(&self) -> &PublicKeyPacket {
        self.public_key()
    }
}

impl SecretKeyRingBundle {
    /// The first key, across all rings, that is not a pure signing key.
    pub fn first_non_signing_key(&self) -> Result<&SecretKey> {
        let key = self
            .keys()
            .find(|key| !key.is_signing_key())
            .ok_or(Error::KeyNotFound {
                role: KeyRole::Decryption,
            })?;
        info!(
            "selected secret key {} of ring {}",
            key.key_id(),
            key.primary_key_id()
        );
        Ok(key)
    }
}

impl SecretKey {
    pub fn is_protected(&self) -> bool {
        self.packet().secret_params().is_encrypted()
    }

    /// The public half, with the same flags and user ids.
    pub fn to_public_key(&self) -> PublicKey {
        self.map_packet(|packet| packet.public_key().clone())
    }

    /// Decrypts the key material.
    ///
    /// Unprotected keys ignore the passphrase, protected keys never accept an empty one.
    pub fn unlock(&self, passphrase: &[u8]) -> Result<PrivateKey> {
        let public = self.public_packet();
        let key_id = public.key_id();
        let PublicParams::RSA { n, e } = public.public_params() else {
            return Err(Error::KeyUnusable {
                message: format!("{} keys are not supported", public.algorithm()),
            });
        };
        if !public.algorithm().is_rsa() {
            return Err(Error::KeyUnusable {
                message: format!("{} keys are not supported", public.algorithm()),
            });
        }

        let secret = self.packet().unlock(passphrase)?;
        if matches!(secret, PlainSecretParams::Opaque) {
            return Err(Error::KeyUnusable {
                message: format!("secret key {key_id} has no RSA parameters"),
            });
        }
        let inner = rsa::private_key(n, e, &secret).map_err(|err| {
            debug!("secret key {key_id} failed validation: {err}");
            if self.is_protected() {
                // a wrong key can pass the two octet checksum by chance
                Error::BadPassphrase { key_id }
            } else {
                Error::KeyUnusable {
                    message: format!("secret key {key_id} is invalid"),
                }
            }
        })?;
        info!("unlocked secret key {key_id}");

        Ok(PrivateKey {
            public: self.to_public_key(),
            inner,
        })
    }
}

/// Decrypted key material, only ever held in memory.
///
/// The RSA components are zeroized when this is dropped.
pub struct PrivateKey {
    public: PublicKey,
    inner: RsaPrivateKey,
}

impl PrivateKey {
    pub fn key_id(&self) -> KeyId {
        self.public.key_id()
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.public.algorithm()
    }

    /// The public half of the key this was derived from.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// First user id of the secret key's ring.
    pub fn user_id(&self) -> Option<&UserId> {
        self.public.primary_user_id()
    }

    /// Whether the algorithm can make signatures.
    ///
    /// Key flags are not consulted, a selected decryption subkey signs as well.
    pub fn can_sign(&self) -> bool {
        self.algorithm().can_sign()
    }

    pub(crate) fn rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key_id", &self.key_id())
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}
