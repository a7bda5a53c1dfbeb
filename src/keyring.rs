//! # Key ring module
//!
//! Reads public and secret key ring bundles and selects the keys a message operation needs.

mod bundle;
mod public;
mod secret;
mod store;

pub use self::{
    bundle::{Classified, KeyPacket, KeyRing, KeyRingBundle, RingKey},
    public::{KeyLookup, PublicKey, PublicKeyRingBundle},
    secret::{PrivateKey, SecretKey, SecretKeyRingBundle},
    store::{KeyMaterial, KeyRingConfig, KeyRingStore},
};
