use crate::types::KeyId;

/// Represents a V4 fingerprint: SHA-1 over the public key packet body.
#[derive(Clone, Copy, Eq, PartialEq, Hash, derive_more::Debug)]
#[debug("Fingerprint({})", hex::encode(_0))]
pub struct Fingerprint([u8; 20]);

impl Fingerprint {
    pub fn new(fp: [u8; 20]) -> Self {
        Fingerprint(fp)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    /// The key id is the low-order 64 bits of the fingerprint.
    pub fn key_id(&self) -> KeyId {
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[12..]);
        KeyId::from(id)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}
