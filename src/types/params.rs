mod encrypted_secret;
mod plain_secret;
mod public;

pub use self::{
    encrypted_secret::EncryptedSecretParams,
    plain_secret::PlainSecretParams,
    public::PublicParams,
};

/// The secret half of a key packet, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretParams {
    Plain(PlainSecretParams),
    Encrypted(EncryptedSecretParams),
}

impl SecretParams {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretParams::Encrypted(_))
    }
}
