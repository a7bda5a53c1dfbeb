use num_enum::{FromPrimitive, IntoPrimitive};

/// Public key algorithm identifiers.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-public-key-algorithms>
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive, derive_more::Display)]
#[repr(u8)]
pub enum PublicKeyAlgorithm {
    /// RSA (Encrypt and Sign)
    #[display("RSA")]
    RSA = 1,
    /// DEPRECATED: RSA (Encrypt-Only)
    #[display("RSA (encrypt only)")]
    RSAEncrypt = 2,
    /// DEPRECATED: RSA (Sign-Only)
    #[display("RSA (sign only)")]
    RSASign = 3,
    /// Elgamal (Encrypt-Only)
    #[display("Elgamal (encrypt only)")]
    ElgamalEncrypt = 16,
    #[display("DSA")]
    DSA = 17,
    #[display("ECDH")]
    ECDH = 18,
    #[display("ECDSA")]
    ECDSA = 19,
    /// DEPRECATED: Elgamal (Encrypt and Sign)
    #[display("Elgamal")]
    Elgamal = 20,
    #[display("Diffie-Hellman")]
    DiffieHellman = 21,
    #[display("EdDSA (legacy)")]
    EdDSALegacy = 22,
    #[display("X25519")]
    X25519 = 25,
    #[display("X448")]
    X448 = 26,
    #[display("Ed25519")]
    Ed25519 = 27,
    #[display("Ed448")]
    Ed448 = 28,

    #[num_enum(catch_all)]
    #[display("Other({_0})")]
    Other(u8),
}

impl PublicKeyAlgorithm {
    /// Whether keys of this algorithm can make signatures at all.
    pub fn can_sign(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::RSA
                | PublicKeyAlgorithm::RSASign
                | PublicKeyAlgorithm::DSA
                | PublicKeyAlgorithm::ECDSA
                | PublicKeyAlgorithm::Elgamal
                | PublicKeyAlgorithm::EdDSALegacy
                | PublicKeyAlgorithm::Ed25519
                | PublicKeyAlgorithm::Ed448
        )
    }

    /// Whether keys of this algorithm can receive encrypted session keys at all.
    pub fn can_encrypt(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::RSA
                | PublicKeyAlgorithm::RSAEncrypt
                | PublicKeyAlgorithm::ElgamalEncrypt
                | PublicKeyAlgorithm::Elgamal
                | PublicKeyAlgorithm::ECDH
                | PublicKeyAlgorithm::X25519
                | PublicKeyAlgorithm::X448
        )
    }

    /// Whether this crate implements the algorithm's operations.
    pub fn is_rsa(self) -> bool {
        matches!(
            self,
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        assert!(PublicKeyAlgorithm::RSA.can_sign());
        assert!(PublicKeyAlgorithm::RSA.can_encrypt());
        assert!(!PublicKeyAlgorithm::RSASign.can_encrypt());
        assert!(!PublicKeyAlgorithm::RSAEncrypt.can_sign());
        assert!(!PublicKeyAlgorithm::DSA.can_encrypt());
        assert!(!PublicKeyAlgorithm::Other(99).can_sign());
        assert_eq!(PublicKeyAlgorithm::from(18u8), PublicKeyAlgorithm::ECDH);
    }
}
