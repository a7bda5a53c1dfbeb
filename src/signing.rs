//! # Signing module
//!
//! Incremental one-pass signing of a byte stream, and verification of the signature that
//! trails a literal data packet.

use chrono::{SubsecRound, Utc};
use digest::DynDigest;
use log::{debug, info, warn};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::rsa;
use crate::errors::{Error, Result};
use crate::keyring::{KeyLookup, PrivateKey};
use crate::normalize_lines::CrlfNormalizer;
use crate::packet::{
    OnePassSignature, Signature, SignatureConfig, SignatureType, Subpacket, SubpacketData,
};

/// Signs the data of one message.
///
/// The context moves from `Init` to `Signing` when the one-pass marker is emitted, and to
/// `Finalized` when the signature is produced. Calls out of that order fail with
/// [`Error::ProtocolViolation`].
#[derive(Debug)]
pub struct SignatureContext<'a> {
    key: &'a PrivateKey,
    hash_algorithm: HashAlgorithm,
    state: SigningState,
}

#[derive(derive_more::Debug)]
enum SigningState {
    Init,
    Signing {
        #[debug(skip)]
        hasher: Box<dyn DynDigest>,
    },
    Finalized,
}

impl SigningState {
    fn name(&self) -> &'static str {
        match self {
            SigningState::Init => "init",
            SigningState::Signing { .. } => "signing",
            SigningState::Finalized => "finalized",
        }
    }
}

impl<'a> SignatureContext<'a> {
    /// Binds the signing key and hash algorithm.
    pub fn begin(key: &'a PrivateKey, hash_algorithm: HashAlgorithm) -> Result<Self> {
        if !key.can_sign() || !key.algorithm().is_rsa() {
            return Err(Error::KeyUnusable {
                message: format!("key {} ({}) cannot sign", key.key_id(), key.algorithm()),
            });
        }
        if !hash_algorithm.is_supported() {
            return Err(Error::KeyUnusable {
                message: format!("signatures with {hash_algorithm} are not supported"),
            });
        }
        debug!("signing with {} and {hash_algorithm}", key.key_id());

        Ok(SignatureContext {
            key,
            hash_algorithm,
            state: SigningState::Init,
        })
    }

    /// The one-pass signature packet announcing the signature. Emitted exactly once.
    pub fn one_pass_marker(&mut self) -> Result<OnePassSignature> {
        self.expect_state("one_pass_marker", |state| matches!(state, SigningState::Init))?;
        self.state = SigningState::Signing {
            hasher: self.hash_algorithm.new_hasher()?,
        };

        Ok(OnePassSignature::new(
            SignatureType::Binary,
            self.hash_algorithm,
            self.key.algorithm(),
            self.key.key_id(),
        ))
    }

    /// Adds a chunk of the signed data.
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.state {
            SigningState::Signing { hasher } => {
                hasher.update(data);
                Ok(())
            }
            state => Err(Error::ProtocolViolation {
                message: format!("update in state {}", state.name()),
            }),
        }
    }

    /// Produces the signature over everything passed to [`SignatureContext::update`].
    pub fn finalize(&mut self) -> Result<Signature> {
        let mut hasher = match std::mem::replace(&mut self.state, SigningState::Finalized) {
            SigningState::Signing { hasher } => hasher,
            state => {
                self.state = state;
                return Err(Error::ProtocolViolation {
                    message: format!("finalize in state {}", self.state.name()),
                });
            }
        };

        let mut hashed_subpackets = vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(
                Utc::now().trunc_subsecs(0),
            ))?,
            Subpacket::regular(SubpacketData::Issuer(self.key.key_id()))?,
        ];
        if let Some(user_id) = self.key.user_id() {
            hashed_subpackets.push(Subpacket::regular(SubpacketData::SignersUserID(
                user_id.id().to_vec().into(),
            ))?);
        }
        let config = SignatureConfig::new_v4(
            SignatureType::Binary,
            self.key.algorithm(),
            self.hash_algorithm,
            hashed_subpackets,
            Vec::new(),
        );

        let len = config.hash_signature_data(&mut *hasher)?;
        hasher.update(&config.trailer(len)?);
        let digest = hasher.finalize();

        let value = rsa::sign(self.key.rsa(), self.hash_algorithm, &digest)?;
        info!("signed with key {}", self.key.key_id());
        Signature::from_config(config, [digest[0], digest[1]], &value)
    }

    fn expect_state(&self, operation: &str, allowed: impl Fn(&SigningState) -> bool) -> Result<()> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(Error::ProtocolViolation {
                message: format!("{operation} in state {}", self.state.name()),
            })
        }
    }
}

/// Outcome of checking the signature chain of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum VerificationResult {
    Valid,
    Invalid,
    /// Neither a one-pass marker nor a signature was present.
    Absent,
}

/// Hashes the literal payload announced by a one-pass signature packet.
pub struct VerificationContext {
    marker: OnePassSignature,
    hasher: Option<Box<dyn DynDigest>>,
    text: Option<CrlfNormalizer>,
    scratch: Vec<u8>,
}

impl VerificationContext {
    pub fn new(marker: OnePassSignature) -> Self {
        let hasher = match marker.hash_algorithm.new_hasher() {
            Ok(hasher) => Some(hasher),
            Err(err) => {
                warn!("cannot verify signature: {err}");
                None
            }
        };
        let text = match marker.typ {
            SignatureType::Text => Some(CrlfNormalizer::default()),
            _ => None,
        };
        VerificationContext {
            marker,
            hasher,
            text,
            scratch: Vec::new(),
        }
    }

    pub fn marker(&self) -> &OnePassSignature {
        &self.marker
    }

    pub fn update(&mut self, data: &[u8]) {
        let Some(hasher) = self.hasher.as_mut() else {
            return;
        };
        match self.text.as_mut() {
            Some(normalizer) => {
                self.scratch.clear();
                normalizer.normalize(data, &mut self.scratch);
                hasher.update(&self.scratch);
            }
            None => hasher.update(data),
        }
    }

    /// Checks `signature` against the hashed data.
    fn check(self, keys: &impl KeyLookup, signature: &Signature) -> Result<()> {
        let marker = &self.marker;
        let config = &signature.config;
        if config.typ != marker.typ
            || config.hash_alg != marker.hash_algorithm
            || config.pub_alg != marker.pub_algorithm
        {
            return Err(Error::Message {
                message: "signature does not match its one-pass marker".into(),
            });
        }
        let issuer = signature.issuer().unwrap_or(marker.key_id);
        if issuer != marker.key_id {
            return Err(Error::Message {
                message: format!("signature by {issuer}, announced {}", marker.key_id),
            });
        }
        let key = keys.find_key(&issuer).ok_or_else(|| Error::Message {
            message: format!("no public key {issuer}"),
        })?;
        if key.algorithm() != config.pub_alg && !(key.algorithm().is_rsa() && config.pub_alg.is_rsa())
        {
            return Err(Error::Message {
                message: format!("key {issuer} is {}, signature {}", key.algorithm(), config.pub_alg),
            });
        }
        let Some(mut hasher) = self.hasher else {
            return Err(Error::Message {
                message: format!("unsupported hash {}", config.hash_alg),
            });
        };

        let len = config.hash_signature_data(&mut *hasher)?;
        hasher.update(&config.trailer(len)?);
        let digest = hasher.finalize();
        if digest[..2] != signature.signed_hash_value {
            return Err(Error::Message {
                message: "signed hash value mismatch".into(),
            });
        }

        let public = key.rsa_public_key()?;
        rsa::verify(&public, config.hash_alg, &digest, &signature.rsa_value()?)
    }
}

/// Verifies the signature chain of a message.
///
/// `observed` is the context fed with the literal payload after a one-pass marker, `None`
/// when the message carried no marker.
pub fn verify(
    keys: &impl KeyLookup,
    observed: Option<VerificationContext>,
    signature: Option<&Signature>,
) -> VerificationResult {
    let result = match (observed, signature) {
        (None, None) => VerificationResult::Absent,
        (Some(_), None) => {
            warn!("one-pass marker without signature");
            VerificationResult::Invalid
        }
        (None, Some(_)) => {
            warn!("signature without one-pass marker");
            VerificationResult::Invalid
        }
        (Some(observed), Some(signature)) => match observed.check(keys, signature) {
            Ok(()) => VerificationResult::Valid,
            Err(err) => {
                warn!("signature verification failed: {err}");
                VerificationResult::Invalid
            }
        },
    };
    info!("signature verification: {result}");
    result
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;
    use crate::errors::ErrorKind;
    use crate::keyring::{KeyMaterial, PublicKey};

    fn alice() -> KeyMaterial {
        let _ = pretty_env_logger::try_init();
        KeyMaterial::from_readers(
            File::open("./tests/fixtures/alice.pub.gpg").unwrap(),
            File::open("./tests/fixtures/alice.sec.gpg").unwrap(),
            b"test",
        )
        .unwrap()
    }

    fn sign(keys: &KeyMaterial, data: &[&[u8]]) -> (OnePassSignature, Signature) {
        let mut ctx = SignatureContext::begin(keys.private_key(), HashAlgorithm::Sha256).unwrap();
        let marker = ctx.one_pass_marker().unwrap();
        for chunk in data {
            ctx.update(chunk).unwrap();
        }
        (marker, ctx.finalize().unwrap())
    }

    fn check(
        keys: &PublicKey,
        marker: &OnePassSignature,
        sig: &Signature,
        data: &[u8],
    ) -> VerificationResult {
        let mut ctx = VerificationContext::new(marker.clone());
        ctx.update(data);
        verify(keys, Some(ctx), Some(sig))
    }

    #[test]
    fn test_sign_verify() {
        let keys = alice();
        let (marker, sig) = sign(&keys, &[b"hello ", b"world"]);

        assert_eq!(marker.key_id, keys.private_key().key_id());
        assert_eq!(sig.issuer(), Some(keys.private_key().key_id()));
        assert_eq!(
            sig.config.signers_user_id(),
            Some(&b"Alice <alice@example.org>"[..])
        );
        assert!(sig.created().is_some());

        let public = keys.private_key().public_key();
        assert_eq!(
            check(public, &marker, &sig, b"hello world"),
            VerificationResult::Valid
        );
        assert_eq!(
            check(public, &marker, &sig, b"hello world!"),
            VerificationResult::Invalid
        );
    }

    #[test]
    fn test_wrong_issuer_key() {
        let keys = alice();
        let (marker, sig) = sign(&keys, &[b"data"]);
        // the primary key did not make this signature
        let primary = keys.public_keys().rings()[0].primary();
        let mut ctx = VerificationContext::new(marker);
        ctx.update(b"data");
        assert_eq!(verify(primary, Some(ctx), Some(&sig)), VerificationResult::Invalid);
    }

    #[test]
    fn test_missing_parts() {
        let keys = alice();
        let (marker, sig) = sign(&keys, &[b"data"]);
        let public = keys.public_key();

        assert_eq!(verify(public, None, None), VerificationResult::Absent);
        assert_eq!(verify(public, None, Some(&sig)), VerificationResult::Invalid);
        let ctx = VerificationContext::new(marker);
        assert_eq!(verify(public, Some(ctx), None), VerificationResult::Invalid);
    }

    #[test]
    fn test_state_machine() {
        let keys = alice();
        let mut ctx = SignatureContext::begin(keys.private_key(), HashAlgorithm::Sha1).unwrap();

        assert_eq!(ctx.update(b"early").unwrap_err().kind(), ErrorKind::ProtocolViolation);
        assert_eq!(ctx.finalize().unwrap_err().kind(), ErrorKind::ProtocolViolation);

        ctx.one_pass_marker().unwrap();
        assert_eq!(
            ctx.one_pass_marker().unwrap_err().kind(),
            ErrorKind::ProtocolViolation
        );
        ctx.update(b"data").unwrap();
        ctx.finalize().unwrap();

        assert_eq!(ctx.update(b"late").unwrap_err().kind(), ErrorKind::ProtocolViolation);
        assert_eq!(ctx.finalize().unwrap_err().kind(), ErrorKind::ProtocolViolation);
        assert_eq!(
            ctx.one_pass_marker().unwrap_err().kind(),
            ErrorKind::ProtocolViolation
        );
    }

    #[test]
    fn test_unsupported_hash() {
        let keys = alice();
        let err = SignatureContext::begin(keys.private_key(), HashAlgorithm::Md5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeyUnusable);
    }

    #[test]
    fn test_text_signature_normalizes_line_endings() {
        let keys = alice();
        let (marker, sig) = sign(&keys, &[b"line one\r\nline two\r\n"]);

        // re-sign the same canonical data as a text signature
        let mut config = sig.config.clone();
        config.typ = SignatureType::Text;
        let mut hasher = HashAlgorithm::Sha256.new_hasher().unwrap();
        hasher.update(b"line one\r\nline two\r\n");
        let len = config.hash_signature_data(&mut *hasher).unwrap();
        hasher.update(&config.trailer(len).unwrap());
        let digest = hasher.finalize();
        let value = rsa::sign(keys.private_key().rsa(), HashAlgorithm::Sha256, &digest).unwrap();
        let text_sig = Signature::from_config(config, [digest[0], digest[1]], &value).unwrap();

        let mut text_marker = marker;
        text_marker.typ = SignatureType::Text;
        let mut ctx = VerificationContext::new(text_marker);
        ctx.update(b"line one\nline");
        ctx.update(b" two\n");
        assert_eq!(
            verify(keys.public_key(), Some(ctx), Some(&text_sig)),
            VerificationResult::Valid
        );
    }
}
