use std::fs::File;

use pgp_transform::crypto::hash::HashAlgorithm;
use pgp_transform::keyring::{PublicKeyRingBundle, SecretKeyRingBundle};
use pgp_transform::{ErrorKind, KeyMaterial, KeyRingConfig, KeyRingStore, SignatureContext};
use pretty_assertions::assert_eq;

const FIXTURES: &str = "./tests/fixtures";

fn path(name: &str) -> String {
    format!("{FIXTURES}/{name}")
}

fn config(public: &str, secret: &str, passphrase: &str) -> KeyRingConfig {
    let _ = pretty_env_logger::try_init();
    KeyRingConfig::new(path(public), path(secret), passphrase)
}

#[test]
fn load_from_config() {
    let keys = KeyMaterial::load(&config("alice.pub.gpg", "alice.sec.gpg", "test")).unwrap();
    assert_eq!(keys.public_key().key_id().to_string(), "F8FD23B73113B241");
    assert_eq!(keys.private_key().key_id(), keys.secret_key().key_id());
    assert_eq!(
        keys.private_key().user_id().unwrap().to_string(),
        "Alice <alice@example.org>"
    );
}

#[test]
fn armored_key_rings() {
    let keys = KeyMaterial::load(&config("bob.pub.asc", "bob.sec.asc", "bob-pass")).unwrap();
    assert_eq!(keys.public_key().key_id(), keys.private_key().key_id());
}

#[test]
fn selection_across_rings() {
    let public = KeyRingStore::load_public_key(path("carol-alice.pub.gpg")).unwrap();
    let secret = KeyRingStore::load_secret_key(path("carol-alice.sec.gpg")).unwrap();
    assert_eq!(public.key_id().to_string(), "F8FD23B73113B241");
    assert_eq!(secret.key_id(), public.key_id());

    for _ in 0..5 {
        assert_eq!(
            KeyRingStore::load_public_key(path("carol-alice.pub.gpg")).unwrap(),
            public
        );
        assert_eq!(
            KeyRingStore::load_secret_key(path("carol-alice.sec.gpg"))
                .unwrap()
                .key_id(),
            secret.key_id()
        );
    }
}

#[test]
fn bundle_lookup() {
    let bundle = KeyRingStore::load_public_bundle(path("carol-alice.pub.gpg")).unwrap();
    assert_eq!(bundle.rings().len(), 2);
    for key in bundle.keys() {
        assert_eq!(bundle.find(&key.key_id()).unwrap(), key);
    }
}

#[test]
fn no_usable_key() {
    let err = KeyRingStore::load_public_key(path("carol.pub.gpg")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyNotFound);
    let err = KeyRingStore::load_secret_key(path("carol.sec.gpg")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyNotFound);
}

#[test]
fn bad_passphrase() {
    for passphrase in ["wrong", ""] {
        let err =
            KeyMaterial::load(&config("alice.pub.gpg", "alice.sec.gpg", passphrase)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadPassphrase);
    }

    let secret = KeyRingStore::load_secret_key(path("alice.sec.gpg")).unwrap();
    let err = KeyRingStore::derive_private_key(&secret, b"Test").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadPassphrase);
}

#[test]
fn unprotected_key() {
    let keys = KeyMaterial::load(&config("dave.pub.gpg", "dave.sec.gpg", "anything")).unwrap();
    assert!(!keys.secret_key().is_protected());
}

#[test]
fn swapped_key_rings() {
    let err = KeyMaterial::load(&config("alice.sec.gpg", "alice.pub.gpg", "test")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyRingCorrupt);

    let err = SecretKeyRingBundle::from_reader(File::open(path("alice.pub.gpg")).unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyRingCorrupt);
}

#[test]
fn garbage_key_ring() {
    let err = PublicKeyRingBundle::from_reader(&b"\xff\xff\xff\xff not a key ring"[..]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyRingCorrupt);
}

#[test]
fn signature_context_misuse() {
    let keys = KeyMaterial::load(&config("alice.pub.gpg", "alice.sec.gpg", "test")).unwrap();
    let mut ctx = SignatureContext::begin(keys.private_key(), HashAlgorithm::Sha256).unwrap();

    let err = ctx.update(b"too early").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);

    ctx.one_pass_marker().unwrap();
    ctx.update(b"data").unwrap();
    ctx.finalize().unwrap();

    let err = ctx.finalize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
}
