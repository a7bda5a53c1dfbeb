//! Messages produced by GnuPG 2.4 for alice's encryption subkey.

use std::fs::File;
use std::io::BufReader;

use pgp_transform::packet::DataMode;
use pgp_transform::{DecodePipeline, ErrorKind, KeyMaterial, VerificationResult};
use pretty_assertions::assert_eq;

fn alice() -> KeyMaterial {
    let _ = pretty_env_logger::try_init();
    KeyMaterial::from_readers(
        File::open("./tests/fixtures/alice.pub.gpg").unwrap(),
        File::open("./tests/fixtures/alice.sec.gpg").unwrap(),
        b"test",
    )
    .unwrap()
}

fn plain() -> Vec<u8> {
    std::fs::read("./tests/fixtures/plain.txt").unwrap()
}

fn open(name: &str) -> BufReader<File> {
    BufReader::new(File::open(format!("./tests/fixtures/{name}")).unwrap())
}

#[test]
fn signed_message() {
    let keys = alice();
    let mut out = Vec::new();
    let report = DecodePipeline::new()
        .decode(keys.private_key(), &keys, open("gpg-signed.gpg"), &mut out)
        .unwrap();

    assert_eq!(out, plain());
    assert_eq!(report.bytes_written, 46);
    // SHA512 signature by alice's primary key, issuer only in the unhashed area
    assert_eq!(report.verification, VerificationResult::Valid);
    assert_eq!(report.header.file_name(), b"plain.txt");
    assert_eq!(report.header.mode(), DataMode::Binary);
    assert_eq!(report.header.created().timestamp(), 1792119287);
}

#[test]
fn signed_message_unknown_signer() {
    let keys = alice();
    let mut out = Vec::new();
    // only the encryption subkey, which did not sign
    let report = DecodePipeline::new()
        .decode(
            keys.private_key(),
            keys.public_key(),
            open("gpg-signed.gpg"),
            &mut out,
        )
        .unwrap();

    assert_eq!(out, plain());
    assert_eq!(report.verification, VerificationResult::Invalid);
}

#[test]
fn unsigned_armored_message() {
    let keys = alice();
    let mut out = Vec::new();
    let report = DecodePipeline::new()
        .decode(keys.private_key(), &keys, open("gpg-unsigned.asc"), &mut out)
        .unwrap();

    assert_eq!(out, plain());
    assert_eq!(report.verification, VerificationResult::Absent);
}

#[test]
fn leading_marker_packet() {
    let keys = alice();
    let mut out = Vec::new();
    let report = DecodePipeline::new()
        .decode(keys.private_key(), &keys, open("gpg-marker.gpg"), &mut out)
        .unwrap();

    assert_eq!(out, plain());
    assert_eq!(report.verification, VerificationResult::Valid);
}

#[test]
fn file_decode() {
    let keys = alice();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("plain.txt");
    let report = DecodePipeline::new()
        .decode_file(
            keys.private_key(),
            &keys,
            "./tests/fixtures/gpg-signed.gpg",
            &output,
        )
        .unwrap();

    assert_eq!(report.verification, VerificationResult::Valid);
    assert_eq!(std::fs::read(output).unwrap(), plain());
}

#[test]
fn truncated_message() {
    let keys = alice();
    let message = std::fs::read("./tests/fixtures/gpg-signed.gpg").unwrap();
    for len in [100, 300, message.len() - 10] {
        let mut out = Vec::new();
        let err = DecodePipeline::new()
            .decode(keys.private_key(), &keys, &message[..len], &mut out)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedFormat, "length {len}");
    }
}
