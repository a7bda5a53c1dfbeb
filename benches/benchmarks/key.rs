use std::fs;

use criterion::{black_box, criterion_group, Criterion, Throughput};
use pgp_transform::keyring::{PublicKeyRingBundle, SecretKeyRingBundle};
use pgp_transform::KeyRingStore;

fn bench_key(c: &mut Criterion) {
    let mut g = c.benchmark_group("key");

    {
        let bytes = fs::read("./tests/fixtures/carol-alice.pub.gpg").unwrap();
        g.throughput(Throughput::Bytes(bytes.len() as u64));
        g.bench_function("parse_public_bundle", |b| {
            b.iter(|| black_box(PublicKeyRingBundle::from_reader(&bytes[..]).unwrap()));
        });
    }

    {
        let bytes = fs::read("./tests/fixtures/bob.pub.asc").unwrap();
        g.throughput(Throughput::Bytes(bytes.len() as u64));
        g.bench_function("parse_armored_public_bundle", |b| {
            b.iter(|| black_box(PublicKeyRingBundle::from_reader(&bytes[..]).unwrap()));
        });
    }

    {
        let bytes = fs::read("./tests/fixtures/alice.sec.gpg").unwrap();
        let bundle = SecretKeyRingBundle::from_reader(&bytes[..]).unwrap();
        let key = bundle.first_non_signing_key().unwrap();
        g.bench_function("unlock_secret_key", |b| {
            b.iter(|| black_box(KeyRingStore::derive_private_key(key, b"test").unwrap()));
        });
    }

    g.finish();
}

criterion_group!(benches, bench_key);
