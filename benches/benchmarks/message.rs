use std::fs::File;

use criterion::{black_box, criterion_group, BenchmarkId, Criterion, Throughput};
use pgp_transform::types::CompressionAlgorithm;
use pgp_transform::{DecodePipeline, EncodePipeline, FileMeta, KeyMaterial};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn alice() -> KeyMaterial {
    KeyMaterial::from_readers(
        File::open("./tests/fixtures/alice.pub.gpg").unwrap(),
        File::open("./tests/fixtures/alice.sec.gpg").unwrap(),
        b"test",
    )
    .unwrap()
}

fn bench_message(c: &mut Criterion) {
    let keys = alice();
    let mut g = c.benchmark_group("message");

    for size in [1024usize, 1024 * 1024] {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut data = vec![0u8; size];
        rng.fill_bytes(&mut data);
        g.throughput(Throughput::Bytes(size as u64));

        for compression in [CompressionAlgorithm::Uncompressed, CompressionAlgorithm::ZIP] {
            let pipeline = EncodePipeline::new().compression(compression);
            let id = format!("{compression:?}");

            g.bench_with_input(BenchmarkId::new(format!("encode_{id}"), size), &data, |b, data| {
                b.iter(|| {
                    let mut out = Vec::with_capacity(size + 1024);
                    pipeline
                        .encode(
                            &mut rng,
                            keys.public_key(),
                            keys.private_key(),
                            &data[..],
                            &mut out,
                            &FileMeta::now("bench.bin"),
                        )
                        .unwrap();
                    black_box(out)
                });
            });

            let mut message = Vec::new();
            pipeline
                .encode(
                    &mut rng,
                    keys.public_key(),
                    keys.private_key(),
                    &data[..],
                    &mut message,
                    &FileMeta::now("bench.bin"),
                )
                .unwrap();
            g.bench_with_input(
                BenchmarkId::new(format!("decode_{id}"), size),
                &message,
                |b, message| {
                    b.iter(|| {
                        let mut out = Vec::with_capacity(size);
                        let report = DecodePipeline::new()
                            .decode(keys.private_key(), &keys, &message[..], &mut out)
                            .unwrap();
                        black_box((report, out))
                    });
                },
            );
        }
    }

    g.finish();
}

criterion_group!(benches, bench_message);
