use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use blindshare::{decrypt, encrypt, ClusterKey, KeyOptions, Share};

fn generate(c: &mut Criterion) {
    let options = KeyOptions::default();

    c.bench_function("generate_key_5_of_9", |b| {
        b.iter(|| ClusterKey::generate(black_box(9), black_box(5), &options))
    });
    c.bench_function("generate_key_128_of_255", |b| {
        b.iter(|| ClusterKey::generate(black_box(255), black_box(128), &options))
    });
}

fn split(c: &mut Criterion) {
    let key = ClusterKey::generate(9, 5, &KeyOptions::default()).unwrap();
    let small = [1u8; 32];
    let large = vec![7u8; 4096];

    c.bench_function("encrypt_32_bytes", |b| {
        b.iter(|| encrypt(&key, black_box(&small)))
    });
    c.bench_function("encrypt_4_kib", |b| b.iter(|| encrypt(&key, black_box(&large))));
}

fn recover(c: &mut Criterion) {
    let key = ClusterKey::generate(9, 5, &KeyOptions::default()).unwrap();
    let shares = encrypt(&key, &[1u8; 32]).unwrap();
    let picked = &shares[2..7];

    c.bench_function("decrypt_32_bytes", |b| {
        b.iter(|| decrypt(&key, black_box(picked)))
    });
}

fn share(c: &mut Criterion) {
    let key = ClusterKey::generate(3, 2, &KeyOptions::default()).unwrap();
    let share = encrypt(&key, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]).unwrap().remove(0);
    let bytes_vec = Vec::from(&share);
    let bytes = bytes_vec.as_slice();
    let encoded = share.to_base64();

    c.bench_function("share_from_bytes", |b| {
        b.iter(|| Share::try_from(black_box(bytes)))
    });
    c.bench_function("share_to_bytes", |b| {
        b.iter(|| Vec::from(black_box(&share)))
    });
    c.bench_function("share_from_base64", |b| {
        b.iter(|| black_box(encoded.as_str()).parse::<Share>())
    });
}

criterion_group!(benches, generate, split, recover, share);
criterion_main!(benches);
