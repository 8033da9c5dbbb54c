#![no_main]
use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;
use blindshare::{decrypt, encrypt, ClusterKey, KeyOptions};

#[derive(Debug, Arbitrary)]
struct Parameters {
    pub cluster_size: u8,
    pub threshold: u8,
    pub secret: Vec<u8>,
}

fuzz_target!(|params: Parameters| {
    let Ok(key) = ClusterKey::generate(
        params.cluster_size as usize,
        params.threshold as usize,
        &KeyOptions::default(),
    ) else {
        return;
    };
    let Ok(shares) = encrypt(&key, &params.secret) else {
        return;
    };
    let start = shares.len() - key.threshold() as usize;
    assert_eq!(decrypt(&key, &shares[start..]).unwrap(), params.secret);
});
