#![no_main]
use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;
use blindshare::{decrypt, ClusterKey, KeyOptions, Share};

#[derive(Debug, Arbitrary)]
struct Parameters {
    pub cluster_size: u8,
    pub threshold: u8,
    pub shares: Vec<Share>,
}

fuzz_target!(|params: Parameters| {
    let Ok(key) = ClusterKey::generate(
        params.cluster_size as usize,
        params.threshold as usize,
        &KeyOptions::default(),
    ) else {
        return;
    };
    let _secret = decrypt(&key, &params.shares);
});
