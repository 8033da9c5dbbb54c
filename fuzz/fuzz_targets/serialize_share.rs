#![no_main]
use core::convert::TryFrom;
use libfuzzer_sys::fuzz_target;

use blindshare::Share;

fuzz_target!(|share: Share| {
    let data: Vec<u8> = (&share).into();
    if !share.is_empty() {
        assert!(Share::try_from(data.as_slice()).is_ok() || share.index() == 0 || share.threshold() == 0);
    }
});
