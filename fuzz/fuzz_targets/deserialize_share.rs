#![no_main]
use core::convert::TryFrom;
use libfuzzer_sys::fuzz_target;
use blindshare::Share;

fuzz_target!(|data: &[u8]| {
    let _share = Share::try_from(data);
    if let Ok(text) = core::str::from_utf8(data) {
        let _share = text.parse::<Share>();
    }
});
