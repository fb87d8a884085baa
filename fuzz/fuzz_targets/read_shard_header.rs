#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = flatshard_core::ShardHeader::from_bytes(data) {
        let _ = header.to_bytes();
        let _ = header.file_size();
    }
});
