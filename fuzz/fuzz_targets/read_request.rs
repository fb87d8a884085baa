#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = Cursor::new(data);
    // Malformed requests fail one at a time; keep reading until shutdown
    for _ in 0..64 {
        match flatshard::protocol::read_request(&mut reader) {
            Ok(flatshard::Request::Shutdown) | Err(flatshard::RequestError::Io(_)) => break,
            _ => {}
        }
    }
});
