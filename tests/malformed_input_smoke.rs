use std::io::Cursor;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use flatshard::protocol::read_request;
use flatshard::Request;
use flatshard_core::{DocumentStore, ShardHeader, ShardStore};

#[test]
fn malformed_bytes_do_not_panic_decode_paths() {
    let mut rng = StdRng::seed_from_u64(42);
    let dir = tempdir().unwrap();
    let shard = dir.path().join("junk.shard");
    let docs = dir.path().join("docs.txt");
    let refs = dir.path().join("refs.txt");

    for _ in 0..500 {
        let len = rng.gen_range(0..512usize);
        let mut data = vec![0u8; len];
        rng.fill(data.as_mut_slice());

        if let Ok(header) = ShardHeader::from_bytes(&data) {
            let _ = header.file_size();
        }

        std::fs::write(&shard, &data).unwrap();
        if let Ok(store) = ShardStore::open(&shard) {
            for i in 0..store.count.min(4) {
                let _ = store.try_get(i);
            }
        }

        std::fs::write(&docs, &data).unwrap();
        let offsets: String = (0..4).map(|_| format!("{}\n", rng.gen_range(0..600u64))).collect();
        std::fs::write(&refs, offsets).unwrap();
        if let Ok(store) = DocumentStore::open(&docs, &refs) {
            for ordinal in 0..store.len() + 1 {
                let _ = store.resolve(ordinal);
            }
        }

        let mut reader = Cursor::new(data);
        for _ in 0..16 {
            match read_request(&mut reader) {
                Ok(Request::Shutdown) => break,
                Ok(Request::Search(_)) | Err(_) => {}
            }
        }
    }
}

#[test]
fn text_shaped_garbage_does_not_panic_request_reader() {
    let mut rng = StdRng::seed_from_u64(7);
    let tokens = ["1", "2", "-1", "0", "nan", "inf", "1e40", "0.5", "", " ", "x", "999999999999999999999"];

    for _ in 0..1_000 {
        let lines = rng.gen_range(0..12usize);
        let input: String = (0..lines)
            .map(|_| format!("{}\n", tokens[rng.gen_range(0..tokens.len())]))
            .collect();

        let mut reader = Cursor::new(input.into_bytes());
        for _ in 0..16 {
            if let Ok(Request::Shutdown) = read_request(&mut reader) {
                break;
            }
        }
    }
}
