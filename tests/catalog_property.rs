use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use flatshard_core::{ShardBuffer, ShardCatalog, ShardTemplate, Similarity};

const DIM: usize = 6;

fn random_vector(rng: &mut StdRng) -> Vec<f32> {
    (0..DIM).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect()
}

#[test]
fn locate_and_reconstruct_agree_with_insertion_order() {
    for seed in 0..12u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let dir = tempdir().unwrap();
        let template = ShardTemplate::parse(dir.path().join("p_%d.shard").to_str().unwrap()).unwrap();

        let shard_count = rng.gen_range(1..6u32);
        let mut all = Vec::new();
        let mut sizes = Vec::new();
        for sequence in 1..=shard_count {
            let size = rng.gen_range(1..20usize);
            let mut buffer = ShardBuffer::new(DIM, Similarity::L2);
            for _ in 0..size {
                let v = random_vector(&mut rng);
                buffer.push(&v).unwrap();
                all.push(v);
            }
            buffer.persist(template.path_for(sequence)).unwrap();
            sizes.push(size);
        }

        let catalog = ShardCatalog::load(&template, DIM, Similarity::L2).unwrap();
        assert_eq!(catalog.len(), all.len(), "seed {}", seed);
        assert_eq!(catalog.shard_sizes(), sizes, "seed {}", seed);

        for (ordinal, expected) in all.iter().enumerate() {
            let location = catalog.locate(ordinal).unwrap();
            let start = catalog.starts()[location.shard];
            assert!(start <= ordinal && ordinal < start + sizes[location.shard]);
            assert_eq!(catalog.ordinal(location), Some(ordinal));
            assert_eq!(catalog.reconstruct(ordinal).unwrap(), expected.as_slice(), "seed {}", seed);
        }
        assert!(catalog.locate(all.len()).is_none());
    }
}

#[test]
fn merged_search_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(99);
    let dir = tempdir().unwrap();
    let template = ShardTemplate::parse(dir.path().join("b_%d.shard").to_str().unwrap()).unwrap();

    let mut all = Vec::new();
    for sequence in 1..=4u32 {
        let mut buffer = ShardBuffer::new(DIM, Similarity::L2Squared);
        for _ in 0..25 {
            let v = random_vector(&mut rng);
            buffer.push(&v).unwrap();
            all.push(v);
        }
        buffer.persist(template.path_for(sequence)).unwrap();
    }
    let catalog = ShardCatalog::load(&template, DIM, Similarity::L2Squared).unwrap();

    for _ in 0..20 {
        let query = random_vector(&mut rng);
        let k = rng.gen_range(1..15usize);

        let mut expected: Vec<(usize, f32)> = all
            .iter()
            .enumerate()
            .map(|(i, v)| (i, v.iter().zip(&query).map(|(a, b)| (a - b) * (a - b)).sum()))
            .collect();
        expected.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        expected.truncate(k);

        let hits = catalog.search(&query, k).unwrap();
        let got: Vec<usize> = hits.iter().map(|h| h.id).collect();
        let want: Vec<usize> = expected.iter().map(|e| e.0).collect();
        assert_eq!(got, want);
        for (hit, (_, distance)) in hits.iter().zip(&expected) {
            assert!((hit.value - distance).abs() < 1e-4);
        }
    }
}
