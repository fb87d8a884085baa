use std::io::Cursor;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use flatshard::{run_build_worker, run_search_worker, BuildSummary, IndexBuilder, IndexConfig, SearchEngine};
use flatshard_core::{l2_normalize, DocumentStore, DocumentWriter, ShardCatalog, ShardTemplate, Similarity};
use flatshard_encoder::{CachedEncoder, LiteralEncoder};

struct Built {
    summary: BuildSummary,
    timings: Vec<f64>,
    sync: String,
}

fn vector_text(v: &[f32]) -> String {
    v.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" ")
}

fn random_vectors(seed: u64, n: usize, dim: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let mut v: Vec<f32> = (0..dim).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
            l2_normalize(&mut v);
            v
        })
        .collect()
}

fn template(dir: &Path) -> String {
    dir.join("index_%d.shard").to_str().unwrap().to_string()
}

/// Run the build worker over `lines`, writing docs.txt/refs.txt alongside
fn build(dir: &Path, lines: &[String], dim: usize, similarity: Similarity, batch: usize, chunks: usize) -> Built {
    let config = IndexConfig::new(&template(dir), dim, similarity, batch, chunks).unwrap();
    let builder = IndexBuilder::new(config, LiteralEncoder::new(dim)).unwrap();

    let mut docs = DocumentWriter::create(dir.join("docs.txt"), dir.join("refs.txt")).unwrap();
    for (i, line) in lines.iter().filter(|l| !l.is_empty()).enumerate() {
        docs.append(&format!("doc{}", i), line).unwrap();
    }
    docs.finish().unwrap();

    let input: String = lines.iter().map(|l| format!("{}\n", l)).collect();
    let mut out = Vec::new();
    let mut sync = Vec::new();
    let summary = run_build_worker(builder, Cursor::new(input), &mut out, &mut sync).unwrap();

    let timings = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| l.parse::<f64>().unwrap())
        .collect();
    Built {
        summary,
        timings,
        sync: String::from_utf8(sync).unwrap(),
    }
}

fn engine(dir: &Path, dim: usize, similarity: Similarity) -> SearchEngine<LiteralEncoder> {
    let template = ShardTemplate::parse(&template(dir)).unwrap();
    let catalog = ShardCatalog::load(&template, dim, similarity).unwrap();
    let documents = DocumentStore::open(dir.join("docs.txt"), dir.join("refs.txt")).unwrap();
    SearchEngine::new(catalog, documents, CachedEncoder::new(LiteralEncoder::new(dim), 64)).unwrap()
}

/// Drive the search worker, returning (stdout lines, sync output, served)
fn serve(engine: &mut SearchEngine<LiteralEncoder>, input: &str) -> (Vec<String>, String, usize) {
    let mut out = Vec::new();
    let mut sync = Vec::new();
    let served = run_search_worker(engine, &mut Cursor::new(input.as_bytes()), &mut out, &mut sync).unwrap();
    let lines = String::from_utf8(out).unwrap().lines().map(str::to_string).collect();
    (lines, String::from_utf8(sync).unwrap(), served)
}

#[test]
fn seven_lines_chunk_three_gives_three_shards() {
    let dir = tempdir().unwrap();
    let vectors = random_vectors(7, 7, 4);
    let lines: Vec<String> = vectors.iter().map(|v| vector_text(v)).collect();

    let built = build(dir.path(), &lines, 4, Similarity::Dot, 1, 3);
    assert_eq!(built.summary.shard_sizes, vec![3, 3, 1]);
    assert_eq!(built.summary.total_vectors, 7);

    // init + one per batch + final flush, each answered with two timings
    assert_eq!(built.sync, "\n".repeat(9));
    assert_eq!(built.timings.len(), 16);
    assert!(built.timings.iter().all(|t| *t >= 0.0));

    let engine = engine(dir.path(), 4, Similarity::Dot);
    let catalog = engine.catalog();
    let location = catalog.locate(5).unwrap();
    assert_eq!(location.sequence(), 2);
    assert_eq!(location.offset, 1);
    assert_eq!(catalog.reconstruct(5).unwrap(), vectors[5].as_slice());
    assert!(catalog.locate(7).is_none());
}

#[test]
fn chunk_one_seals_per_batch_not_per_vector() {
    let dir = tempdir().unwrap();
    let lines: Vec<String> = random_vectors(11, 8, 3).iter().map(|v| vector_text(v)).collect();

    let built = build(dir.path(), &lines, 3, Similarity::Dot, 3, 1);
    assert_eq!(built.summary.shard_sizes, vec![3, 3, 2]);
}

#[test]
fn empty_line_flushes_without_sealing() {
    let dir = tempdir().unwrap();
    let lines: Vec<String> = ["1 0", "", "0 1", "1 1", ""].iter().map(|s| s.to_string()).collect();

    let built = build(dir.path(), &lines, 2, Similarity::Dot, 8, 100);
    assert_eq!(built.summary.shard_sizes, vec![3]);
    // init + two forced flushes + final flush
    assert_eq!(built.sync, "\n".repeat(4));
}

#[test]
fn rebuild_is_deterministic() {
    let lines: Vec<String> = random_vectors(3, 10, 5).iter().map(|v| vector_text(v)).collect();

    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let a = build(first.path(), &lines, 5, Similarity::Cosine, 2, 4);
    let b = build(second.path(), &lines, 5, Similarity::Cosine, 2, 4);

    assert_eq!(a.summary.shard_sizes, b.summary.shard_sizes);
    for sequence in 1..=a.summary.shard_sizes.len() {
        let name = format!("index_{}.shard", sequence);
        assert_eq!(
            std::fs::read(first.path().join(&name)).unwrap(),
            std::fs::read(second.path().join(&name)).unwrap()
        );
    }
}

#[test]
fn query_equal_to_indexed_vector_ranks_first() {
    let dir = tempdir().unwrap();
    let dim = 8;
    let vectors = random_vectors(42, 50, dim);
    let lines: Vec<String> = vectors.iter().map(|v| vector_text(v)).collect();
    build(dir.path(), &lines, dim, Similarity::Dot, 4, 16);

    let mut engine = engine(dir.path(), dim, Similarity::Dot);
    let target = 37;
    let request = format!("1\n{}\n1\n3\n", lines[target]);
    let (out, sync, served) = serve(&mut engine, &request);

    assert_eq!(served, 1);
    assert_eq!(sync, "\n\n");
    assert_eq!(out[0], "3");
    assert_eq!(out[1], format!("doc{}", target));
    let score: f32 = out[2].parse().unwrap();
    let self_dot: f32 = vectors[target].iter().map(|x| x * x).sum();
    assert!((score - self_dot).abs() < 1e-5);
    assert_eq!(out[3], target.to_string());
    assert_eq!(out[4], lines[target]);
    assert_eq!(out.len(), 1 + 3 * 4);
}

#[test]
fn weighted_fusion_through_worker() {
    let dir = tempdir().unwrap();
    let lines: Vec<String> = ["0.5 0.3", "-1 -1", "0 0"].iter().map(|s| s.to_string()).collect();
    build(dir.path(), &lines, 2, Similarity::Dot, 1, 2);

    let mut engine = engine(dir.path(), 2, Similarity::Dot);
    let (out, _, _) = serve(&mut engine, "2\n1 0\n2\n0 1\n1\n1\n");

    assert_eq!(out[0], "1");
    assert_eq!(out[1], "doc0");
    let score: f32 = out[2].parse().unwrap();
    assert!((score - 1.3).abs() < 1e-6);
}

#[test]
fn zero_k_ends_session_without_output() {
    let dir = tempdir().unwrap();
    let lines: Vec<String> = vec!["1 0".to_string(), "0 1".to_string()];
    build(dir.path(), &lines, 2, Similarity::Dot, 1, 1);

    let mut engine = engine(dir.path(), 2, Similarity::Dot);
    let (out, sync, served) = serve(&mut engine, "1\n1 0\n1\n0\n1\n1 0\n1\n5\n");

    assert!(out.is_empty());
    assert_eq!(sync, "\n");
    assert_eq!(served, 0);
}

#[test]
fn cosine_search_normalizes_queries() {
    let dir = tempdir().unwrap();
    let lines: Vec<String> = ["3 4", "4 3", "-1 0"].iter().map(|s| s.to_string()).collect();
    build(dir.path(), &lines, 2, Similarity::Cosine, 2, 10);

    let mut engine = engine(dir.path(), 2, Similarity::Cosine);
    let (out, _, _) = serve(&mut engine, "1\n30 40\n1\n1\n");

    assert_eq!(out[1], "doc0");
    let score: f32 = out[2].parse().unwrap();
    assert!((score - 1.0).abs() < 1e-5);
}

#[test]
fn corrupt_shard_fails_catalog_load() {
    let dir = tempdir().unwrap();
    let lines: Vec<String> = ["1 0", "0 1", "1 1"].iter().map(|s| s.to_string()).collect();
    build(dir.path(), &lines, 2, Similarity::Dot, 1, 1);

    std::fs::write(dir.path().join("index_2.shard"), b"not a shard").unwrap();
    let template = ShardTemplate::parse(&template(dir.path())).unwrap();
    assert!(ShardCatalog::load(&template, 2, Similarity::Dot).is_err());

    // a gap ends the sequence instead
    std::fs::remove_file(dir.path().join("index_2.shard")).unwrap();
    let catalog = ShardCatalog::load(&template, 2, Similarity::Dot).unwrap();
    assert_eq!(catalog.shard_count(), 1);
}
