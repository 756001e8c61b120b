#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Synthetic interchange directory for benchmarking: one vertex file and
/// one edge file, generated once and reused across runs.
pub struct SyntheticDataset {
    pub dir: PathBuf,
    pub vertex_count: usize,
    pub edge_count: usize,
}

impl SyntheticDataset {
    pub fn ensure(vertex_count: usize, edge_count: usize) -> Self {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("target/bench_datasets")
            .join(format!("synthetic_{vertex_count}_{edge_count}"));
        fs::create_dir_all(&dir).expect("dataset dir");
        let vertices = dir.join("Person.csv");
        if !vertices.exists() {
            write_vertices(&vertices, vertex_count);
        }
        let edges = dir.join("edge_FOLLOWS.csv");
        if !edges.exists() {
            write_edges(&edges, edge_count, vertex_count);
        }
        Self {
            dir,
            vertex_count,
            edge_count,
        }
    }
}

fn write_vertices(path: &Path, count: usize) {
    let mut writer = csv::Writer::from_path(path).expect("vertices csv");
    writer
        .write_record(["id", "name", "age"])
        .expect("header");
    let mut rng = ChaCha8Rng::seed_from_u64(0x6772_6170);
    for id in 0..count {
        let age: u8 = rng.gen_range(18..90);
        writer
            .write_record([id.to_string(), format!("user-{id}"), age.to_string()])
            .expect("row");
    }
    writer.flush().expect("flush");
}

fn write_edges(path: &Path, count: usize, vertices: usize) {
    let mut writer = csv::Writer::from_path(path).expect("edges csv");
    writer
        .write_record([
            "start_id",
            "start_vertex_type",
            "end_id",
            "end_vertex_type",
            "weight",
        ])
        .expect("header");
    let mut rng = ChaCha8Rng::seed_from_u64(0x5151_5151);
    for _ in 0..count {
        let start = rng.gen_range(0..vertices);
        let mut end = rng.gen_range(0..vertices);
        if end == start {
            end = (end + 1) % vertices;
        }
        let weight = rng.gen_range(1..1000);
        writer
            .write_record([
                start.to_string(),
                "Person".to_string(),
                end.to_string(),
                "Person".to_string(),
                weight.to_string(),
            ])
            .expect("row");
    }
    writer.flush().expect("flush");
}
