#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use semdex::config::HnswConfig;
use semdex::{FlatIndex, HnswIndex, VectorDimension, VectorId};

/// Uniform random vectors in [-1, 1]^dim.
pub fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.random_range(-1.0f32..1.0)).collect())
        .collect()
}

/// Standard normal sample via Box-Muller.
pub fn gaussian<R: Rng>(rng: &mut R) -> f32 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
}

/// `n` points scattered around `center` with the given spread.
pub fn blob<R: Rng>(rng: &mut R, center: &[f32], spread: f32, n: usize) -> Vec<Vec<f32>> {
    (0..n)
        .map(|_| center.iter().map(|c| c + spread * gaussian(rng)).collect())
        .collect()
}

pub fn hnsw_config(m: usize, m_max: usize, ef_construction: usize) -> HnswConfig {
    HnswConfig {
        m,
        m_max,
        ef_construction,
        seed: Some(17),
        ..HnswConfig::default()
    }
}

/// Builds an HNSW index and an exact index over the same vectors, ids by position.
pub fn build_pair(vectors: &[Vec<f32>], config: HnswConfig) -> (HnswIndex, FlatIndex) {
    let dimension = VectorDimension::new(vectors[0].len()).expect("non-zero dimension");
    let mut hnsw = HnswIndex::new(dimension, config).expect("valid config");
    let mut flat = FlatIndex::new(dimension);
    for (i, v) in vectors.iter().enumerate() {
        let id = VectorId::new(i as u32);
        hnsw.insert(id, v).expect("insert into hnsw");
        flat.insert(id, v).expect("insert into flat");
    }
    (hnsw, flat)
}

/// Fraction of `exact` ids that also appear in `approx`.
pub fn overlap(approx: &[(VectorId, semdex::Distance)], exact: &[(VectorId, semdex::Distance)]) -> f64 {
    if exact.is_empty() {
        return 1.0;
    }
    let hits = exact
        .iter()
        .filter(|(id, _)| approx.iter().any(|(other, _)| other == id))
        .count();
    hits as f64 / exact.len() as f64
}
