//! Behavioral properties of the HNSW index checked against an exact scan.

mod common;

use common::{build_pair, hnsw_config, overlap, random_vectors};
use semdex::config::HnswConfig;
use semdex::{HnswIndex, NeighborSelection, VectorDimension, VectorError, VectorId};

#[test]
fn test_self_retrieval() {
    let vectors = random_vectors(300, 24, 1);
    let (hnsw, _) = build_pair(&vectors, hnsw_config(8, 16, 100));

    for (i, v) in vectors.iter().enumerate() {
        let top = hnsw.search_with_ef(v, 1, 100).unwrap();
        assert_eq!(top[0].0, VectorId::new(i as u32), "vector {i} not found first");
        assert!(top[0].1.get() < 1e-4, "distance {} for vector {i}", top[0].1);
    }
}

#[test]
fn test_recall_grows_with_ef() {
    let vectors = random_vectors(500, 16, 2);
    let queries = random_vectors(40, 16, 3);
    let (hnsw, flat) = build_pair(&vectors, hnsw_config(6, 12, 80));
    let k = 10;

    let recall_at = |ef: usize| -> f64 {
        let total: f64 = queries
            .iter()
            .map(|q| {
                let approx = hnsw.search_with_ef(q, k, ef).unwrap();
                let exact = flat.search(q, k).unwrap();
                overlap(&approx, &exact)
            })
            .sum();
        total / queries.len() as f64
    };

    let recalls: Vec<f64> = [10, 40, 160, 500].iter().map(|&ef| recall_at(ef)).collect();
    for pair in recalls.windows(2) {
        assert!(pair[1] >= pair[0], "recall dropped: {recalls:?}");
    }
    assert!(recalls[3] >= 0.95, "recall at high ef too low: {recalls:?}");
}

#[test]
fn test_default_search_matches_exact_on_small_sets() {
    let vectors = random_vectors(60, 8, 4);
    let (hnsw, flat) = build_pair(&vectors, hnsw_config(5, 10, 200));

    // ef_search = 50 explores nearly everything at this size
    for q in random_vectors(10, 8, 5) {
        let approx = hnsw.search(&q, 3).unwrap();
        let exact = flat.search(&q, 3).unwrap();
        assert!(overlap(&approx, &exact) >= 2.0 / 3.0);
    }
}

#[test]
fn test_four_axis_vectors() {
    let config = HnswConfig {
        m: 2,
        m_max: 4,
        ef_construction: 10,
        seed: Some(3),
        ..HnswConfig::default()
    };
    let mut index = HnswIndex::new(VectorDimension::new(2).unwrap(), config).unwrap();
    let axes = [[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0]];
    for (i, axis) in axes.iter().enumerate() {
        index.insert(VectorId::new(i as u32), axis).unwrap();
    }

    assert_eq!(index.search(&[0.9, 0.1], 1).unwrap()[0].0, VectorId::new(0));
    assert_eq!(index.search(&[-0.9, -0.1], 1).unwrap()[0].0, VectorId::new(2));
}

#[test]
fn test_dimension_guard() {
    let vectors = random_vectors(20, 4, 6);
    let (mut hnsw, _) = build_pair(&vectors, hnsw_config(4, 8, 20));
    let before: Vec<_> = hnsw.search(&vectors[0], 5).unwrap();

    for bad in [vec![1.0; 3], vec![1.0; 5], Vec::new()] {
        assert!(matches!(
            hnsw.insert(VectorId::new(1000), &bad),
            Err(VectorError::DimensionMismatch { expected: 4, .. })
        ));
        assert!(matches!(
            hnsw.search(&bad, 1),
            Err(VectorError::DimensionMismatch { expected: 4, .. })
        ));
    }

    assert_eq!(hnsw.len(), 20);
    assert_eq!(hnsw.search(&vectors[0], 5).unwrap(), before);
}

#[test]
fn test_heuristic_selection_keeps_recall() {
    let vectors = random_vectors(400, 12, 7);
    let queries = random_vectors(20, 12, 8);
    let config = HnswConfig {
        selection: NeighborSelection::Heuristic { keep_pruned: true },
        ..hnsw_config(8, 16, 100)
    };
    let (hnsw, flat) = build_pair(&vectors, config);

    let recall: f64 = queries
        .iter()
        .map(|q| overlap(&hnsw.search_with_ef(q, 5, 100).unwrap(), &flat.search(q, 5).unwrap()))
        .sum::<f64>()
        / queries.len() as f64;
    assert!(recall >= 0.9, "heuristic recall {recall}");
}

#[test]
fn test_empty_index() {
    let index = HnswIndex::new(VectorDimension::new(8).unwrap(), HnswConfig::default()).unwrap();
    assert!(index.search(&[0.5; 8], 10).unwrap().is_empty());
    assert!(index.is_empty());
}
