use crate::types::{Assignment, Centroids};

pub mod init;
pub mod lloyds;

// Plain Lloyd's algorithm over integer channel values:
// - centroids are seeded from k distinct pixels picked uniformly at random
// - centroid means are floored to integers, so the loop reaches an exact
//   fixed point instead of needing a tolerance
// - empty clusters keep their previous centroid

#[derive(Debug)]
pub struct Clustering {
    pub centroids: Centroids,
    pub assignment: Assignment,
    pub iterations: usize,
    pub converged: bool,
    pub cluster_sizes: Vec<usize>,
}
