use crate::{Assignment, Centroids, RGB8};
use rand::RngExt;

/// One random color per cluster, for telling labels apart at a glance.
pub fn random_palette(rng: &mut impl RngExt, k: usize) -> Vec<RGB8> {
    (0..k)
        .map(|_| RGB8::new(rng.random(), rng.random(), rng.random()))
        .collect()
}

/// RGB bytes where each pixel takes its label's color from `palette`.
///
/// # Panics
///
/// Panics if a label has no entry in `palette`.
pub fn paint_labels(assignment: &Assignment, palette: &[RGB8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(assignment.labels().len() * 3);
    for &label in assignment.labels() {
        let c = palette[label as usize];
        out.extend_from_slice(&[c.r, c.g, c.b]);
    }
    out
}

/// Pixel bytes where each pixel is replaced by its centroid's color.
///
/// # Panics
///
/// Panics if a label has no matching centroid.
pub fn remap_to_centroids(assignment: &Assignment, centroids: &Centroids) -> Vec<u8> {
    let mut out = Vec::with_capacity(assignment.labels().len() * centroids.channels());
    for &label in assignment.labels() {
        let Some(color) = centroids.get(label as usize) else {
            panic!("label {label} has no centroid");
        };
        out.extend_from_slice(color);
    }
    out
}
