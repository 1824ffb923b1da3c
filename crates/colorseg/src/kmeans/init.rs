use crate::types::Centroids;
use crate::{
    DuplicateInitialIndexSnafu, InitialIndexOutOfRangeSnafu, InputImage, SegmentError,
    TooManyClustersSnafu, WrongInitialIndexCountSnafu, ZeroClustersSnafu,
};
use rand::RngExt;
use snafu::prelude::*;

/// Supplies the flat pixel indices that seed the initial centroids.
///
/// Every random number generator is an index source that samples uniformly
/// without replacement. Use [`FixedIndices`] to pin the seeds.
pub trait IndexSource {
    /// Returns `amount` distinct indices in `0..length`.
    fn sample_indices(&mut self, length: usize, amount: usize) -> Vec<usize>;
}

impl<R: RngExt + ?Sized> IndexSource for R {
    fn sample_indices(&mut self, length: usize, amount: usize) -> Vec<usize> {
        rand::seq::index::sample(self, length, amount).into_vec()
    }
}

/// Replays a caller-chosen list of pixel indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedIndices(pub Vec<usize>);

impl IndexSource for FixedIndices {
    fn sample_indices(&mut self, _length: usize, _amount: usize) -> Vec<usize> {
        self.0.clone()
    }
}

fn validate_indices(indices: &[usize], pixels: usize, k: usize) -> Result<(), SegmentError> {
    ensure!(
        indices.len() == k,
        WrongInitialIndexCountSnafu {
            expected: k,
            got: indices.len(),
        }
    );
    if let Some(&index) = indices.iter().find(|&&i| i >= pixels) {
        return InitialIndexOutOfRangeSnafu { index, pixels }.fail();
    }

    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
        return DuplicateInitialIndexSnafu { index: pair[0] }.fail();
    }
    Ok(())
}

/// Picks the colors of `k` distinct pixels as the initial centroids.
pub fn initialize_centroids(
    index_source: &mut (impl IndexSource + ?Sized),
    image: &InputImage,
    k: usize,
) -> Result<Centroids, SegmentError> {
    let pixels = image.pixel_count();
    ensure!(k >= 1, ZeroClustersSnafu);
    ensure!(k <= pixels, TooManyClustersSnafu { k, pixels });

    let indices = index_source.sample_indices(pixels, k);
    validate_indices(&indices, pixels, k)?;

    let mut values = Vec::with_capacity(k * image.channels());
    for &i in &indices {
        values.extend_from_slice(image.pixel(i));
    }

    Ok(Centroids::from_values(image.channels(), values))
}
