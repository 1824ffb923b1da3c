use super::Clustering;
use crate::InputImage;
use crate::types::{Assignment, Centroids, squared_distance};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::trace;

/// Index of the closest centroid. Exact ties go to the lowest index.
#[inline(always)]
fn nearest_centroid(pixel: &[u8], centroids: &Centroids) -> u32 {
    let mut iter = centroids.iter().enumerate();
    let Some((_, first)) = iter.next() else {
        unreachable!("at least one centroid is required");
    };

    let mut min = squared_distance(pixel, first);
    let mut min_idx = 0;
    for (j, centroid) in iter {
        let d = squared_distance(pixel, centroid);
        if d < min {
            min = d;
            min_idx = j;
        }
    }

    min_idx as u32
}

#[cfg_attr(feature = "rayon", allow(dead_code))]
fn assign_points_serial(image: &InputImage, centroids: &Centroids, labels: &mut [u32]) {
    for (pixel, label) in image.pixels().zip(labels.iter_mut()) {
        *label = nearest_centroid(pixel, centroids);
    }
}

#[cfg(feature = "rayon")]
fn assign_points_parallel(image: &InputImage, centroids: &Centroids, labels: &mut [u32]) {
    labels
        .par_chunks_mut(image.width() as usize)
        .zip(image.as_bytes().par_chunks(image.row_len()))
        .for_each(|(label_row, pixel_row)| {
            for (pixel, label) in pixel_row.chunks_exact(image.channels()).zip(label_row) {
                *label = nearest_centroid(pixel, centroids);
            }
        });
}

/// Overwrites every label with the index of the nearest centroid.
#[inline]
pub fn assign_points(image: &InputImage, centroids: &Centroids, assignment: &mut Assignment) {
    assert!(!centroids.is_empty());
    assert_eq!(centroids.channels(), image.channels());
    assert_eq!(assignment.labels().len(), image.pixel_count());

    #[cfg(feature = "rayon")]
    assign_points_parallel(image, centroids, assignment.labels_mut());
    #[cfg(not(feature = "rayon"))]
    assign_points_serial(image, centroids, assignment.labels_mut());
}

pub fn assign_clusters(image: &InputImage, centroids: &Centroids) -> Assignment {
    let mut assignment = Assignment::new(image.width(), image.height());
    assign_points(image, centroids, &mut assignment);
    assignment
}

/// Exact per-cluster channel sums and member counts.
///
/// Parallel workers each fold into their own accumulator and the partials
/// are merged, so no two threads ever touch the same sums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accumulator {
    channels: usize,
    sums: Vec<u64>,
    counts: Vec<usize>,
}

impl Accumulator {
    pub fn new(k: usize, channels: usize) -> Self {
        Self {
            channels,
            sums: vec![0; k * channels],
            counts: vec![0; k],
        }
    }

    #[inline(always)]
    pub fn add(&mut self, label: usize, pixel: &[u8]) {
        self.counts[label] += 1;
        let sums = &mut self.sums[label * self.channels..(label + 1) * self.channels];
        for (sum, &value) in sums.iter_mut().zip(pixel) {
            *sum += value as u64;
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.sums.iter_mut().zip(&other.sums) {
            *a += b;
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        self
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    fn sums(&self, cluster: usize) -> &[u64] {
        &self.sums[cluster * self.channels..(cluster + 1) * self.channels]
    }
}

#[cfg_attr(feature = "rayon", allow(dead_code))]
fn accumulate_serial(image: &InputImage, labels: &[u32], k: usize) -> Accumulator {
    let mut acc = Accumulator::new(k, image.channels());
    for (pixel, &label) in image.pixels().zip(labels) {
        assert!((label as usize) < k);
        acc.add(label as usize, pixel);
    }
    acc
}

#[cfg(feature = "rayon")]
fn accumulate_parallel(image: &InputImage, labels: &[u32], k: usize) -> Accumulator {
    let channels = image.channels();
    image
        .as_bytes()
        .par_chunks(image.row_len())
        .zip(labels.par_chunks(image.width() as usize))
        .fold(
            || Accumulator::new(k, channels),
            |mut acc, (pixel_row, label_row)| {
                for (pixel, &label) in pixel_row.chunks_exact(channels).zip(label_row) {
                    assert!((label as usize) < k);
                    acc.add(label as usize, pixel);
                }
                acc
            },
        )
        .reduce(|| Accumulator::new(k, channels), Accumulator::merge)
}

#[derive(Debug)]
pub struct UpdateResult {
    pub centroids: Centroids,
    pub counts: Vec<usize>,
}

/// Recomputes every centroid as the floored per-channel mean of its members.
/// Clusters without members keep their value from `previous`.
pub fn update_centroids(
    image: &InputImage,
    assignment: &Assignment,
    previous: &Centroids,
) -> UpdateResult {
    assert_eq!(assignment.labels().len(), image.pixel_count());
    assert_eq!(previous.channels(), image.channels());

    let k = previous.len();

    #[cfg(feature = "rayon")]
    let acc = accumulate_parallel(image, assignment.labels(), k);
    #[cfg(not(feature = "rayon"))]
    let acc = accumulate_serial(image, assignment.labels(), k);

    let mut centroids = previous.clone();
    for (i, &count) in acc.counts().iter().enumerate() {
        if count == 0 {
            // It's an empty cluster, keep the old centroid
            continue;
        }

        for (value, &sum) in centroids.centroid_mut(i).iter_mut().zip(acc.sums(i)) {
            // A mean of u8 values always fits in u8
            *value = (sum / count as u64) as u8;
        }
    }

    UpdateResult {
        centroids,
        counts: acc.counts,
    }
}

/// Runs assign/update rounds from `centroids` until they stop changing or
/// `max_iterations` rounds have run.
///
/// The returned assignment is always the one computed from the returned
/// centroids.
pub fn lloyds_loop(
    image: &InputImage,
    mut centroids: Centroids,
    max_iterations: usize,
) -> Clustering {
    assert!(max_iterations > 0);
    assert!(!centroids.is_empty());
    assert!(centroids.len() <= image.pixel_count());

    let k = centroids.len();
    let mut assignment = Assignment::new(image.width(), image.height());

    for i in 0..max_iterations {
        assign_points(image, &centroids, &mut assignment);
        let update = update_centroids(image, &assignment, &centroids);

        trace!(iteration = i + 1, cluster_sizes = ?update.counts, "lloyd iteration");

        if update.centroids == centroids {
            return Clustering {
                centroids,
                assignment,
                iterations: i + 1,
                converged: true,
                cluster_sizes: update.counts,
            };
        }
        centroids = update.centroids;
    }

    // Out of iterations: relabel against the final centroids
    assign_points(image, &centroids, &mut assignment);
    let cluster_sizes = assignment.cluster_sizes(k);

    Clustering {
        centroids,
        assignment,
        iterations: max_iterations,
        converged: false,
        cluster_sizes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmeans::init::{FixedIndices, initialize_centroids};
    use crate::rng;
    use pretty_assertions::assert_eq;
    use rand::RngExt;

    fn random_image(width: u16, height: u16, seed: u64) -> Vec<u8> {
        let mut rng = rng::with_seed(seed);
        (0..width as usize * height as usize * 3)
            .map(|_| rng.random::<u8>())
            .collect()
    }

    // Black left half, white right half
    fn two_tone(width: u16, height: u16) -> Vec<u8> {
        (0..height)
            .flat_map(|_| 0..width)
            .flat_map(|x| if x < width / 2 { [0; 3] } else { [255; 3] })
            .collect()
    }

    #[test]
    fn test_assign_is_nearest() {
        let buf = random_image(23, 17, 1);
        let image = InputImage::from_bytes(23, 17, &buf).unwrap();
        let centroids = initialize_centroids(&mut rng::new(), &image, 6).unwrap();

        let assignment = assign_clusters(&image, &centroids);
        assert_eq!(assignment.width(), 23);
        assert_eq!(assignment.height(), 17);

        for (i, &label) in assignment.labels().iter().enumerate() {
            let pixel = image.pixel(i);
            let assigned = squared_distance(pixel, centroids.get(label as usize).unwrap());
            for other in centroids.iter() {
                assert!(
                    assigned <= squared_distance(pixel, other),
                    "pixel {i} assigned to a farther centroid",
                );
            }
        }
    }

    #[test]
    fn test_assign_ties_pick_lowest_index() {
        let buf = [10, 10, 10, 0, 0, 0];
        let image = InputImage::from_bytes(2, 1, &buf).unwrap();

        // [10,10,10] is equidistant from both; [0,0,0] matches the duplicated centroid
        let centroids = Centroids::from_values(3, vec![20, 20, 20, 0, 0, 0, 0, 0, 0]);
        let assignment = assign_clusters(&image, &centroids);
        assert_eq!(assignment.labels(), &[0, 1]);
    }

    #[test]
    fn test_assign_many_channels() {
        // 255^2 * 70_000 is past u32::MAX
        let channels = 70_000;
        let mut buf = vec![0u8; channels];
        buf.extend(std::iter::repeat_n(255u8, channels));
        let image = InputImage::from_bytes_with_channels(2, 1, channels, &buf).unwrap();
        let centroids = initialize_centroids(&mut FixedIndices(vec![0, 1]), &image, 2).unwrap();

        let assignment = assign_clusters(&image, &centroids);
        assert_eq!(assignment.labels(), &[0, 1]);

        let result = lloyds_loop(&image, centroids, 15);
        assert!(result.converged);
        assert_eq!(result.cluster_sizes, vec![1, 1]);
    }

    #[test]
    fn test_update_floors_means() {
        let buf = [1, 2, 3, 2, 3, 5, 100, 100, 100];
        let image = InputImage::from_bytes(3, 1, &buf).unwrap();
        let mut assignment = Assignment::new(3, 1);
        assignment.labels_mut().copy_from_slice(&[0, 0, 1]);

        let previous = Centroids::from_values(3, vec![0, 0, 0, 0, 0, 0]);
        let result = update_centroids(&image, &assignment, &previous);

        // (1+2)/2 = 1.5, (2+3)/2 = 2.5, (3+5)/2 = 4
        assert_eq!(result.centroids.as_flat(), &[1, 2, 4, 100, 100, 100]);
        assert_eq!(result.counts, vec![2, 1]);
    }

    #[test]
    fn test_update_keeps_empty_cluster() {
        let buf = [10, 20, 30, 30, 40, 50];
        let image = InputImage::from_bytes(2, 1, &buf).unwrap();
        let mut assignment = Assignment::new(2, 1);
        assignment.labels_mut().copy_from_slice(&[1, 1]);

        let previous = Centroids::from_values(3, vec![7, 8, 9, 0, 0, 0, 250, 251, 252]);
        let result = update_centroids(&image, &assignment, &previous);

        assert_eq!(result.centroids.get(0), Some(&[7u8, 8, 9][..]));
        assert_eq!(result.centroids.get(1), Some(&[20u8, 30, 40][..]));
        assert_eq!(result.centroids.get(2), Some(&[250u8, 251, 252][..]));
        assert_eq!(result.counts, vec![0, 2, 0]);
    }

    #[test]
    fn test_accumulator_merge() {
        let mut a = Accumulator::new(2, 3);
        a.add(0, &[1, 2, 3]);
        let mut b = Accumulator::new(2, 3);
        b.add(0, &[10, 20, 30]);
        b.add(1, &[255, 255, 255]);

        let merged = a.merge(b);
        assert_eq!(merged.counts(), &[2, 1]);
        assert_eq!(merged.sums(0), &[11, 22, 33]);
        assert_eq!(merged.sums(1), &[255, 255, 255]);
    }

    #[test]
    fn test_converges_immediately_from_true_centers() {
        let buf = two_tone(6, 4);
        let image = InputImage::from_bytes(6, 4, &buf).unwrap();
        // Pixel 5 is white, pixel 0 black
        let centroids = initialize_centroids(&mut FixedIndices(vec![5, 0]), &image, 2).unwrap();

        let result = lloyds_loop(&image, centroids, 15);
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.centroids.as_flat(), &[255, 255, 255, 0, 0, 0]);
        assert_eq!(result.cluster_sizes, vec![12, 12]);
    }

    #[test]
    fn test_recovers_from_duplicate_seed_colors() {
        let buf = two_tone(6, 4);
        let image = InputImage::from_bytes(6, 4, &buf).unwrap();
        // Both seeds are black: cluster 1 is empty in the first round
        let centroids = initialize_centroids(&mut FixedIndices(vec![0, 1]), &image, 2).unwrap();

        let result = lloyds_loop(&image, centroids, 15);
        assert!(result.converged);
        assert_eq!(result.iterations, 3);
        assert_eq!(result.centroids.as_flat(), &[255, 255, 255, 0, 0, 0]);
        for (x, &label) in result.assignment.rows().next().unwrap().iter().enumerate() {
            assert_eq!(label, if x < 3 { 1 } else { 0 });
        }
    }

    #[test]
    fn test_iteration_limit_returns_consistent_state() {
        let buf = two_tone(6, 4);
        let image = InputImage::from_bytes(6, 4, &buf).unwrap();
        let centroids = initialize_centroids(&mut FixedIndices(vec![0, 1]), &image, 2).unwrap();

        let result = lloyds_loop(&image, centroids, 1);
        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        // Mean of 12 black and 12 white pixels is 127.5, floored
        assert_eq!(result.centroids.as_flat(), &[127, 127, 127, 0, 0, 0]);
        assert_eq!(
            result.assignment,
            assign_clusters(&image, &result.centroids),
            "assignment must match the returned centroids",
        );
        assert_eq!(result.cluster_sizes, vec![12, 12]);
    }

    #[test]
    fn test_deterministic_given_centroids() {
        let buf = random_image(40, 30, 7);
        let image = InputImage::from_bytes(40, 30, &buf).unwrap();
        let centroids = initialize_centroids(&mut rng::new(), &image, 5).unwrap();

        let a = lloyds_loop(&image, centroids.clone(), 15);
        let b = lloyds_loop(&image, centroids, 15);
        assert_eq!(a.centroids, b.centroids);
        assert_eq!(a.assignment, b.assignment);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn test_label_coverage() {
        let buf = random_image(31, 9, 3);
        let image = InputImage::from_bytes(31, 9, &buf).unwrap();
        let k = 7;
        let centroids = initialize_centroids(&mut rng::new(), &image, k).unwrap();

        let result = lloyds_loop(&image, centroids, 15);
        assert!(result.iterations <= 15);
        assert_eq!(result.centroids.len(), k);
        assert_eq!(result.assignment.labels().len(), 31 * 9);
        assert!(result.assignment.labels().iter().all(|&l| (l as usize) < k));
        assert_eq!(result.cluster_sizes.iter().sum::<usize>(), 31 * 9);
    }

    #[test]
    fn test_k_one_is_image_mean() {
        let buf = random_image(13, 11, 5);
        let image = InputImage::from_bytes(13, 11, &buf).unwrap();
        let centroids = initialize_centroids(&mut rng::new(), &image, 1).unwrap();

        let result = lloyds_loop(&image, centroids, 15);
        assert!(result.converged);

        let n = image.pixel_count() as u64;
        let expected: Vec<u8> = (0..3)
            .map(|c| (image.pixels().map(|p| p[c] as u64).sum::<u64>() / n) as u8)
            .collect();
        assert_eq!(result.centroids.as_flat(), expected.as_slice());
        assert!(result.assignment.labels().iter().all(|&l| l == 0));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_parallel_matches_serial() {
        let buf = random_image(64, 48, 11);
        let image = InputImage::from_bytes(64, 48, &buf).unwrap();
        let centroids = initialize_centroids(&mut rng::new(), &image, 8).unwrap();

        let mut serial = vec![0; image.pixel_count()];
        let mut parallel = vec![0; image.pixel_count()];
        assign_points_serial(&image, &centroids, &mut serial);
        assign_points_parallel(&image, &centroids, &mut parallel);
        assert_eq!(serial, parallel);

        assert_eq!(
            accumulate_serial(&image, &serial, 8),
            accumulate_parallel(&image, &serial, 8)
        );
    }
}
