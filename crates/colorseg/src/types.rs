use rgb::RGB8;

/// Squared Euclidean distance between two colors with the same channel count.
///
/// Ordering is identical to the true Euclidean distance, and integer math means
/// exact ties stay ties. A `u64` sum cannot overflow for any buffer that fits in
/// memory.
#[inline(always)]
pub(crate) fn squared_distance(x: &[u8], y: &[u8]) -> u64 {
    debug_assert_eq!(x.len(), y.len());
    x.iter()
        .zip(y)
        .map(|(&a, &b)| {
            let d = a.abs_diff(b) as u64;
            d * d
        })
        .sum()
}

/// One color per cluster, stored flat: centroid `i` occupies
/// `values[i * channels..(i + 1) * channels]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Centroids {
    channels: usize,
    values: Vec<u8>,
}

impl Centroids {
    pub(crate) fn from_values(channels: usize, values: Vec<u8>) -> Self {
        assert!(channels > 0);
        assert!(values.len().is_multiple_of(channels));
        Self { channels, values }
    }

    /// Number of centroids (k).
    pub fn len(&self) -> usize {
        self.values.len() / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn get(&self, i: usize) -> Option<&[u8]> {
        self.values.get(i * self.channels..(i + 1) * self.channels)
    }

    pub fn iter(&self) -> std::slice::ChunksExact<'_, u8> {
        self.values.chunks_exact(self.channels)
    }

    pub fn as_flat(&self) -> &[u8] {
        &self.values
    }

    #[inline]
    pub(crate) fn centroid_mut(&mut self, i: usize) -> &mut [u8] {
        &mut self.values[i * self.channels..(i + 1) * self.channels]
    }

    /// The centroids as sRGB colors, or `None` unless pixels have exactly 3 channels.
    pub fn palette(&self) -> Option<Vec<RGB8>> {
        if self.channels != 3 {
            return None;
        }
        Some(self.iter().map(|c| RGB8::new(c[0], c[1], c[2])).collect())
    }
}

/// Cluster label of every pixel, row-major, same dimensions as the input image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    width: u16,
    height: u16,
    labels: Vec<u32>,
}

impl Assignment {
    pub(crate) fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            labels: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    #[inline]
    pub(crate) fn labels_mut(&mut self) -> &mut [u32] {
        &mut self.labels
    }

    /// Label of the pixel in column `x`, row `y`.
    pub fn label(&self, x: u16, y: u16) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.labels[y as usize * self.width as usize + x as usize])
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, u32> {
        self.labels.chunks_exact(self.width as usize)
    }

    /// Number of pixels carrying each label in `0..k`.
    pub fn cluster_sizes(&self, k: usize) -> Vec<usize> {
        let mut sizes = vec![0usize; k];
        for &label in &self.labels {
            sizes[label as usize] += 1;
        }
        sizes
    }

    pub fn into_labels(self) -> Vec<u32> {
        self.labels
    }
}
