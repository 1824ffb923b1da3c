pub mod draw;
pub mod kmeans;
pub mod render;
pub mod rng;
mod types;

#[cfg(feature = "_debug")]
pub mod debug_helpers;

pub use kmeans::init::{FixedIndices, IndexSource};
pub use rgb::RGB8;
pub use types::{Assignment, Centroids};

use snafu::prelude::*;
#[cfg(feature = "image")]
use std::ops::Deref;
use tracing::debug;

const U16_MAX: u16 = u16::MAX;

/// Number of Lloyd iterations [`segment`] runs before giving up on convergence.
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

/// Broad classification of every error this crate reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A parameter is outside its valid range.
    InvalidArgument,
    /// The image has no pixels.
    EmptyInput,
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum InputImageError {
    #[snafu(display("image size must be positive"))]
    ZeroImageSize,

    #[snafu(display("buffer is empty"))]
    EmptyBuffer,

    #[snafu(display("pixels must have at least one channel"))]
    ZeroChannels,

    #[snafu(display("buffer length {len} is not a multiple of {channels}"))]
    InvalidBufferLength { len: usize, channels: usize },

    #[snafu(display(
        "image size ({width}x{height}x{channels}) doesn't match the buffer size ({buf_size})"
    ))]
    ImageSizeMismatch {
        width: u16,
        height: u16,
        channels: usize,
        buf_size: usize,
    },

    #[snafu(display(
        "image dimensions are too large, max image size is {U16_MAX}x{U16_MAX}, \
        got {width}x{height}"
    ))]
    ImageDimensionsTooLarge { width: u32, height: u32 },
}

impl InputImageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InputImageError::ZeroImageSize | InputImageError::EmptyBuffer => ErrorKind::EmptyInput,
            _ => ErrorKind::InvalidArgument,
        }
    }
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum SegmentError {
    #[snafu(display("cluster count must be at least 1"))]
    ZeroClusters,

    #[snafu(display("cannot pick {k} distinct initial centroids from {pixels} pixels"))]
    TooManyClusters { k: usize, pixels: usize },

    #[snafu(display("max iterations must be at least 1"))]
    ZeroMaxIterations,

    #[snafu(display("index source returned {got} initial indices, expected {expected}"))]
    WrongInitialIndexCount { expected: usize, got: usize },

    #[snafu(display("initial index {index} is out of range for {pixels} pixels"))]
    InitialIndexOutOfRange { index: usize, pixels: usize },

    #[snafu(display("initial index {index} was returned more than once"))]
    DuplicateInitialIndex { index: usize },
}

impl SegmentError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

pub(crate) fn validate_buffer(
    width: u16,
    height: u16,
    channels: usize,
    len: usize,
) -> Result<(), InputImageError> {
    ensure!(len > 0, EmptyBufferSnafu);
    ensure!(width > 0 && height > 0, ZeroImageSizeSnafu);
    ensure!(channels > 0, ZeroChannelsSnafu);
    ensure!(
        len.is_multiple_of(channels),
        InvalidBufferLengthSnafu { len, channels }
    );
    ensure!(
        len == (width as usize) * (height as usize) * channels,
        ImageSizeMismatchSnafu {
            width,
            height,
            channels,
            buf_size: len,
        }
    );
    Ok(())
}

/// A structure used as a façade for the image bytes.
///
/// Pixels are stored row-major, `channels` bytes each, so pixel `(x, y)`
/// starts at byte `(y * width + x) * channels`.
#[derive(Debug, Copy, Clone)]
pub struct InputImage<'a> {
    width: u16,
    height: u16,
    channels: usize,
    buf: &'a [u8],
}

impl<'a> InputImage<'a> {
    /// Wraps an RGBRGBRGB… buffer.
    pub fn from_bytes(
        width: u16,
        height: u16,
        buf: &'a [u8],
    ) -> Result<InputImage<'a>, InputImageError> {
        Self::from_bytes_with_channels(width, height, 3, buf)
    }

    /// Wraps a buffer of pixels with an arbitrary number of channels.
    pub fn from_bytes_with_channels(
        width: u16,
        height: u16,
        channels: usize,
        buf: &'a [u8],
    ) -> Result<InputImage<'a>, InputImageError> {
        validate_buffer(width, height, channels, buf.len())?;
        Ok(InputImage {
            width,
            height,
            channels,
            buf,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    /// Channel values of the pixel at flat index `i` (`y * width + x`).
    #[inline]
    pub fn pixel(&self, i: usize) -> &'a [u8] {
        &self.buf[i * self.channels..(i + 1) * self.channels]
    }

    #[inline]
    pub fn pixels(&self) -> std::slice::ChunksExact<'a, u8> {
        self.buf.chunks_exact(self.channels)
    }

    /// Bytes of one image row.
    #[cfg_attr(not(feature = "rayon"), allow(dead_code))]
    #[inline]
    pub(crate) fn row_len(&self) -> usize {
        self.width as usize * self.channels
    }
}

#[cfg(feature = "image")]
impl<'a, Container> TryFrom<&'a image::ImageBuffer<image::Rgb<u8>, Container>> for InputImage<'a>
where
    Container: Deref<Target = [<image::Rgb<u8> as image::Pixel>::Subpixel]> + 'a,
{
    type Error = InputImageError;

    fn try_from(
        img: &'a image::ImageBuffer<image::Rgb<u8>, Container>,
    ) -> Result<Self, Self::Error> {
        let too_large = || {
            ImageDimensionsTooLargeSnafu {
                width: img.width(),
                height: img.height(),
            }
            .build()
        };
        let width = u16::try_from(img.width()).map_err(|_| too_large())?;
        let height = u16::try_from(img.height()).map_err(|_| too_large())?;
        Self::from_bytes(width, height, img.as_raw().deref())
    }
}

/// Per-pixel labels and the representative color of each cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub assignment: Assignment,
    pub centroids: Centroids,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    /// Number of assign/update rounds that ran.
    pub iterations: usize,
    /// Whether the centroids stopped changing before the iteration cap.
    pub converged: bool,
    /// Member count of each cluster in the returned assignment.
    pub cluster_sizes: Vec<usize>,
}

/// Segment an image into `k` color clusters.
///
/// For example, a 2x1 image with one black and one white pixel:
///
/// ```
/// let input = colorseg::InputImage::from_bytes(2, 1,
///   &[0, 0, 0, 255, 255, 255]
/// ).unwrap();
///
/// let output = colorseg::segment(input, 2).unwrap();
///
/// let labels = output.assignment.labels();
/// assert_ne!(labels[0], labels[1]);
/// assert_eq!(output.centroids.get(labels[0] as usize), Some(&[0u8, 0, 0][..]));
/// assert_eq!(output.centroids.get(labels[1] as usize), Some(&[255u8, 255, 255][..]));
/// ```
///
/// Initial centroids are drawn with the fixed-seed generator from [`rng::new`],
/// so repeated calls on the same image give the same result. Runs at most
/// [`DEFAULT_MAX_ITERATIONS`] rounds.
///
/// See also [`segment_extra`] for the same function with more tuning parameters,
/// and [`segment_extra_debug`] for convergence info.
pub fn segment(input: InputImage, k: usize) -> Result<Segmentation, SegmentError> {
    let mut rng = rng::new();
    segment_extra(input, k, DEFAULT_MAX_ITERATIONS, &mut rng)
}

pub fn segment_extra(
    input: InputImage,
    k: usize,
    max_iterations: usize,
    index_source: &mut impl IndexSource,
) -> Result<Segmentation, SegmentError> {
    segment_extra_debug(input, k, max_iterations, index_source).map(|(segmentation, _)| segmentation)
}

pub fn segment_extra_debug(
    input: InputImage,
    k: usize,
    max_iterations: usize,
    index_source: &mut impl IndexSource,
) -> Result<(Segmentation, DebugInfo), SegmentError> {
    ensure!(max_iterations >= 1, ZeroMaxIterationsSnafu);

    let centroids = kmeans::init::initialize_centroids(index_source, &input, k)?;
    let clustering = kmeans::lloyds::lloyds_loop(&input, centroids, max_iterations);

    debug!(
        k,
        pixels = input.pixel_count(),
        iterations = clustering.iterations,
        converged = clustering.converged,
        "segmentation finished"
    );

    Ok((
        Segmentation {
            assignment: clustering.assignment,
            centroids: clustering.centroids,
        },
        DebugInfo {
            iterations: clustering.iterations,
            converged: clustering.converged,
            cluster_sizes: clustering.cluster_sizes,
        },
    ))
}
