use clap::Parser;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
pub struct FolderArgs {
    /// Path to a folder of images
    pub folder: PathBuf,
}

#[derive(Parser)]
pub struct SegmentArgs {
    /// Number of clusters
    #[arg(short, long, default_value_t = 4)]
    pub k: usize,

    /// Upper bound on assign/update rounds
    #[arg(long, default_value_t = crate::DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,

    /// Seed for picking the initial centroids
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log every Lloyd iteration
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn init_tracing(verbose: bool) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = if verbose { Level::TRACE } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}

pub fn find_jpg_files(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn ensure_out_dir(folder: &Path, name: &str) -> std::io::Result<PathBuf> {
    let dir = folder.join("debug_results").join(name);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn load_rgb8(path: &Path) -> image::ImageResult<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}
