use clap::Parser;
use colorseg::debug_helpers::{
    FolderArgs, SegmentArgs, ensure_out_dir, find_jpg_files, init_tracing, load_rgb8,
};
use colorseg::draw::Canvas;
use colorseg::{InputImage, render, rng, segment_extra_debug};
use image::RgbImage;
use std::error::Error;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
struct Args {
    #[command(flatten)]
    folder: FolderArgs,

    #[command(flatten)]
    segment: SegmentArgs,
}

const SEPARATOR: [u8; 3] = [255, 255, 255];

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.segment.verbose)?;

    let files = find_jpg_files(&args.folder.folder)?;
    let out_dir = ensure_out_dir(&args.folder.folder, "segment")?;

    for path in &files {
        let Some(filename) = path.file_name() else {
            continue;
        };

        let img = load_rgb8(path)?;
        let input = InputImage::try_from(&img)?;

        let (w, h) = (img.width(), img.height());
        let out_w = w * 3;
        let Ok(canvas_width) = u16::try_from(out_w) else {
            warn!(
                file = %filename.to_string_lossy(),
                width = w,
                "image too wide for the side-by-side output, skipping"
            );
            continue;
        };

        let t = Instant::now();
        let (segmentation, debug_info) = match args.segment.seed {
            Some(seed) => segment_extra_debug(
                input,
                args.segment.k,
                args.segment.max_iterations,
                &mut rng::with_seed(seed),
            )?,
            None => segment_extra_debug(
                input,
                args.segment.k,
                args.segment.max_iterations,
                &mut rng::new(),
            )?,
        };
        let elapsed = t.elapsed();


        let palette = render::random_palette(&mut rng::new(), segmentation.centroids.len());
        let labeled = render::paint_labels(&segmentation.assignment, &palette);
        let remapped =
            render::remap_to_centroids(&segmentation.assignment, &segmentation.centroids);

        // left: original, centre: random label colors, right: centroid colors
        let mut out = RgbImage::new(out_w, h);
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) as usize * 3;
                out.put_pixel(x, y, *img.get_pixel(x, y));
                out.put_pixel(
                    w + x,
                    y,
                    image::Rgb([labeled[i], labeled[i + 1], labeled[i + 2]]),
                );
                out.put_pixel(
                    2 * w + x,
                    y,
                    image::Rgb([remapped[i], remapped[i + 1], remapped[i + 2]]),
                );
            }
        }

        let last_row = h as i32 - 1;
        let mut canvas = Canvas::from_bytes(canvas_width, input.height(), &mut out)?;
        for x in [w as i32, 2 * w as i32] {
            canvas.line((x, 0), (x, last_row), &SEPARATOR, 1);
        }

        out.save(out_dir.join(filename))?;
        info!(
            file = %filename.to_string_lossy(),
            k = args.segment.k,
            iterations = debug_info.iterations,
            converged = debug_info.converged,
            cluster_sizes = ?debug_info.cluster_sizes,
            ?elapsed,
            "segmented"
        );
    }

    Ok(())
}
