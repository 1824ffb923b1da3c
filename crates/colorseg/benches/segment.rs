use colorseg::{InputImage, rng, segment_extra};
use criterion::{
    AxisScale, BenchmarkId, Criterion, PlotConfiguration, criterion_group, criterion_main,
};
use rand::RngExt;

struct Size {
    label: &'static str,
    width: u16,
    height: u16,
}

const SIZES: &[Size] = &[
    Size {
        label: "small",
        width: 100,
        height: 100,
    },
    Size {
        label: "medium",
        width: 640,
        height: 480,
    },
    Size {
        label: "large",
        width: 1920,
        height: 1080,
    },
];

const CENTERS: [[u8; 3]; 4] = [[20, 30, 200], [220, 40, 40], [60, 180, 70], [240, 240, 230]];

fn generate_random_pixels(size: &Size) -> Vec<u8> {
    let mut rng = rng::new();
    (0..size.width as usize * size.height as usize * 3)
        .map(|_| rng.random::<u8>())
        .collect()
}

fn generate_clustered_pixels(size: &Size) -> Vec<u8> {
    let mut rng = rng::new();
    let n = size.width as usize * size.height as usize;
    let mut buf = Vec::with_capacity(n * 3);
    for i in 0..n {
        for c in CENTERS[i % CENTERS.len()] {
            let noise = rng.random_range(0..16u8);
            buf.push(c.saturating_add(noise));
        }
    }
    buf
}

fn bench(c: &mut Criterion) {
    let plot_config = PlotConfiguration::default().summary_scale(AxisScale::Logarithmic);

    let random: Vec<Vec<u8>> = SIZES.iter().map(generate_random_pixels).collect();
    let clustered: Vec<Vec<u8>> = SIZES.iter().map(generate_clustered_pixels).collect();

    for k in [2usize, 4, 8] {
        for (sample_label, buffers) in [("random", &random), ("clustered", &clustered)] {
            let mut group = c.benchmark_group(format!("segment/{sample_label}-k{k}"));
            group.plot_config(plot_config.clone());
            group.sample_size(10);

            for (size, buf) in SIZES.iter().zip(buffers.iter()) {
                let input = InputImage::from_bytes(size.width, size.height, buf).unwrap();
                group.bench_with_input(BenchmarkId::from_parameter(size.label), &input, |b, input| {
                    b.iter_with_large_drop(|| {
                        segment_extra(*input, k, colorseg::DEFAULT_MAX_ITERATIONS, &mut rng::new())
                            .unwrap()
                    })
                });
            }
            group.finish();
        }
    }
}

criterion_group!(benches, bench);
criterion_main!(benches);
