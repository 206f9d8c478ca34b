use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use imsim_core::{Image, OrbConfig};
use imsim_fast::corner_detection::CornerDetector;
use imsim_fast::refinement::KeypointRefinement;
use imsim_fast::FastDetector;

/// Binarized-looking benchmark image: white page with dark strokes and blocks,
/// similar to what the normalizer hands to the detector
fn create_benchmark_image(width: usize, height: usize) -> Image {
    let mut img = vec![255u8; width * height];

    for i in 0..60 {
        let cx = (i * 7919) % width;
        let cy = (i * 104729) % height;
        let size = 4 + (i % 9) * 2;
        for y in cy..(cy + size).min(height) {
            for x in cx..(cx + size).min(width) {
                img[y * width + x] = 0;
            }
        }
    }

    for y in (0..height).step_by(37) {
        for x in 0..width {
            img[y * width + x] = 0;
        }
    }

    img
}

fn create_test_config() -> OrbConfig {
    OrbConfig {
        n_threads: 1,
        ..OrbConfig::default()
    }
}

fn bench_full_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_detection");

    for &(width, height) in &[(320usize, 240usize), (640, 480), (1280, 960)] {
        let img = create_benchmark_image(width, height);
        let detector = FastDetector::new(create_test_config(), width, height).unwrap();

        group.bench_with_input(
            BenchmarkId::new("detect_keypoints", format!("{}x{}", width, height)),
            &img,
            |b, img| b.iter(|| detector.detect_keypoints(black_box(img)).unwrap()),
        );
    }

    group.finish();
}

fn bench_pipeline_stages(c: &mut Criterion) {
    let (width, height) = (640, 480);
    let img = create_benchmark_image(width, height);
    let cfg = create_test_config();
    let corners = CornerDetector::detect_corners(&img, width, height, cfg.threshold, cfg.edge_threshold);

    let mut group = c.benchmark_group("pipeline_stages");

    group.bench_function("segment_test", |b| {
        b.iter(|| CornerDetector::detect_corners(black_box(&img), width, height, cfg.threshold, cfg.edge_threshold))
    });

    group.bench_function("non_maximum_suppression", |b| {
        b.iter(|| KeypointRefinement::non_maximum_suppression(black_box(&corners), width, height))
    });

    group.bench_function("harris_response", |b| {
        b.iter(|| {
            corners
                .iter()
                .map(|c| CornerDetector::compute_harris_response(&img, width, height, c.keypoint.x as usize, c.keypoint.y as usize))
                .sum::<f32>()
        })
    });

    group.bench_function("orientation", |b| {
        b.iter(|| {
            corners
                .iter()
                .map(|c| KeypointRefinement::compute_orientation(&img, width, height, c.keypoint.x, c.keypoint.y, cfg.patch_size))
                .sum::<f32>()
        })
    });

    group.finish();
}

fn bench_feature_budget(c: &mut Criterion) {
    let (width, height) = (640, 480);
    let img = create_benchmark_image(width, height);
    let mut group = c.benchmark_group("feature_budget");

    for &n_features in &[250usize, 1000, 2000, 5000] {
        let cfg = OrbConfig {
            n_features,
            ..create_test_config()
        };
        let detector = FastDetector::new(cfg, width, height).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n_features), &img, |b, img| {
            b.iter(|| detector.detect_keypoints(black_box(img)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_full_detection, bench_pipeline_stages, bench_feature_budget);
criterion_main!(benches);
