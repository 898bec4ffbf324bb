// The parallel pipeline only parallelizes the stateless gradient stage; the scan
// itself stays sequential. Its output must therefore be indistinguishable from
// the sequential pipeline's, blob for blob.

use gradient_blobs::parallel_pipeline::ParallelPipeline;
use gradient_blobs::pipeline::{BlobPipeline, Frame, PipelineConfig};

/// A synthetic scene with enough structure to produce several blobs: bright
/// blocks on a dark background with a diagonal ramp.
fn synthetic_image(width: usize, height: usize) -> Vec<u8> {
    let mut gray = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut value = ((x + y) % 32) as u8;
            if (8..20).contains(&x) && (6..14).contains(&y) {
                value = 220;
            }
            if (26..38).contains(&x) && (10..30).contains(&y) {
                value = 180;
            }
            gray[y * width + x] = value;
        }
    }
    gray
}

fn assert_frames_equal(sequential: &Frame, parallel: &Frame) {
    assert_eq!(sequential.width, parallel.width);
    assert_eq!(sequential.height, parallel.height);
    assert_eq!(sequential.i, parallel.i);
    assert_eq!(sequential.g, parallel.g);
    assert_eq!(sequential.dy, parallel.dy);
    assert_eq!(sequential.dx, parallel.dx);
    assert_eq!(sequential.blobs.len(), parallel.blobs.len());

    for (a, b) in sequential.blobs.iter().zip(&parallel.blobs) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.sign, b.sign);
        assert_eq!(a.bounding_box, b.bounding_box);
        assert_eq!(a.mask, b.mask);
        assert_eq!(a.dert, b.dert);
        assert_eq!(a.segments.len(), b.segments.len());
    }
}

#[tokio::test]
async fn parallel_front_end_matches_sequential_pipeline() {
    let (width, height) = (48, 40);
    let gray = synthetic_image(width, height);
    let config = PipelineConfig::default();

    let sequential = BlobPipeline::new(config.clone())
        .unwrap()
        .process_luma(&gray, width, height)
        .unwrap();
    assert!(sequential.blobs.len() > 2, "the scene must not be degenerate");

    let parallel = ParallelPipeline::new(config)
        .unwrap()
        .process_luma(gray, width, height)
        .await
        .unwrap();

    assert_frames_equal(&sequential, &parallel);
}

#[tokio::test]
async fn parity_holds_for_any_worker_count() {
    let (width, height) = (30, 23);
    let gray = synthetic_image(width, height);
    let sequential = BlobPipeline::new(PipelineConfig::default())
        .unwrap()
        .process_luma(&gray, width, height)
        .unwrap();

    for workers in [1, 2, 7, 64] {
        let parallel = ParallelPipeline::new(PipelineConfig::default())
            .unwrap()
            .with_workers(workers)
            .process_luma(gray.clone(), width, height)
            .await
            .unwrap();
        assert_frames_equal(&sequential, &parallel);
    }
}
