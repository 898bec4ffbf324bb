// THEORY:
// The `parallel_pipeline` exploits the one seam in the algorithm where parallelism
// is sound: the gradient/partition front-end is stateless per row, while the
// linking/merge scan is inherently sequential because every row depends on the
// finalized roots counts of the row above. So this pipeline computes the dert
// field in row bands on a blocking-worker pool, stitches the bands back together
// in order, and then runs the exact same sequential scan as `BlobPipeline`.
// The output is identical to the sequential pipeline's, by construction.

use std::sync::Arc;

use futures::future::join_all;
use log::debug;

use crate::core_modules::dert::DertMap;
use crate::core_modules::frame_scanner::{Frame, FrameScanner};
use crate::core_modules::gradient::{self, KernelWidth};
use crate::pipeline::{BlobPipeline, PipelineConfig, PipelineError};

/// A pipeline that fans the gradient computation out over worker tasks.
pub struct ParallelPipeline {
    kernel: KernelWidth,
    ave: f64,
    workers: usize,
}

impl ParallelPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let inner = BlobPipeline::new(config)?;
        Ok(Self {
            kernel: inner.kernel(),
            ave: inner.ave(),
            workers: num_cpus::get().max(1),
        })
    }

    /// Overrides the worker count (defaults to the number of logical CPUs).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Runs the full stack on a raw grayscale buffer. The buffer is taken by
    /// value so the worker tasks can share it without copying per band.
    pub async fn process_luma(
        &self,
        gray: Vec<u8>,
        width: usize,
        height: usize,
    ) -> Result<Frame, PipelineError> {
        gradient::validate(&gray, width, height, self.kernel)?;
        let (out_width, out_height) = self.kernel.output_dims(width, height);

        let band_rows = out_height.div_ceil(self.workers);
        let shared = Arc::new(gray);
        let mut bands = Vec::new();
        for start in (0..out_height).step_by(band_rows) {
            let end = (start + band_rows).min(out_height);
            let buffer = Arc::clone(&shared);
            let (kernel, ave) = (self.kernel, self.ave);
            bands.push(tokio::task::spawn_blocking(move || {
                gradient::comp_rows(&buffer, width, kernel, ave, start..end)
            }));
        }
        debug!(
            "computing {} output rows in {} bands of up to {} rows",
            out_height,
            bands.len(),
            band_rows
        );

        let mut derts = Vec::with_capacity(out_width * out_height);
        for band in join_all(bands).await {
            derts.extend(band?);
        }

        let map = DertMap::new(out_width, out_height, derts);
        Ok(FrameScanner::scan(&map)?)
    }
}
