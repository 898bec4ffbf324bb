// THEORY:
// The `pipeline` module is the top-level API for the engine. It encapsulates the
// full stack (grayscale image in, gradient field, streaming scan, frame of
// finalized blobs out) behind a single, easy-to-use interface, so a consumer
// never has to assemble the stages by hand.

use std::path::Path;

use log::info;
use thiserror::Error;

use crate::core_modules::frame_scanner::FrameScanner;
use crate::core_modules::gradient::{self, GradientError, KernelWidth};

// Re-export key data structures for the public API.
pub use crate::core_modules::blob::{Blob, BoundingBox};
pub use crate::core_modules::dert::{Dert, DertMap, DertSums};
pub use crate::core_modules::frame_scanner::{Frame, ScanError};

/// Configuration for the blob pipeline, allowing for tunable behavior.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Width of the pixel cross-comparison kernel; 2 or 3.
    pub kernel_width: u32,
    /// The average gradient subtracted to form the deviation field. `None` picks
    /// the kernel's default (20 for the 2x2 kernel, 80 for the 3x3).
    pub gradient_average: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            kernel_width: 3,
            gradient_average: None,
        }
    }
}

/// Everything that can go wrong between an image and its frame of blobs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unsupported kernel width {0}: the comparison kernel is 2 or 3 pixels wide")]
    UnsupportedKernel(u32),
    #[error(transparent)]
    Gradient(#[from] GradientError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("failed to load image: {0}")]
    Image(#[from] image::ImageError),
    #[error("gradient worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// The main, top-level struct for the engine: a validated, reusable pipeline.
pub struct BlobPipeline {
    kernel: KernelWidth,
    ave: f64,
}

impl BlobPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let kernel = KernelWidth::from_width(config.kernel_width)
            .ok_or(PipelineError::UnsupportedKernel(config.kernel_width))?;
        let ave = config.gradient_average.unwrap_or(kernel.default_ave());
        Ok(Self { kernel, ave })
    }

    /// Runs the full stack on a raw grayscale buffer of the given dimensions.
    pub fn process_luma(
        &self,
        gray: &[u8],
        width: usize,
        height: usize,
    ) -> Result<Frame, PipelineError> {
        let map = gradient::comp_pixel(gray, width, height, self.kernel, self.ave)?;
        let frame = FrameScanner::scan(&map)?;
        info!(
            "processed {}x{} image: {} blobs, I={:.1}, G={:.1}",
            width,
            height,
            frame.blobs.len(),
            frame.i,
            frame.g,
        );
        Ok(frame)
    }

    /// Loads an image file, converts it to grayscale, and runs the full stack.
    pub fn process_file(&self, path: impl AsRef<Path>) -> Result<Frame, PipelineError> {
        let gray = image::open(path)?.to_luma8();
        self.process_luma(
            gray.as_raw(),
            gray.width() as usize,
            gray.height() as usize,
        )
    }

    pub(crate) fn kernel(&self) -> KernelWidth {
        self.kernel
    }

    pub(crate) fn ave(&self) -> f64 {
        self.ave
    }
}
