// THEORY:
// The `gradient` module is the field provider in front of the streaming scan. It
// turns a raw grayscale buffer into the dense dert field the scanner consumes, by
// cross-comparing every pixel against its kernel neighborhood and expressing the
// result as a deviation from the scene-average gradient.
//
// Key architectural principles:
// 1.  **Boundary Trimming at the Source**: The kernel cannot cover the outermost
//     rows and columns, so the output field is already trimmed (one pixel per side
//     for the 3x3 kernel, the trailing row/column for the 2x2). The scanner never
//     sees partially-covered cells.
// 2.  **Deviation Out, Not Magnitude**: The provider subtracts the average
//     gradient here, once, so the scan's sign rule stays threshold-free.
// 3.  **Stateless Per Row**: Each output row depends only on its input-row
//     neighborhood, which is what lets `parallel_pipeline` compute row bands on
//     independent workers while the scan itself stays sequential.

use std::ops::Range;

use thiserror::Error;

use crate::core_modules::dert::{Dert, DertMap};

/// Normalization applied to the kernel gradient magnitude.
const G_SCALE: f64 = 0.354801226089485;

/// Default average gradient subtracted for the 2x2 kernel.
pub const DEFAULT_AVE_K2: f64 = 20.0;
/// Default average gradient subtracted for the 3x3 kernel.
pub const DEFAULT_AVE_K3: f64 = 80.0;

/// Neighbor offsets of the 3x3 kernel, clockwise from the top-left corner.
const OFFSETS_K3: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
];
/// Vertical decomposition coefficients, matched index-for-index to `OFFSETS_K3`.
const YCOEF_K3: [f64; 8] = [-0.5, -1.0, -0.5, 0.0, 0.5, 1.0, 0.5, 0.0];
/// Horizontal decomposition coefficients, matched index-for-index to `OFFSETS_K3`.
const XCOEF_K3: [f64; 8] = [-0.5, 0.0, 0.5, 1.0, 0.5, 0.0, -0.5, -1.0];

/// The comparison kernel size. Three is the default; two is the cheaper variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelWidth {
    Two,
    Three,
}

impl KernelWidth {
    /// Parses a configured width; only 2 and 3 are meaningful kernel sizes.
    pub fn from_width(width: u32) -> Option<Self> {
        match width {
            2 => Some(KernelWidth::Two),
            3 => Some(KernelWidth::Three),
            _ => None,
        }
    }

    /// The default average gradient for this kernel.
    pub fn default_ave(self) -> f64 {
        match self {
            KernelWidth::Two => DEFAULT_AVE_K2,
            KernelWidth::Three => DEFAULT_AVE_K3,
        }
    }

    /// Output field dimensions for a given input image size.
    pub fn output_dims(self, width: usize, height: usize) -> (usize, usize) {
        match self {
            KernelWidth::Two => (width - 1, height - 1),
            KernelWidth::Three => (width - 2, height - 2),
        }
    }

    fn min_input(self) -> usize {
        match self {
            KernelWidth::Two => 2,
            KernelWidth::Three => 3,
        }
    }
}

/// Input-shape failures of the provider, reported to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GradientError {
    #[error("image {width}x{height} is smaller than the {min}x{min} comparison kernel")]
    ImageTooSmall {
        width: usize,
        height: usize,
        min: usize,
    },
    #[error("luma buffer holds {got} bytes, expected {expected} for the given dimensions")]
    BufferMismatch { expected: usize, got: usize },
}

/// Cross-compares every coverable pixel of a grayscale buffer and returns the
/// boundary-trimmed dert field: intensity, gradient deviation (`g - ave`), and the
/// vertical/horizontal difference components.
pub fn comp_pixel(
    gray: &[u8],
    width: usize,
    height: usize,
    kernel: KernelWidth,
    ave: f64,
) -> Result<DertMap, GradientError> {
    validate(gray, width, height, kernel)?;
    let (out_width, out_height) = kernel.output_dims(width, height);
    let derts = comp_rows(gray, width, kernel, ave, 0..out_height);
    Ok(DertMap::new(out_width, out_height, derts))
}

/// Computes the derts of a band of output rows. The caller is responsible for
/// validating the buffer once (see `comp_pixel`); the parallel front-end uses this
/// to hand disjoint bands to independent workers.
pub fn comp_rows(
    gray: &[u8],
    width: usize,
    kernel: KernelWidth,
    ave: f64,
    out_rows: Range<usize>,
) -> Vec<Dert> {
    let out_width = match kernel {
        KernelWidth::Two => width - 1,
        KernelWidth::Three => width - 2,
    };
    let mut derts = Vec::with_capacity(out_rows.len() * out_width);
    let at = |x: usize, y: usize| gray[y * width + x] as f64;

    for oy in out_rows {
        for ox in 0..out_width {
            let dert = match kernel {
                KernelWidth::Two => {
                    let (x, y) = (ox, oy);
                    let dy = (at(x + 1, y + 1) - at(x + 1, y)) + (at(x, y + 1) - at(x, y)) * 0.5;
                    let dx = (at(x + 1, y + 1) - at(x, y + 1)) + (at(x + 1, y) - at(x, y)) * 0.5;
                    let i = (at(x, y) + at(x + 1, y) + at(x, y + 1) + at(x + 1, y + 1)) * 0.25;
                    make_dert(i, dy, dx, ave)
                }
                KernelWidth::Three => {
                    let (cx, cy) = (ox + 1, oy + 1);
                    let center = at(cx, cy);
                    let mut dy = 0.0;
                    let mut dx = 0.0;
                    for (k, (oy_off, ox_off)) in OFFSETS_K3.iter().enumerate() {
                        let d = at(
                            (cx as isize + ox_off) as usize,
                            (cy as isize + oy_off) as usize,
                        ) - center;
                        dy += d * YCOEF_K3[k];
                        dx += d * XCOEF_K3[k];
                    }
                    make_dert(center, dy, dx, ave)
                }
            };
            derts.push(dert);
        }
    }
    derts
}

fn make_dert(i: f64, dy: f64, dx: f64, ave: f64) -> Dert {
    let g = dy.hypot(dx) * G_SCALE;
    Dert::new(i, g - ave, dy, dx)
}

/// Checks a grayscale buffer against the kernel's minimum size and the declared
/// dimensions. `comp_pixel` calls this itself; callers that band the work across
/// `comp_rows` validate once up front.
pub fn validate(
    gray: &[u8],
    width: usize,
    height: usize,
    kernel: KernelWidth,
) -> Result<(), GradientError> {
    let min = kernel.min_input();
    if width < min || height < min {
        return Err(GradientError::ImageTooSmall { width, height, min });
    }
    if gray.len() != width * height {
        return Err(GradientError::BufferMismatch {
            expected: width * height,
            got: gray.len(),
        });
    }
    Ok(())
}
