// THEORY:
// The `dert` module defines the fundamental data currency of the entire engine:
// the per-pixel derivative tuple ("dert") produced by the gradient field provider,
// and the additive aggregate (`DertSums`) that every higher layer accumulates.
//
// Key architectural principles:
// 1.  **One Aggregate Everywhere**: Runs, segments, blobs, and the frame all sum the
//     exact same quantities. `DertSums` is that single type, so conservation of
//     statistics across the hierarchy is a property of the type, not of discipline.
// 2.  **Deviation, Not Magnitude**: The `g` field of a `Dert` is already the deviation
//     of the gradient magnitude from the scene average. The sign rule of the whole
//     engine (`g > 0.0`) therefore needs no threshold parameter downstream.
// 3.  **Dumb Data Containers**: Like the rest of the engine's leaf types, `Dert`,
//     `DertSums`, and `DertMap` hold data and perform summary arithmetic on their own
//     fields. They never reach into other layers.

/// One per-pixel tuple of the deviation field: intensity plus derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dert {
    /// The intensity of the pixel (center pixel for the 3x3 kernel, corner mean for 2x2).
    pub i: f64,
    /// The deviation of the gradient magnitude from the scene average. The sign of
    /// this value (`g > 0.0`) is the clustering criterion for the whole engine.
    pub g: f64,
    /// The vertical difference component accumulated over the comparison kernel.
    pub dy: f64,
    /// The horizontal difference component accumulated over the comparison kernel.
    pub dx: f64,
}

impl Dert {
    pub fn new(i: f64, g: f64, dy: f64, dx: f64) -> Self {
        Self { i, g, dy, dx }
    }

    /// The sign under which this pixel clusters: positive deviation of gradient.
    pub fn sign(&self) -> bool {
        self.g > 0.0
    }
}

/// The additive aggregate shared by runs, segments, blobs, and the frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DertSums {
    /// Summed intensity over all covered pixels.
    pub i: f64,
    /// Summed gradient-magnitude deviation over all covered pixels.
    pub g: f64,
    /// Summed vertical difference component.
    pub dy: f64,
    /// Summed horizontal difference component.
    pub dx: f64,
    /// Total pixel count.
    pub l: usize,
    /// Total row count (number of runs folded in, one per covered row per segment).
    pub ly: usize,
}

impl DertSums {
    /// Folds a single pixel into the aggregate. Used by the row partitioner only.
    pub fn add_pixel(&mut self, dert: &Dert) {
        self.i += dert.i;
        self.g += dert.g;
        self.dy += dert.dy;
        self.dx += dert.dx;
        self.l += 1;
    }

    /// Folds another aggregate into this one. Used when a run joins a segment,
    /// a segment closes into its blob, and a blob is absorbed by another.
    pub fn add_sums(&mut self, other: &DertSums) {
        self.i += other.i;
        self.g += other.g;
        self.dy += other.dy;
        self.dx += other.dx;
        self.l += other.l;
        self.ly += other.ly;
    }
}

/// The dense 2D field of derts consumed by the frame scanner. By convention the
/// field is already boundary-trimmed: the provider drops the raw image rows and
/// columns that the comparison kernel cannot cover.
#[derive(Debug, Clone)]
pub struct DertMap {
    width: usize,
    height: usize,
    derts: Vec<Dert>,
}

impl DertMap {
    /// Builds a map from a flattened row-major dert buffer.
    ///
    /// # Panics
    /// Panics if the buffer length does not equal `width * height`; a mismatched
    /// buffer is a provider bug, not a recoverable input condition.
    pub fn new(width: usize, height: usize, derts: Vec<Dert>) -> Self {
        assert_eq!(
            derts.len(),
            width * height,
            "dert buffer length must equal width * height"
        );
        Self {
            width,
            height,
            derts,
        }
    }

    /// Builds a map by evaluating `f(x, y)` for every cell. Handy for synthetic fields.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> Dert) -> Self {
        let mut derts = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                derts.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            derts,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// One full row of derts, the unit of work for the row partitioner.
    pub fn row(&self, y: usize) -> &[Dert] {
        let start = y * self.width;
        &self.derts[start..start + self.width]
    }
}
