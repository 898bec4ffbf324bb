// THEORY:
// The `row_partitioner` is the first stage of the streaming scan. It slices one row
// of the deviation field into maximal runs of constant sign, accumulating each run's
// statistics as it goes. It is the only component that ever touches individual
// pixels; everything above it works with run-level aggregates.
//
// Key architectural principles:
// 1.  **Pure Function of One Row**: Partitioning has no memory. The same row always
//     produces the same runs, which is what makes the gradient/partition stage of
//     the pipeline embarrassingly parallel while the linking stage stays sequential.
// 2.  **Total Coverage**: Every pixel of the row lands in exactly one run, both
//     signs included. Totality of the final blob masks over the field starts here.
// 3.  **Single Left-to-Right Pass**: Linear in row width, one comparison per pixel.

use crate::core_modules::dert::{Dert, DertSums};

/// One maximal horizontal span of same-sign pixels within a single row.
#[derive(Debug, Clone)]
pub struct Run {
    /// The shared sign of every pixel in the span: positive gradient deviation.
    pub sign: bool,
    /// The column of the first pixel in the span.
    pub x0: usize,
    /// The statistics accumulated over the span (row count stays 0 until the run
    /// is folded into a segment, which owns the per-row increment).
    pub sums: DertSums,
    /// The raw dert tuples of the span, kept for downstream consumers that need
    /// finer structure than the blob mask.
    pub derts: Vec<Dert>,
}

impl Run {
    fn open(x0: usize, dert: &Dert) -> Self {
        let mut sums = DertSums::default();
        sums.add_pixel(dert);
        Self {
            sign: dert.sign(),
            x0,
            sums,
            derts: vec![*dert],
        }
    }

    fn push(&mut self, dert: &Dert) {
        self.sums.add_pixel(dert);
        self.derts.push(*dert);
    }

    /// Number of pixels in the span.
    pub fn len(&self) -> usize {
        self.derts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.derts.is_empty()
    }

    /// The column one past the last pixel of the span.
    pub fn xn(&self) -> usize {
        self.x0 + self.len()
    }
}

/// Partitions one row of derts into its ordered sequence of maximal same-sign runs.
/// A row with no sign change yields exactly one run spanning the whole row; an
/// empty row yields no runs.
pub fn partition_row(row: &[Dert]) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut pixels = row.iter().enumerate();
    let Some((_, first)) = pixels.next() else {
        return runs;
    };

    let mut run = Run::open(0, first);
    for (x, dert) in pixels {
        if dert.sign() != run.sign {
            runs.push(std::mem::replace(&mut run, Run::open(x, dert)));
        } else {
            run.push(dert);
        }
    }
    runs.push(run);
    runs
}
