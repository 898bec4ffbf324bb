// THEORY:
// The `frame_scanner` is the orchestrator of the streaming scan. It drives the four
// stages row by row (partition, link, resolve, close) and owns the only piece of
// cross-row state the algorithm needs: the frontier of open segments. Working
// memory is bounded by that frontier, never by the field; no label image, no
// flood fill, no whole-array union-find.
//
// Key architectural principles:
// 1.  **Strictly Sequential Rows**: Row y+1 cannot be resolved before row y's
//     bookkeeping is complete, because linking depends on the finalized roots
//     counts of the previous row. Only the gradient/partition front-end may run in
//     parallel (see `parallel_pipeline`).
// 2.  **Open Before Close**: Within a row, every run is resolved (segments
//     extended or opened, blobs created or merged) before any frontier segment is
//     closed. A blob therefore can never finalize while a continuation of it still
//     exists in the new row.
// 3.  **The Three-Way Transition Rule**: A frontier segment survives a row only if
//     its roots count is exactly 1 and that sole continuation run has exactly one
//     fork. Every other case (dead end, branch into many, rejoin with a sibling)
//     closes the segment. This rule is authoritative; nothing else closes segments
//     mid-scan.
// 4.  **Finalization Order**: Blobs leave the scanner in the order their last open
//     segment closes, which follows raster order but not blob creation order.

use log::{debug, trace};
use thiserror::Error;

use crate::core_modules::blob::{Blob, BlobTable};
use crate::core_modules::dert::{Dert, DertMap};
use crate::core_modules::frontier_linker::{Continuation, link_row};
use crate::core_modules::row_partitioner::{Run, partition_row};
use crate::core_modules::segment::{SegId, SegmentTable};

/// Input-shape failures of the scan. Inconsistent internal bookkeeping is not an
/// error: it panics, because it signals an implementation defect, not bad input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    /// The dert map has no cells; there is nothing to cluster.
    #[error("empty dert field: {width}x{height}")]
    EmptyField { width: usize, height: usize },
}

/// The result of scanning one full field: every finalized blob plus the frame-wide
/// grand totals, summed from the blob aggregates in finalization order.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Field width in derts.
    pub width: usize,
    /// Field height in derts.
    pub height: usize,
    /// Every blob of the field, in finalization order.
    pub blobs: Vec<Blob>,
    /// Grand total of intensity over all blobs.
    pub i: f64,
    /// Grand total of gradient-magnitude deviation over all blobs.
    pub g: f64,
    /// Grand total of the vertical difference component.
    pub dy: f64,
    /// Grand total of the horizontal difference component.
    pub dx: f64,
}

impl Frame {
    fn push(&mut self, blob: Blob) {
        self.i += blob.dert.i;
        self.g += blob.dert.g;
        self.dy += blob.dert.dy;
        self.dx += blob.dert.dx;
        self.blobs.push(blob);
    }
}

/// The streaming scanner for one frame. Create, `scan`, discard.
pub struct FrameScanner {
    segments: SegmentTable,
    blobs: BlobTable,
    /// Open segments of the row scanned last, ordered by the starting column of
    /// their most recent run.
    frontier: Vec<SegId>,
    frame: Frame,
}

impl FrameScanner {
    /// Scans a whole dert field in one top-to-bottom pass and returns its frame.
    pub fn scan(map: &DertMap) -> Result<Frame, ScanError> {
        if map.width() == 0 || map.height() == 0 {
            return Err(ScanError::EmptyField {
                width: map.width(),
                height: map.height(),
            });
        }

        let mut scanner = Self {
            segments: SegmentTable::new(),
            blobs: BlobTable::new(),
            frontier: Vec::new(),
            frame: Frame {
                width: map.width(),
                height: map.height(),
                ..Frame::default()
            },
        };

        for y in 0..map.height() {
            scanner.scan_row(y, map.row(y));
        }
        scanner.close_frontier();

        debug!(
            "scanned {}x{} field into {} blobs (I={:.1}, G={:.1})",
            map.width(),
            map.height(),
            scanner.frame.blobs.len(),
            scanner.frame.i,
            scanner.frame.g,
        );
        Ok(scanner.frame)
    }

    fn scan_row(&mut self, y: usize, row: &[Dert]) {
        let runs = partition_row(row);
        let links = link_row(&runs, &self.frontier, &mut self.segments);
        trace!(
            "row {}: {} runs against a frontier of {}",
            y,
            runs.len(),
            self.frontier.len()
        );

        let mut next_frontier = Vec::with_capacity(runs.len());
        for (run, link) in runs.into_iter().zip(links) {
            next_frontier.push(self.resolve_run(y, run, link));
        }

        let closing = std::mem::replace(&mut self.frontier, next_frontier);
        for seg in closing {
            if !self.segments.take_extended(seg) {
                self.close_segment(seg);
            }
        }
    }

    /// The segment extender/splitter: one run, one verdict, one frontier entry.
    fn resolve_run(&mut self, y: usize, run: Run, link: Continuation) -> SegId {
        match link {
            Continuation::NoMatch => {
                let blob = self.blobs.open(run.sign, y, run.x0, run.xn());
                let seg = self.segments.open(y, run, blob);
                self.blobs.register_segment(blob, seg);
                seg
            }
            Continuation::Single(fork) => {
                let roots = self.segments.roots(fork);
                assert!(roots >= 1, "a linked segment must count this run as a root");
                let blob = self.blobs.resolve(self.segments.blob(fork));
                self.blobs.widen(blob, run.x0, run.xn());
                if roots == 1 {
                    // Unambiguous one-to-one continuation: extend in place.
                    self.segments.extend(fork, run);
                    fork
                } else {
                    // The fork branches into several runs: each continuation gets
                    // its own sibling segment under the same blob.
                    let seg = self.segments.open(y, run, blob);
                    self.blobs.adopt_segment(blob, seg);
                    seg
                }
            }
            Continuation::Fork(forks) => {
                // The run rejoins several branches. The first fork's blob survives;
                // every other fork's blob is absorbed into it.
                let survivor = self.blobs.resolve(self.segments.blob(forks[0]));
                for fork in &forks[1..] {
                    let other = self.blobs.resolve(self.segments.blob(*fork));
                    if other != survivor {
                        trace!("row {}: rejoin merges blob {:?} into {:?}", y, other, survivor);
                        self.blobs.merge(survivor, other, &mut self.segments);
                    }
                }
                self.blobs.widen(survivor, run.x0, run.xn());
                let seg = self.segments.open(y, run, survivor);
                self.blobs.adopt_segment(survivor, seg);
                seg
            }
        }
    }

    fn close_segment(&mut self, seg: SegId) {
        let blob = self.blobs.resolve(self.segments.blob(seg));
        let final_id = self.frame.blobs.len() as u64;
        if let Some(blob) = self
            .blobs
            .close_segment(blob, seg, &mut self.segments, final_id)
        {
            trace!(
                "blob {} finalized: sign={}, box={:?}, L={}",
                blob.id, blob.sign, blob.bounding_box, blob.dert.l
            );
            self.frame.push(blob);
        }
    }

    /// Force-closes every segment still open after the last row.
    fn close_frontier(&mut self) {
        for seg in std::mem::take(&mut self.frontier) {
            self.close_segment(seg);
        }
    }
}
