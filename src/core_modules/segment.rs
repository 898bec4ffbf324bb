// THEORY:
// The `segment` module owns the vertical dimension of the scan. A `Segment` is a
// chain of runs connected one-to-one across consecutive rows: no fork, no merge
// anywhere along it. The moment that one-to-one property breaks (a dead end, a
// branch into several runs, or a rejoin with a sibling branch), the segment closes
// and its statistics fold into its blob.
//
// Key architectural principles:
// 1.  **Index-Based Arena**: Segments live in a growable table keyed by `SegId`.
//     The owning blob is stored as a `BlobId` field, never a reference, so the
//     mutual segment/blob back-references of the algorithm carry no lifetime
//     entanglement and re-homing a segment during a blob merge is a field write.
// 2.  **Scan Bookkeeping vs. Final Data**: The public `Segment` holds only what
//     outlives the scan (first row, sums, runs). The roots counter, blob id, and
//     extended flag are scan-time bookkeeping on the arena slot and are stripped
//     when the segment is taken out for blob finalization.
// 3.  **Invariant Violations Are Fatal**: Touching a slot that was already taken
//     means the linker's fork/root accounting is broken. That is a bug, not an
//     input condition, so the table panics instead of returning errors.

use crate::core_modules::blob::BlobId;
use crate::core_modules::dert::DertSums;
use crate::core_modules::row_partitioner::Run;

/// Arena index of a segment, stable for the lifetime of one frame scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegId(pub usize);

/// A maximal vertical chain of one-to-one-connected runs. This is the final,
/// data-only form exposed on finalized blobs.
#[derive(Debug, Clone)]
pub struct Segment {
    /// The row of the first run in the chain.
    pub y0: usize,
    /// The statistics accumulated over every run in the chain.
    pub sums: DertSums,
    /// The runs of the chain, one per row, ordered top to bottom.
    pub runs: Vec<Run>,
}

impl Segment {
    /// The row one past the last run of the chain.
    pub fn yn(&self) -> usize {
        self.y0 + self.runs.len()
    }

    /// The shared sign of every run in the chain.
    pub fn sign(&self) -> bool {
        self.runs[0].sign
    }

    /// The column span of the most recent run, the segment's face toward the next row.
    pub fn last_span(&self) -> (usize, usize) {
        let run = self.runs.last().expect("segment holds at least one run");
        (run.x0, run.xn())
    }
}

/// One live slot of the arena: the segment plus its scan-time bookkeeping.
#[derive(Debug)]
struct OpenSegment {
    seg: Segment,
    /// The blob this segment currently belongs to. Rewritten during blob merges.
    blob: BlobId,
    /// How many runs of the row being linked connect to this segment's last run.
    roots: usize,
    /// Whether the current row extended this segment in place. Cleared by the
    /// close pass; a frontier segment without this flag closes after its row.
    extended: bool,
}

/// The growable arena of segments for one frame scan. Slots are taken (left `None`)
/// when their blob finalizes.
#[derive(Debug, Default)]
pub struct SegmentTable {
    slots: Vec<Option<OpenSegment>>,
}

impl SegmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new segment at row `y` from its first run, owned by `blob`.
    pub fn open(&mut self, y: usize, run: Run, blob: BlobId) -> SegId {
        let mut sums = run.sums;
        sums.ly = 1;
        let id = SegId(self.slots.len());
        self.slots.push(Some(OpenSegment {
            seg: Segment {
                y0: y,
                sums,
                runs: vec![run],
            },
            blob,
            roots: 0,
            extended: false,
        }));
        id
    }

    /// Extends a segment in place with its sole continuation run: folds the run's
    /// sums, bumps the row count, resets the roots counter for the next row's
    /// linking pass, and marks the segment as surviving this row.
    pub fn extend(&mut self, id: SegId, run: Run) {
        let slot = self.get_mut(id);
        slot.seg.sums.add_sums(&run.sums);
        slot.seg.sums.ly += 1;
        slot.seg.runs.push(run);
        slot.roots = 0;
        slot.extended = true;
    }

    /// Records one more continuation run for this segment. Linker-only.
    pub fn add_root(&mut self, id: SegId) {
        self.get_mut(id).roots += 1;
    }

    pub fn roots(&self, id: SegId) -> usize {
        self.get(id).roots
    }

    pub fn blob(&self, id: SegId) -> BlobId {
        self.get(id).blob
    }

    /// Re-points the segment at the surviving blob of a merge.
    pub fn rehome(&mut self, id: SegId, blob: BlobId) {
        self.get_mut(id).blob = blob;
    }

    /// Reads and clears the extended flag. The close pass calls this once per
    /// frontier segment after each row.
    pub fn take_extended(&mut self, id: SegId) -> bool {
        let slot = self.get_mut(id);
        std::mem::take(&mut slot.extended)
    }

    pub fn sign(&self, id: SegId) -> bool {
        self.get(id).seg.sign()
    }

    pub fn last_span(&self, id: SegId) -> (usize, usize) {
        self.get(id).seg.last_span()
    }

    /// Snapshot of the segment's accumulated sums, taken when it closes into its blob.
    pub fn sums(&self, id: SegId) -> DertSums {
        self.get(id).seg.sums
    }

    /// Removes the segment from the arena for blob finalization.
    pub fn take(&mut self, id: SegId) -> Segment {
        self.slots[id.0]
            .take()
            .expect("segment taken twice: blob membership accounting is broken")
            .seg
    }

    fn get(&self, id: SegId) -> &OpenSegment {
        self.slots[id.0]
            .as_ref()
            .expect("segment accessed after finalization: frontier accounting is broken")
    }

    fn get_mut(&mut self, id: SegId) -> &mut OpenSegment {
        self.slots[id.0]
            .as_mut()
            .expect("segment accessed after finalization: frontier accounting is broken")
    }
}
