// THEORY:
// The `blob` module is the accumulator at the top of the scan hierarchy. A blob is
// the maximal connected region of one sign, possibly built from several segments
// when the region forks and rejoins across rows. The accumulator owns the blob
// lifecycle: open, adopt a sibling segment, close a segment, merge two blobs, and
// finalize the instant the open-segment count reaches zero.
//
// Key architectural principles:
// 1.  **Open-Segment Counting**: A blob stays mutable exactly while it has open
//     segments. The count increases by one at blob creation and at every sibling
//     segment opened under the blob, and decreases by one in `close_segment` only.
//     Because new segments are always opened before their row's close pass runs,
//     the count can never hit zero while a continuation still exists.
// 2.  **Index-Based Arena with Retired Slots**: Blobs live in a table keyed by
//     `BlobId`. Merging re-points ids: the absorbed slot is retired with a redirect
//     to the survivor, and `resolve` follows redirect chains. No live object graph,
//     no cyclic ownership.
// 3.  **Iterative, Guarded Merge**: A rejoin row can merge blobs that themselves
//     already absorbed others. The merge walks a work list with a visited set
//     instead of recursing, so pathological rows with many simultaneous rejoins
//     cannot deepen the stack.
// 4.  **Finalize Once, Immutable After**: When the last open segment closes, the
//     blob's segments are pulled from the segment arena, the bounding box and
//     interior mask are rasterized, and the finished blob leaves the table for the
//     frame. Nothing can touch it afterwards; the slot is marked finalized and any
//     later access is a fatal bookkeeping bug.

use std::collections::HashSet;

use crate::core_modules::dert::DertSums;
use crate::core_modules::segment::{SegId, Segment, SegmentTable};

/// Arena index of a blob, stable for the lifetime of one frame scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId(pub usize);

/// The rectangular extent of a finalized blob, half-open on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// First row covered by the blob.
    pub y0: usize,
    /// One past the last covered row.
    pub yn: usize,
    /// First column covered by the blob.
    pub x0: usize,
    /// One past the last covered column.
    pub xn: usize,
}

impl BoundingBox {
    pub fn width(&self) -> usize {
        self.xn - self.x0
    }

    pub fn height(&self) -> usize {
        self.yn - self.y0
    }
}

/// A finalized, immutable blob: one maximal connected same-sign region.
#[derive(Debug, Clone)]
pub struct Blob {
    /// Identifier assigned in finalization order, unique within one frame.
    pub id: u64,
    /// The shared sign of every pixel in the region.
    pub sign: bool,
    /// The rectangular extent of the region in field coordinates.
    pub bounding_box: BoundingBox,
    /// The interior mask sized to the bounding box: true = inside a member run.
    pub mask: Vec<Vec<bool>>,
    /// The aggregate statistics summed over every member segment.
    pub dert: DertSums,
    /// The member segments, for consumers that need finer structure than the mask.
    pub segments: Vec<Segment>,
}

/// The mutable state of a blob that is still being scanned.
#[derive(Debug)]
struct BlobBody {
    sign: bool,
    /// First covered row; only merges can lower it after creation.
    y0: usize,
    /// Column extent, widened as runs attach. The row extent is derived from the
    /// member segments at finalization.
    x0: usize,
    xn: usize,
    sums: DertSums,
    open_segments: usize,
    segments: Vec<SegId>,
}

#[derive(Debug)]
enum BlobSlot {
    /// Still scanning: segments may extend, fork, or rejoin into it.
    Open(BlobBody),
    /// Absorbed by a merge; follow the redirect to the survivor.
    Retired { into: BlobId },
    /// Finalized and handed to the frame; any further access is a bug.
    Finalized,
}

/// The growable arena of blobs for one frame scan.
#[derive(Debug, Default)]
pub struct BlobTable {
    slots: Vec<BlobSlot>,
}

impl BlobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new blob for a segment starting at row `y` with span `[x0, xn)`.
    /// The creating segment itself is attached with `register_segment`.
    pub fn open(&mut self, sign: bool, y: usize, x0: usize, xn: usize) -> BlobId {
        let id = BlobId(self.slots.len());
        self.slots.push(BlobSlot::Open(BlobBody {
            sign,
            y0: y,
            x0,
            xn,
            sums: DertSums::default(),
            open_segments: 1,
            segments: Vec::new(),
        }));
        id
    }

    /// Attaches the segment that the blob was opened for. No count change: the
    /// blob was created with one open segment.
    pub fn register_segment(&mut self, id: BlobId, seg: SegId) {
        self.body_mut(id).segments.push(seg);
    }

    /// Attaches a sibling segment opened under an existing blob (a branch or the
    /// rejoin-created continuation) and counts it as open.
    pub fn adopt_segment(&mut self, id: BlobId, seg: SegId) {
        let body = self.body_mut(id);
        body.open_segments += 1;
        body.segments.push(seg);
    }

    /// Widens the column extent for a run attached at span `[x0, xn)`.
    pub fn widen(&mut self, id: BlobId, x0: usize, xn: usize) {
        let body = self.body_mut(id);
        body.x0 = body.x0.min(x0);
        body.xn = body.xn.max(xn);
    }

    pub fn sign(&self, id: BlobId) -> bool {
        self.body(id).sign
    }

    /// Follows retirement redirects to the live blob a possibly-stale id points at.
    pub fn resolve(&self, mut id: BlobId) -> BlobId {
        loop {
            match &self.slots[id.0] {
                BlobSlot::Retired { into } => id = *into,
                _ => return id,
            }
        }
    }

    /// Merges `absorbed` (and, transitively, anything it absorbed) into `survivor`:
    /// sums, open-segment counts, and box extents are folded in, every segment is
    /// re-homed, and the absorbed slot is retired with a redirect. Iterative with a
    /// visited guard; both ids must resolve to live, distinct blobs.
    pub fn merge(&mut self, survivor: BlobId, absorbed: BlobId, segments: &mut SegmentTable) {
        let mut visited: HashSet<BlobId> = HashSet::new();
        visited.insert(survivor);
        let mut work = vec![absorbed];

        while let Some(id) = work.pop() {
            let id = self.resolve(id);
            if !visited.insert(id) {
                continue;
            }

            let body = match std::mem::replace(&mut self.slots[id.0], BlobSlot::Retired { into: survivor })
            {
                BlobSlot::Open(body) => body,
                BlobSlot::Retired { .. } => unreachable!("resolve returned a live slot"),
                BlobSlot::Finalized => {
                    panic!("merging a finalized blob: open-segment accounting is broken")
                }
            };

            let surv = self.body_mut(survivor);
            debug_assert_eq!(surv.sign, body.sign, "blobs of opposite sign can never touch");
            surv.sums.add_sums(&body.sums);
            surv.open_segments += body.open_segments;
            surv.y0 = surv.y0.min(body.y0);
            surv.x0 = surv.x0.min(body.x0);
            surv.xn = surv.xn.max(body.xn);

            for seg in body.segments {
                segments.rehome(seg, survivor);
                self.body_mut(survivor).segments.push(seg);
            }
        }
    }

    /// Folds a closing segment's sums into its blob and decrements the open count.
    /// If the count reaches zero the blob finalizes: its segments are pulled from
    /// the arena, the mask is rasterized, and the finished `Blob` is returned with
    /// the given frame-local id.
    pub fn close_segment(
        &mut self,
        id: BlobId,
        seg: SegId,
        segments: &mut SegmentTable,
        final_id: u64,
    ) -> Option<Blob> {
        let sums = segments.sums(seg);
        let body = self.body_mut(id);
        body.sums.add_sums(&sums);
        assert!(
            body.open_segments > 0,
            "closing a segment of a blob with no open segments"
        );
        body.open_segments -= 1;
        if body.open_segments > 0 {
            return None;
        }

        let body = match std::mem::replace(&mut self.slots[id.0], BlobSlot::Finalized) {
            BlobSlot::Open(body) => body,
            _ => unreachable!("body_mut verified the slot is open"),
        };
        Some(rasterize(final_id, body, segments))
    }

    fn body(&self, id: BlobId) -> &BlobBody {
        match &self.slots[id.0] {
            BlobSlot::Open(body) => body,
            _ => panic!("blob accessed through a stale id: resolve before use"),
        }
    }

    fn body_mut(&mut self, id: BlobId) -> &mut BlobBody {
        match &mut self.slots[id.0] {
            BlobSlot::Open(body) => body,
            _ => panic!("blob accessed through a stale id: resolve before use"),
        }
    }
}

/// Builds the immutable blob: row extent from the member segments, interior mask
/// over the bounding box, aggregate sums from the accumulated body.
fn rasterize(final_id: u64, body: BlobBody, segments: &mut SegmentTable) -> Blob {
    let segs: Vec<Segment> = body.segments.iter().map(|&s| segments.take(s)).collect();
    let yn = segs
        .iter()
        .map(Segment::yn)
        .max()
        .expect("a blob holds at least one segment");
    debug_assert_eq!(
        body.y0,
        segs.iter().map(|s| s.y0).min().expect("non-empty"),
        "tracked first row must match the member segments"
    );

    let bounding_box = BoundingBox {
        y0: body.y0,
        yn,
        x0: body.x0,
        xn: body.xn,
    };
    let mut mask = vec![vec![false; bounding_box.width()]; bounding_box.height()];
    for seg in &segs {
        for (k, run) in seg.runs.iter().enumerate() {
            let row = seg.y0 + k - body.y0;
            for cell in &mut mask[row][run.x0 - body.x0..run.xn() - body.x0] {
                *cell = true;
            }
        }
    }

    Blob {
        id: final_id,
        sign: body.sign,
        bounding_box,
        mask,
        dert: body.sums,
        segments: segs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::dert::Dert;
    use crate::core_modules::row_partitioner::{Run, partition_row};

    fn make_run(x0: usize, len: usize, g: f64) -> Run {
        let derts: Vec<Dert> = (0..len).map(|_| Dert::new(1.0, g, 0.0, 0.0)).collect();
        let mut run = partition_row(&derts).remove(0);
        run.x0 = x0;
        run
    }

    #[test]
    fn single_segment_blob_finalizes_on_close() {
        let mut segs = SegmentTable::new();
        let mut blobs = BlobTable::new();

        let blob = blobs.open(true, 0, 2, 5);
        let seg = segs.open(0, make_run(2, 3, 1.0), blob);
        blobs.register_segment(blob, seg);
        segs.extend(seg, make_run(1, 4, 2.0));
        blobs.widen(blob, 1, 5);

        let done = blobs
            .close_segment(blob, seg, &mut segs, 0)
            .expect("last segment closed");
        assert_eq!(
            done.bounding_box,
            BoundingBox {
                y0: 0,
                yn: 2,
                x0: 1,
                xn: 5
            }
        );
        assert_eq!(done.dert.l, 7);
        assert_eq!(done.dert.ly, 2);
        assert_eq!(done.dert.g, 11.0);
        assert_eq!(
            done.mask,
            vec![
                vec![false, true, true, true],
                vec![true, true, true, true],
            ]
        );
    }

    #[test]
    fn sibling_segments_keep_blob_open() {
        let mut segs = SegmentTable::new();
        let mut blobs = BlobTable::new();

        let blob = blobs.open(true, 0, 0, 4);
        let trunk = segs.open(0, make_run(0, 4, 1.0), blob);
        blobs.register_segment(blob, trunk);

        // The trunk branches: two siblings open under the same blob, then it closes.
        let left = segs.open(1, make_run(0, 1, 1.0), blob);
        blobs.adopt_segment(blob, left);
        let right = segs.open(1, make_run(3, 1, 1.0), blob);
        blobs.adopt_segment(blob, right);

        assert!(blobs.close_segment(blob, trunk, &mut segs, 0).is_none());
        assert!(blobs.close_segment(blob, left, &mut segs, 0).is_none());
        let done = blobs
            .close_segment(blob, right, &mut segs, 0)
            .expect("last sibling closed");
        assert_eq!(done.dert.l, 6);
        assert_eq!(done.segments.len(), 3);
    }

    #[test]
    fn merge_folds_counts_sums_and_extents() {
        let mut segs = SegmentTable::new();
        let mut blobs = BlobTable::new();

        let a = blobs.open(true, 0, 0, 2);
        let sa = segs.open(0, make_run(0, 2, 1.0), a);
        blobs.register_segment(a, sa);

        let b = blobs.open(true, 0, 6, 9);
        let sb = segs.open(0, make_run(6, 3, 2.0), b);
        blobs.register_segment(b, sb);

        blobs.merge(a, b, &mut segs);
        assert_eq!(blobs.resolve(b), a);
        assert_eq!(segs.blob(sb), a);

        // Both original segments close; only then does the merged blob finalize.
        assert!(blobs.close_segment(a, sa, &mut segs, 0).is_none());
        let done = blobs
            .close_segment(blobs.resolve(b), sb, &mut segs, 7)
            .expect("merged blob finalizes once");
        assert_eq!(done.id, 7);
        assert_eq!(done.dert.l, 5);
        assert_eq!(done.dert.g, 8.0);
        assert_eq!(done.bounding_box.x0, 0);
        assert_eq!(done.bounding_box.xn, 9);
    }

    #[test]
    fn merge_through_a_retired_id_is_transitive() {
        let mut segs = SegmentTable::new();
        let mut blobs = BlobTable::new();

        let ids: Vec<BlobId> = (0..3)
            .map(|k| {
                let id = blobs.open(true, 0, k * 4, k * 4 + 2);
                let seg = segs.open(0, make_run(k * 4, 2, 1.0), id);
                blobs.register_segment(id, seg);
                id
            })
            .collect();

        blobs.merge(ids[0], ids[1], &mut segs);
        // A later fork may still hold the retired id; merging through it must
        // reach the survivor and be a no-op against it.
        blobs.merge(ids[0], blobs.resolve(ids[1]), &mut segs);
        blobs.merge(ids[0], ids[2], &mut segs);

        assert_eq!(blobs.resolve(ids[1]), ids[0]);
        assert_eq!(blobs.resolve(ids[2]), ids[0]);
    }

    #[test]
    #[should_panic]
    fn closing_a_finalized_blob_panics() {
        let mut segs = SegmentTable::new();
        let mut blobs = BlobTable::new();
        let blob = blobs.open(true, 0, 0, 1);
        let seg = segs.open(0, make_run(0, 1, 1.0), blob);
        blobs.register_segment(blob, seg);
        // First close finalizes; the slot is gone and the second close must panic.
        blobs.close_segment(blob, seg, &mut segs, 0);
        blobs.close_segment(blob, seg, &mut segs, 1);
    }
}
