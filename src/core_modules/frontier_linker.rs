// THEORY:
// The `frontier_linker` connects two adjacent rows of the scan: the fresh runs of
// the current row against the open segments carried over from the row above. Both
// sequences are ordered by starting column, so one synchronized left-to-right
// sweep finds every overlapping same-sign (run, segment) pair exactly once.
//
// Key architectural principles:
// 1.  **Two-Pointer Sweep**: The sweep always advances whichever side ends first
//     (smaller ending column), so no pair is visited twice and no rescanning ever
//     happens. Linking a row is linear in runs + segments.
// 2.  **Explicit Continuation Verdict**: Instead of signalling connectivity through
//     the mere existence of a variable, every run receives a total, three-way
//     `Continuation` verdict: no upstream match, a single unambiguous continuation,
//     or a fork list of several upstream segments (a rejoin point).
// 3.  **Counters, Not Structures**: The linker's only mutation is incrementing each
//     matched segment's roots counter. Extension, splitting, closing, and merging
//     are all decided later, from the finished counts, once the row is fully linked.

use crate::core_modules::row_partitioner::Run;
use crate::core_modules::segment::{SegId, SegmentTable};

/// The linking verdict for one run of the new row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// No open segment overlaps the run with a matching sign: the run starts a new
    /// segment under a new blob.
    NoMatch,
    /// Exactly one open segment connects to the run.
    Single(SegId),
    /// Two or more open segments connect to the run: the run is the rejoin point of
    /// branches, ordered left to right.
    Fork(Vec<SegId>),
}

impl Continuation {
    fn from_forks(mut forks: Vec<SegId>) -> Self {
        match forks.len() {
            0 => Continuation::NoMatch,
            1 => Continuation::Single(forks.pop().expect("len checked")),
            _ => Continuation::Fork(forks),
        }
    }
}

/// Sweeps the new row's runs against the previous row's open frontier, producing
/// one `Continuation` per run and incrementing the roots counter of every matched
/// segment. Column spans are half-open, so runs that merely touch do not connect.
pub fn link_row(runs: &[Run], frontier: &[SegId], segments: &mut SegmentTable) -> Vec<Continuation> {
    let mut links = Vec::with_capacity(runs.len());
    let mut forks: Vec<SegId> = Vec::new();
    let mut ri = 0;
    let mut si = 0;

    while ri < runs.len() && si < frontier.len() {
        let run = &runs[ri];
        let seg = frontier[si];
        let (sx0, sxn) = segments.last_span(seg);

        if run.sign == segments.sign(seg) && sx0 < run.xn() && run.x0 < sxn {
            segments.add_root(seg);
            forks.push(seg);
        }

        if run.xn() < sxn {
            // The segment may still overlap the next run; this run is done.
            links.push(Continuation::from_forks(std::mem::take(&mut forks)));
            ri += 1;
        } else {
            // The next run may still overlap this segment's successor.
            si += 1;
        }
    }

    // Whatever runs remain saw every segment that could reach them; the first one
    // may still carry forks collected before the frontier ran out.
    while ri < runs.len() {
        links.push(Continuation::from_forks(std::mem::take(&mut forks)));
        ri += 1;
    }

    // Remaining frontier segments keep their final roots counts (usually 0) and
    // are handled by the close pass.
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::blob::BlobId;
    use crate::core_modules::dert::Dert;
    use crate::core_modules::row_partitioner::partition_row;

    /// Builds a frontier row and a new row from (sign, x0, len) span lists.
    fn setup(
        frontier_spans: &[(bool, usize, usize)],
        run_spans: &[(bool, usize, usize)],
    ) -> (Vec<Run>, Vec<SegId>, SegmentTable) {
        let mut table = SegmentTable::new();
        let mut frontier = Vec::new();
        for &(sign, x0, len) in frontier_spans {
            let run = make_run(sign, x0, len);
            frontier.push(table.open(0, run, BlobId(0)));
        }
        let runs = run_spans
            .iter()
            .map(|&(sign, x0, len)| make_run(sign, x0, len))
            .collect();
        (runs, frontier, table)
    }

    fn make_run(sign: bool, x0: usize, len: usize) -> Run {
        let g = if sign { 1.0 } else { -1.0 };
        let derts: Vec<Dert> = (0..len).map(|_| Dert::new(1.0, g, 0.0, 0.0)).collect();
        let mut run = partition_row(&derts).remove(0);
        run.x0 = x0;
        run
    }

    #[test]
    fn single_overlap_links_one_pair() {
        let (runs, frontier, mut table) = setup(&[(true, 2, 4)], &[(true, 4, 4)]);
        let links = link_row(&runs, &frontier, &mut table);
        assert_eq!(links, vec![Continuation::Single(frontier[0])]);
        assert_eq!(table.roots(frontier[0]), 1);
    }

    #[test]
    fn sign_mismatch_never_links() {
        let (runs, frontier, mut table) = setup(&[(true, 0, 8)], &[(false, 0, 8)]);
        let links = link_row(&runs, &frontier, &mut table);
        assert_eq!(links, vec![Continuation::NoMatch]);
        assert_eq!(table.roots(frontier[0]), 0);
    }

    #[test]
    fn touching_spans_do_not_connect() {
        let (runs, frontier, mut table) = setup(&[(true, 0, 3)], &[(true, 3, 3)]);
        let links = link_row(&runs, &frontier, &mut table);
        assert_eq!(links, vec![Continuation::NoMatch]);
        assert_eq!(table.roots(frontier[0]), 0);
    }

    #[test]
    fn rejoin_collects_forks_in_order() {
        // Two frontier segments bridged by one wide run.
        let (runs, frontier, mut table) =
            setup(&[(true, 0, 4), (true, 6, 4)], &[(true, 0, 10)]);
        let links = link_row(&runs, &frontier, &mut table);
        assert_eq!(
            links,
            vec![Continuation::Fork(vec![frontier[0], frontier[1]])]
        );
        assert_eq!(table.roots(frontier[0]), 1);
        assert_eq!(table.roots(frontier[1]), 1);
    }

    #[test]
    fn branch_counts_every_root() {
        // One frontier segment continued by two runs, separated by a negative gap.
        let (runs, frontier, mut table) = setup(
            &[(true, 0, 10)],
            &[(true, 0, 4), (false, 4, 2), (true, 6, 4)],
        );
        let links = link_row(&runs, &frontier, &mut table);
        assert_eq!(
            links,
            vec![
                Continuation::Single(frontier[0]),
                Continuation::NoMatch,
                Continuation::Single(frontier[0]),
            ]
        );
        assert_eq!(table.roots(frontier[0]), 2);
    }

    #[test]
    fn runs_after_frontier_exhaustion_get_no_match() {
        let (runs, frontier, mut table) = setup(
            &[(true, 0, 2)],
            &[(true, 0, 2), (false, 2, 2), (true, 4, 2)],
        );
        let links = link_row(&runs, &frontier, &mut table);
        assert_eq!(
            links,
            vec![
                Continuation::Single(frontier[0]),
                Continuation::NoMatch,
                Continuation::NoMatch,
            ]
        );
    }

    #[test]
    fn every_overlapping_pair_is_found_once() {
        // Interleaved spans exercising both advance rules, equal ends included.
        let (runs, frontier, mut table) = setup(
            &[(true, 0, 3), (true, 3, 3), (true, 8, 2)],
            &[(true, 0, 6), (true, 6, 4)],
        );
        let links = link_row(&runs, &frontier, &mut table);
        assert_eq!(
            links,
            vec![
                Continuation::Fork(vec![frontier[0], frontier[1]]),
                Continuation::Single(frontier[2]),
            ]
        );
        assert_eq!(table.roots(frontier[0]), 1);
        assert_eq!(table.roots(frontier[1]), 1);
        assert_eq!(table.roots(frontier[2]), 1);
    }

    #[test]
    fn empty_sides_are_handled() {
        let (runs, frontier, mut table) = setup(&[], &[(true, 0, 4)]);
        assert_eq!(
            link_row(&runs, &frontier, &mut table),
            vec![Continuation::NoMatch]
        );

        let (runs, frontier, mut table) = setup(&[(true, 0, 4)], &[]);
        assert!(link_row(&runs, &frontier, &mut table).is_empty());
        assert_eq!(table.roots(frontier[0]), 0);
    }
}
