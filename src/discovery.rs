//! Neighbor discovery: derive who-sends-to-me from who-I-receive-from.
//!
//! Exchange graphs are usually built from the receive side (a part knows
//! whose data it needs) while the protocol also needs the send side. Given
//! a symmetric candidate graph that is a superset of the true
//! communication graph, each part tells every candidate whether it wants
//! its data, and the answers are the send lists.

use crate::data::{part_ids, Data, PartData};
use crate::exchange::exchange;

/// Marker meaning "I do not receive from you".
const NO_RECV: usize = usize::MAX;

/// Derive `parts_snd` from `parts_rcv` over a symmetric candidate graph.
///
/// `neighbors` must list, on every part, a superset of that part's true
/// neighbors, symmetrically (if a lists b, b lists a). Asymmetry is an
/// unchecked precondition beyond the part-count assertion and silently
/// yields an incomplete result. Work is bounded by the candidate degree;
/// passing `None` falls back to the complete graph — correct, but O(P)
/// per part, and not recommended at scale.
///
/// Each part sends, per candidate, its own id if that candidate appears in
/// its `parts_rcv`, the sentinel otherwise; markers are matched by
/// position in the candidate list. The surviving sender ids, in candidate
/// order, are `parts_snd`.
pub fn discover_parts_snd<D>(parts_rcv: &D, neighbors: Option<&D>) -> D
where
    D: PartData<Vec<usize>>,
{
    let n = parts_rcv.num_parts();
    let complete: D;
    let candidates = match neighbors {
        Some(nb) => {
            assert_eq!(
                nb.num_parts(),
                n,
                "combined distributed data must share the part count"
            );
            nb
        }
        None => {
            tracing::debug!(parts = n, "no candidate graph, falling back to all-to-all");
            complete = parts_rcv.map(|_| (0..n).collect::<Vec<usize>>());
            &complete
        }
    };

    let tagged: Data<D::Backend, (usize, Vec<usize>)> =
        part_ids(parts_rcv).into_zip(parts_rcv.map(|wanted| wanted.clone()));
    let markers = candidates.zip_map(&tagged, |cands, (me, wanted)| {
        cands
            .iter()
            .map(|&c| if wanted.contains(&c) { *me } else { NO_RECV })
            .collect::<Vec<usize>>()
    });

    // Self-exchange against the candidate graph; symmetry makes the
    // candidate list its own transpose.
    let answers = exchange(markers, candidates, candidates);
    answers.into_map(|marks| marks.into_iter().filter(|&m| m != NO_RECV).collect::<Vec<usize>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::sequential::{SeqBackend, SeqData};

    fn transpose(parts_rcv: &SeqData<Vec<usize>>) -> Vec<Vec<usize>> {
        let n = parts_rcv.num_parts();
        let mut snd = vec![Vec::new(); n];
        for p in 0..n {
            for &src in parts_rcv.part(p) {
                snd[src].push(p);
            }
        }
        snd
    }

    #[test]
    fn discovers_the_exact_transpose_on_a_ring() {
        let n = 4;
        let parts = SeqBackend.get_parts(n).expect("get_parts failed");
        let parts_rcv = parts.map(|&p| vec![(p + n - 1) % n, (p + 1) % n]);

        let parts_snd = discover_parts_snd(&parts_rcv, Some(&parts_rcv));

        let expected = transpose(&parts_rcv);
        for p in 0..n {
            let mut got = parts_snd.part(p).clone();
            let mut want = expected[p].clone();
            got.sort_unstable();
            want.sort_unstable();
            assert_eq!(got, want, "send list of part {p}");
        }
    }

    #[test]
    fn asymmetric_want_relation_inside_symmetric_candidates() {
        // Part 1 wants data from 0 and 2; nobody wants data from 1. The
        // candidate graph is the symmetric line 0 - 1 - 2.
        let parts = SeqBackend.get_parts(3).expect("get_parts failed");
        let candidates = parts.map(|&p| match p {
            0 => vec![1],
            1 => vec![0, 2],
            _ => vec![1],
        });
        let parts_rcv = parts.map(|&p| if p == 1 { vec![0, 2] } else { Vec::new() });

        let parts_snd = discover_parts_snd(&parts_rcv, Some(&candidates));

        assert_eq!(parts_snd.part(0), &[1]);
        assert_eq!(parts_snd.part(1), &[] as &[usize]);
        assert_eq!(parts_snd.part(2), &[1]);
    }

    #[test]
    fn default_candidate_graph_is_complete() {
        // Sparse want-relation, no candidate graph supplied.
        let parts = SeqBackend.get_parts(4).expect("get_parts failed");
        let parts_rcv = parts.map(|&p| if p == 3 { vec![0] } else { Vec::new() });

        let parts_snd = discover_parts_snd(&parts_rcv, None);

        assert_eq!(parts_snd.part(0), &[3]);
        for p in 1..4 {
            assert_eq!(parts_snd.part(p), &[] as &[usize], "part {p} sends nothing");
        }
    }

    #[test]
    fn self_receive_is_discovered() {
        let parts = SeqBackend.get_parts(2).expect("get_parts failed");
        let parts_rcv = parts.map(|&p| vec![p]);

        let parts_snd = discover_parts_snd(&parts_rcv, None);

        assert_eq!(parts_snd.part(0), &[0]);
        assert_eq!(parts_snd.part(1), &[1]);
    }
}
