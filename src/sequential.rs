//! Simulated backend: every part lives in one sequential process.
//!
//! All parts are slots of a single `Vec`, iterated in part order, and every
//! exchange is a direct memory copy performed eagerly — the returned
//! handles are already resolved. There is no concurrency to overlap; the
//! task interface exists so call sites written against the asynchronous
//! API run unmodified here during development and debugging.
//!
//! A send with no matching receive slot panics here instead of
//! deadlocking, which is the point of developing against this backend.

use crate::backend::{Backend, PartShape, Payload};
use crate::data::PartData;
use crate::error::{ArchipelError, Result};
use crate::table::Table;
use crate::task::Task;

/// The simulated substrate. Supports any part count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeqBackend;

/// One local value per part, all resident in this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqData<T> {
    parts: Vec<T>,
}

impl<T> SeqData<T> {
    /// All local values, in part order.
    pub fn parts(&self) -> &[T] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<T> {
        self.parts
    }

    /// Part `p`'s local value.
    pub fn part(&self, p: usize) -> &T {
        &self.parts[p]
    }
}

impl<T> PartData<T> for SeqData<T> {
    type Backend = SeqBackend;

    fn backend(&self) -> SeqBackend {
        SeqBackend
    }

    fn num_parts(&self) -> usize {
        self.parts.len()
    }

    fn i_am_master(&self) -> bool {
        // The single driver invocation is the one distinguished context.
        true
    }

    fn map<U, F>(&self, f: F) -> SeqData<U>
    where
        F: FnMut(&T) -> U,
    {
        SeqData {
            parts: self.parts.iter().map(f).collect(),
        }
    }

    fn map_with_part<U, F>(&self, mut f: F) -> SeqData<U>
    where
        F: FnMut(usize, &T) -> U,
    {
        SeqData {
            parts: self.parts.iter().enumerate().map(|(p, v)| f(p, v)).collect(),
        }
    }

    fn into_map<U, F>(self, f: F) -> SeqData<U>
    where
        F: FnMut(T) -> U,
    {
        SeqData {
            parts: self.parts.into_iter().map(f).collect(),
        }
    }

    fn map_mut<F>(&mut self, f: F)
    where
        F: FnMut(&mut T),
    {
        self.parts.iter_mut().for_each(f);
    }

    fn zip_map<U, V, F>(&self, other: &SeqData<U>, mut f: F) -> SeqData<V>
    where
        F: FnMut(&T, &U) -> V,
    {
        assert_eq!(
            self.num_parts(),
            other.num_parts(),
            "combined distributed data must share the part count"
        );
        SeqData {
            parts: self
                .parts
                .iter()
                .zip(&other.parts)
                .map(|(a, b)| f(a, b))
                .collect(),
        }
    }

    fn into_zip<U>(self, other: SeqData<U>) -> SeqData<(T, U)> {
        assert_eq!(
            self.num_parts(),
            other.num_parts(),
            "combined distributed data must share the part count"
        );
        SeqData {
            parts: self.parts.into_iter().zip(other.parts).collect(),
        }
    }

    fn into_any_part(self) -> T {
        self.parts
            .into_iter()
            .next()
            .expect("distributed data holds at least one part")
    }
}

impl Backend for SeqBackend {
    type Data<T> = SeqData<T>;

    fn get_parts(&self, shape: impl Into<PartShape>) -> Result<SeqData<usize>> {
        let shape = shape.into();
        let n = shape.count();
        if n == 0 {
            return Err(ArchipelError::Configuration(
                "part count must be at least 1".into(),
            ));
        }
        tracing::debug!(parts = n, "simulated backend parts");
        Ok(SeqData {
            parts: (0..n).collect(),
        })
    }

    fn run<R, F>(shape: impl Into<PartShape>, driver: F) -> Result<R>
    where
        F: FnOnce(SeqData<usize>) -> Result<R>,
    {
        let parts = SeqBackend.get_parts(shape)?;
        driver(parts)
    }

    fn start_table_exchange<T: Payload>(
        &self,
        mut rcv: SeqData<Table<T>>,
        snd: SeqData<Table<T>>,
        parts_rcv: &SeqData<Vec<usize>>,
        parts_snd: &SeqData<Vec<usize>>,
        deps: SeqData<Task<()>>,
    ) -> SeqData<Task<(Table<T>, Table<T>)>> {
        let n = parts_rcv.num_parts();
        for count in [parts_snd.num_parts(), rcv.num_parts(), snd.num_parts()] {
            assert_eq!(n, count, "combined distributed data must share the part count");
        }
        debug_assert_graphs(parts_rcv, parts_snd, &rcv, &snd);

        // Dependencies complete before any copy starts.
        for task in deps.into_parts() {
            task.wait();
        }

        // Deliver every message: part p's i-th send slice lands in slot j
        // of the destination, where j is p's position in the destination's
        // receive list.
        for p in 0..n {
            for (i, &dst) in parts_snd.part(p).iter().enumerate() {
                let j = parts_rcv
                    .part(dst)
                    .iter()
                    .position(|&src| src == p)
                    .unwrap_or_else(|| {
                        panic!("part {dst} does not list part {p} in parts_rcv")
                    });
                let payload = snd.part(p).slice(i);
                let slot = rcv.parts[dst].slice_mut(j);
                debug_assert_eq!(
                    payload.len(),
                    slot.len(),
                    "receive slice sized differently from the matching send"
                );
                slot.clone_from_slice(payload);
            }
        }

        let tasks = rcv
            .into_parts()
            .into_iter()
            .zip(snd.into_parts())
            .map(|pair| Task::ready(pair))
            .collect();
        SeqData { parts: tasks }
    }

    fn start_ragged_exchange<T: Payload>(
        &self,
        snd: SeqData<Table<T>>,
        parts_rcv: &SeqData<Vec<usize>>,
        parts_snd: &SeqData<Vec<usize>>,
        deps: SeqData<Task<()>>,
    ) -> SeqData<Task<(Table<T>, Table<T>)>> {
        // Phase 1+2: exchange per-neighbor element counts over the same
        // graph, gated on the caller's dependencies.
        let counts_snd = snd.map(|t| Table::of_units(t.counts()));
        let counts_buf = parts_rcv.map(|srcs| Table::of_units(vec![0usize; srcs.len()]));
        let count_tasks =
            self.start_table_exchange(counts_buf, counts_snd, parts_rcv, parts_snd, deps);

        // Phase 3: receive offsets by prefix sum, buffers sized to match.
        // Count tasks resolve immediately on this backend.
        let rcv = SeqData {
            parts: count_tasks
                .into_parts()
                .into_iter()
                .map(|t| Table::with_counts(&t.wait().0.into_data()))
                .collect(),
        };

        // Phase 4: payload exchange over the now agreed sizes.
        let ready = parts_rcv.map(|_| Task::ready(()));
        self.start_table_exchange(rcv, snd, parts_rcv, parts_snd, ready)
    }
}

/// Debug-only precondition checks: table layouts line up with the neighbor
/// lists, and neighbor lists are sets (the position-based matching above
/// would silently misroute duplicates).
fn debug_assert_graphs<T>(
    parts_rcv: &SeqData<Vec<usize>>,
    parts_snd: &SeqData<Vec<usize>>,
    rcv: &SeqData<Table<T>>,
    snd: &SeqData<Table<T>>,
) {
    if cfg!(debug_assertions) {
        for p in 0..parts_rcv.num_parts() {
            debug_assert_eq!(
                rcv.part(p).len(),
                parts_rcv.part(p).len(),
                "part {p}: receive table must hold one slice per receive neighbor"
            );
            debug_assert_eq!(
                snd.part(p).len(),
                parts_snd.part(p).len(),
                "part {p}: send table must hold one slice per send neighbor"
            );
            for list in [parts_rcv.part(p), parts_snd.part(p)] {
                let mut seen = list.clone();
                seen.sort_unstable();
                seen.dedup();
                debug_assert_eq!(
                    seen.len(),
                    list.len(),
                    "part {p}: neighbor lists are ordered sets, duplicates are not supported"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_parts_yields_each_part_its_own_id() {
        let parts = SeqBackend.get_parts(5).expect("get_parts failed");
        assert_eq!(parts.num_parts(), 5);
        assert_eq!(parts.parts(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn get_parts_accepts_a_shape() {
        let parts = SeqBackend.get_parts([2, 3]).expect("get_parts failed");
        assert_eq!(parts.num_parts(), 6);
    }

    #[test]
    fn get_parts_rejects_zero_parts() {
        assert!(SeqBackend.get_parts(0).is_err());
    }

    #[test]
    fn map_is_local_and_repeatable() {
        let parts = SeqBackend.get_parts(4).expect("get_parts failed");
        let a = parts.map(|&p| p * 10);
        let b = parts.map(|&p| p * 10);
        assert_eq!(a, b);
        assert_eq!(a.parts(), &[0, 10, 20, 30]);
        // The source is untouched.
        assert_eq!(parts.parts(), &[0, 1, 2, 3]);
    }

    #[test]
    fn map_mut_mutates_each_part_in_place() {
        let mut d = SeqBackend.get_parts(3).expect("get_parts failed");
        d.map_mut(|p| *p += 100);
        assert_eq!(d.parts(), &[100, 101, 102]);
    }

    #[test]
    #[should_panic(expected = "share the part count")]
    fn zip_map_rejects_mismatched_part_counts() {
        let a = SeqBackend.get_parts(3).expect("get_parts failed");
        let b = SeqBackend.get_parts(4).expect("get_parts failed");
        let _ = a.zip_map(&b, |x, y| x + y);
    }

    #[test]
    fn run_invokes_driver_once_with_all_parts() {
        let total = SeqBackend::run(4, |parts| Ok(parts.parts().iter().sum::<usize>()))
            .expect("run failed");
        assert_eq!(total, 6);
    }

    #[test]
    fn table_exchange_routes_by_receive_position() {
        // 3 parts in a line: 0 <-> 1 <-> 2, each sends its own id.
        let backend = SeqBackend;
        let parts = backend.get_parts(3).expect("get_parts failed");
        let parts_rcv = parts.map(|&p| match p {
            0 => vec![1],
            1 => vec![0, 2],
            _ => vec![1],
        });
        let parts_snd = parts_rcv.map(|v| v.clone()); // symmetric line

        let snd = parts.zip_map(&parts_snd, |&p, dsts| {
            Table::of_units(vec![p as u64; dsts.len()])
        });
        let rcv = parts_rcv.map(|srcs| Table::of_units(vec![0u64; srcs.len()]));

        let deps = parts.map(|_| Task::ready(()));
        let tasks = backend.start_table_exchange(rcv, snd, &parts_rcv, &parts_snd, deps);
        let got: Vec<Vec<u64>> = tasks
            .into_parts()
            .into_iter()
            .map(|t| t.wait().0.into_data())
            .collect();

        assert_eq!(got[0], vec![1]);
        assert_eq!(got[1], vec![0, 2]);
        assert_eq!(got[2], vec![1]);
    }

    #[test]
    #[should_panic(expected = "does not list part")]
    fn table_exchange_panics_on_unmatched_send() {
        let backend = SeqBackend;
        let parts = backend.get_parts(2).expect("get_parts failed");
        // Part 0 sends to part 1, but part 1 expects nothing.
        let parts_rcv = parts.map(|_| Vec::new());
        let parts_snd = parts.map(|&p| if p == 0 { vec![1] } else { Vec::new() });
        let snd = parts.map(|&p| {
            if p == 0 {
                Table::of_units(vec![9u32])
            } else {
                Table::of_units(Vec::new())
            }
        });
        let rcv = parts.map(|_| Table::of_units(Vec::<u32>::new()));
        let deps = parts.map(|_| Task::ready(()));
        let _ = backend.start_table_exchange(rcv, snd, &parts_rcv, &parts_snd, deps);
    }
}
